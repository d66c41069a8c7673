use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::audio::SampleId;
use crate::error::FetchError;

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, FetchError>> + Send + 'a>>;

/// Somewhere sample files can be fetched from. The layout is flat:
/// one `{instrument}_{code}.{ext}` file per take.
pub trait SampleSource: Send + Sync {
    fn fetch(&self, id: SampleId) -> FetchFuture<'_>;

    /// File extension, passed to the decoder as a format hint.
    fn extension(&self) -> &str;

    fn locate(&self, id: SampleId) -> String;
}

/// Samples served over HTTP from a fixed base path.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    extension: String,
}

impl HttpSource {
    pub fn new(base_url: &str, extension: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| FetchError::Http {
                url: base_url.to_string(),
                source,
            })?;
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client,
            base_url,
            extension: extension.to_string(),
        })
    }

    async fn fetch_url(&self, url: String) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|e| request_error(&url, e))?;
        if bytes.is_empty() {
            return Err(FetchError::Empty(url));
        }
        Ok(bytes.to_vec())
    }
}

fn request_error(url: &str, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else {
        FetchError::Http {
            url: url.to_string(),
            source,
        }
    }
}

impl SampleSource for HttpSource {
    fn fetch(&self, id: SampleId) -> FetchFuture<'_> {
        Box::pin(self.fetch_url(self.locate(id)))
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn locate(&self, id: SampleId) -> String {
        format!("{}{}", self.base_url, id.file_name(&self.extension))
    }
}

/// Samples read from a local directory with the same flat layout.
pub struct DirSource {
    dir: PathBuf,
    extension: String,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.to_string(),
        }
    }
}

impl SampleSource for DirSource {
    fn fetch(&self, id: SampleId) -> FetchFuture<'_> {
        let path = self.dir.join(id.file_name(&self.extension));
        Box::pin(async move {
            let shown = path.display().to_string();
            let read = tokio::task::spawn_blocking(move || std::fs::read(path))
                .await
                .map_err(|e| FetchError::Io {
                    path: shown.clone(),
                    source: std::io::Error::other(e),
                })?;
            let bytes = read.map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => FetchError::Missing(id),
                _ => FetchError::Io {
                    path: shown.clone(),
                    source,
                },
            })?;
            if bytes.is_empty() {
                return Err(FetchError::Empty(shown));
            }
            Ok(bytes)
        })
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn locate(&self, id: SampleId) -> String {
        self.dir.join(id.file_name(&self.extension)).display().to_string()
    }
}

/// Pick a source from a settings string: URLs go over HTTP, anything else is a directory.
pub fn source_for(location: &str, extension: &str, timeout: Duration) -> Result<Box<dyn SampleSource>, FetchError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpSource::new(location, extension, timeout)?))
    } else {
        Ok(Box::new(DirSource::new(location, extension)))
    }
}
