use std::io::Cursor;

use symphonia::core::audio::SampleBuffer as PcmBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as CodecError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::frame::StereoFrame;
use crate::error::DecodeError;

/// Decoded audio, already converted to stereo at the engine sample rate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>,
}

impl SampleBuffer {
    pub fn from_mono(samples: impl IntoIterator<Item = f32>) -> Self {
        Self {
            data: samples.into_iter().map(StereoFrame::mono).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.data.len() as f64 / sample_rate.max(1) as f64
    }

    /// Decode a fetched payload. WAV goes through hound, anything else
    /// (mp3, ogg, flac) through symphonia's probe.
    pub fn decode(bytes: &[u8], extension: Option<&str>, target_rate: u32) -> Result<Self, DecodeError> {
        let (frames, file_rate) = if bytes.starts_with(b"RIFF") {
            decode_wav(bytes)?
        } else {
            decode_compressed(bytes, extension)?
        };
        let data = if file_rate != target_rate {
            resample_linear(&frames, file_rate, target_rate)
        } else {
            frames
        };
        Ok(Self { data })
    }
}

fn decode_wav(bytes: &[u8]) -> Result<(Vec<StereoFrame>, u32), DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok((interleaved_to_frames(&samples, spec.channels as usize)?, spec.sample_rate))
}

fn decode_compressed(bytes: &[u8], extension: Option<&str>) -> Result<(Vec<StereoFrame>, u32), DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or_default();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut frames = Vec::new();
    let mut pcm: Option<PcmBuffer<f32>> = None;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(CodecError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(CodecError::DecodeError(_)) => continue, // corrupt frame, skip it
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        sample_rate = spec.rate;
        if pcm.as_ref().map_or(true, |b| b.capacity() < decoded.capacity()) {
            pcm = Some(PcmBuffer::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = pcm.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        frames.extend(interleaved_to_frames(buf.samples(), spec.channels.count())?);
    }

    if sample_rate == 0 {
        return Err(DecodeError::NoTrack);
    }
    Ok((frames, sample_rate))
}

fn interleaved_to_frames(samples: &[f32], channels: usize) -> Result<Vec<StereoFrame>, DecodeError> {
    match channels {
        0 => Err(DecodeError::Unsupported("zero channels".into())),
        1 => Ok(samples.iter().map(|&x| StereoFrame::mono(x)).collect()), // mono, duplicate
        n => Ok(samples
            .chunks_exact(n)
            .map(|c| StereoFrame {
                left: c[0],
                right: c[1],
            })
            .collect()), // extra channels beyond the first two are dropped
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || source_rate == 0 {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let last = frames.last().copied().unwrap_or_default();

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            let frac = (src_pos - idx as f64) as f32;
            if idx + 1 >= frames.len() {
                last
            } else {
                let (a, b) = (frames[idx], frames[idx + 1]);
                StereoFrame {
                    left: a.left * (1.0 - frac) + b.left * frac,
                    right: a.right * (1.0 - frac) + b.right * frac,
                }
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn wav_bytes(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
