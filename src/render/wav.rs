use std::io::Cursor;
use std::path::Path;

use crate::error::RenderError;

use super::RenderedAudio;

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// 16-bit PCM, interleaved stereo, canonical 44-byte header.
pub fn encode(audio: &RenderedAudio) -> Result<Vec<u8>, RenderError> {
    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate: audio.sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for frame in &audio.frames {
            writer.write_sample(to_i16(frame.left))?;
            writer.write_sample(to_i16(frame.right))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

pub fn write_file(audio: &RenderedAudio, path: &Path) -> Result<(), RenderError> {
    let bytes = encode(audio)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::StereoFrame;

    fn audio(frames: Vec<StereoFrame>) -> RenderedAudio {
        RenderedAudio { frames, sample_rate: 44100 }
    }

    #[test]
    fn header_is_canonical() {
        let bytes = encode(&audio(vec![StereoFrame::zero(); 10])).unwrap();
        assert_eq!(bytes.len(), 44 + 10 * 4);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 36 + 40);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(u16::from_le_bytes([bytes[20], bytes[21]]), 1); // PCM
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 2);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 44100);
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 44100 * 4);
        assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 40);
    }

    #[test]
    fn samples_are_clamped_and_scaled() {
        let frames = vec![
            StereoFrame { left: 2.0, right: -2.0 },
            StereoFrame { left: 0.5, right: -1.0 },
        ];
        let bytes = encode(&audio(frames)).unwrap();
        let pcm: Vec<i16> = bytes[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(pcm, vec![32767, -32767, 16383, -32767]);
    }

    #[test]
    fn write_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("karla.wav");
        write_file(&audio(vec![StereoFrame::mono(0.25); 4]), &path).unwrap();
        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.samples::<i16>().count(), 8);
    }
}
