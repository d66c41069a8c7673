use std::sync::Arc;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

/// One hit ringing out: a shared buffer played from the start at a fixed gain.
#[derive(Clone, Debug)]
pub struct Voice {
    buffer: Arc<SampleBuffer>,
    pos: usize,
    gain: f32,
}

impl Voice {
    pub fn new(buffer: Arc<SampleBuffer>, gain: f32) -> Self {
        Self { buffer, pos: 0, gain }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_finished(&self) -> bool {
        self.pos >= self.buffer.len()
    }

    /// Mix this voice into `out`, returning false once the buffer is exhausted.
    pub fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        let remaining = &self.buffer.data[self.pos.min(self.buffer.len())..];
        let n = remaining.len().min(out.len());
        for (frame, sample) in out[..n].iter_mut().zip(remaining) {
            *frame += sample.scaled(self.gain);
        }
        self.pos += n;
        !self.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixes_with_gain_and_finishes() {
        let buffer = Arc::new(SampleBuffer::from_mono([1.0, 0.5, 0.25]));
        let mut voice = Voice::new(buffer, 0.5);
        let mut out = [StereoFrame::zero(); 2];
        assert!(voice.render_into(&mut out));
        assert_eq!(out[0], StereoFrame::mono(0.5));
        assert_eq!(out[1], StereoFrame::mono(0.25));

        let mut out = [StereoFrame::zero(); 4];
        assert!(!voice.render_into(&mut out));
        assert_eq!(out[0], StereoFrame::mono(0.125));
        assert_eq!(out[1], StereoFrame::zero());
        assert!(voice.is_finished());
    }
}
