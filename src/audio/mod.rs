use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::{AudioCommand, AudioOutput, PlayParams};
use crate::error::OutputError;

mod engine;
mod frame;
mod sample_buffer;
mod sample_id;
mod synth;
mod voice;

pub use engine::Engine;
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;
pub use sample_id::SampleId;
pub use synth::{FallbackKind, FallbackSpec, synthesize};

#[cfg(test)]
pub(crate) use sample_buffer::wav_bytes;

const COMMAND_QUEUE: usize = 1024;
const MAX_BLOCK_FRAMES: usize = 8192;

enum StreamControl {
    Resume(Sender<Result<(), OutputError>>),
    Shutdown,
}

/// Handle to the realtime output. The cpal stream lives on its own thread
/// (streams are not Send on every platform) and starts suspended until the
/// first `resume()`.
pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    control_tx: Sender<StreamControl>,
    sample_rate: u32,
    thread: Option<JoinHandle<()>>,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) -> bool {
        self.tx.try_send(cmd).is_ok()
    }
}

impl AudioOutput for AudioHandle {
    fn play(&self, params: PlayParams) -> bool {
        self.send(AudioCommand::Play(params))
    }

    fn resume(&self) -> Result<(), OutputError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.control_tx
            .send(StreamControl::Resume(reply_tx))
            .map_err(|_| OutputError::Disconnected)?;
        reply_rx
            .recv_timeout(Duration::from_secs(2))
            .map_err(|_| OutputError::Disconnected)?
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        let _ = self.control_tx.send(StreamControl::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);
    let (control_tx, control_rx) = crossbeam_channel::unbounded::<StreamControl>();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<anyhow::Result<u32>>(1);

    let thread = std::thread::Builder::new()
        .name("batuque-audio".into())
        .spawn(move || {
            let stream = match open_output_stream(rx) {
                Ok((stream, rate)) => {
                    let _ = ready_tx.send(Ok(rate));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            run_stream_control(&stream, control_rx);
        })
        .context("failed to spawn audio thread")?;

    let sample_rate = ready_rx
        .recv()
        .context("audio thread exited before opening a stream")??;

    Ok(AudioHandle {
        tx,
        control_tx,
        sample_rate,
        thread: Some(thread),
    })
}

fn run_stream_control(stream: &cpal::Stream, control_rx: Receiver<StreamControl>) {
    while let Ok(msg) = control_rx.recv() {
        match msg {
            StreamControl::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| OutputError::Device(e.to_string()));
                if result.is_ok() {
                    tracing::debug!("output stream resumed");
                }
                let _ = reply.send(result);
            }
            StreamControl::Shutdown => break,
        }
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn open_output_stream(rx: Receiver<AudioCommand>) -> anyhow::Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;
    tracing::info!(sample_rate, channels, "opening output stream");

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let stream = build_output_stream_f32(&device, &config.into(), rx, channels)?;
            // suspended until the first play, like a browser audio context
            let _ = stream.pause();
            Ok((stream, sample_rate))
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new();
    let mut scratch = vec![StereoFrame::zero(); MAX_BLOCK_FRAMES];

    let err_fn = |err| tracing::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            for chunk in data.chunks_mut(MAX_BLOCK_FRAMES * channels.max(1)) {
                let n_frames = chunk.len() / channels.max(1);
                let frames = &mut scratch[..n_frames];
                engine.render_block(frames);
                for (out, frame) in chunk.chunks_mut(channels.max(1)).zip(frames.iter()) {
                    match out {
                        [mono] => *mono = (frame.left + frame.right) * 0.5,
                        [l, r, rest @ ..] => {
                            *l = frame.left;
                            *r = frame.right;
                            rest.fill(0.0);
                        }
                        [] => {}
                    }
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
