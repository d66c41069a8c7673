// The step sequencer. `tick` is the synchronous body of one step; the
// PlaybackClock runs it on a tokio task at the session's tempo.
//
// Stopped -- start --> Running -- pause --> Paused -- start --> Running
//    ^                    |                   |
//    +------- stop -------+------- stop ------+

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::audio_api::AudioOutput;
use crate::core::{self, PlannedHit, TriggerEvent};
use crate::loader::SoundBank;
use crate::shared::{InstrumentStates, STEPS_PER_BEAT};

use super::session::{SharedSession, Session, clamp_bpm};
use super::tune::Variant;

/// One sixteenth note at the given tempo, in seconds.
pub fn step_secs(bpm: f32) -> f64 {
    60.0 / clamp_bpm(bpm) as f64 / STEPS_PER_BEAT as f64
}

pub fn step_interval(bpm: f32) -> Duration {
    Duration::from_secs_f64(step_secs(bpm))
}

/// Every hit one step of a variant makes. Instruments missing from `states`
/// or disabled there stay silent.
pub fn plan_step(
    variant: &Variant,
    step: usize,
    states: &InstrumentStates,
    master: u8,
    bank: &SoundBank,
) -> Vec<PlannedHit> {
    states
        .iter()
        .filter(|(_, state)| state.enabled)
        .filter_map(|(instrument, state)| {
            let c = variant.char_at(instrument, step)?;
            core::plan(bank, instrument, c, state.volume, master)
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub step: usize, // the step that just played
    pub next: usize,
    pub events: Vec<TriggerEvent>,
}

/// Play the step under the cursor and advance it, wrapping at the variant length.
/// Returns `None` when the session's variant does not exist.
pub fn tick(session: &mut Session, output: &dyn AudioOutput) -> Option<TickReport> {
    let variant = session.current_variant()?;
    let length = variant.effective_length();
    let step = session.cursor % length;

    let events = session
        .instruments
        .iter()
        .filter(|(_, state)| state.enabled)
        .filter_map(|(instrument, state)| {
            let c = variant.char_at(instrument, step)?;
            core::trigger(&session.sounds, output, instrument, c, state.volume, session.master_volume)
        })
        .collect();

    let next = (step + 1) % length;
    session.cursor = next;
    Some(TickReport { step, next, events })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
    Paused,
}

pub struct PlaybackClock {
    session: SharedSession,
    output: Arc<dyn AudioOutput>,
    steps_tx: watch::Sender<usize>,
    retime: Arc<Notify>,
    task: Option<JoinHandle<()>>,
    state: ClockState,
}

fn read_tempo(session: &SharedSession) -> f32 {
    session.read().unwrap_or_else(PoisonError::into_inner).tempo
}

impl PlaybackClock {
    pub fn new(session: SharedSession, output: Arc<dyn AudioOutput>) -> Self {
        let (steps_tx, _) = watch::channel(0);
        Self {
            session,
            output,
            steps_tx,
            retime: Arc::new(Notify::new()),
            task: None,
            state: ClockState::Stopped,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.steps_tx.subscribe()
    }

    /// Publish the cursor without ticking, e.g. after a variant switch.
    /// Call it while holding the session's write lock so no tick can interleave.
    pub fn publish(&self, step: usize) {
        self.steps_tx.send_replace(step);
    }

    /// Change the tempo and restart the step being waited on at the new interval.
    pub fn set_tempo(&self, bpm: f32) {
        self.session.write().unwrap_or_else(PoisonError::into_inner).set_tempo(bpm);
        self.retime.notify_one();
    }

    /// Must be called from within a tokio runtime. No-op while running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let session = Arc::clone(&self.session);
        let output = Arc::clone(&self.output);
        let steps_tx = self.steps_tx.clone();
        let retime = Arc::clone(&self.retime);
        let epoch = session.read().unwrap_or_else(PoisonError::into_inner).epoch;

        self.task = Some(tokio::spawn(async move {
            loop {
                let mut deadline = Instant::now() + step_interval(read_tempo(&session));
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        _ = retime.notified() => {
                            deadline = Instant::now() + step_interval(read_tempo(&session));
                        }
                    }
                }

                let mut guard = session.write().unwrap_or_else(PoisonError::into_inner);
                // paused or stopped while this step was waiting for the lock
                if guard.epoch != epoch {
                    return;
                }
                match tick(&mut guard, output.as_ref()) {
                    Some(report) => {
                        steps_tx.send_replace(report.next);
                    }
                    None => tracing::warn!("selected variant is gone, skipping step"),
                }
                drop(guard);
            }
        }));
        self.state = ClockState::Running;
        tracing::debug!("clock started");
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    // A tick already holding the lock finishes first; any later one sees the
    // bumped epoch and exits instead of playing.
    pub fn pause(&mut self) {
        self.abort_task();
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        session.epoch = session.epoch.wrapping_add(1);
        drop(session);
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.abort_task();
        {
            let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
            session.epoch = session.epoch.wrapping_add(1);
            session.cursor = 0;
            self.steps_tx.send_replace(0);
        }
        self.state = ClockState::Stopped;
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        self.abort_task();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::audio_api::PlayParams;
    use crate::loader::SoundSource;
    use crate::pipeline::notation::Articulation;
    use crate::pipeline::test_fixture::RecordingOutput;
    use crate::pipeline::tune::Tune;
    use crate::shared::{Instrument, InstrumentState};

    fn session_with(channels: &[(Instrument, &str)], tempo: f32) -> Session {
        let tune = Tune::custom("t", tempo, channels.iter().map(|(i, n)| (*i, n.to_string())));
        let mut session = Session::new(tune);
        session.sounds = Arc::new(SoundBank::fallback_only(8000));
        session
    }

    #[test]
    fn interval_is_a_sixteenth_note() {
        assert_eq!(step_interval(120.0), Duration::from_millis(125));
        assert_eq!(step_interval(60.0), Duration::from_millis(250));
        assert_eq!(step_interval(1000.0), step_interval(300.0));
    }

    #[test]
    fn quarter_notes_fire_on_every_fourth_step() {
        let mut session = session_with(&[(Instrument::Ls, "X   X   X   X   ")], 120.0);
        let output = RecordingOutput::new(8000);
        let mut fired = Vec::new();
        for _ in 0..16 {
            let report = tick(&mut session, &output).unwrap();
            for event in &report.events {
                assert_eq!(event.articulation, Articulation::Standard);
                assert_eq!(event.source, SoundSource::Synth(Instrument::Ls));
                fired.push(report.step);
            }
        }
        assert_eq!(fired, vec![0, 4, 8, 12]);
        assert_eq!(session.cursor, 0);
    }

    #[test]
    fn disabled_and_unlisted_instruments_are_silent() {
        let mut session = session_with(&[(Instrument::Sn, "X"), (Instrument::Ag, "a"), (Instrument::Re, "X")], 120.0);
        session.instruments.set_enabled(Instrument::Sn, false);
        session.instruments = session
            .instruments
            .iter()
            .filter(|(i, _)| *i != Instrument::Re)
            .collect();
        let output = RecordingOutput::new(8000);
        let report = tick(&mut session, &output).unwrap();
        let played: Vec<_> = report.events.iter().map(|e| e.instrument).collect();
        assert_eq!(played, vec![Instrument::Ag]);
    }

    #[test]
    fn volume_changes_apply_on_the_next_step() {
        let mut session = session_with(&[(Instrument::Sn, "XX")], 120.0);
        session.master_volume = 50;
        session.instruments.insert(Instrument::Sn, InstrumentState::new(true, 80));
        let output = RecordingOutput::new(8000);
        let first = tick(&mut session, &output).unwrap();
        assert!((first.events[0].gain - 0.4).abs() < 1e-6);
        session.master_volume = 0;
        let second = tick(&mut session, &output).unwrap();
        assert_eq!(second.events[0].gain, 0.0);
    }

    #[test]
    fn missing_variant_does_not_tick() {
        let mut session = session_with(&[(Instrument::Ls, "X")], 120.0);
        session.variant = "Break 9".into();
        assert!(tick(&mut session, &RecordingOutput::new(8000)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cursor_wraps_and_publishes_each_step() {
        let session = Arc::new(std::sync::RwLock::new(session_with(&[(Instrument::Ls, "X   X   X   X   ")], 120.0)));
        let output = Arc::new(RecordingOutput::new(8000));
        let mut clock = PlaybackClock::new(Arc::clone(&session), output.clone());
        let mut steps = clock.subscribe();

        clock.start();
        let mut seen = Vec::new();
        for _ in 0..16 {
            steps.changed().await.unwrap();
            seen.push(*steps.borrow_and_update());
        }
        let expected: Vec<usize> = (1..16).chain([0]).collect();
        assert_eq!(seen, expected);
        assert_eq!(output.hits().len(), 4);

        clock.pause();
        assert_eq!(clock.state(), ClockState::Paused);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(output.hits().len(), 4);

        clock.stop();
        assert_eq!(*steps.borrow(), 0);
        assert_eq!(session.read().unwrap().cursor, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn steps_are_an_interval_apart() {
        let session = Arc::new(std::sync::RwLock::new(session_with(&[(Instrument::Ls, "X")], 120.0)));
        let mut clock = PlaybackClock::new(Arc::clone(&session), Arc::new(RecordingOutput::new(8000)));
        let mut steps = clock.subscribe();

        let started = tokio::time::Instant::now();
        clock.start();
        steps.changed().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(125));
        steps.changed().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(250));

        // the step already waiting keeps its interval, the one after slows down
        session.write().unwrap().set_tempo(60.0);
        steps.changed().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(375));
        steps.changed().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(625));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_keeps_the_cursor() {
        let session = Arc::new(std::sync::RwLock::new(session_with(&[(Instrument::Ls, "X")], 120.0)));
        let mut clock = PlaybackClock::new(Arc::clone(&session), Arc::new(RecordingOutput::new(8000)));
        let mut steps = clock.subscribe();
        clock.start();
        for _ in 0..3 {
            steps.changed().await.unwrap();
        }
        clock.pause();
        clock.pause();
        assert_eq!(session.read().unwrap().cursor, 3);
        clock.start();
        steps.changed().await.unwrap();
        assert_eq!(*steps.borrow(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn tempo_change_restarts_the_wait() {
        let session = Arc::new(std::sync::RwLock::new(session_with(&[(Instrument::Ls, "X")], 20.0)));
        let mut clock = PlaybackClock::new(Arc::clone(&session), Arc::new(RecordingOutput::new(8000)));
        let mut steps = clock.subscribe();

        let started = tokio::time::Instant::now();
        clock.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        // 750 ms steps at 20 bpm; the faster tempo takes over at once
        clock.set_tempo(300.0);
        steps.changed().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(150));
        steps.changed().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(200));
        assert_eq!(session.read().unwrap().tempo, 300.0);
    }

    // play() blocks long enough that stop() lands while a tick holds the session
    #[derive(Default)]
    struct SlowOutput {
        started: AtomicUsize,
    }

    impl AudioOutput for SlowOutput {
        fn play(&self, _params: PlayParams) -> bool {
            self.started.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            true
        }

        fn sample_rate(&self) -> u32 {
            8000
        }
    }

    async fn wait_for_first_hit(output: &SlowOutput) {
        while output.started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_during_a_tick_still_ends_at_zero() {
        let every_step = "XXXXXXXXXXXXXXXX";
        let session = Arc::new(std::sync::RwLock::new(session_with(&[(Instrument::Ls, every_step)], 300.0)));
        let output = Arc::new(SlowOutput::default());
        let mut clock = PlaybackClock::new(Arc::clone(&session), output.clone());
        let steps = clock.subscribe();

        clock.start();
        wait_for_first_hit(&output).await;
        clock.stop();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*steps.borrow(), 0);
        assert_eq!(session.read().unwrap().cursor, 0);
        assert_eq!(output.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pause_during_a_tick_keeps_that_step() {
        let every_step = "XXXXXXXXXXXXXXXX";
        let session = Arc::new(std::sync::RwLock::new(session_with(&[(Instrument::Ls, every_step)], 300.0)));
        let output = Arc::new(SlowOutput::default());
        let mut clock = PlaybackClock::new(Arc::clone(&session), output.clone());
        let steps = clock.subscribe();

        clock.start();
        wait_for_first_hit(&output).await;
        clock.pause();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*steps.borrow(), 1);
        assert_eq!(session.read().unwrap().cursor, 1);
        assert_eq!(output.started.load(Ordering::SeqCst), 1);
    }
}
