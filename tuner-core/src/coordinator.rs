//! # Activation Coordinator
//!
//! Turns string activations (pointer or keyboard) into tone requests and
//! keeps the "playing" indicator on at most one string.
//!
//! Every activation gets a sequence number. The indicator belongs to the
//! latest successful activation; a later activation takes it over at once,
//! and a deferred clear only acts if its sequence number is still the
//! current one. Clearing the indicator never stops a tone that is already
//! sounding: tones are fire-and-forget and may overlap acoustically.

use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::audio::OutputBackend;
use crate::engine::{clamp_duration, ToneEngine};
use crate::error::Notice;
use crate::strings::StringId;

/// Status line shown while nothing is playing.
pub const IDLE_PROMPT: &str = "Click or press Enter on a string to play its note";

/// Something that can sound a tone. Implemented by [`ToneEngine`].
pub trait TonePlayer {
    /// Starts a tone; `false` if nothing could be played.
    fn play_tone(&mut self, frequency: f32, duration: f32) -> bool;

    /// Releases bookkeeping for tones that have ended.
    fn reap_finished(&mut self) {}
}

impl<B: OutputBackend> TonePlayer for ToneEngine<B> {
    fn play_tone(&mut self, frequency: f32, duration: f32) -> bool {
        ToneEngine::play_tone(self, frequency, duration).is_some()
    }

    fn reap_finished(&mut self) {
        self.collect_finished();
    }
}

/// Visual state of one string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Playing,
}

/// The string currently showing the playing indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveVoice {
    pub string: StringId,
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingClear {
    sequence: u64,
    due: Instant,
}

pub struct ActivationCoordinator<P: TonePlayer> {
    player: P,
    active: Option<ActiveVoice>,
    pending: Vec<PendingClear>,
    next_sequence: u64,
    status: String,
    notices: Sender<Notice>,
}

impl<P: TonePlayer> ActivationCoordinator<P> {
    pub fn new(player: P, notices: Sender<Notice>) -> Self {
        let coordinator = Self {
            player,
            active: None,
            pending: Vec::new(),
            next_sequence: 1,
            status: IDLE_PROMPT.to_string(),
            notices,
        };
        coordinator.publish_status();
        coordinator
    }

    /// Handles one activation of `string` with the selected duration.
    ///
    /// The previous indicator is cleared immediately. Returns the new
    /// activation's sequence number, or `None` if the tone could not start,
    /// in which case no string is marked as playing.
    pub fn activate(&mut self, string: StringId, duration: f32, now: Instant) -> Option<u64> {
        let definition = string.definition();

        if let Some(previous) = self.active.take() {
            log::debug!(
                target: "tuner::coordinator",
                "{} superseded by {} (activation {})",
                previous.string, string, previous.sequence
            );
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if !self.player.play_tone(definition.frequency, duration) {
            log::warn!(target: "tuner::coordinator", "{} could not be played", string);
            self.set_status(IDLE_PROMPT.to_string());
            return None;
        }

        self.active = Some(ActiveVoice { string, sequence });
        self.set_status(definition.playing_message());

        let hold = Duration::from_secs_f32(clamp_duration(duration));
        self.pending.push(PendingClear { sequence, due: now + hold });
        Some(sequence)
    }

    /// Runs the deferred clears that are due at `now`.
    pub fn poll(&mut self, now: Instant) {
        self.player.reap_finished();

        let mut due = Vec::new();
        self.pending.retain(|clear| {
            if clear.due <= now {
                due.push(clear.sequence);
                false
            } else {
                true
            }
        });

        for sequence in due {
            // A newer activation owns the indicator; this clear is stale.
            if self.active.map(|a| a.sequence) != Some(sequence) {
                continue;
            }
            if let Some(finished) = self.active.take() {
                log::debug!(target: "tuner::coordinator", "{} back to idle", finished.string);
            }
            self.set_status(IDLE_PROMPT.to_string());
        }
    }

    pub fn state_of(&self, string: StringId) -> VoiceState {
        match self.active {
            Some(active) if active.string == string => VoiceState::Playing,
            _ => VoiceState::Idle,
        }
    }

    pub fn active(&self) -> Option<ActiveVoice> {
        self.active
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Deferred clears not yet fired, including stale ones.
    pub fn pending_clears(&self) -> usize {
        self.pending.len()
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    fn set_status(&mut self, status: String) {
        if self.status != status {
            self.status = status;
            self.publish_status();
        }
    }

    fn publish_status(&self) {
        let _ = self.notices.send(Notice::Status(self.status.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::FakeBackend;
    use crossbeam_channel::{unbounded, Receiver};

    /// Records every request instead of making sound.
    #[derive(Default)]
    struct RecordingPlayer {
        played: Vec<(f32, f32)>,
        fail: bool,
        reaped: usize,
    }

    impl TonePlayer for RecordingPlayer {
        fn play_tone(&mut self, frequency: f32, duration: f32) -> bool {
            if self.fail {
                return false;
            }
            self.played.push((frequency, duration));
            true
        }

        fn reap_finished(&mut self) {
            self.reaped += 1;
        }
    }

    fn coordinator() -> (ActivationCoordinator<RecordingPlayer>, Receiver<Notice>) {
        let (tx, rx) = unbounded();
        (ActivationCoordinator::new(RecordingPlayer::default(), tx), rx)
    }

    fn statuses(rx: &Receiver<Notice>) -> Vec<String> {
        rx.try_iter()
            .filter_map(|n| match n {
                Notice::Status(s) => Some(s),
                Notice::Error(_) => None,
            })
            .collect()
    }

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn starts_idle_with_prompt() {
        let (coordinator, rx) = coordinator();
        assert_eq!(coordinator.status(), IDLE_PROMPT);
        assert_eq!(statuses(&rx), vec![IDLE_PROMPT.to_string()]);
        assert!(StringId::ALL.iter().all(|s| coordinator.state_of(*s) == VoiceState::Idle));
    }

    #[test]
    fn single_activation_plays_then_returns_to_idle() {
        let (mut coordinator, rx) = coordinator();
        let t0 = Instant::now();
        statuses(&rx);

        coordinator.activate(StringId::E2, 2.0, t0).unwrap();
        assert_eq!(coordinator.player().played, vec![(82.41, 2.0)]);
        assert_eq!(coordinator.state_of(StringId::E2), VoiceState::Playing);
        assert_eq!(coordinator.status(), "Playing E2 (82.41 Hz)");

        coordinator.poll(t0 + secs(1.999));
        assert_eq!(coordinator.state_of(StringId::E2), VoiceState::Playing);
        assert_eq!(coordinator.status(), "Playing E2 (82.41 Hz)");

        coordinator.poll(t0 + secs(2.0));
        assert_eq!(coordinator.state_of(StringId::E2), VoiceState::Idle);
        assert_eq!(coordinator.status(), IDLE_PROMPT);
        assert_eq!(
            statuses(&rx),
            vec!["Playing E2 (82.41 Hz)".to_string(), IDLE_PROMPT.to_string()]
        );
    }

    #[test]
    fn new_activation_clears_previous_indicator_immediately() {
        let (mut coordinator, _rx) = coordinator();
        let t0 = Instant::now();

        coordinator.activate(StringId::A2, 5.0, t0).unwrap();
        coordinator.activate(StringId::B3, 5.0, t0).unwrap();

        assert_eq!(coordinator.state_of(StringId::A2), VoiceState::Idle);
        assert_eq!(coordinator.state_of(StringId::B3), VoiceState::Playing);
        assert_eq!(coordinator.status(), "Playing B3 (246.94 Hz)");
        // Both tones were requested; neither was stopped.
        assert_eq!(coordinator.player().played.len(), 2);
    }

    #[test]
    fn stale_clear_does_not_touch_newer_activation() {
        let (mut coordinator, _rx) = coordinator();
        let t0 = Instant::now();

        coordinator.activate(StringId::D3, 1.0, t0).unwrap();
        coordinator.activate(StringId::G3, 3.0, t0 + secs(0.5)).unwrap();

        coordinator.poll(t0 + secs(1.0));
        assert_eq!(coordinator.state_of(StringId::G3), VoiceState::Playing);
        assert_eq!(coordinator.status(), "Playing G3 (196.00 Hz)");

        coordinator.poll(t0 + secs(3.5));
        assert_eq!(coordinator.active(), None);
        assert_eq!(coordinator.status(), IDLE_PROMPT);
        assert_eq!(coordinator.pending_clears(), 0);
    }

    #[test]
    fn reactivating_same_string_extends_its_indicator() {
        let (mut coordinator, _rx) = coordinator();
        let t0 = Instant::now();

        let first = coordinator.activate(StringId::E4, 2.0, t0).unwrap();
        let second = coordinator.activate(StringId::E4, 2.0, t0 + secs(1.0)).unwrap();
        assert!(second > first);

        coordinator.poll(t0 + secs(2.0));
        assert_eq!(coordinator.state_of(StringId::E4), VoiceState::Playing);

        coordinator.poll(t0 + secs(3.0));
        assert_eq!(coordinator.state_of(StringId::E4), VoiceState::Idle);
    }

    #[test]
    fn indicator_timer_uses_clamped_duration() {
        let (mut coordinator, _rx) = coordinator();
        let t0 = Instant::now();

        coordinator.activate(StringId::A2, 90.0, t0).unwrap();
        coordinator.poll(t0 + secs(30.0));
        assert_eq!(coordinator.state_of(StringId::A2), VoiceState::Idle);

        coordinator.activate(StringId::A2, -1.0, t0).unwrap();
        coordinator.poll(t0);
        assert_eq!(coordinator.state_of(StringId::A2), VoiceState::Idle);
    }

    #[test]
    fn failed_tone_shows_no_playing_status() {
        let (mut coordinator, rx) = coordinator();
        coordinator.player_mut().fail = true;
        let t0 = Instant::now();

        assert!(coordinator.activate(StringId::E2, 2.0, t0).is_none());
        assert_eq!(coordinator.active(), None);
        assert_eq!(coordinator.pending_clears(), 0);
        assert!(statuses(&rx).iter().all(|s| !s.starts_with("Playing")));
    }

    #[test]
    fn failed_tone_still_clears_previous_indicator() {
        let (mut coordinator, _rx) = coordinator();
        let t0 = Instant::now();
        coordinator.activate(StringId::E2, 2.0, t0).unwrap();

        coordinator.player_mut().fail = true;
        assert!(coordinator.activate(StringId::A2, 2.0, t0).is_none());
        assert_eq!(coordinator.state_of(StringId::E2), VoiceState::Idle);
        assert_eq!(coordinator.status(), IDLE_PROMPT);
    }

    #[test]
    fn poll_reaps_finished_tones() {
        let (mut coordinator, _rx) = coordinator();
        coordinator.poll(Instant::now());
        coordinator.poll(Instant::now());
        assert_eq!(coordinator.player().reaped, 2);
    }

    #[test]
    fn e2_scenario_with_real_engine() {
        let (tx, rx) = unbounded();
        let engine = ToneEngine::new(FakeBackend::working(), tx.clone());
        let mut coordinator = ActivationCoordinator::new(engine, tx);
        let t0 = Instant::now();

        coordinator.activate(StringId::E2, 2.0, t0).unwrap();
        assert_eq!(coordinator.status(), "Playing E2 (82.41 Hz)");

        // Offline context runs at 1000 Hz: render the full two seconds.
        let mut buffer = vec![0.0; 2000];
        coordinator.player().context().unwrap().render(&mut buffer, 1);
        coordinator.poll(t0 + secs(2.0));

        assert_eq!(coordinator.state_of(StringId::E2), VoiceState::Idle);
        assert_eq!(coordinator.status(), IDLE_PROMPT);
        assert_eq!(coordinator.player().context().unwrap().live_nodes(), 0);
        assert!(rx.try_iter().all(|n| !matches!(n, Notice::Error(_))));
    }

    #[test]
    fn repeated_activations_leave_no_residual_nodes() {
        let (tx, rx) = unbounded();
        let engine = ToneEngine::new(FakeBackend::working(), tx.clone());
        let mut coordinator = ActivationCoordinator::new(engine, tx);
        let mut now = Instant::now();

        for _ in 0..4 {
            coordinator.activate(StringId::G3, 1.0, now).unwrap();
            let mut buffer = vec![0.0; 1000];
            coordinator.player().context().unwrap().render(&mut buffer, 1);
            now += secs(1.0);
            coordinator.poll(now);
        }

        assert_eq!(coordinator.player().context().unwrap().live_nodes(), 0);
        assert_eq!(coordinator.status(), IDLE_PROMPT);
        assert_eq!(statuses(&rx).last().map(String::as_str), Some(IDLE_PROMPT));
    }

    #[test]
    fn missing_output_reports_once_and_never_plays() {
        let (tx, rx) = unbounded();
        let engine = ToneEngine::new(FakeBackend::missing(), tx.clone());
        let mut coordinator = ActivationCoordinator::new(engine, tx);
        let t0 = Instant::now();

        for string in StringId::ALL {
            assert!(coordinator.activate(string, 2.0, t0).is_none());
        }

        let notices: Vec<Notice> = rx.try_iter().collect();
        let errors = notices.iter().filter(|n| matches!(n, Notice::Error(_))).count();
        assert_eq!(errors, 1);
        assert!(notices
            .iter()
            .all(|n| !matches!(n, Notice::Status(s) if s.starts_with("Playing"))));
    }
}
