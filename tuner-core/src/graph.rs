//! # Tone Graph
//!
//! Sample-accurate scheduling of voices against the output clock.
//!
//! The graph counts every frame it renders, so "now" is simply
//! `frames_rendered / sample_rate`. A voice is started at the current frame
//! and stopped at a frame computed once from its duration; the caller's
//! thread timing never enters into it. When a voice reaches its stop frame it
//! is dropped from the graph, which releases all of its nodes, and its id is
//! reported on the ended channel.

use crossbeam_channel::Sender;

use crate::synth::{Voice, NODES_PER_VOICE};

/// Identifies a voice scheduled on a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

#[derive(Debug)]
struct ScheduledVoice {
    id: VoiceId,
    voice: Voice,
    stop_frame: u64,
}

/// The set of sounding voices plus the clock they are scheduled against.
#[derive(Debug)]
pub struct ToneGraph {
    sample_rate: u32,
    frame: u64,
    next_id: u64,
    voices: Vec<ScheduledVoice>,
    ended_tx: Sender<VoiceId>,
}

impl ToneGraph {
    pub fn new(sample_rate: u32, ended_tx: Sender<VoiceId>) -> Self {
        Self {
            sample_rate,
            frame: 0,
            next_id: 0,
            voices: Vec::new(),
            ended_tx,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current position of the output clock, in seconds.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    /// Frames rendered so far.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    /// Connects `voice` starting now and stopping `duration` seconds later.
    pub fn schedule(&mut self, voice: Voice, duration: f32) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;

        let length = (duration.max(0.0) as f64 * self.sample_rate as f64).round() as u64;
        let stop_frame = self.frame + length;
        log::debug!(
            target: "tuner::graph",
            "voice {} at {:.2} Hz: frames {}..{}",
            id.0, voice.frequency(), self.frame, stop_frame
        );

        self.voices.push(ScheduledVoice { id, voice, stop_frame });
        id
    }

    /// Mixes all sounding voices into an interleaved buffer and advances the
    /// clock by `out.len() / channels` frames.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let mut mixed = 0.0;
            for scheduled in self.voices.iter_mut() {
                if self.frame < scheduled.stop_frame {
                    mixed += scheduled.voice.next_sample();
                }
            }
            let mixed = mixed.clamp(-1.0, 1.0);
            frame.iter_mut().for_each(|s| *s = mixed);
            self.frame += 1;
        }
        self.release_finished();
    }

    /// Drops every voice whose stop frame has been reached.
    fn release_finished(&mut self) {
        let now = self.frame;
        let ended_tx = &self.ended_tx;
        self.voices.retain(|scheduled| {
            if scheduled.stop_frame > now {
                return true;
            }
            // The receiver may already be gone during shutdown.
            let _ = ended_tx.send(scheduled.id);
            false
        });
    }

    /// Voices still connected to the graph.
    pub fn live_voices(&self) -> usize {
        self.voices.len()
    }

    /// Nodes still connected to the graph.
    pub fn live_nodes(&self) -> usize {
        self.voices.len() * NODES_PER_VOICE
    }
}
