//! # Synthesis Nodes
//!
//! The three processing stages of a reference tone:
//! sawtooth oscillator -> lowpass filter -> fixed gain.
//!
//! A raw sawtooth is rich in harmonics and sounds harsh; the lowpass stage
//! rolls those off towards a plucked-string colour and the gain stage keeps
//! the level comfortable regardless of the system volume.

use std::f32::consts::PI;

/// Cutoff of the lowpass stage in Hz.
pub const FILTER_CUTOFF_HZ: f32 = 2000.0;

/// Output level of the gain stage (fraction of full scale).
pub const VOLUME_LEVEL: f32 = 0.3;

/// Number of nodes a voice connects into the graph.
pub const NODES_PER_VOICE: usize = 3;

/// Band-limited sawtooth oscillator.
///
/// Uses a PolyBLEP correction around the ramp reset so the discontinuity
/// does not alias back into the audible band.
#[derive(Debug, Clone)]
pub struct SawtoothOscillator {
    frequency: f32,
    phase: f32,
    phase_increment: f32,
}

impl SawtoothOscillator {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            frequency,
            phase: 0.0,
            phase_increment: frequency / sample_rate,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Produces the next sample in [-1, 1] and advances the phase.
    pub fn next_sample(&mut self) -> f32 {
        let naive = 2.0 * self.phase - 1.0;
        let sample = naive - poly_blep(self.phase, self.phase_increment);

        self.phase += self.phase_increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

/// Polynomial correction applied within one sample of the reset.
fn poly_blep(t: f32, dt: f32) -> f32 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

/// Single-pole lowpass filter.
#[derive(Debug, Clone)]
pub struct LowpassFilter {
    cutoff: f32,
    coefficient: f32,
    state: f32,
}

impl LowpassFilter {
    pub fn new(cutoff: f32, sample_rate: f32) -> Self {
        // Keep the pole below Nyquist so the filter stays stable at low rates.
        let cutoff = cutoff.min(sample_rate * 0.45);
        let coefficient = 1.0 - (-2.0 * PI * cutoff / sample_rate).exp();
        Self {
            cutoff,
            coefficient,
            state: 0.0,
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn process(&mut self, input: f32) -> f32 {
        self.state += self.coefficient * (input - self.state);
        self.state
    }
}

/// Fixed amplitude stage.
#[derive(Debug, Clone)]
pub struct GainStage {
    level: f32,
}

impl GainStage {
    pub fn new(level: f32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn process(&self, input: f32) -> f32 {
        input * self.level
    }
}

/// One complete tone: the three nodes wired in series.
#[derive(Debug, Clone)]
pub struct Voice {
    oscillator: SawtoothOscillator,
    filter: LowpassFilter,
    gain: GainStage,
}

impl Voice {
    /// Builds the fixed guitar-like chain at `frequency`.
    pub fn guitar(frequency: f32, sample_rate: f32) -> Self {
        Self {
            oscillator: SawtoothOscillator::new(frequency, sample_rate),
            filter: LowpassFilter::new(FILTER_CUTOFF_HZ, sample_rate),
            gain: GainStage::new(VOLUME_LEVEL),
        }
    }

    pub fn frequency(&self) -> f32 {
        self.oscillator.frequency()
    }

    pub fn next_sample(&mut self) -> f32 {
        let raw = self.oscillator.next_sample();
        let filtered = self.filter.process(raw);
        self.gain.process(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 48_000.0;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn sawtooth_stays_in_range_and_repeats_at_its_period() {
        let mut osc = SawtoothOscillator::new(100.0, RATE);
        let samples: Vec<f32> = (0..4800).map(|_| osc.next_sample()).collect();
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));

        // 100 Hz at 48 kHz: one rising zero crossing every 480 samples.
        let crossings = samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        assert_eq!(crossings, 10);
    }

    #[test]
    fn lowpass_settles_on_dc() {
        let mut filter = LowpassFilter::new(FILTER_CUTOFF_HZ, RATE);
        let mut out = 0.0;
        for _ in 0..1000 {
            out = filter.process(1.0);
        }
        assert!((out - 1.0).abs() < 1e-3);
    }

    #[test]
    fn lowpass_attenuates_content_above_cutoff() {
        let mut filter = LowpassFilter::new(FILTER_CUTOFF_HZ, RATE);
        // Alternating samples are the Nyquist frequency.
        let out: Vec<f32> = (0..2000)
            .map(|i| filter.process(if i % 2 == 0 { 1.0 } else { -1.0 }))
            .collect();
        assert!(peak(&out[1000..]) < 0.2);
    }

    #[test]
    fn lowpass_cutoff_is_capped_below_nyquist() {
        let filter = LowpassFilter::new(FILTER_CUTOFF_HZ, 2000.0);
        assert!(filter.cutoff() < 1000.0);
    }

    /// Steady-state peak of a unit sine at `frequency` after the filter.
    fn sine_response(frequency: f32) -> f32 {
        let mut filter = LowpassFilter::new(FILTER_CUTOFF_HZ, RATE);
        let out: Vec<f32> = (0..RATE as usize)
            .map(|i| filter.process((2.0 * PI * frequency * i as f32 / RATE).sin()))
            .collect();
        peak(&out[RATE as usize / 2..])
    }

    #[test]
    fn lowpass_is_three_db_down_at_cutoff() {
        let gain = sine_response(FILTER_CUTOFF_HZ);
        assert!((gain - 0.707).abs() < 0.02, "gain at cutoff was {gain}");
    }

    #[test]
    fn lowpass_passes_low_strings_nearly_unchanged() {
        let gain = sine_response(200.0);
        assert!(gain > 0.98, "gain at 200 Hz was {gain}");
    }

    #[test]
    fn gain_stage_scales_to_volume_level() {
        let gain = GainStage::new(VOLUME_LEVEL);
        assert_eq!(gain.process(1.0), 0.3);
        assert_eq!(gain.process(-1.0), -0.3);
    }

    #[test]
    fn voice_peaks_at_gain_level() {
        let mut voice = Voice::guitar(82.41, RATE);
        let out: Vec<f32> = (0..RATE as usize).map(|_| voice.next_sample()).collect();
        let peak = peak(&out);
        assert!((peak - VOLUME_LEVEL).abs() < 0.01, "voice peak was {peak}");
        assert!(peak <= VOLUME_LEVEL + 1e-4);
    }

    #[test]
    fn voice_keeps_requested_frequency() {
        let voice = Voice::guitar(329.63, RATE);
        assert_eq!(voice.frequency(), 329.63);
    }
}
