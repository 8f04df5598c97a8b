use log::debug;

use crate::config::{AnalyzerConfig, MAX_REFERENCE, MIN_REFERENCE, OutputUnit, Resolution};
use crate::error::{AnalyzerError, Result};

/// Number of musical bins: every equal-temperament note across ~8.5 octaves,
/// one octave below the piano range through two octaves above it.
pub const MUSICAL_BINS: usize = 128;

/// Finite decibel level reported for a magnitude of exactly zero. Sits below
/// anything a positive `f32` magnitude can produce against the clamped
/// reference range, so ordering against real levels stays consistent.
pub const MIN_DB_LEVEL: f32 = -1000.0;

/// Note-center frequencies in Hz, strictly increasing.
///
/// Indices 12..24 seed one equal-temperament octave starting at A0 = 27.5 Hz;
/// indices 0..12 halve those, and everything from 24 up doubles the value
/// twelve slots earlier.
pub fn musical_frequencies() -> [f32; MUSICAL_BINS] {
    let mut freqs = [0.0f32; MUSICAL_BINS];

    let seed_octave: [f32; 12] = [
        27.5,    // A0
        29.1352, // A#0
        30.8677, // B0
        32.7032, // C1
        34.6478, // C#1
        36.7081, // D1
        38.8909, // D#1
        41.2034, // E1
        43.6535, // F1
        46.2493, // F#1
        48.9994, // G1
        51.9131, // G#1
    ];
    freqs[12..24].copy_from_slice(&seed_octave);

    for i in 0..12 {
        freqs[i] = freqs[i + 12] / 2.0;
    }
    for i in 24..MUSICAL_BINS {
        freqs[i] = freqs[i - 12] * 2.0;
    }

    freqs
}

/// Critically damped ease of `current` toward `target`, carrying spring
/// velocity between calls. `smooth_time` is the lag in seconds.
fn smooth_damp(current: f32, target: f32, velocity: &mut f32, smooth_time: f32, dt: f32) -> f32 {
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;

    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    let mut output = target + (change + temp) * exp;

    // don't overshoot the target
    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = (output - target) / dt;
    }

    output
}

/// Resamples a raw FFT magnitude spectrum onto the 128 musical bins,
/// converts to the configured unit, applies fast-attack/slow-release
/// smoothing per bin and to the aggregate loudness, and reports
/// dominant-frequency changes above the configured threshold.
///
/// Owned and driven by the host: call [`SpectrumAnalyzer::process`] once per
/// tick with a fresh magnitude buffer, then read the accessors.
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
    frequencies: [f32; MUSICAL_BINS],

    /// This tick's converted (pre-smoothing) levels.
    raw_levels: [f32; MUSICAL_BINS],
    previous_levels: [f32; MUSICAL_BINS],
    smoothed_levels: [f32; MUSICAL_BINS],
    velocities: [f32; MUSICAL_BINS],

    raw_overall: f32,
    previous_overall: f32,
    smoothed_overall: f32,
    overall_velocity: f32,

    /// Last *reported* dominant frequency, not last candidate.
    dominant: Option<f32>,
    pending_change: Option<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(mut config: AnalyzerConfig) -> Self {
        config.sanitize();
        Self {
            config,
            frequencies: musical_frequencies(),
            raw_levels: [0.0; MUSICAL_BINS],
            previous_levels: [0.0; MUSICAL_BINS],
            smoothed_levels: [0.0; MUSICAL_BINS],
            velocities: [0.0; MUSICAL_BINS],
            raw_overall: 0.0,
            previous_overall: 0.0,
            smoothed_overall: 0.0,
            overall_velocity: 0.0,
            dominant: None,
            pending_change: None,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Switch the expected raw-spectrum length. Idempotent; safe to call at
    /// any tick boundary, including mid-stream. The frequency-to-index
    /// mapping follows automatically on the next `process` call because it
    /// is derived from the resolution and the driving sample rate.
    pub fn configure(&mut self, resolution: Resolution) {
        if self.config.resolution != resolution {
            debug!(
                "spectrum resolution changed: {} -> {} samples",
                self.config.resolution.samples(),
                resolution.samples()
            );
            self.config.resolution = resolution;
        }
    }

    /// Replace the whole configuration. Tunables are clamped into their
    /// working ranges; smoothing state is carried over.
    pub fn set_config(&mut self, mut config: AnalyzerConfig) {
        config.sanitize();
        self.configure(config.resolution);
        self.config = config;
    }

    /// Run one analysis tick over a fresh magnitude buffer.
    ///
    /// `spectrum` must be exactly as long as the configured resolution;
    /// `sample_rate` is the driving rate in Hz, from which the Nyquist bin
    /// increment is recomputed every tick. On a length mismatch all
    /// persisted state is left untouched.
    pub fn process(&mut self, spectrum: &[f32], sample_rate: f32) -> Result<()> {
        let expected = self.config.resolution.samples();
        if spectrum.len() != expected {
            return Err(AnalyzerError::InvalidInput(format!(
                "spectrum length {} does not match configured resolution {expected}",
                spectrum.len()
            )));
        }

        let increment = (sample_rate / 2.0) / expected as f32;
        let dt = self.config.update_interval_ms.max(1) as f32 / 1000.0;
        let smoothing = self.config.smoothing;

        let mut sum_squares = 0.0f32;
        let mut max_level = f32::NEG_INFINITY;
        let mut peak_frequency = self.frequencies[0];

        for i in 0..MUSICAL_BINS {
            // Frequencies above Nyquist map past the end; clamp the index
            // rather than reading out of bounds.
            let index = ((self.frequencies[i] / increment).round() as usize).min(expected - 1);
            let magnitude = spectrum[index];

            let level = self.convert(magnitude);
            self.raw_levels[i] = level;

            if level < self.previous_levels[i] {
                // Falling: ease the held level toward zero, floored at the
                // new reading so the meter never lags under the signal.
                let eased = smooth_damp(
                    self.previous_levels[i],
                    0.0,
                    &mut self.velocities[i],
                    smoothing,
                    dt,
                );
                self.smoothed_levels[i] = eased.max(level);
            } else {
                // Rising: snap with zero lag.
                self.smoothed_levels[i] = level;
            }
            self.previous_levels[i] = self.smoothed_levels[i];

            sum_squares += magnitude * magnitude;

            if level > max_level {
                max_level = level;
                peak_frequency = self.frequencies[i];
            }
        }

        if max_level > self.config.threshold && self.dominant != Some(peak_frequency) {
            debug!("dominant frequency changed to {peak_frequency:.2} Hz");
            self.dominant = Some(peak_frequency);
            self.pending_change = Some(peak_frequency);
        }

        // Aggregate loudness: RMS over the raw magnitudes sampled at the
        // musical bins, converted once. Not an RMS of the converted levels.
        let rms = (sum_squares / MUSICAL_BINS as f32).sqrt();
        self.raw_overall = self.convert(rms);
        if self.raw_overall < self.previous_overall {
            let eased = smooth_damp(
                self.previous_overall,
                0.0,
                &mut self.overall_velocity,
                smoothing,
                dt,
            );
            self.smoothed_overall = eased.max(self.raw_overall);
        } else {
            self.smoothed_overall = self.raw_overall;
        }
        self.previous_overall = self.smoothed_overall;

        Ok(())
    }

    fn convert(&self, magnitude: f32) -> f32 {
        match self.config.output_unit {
            OutputUnit::Decibels => {
                let reference = self.config.reference_value.clamp(MIN_REFERENCE, MAX_REFERENCE);
                let db = if magnitude > 0.0 {
                    20.0 * (magnitude / reference).log10()
                } else {
                    MIN_DB_LEVEL
                };
                db * self.config.decibel_multiplier
            }
            OutputUnit::Voltage => magnitude * self.config.voltage_multiplier,
        }
    }

    /// Smoothed per-bin levels, stable between ticks.
    pub fn levels(&self) -> &[f32; MUSICAL_BINS] {
        &self.smoothed_levels
    }

    /// This tick's converted levels before smoothing.
    pub fn raw_levels(&self) -> &[f32; MUSICAL_BINS] {
        &self.raw_levels
    }

    /// Smoothed aggregate loudness.
    pub fn overall_level(&self) -> f32 {
        self.smoothed_overall
    }

    pub fn frequencies(&self) -> &[f32; MUSICAL_BINS] {
        &self.frequencies
    }

    /// Last reported dominant frequency in Hz.
    pub fn dominant_frequency(&self) -> Option<f32> {
        self.dominant
    }

    /// Drain the pending dominant-frequency change, if this or an earlier
    /// tick reported one. Changes are edge-triggered: a peak that stays on
    /// the same frequency is reported once.
    pub fn take_dominant_change(&mut self) -> Option<f32> {
        self.pending_change.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voltage_config() -> AnalyzerConfig {
        AnalyzerConfig {
            output_unit: OutputUnit::Voltage,
            ..AnalyzerConfig::default()
        }
    }

    fn constant_spectrum(value: f32) -> Vec<f32> {
        vec![value; Resolution::R2048.samples()]
    }

    #[test]
    fn frequency_table_spans_octaves() {
        let table = musical_frequencies();

        assert_eq!(table[12], 27.5);
        for i in 0..12 {
            assert_eq!(table[i], table[i + 12] / 2.0);
        }
        for i in 24..MUSICAL_BINS {
            assert_eq!(table[i], table[i - 12] * 2.0);
        }
        for pair in table.windows(2) {
            assert!(pair[0] < pair[1], "table must be strictly increasing");
        }
    }

    #[test]
    fn bin_index_mapping_follows_nyquist_increment() {
        // 2048 samples at 44.1 kHz: 440 Hz lands on round(440 / 10.7666) = 41.
        let mut analyzer = SpectrumAnalyzer::new(voltage_config());
        let mut spectrum = constant_spectrum(0.0);
        spectrum[41] = 1.0;

        analyzer.process(&spectrum, 44100.0).unwrap();

        // A4 sits at index 60 (27.5 Hz four octaves up).
        assert_eq!(analyzer.frequencies()[60], 440.0);
        assert_eq!(analyzer.raw_levels()[60], 1.0);
        assert_eq!(analyzer.dominant_frequency(), Some(440.0));
    }

    #[test]
    fn above_nyquist_bins_clamp_to_last_index() {
        let mut analyzer = SpectrumAnalyzer::new(voltage_config());
        let mut spectrum = constant_spectrum(0.0);
        *spectrum.last_mut().unwrap() = 0.25;

        // At 2 kHz nearly the whole table maps past the buffer end.
        analyzer.process(&spectrum, 2000.0).unwrap();
        assert_eq!(analyzer.raw_levels()[MUSICAL_BINS - 1], 0.25);
    }

    #[test]
    fn reference_magnitude_converts_to_zero_decibels() {
        let config = AnalyzerConfig::default();
        let reference = config.reference_value;
        let mut analyzer = SpectrumAnalyzer::new(config);

        analyzer.process(&constant_spectrum(reference), 44100.0).unwrap();
        for level in analyzer.raw_levels() {
            assert!(level.abs() < 1e-3);
        }
    }

    #[test]
    fn zero_magnitude_converts_to_finite_sentinel() {
        let mut analyzer = SpectrumAnalyzer::new(AnalyzerConfig::default());

        analyzer.process(&constant_spectrum(0.0), 44100.0).unwrap();
        for level in analyzer.raw_levels() {
            assert!(level.is_finite());
            assert_eq!(*level, MIN_DB_LEVEL);
        }
    }

    #[test]
    fn rising_levels_snap_without_lag() {
        let mut analyzer = SpectrumAnalyzer::new(voltage_config());

        for value in [0.1, 0.2, 0.3] {
            analyzer.process(&constant_spectrum(value), 44100.0).unwrap();
            for level in analyzer.levels() {
                assert_eq!(*level, value);
            }
        }
    }

    #[test]
    fn falling_levels_release_slowly_and_never_undershoot() {
        let mut analyzer = SpectrumAnalyzer::new(voltage_config());
        let inputs = [1.0, 0.8, 0.6, 0.4];
        let mut previous = f32::INFINITY;

        for value in inputs {
            analyzer.process(&constant_spectrum(value), 44100.0).unwrap();
            let level = analyzer.levels()[0];
            assert!(level <= previous, "release must be non-increasing");
            assert!(level >= value, "release must never drop under the signal");
            previous = level;
        }

        // With 180 ms of lag and 50 ms ticks, the release is still above
        // the final reading.
        assert!(previous > 0.4);
    }

    #[test]
    fn zero_smoothing_tracks_the_signal_exactly() {
        let mut config = voltage_config();
        config.smoothing = 0.0;
        let mut analyzer = SpectrumAnalyzer::new(config);

        for value in [1.0, 0.4, 0.1] {
            analyzer.process(&constant_spectrum(value), 44100.0).unwrap();
            assert_eq!(analyzer.levels()[0], value);
        }
    }

    #[test]
    fn dominant_change_is_edge_triggered() {
        let mut analyzer = SpectrumAnalyzer::new(voltage_config());
        let mut spectrum = constant_spectrum(0.0);
        spectrum[41] = 1.0;

        analyzer.process(&spectrum, 44100.0).unwrap();
        assert_eq!(analyzer.take_dominant_change(), Some(440.0));

        // Same peak again: no new report.
        analyzer.process(&spectrum, 44100.0).unwrap();
        assert_eq!(analyzer.take_dominant_change(), None);

        // Peak moves an octave up: reported once more.
        spectrum[41] = 0.0;
        spectrum[82] = 1.0;
        analyzer.process(&spectrum, 44100.0).unwrap();
        assert_eq!(analyzer.take_dominant_change(), Some(880.0));
    }

    #[test]
    fn quiet_peaks_stay_unreported() {
        let mut config = voltage_config();
        config.threshold = 2.0;
        let mut analyzer = SpectrumAnalyzer::new(config);
        let mut spectrum = constant_spectrum(0.0);
        spectrum[41] = 1.0;

        analyzer.process(&spectrum, 44100.0).unwrap();
        assert_eq!(analyzer.take_dominant_change(), None);
        assert_eq!(analyzer.dominant_frequency(), None);
    }

    #[test]
    fn overall_loudness_is_rms_of_raw_magnitudes() {
        // Every bin reads 10x the reference, i.e. +20 dB. The aggregate RMS
        // runs over the raw magnitudes, so it is 10x the reference too and
        // converts to the same +20 dB; an RMS over the converted levels
        // would land far higher.
        let config = AnalyzerConfig::default();
        let magnitude = config.reference_value * 10.0;
        let mut analyzer = SpectrumAnalyzer::new(config);

        analyzer.process(&constant_spectrum(magnitude), 44100.0).unwrap();
        assert!((analyzer.overall_level() - 20.0).abs() < 1e-2);
    }

    #[test]
    fn rejected_input_leaves_state_untouched() {
        let spectrum_a = constant_spectrum(0.9);
        let spectrum_b = constant_spectrum(0.5);

        let mut interrupted = SpectrumAnalyzer::new(voltage_config());
        interrupted.process(&spectrum_a, 44100.0).unwrap();
        let err = interrupted.process(&[0.0; 100], 44100.0).unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidInput(_)));
        interrupted.process(&spectrum_b, 44100.0).unwrap();

        let mut clean = SpectrumAnalyzer::new(voltage_config());
        clean.process(&spectrum_a, 44100.0).unwrap();
        clean.process(&spectrum_b, 44100.0).unwrap();

        assert_eq!(interrupted.levels(), clean.levels());
        assert_eq!(interrupted.overall_level(), clean.overall_level());
        assert_eq!(interrupted.dominant_frequency(), clean.dominant_frequency());
    }

    #[test]
    fn reconfigure_swaps_expected_length() {
        let mut analyzer = SpectrumAnalyzer::new(voltage_config());
        analyzer.process(&constant_spectrum(0.1), 44100.0).unwrap();

        analyzer.configure(Resolution::R1024);
        assert!(analyzer.process(&constant_spectrum(0.1), 44100.0).is_err());
        analyzer
            .process(&vec![0.1; Resolution::R1024.samples()], 44100.0)
            .unwrap();
    }

    #[test]
    fn smooth_damp_converges_without_overshoot() {
        let mut velocity = 0.0;
        let mut value = 1.0f32;

        for _ in 0..200 {
            let next = smooth_damp(value, 0.0, &mut velocity, 0.18, 0.05);
            assert!(next <= value);
            assert!(next >= 0.0);
            value = next;
        }
        assert!(value < 1e-3);
    }
}
