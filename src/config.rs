use crate::error::{AnalyzerError, Result};

/// Supported raw-spectrum lengths. The FFT provider must supply exactly
/// this many magnitude samples per tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Resolution {
    R64,
    R128,
    R256,
    R512,
    R1024,
    #[default]
    R2048,
    R4096,
    R8192,
}

impl Resolution {
    pub const ALL: [Resolution; 8] = [
        Resolution::R64,
        Resolution::R128,
        Resolution::R256,
        Resolution::R512,
        Resolution::R1024,
        Resolution::R2048,
        Resolution::R4096,
        Resolution::R8192,
    ];

    /// Number of magnitude samples this resolution stands for.
    pub fn samples(self) -> usize {
        match self {
            Resolution::R64 => 64,
            Resolution::R128 => 128,
            Resolution::R256 => 256,
            Resolution::R512 => 512,
            Resolution::R1024 => 1024,
            Resolution::R2048 => 2048,
            Resolution::R4096 => 4096,
            Resolution::R8192 => 8192,
        }
    }

    /// Look up the resolution for a raw sample count.
    pub fn from_samples(samples: usize) -> Result<Resolution> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.samples() == samples)
            .ok_or_else(|| {
                AnalyzerError::InvalidConfig(format!(
                    "unsupported spectrum resolution: {samples} samples"
                ))
            })
    }
}

/// Unit the per-bin and overall levels are reported in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum OutputUnit {
    /// Raw signal amplitude scaled by the voltage multiplier.
    Voltage,
    /// `20 * log10(magnitude / reference)` scaled by the decibel multiplier.
    #[default]
    Decibels,
}

#[derive(Clone, PartialEq, Debug)]
pub struct AnalyzerConfig {
    /// Number of magnitude samples expected per tick.
    /// Larger = better frequency resolution but more latency.
    pub resolution: Resolution,

    /// Whether levels are reported as scaled voltages or decibels.
    pub output_unit: OutputUnit,

    /// Gain applied to levels in voltage mode.
    pub voltage_multiplier: f32,

    /// Gain applied to levels in decibel mode.
    pub decibel_multiplier: f32,

    /// Magnitude that maps to 0 dB. Clamped to (0, 0.01] at use.
    /// Lower = quieter signals still register positive decibel levels.
    pub reference_value: f32,

    /// Release lag in seconds. 0 = no smoothing, values near the tick
    /// interval shorten the visible decay, larger values add lag.
    /// Rising levels are never delayed.
    pub smoothing: f32,

    /// Minimum level the loudest bin must reach before a dominant-frequency
    /// change is reported. Same unit as the output.
    pub threshold: f32,

    /// Interval in milliseconds the driver calls `process` at. Also the
    /// integration step for the release smoother.
    pub update_interval_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::R2048,
            output_unit: OutputUnit::Decibels,
            voltage_multiplier: 1.0,
            decibel_multiplier: 1.0,
            reference_value: 0.0005,
            smoothing: 0.18,
            threshold: 0.0,
            update_interval_ms: 50,
        }
    }
}

impl AnalyzerConfig {
    /// Clamp tunables into their working ranges instead of failing.
    pub fn sanitize(&mut self) {
        self.reference_value = self.reference_value.clamp(MIN_REFERENCE, MAX_REFERENCE);
        self.smoothing = self.smoothing.max(0.0);
        self.update_interval_ms = self.update_interval_ms.clamp(1, 1000);
    }
}

/// Working range for the decibel reference magnitude.
pub const MIN_REFERENCE: f32 = 1e-7;
pub const MAX_REFERENCE: f32 = 0.01;
