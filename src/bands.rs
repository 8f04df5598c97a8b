use crate::analyzer::MUSICAL_BINS;
use crate::error::{AnalyzerError, Result};

/// Channel count used when none is given, sized for a ten-speaker layout.
pub const DEFAULT_CHANNELS: usize = 10;

/// Groups the 128 smoothed musical bins into contiguous equal-size groups
/// and reports an RMS loudness per group, one value per output channel.
///
/// Group size is `128 / channels` by integer division; when the division
/// leaves a remainder, the trailing bins are not consumed. The outputs are
/// not clamped; callers mapping them onto playback gains apply their own
/// presentation range.
pub struct BandAggregator {
    group_size: usize,
    levels: Vec<f32>,
}

impl BandAggregator {
    pub fn new(channels: usize) -> Result<Self> {
        if channels == 0 || channels > MUSICAL_BINS {
            return Err(AnalyzerError::InvalidConfig(format!(
                "channel count {channels} cannot group {MUSICAL_BINS} bins"
            )));
        }
        Ok(Self {
            group_size: MUSICAL_BINS / channels,
            levels: vec![0.0; channels],
        })
    }

    /// Recompute the per-channel loudness from the analyzer's smoothed bins.
    pub fn process(&mut self, bins: &[f32; MUSICAL_BINS]) -> &[f32] {
        for (channel, level) in self.levels.iter_mut().enumerate() {
            let start = channel * self.group_size;
            let group = &bins[start..start + self.group_size];
            let sum_squares: f32 = group.iter().map(|v| v * v).sum();
            *level = (sum_squares / self.group_size as f32).sqrt();
        }
        &self.levels
    }

    /// Levels computed by the last `process` call.
    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn channels(&self) -> usize {
        self.levels.len()
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }
}

impl Default for BandAggregator {
    fn default() -> Self {
        BandAggregator::new(DEFAULT_CHANNELS).expect("default channel count is valid")
    }
}
