use apodize::blackman_iter;
use rustfft::{FftPlanner, num_complex::Complex};

use crate::config::Resolution;

/// Produces the magnitude buffer the analyzer consumes, standing in for the
/// host audio engine's spectrum query.
///
/// Keeps a rolling window of the most recent `2 * resolution` mono samples,
/// applies a Blackman window, and reports the first `resolution` normalized
/// magnitudes of the forward FFT, so bin `i` covers frequency
/// `i * (rate / 2) / resolution`.
pub struct FftProcessor {
    planner: FftPlanner<f32>,
    resolution: Resolution,
    buffer: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl FftProcessor {
    pub fn new(resolution: Resolution) -> Self {
        let mut processor = Self {
            planner: FftPlanner::new(),
            resolution,
            buffer: Vec::new(),
            write_pos: 0,
            window: Vec::new(),
            scratch: Vec::new(),
            magnitudes: Vec::new(),
        };
        processor.allocate();
        processor
    }

    fn allocate(&mut self) {
        let fft_size = self.resolution.samples() * 2;
        self.buffer = vec![0.0; fft_size];
        self.write_pos = 0;
        self.window = blackman_iter(fft_size).map(|w| w as f32).collect();
        self.scratch = vec![Complex::new(0.0, 0.0); fft_size];
        self.magnitudes = vec![0.0; self.resolution.samples()];
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Swap the output length, reallocating the rolling window. Idempotent;
    /// the buffer restarts from silence on an actual change.
    pub fn configure(&mut self, resolution: Resolution) {
        if self.resolution != resolution {
            self.resolution = resolution;
            self.allocate();
        }
    }

    /// Append one mono sample, evicting the oldest.
    #[inline]
    pub fn push_sample(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn add_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.push_sample(sample);
        }
    }

    /// Windowed magnitudes of the current rolling window, oldest sample
    /// first. Length equals the configured resolution.
    pub fn magnitudes(&mut self) -> &[f32] {
        let fft_size = self.buffer.len();

        // Unroll the ring into time order while applying the window.
        for (i, w) in self.window.iter().enumerate() {
            let sample = self.buffer[(self.write_pos + i) % fft_size];
            self.scratch[i] = Complex::new(sample * w, 0.0);
        }

        let fft = self.planner.plan_fft_forward(fft_size);
        fft.process(&mut self.scratch);

        let scale = 2.0 / fft_size as f32;
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.scratch) {
            *magnitude = bin.norm() * scale;
        }

        &self.magnitudes
    }
}
