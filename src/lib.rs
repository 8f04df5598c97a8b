pub mod analyzer;
pub mod bands;
pub mod capture;
pub mod config;
pub mod error;
pub mod fft;

pub use analyzer::{MIN_DB_LEVEL, MUSICAL_BINS, SpectrumAnalyzer, musical_frequencies};
pub use bands::{BandAggregator, DEFAULT_CHANNELS};
pub use capture::{AudioStream, start_input_stream};
pub use config::{AnalyzerConfig, OutputUnit, Resolution};
pub use error::{AnalyzerError, Result};
pub use fft::FftProcessor;
