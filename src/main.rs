use log::{debug, info};
use notescope::{AnalyzerConfig, BandAggregator, FftProcessor, Resolution, SpectrumAnalyzer};
use std::env;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting up...");

    let mut config = AnalyzerConfig::default();
    if let Some(samples) = env_parse::<usize>("NOTESCOPE_RESOLUTION") {
        config.resolution = Resolution::from_samples(samples)?;
    }
    if let Some(interval) = env_parse::<u64>("NOTESCOPE_INTERVAL_MS") {
        config.update_interval_ms = interval;
    }
    config.sanitize();

    // === Capture Setup ===
    let processor = Arc::new(Mutex::new(FftProcessor::new(config.resolution)));
    let (_stream, sample_rate) = notescope::start_input_stream(processor.clone())?;
    info!("Capturing default input device at {sample_rate} Hz");

    // === Analysis Loop ===
    let mut analyzer = SpectrumAnalyzer::new(config.clone());
    let mut aggregator = BandAggregator::default();
    let mut spectrum = vec![0.0f32; config.resolution.samples()];

    info!(
        "Analyzing every {}ms across {} bands, Ctrl-C to stop",
        config.update_interval_ms,
        aggregator.channels()
    );

    loop {
        thread::sleep(Duration::from_millis(config.update_interval_ms));

        spectrum.copy_from_slice(processor.lock().unwrap().magnitudes());
        analyzer.process(&spectrum, sample_rate as f32)?;

        if let Some(frequency) = analyzer.take_dominant_change() {
            info!("dominant frequency: {frequency:.1} Hz");
        }

        let levels = aggregator.process(analyzer.levels());
        debug!(
            "overall {:6.1} | bands {}",
            analyzer.overall_level(),
            levels
                .iter()
                .map(|l| format!("{l:6.1}"))
                .collect::<Vec<_>>()
                .join(" ")
        );
    }
}
