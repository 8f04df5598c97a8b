use crate::fft::FftProcessor;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat};
use log::warn;
use std::sync::{Arc, Mutex};

/// Keeps the cpal input stream alive for as long as the analysis runs.
pub struct AudioStream {
    _stream: cpal::Stream,
}

/// Open the default input device and feed downmixed mono samples into the
/// FFT processor from the audio callback. Returns the stream guard and the
/// device sample rate in Hz.
pub fn start_input_stream(
    processor: Arc<Mutex<FftProcessor>>,
) -> Result<(AudioStream, u32), anyhow::Error> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow::anyhow!("no input device available"))?;

    let supported_config = device.default_input_config()?;
    let sample_format = supported_config.sample_format();
    let config: cpal::StreamConfig = supported_config.into();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels as usize;

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, processor)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, processor)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, processor)?,
        _ => return Err(anyhow::anyhow!("Unsupported sample format")),
    };

    stream.play()?;

    Ok((AudioStream { _stream: stream }, sample_rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    processor: Arc<Mutex<FftProcessor>>,
) -> Result<cpal::Stream, anyhow::Error>
where
    T: Sample + FromSample<f32> + cpal::SizedSample,
    f32: FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut processor = processor.lock().unwrap();
            for frame in data.chunks(channels) {
                let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                processor.push_sample(sum / channels as f32);
            }
        },
        |err| warn!("input stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
