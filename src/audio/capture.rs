//! Live microphone input via cpal.
//!
//! cpal delivers samples on its own callback thread; they are downmixed to
//! mono i16 there and handed to the polling loop over a bounded channel, so
//! `read_block` is the loop's only blocking point.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};

use super::source::{SampleBlock, SampleSource};

/// Callback chunks buffered before the device thread starts dropping audio.
const CHANNEL_DEPTH: usize = 64;

type Chunk = std::result::Result<Vec<i16>, String>;

pub struct CpalSource {
    _stream: Stream,
    rx: Receiver<Chunk>,
    pending: Vec<i16>,
    block_size: usize,
    sample_rate: u32,
}

impl CpalSource {
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    pub fn open(
        preferred_device: Option<&str>,
        block_size: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };

        let supported = device
            .supported_input_configs()
            .context("failed to query input configs")?
            .find(|range| {
                range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
            })
            .map(|range| range.with_sample_rate(SampleRate(sample_rate)));
        let supported = match supported {
            Some(config) => config,
            None => {
                let fallback = device.default_input_config()?;
                log::warn!(
                    "{} Hz not supported by input device, using {} Hz",
                    sample_rate,
                    fallback.sample_rate().0
                );
                fallback
            }
        };

        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = usize::from(config.channels.max(1));
        let device_name = device.name().unwrap_or_else(|_| "unknown input device".into());

        log::info!(
            "Capturing from '{}': format={:?} rate={}Hz channels={}",
            device_name,
            format,
            config.sample_rate.0,
            channels
        );

        let (tx, rx) = bounded(CHANNEL_DEPTH);
        let stream = match format {
            SampleFormat::I16 => build_stream(&device, &config, channels, tx, |s: i16| s)?,
            SampleFormat::U16 => {
                build_stream(&device, &config, channels, tx, |s: u16| (s as i32 - 32_768) as i16)?
            }
            SampleFormat::F32 => build_stream(&device, &config, channels, tx, |s: f32| {
                (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            })?,
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };
        stream.play().context("failed to start input stream")?;

        Ok(Self {
            _stream: stream,
            rx,
            pending: Vec::with_capacity(block_size * 2),
            block_size: block_size.max(1),
            sample_rate: config.sample_rate.0,
        })
    }
}

fn build_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    tx: Sender<Chunk>,
    convert: F,
) -> Result<Stream>
where
    T: SizedSample,
    F: Fn(T) -> i16 + Send + 'static,
{
    let err_tx = tx.clone();
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mono = data
                .chunks(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| convert(s) as i32).sum();
                    (sum / frame.len() as i32) as i16
                })
                .collect();
            // Full channel means the loop fell behind; drop rather than block the device.
            let _ = tx.try_send(Ok(mono));
        },
        move |err| {
            let _ = err_tx.try_send(Err(err.to_string()));
        },
        None,
    )?;
    Ok(stream)
}

impl SampleSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_block(&mut self) -> Result<Option<SampleBlock>> {
        while self.pending.len() < self.block_size {
            match self.rx.recv() {
                Ok(Ok(chunk)) => self.pending.extend(chunk),
                Ok(Err(err)) => anyhow::bail!("audio input stream failed: {}", err),
                Err(_) => anyhow::bail!("audio input stream closed"),
            }
        }
        let block: Vec<i16> = self.pending.drain(..self.block_size).collect();
        Ok(Some(block))
    }
}
