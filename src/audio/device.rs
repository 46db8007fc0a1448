//! Input device handling: enumeration and the blocking chunk source.
//!
//! cpal delivers capture data on its own callback thread in arbitrary batch
//! sizes. The dispatcher regroups those batches into fixed-size chunks and
//! hands them to the capture loop over a bounded channel, turning the
//! callback-driven OS API into the blocking reads the pipeline wants.

use crate::config::CaptureConfig;
use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::SampleFormat;

/// Chunks buffered between the callback thread and the capture loop.
const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// A stalled device stops producing chunks entirely; silence still produces
/// data, so waiting longer than this means the stream is dead.
const READ_STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking source of raw interleaved capture chunks.
///
/// Every returned chunk is exactly `frame_chunk_size × channels ×
/// bytes_per_sample` bytes. Implementations other than the device-backed one
/// exist only in tests.
pub trait CaptureSource {
    fn read_chunk(&mut self) -> Result<Vec<u8>>;
}

/// List microphone names so the caller can expose a selector.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("no input devices available")?;
    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Regroups callback batches into fixed-size chunks.
///
/// The callback must never block, so a full channel cannot wait; it trips
/// the overrun counter instead and the next read fails the session. Lost
/// audio is a hard error here, not a statistic.
struct ChunkDispatcher {
    chunk_bytes: usize,
    pending: Vec<u8>,
    sender: Sender<Vec<u8>>,
    overruns: Arc<AtomicUsize>,
}

impl ChunkDispatcher {
    fn new(chunk_bytes: usize, sender: Sender<Vec<u8>>, overruns: Arc<AtomicUsize>) -> Self {
        Self {
            chunk_bytes: chunk_bytes.max(1),
            pending: Vec::with_capacity(chunk_bytes),
            sender,
            overruns,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        while self.pending.len() >= self.chunk_bytes {
            let chunk: Vec<u8> = self.pending.drain(..self.chunk_bytes).collect();
            match self.sender.try_send(chunk) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.overruns.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
    }
}

/// cpal-backed [`CaptureSource`]. Owns the stream; dropping it releases the
/// device.
pub struct DeviceSource {
    receiver: Receiver<Vec<u8>>,
    overruns: Arc<AtomicUsize>,
    _stream: cpal::Stream,
}

impl DeviceSource {
    /// Open the configured device and start capturing.
    ///
    /// cpal streams are not `Send`, so this must be called on the thread
    /// that will read from the source.
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = match &config.device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown input device".to_string());

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: BufferSize::Default,
        };
        let chunk_bytes = config.frame_chunk_size
            * config.channels as usize
            * config.format.bytes_per_sample();

        let (sender, receiver) = bounded::<Vec<u8>>(CHUNK_CHANNEL_CAPACITY);
        let overruns = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = ChunkDispatcher::new(chunk_bytes, sender, overruns.clone());

        let err_fn = |err| tracing::warn!("audio stream error: {err}");
        let stream = device
            .build_input_stream_raw(
                &stream_config,
                cpal_format(config.format),
                move |data: &cpal::Data, _: &cpal::InputCallbackInfo| {
                    dispatcher.push(data.bytes());
                },
                err_fn,
                None,
            )
            .with_context(|| {
                format!(
                    "failed to open input stream on '{device_name}' \
                     ({} ch, {} Hz, {}). {}",
                    config.channels,
                    config.sample_rate,
                    config.format.label(),
                    mic_permission_hint()
                )
            })?;
        stream.play().context("failed to start audio stream")?;

        tracing::debug!(
            device = %device_name,
            channels = config.channels,
            sample_rate = config.sample_rate,
            format = config.format.label(),
            chunk_bytes,
            "capture stream started"
        );

        Ok(Self {
            receiver,
            overruns,
            _stream: stream,
        })
    }
}

impl CaptureSource for DeviceSource {
    fn read_chunk(&mut self) -> Result<Vec<u8>> {
        let overruns = self.overruns.load(Ordering::Relaxed);
        if overruns > 0 {
            bail!("capture overrun: {overruns} chunk(s) arrived faster than they were written");
        }
        match self.receiver.recv_timeout(READ_STALL_TIMEOUT) {
            Ok(chunk) => Ok(chunk),
            Err(RecvTimeoutError::Timeout) => bail!("input device stalled; no capture data"),
            Err(RecvTimeoutError::Disconnected) => bail!("audio stream disconnected"),
        }
    }
}

fn cpal_format(format: SampleFormat) -> cpal::SampleFormat {
    match format {
        SampleFormat::Int8 => cpal::SampleFormat::I8,
        SampleFormat::Int16 => cpal::SampleFormat::I16,
        SampleFormat::Int24 => cpal::SampleFormat::I24,
        SampleFormat::Int32 => cpal::SampleFormat::I32,
        SampleFormat::Float32 => cpal::SampleFormat::F32,
    }
}

fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}
