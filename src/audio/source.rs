//! Microphone access via CPAL.
//!
//! The capture callback runs on CPAL's audio thread; samples are downmixed to
//! mono i16, sliced into fixed-size frames, and handed to the session over a
//! bounded channel. Device selection (index, name keyword, system default)
//! lives here so the session core never touches the host audio API.

use super::append_downmixed_samples;
use crate::error::CaptureError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Keywords scanned, in order, when no explicit device is configured and the
/// host reports no default input.
const MIC_KEYWORDS: &[&str] = &[
    "realtek",
    "microphone",
    "usb",
    "headset",
    "headphone",
    "audio",
];

/// Max pending frames between the capture callback and the session loop.
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Result of one timeout-bounded frame read.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameRead {
    /// One fixed-size frame of mono i16 samples.
    Frame(Vec<i16>),
    /// No frame arrived within the timeout.
    TimedOut,
    /// The source stopped delivering frames and will not resume.
    Closed,
}

/// A microphone-like frame producer the recording session consumes.
///
/// `read_frame` blocks for at most `timeout` so the session's terminal-
/// condition polling keeps its cadence even when the source stalls.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;
    fn read_frame(&mut self, timeout: Duration) -> FrameRead;
}

/// How to choose an input device.
#[derive(Debug, Clone)]
pub enum DeviceSelector {
    /// System default, falling back to a keyword scan of device names.
    Default,
    /// Device at a fixed enumeration index.
    Index(usize),
    /// First device whose name contains the given string (case-insensitive).
    Name(String),
}

impl DeviceSelector {
    fn resolve(&self) -> Result<Device, CaptureError> {
        let host = cpal::default_host();
        match self {
            DeviceSelector::Index(index) => {
                let mut devices = host
                    .input_devices()
                    .map_err(|err| CaptureError::Device(err.to_string()))?;
                devices
                    .nth(*index)
                    .ok_or_else(|| CaptureError::Device(format!("no input device at index {index}")))
            }
            DeviceSelector::Name(wanted) => {
                let needle = wanted.to_lowercase();
                let mut devices = host
                    .input_devices()
                    .map_err(|err| CaptureError::Device(err.to_string()))?;
                devices
                    .find(|d| {
                        d.name()
                            .map(|n| n.to_lowercase().contains(&needle))
                            .unwrap_or(false)
                    })
                    .ok_or_else(|| {
                        CaptureError::Device(format!("input device '{wanted}' not found"))
                    })
            }
            DeviceSelector::Default => {
                if let Some(device) = host.default_input_device() {
                    return Ok(device);
                }
                let devices = host
                    .input_devices()
                    .map_err(|err| CaptureError::Device(err.to_string()))?;
                for device in devices {
                    let Ok(name) = device.name() else { continue };
                    let lowered = name.to_lowercase();
                    if MIC_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
                        return Ok(device);
                    }
                }
                Err(CaptureError::Device(
                    "no default input device available".to_string(),
                ))
            }
        }
    }
}

/// List microphone names so the CLI can expose a human-friendly selector.
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|err| CaptureError::Device(err.to_string()))?;
    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Slices downmixed samples into fixed-size frames and forwards them without
/// blocking the audio callback. Overflow is counted, not waited on.
pub(super) struct FrameChunker {
    frame_samples: usize,
    pending: Vec<i16>,
    scratch: Vec<i16>,
    sender: Sender<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
}

impl FrameChunker {
    pub(super) fn new(
        frame_samples: usize,
        sender: Sender<Vec<i16>>,
        dropped: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            frame_samples: frame_samples.max(1),
            pending: Vec::with_capacity(frame_samples),
            scratch: Vec::new(),
            sender,
            dropped,
        }
    }

    pub(super) fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.scratch.clear();
        append_downmixed_samples(&mut self.scratch, data, channels, convert);
        self.pending.extend_from_slice(&self.scratch);

        while self.pending.len() >= self.frame_samples {
            let frame: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
            if let Err(err) = self.sender.try_send(frame) {
                match err {
                    TrySendError::Full(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    TrySendError::Disconnected(_) => break,
                }
            }
        }
    }
}

/// CPAL-backed audio source. Dropping it stops the stream and releases the
/// device, whichever way the session ended.
pub struct CpalSource {
    stream: cpal::Stream,
    receiver: Receiver<Vec<i16>>,
    sample_rate: u32,
    failed: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
}

impl CpalSource {
    /// Open the selected device and start delivering `frame_size`-sample mono
    /// frames at the device's configured rate.
    ///
    /// The requested rate is used when the device supports it; otherwise the
    /// device's native rate is kept and the session rejects the mismatch.
    pub fn open(
        selector: &DeviceSelector,
        requested_rate: u32,
        frame_size: usize,
    ) -> Result<Self, CaptureError> {
        let device = selector.resolve()?;
        let default_config = device
            .default_input_config()
            .map_err(|err| CaptureError::Device(err.to_string()))?;
        let format = default_config.sample_format();
        let mut stream_config: StreamConfig = default_config.into();

        let supports_requested = device
            .supported_input_configs()
            .map_err(|err| CaptureError::Device(err.to_string()))?
            .any(|cfg| {
                cfg.min_sample_rate().0 <= requested_rate
                    && cfg.max_sample_rate().0 >= requested_rate
            });
        if supports_requested {
            stream_config.sample_rate = cpal::SampleRate(requested_rate);
        }
        let sample_rate = stream_config.sample_rate.0;
        let channels = usize::from(stream_config.channels.max(1));

        let (sender, receiver) = bounded::<Vec<i16>>(FRAME_CHANNEL_CAPACITY);
        let dropped = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicBool::new(false));
        let chunker = Arc::new(Mutex::new(FrameChunker::new(
            frame_size,
            sender,
            dropped.clone(),
        )));

        let failed_on_err = failed.clone();
        let err_fn = move |err| {
            tracing::warn!(error = %err, "audio stream error");
            failed_on_err.store(true, Ordering::Release);
        };

        let stream = match format {
            SampleFormat::F32 => {
                let chunker = chunker.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        if let Ok(mut pump) = chunker.try_lock() {
                            pump.push(data, channels, |sample| sample);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let chunker = chunker.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        if let Ok(mut pump) = chunker.try_lock() {
                            pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let chunker = chunker.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _| {
                        if let Ok(mut pump) = chunker.try_lock() {
                            pump.push(data, channels, |sample| {
                                (sample as f32 - 32_768.0) / 32_768.0
                            });
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(CaptureError::Device(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|err| CaptureError::Device(err.to_string()))?;

        stream
            .play()
            .map_err(|err| CaptureError::Device(err.to_string()))?;

        Ok(Self {
            stream,
            receiver,
            sample_rate,
            failed,
            dropped,
        })
    }

    /// Frames the capture callback had to discard because the session loop
    /// fell behind.
    pub fn frames_dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AudioSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_frame(&mut self, timeout: Duration) -> FrameRead {
        if self.failed.load(Ordering::Acquire) && self.receiver.is_empty() {
            return FrameRead::Closed;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => FrameRead::Frame(frame),
            Err(RecvTimeoutError::Timeout) => FrameRead::TimedOut,
            Err(RecvTimeoutError::Disconnected) => FrameRead::Closed,
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        if let Err(err) = self.stream.pause() {
            tracing::debug!(error = %err, "failed to pause audio stream on release");
        }
    }
}
