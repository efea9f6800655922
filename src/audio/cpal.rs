// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level};

use super::{EngineError, PcmFormat};
use crate::player::Completion;
use crate::resource::Clip;

/// A cpal output device.
///
/// The engine keeps a single output stream open. It starts at the device's
/// default rate and is reopened by `prepare` when a pack needs another rate.
/// Playbacks are handed to the stream callback, which mixes them and signals
/// completion when each one ends.
pub struct Engine {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The open output stream, if any.
    output: Mutex<Option<Output>>,
}

/// An output stream running on its own thread.
struct Output {
    sample_rate: u32,
    playback_tx: Sender<Playback>,
    /// Dropping this sender wakes the output thread and closes the stream.
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

/// A clip being played by the stream callback.
struct Playback {
    clip: Clip,
    /// Byte position of the next frame to play.
    position: usize,
    cancelled: Arc<AtomicBool>,
    completion: Completion,
}

impl Playback {
    fn is_done(&self) -> bool {
        self.position + self.clip.format().bytes_per_frame() > self.clip.len()
    }
}

/// Mixes active playbacks into interleaved f32 output.
struct Mixer {
    output_channels: usize,
    playback_rx: Receiver<Playback>,
    active: Vec<Playback>,
}

impl Mixer {
    fn new(output_channels: u16, playback_rx: Receiver<Playback>) -> Mixer {
        Mixer {
            output_channels: usize::from(output_channels.max(1)),
            playback_rx,
            active: Vec::new(),
        }
    }

    /// Fills the output buffer. Mono clips play on every output channel;
    /// otherwise source channels map onto output channels by index.
    fn mix(&mut self, out: &mut [f32]) {
        self.active.extend(self.playback_rx.try_iter());
        out.fill(0.0);

        for playback in self.active.iter_mut() {
            if playback.cancelled.load(Ordering::Relaxed) {
                continue;
            }

            let format = playback.clip.format();
            let frame_len = format.bytes_per_frame();
            let sample_len = format.bytes_per_sample();
            let source_channels = usize::from(format.channels());
            let bytes = playback.clip.bytes();

            for frame in out.chunks_mut(self.output_channels) {
                let Some(source) = bytes.get(playback.position..playback.position + frame_len)
                else {
                    break;
                };

                for (channel, sample) in frame.iter_mut().enumerate() {
                    let source_channel = if source_channels == 1 {
                        0
                    } else if channel < source_channels {
                        channel
                    } else {
                        continue;
                    };
                    let start = source_channel * sample_len;
                    *sample += format.decode_sample(&source[start..start + sample_len]);
                }
                playback.position += frame_len;
            }
        }

        self.active.retain(|playback| {
            if playback.cancelled.load(Ordering::Relaxed) {
                return false;
            }
            if playback.is_done() {
                playback.completion.finish();
                return false;
            }
            true
        });

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

/// Builds an output stream that converts the mixer's output to `T`.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut buffer: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            buffer.resize(data.len(), 0.0);
            mixer.mix(&mut buffer);
            write_output(data, &buffer);
        },
        |err| error!(err = %err, "cpal output stream error"),
        None,
    )
}

/// Converts mixed f32 samples into the device's sample type.
fn write_output<T>(out: &mut [T], mixed: &[f32])
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    for (dst, &src) in out.iter_mut().zip(mixed.iter()) {
        *dst = T::from_sample(src);
    }
}

/// Builds a stream for whatever sample type the device asks for.
fn build_stream_for(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Mixer,
) -> Result<cpal::Stream, EngineError> {
    let stream = match sample_format {
        cpal::SampleFormat::I8 => build_stream::<i8>(device, config, mixer),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, mixer),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, mixer),
        cpal::SampleFormat::I64 => build_stream::<i64>(device, config, mixer),
        cpal::SampleFormat::U8 => build_stream::<u8>(device, config, mixer),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, mixer),
        cpal::SampleFormat::U32 => build_stream::<u32>(device, config, mixer),
        cpal::SampleFormat::U64 => build_stream::<u64>(device, config, mixer),
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, mixer),
        cpal::SampleFormat::F64 => build_stream::<f64>(device, config, mixer),
        other => {
            return Err(EngineError::Stream(format!(
                "unsupported device sample format {:?}",
                other
            )))
        }
    };
    stream.map_err(|e| EngineError::Stream(e.to_string()))
}

impl Output {
    /// Opens an output stream at the given sample rate on a new thread. The
    /// thread owns the stream and keeps it alive until the output is dropped.
    fn start(device: &cpal::Device, sample_rate: u32) -> Result<Output, EngineError> {
        let supported = device
            .default_output_config()
            .map_err(|e| EngineError::Device(e.to_string()))?;
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let sample_format = supported.sample_format();

        let (playback_tx, playback_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), EngineError>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let device = device.clone();
        let thread = thread::spawn(move || {
            let span = span!(Level::INFO, "output stream (cpal)", sample_rate);
            let _enter = span.enter();

            let mixer = Mixer::new(config.channels, playback_rx);
            let stream = match build_stream_for(&device, &config, sample_format, mixer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(EngineError::Stream(e.to_string())));
                return;
            }

            info!(channels = config.channels, format = ?sample_format, "Output stream started");
            let _ = ready_tx.send(Ok(()));

            // Nothing is ever sent; this returns once the output drops its sender.
            let _ = stop_rx.recv();
            drop(stream);
            info!("Output stream stopped");
        });

        let mut output = Output {
            sample_rate,
            playback_tx,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        };
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(output),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                output.thread.take();
                Err(EngineError::Stream("output thread exited".to_string()))
            }
        }
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Engine {
    fn new(host_id: cpal::HostId, device: cpal::Device) -> Result<Engine, EngineError> {
        let name = device
            .name()
            .map_err(|e| EngineError::Device(e.to_string()))?;
        let max_channels = device
            .supported_output_configs()
            .map(|configs| configs.map(|config| config.channels()).max().unwrap_or(0))
            .unwrap_or(0);

        Ok(Engine {
            name,
            max_channels,
            host_id,
            device,
            output: Mutex::new(None),
        })
    }

    /// Lists cpal output devices.
    pub fn list() -> Result<Vec<Box<dyn super::Engine>>, EngineError> {
        Ok(Engine::list_cpal_devices()?
            .into_iter()
            .map(|engine| {
                let engine: Box<dyn super::Engine> = Box::new(engine);
                engine
            })
            .collect())
    }

    fn list_cpal_devices() -> Result<Vec<Engine>, EngineError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout().map_err(|e| EngineError::Device(e.to_string()))?;
        let _shh_stderr = shh::stderr().map_err(|e| EngineError::Device(e.to_string()))?;

        let mut engines: Vec<Engine> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = %e, host = host_id.name(), "Unable to open host");
                    continue;
                }
            };
            let devices = match host.output_devices() {
                Ok(devices) => devices,
                Err(e) => {
                    error!(err = %e, host = host_id.name(), "Unable to list devices for host");
                    continue;
                }
            };

            for device in devices {
                match Engine::new(host_id, device) {
                    Ok(engine) if engine.max_channels > 0 => engines.push(engine),
                    Ok(_) => {}
                    Err(e) => debug!(err = %e, "Skipping device"),
                }
            }
        }

        engines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(engines)
    }

    /// Gets the named device, or the host's default output device, and opens
    /// an output stream on it at the device's default rate. A device that
    /// cannot stream is an error here rather than on the first key press.
    pub fn get(name: Option<&str>) -> Result<Engine, EngineError> {
        let engine = match name {
            Some(name) => Engine::list_cpal_devices()?
                .into_iter()
                .find(|engine| engine.name.trim() == name)
                .ok_or_else(|| {
                    EngineError::Device(format!("no device found with name {}", name))
                })?,
            None => {
                let host = cpal::default_host();
                let device = host.default_output_device().ok_or(EngineError::NoDevice)?;
                Engine::new(host.id(), device)?
            }
        };

        let default_rate = engine
            .device
            .default_output_config()
            .map_err(|e| EngineError::Device(e.to_string()))?
            .sample_rate()
            .0;
        engine.open(default_rate)?;
        Ok(engine)
    }

    /// Makes sure the output stream runs at the given rate, reopening it if
    /// it does not.
    fn open(&self, sample_rate: u32) -> Result<(), EngineError> {
        let mut output = self.output.lock();
        if let Some(current) = output.as_ref() {
            if current.sample_rate == sample_rate {
                return Ok(());
            }
        }

        // Close any stream at the old rate before opening a new one.
        output.take();
        let opened = Output::start(&self.device, sample_rate)?;
        info!(device = %self.name, sample_rate, "Opened output stream");
        *output = Some(opened);
        Ok(())
    }
}

impl super::Engine for Engine {
    fn prepare(&self, format: PcmFormat) -> Result<(), EngineError> {
        self.open(format.sample_rate())
    }

    fn create_channel(
        &self,
        format: PcmFormat,
        completion: Completion,
    ) -> Result<Box<dyn super::Channel>, EngineError> {
        let output = self.output.lock();
        let playback_tx = match output.as_ref() {
            Some(current) if current.sample_rate == format.sample_rate() => {
                current.playback_tx.clone()
            }
            Some(current) => {
                return Err(EngineError::Stream(format!(
                    "output stream runs at {}Hz, not {}Hz",
                    current.sample_rate,
                    format.sample_rate()
                )))
            }
            None => return Err(EngineError::Closed),
        };

        Ok(Box::new(Channel {
            playback_tx,
            completion,
            cancelled: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// A cpal playback channel.
struct Channel {
    playback_tx: Sender<Playback>,
    completion: Completion,
    cancelled: Arc<AtomicBool>,
}

impl super::Channel for Channel {
    fn submit(&mut self, clip: &Clip) -> Result<(), EngineError> {
        self.playback_tx
            .send(Playback {
                clip: clip.clone(),
                position: 0,
                cancelled: self.cancelled.clone(),
                completion: self.completion.clone(),
            })
            .map_err(|_| EngineError::Closed)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}
