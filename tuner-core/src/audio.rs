//! # Audio Output Module
//!
//! This module owns the connection between the tone graph and the system's
//! audio output, using CPAL (Cross-Platform Audio Library).
//!
//! ## Features
//! - Lazily opened output context, one per process
//! - Dedicated worker thread that owns the CPAL stream
//! - Any common device sample format (rendered as f32, converted on output)
//! - Offline contexts with no device, rendered by hand
//!
//! The [`OutputBackend`] trait is the seam between the engine and the
//! platform: [`CpalBackend`] talks to real hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use crossbeam_channel::{Receiver, Sender};

use crate::error::ToneError;
use crate::graph::{ToneGraph, VoiceId};
use crate::synth::Voice;

/// Graph shared between the GUI thread and the output callback.
pub type SharedGraph = Arc<Mutex<ToneGraph>>;

/// Opens audio output contexts.
pub trait OutputBackend {
    /// Checks that an output exists without opening it.
    fn probe(&mut self) -> Result<(), ToneError>;

    /// Opens the output and returns a running context.
    fn open(&mut self) -> Result<AudioContext, ToneError>;
}

/// An open audio output: the graph, its clock and the thread feeding the
/// device.
#[derive(Debug)]
pub struct AudioContext {
    graph: SharedGraph,
    ended_rx: Receiver<VoiceId>,
    sample_rate: u32,
    /// Raised by the stream's error callback; the context is then unusable.
    faulted: Arc<AtomicBool>,
    worker: Option<OutputWorker>,
}

impl AudioContext {
    /// A context with no device attached. Nothing advances its clock except
    /// [`AudioContext::render`].
    pub fn offline(sample_rate: u32) -> Self {
        let (ended_tx, ended_rx) = crossbeam_channel::unbounded();
        Self {
            graph: Arc::new(Mutex::new(ToneGraph::new(sample_rate, ended_tx))),
            ended_rx,
            sample_rate,
            faulted: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether a device is being fed by this context.
    pub fn is_realtime(&self) -> bool {
        self.worker.is_some()
    }

    /// Whether the device stream reported an error since it started.
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn mark_faulted(&self) {
        self.faulted.store(true, Ordering::Relaxed);
    }

    /// Position of the output clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.graph
            .lock()
            .map(|graph| graph.current_time())
            .unwrap_or(0.0)
    }

    /// Builds the fixed voice chain at `frequency` and schedules it for
    /// `duration` seconds from the current output time.
    pub fn start_tone(&self, frequency: f32, duration: f32) -> Result<VoiceId, ToneError> {
        let voice = Voice::guitar(frequency, self.sample_rate as f32);
        let mut graph = self
            .graph
            .lock()
            .map_err(|_| ToneError::InitializationFailure("audio graph lock poisoned".into()))?;
        Ok(graph.schedule(voice, duration))
    }

    /// Renders `out` directly. Used by offline contexts; a realtime context is
    /// rendered by its device callback.
    pub fn render(&self, out: &mut [f32], channels: usize) {
        if let Ok(mut graph) = self.graph.lock() {
            graph.render(out, channels);
        }
    }

    /// Voices whose nodes have been released since the last call.
    pub fn drain_ended(&self) -> Vec<VoiceId> {
        self.ended_rx.try_iter().collect()
    }

    pub fn live_voices(&self) -> usize {
        self.graph.lock().map(|g| g.live_voices()).unwrap_or(0)
    }

    pub fn live_nodes(&self) -> usize {
        self.graph.lock().map(|g| g.live_nodes()).unwrap_or(0)
    }
}

/// The thread that owns the CPAL stream.
///
/// Some platforms cannot move a stream across threads, so it is built, played
/// and dropped on this thread, which parks on the shutdown channel.
#[derive(Debug)]
struct OutputWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Drop for OutputWorker {
    fn drop(&mut self) {
        log::info!(target: "tuner::audio", "Shutting down output worker...");
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!(target: "tuner::audio", "Output worker panicked");
            }
        }
    }
}

/// Audio output through the default CPAL host.
#[derive(Debug, Default)]
pub struct CpalBackend {
    /// An output device has been seen at least once in this process.
    seen_device: bool,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputBackend for CpalBackend {
    fn probe(&mut self) -> Result<(), ToneError> {
        let host = cpal::default_host();
        match host.default_output_device() {
            Some(_) => {
                self.seen_device = true;
                Ok(())
            }
            None => Err(missing_device_error(self.seen_device, host.id().name())),
        }
    }

    fn open(&mut self) -> Result<AudioContext, ToneError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let (ended_tx, ended_rx) = crossbeam_channel::unbounded();
        let faulted = Arc::new(AtomicBool::new(false));
        let stream_faulted = faulted.clone();
        let seen_device = self.seen_device;

        let thread_handle = thread::Builder::new()
            .name("tuner-audio-out".into())
            .spawn(move || {
                log::info!(target: "tuner::audio", "Output worker starting...");
                let host = cpal::default_host();
                let device = match host.default_output_device() {
                    Some(device) => device,
                    None => {
                        let _ = ready_tx.send(Err(missing_device_error(seen_device, host.id().name())));
                        return;
                    }
                };

                let stream = match start_output_stream(&device, ended_tx, stream_faulted) {
                    Ok((stream, graph, sample_rate)) => {
                        let _ = ready_tx.send(Ok((graph, sample_rate)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(ToneError::InitializationFailure(format!("{:#}", e))));
                        return;
                    }
                };

                // Park until the context is dropped (or its sender vanishes).
                let _ = shutdown_rx.recv();

                if let Err(e) = stream.pause() {
                    log::warn!(target: "tuner::audio", "Error pausing stream: {}", e);
                }
                drop(stream);
                log::info!(target: "tuner::audio", "Output worker finished");
            })
            .map_err(|e| ToneError::InitializationFailure(format!("cannot spawn audio thread: {}", e)))?;

        let worker = OutputWorker {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        };

        match ready_rx.recv() {
            Ok(Ok((graph, sample_rate))) => {
                log::info!(target: "tuner::audio", "Audio output running at {} Hz", sample_rate);
                self.seen_device = true;
                Ok(AudioContext {
                    graph,
                    ended_rx,
                    sample_rate,
                    faulted,
                    worker: Some(worker),
                })
            }
            Ok(Err(e)) => {
                drop(worker);
                Err(e)
            }
            Err(_) => {
                drop(worker);
                Err(ToneError::InitializationFailure(
                    "audio thread exited before the stream started".into(),
                ))
            }
        }
    }
}

/// Error for a host with no default output device. A device that was there
/// earlier in the process has gone away, which may be temporary.
fn missing_device_error(seen_device: bool, host_name: &str) -> ToneError {
    if seen_device {
        ToneError::InitializationFailure(format!(
            "the output device on the {} host disappeared",
            host_name
        ))
    } else {
        ToneError::PlatformUnsupported(format!("no output device on the {} host", host_name))
    }
}

/// Builds and starts a stream on `device` that renders a fresh graph.
///
/// The stream uses the device's default output configuration. Whatever its
/// sample format, the graph renders f32 and the callback converts.
fn start_output_stream(
    device: &cpal::Device,
    ended_tx: Sender<VoiceId>,
    faulted: Arc<AtomicBool>,
) -> anyhow::Result<(cpal::Stream, SharedGraph, u32)> {
    if let Ok(name) = device.name() {
        log::info!(target: "tuner::audio", "Using audio output device: {}", name);
    }

    let supported = device
        .default_output_config()
        .context("no default output configuration")?;
    let sample_format = supported.sample_format();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    log::info!(
        target: "tuner::audio",
        "Selected output config: {} Hz, {} channel(s), {:?}",
        sample_rate, config.channels, sample_format
    );

    let graph: SharedGraph = Arc::new(Mutex::new(ToneGraph::new(sample_rate, ended_tx)));

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(device, &config, graph.clone(), faulted.clone()),
        SampleFormat::F64 => build_stream::<f64>(device, &config, graph.clone(), faulted.clone()),
        SampleFormat::I16 => build_stream::<i16>(device, &config, graph.clone(), faulted.clone()),
        SampleFormat::I32 => build_stream::<i32>(device, &config, graph.clone(), faulted.clone()),
        SampleFormat::U16 => build_stream::<u16>(device, &config, graph.clone(), faulted.clone()),
        SampleFormat::U8 => build_stream::<u8>(device, &config, graph.clone(), faulted.clone()),
        other => Err(anyhow!("unsupported output sample format {:?}", other)),
    }?;

    stream.play().context("failed to start output stream")?;
    Ok((stream, graph, sample_rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    graph: SharedGraph,
    faulted: Arc<AtomicBool>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    // Scratch buffer reused across callbacks; grows to the largest period.
    let mut scratch: Vec<f32> = Vec::new();

    let err_fn = move |err: cpal::StreamError| {
        log::error!(target: "tuner::audio", "An error occurred on the output stream: {}", err);
        faulted.store(true, Ordering::Relaxed);
    };

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                render_into(&graph, &mut scratch, channels);
                for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(*sample);
                }
            },
            err_fn,
            None,
        )
        .context("failed to build output stream")?;
    Ok(stream)
}

/// Renders one device period without blocking the audio thread. If the GUI
/// thread holds the graph, the period is silent and the clock stays put.
/// Returns whether the graph was rendered.
fn render_into(graph: &SharedGraph, scratch: &mut [f32], channels: usize) -> bool {
    match graph.try_lock() {
        Ok(mut graph) => {
            graph.render(scratch, channels);
            true
        }
        Err(TryLockError::WouldBlock) | Err(TryLockError::Poisoned(_)) => {
            scratch.fill(0.0);
            false
        }
    }
}
