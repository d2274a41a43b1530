//! Microphone capture through cpal
//!
//! The cpal stream must stay on the thread that built it, so each capture runs
//! on its own thread and is driven over crossbeam channels. The stream callback
//! downmixes to mono and hands chunks to that thread, which appends them to
//! the WAV file as they arrive.

use crate::recorder::wav::{downmix, WavSink};
use crate::recorder::{AudioUri, CaptureBackend, RecorderError};
use async_trait::async_trait;
use chrono::Utc;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Chunks buffered between the audio callback and the file writer
const CHUNK_QUEUE: usize = 256;

/// Where and how captures are recorded
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub output_dir: PathBuf,
    /// Preferred sample rate; the device default is used if unsupported
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureControl {
    Finish,
    Abort,
}

/// `Ok(None)` when the capture was aborted or never started
type CaptureOutcome = Result<Option<PathBuf>, RecorderError>;

struct CaptureWorker {
    control_tx: Sender<CaptureControl>,
    paused: Arc<AtomicBool>,
    handle: JoinHandle<CaptureOutcome>,
}

pub struct CpalBackend {
    settings: CaptureSettings,
    worker: Mutex<Option<CaptureWorker>>,
}

impl CpalBackend {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            worker: Mutex::new(None),
        }
    }

    /// Names of the available input devices
    pub fn input_devices() -> Result<Vec<String>, RecorderError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| RecorderError::Device(format!("Failed to list input devices: {}", e)))?;
        Ok(devices
            .map(|d| d.name().unwrap_or_else(|_| "Unknown".to_string()))
            .collect())
    }

    fn with_worker<T>(&self, f: impl FnOnce(&CaptureWorker) -> T) -> Result<T, RecorderError> {
        self.worker
            .lock()
            .as_ref()
            .map(f)
            .ok_or(RecorderError::NoActiveRecording)
    }

    fn take_worker(&self) -> Result<CaptureWorker, RecorderError> {
        self.worker
            .lock()
            .take()
            .ok_or(RecorderError::NoActiveRecording)
    }
}

fn open_input_device(preferred_rate: u32) -> Result<(Device, StreamConfig), RecorderError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RecorderError::Device("No input device available".into()))?;

    let preferred = device.supported_input_configs().ok().and_then(|mut configs| {
        configs.find(|range| {
            range.sample_format() == SampleFormat::F32
                && range.min_sample_rate().0 <= preferred_rate
                && range.max_sample_rate().0 >= preferred_rate
        })
    });

    let config: StreamConfig = match preferred {
        Some(range) => range.with_sample_rate(SampleRate(preferred_rate)).config(),
        None => device
            .default_input_config()
            .map_err(|e| RecorderError::Device(format!("Failed to get input config: {}", e)))?
            .config(),
    };

    info!(
        "Using input device: {} ({} Hz, {} channels)",
        device.name().unwrap_or_else(|_| "Unknown".to_string()),
        config.sample_rate.0,
        config.channels
    );
    Ok((device, config))
}

fn run_capture(
    path: PathBuf,
    preferred_rate: u32,
    paused: Arc<AtomicBool>,
    control_rx: Receiver<CaptureControl>,
    ready_tx: Sender<Result<(), RecorderError>>,
) -> CaptureOutcome {
    let fail_startup = |e: RecorderError| -> CaptureOutcome {
        let _ = ready_tx.send(Err(e));
        Ok(None)
    };

    let (device, config) = match open_input_device(preferred_rate) {
        Ok(opened) => opened,
        Err(e) => return fail_startup(e),
    };
    let sink = match WavSink::create(&path, config.sample_rate.0) {
        Ok(sink) => sink,
        Err(e) => return fail_startup(e),
    };

    let channels = config.channels as usize;
    let (chunk_tx, chunk_rx) = bounded::<Vec<f32>>(CHUNK_QUEUE);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_in_callback = Arc::clone(&dropped);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if paused.load(Ordering::Relaxed) {
                return;
            }
            let chunk: Vec<f32> = downmix(data, channels).collect();
            if let Err(TrySendError::Full(chunk)) = chunk_tx.try_send(chunk) {
                dropped_in_callback.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            }
        },
        |err| error!("Audio input stream error: {}", err),
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            sink.discard();
            return fail_startup(RecorderError::Device(format!(
                "Failed to build input stream: {}",
                e
            )));
        }
    };

    if let Err(e) = stream.play() {
        drop(stream);
        sink.discard();
        return fail_startup(RecorderError::Device(format!(
            "Failed to start input stream: {}",
            e
        )));
    }
    let _ = ready_tx.send(Ok(()));

    // The stream owns the chunk sender, so dropping it ends the chunk feed
    let outcome = pump_capture(sink, &chunk_rx, &control_rx, move || drop(stream));

    let lost = dropped.load(Ordering::Relaxed);
    if lost > 0 {
        warn!("Writer fell behind, {} samples were dropped", lost);
    }
    outcome
}

/// Append chunks to the sink until a control message arrives
///
/// `stop_feed` is called once the control message is received; the chunks
/// still queued after it are written before the file is finalized.
fn pump_capture(
    mut sink: WavSink,
    chunk_rx: &Receiver<Vec<f32>>,
    control_rx: &Receiver<CaptureControl>,
    stop_feed: impl FnOnce(),
) -> CaptureOutcome {
    let mut write_error: Option<RecorderError> = None;
    let mut write = |sink: &mut WavSink, chunk: Vec<f32>| {
        if write_error.is_none() {
            if let Err(e) = sink.write_samples(&chunk) {
                error!("Capture write failed: {}", e);
                write_error = Some(e);
            }
        }
    };

    let control = loop {
        select! {
            recv(chunk_rx) -> chunk => match chunk {
                Ok(chunk) => write(&mut sink, chunk),
                // Feed gone; wait for the caller to decide
                Err(_) => break control_rx.recv(),
            },
            recv(control_rx) -> control => break control,
        }
    };

    stop_feed();
    for chunk in chunk_rx.try_iter() {
        write(&mut sink, chunk);
    }

    match control {
        Ok(CaptureControl::Finish) => {
            if let Some(e) = write_error {
                sink.discard();
                return Err(e);
            }
            debug!("Capture finished with {} samples", sink.samples_written());
            sink.finalize().map(Some)
        }
        Ok(CaptureControl::Abort) => {
            sink.discard();
            Ok(None)
        }
        Err(_) => {
            warn!("Capture control channel closed");
            sink.discard();
            Ok(None)
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> RecorderError {
    RecorderError::Device(format!("Capture task failed: {}", e))
}

#[async_trait]
impl CaptureBackend for CpalBackend {
    async fn request_permission(&self) -> Result<bool, RecorderError> {
        tokio::fs::create_dir_all(&self.settings.output_dir).await?;

        let rate = self.settings.sample_rate;
        let available = tokio::task::spawn_blocking(move || open_input_device(rate))
            .await
            .map_err(join_error)?;

        match available {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Microphone unavailable: {}", e);
                Ok(false)
            }
        }
    }

    async fn begin(&self) -> Result<(), RecorderError> {
        if self.worker.lock().is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        let (control_tx, control_rx) = bounded(1);
        let (ready_tx, ready_rx) = bounded(1);
        let paused = Arc::new(AtomicBool::new(false));

        let path = self
            .settings
            .output_dir
            .join(format!("recording_{}.wav", Utc::now().timestamp_millis()));
        let rate = self.settings.sample_rate;
        let thread_paused = Arc::clone(&paused);
        let handle =
            thread::spawn(move || run_capture(path, rate, thread_paused, control_rx, ready_tx));

        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(join_error)?
            .map_err(|_| RecorderError::Device("Capture thread exited during startup".into()))?;

        if let Err(e) = ready {
            let _ = handle.join();
            return Err(e);
        }

        *self.worker.lock() = Some(CaptureWorker {
            control_tx,
            paused,
            handle,
        });
        Ok(())
    }

    async fn pause(&self) -> Result<(), RecorderError> {
        self.with_worker(|worker| worker.paused.store(true, Ordering::Relaxed))
    }

    async fn resume(&self) -> Result<(), RecorderError> {
        self.with_worker(|worker| worker.paused.store(false, Ordering::Relaxed))
    }

    async fn finish(&self) -> Result<AudioUri, RecorderError> {
        let worker = self.take_worker()?;
        let _ = worker.control_tx.send(CaptureControl::Finish);

        let path = join_capture(worker.handle)
            .await?
            .ok_or_else(|| RecorderError::Device("Capture produced no audio".into()))?;
        Ok(AudioUri::from_path(path))
    }

    async fn abort(&self) -> Result<(), RecorderError> {
        let worker = self.take_worker()?;
        let _ = worker.control_tx.send(CaptureControl::Abort);
        join_capture(worker.handle).await?;
        Ok(())
    }
}

async fn join_capture(handle: JoinHandle<CaptureOutcome>) -> CaptureOutcome {
    tokio::task::spawn_blocking(move || handle.join())
        .await
        .map_err(join_error)?
        .map_err(|_| RecorderError::Device("Capture thread panicked".into()))?
}
