// THEORY:
// The `pipeline` module is the top-level API of the crate. `MotionPipeline` owns
// a `MotionEngine` and a `FrameSource` and runs the capture lifecycle around
// them:
//
//     Idle -> Initializing -> Streaming -> Stopped
//
// `start` opens the source, re-derives the diff grid from the source's native
// size, and spawns one capture task. That task ticks on a fixed interval; each
// tick acquires a frame, downscales it to diff resolution and hands it to the
// engine. Results leave the pipeline as `MotionEvent`s on a bounded channel.
//
// Key architectural principles:
// 1.  **Exclusive engine ownership**: the engine and source are moved into the
//     capture task while streaming and handed back through its `JoinHandle`.
//     Nothing else can touch the retained frame, so there is no locking around
//     it.
// 2.  **Serialized ticks**: one task, sequential awaits, and missed ticks are
//     skipped rather than queued. A slow source lowers the frame rate; it never
//     builds a backlog.
// 3.  **Cooperative stop**: the stop signal is only observed between ticks, so
//     an in-flight tick always completes.
// 4.  **Backpressure, not loss**: the capture task waits for room in the
//     channel, so a consumer that falls behind slows capture down. Every wait
//     races the stop signal, so a stalled consumer never blocks `stop`.
// 5.  **One closing event per session**: before queuing anything, the capture
//     task reserves a channel slot for the event that ends its session
//     (`Stopped` or `CaptureError`). That event is sent exactly once, by the
//     task, whichever way the session ends.
// 6.  **Fatal acquisition**: a source error ends the session. Retry policy
//     belongs to whoever owns the source.

use crate::config::{MotionConfig, MotionOptions};
use crate::core_modules::motion_box::MotionBox;
use crate::core_modules::motion_engine::{DiffResult, MotionEngine};
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{MotionError, Result};
use crate::frame_source::FrameSource;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::motion_engine::EngineState;

pub const DEFAULT_EVENT_CAPACITY: usize = 16;
/// One slot is always held back for the closing event of a running session.
pub const MIN_EVENT_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Initializing,
    Streaming,
    Stopped,
}

/// One scored capture: the full-resolution frame and its diff result.
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    pub capture: PixelBuffer,
    pub diff: DiffResult,
    /// Capture pixels per diff-space pixel.
    pub scale: u32,
}

impl CaptureEvent {
    pub fn score(&self) -> u32 {
        self.diff.score
    }

    pub fn has_motion(&self) -> bool {
        self.diff.has_motion
    }

    pub fn motion_box(&self) -> Option<MotionBox> {
        self.diff.motion_box
    }

    /// The motion box mapped onto capture coordinates.
    pub fn motion_box_in_capture_space(&self) -> Option<MotionBox> {
        self.diff
            .motion_box
            .map(|motion_box| motion_box.to_capture_space(self.scale))
    }

    pub fn check_motion_pixel(&self, x: u32, y: u32) -> bool {
        self.diff.check_motion_pixel(x, y)
    }

    /// The full-resolution capture encoded as PNG.
    pub fn capture_png(&self) -> Result<Vec<u8>> {
        image_helper::encode_png(&self.capture)
    }
}

#[derive(Debug, Clone)]
pub enum MotionEvent {
    InitSuccess,
    InitError(String),
    StartComplete,
    Capture(Box<CaptureEvent>),
    /// The source failed while streaming; the session has stopped.
    CaptureError(String),
    Stopped,
}

enum TickOutcome {
    Baseline,
    Captured(CaptureEvent),
    EndOfStream,
}

type SharedState = Arc<watch::Sender<PipelineState>>;
type Worker = JoinHandle<CaptureExit>;

/// What the capture task hands back when its session ends.
struct CaptureExit {
    engine: MotionEngine,
    source: Box<dyn FrameSource>,
    /// Whether the task delivered the session's closing event.
    announced: bool,
}

/// The main, top-level struct for the motion engine.
pub struct MotionPipeline {
    config: MotionConfig,
    state: SharedState,
    engine: Option<MotionEngine>,
    source: Option<Box<dyn FrameSource>>,
    events: mpsc::Sender<MotionEvent>,
    stop_tx: Option<watch::Sender<bool>>,
    worker: Option<Worker>,
}

impl MotionPipeline {
    pub fn new(
        config: MotionConfig,
        source: Box<dyn FrameSource>,
        event_capacity: usize,
    ) -> (Self, mpsc::Receiver<MotionEvent>) {
        let (events, receiver) = mpsc::channel(event_capacity.max(MIN_EVENT_CAPACITY));
        let (state, _) = watch::channel(PipelineState::Idle);
        let pipeline = Self {
            engine: Some(MotionEngine::new(config.clone())),
            config,
            state: Arc::new(state),
            source: Some(source),
            events,
            stop_tx: None,
            worker: None,
        };
        (pipeline, receiver)
    }

    pub fn with_options(
        options: Option<&MotionOptions>,
        source: Box<dyn FrameSource>,
    ) -> Result<(Self, mpsc::Receiver<MotionEvent>)> {
        let config = MotionConfig::from_options(options)?;
        Ok(Self::new(config, source, DEFAULT_EVENT_CAPACITY))
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Follows state transitions, including the capture task ending a session
    /// on its own.
    pub fn state_changes(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// The configuration in effect, including any dimensions adopted from the
    /// source at start.
    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// The engine, while it is not lent to a running capture task.
    pub fn engine(&self) -> Option<&MotionEngine> {
        self.engine.as_ref()
    }

    pub async fn start(&mut self) -> Result<()> {
        let current = self.state();
        if !matches!(current, PipelineState::Idle | PipelineState::Stopped) {
            return Err(MotionError::Lifecycle(format!(
                "cannot start while {current:?}"
            )));
        }
        // A task that stopped on its own still holds the engine and source.
        self.reclaim().await?;

        let (Some(mut engine), Some(mut source)) = (self.engine.take(), self.source.take())
        else {
            return Err(MotionError::Lifecycle(
                "engine or frame source was lost by a failed capture task".into(),
            ));
        };

        write_state(&self.state, PipelineState::Initializing);
        info!("initializing frame source");

        if let Err(e) = source.open().await {
            let e = if matches!(e, MotionError::Acquisition(_)) {
                e
            } else {
                MotionError::Acquisition(e.to_string())
            };
            warn!(error = %e, "frame source failed to open");
            self.engine = Some(engine);
            self.source = Some(source);
            write_state(&self.state, PipelineState::Idle);
            notify(&self.events, MotionEvent::InitError(e.to_string()));
            return Err(e);
        }

        let config = match source.dimensions() {
            Some((width, height)) => self.config.with_capture_dimensions(width, height),
            None => Ok(self.config.clone()),
        };
        let config = match config {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "frame source reported unusable dimensions");
                self.engine = Some(engine);
                self.source = Some(source);
                write_state(&self.state, PipelineState::Idle);
                notify(&self.events, MotionEvent::InitError(e.to_string()));
                return Err(e);
            }
        };
        engine.apply_config(config.clone());
        self.config = config;

        let (stop_tx, stop_rx) = watch::channel(false);
        write_state(&self.state, PipelineState::Streaming);
        info!(
            capture_width = self.config.capture_width,
            capture_height = self.config.capture_height,
            diff_width = self.config.diff_width,
            diff_height = self.config.diff_height,
            interval_ms = self.config.capture_interval.as_millis() as u64,
            "streaming"
        );

        self.worker = Some(tokio::spawn(capture_loop(
            engine,
            source,
            self.config.clone(),
            self.events.clone(),
            self.state.clone(),
            stop_rx,
        )));
        self.stop_tx = Some(stop_tx);
        Ok(())
    }

    /// Halts capture after any in-flight tick and drops the engine's baseline.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        let announced = self.reclaim().await?;

        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
        write_state(&self.state, PipelineState::Stopped);
        if announced == Some(false) {
            // The task was stopped before the consumer made room for anything.
            notify(&self.events, MotionEvent::Stopped);
        }
        Ok(())
    }

    /// Takes the engine and source back from a finished or stopping task.
    /// Reports whether that task announced the end of its session, or `None`
    /// if no task was running.
    async fn reclaim(&mut self) -> Result<Option<bool>> {
        let Some(worker) = self.worker.take() else {
            return Ok(None);
        };
        match worker.await {
            Ok(exit) => {
                self.engine = Some(exit.engine);
                self.source = Some(exit.source);
                Ok(Some(exit.announced))
            }
            Err(e) => {
                error!(error = %e, "capture task failed");
                write_state(&self.state, PipelineState::Stopped);
                Err(MotionError::Lifecycle(format!("capture task failed: {e}")))
            }
        }
    }
}

async fn capture_loop(
    mut engine: MotionEngine,
    mut source: Box<dyn FrameSource>,
    config: MotionConfig,
    events: mpsc::Sender<MotionEvent>,
    state: SharedState,
    mut stop_rx: watch::Receiver<bool>,
) -> CaptureExit {
    let permit = tokio::select! {
        biased;
        _ = stop_rx.changed() => None,
        permit = events.clone().reserve_owned() => permit.ok(),
    };
    let closing = if permit.is_some() {
        stream(&mut engine, source.as_mut(), &config, &events, &mut stop_rx).await
    } else {
        MotionEvent::Stopped
    };

    engine.reset();
    write_state(&state, PipelineState::Stopped);
    info!(event = event_name(&closing), "session ended");
    let announced = match permit {
        Some(permit) => {
            let _ = permit.send(closing);
            true
        }
        None => false,
    };

    CaptureExit {
        engine,
        source,
        announced,
    }
}

/// Runs one session until it is stopped or the source ends or fails, and
/// returns the event that closes it.
async fn stream(
    engine: &mut MotionEngine,
    source: &mut dyn FrameSource,
    config: &MotionConfig,
    events: &mpsc::Sender<MotionEvent>,
    stop_rx: &mut watch::Receiver<bool>,
) -> MotionEvent {
    for event in [MotionEvent::InitSuccess, MotionEvent::StartComplete] {
        if !deliver(events, event, stop_rx).await {
            return MotionEvent::Stopped;
        }
    }

    let mut ticker = tokio::time::interval(config.capture_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => return MotionEvent::Stopped,
            _ = ticker.tick() => {}
        }

        match capture_tick(engine, source, config).await {
            Ok(TickOutcome::Baseline) => {}
            Ok(TickOutcome::Captured(event)) => {
                if !deliver(events, MotionEvent::Capture(Box::new(event)), stop_rx).await {
                    return MotionEvent::Stopped;
                }
            }
            Ok(TickOutcome::EndOfStream) => {
                info!("frame source ended");
                return MotionEvent::Stopped;
            }
            Err(e @ MotionError::DimensionMismatch { .. }) => {
                warn!(error = %e, "skipping frame");
            }
            Err(e) => {
                error!(error = %e, "frame acquisition failed, stopping");
                return MotionEvent::CaptureError(e.to_string());
            }
        }
    }
}

async fn capture_tick(
    engine: &mut MotionEngine,
    source: &mut dyn FrameSource,
    config: &MotionConfig,
) -> Result<TickOutcome> {
    let Some(capture) = source.next_frame().await? else {
        return Ok(TickOutcome::EndOfStream);
    };
    let scaled = capture.downscale(config.diff_width, config.diff_height)?;

    Ok(match engine.process_frame(scaled)? {
        Some(diff) => TickOutcome::Captured(CaptureEvent {
            capture,
            diff,
            scale: config.scale,
        }),
        None => TickOutcome::Baseline,
    })
}

/// Waits for room in the channel and queues `event`. Returns `false` if stop
/// was requested first, in which case the event is discarded.
async fn deliver(
    events: &mpsc::Sender<MotionEvent>,
    event: MotionEvent,
    stop_rx: &mut watch::Receiver<bool>,
) -> bool {
    let name = event_name(&event);
    tokio::select! {
        biased;
        _ = stop_rx.changed() => {
            debug!(event = name, "stop requested while waiting on the consumer");
            false
        }
        sent = events.send(event) => {
            if sent.is_err() {
                debug!(event = name, "event receiver dropped");
            }
            true
        }
    }
}

/// Queues `event` without waiting. Only used outside a running session, where
/// the caller also gets the outcome as a return value.
fn notify(events: &mpsc::Sender<MotionEvent>, event: MotionEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(event = event_name(&dropped), "event channel full, event not delivered");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

fn event_name(event: &MotionEvent) -> &'static str {
    match event {
        MotionEvent::InitSuccess => "init_success",
        MotionEvent::InitError(_) => "init_error",
        MotionEvent::StartComplete => "start_complete",
        MotionEvent::Capture(_) => "capture",
        MotionEvent::CaptureError(_) => "capture_error",
        MotionEvent::Stopped => "stopped",
    }
}

fn write_state(state: &SharedState, next: PipelineState) {
    state.send_replace(next);
}
