//! Live engine
//!
//! Splits the effect graph across two contexts:
//!
//! - [`LiveEngine`] is the control handle. It owns settings, assets, the
//!   transport scheduler and capture, publishes resolved parameters into a
//!   [`SharedParams`] snapshot, publishes the id of the session that should
//!   be sounding and sends [`EngineCommand`]s over a bounded channel.
//!   Monitor samples travel on their own channel and are dropped, never
//!   queued behind, when the callback falls behind.
//! - [`RenderContext`] is driven by the audio callback. It never blocks,
//!   never logs and never frees memory: it reads the parameter snapshot,
//!   drains commands with `try_recv`, silences any session other than the
//!   published one, and hands finished sessions and monitor chunks back
//!   through a retire channel so the control side drops them.
//!
//! The transport clock is the number of frames the render context has
//! produced.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use log::{debug, info, warn};

use super::asset::{AssetSlot, AssetStore};
use super::buffer::AudioBuffer;
use super::capture::{CaptureDevice, CaptureSession};
use super::harmony::mix_voices;
use super::io::resample;
use super::render::{CancelToken, ExportResult, MixdownRenderer, RenderJob};
use super::transport::{
    FrameClock, PlaybackSession, SessionSources, TransportEvent, TransportScheduler,
    TransportState,
};
use crate::config::EngineConfig;
use crate::dsp::{resolve, EffectGraph, ResolvedParams, SpectrumAnalyser, PARAM_COUNT};
use crate::error::{DeviceFailure, Result, VocalError};
use crate::settings::ProcessingSettings;

/// Capacity of the command and retire channels
pub const COMMAND_CAPACITY: usize = 256;

/// Monitor chunks in flight between capture and the render context
const MONITOR_QUEUE: usize = 32;

/// Published session id meaning "nothing should sound"
const NO_SESSION: u64 = 0;

// ============================================================================
// Shared parameter snapshot
// ============================================================================

/// Wait-free parameter snapshot written by control, read by render
///
/// Values are stored as f32 bits. The version is bumped after every store;
/// a reader that races a writer may see a mix of old and new values for one
/// block and picks up the complete set on the next.
#[derive(Debug)]
pub struct SharedParams {
    values: [AtomicU32; PARAM_COUNT],
    version: AtomicU64,
}

impl SharedParams {
    pub fn new(params: &ResolvedParams) -> Self {
        let values = params.to_array();
        Self {
            values: std::array::from_fn(|i| AtomicU32::new(values[i].to_bits())),
            version: AtomicU64::new(0),
        }
    }

    pub fn store(&self, params: &ResolvedParams) {
        for (slot, value) in self.values.iter().zip(params.to_array()) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
        self.version.fetch_add(1, Ordering::Release);
    }

    pub fn load(&self) -> ResolvedParams {
        ResolvedParams::from_array(std::array::from_fn(|i| {
            f32::from_bits(self.values[i].load(Ordering::Relaxed))
        }))
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A session as the render context plays it, positioned in frames
#[derive(Debug)]
pub struct ActiveSession {
    pub id: u64,
    /// Absolute frame at which sources start sounding
    pub start_frame: u64,
    /// Source position at `start_frame`
    pub offset_frames: usize,
    pub sources: SessionSources,
}

impl ActiveSession {
    fn from_session(session: &PlaybackSession, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        // Past the longest source every read is silence anyway
        let offset_secs = session.offset_secs.min(session.duration_secs);
        Self {
            id: session.id,
            start_frame: (session.start_at * sr).round().max(0.0) as u64,
            offset_frames: (offset_secs * sr).round() as usize,
            sources: session.sources.clone(),
        }
    }

    /// Vocal, summed harmony and beat at an absolute frame
    #[inline]
    fn inputs_at(&self, frame: u64) -> (f32, f32, [f32; 2]) {
        if frame < self.start_frame {
            return (0.0, 0.0, [0.0; 2]);
        }
        let elapsed = (frame - self.start_frame) as usize;
        let position = self.offset_frames.saturating_add(elapsed);

        let (vocal, harmony) = match self.sources.vocal.as_deref() {
            Some(buffer) => (
                buffer.mono_at(position),
                mix_voices(&self.sources.voices, buffer, self.offset_frames, elapsed),
            ),
            None => (0.0, 0.0),
        };
        let beat = self
            .sources
            .beat
            .as_deref()
            .map_or([0.0; 2], |b| b.stereo_at(position));
        (vocal, harmony, beat)
    }
}

/// Control to render messages
#[derive(Debug)]
pub enum EngineCommand {
    /// Make this the current session, superseding any other
    Start(Box<ActiveSession>),
    /// Silence the session if it is still current
    Stop { session_id: u64 },
}

/// Render to control hand-back of memory to free
#[derive(Debug)]
pub enum Retired {
    Session(Box<ActiveSession>),
    Chunk(Vec<f32>),
}

// ============================================================================
// Render context
// ============================================================================

/// Real-time half of the live engine
pub struct RenderContext {
    graph: EffectGraph,
    params: Arc<SharedParams>,
    seen_version: u64,
    commands: Receiver<EngineCommand>,
    monitor_input: Receiver<Vec<f32>>,
    retired: Sender<Retired>,
    /// Id the control side wants sounding, `NO_SESSION` for none
    live_session: Arc<AtomicU64>,
    session: Option<Box<ActiveSession>>,
    monitor: VecDeque<Vec<f32>>,
    monitor_pos: usize,
    frames: Arc<AtomicU64>,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("session", &self.session.as_ref().map(|s| s.id))
            .field("frames", &self.frames.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RenderContext {
    /// Fill an interleaved stereo buffer
    pub fn render(&mut self, out: &mut [f32]) {
        self.drain_commands();
        self.refresh_params();

        let base = self.frames.load(Ordering::Relaxed);
        let mut produced = 0u64;
        for (i, frame) in out.chunks_exact_mut(2).enumerate() {
            let (vocal, harmony, beat) = match &self.session {
                Some(session) => session.inputs_at(base + i as u64),
                None => (0.0, 0.0, [0.0; 2]),
            };
            let vocal = vocal + self.next_monitor_sample();
            let [left, right] = self.graph.process_frame(vocal, harmony, beat);
            frame[0] = left;
            frame[1] = right;
            produced += 1;
        }
        self.frames.fetch_add(produced, Ordering::Release);
    }

    /// Id of the session being played, if any
    pub fn current_session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(EngineCommand::Start(session)) => {
                    if let Some(old) = self.session.replace(session) {
                        self.retire(Retired::Session(old));
                    }
                }
                Ok(EngineCommand::Stop { session_id }) => {
                    if self.current_session_id() == Some(session_id) {
                        if let Some(old) = self.session.take() {
                            self.retire(Retired::Session(old));
                        }
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let wanted = self.live_session.load(Ordering::Acquire);
        if self.current_session_id().is_some_and(|id| id != wanted) {
            if let Some(stale) = self.session.take() {
                self.retire(Retired::Session(stale));
            }
        }

        while self.monitor.len() < MONITOR_QUEUE {
            match self.monitor_input.try_recv() {
                Ok(chunk) => self.monitor.push_back(chunk),
                Err(_) => break,
            }
        }
    }

    fn refresh_params(&mut self) {
        let version = self.params.version();
        if version != self.seen_version {
            self.seen_version = version;
            self.graph.apply_params(&self.params.load());
        }
    }

    #[inline]
    fn next_monitor_sample(&mut self) -> f32 {
        loop {
            let Some(chunk) = self.monitor.front() else {
                return 0.0;
            };
            if let Some(&sample) = chunk.get(self.monitor_pos) {
                self.monitor_pos += 1;
                return sample;
            }
            self.monitor_pos = 0;
            if let Some(done) = self.monitor.pop_front() {
                self.retire(Retired::Chunk(done));
            }
        }
    }

    fn retire(&self, item: Retired) {
        // Fails only when the control side stopped collecting; the item is
        // then dropped here.
        let _ = self.retired.try_send(item);
    }
}

// ============================================================================
// Control handle
// ============================================================================

/// Control half of the live engine
pub struct LiveEngine {
    config: EngineConfig,
    settings: ProcessingSettings,
    assets: AssetStore,
    transport: TransportScheduler,
    clock: Arc<FrameClock>,
    params: Arc<SharedParams>,
    commands: Sender<EngineCommand>,
    monitor: Sender<Vec<f32>>,
    retired: Receiver<Retired>,
    live_session: Arc<AtomicU64>,
    analyser: SpectrumAnalyser,
    capture: Option<CaptureSession>,
}

impl std::fmt::Debug for LiveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEngine")
            .field("settings", &self.settings)
            .field("transport", &self.transport)
            .field("capturing", &self.capture.is_some())
            .finish_non_exhaustive()
    }
}

impl LiveEngine {
    /// Build the control handle and its render context
    pub fn new(config: EngineConfig) -> Result<(Self, RenderContext)> {
        config.validate()?;

        let settings = ProcessingSettings::default();
        let resolved = resolve(&settings);
        let params = Arc::new(SharedParams::new(&resolved));

        let mut graph = EffectGraph::new(config.sample_rate, config.smoothing_secs);
        graph.apply_params(&resolved);
        graph.snap_to_targets();
        let analyser = SpectrumAnalyser::new(graph.meter_tap());

        let frames = Arc::new(AtomicU64::new(0));
        let clock = Arc::new(FrameClock::new(Arc::clone(&frames), config.sample_rate));
        let (command_tx, command_rx) = bounded(COMMAND_CAPACITY);
        let (monitor_tx, monitor_rx) = bounded(MONITOR_QUEUE);
        let (retired_tx, retired_rx) = bounded(COMMAND_CAPACITY);
        let live_session = Arc::new(AtomicU64::new(NO_SESSION));

        let context = RenderContext {
            graph,
            params: Arc::clone(&params),
            seen_version: params.version(),
            commands: command_rx,
            monitor_input: monitor_rx,
            retired: retired_tx,
            live_session: Arc::clone(&live_session),
            session: None,
            monitor: VecDeque::with_capacity(MONITOR_QUEUE),
            monitor_pos: 0,
            frames,
        };

        let engine = Self {
            transport: TransportScheduler::new(clock.clone(), config.lookahead_secs),
            assets: AssetStore::new(config.sample_rate),
            config,
            settings,
            clock,
            params,
            commands: command_tx,
            monitor: monitor_tx,
            retired: retired_rx,
            live_session,
            analyser,
            capture: None,
        };
        info!(
            "Live engine ready at {} Hz, lookahead {:.0} ms",
            engine.config.sample_rate,
            engine.config.lookahead_secs * 1000.0
        );
        Ok((engine, context))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Replace the processing settings and retarget the live graph
    pub fn update_settings(&mut self, settings: ProcessingSettings) {
        let settings = settings.clamped();
        let resolved = resolve(&settings);
        debug!(
            "Settings updated: style={} auto_tune={} harmony={:?}",
            settings.style, settings.auto_tune_enabled, settings.harmony
        );
        self.params.store(&resolved);
        self.settings = settings;
        self.collect_retired();
    }

    /// Decode bytes into a slot
    pub fn import(&mut self, bytes: &[u8], name: &str, slot: AssetSlot) -> Result<String> {
        self.assets.import(bytes, name, slot)
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Start every loaded source from `offset_secs`; returns the session id
    pub fn play(&mut self, offset_secs: f64) -> u64 {
        let previous = self.transport.current_session_id();
        let sources = SessionSources::from_assets(&self.assets, self.settings.harmony);
        if sources.is_empty() {
            warn!("Play requested with no assets loaded");
        }
        let session = self.transport.play(offset_secs, sources);
        let id = session.id;
        let active = ActiveSession::from_session(session, self.config.sample_rate);

        self.publish_session(id);
        if let Some(session_id) = previous {
            self.send(EngineCommand::Stop { session_id });
        }
        self.send(EngineCommand::Start(Box::new(active)));
        self.collect_retired();
        id
    }

    /// Move the playhead; restarts playback when playing
    pub fn seek(&mut self, offset_secs: f64) {
        let previous = self.transport.current_session_id();
        let Some(session) = self.transport.seek(offset_secs) else {
            return;
        };
        let active = ActiveSession::from_session(session, self.config.sample_rate);
        self.publish_session(active.id);
        if let Some(session_id) = previous {
            self.send(EngineCommand::Stop { session_id });
        }
        self.send(EngineCommand::Start(Box::new(active)));
        self.collect_retired();
    }

    /// Halt playback; idempotent
    pub fn stop(&mut self) {
        if let Some(session) = self.transport.stop() {
            self.publish_session(NO_SESSION);
            self.send(EngineCommand::Stop {
                session_id: session.id,
            });
        }
        self.collect_retired();
    }

    /// Check for the natural end of playback; call periodically
    pub fn poll(&mut self) -> Option<TransportEvent> {
        let event = self.transport.poll();
        if let Some(TransportEvent::Completed { session_id }) = event {
            self.publish_session(NO_SESSION);
            self.send(EngineCommand::Stop { session_id });
        }
        self.collect_retired();
        event
    }

    /// Playhead position in seconds (0 when not playing)
    pub fn elapsed(&self) -> f64 {
        self.transport.elapsed()
    }

    /// Longest loaded asset in seconds
    pub fn duration(&self) -> f64 {
        self.assets.max_duration_secs()
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Current time of the render clock in seconds
    pub fn clock_secs(&self) -> f64 {
        self.clock.frames() as f64 / self.config.sample_rate as f64
    }

    // ------------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------------

    /// Begin recording from `device`
    ///
    /// # Errors
    /// * `Device(Busy)` - a recording is already running
    /// * `Device(..)` - the device failed to open
    pub fn start_capture(&mut self, device: Box<dyn CaptureDevice>) -> Result<()> {
        if self.capture.is_some() {
            return Err(VocalError::device(
                DeviceFailure::Busy,
                "a capture session is already running",
            ));
        }
        self.capture = Some(CaptureSession::start(device, self.config.sample_rate)?);
        Ok(())
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Seconds recorded in the running capture
    pub fn recorded_secs(&self) -> f64 {
        self.capture.as_ref().map_or(0.0, CaptureSession::recorded_secs)
    }

    /// Drain the capture device and forward new samples for monitoring
    ///
    /// Returns how many samples arrived.
    pub fn pump_capture(&mut self) -> Result<usize> {
        let engine_rate = self.config.sample_rate;
        let Some(capture) = self.capture.as_mut() else {
            return Ok(0);
        };
        let device_rate = capture.device_rate();
        let fresh = capture.pump()?;
        let count = fresh.len();
        if count > 0 {
            let chunk = if device_rate == engine_rate {
                fresh.to_vec()
            } else {
                let raw = AudioBuffer::from_mono(fresh.to_vec(), device_rate);
                let mut converted = resample(&raw, engine_rate);
                converted.samples.swap_remove(0)
            };
            if let Err(TrySendError::Full(_)) = self.monitor.try_send(chunk) {
                debug!("Monitor backlog full; dropping {} samples", count);
            }
        }
        self.collect_retired();
        Ok(count)
    }

    /// Finish recording and load it into the Vocal slot
    ///
    /// # Errors
    /// * `Precondition` - no capture is running
    pub fn stop_capture(&mut self) -> Result<String> {
        let capture = self
            .capture
            .take()
            .ok_or_else(|| VocalError::precondition("no capture session is running"))?;
        let asset = capture.finish()?;
        let name = asset.name().to_string();
        self.assets.set(AssetSlot::Vocal, asset);
        Ok(name)
    }

    /// Abandon the running recording, if any
    pub fn cancel_capture(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.abort();
        }
    }

    // ------------------------------------------------------------------------
    // Metering and export
    // ------------------------------------------------------------------------

    /// Current spectrum of the master bus, `METER_BINS` values in 0..=1
    pub fn metering_snapshot(&mut self) -> &[f32] {
        self.analyser.snapshot()
    }

    /// Render the loaded assets with the current settings
    ///
    /// Uses a private graph; playback keeps running untouched.
    pub fn export(
        &self,
        cancel: Option<CancelToken>,
        progress: &mut dyn FnMut(u8),
    ) -> Result<ExportResult> {
        let mut job = RenderJob::new(self.assets.vocal(), self.assets.beat(), &self.settings);
        if let Some(token) = cancel {
            job = job.with_cancel_token(token);
        }
        MixdownRenderer::new(self.config.clone()).export(&job, progress)
    }

    fn publish_session(&self, id: u64) {
        self.live_session.store(id, Ordering::Release);
    }

    fn send(&self, command: EngineCommand) {
        match self.commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                warn!("Render command queue full; dropping {}", command_name(&command));
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Render context is gone; command ignored");
            }
        }
    }

    /// Free whatever the render context has handed back
    fn collect_retired(&mut self) {
        let freed = self.retired.try_iter().count();
        if freed > 0 {
            debug!("Freed {} retired render item(s)", freed);
        }
    }
}

fn command_name(command: &EngineCommand) -> &'static str {
    match command {
        EngineCommand::Start(_) => "start",
        EngineCommand::Stop { .. } => "stop",
    }
}
