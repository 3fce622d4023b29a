//! Transport scheduler
//!
//! Starts the vocal, its harmony voices and the beat together against one
//! shared clock, and tracks elapsed time for the playhead.
//!
//! State machine:
//! - `Idle` --play--> `Playing`
//! - `Playing` --stop / natural end--> `Stopped`
//! - `Stopped` --play--> `Playing`
//! - `Playing` --seek--> `Playing` (old session stopped, new one started)
//!
//! Every play creates a new [`PlaybackSession`] with a larger id; at most
//! one session is current, and anything holding an older id is stale.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use super::asset::AssetStore;
use super::buffer::AudioBuffer;
use super::harmony::{derive_voices, HarmonyVoice};
use crate::settings::HarmonyType;

// ============================================================================
// Clocks
// ============================================================================

/// Monotonic time source in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock that only moves when told to (tests, offline drivers)
#[derive(Debug, Default)]
pub struct ManualClock {
    secs_bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start_secs: f64) -> Self {
        Self {
            secs_bits: AtomicU64::new(start_secs.to_bits()),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }

    /// Jump to an absolute time
    pub fn set(&self, secs: f64) {
        self.secs_bits.store(secs.to_bits(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.secs_bits.load(Ordering::Acquire))
    }
}

/// Clock derived from frames rendered by the real-time context
#[derive(Debug)]
pub struct FrameClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl FrameClock {
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }
}

impl Clock for FrameClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Buffers a session plays, captured when playback starts
#[derive(Debug, Clone, Default)]
pub struct SessionSources {
    pub vocal: Option<Arc<AudioBuffer>>,
    pub voices: Vec<HarmonyVoice>,
    pub beat: Option<Arc<AudioBuffer>>,
}

impl SessionSources {
    /// Bind whatever assets are loaded, plus the voices derived from the vocal
    pub fn from_assets(assets: &AssetStore, harmony: HarmonyType) -> Self {
        let vocal = assets.vocal().map(|a| Arc::clone(a.buffer()));
        let voices = derive_voices(vocal.as_deref(), harmony);
        Self {
            vocal,
            voices,
            beat: assets.beat().map(|a| Arc::clone(a.buffer())),
        }
    }

    /// Longest source duration in seconds, harmony voices included
    pub fn max_duration_secs(&self) -> f64 {
        let vocal = self.vocal.as_ref().map_or(0.0, |b| b.duration_secs());
        let voices = self
            .voices
            .iter()
            .map(|v| v.duration_secs(vocal))
            .fold(0.0, f64::max);
        let beat = self.beat.as_ref().map_or(0.0, |b| b.duration_secs());
        vocal.max(voices).max(beat)
    }

    pub fn is_empty(&self) -> bool {
        self.vocal.is_none() && self.beat.is_none()
    }
}

/// One synchronized start of all sources
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    /// Monotonically increasing generation
    pub id: u64,
    /// Clock time at which every source starts sounding
    pub start_at: f64,
    /// Position within the sources where playback begins
    pub offset_secs: f64,
    /// `start_at - offset_secs`; elapsed = now - reference_start
    pub reference_start: f64,
    /// Elapsed time at which the session ends on its own
    pub duration_secs: f64,
    pub sources: SessionSources,
}

/// Transport states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Nothing has played yet
    #[default]
    Idle,
    /// A session is current
    Playing,
    /// The last session was stopped or ran to its end
    Stopped,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Idle => write!(f, "Idle"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Notifications produced by [`TransportScheduler::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session reached the end of its longest source
    Completed { session_id: u64 },
}

// ============================================================================
// Scheduler
// ============================================================================

/// Schedules synchronized playback sessions
pub struct TransportScheduler {
    clock: Arc<dyn Clock>,
    lookahead_secs: f64,
    state: TransportState,
    session: Option<PlaybackSession>,
    /// Position used by the next play when seeking while not playing
    cue_secs: f64,
    next_id: u64,
}

impl fmt::Debug for TransportScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportScheduler")
            .field("state", &self.state)
            .field("session", &self.session.as_ref().map(|s| s.id))
            .field("cue_secs", &self.cue_secs)
            .finish()
    }
}

impl TransportScheduler {
    /// Create an idle scheduler
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use vocal_master::engine::{ManualClock, TransportScheduler, TransportState};
    ///
    /// let transport = TransportScheduler::new(Arc::new(ManualClock::new(0.0)), 0.1);
    /// assert_eq!(transport.state(), TransportState::Idle);
    /// assert_eq!(transport.elapsed(), 0.0);
    /// ```
    pub fn new(clock: Arc<dyn Clock>, lookahead_secs: f64) -> Self {
        Self {
            clock,
            lookahead_secs: lookahead_secs.max(0.0),
            state: TransportState::Idle,
            session: None,
            cue_secs: 0.0,
            next_id: 1,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// The current session, if playing
    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Id of the current session, if playing
    pub fn current_session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Position the next play will start from after an idle seek
    pub fn cue_secs(&self) -> f64 {
        self.cue_secs
    }

    /// Start all sources together from `offset_secs`
    ///
    /// Sources start at `now + lookahead`. A session already playing is
    /// stopped first.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use vocal_master::engine::{ManualClock, SessionSources, TransportScheduler};
    ///
    /// let clock = Arc::new(ManualClock::new(10.0));
    /// let mut transport = TransportScheduler::new(clock.clone(), 0.1);
    /// let session = transport.play(2.0, SessionSources::default());
    /// assert!((session.reference_start - 8.1).abs() < 1e-9);
    ///
    /// clock.advance(1.1);
    /// assert!((transport.elapsed() - 3.0).abs() < 1e-9);
    /// ```
    pub fn play(&mut self, offset_secs: f64, sources: SessionSources) -> &PlaybackSession {
        if self.state == TransportState::Playing {
            self.stop();
        }

        let offset_secs = offset_secs.max(0.0);
        let start_at = self.clock.now() + self.lookahead_secs;
        let id = self.next_id;
        self.next_id += 1;

        let session = PlaybackSession {
            id,
            start_at,
            offset_secs,
            reference_start: start_at - offset_secs,
            duration_secs: sources.max_duration_secs(),
            sources,
        };
        debug!(
            "Session {} scheduled at {:.3}s from offset {:.3}s (duration {:.3}s)",
            id, start_at, offset_secs, session.duration_secs
        );

        self.state = TransportState::Playing;
        self.cue_secs = offset_secs;
        self.session.insert(session)
    }

    /// Restart playback from the stored cue position
    pub fn play_from_cue(&mut self, sources: SessionSources) -> &PlaybackSession {
        let cue = self.cue_secs;
        self.play(cue, sources)
    }

    /// Halt all sources immediately; idempotent
    ///
    /// Returns the session that was stopped, if any.
    pub fn stop(&mut self) -> Option<PlaybackSession> {
        let stopped = self.session.take();
        if let Some(session) = &stopped {
            debug!("Session {} stopped", session.id);
            self.state = TransportState::Stopped;
        }
        stopped
    }

    /// Move the playhead
    ///
    /// While playing this is `stop()` followed by `play(offset)` with the
    /// same sources; the old session is silenced before the new one starts.
    /// Otherwise the position is only remembered for the next play.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use vocal_master::engine::{ManualClock, SessionSources, TransportScheduler};
    ///
    /// let clock = Arc::new(ManualClock::new(0.0));
    /// let mut transport = TransportScheduler::new(clock.clone(), 0.1);
    /// let first = transport.play(0.0, SessionSources::default()).id;
    /// let second = transport.seek(5.0).map(|s| s.id).unwrap();
    /// assert!(second > first);
    ///
    /// clock.advance(0.1);
    /// assert!((transport.elapsed() - 5.0).abs() < 1e-9);
    /// ```
    pub fn seek(&mut self, offset_secs: f64) -> Option<&PlaybackSession> {
        let offset_secs = offset_secs.max(0.0);
        match self.stop() {
            Some(previous) => Some(self.play(offset_secs, previous.sources)),
            None => {
                debug!("Cue set to {:.3}s", offset_secs);
                self.cue_secs = offset_secs;
                None
            }
        }
    }

    /// Seconds of source material played, `now - reference_start`
    ///
    /// Zero when not playing; never negative during the lookahead.
    pub fn elapsed(&self) -> f64 {
        match &self.session {
            Some(session) => (self.clock.now() - session.reference_start).max(0.0),
            None => 0.0,
        }
    }

    /// Duration of the current session (0 when not playing)
    pub fn duration(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.duration_secs)
    }

    /// Detect the natural end of the current session
    ///
    /// When elapsed time reaches the longest source the session ends and
    /// the transport moves to `Stopped`.
    pub fn poll(&mut self) -> Option<TransportEvent> {
        let session = self.session.as_ref()?;
        if self.clock.now() - session.reference_start < session.duration_secs {
            return None;
        }
        let session_id = session.id;
        self.session = None;
        self.state = TransportState::Stopped;
        self.cue_secs = 0.0;
        debug!("Session {} completed", session_id);
        Some(TransportEvent::Completed { session_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sources(vocal_secs: f64, beat_secs: f64) -> SessionSources {
        let frames = |secs: f64| (secs * 1000.0) as usize;
        SessionSources {
            vocal: Some(Arc::new(AudioBuffer::from_mono(
                vec![0.0; frames(vocal_secs)],
                1000,
            ))),
            voices: Vec::new(),
            beat: Some(Arc::new(AudioBuffer::from_mono(
                vec![0.0; frames(beat_secs)],
                1000,
            ))),
        }
    }

    fn scheduler() -> (Arc<ManualClock>, TransportScheduler) {
        let clock = Arc::new(ManualClock::new(100.0));
        let transport = TransportScheduler::new(clock.clone(), 0.1);
        (clock, transport)
    }

    #[test]
    fn test_play_schedules_with_lookahead() {
        let (_, mut transport) = scheduler();
        let session = transport.play(1.5, sources(3.0, 4.0));
        assert_relative_eq!(session.start_at, 100.1);
        assert_relative_eq!(session.reference_start, 98.6);
        assert_relative_eq!(session.duration_secs, 4.0);
        assert_eq!(transport.state(), TransportState::Playing);
    }

    #[test]
    fn test_elapsed_tracks_clock() {
        let (clock, mut transport) = scheduler();
        transport.play(0.0, sources(3.0, 3.0));
        assert_eq!(transport.elapsed(), 0.0);
        clock.advance(1.1);
        assert_relative_eq!(transport.elapsed(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_seek_replaces_session() {
        let (clock, mut transport) = scheduler();
        let first = transport.play(0.0, sources(10.0, 10.0)).id;
        clock.advance(2.0);

        let second = transport.seek(5.0).map(|s| s.id);
        assert!(second.unwrap() > first);
        assert_eq!(transport.current_session_id(), second);

        clock.advance(0.1);
        assert_relative_eq!(transport.elapsed(), 5.0, epsilon = 1e-9);
        clock.advance(1.0);
        assert_relative_eq!(transport.elapsed(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_seek_while_idle_only_cues() {
        let (_, mut transport) = scheduler();
        assert!(transport.seek(7.0).is_none());
        assert_eq!(transport.state(), TransportState::Idle);
        assert_eq!(transport.cue_secs(), 7.0);
        let session = transport.play_from_cue(sources(10.0, 0.0));
        assert_eq!(session.offset_secs, 7.0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (_, mut transport) = scheduler();
        transport.play(0.0, sources(1.0, 1.0));
        assert!(transport.stop().is_some());
        assert!(transport.stop().is_none());
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.elapsed(), 0.0);
    }

    #[test]
    fn test_auto_stop_at_longest_source() {
        let (clock, mut transport) = scheduler();
        let id = transport.play(0.0, sources(2.0, 3.0)).id;

        clock.advance(3.0);
        assert_eq!(transport.poll(), None);
        clock.advance(0.2);
        assert_eq!(
            transport.poll(),
            Some(TransportEvent::Completed { session_id: id })
        );
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.poll(), None);
    }

    #[test]
    fn test_harmony_voices_count_toward_duration() {
        let mut s = sources(2.0, 0.0);
        s.beat = None;
        s.voices = vec![HarmonyVoice::new(-1200.0)];
        assert_relative_eq!(s.max_duration_secs(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_session_ids_increase() {
        let (_, mut transport) = scheduler();
        let a = transport.play(0.0, SessionSources::default()).id;
        let b = transport.play(0.0, SessionSources::default()).id;
        let c = transport.seek(1.0).map(|s| s.id).unwrap();
        assert!(a < b && b < c);
    }
}
