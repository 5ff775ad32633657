// Playback lifecycle for one run: NONE -> LOADING -> PLAYING -> FINISHED.
//
// The machine is synchronous. Time enters only through `step`, which the
// session calls when a frame timer fires; each tick carries the playback
// generation it was scheduled for so ticks that outlive a cancel are dropped.

use std::time::Duration;

use serde::Serialize;

use crate::engine::config::*;
use crate::engine::telemetry::TelemetryFrame;
use crate::error::{Error, Result};
use crate::metrics;

/// Lifecycle phase of a run's playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimationState {
    /// Idle: no run in flight.
    #[default]
    None,
    /// Submission in flight, no frames yet.
    Loading,
    /// Frames being replayed on a timer.
    Playing,
    /// Every frame delivered.
    Finished,
}

impl std::fmt::Display for AnimationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnimationState::None => write!(f, "NONE"),
            AnimationState::Loading => write!(f, "LOADING"),
            AnimationState::Playing => write!(f, "PLAYING"),
            AnimationState::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Receives every frame the machine delivers, in order.
pub trait FrameSink: Send {
    fn deliver(&mut self, frame: &TelemetryFrame);
}

impl<F> FrameSink for F
where
    F: FnMut(&TelemetryFrame) + Send,
{
    fn deliver(&mut self, frame: &TelemetryFrame) {
        self(frame)
    }
}

/// What a run request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunRequest {
    /// NONE -> LOADING; the caller should submit.
    Started,
    /// FINISHED -> NONE -> LOADING; the display was reset first, the caller should submit.
    Restarted,
    /// Already LOADING; nothing to do.
    AlreadyLoading,
    /// PLAYING; runs are not accepted until playback ends or is cancelled.
    Ignored,
}

impl RunRequest {
    pub fn should_submit(&self) -> bool {
        matches!(self, RunRequest::Started | RunRequest::Restarted)
    }
}

/// Result of one playback tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A frame was delivered and more remain; schedule the next tick.
    Frame,
    /// The last frame was delivered; the machine is FINISHED.
    Finished,
    /// The tick belongs to a playback that no longer exists.
    Stale,
}

/// Map the user-facing speed control (0..=500) to a frame delay.
pub fn delay_for_speed(speed: u64) -> Duration {
    Duration::from_millis(MAX_SPEED - speed.min(MAX_SPEED))
}

pub struct AnimationStateMachine {
    state: AnimationState,
    frames: Vec<TelemetryFrame>,
    cursor: usize,
    delay: Duration,
    generation: u64,
    sink: Box<dyn FrameSink>,
}

impl AnimationStateMachine {
    pub fn new(sink: impl FrameSink + 'static) -> Self {
        Self::with_delay(Duration::from_millis(DEFAULT_FRAME_DELAY_MS), sink)
    }

    pub fn with_delay(delay: Duration, sink: impl FrameSink + 'static) -> Self {
        Self {
            state: AnimationState::None,
            frames: Vec::new(),
            cursor: 0,
            delay,
            generation: 0,
            sink: Box::new(sink),
        }
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the frame delay. A tick already scheduled keeps its old delay.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn set_speed(&mut self, speed: u64) {
        self.delay = delay_for_speed(speed);
    }

    /// Index of the next frame to deliver.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }

    /// Current playback generation. Ticks scheduled for older generations are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The user asked to run.
    pub fn begin_run(&mut self) -> RunRequest {
        match self.state {
            AnimationState::None => {
                self.state = AnimationState::Loading;
                RunRequest::Started
            }
            AnimationState::Finished => {
                self.reset();
                self.state = AnimationState::Loading;
                RunRequest::Restarted
            }
            AnimationState::Loading => RunRequest::AlreadyLoading,
            AnimationState::Playing => RunRequest::Ignored,
        }
    }

    /// Hand a successful run's telemetry to the machine.
    ///
    /// Enters PLAYING with the cursor at 0. An empty sequence goes straight
    /// back to NONE and reports `EmptyTelemetry`. Outside LOADING the frames
    /// are dropped.
    pub fn load(&mut self, frames: Vec<TelemetryFrame>) -> Result<()> {
        if self.state != AnimationState::Loading {
            tracing::debug!(state = %self.state, "telemetry arrived outside LOADING, dropped");
            return Ok(());
        }
        if frames.is_empty() {
            self.state = AnimationState::None;
            return Err(Error::EmptyTelemetry);
        }

        tracing::info!(frames = frames.len(), "playback started");
        self.frames = frames;
        self.cursor = 0;
        self.generation += 1;
        self.state = AnimationState::Playing;
        metrics::ACTIVE_PLAYBACKS.inc();
        Ok(())
    }

    /// LOADING -> NONE without playback (failed run, or a score-only outcome).
    pub fn settle(&mut self) {
        if self.state == AnimationState::Loading {
            self.state = AnimationState::None;
        }
    }

    /// Deliver the next frame if `generation` is the live playback.
    pub fn step(&mut self, generation: u64) -> Step {
        if self.state != AnimationState::Playing || generation != self.generation {
            return Step::Stale;
        }

        let Some(frame) = self.frames.get(self.cursor) else {
            self.finish();
            return Step::Finished;
        };
        self.sink.deliver(frame);
        self.cursor += 1;
        metrics::FRAMES_DELIVERED_TOTAL.inc();

        if self.cursor >= self.frames.len() {
            self.finish();
            Step::Finished
        } else {
            Step::Frame
        }
    }

    fn finish(&mut self) {
        tracing::info!(frames = self.frames.len(), "playback finished");
        self.state = AnimationState::Finished;
        metrics::ACTIVE_PLAYBACKS.dec();
        metrics::PLAYBACKS_FINISHED_TOTAL.inc();
    }

    /// PLAYING -> NONE. Remaining frames are dropped and any pending tick goes stale.
    /// Returns false (and does nothing) in any other state.
    pub fn cancel(&mut self) -> bool {
        if self.state != AnimationState::Playing {
            return false;
        }
        tracing::info!(
            delivered = self.cursor,
            dropped = self.remaining(),
            "playback cancelled"
        );
        self.frames.clear();
        self.cursor = 0;
        self.generation += 1;
        self.state = AnimationState::None;
        metrics::ACTIVE_PLAYBACKS.dec();
        metrics::PLAYBACKS_CANCELLED_TOTAL.inc();
        true
    }

    /// Put the display back at the start state and go idle.
    ///
    /// Allowed from NONE and FINISHED; returns the frame delivered to the sink,
    /// or `None` while a run is loading or playing.
    pub fn reset(&mut self) -> Option<TelemetryFrame> {
        match self.state {
            AnimationState::None | AnimationState::Finished => {
                let frame = TelemetryFrame::initial();
                self.sink.deliver(&frame);
                self.frames.clear();
                self.cursor = 0;
                self.state = AnimationState::None;
                Some(frame)
            }
            AnimationState::Loading | AnimationState::Playing => None,
        }
    }
}

impl Drop for AnimationStateMachine {
    fn drop(&mut self) {
        // A playback torn down mid-run never reaches finish() or cancel()
        if self.state == AnimationState::Playing {
            metrics::ACTIVE_PLAYBACKS.dec();
        }
    }
}
