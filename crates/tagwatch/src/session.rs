//! The main loop: fetch the latest frame, process it, repeat until told to
//! stop.

use crate::display::{Display, DisplayEvent};
use crate::pipeline::DetectionPipeline;
use crate::producer::{FrameProducer, ProducerError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tagwatch_core::format_g6;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Producer(#[from] ProducerError),
    #[error("frame buffer empty after start")]
    NoFrame,
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

/// Shared stop request, set from signal handlers or the UI.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancel on SIGINT and SIGTERM.
    pub fn register_signals(&self) -> Result<(), SessionError> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        for sig in [SIGINT, SIGTERM] {
            signal_hook::flag::register(sig, Arc::clone(&self.0))
                .map_err(SessionError::Signal)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Running,
    Draining,
    Stopped,
}

/// Frames per second over fixed windows of frames.
#[derive(Debug)]
pub struct FpsCounter {
    every: u32,
    frames: u32,
    window_start: Instant,
    last: Option<f64>,
}

impl FpsCounter {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            frames: 0,
            window_start: Instant::now(),
            last: None,
        }
    }

    /// Count a frame; returns the rate when a window completes.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        if self.frames < self.every {
            return None;
        }
        let secs = now.duration_since(self.window_start).as_secs_f64();
        let fps = if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            f64::INFINITY
        };
        self.frames = 0;
        self.window_start = now;
        self.last = Some(fps);
        Some(fps)
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }
}

/// What a finished session did.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub frames_processed: u64,
    /// Captured frames never processed, from gaps in sequence numbers.
    pub frames_skipped: u64,
    pub frames_captured: u64,
    pub last_fps: Option<f64>,
    pub final_state: SessionState,
}

pub struct Session {
    producer: FrameProducer,
    pipeline: DetectionPipeline,
    display: Option<Box<dyn Display>>,
    token: CancellationToken,
    frame_limit: Option<u64>,
}

impl Session {
    pub fn new(
        producer: FrameProducer,
        pipeline: DetectionPipeline,
        display: Option<Box<dyn Display>>,
        token: CancellationToken,
        frame_limit: Option<u64>,
    ) -> Self {
        Self {
            producer,
            pipeline,
            display,
            token,
            frame_limit,
        }
    }

    /// Run until cancelled or the frame limit is reached, then stop the
    /// producer and release the camera.
    pub fn run(mut self) -> Result<SessionSummary, SessionError> {
        self.producer.start()?;
        log::debug!("session running");

        let loop_result = self.run_loop();

        log::debug!("session draining");
        let frames_captured = self.producer.frames_captured();
        let Session { producer, .. } = self;
        producer.stop()?;

        let mut summary = loop_result?;
        summary.frames_captured = frames_captured;
        summary.final_state = SessionState::Stopped;
        Ok(summary)
    }

    fn run_loop(&mut self) -> Result<SessionSummary, SessionError> {
        let mut fps = FpsCounter::new(10);
        let mut processed = 0u64;
        let mut skipped = 0u64;
        let mut last_seq: Option<u64> = None;

        while !self.token.is_cancelled() {
            if self.frame_limit.is_some_and(|n| processed >= n) {
                break;
            }
            let frame = self
                .producer
                .buffer()
                .fetch_latest()
                .ok_or(SessionError::NoFrame)?;
            if let Some(prev) = last_seq {
                skipped += frame.seq.saturating_sub(prev).saturating_sub(1);
            }
            last_seq = Some(frame.seq);

            let report = self.pipeline.process(&frame);
            processed += 1;

            if let Some(rate) = fps.tick() {
                log::info!("  {} fps", format_g6(rate));
            }

            if let (Some(display), Some(img)) = (self.display.as_mut(), report.annotated.as_ref())
            {
                if display.show(img) == DisplayEvent::Quit {
                    log::info!("quit requested from the window");
                    self.token.cancel();
                }
            }
        }

        Ok(SessionSummary {
            frames_processed: processed,
            frames_skipped: skipped,
            frames_captured: 0,
            last_fps: fps.last(),
            final_state: SessionState::Draining,
        })
    }
}
