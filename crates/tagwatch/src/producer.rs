//! Background capture thread feeding the [`FrameBuffer`].

use crate::camera::{Camera, CaptureError};
use crate::frame::Frame;
use crate::frame_buffer::FrameBuffer;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("could not grab the first frame: {0}")]
    FirstFrame(#[source] CaptureError),
    #[error("producer already started")]
    AlreadyStarted,
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("capture thread panicked")]
    Panicked,
}

/// Body of the capture thread; yields the camera back when it ends.
type CaptureJob = Box<dyn FnOnce() -> Option<Box<dyn Camera>> + Send>;

enum State {
    Idle(Box<dyn Camera>),
    Running(JoinHandle<Option<Box<dyn Camera>>>),
    Stopped,
}

fn spawn_capture_thread(job: CaptureJob) -> io::Result<JoinHandle<Option<Box<dyn Camera>>>> {
    thread::Builder::new()
        .name("tagwatch-capture".to_string())
        .spawn(job)
}

/// Owns the camera and the thread that keeps the buffer fresh.
///
/// Lifecycle: [`new`](Self::new) → [`start`](Self::start) →
/// [`stop`](Self::stop). Dropping a producer stops it as well.
pub struct FrameProducer {
    buffer: Arc<FrameBuffer>,
    running: Arc<AtomicBool>,
    captured: Arc<AtomicU64>,
    state: State,
}

impl FrameProducer {
    pub fn new(camera: Box<dyn Camera>, buffer: Arc<FrameBuffer>) -> Self {
        Self {
            buffer,
            running: Arc::new(AtomicBool::new(false)),
            captured: Arc::new(AtomicU64::new(0)),
            state: State::Idle(camera),
        }
    }

    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    /// Frames published so far, including the first one.
    pub fn frames_captured(&self) -> u64 {
        self.captured.load(Ordering::Relaxed)
    }

    /// Capture one frame synchronously, then hand the camera to the capture
    /// thread. On return the buffer is guaranteed to hold a frame.
    pub fn start(&mut self) -> Result<(), ProducerError> {
        self.start_with(spawn_capture_thread)
    }

    fn start_with<S>(&mut self, spawn: S) -> Result<(), ProducerError>
    where
        S: FnOnce(CaptureJob) -> io::Result<JoinHandle<Option<Box<dyn Camera>>>>,
    {
        let State::Idle(camera) = &mut self.state else {
            return Err(ProducerError::AlreadyStarted);
        };
        let first = camera.capture().map_err(ProducerError::FirstFrame)?;
        self.buffer.publish(Frame::new(0, first));
        self.captured.store(1, Ordering::Relaxed);

        let State::Idle(camera) = std::mem::replace(&mut self.state, State::Stopped) else {
            return Err(ProducerError::AlreadyStarted);
        };

        self.running.store(true, Ordering::Release);
        // a failed spawn drops the job, the slot keeps the camera
        let slot = Arc::new(Mutex::new(Some(CaptureLoop {
            camera,
            buffer: Arc::clone(&self.buffer),
            running: Arc::clone(&self.running),
            captured: Arc::clone(&self.captured),
        })));
        let handoff = Arc::clone(&slot);
        let job: CaptureJob = Box::new(move || {
            let worker = handoff.lock().ok().and_then(|mut w| w.take());
            worker.map(CaptureLoop::run)
        });

        match spawn(job) {
            Ok(handle) => {
                self.state = State::Running(handle);
                log::debug!("capture thread started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                let worker = slot.lock().ok().and_then(|mut w| w.take());
                if let Some(worker) = worker {
                    self.state = State::Idle(worker.camera);
                }
                Err(ProducerError::Spawn(e))
            }
        }
    }

    /// Stop capturing, join the thread and release the camera.
    ///
    /// Returns once the in-flight capture (if any) has finished.
    pub fn stop(mut self) -> Result<(), ProducerError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), ProducerError> {
        self.running.store(false, Ordering::Release);
        match std::mem::replace(&mut self.state, State::Stopped) {
            State::Idle(mut camera) => {
                camera.release();
                Ok(())
            }
            State::Running(handle) => match handle.join() {
                Ok(camera) => {
                    if let Some(mut camera) = camera {
                        camera.release();
                    }
                    log::debug!(
                        "capture thread joined after {} frames",
                        self.frames_captured()
                    );
                    Ok(())
                }
                Err(_) => Err(ProducerError::Panicked),
            },
            State::Stopped => Ok(()),
        }
    }
}

impl Drop for FrameProducer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("frame producer: {e}");
        }
    }
}

struct CaptureLoop {
    camera: Box<dyn Camera>,
    buffer: Arc<FrameBuffer>,
    running: Arc<AtomicBool>,
    captured: Arc<AtomicU64>,
}

impl CaptureLoop {
    fn run(mut self) -> Box<dyn Camera> {
        let mut seq = self.captured.load(Ordering::Relaxed);
        while self.running.load(Ordering::Acquire) {
            match self.camera.capture() {
                Ok(image) => {
                    self.buffer.publish(Frame::new(seq, image));
                    seq += 1;
                    self.captured.store(seq, Ordering::Relaxed);
                }
                Err(e) => log::warn!("Could not read picture: {e}"),
            }
        }
        self.camera
    }
}
