// Null output - drives the engine from a timer when there is no sound card

use super::renderer::PeriodRenderer;
use super::{ClientError, ClientRequest};
use crate::interchange::InterchangeSlot;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct NullOutput {
    close: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    buffer_size: usize,
}

impl NullOutput {
    pub fn open(request: ClientRequest, slot: InterchangeSlot) -> Result<Self, ClientError> {
        let close = Arc::new(AtomicBool::new(false));
        let close_clone = close.clone();
        let frames = request.buffer_size.max(1);
        let period = Duration::from_secs_f64(frames as f64 / request.sample_rate.max(1) as f64);

        let thread = thread::Builder::new()
            .name(format!("rtsynth-null-{}", request.instance))
            .spawn(move || {
                let mut renderer = PeriodRenderer::new(slot);
                let mut next = Instant::now();
                while !close_clone.load(Ordering::Acquire) {
                    renderer.fill(frames, |_, _| {});
                    next += period;
                    let now = Instant::now();
                    if next > now {
                        thread::park_timeout(next - now);
                    } else {
                        // en retard: on repart de maintenant
                        next = now;
                    }
                }
            })
            .map_err(|e| ClientError::Thread(e.to_string()))?;

        tracing::info!(
            instance = request.instance,
            "No audio: rendering {} frames every {:?}",
            frames,
            period
        );
        Ok(Self {
            close,
            thread: Some(thread),
            sample_rate: request.sample_rate,
            buffer_size: frames,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.close.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

impl Drop for NullOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
