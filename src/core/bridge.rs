//! WorkerBridge: extraction -> simulation -> rendering on a dedicated thread
//!
//! The worker thread owns everything it computes; the caller only talks to it
//! through channels (jobs in, progress and one reply out). One job may be
//! outstanding at a time. Termination stops the worker at the next
//! generation and the in-flight job never gets a reply.

use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::core::extractor::{Extraction, PatternExtractor};
use crate::core::renderer::BitmapRenderer;
use crate::core::simulator::LifeSimulator;
use crate::types::{BridgeError, GenerationResult, Progress, Settled};
use crate::PROGRESS_INTERVAL;

/// Run the whole pipeline on one response text.
/// `observer` sees every generation and may stop the run.
pub fn run_pipeline<F, B>(text: &str, observer: F) -> Result<GenerationResult, B>
where
    F: FnMut(Progress) -> ControlFlow<B>,
{
    let pattern = match PatternExtractor::new().extract(text) {
        Extraction::Found(p) => p,
        Extraction::Miss(reason) => {
            info!(reason = reason.code(), "no pattern in response");
            return Ok(GenerationResult::text_only(
                text,
                Some(format!("No pattern found: {}", reason.description())),
            ));
        }
    };

    info!(
        rows = pattern.matrix.rows(),
        cols = pattern.matrix.cols(),
        iterations = pattern.iterations,
        "simulating extracted pattern"
    );
    for warning in &pattern.warnings {
        warn!("{}", warning);
    }

    let result = LifeSimulator::new().run_with(&pattern.matrix, pattern.iterations, observer)?;
    let image = BitmapRenderer::new().render(&result.final_matrix);

    let mut notes = vec![format!(
        "{}x{} grid, {} generations",
        pattern.matrix.cols(),
        pattern.matrix.rows(),
        result.requested
    )];
    match result.settled {
        Some(Settled::Stable { at }) => notes.push(format!("stable from generation {}", at)),
        Some(Settled::Cycle { at, period }) => notes.push(format!(
            "period {} cycle from generation {}",
            period,
            at - period
        )),
        None => {}
    }
    notes.extend(pattern.warnings.iter().map(|w| w.description().to_string()));

    Ok(GenerationResult {
        text: text.to_string(),
        image: Some(image),
        message: Some(notes.join("; ")),
    })
}

type Reply = Result<GenerationResult, BridgeError>;

/// Response text that makes the worker panic, for exercising fault handling
#[cfg(test)]
pub(crate) const FAULT_TRIGGER: &str = "<<force worker fault>>";

struct Job {
    text: String,
    reply: oneshot::Sender<Reply>,
    progress: mpsc::UnboundedSender<Progress>,
}

/// Stops a worker from any thread or task
#[derive(Debug, Clone)]
pub struct Terminator {
    stop: Arc<AtomicBool>,
}

impl Terminator {
    pub fn terminate(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Handle to the worker thread. Dropping it terminates the worker.
#[derive(Debug)]
pub struct WorkerBridge {
    jobs: Option<std_mpsc::Sender<Job>>,
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("text_len", &self.text.len()).finish()
    }
}

impl WorkerBridge {
    /// Start the worker thread
    pub fn spawn() -> Result<Self, BridgeError> {
        let (tx, rx) = std_mpsc::channel::<Job>();
        let stop = Arc::new(AtomicBool::new(false));
        let busy = Arc::new(AtomicBool::new(false));

        let handle = {
            let stop = Arc::clone(&stop);
            let busy = Arc::clone(&busy);
            thread::Builder::new()
                .name("life-worker".to_string())
                .spawn(move || worker_loop(rx, stop, busy))
                .map_err(|e| BridgeError::Fault(format!("failed to start worker: {}", e)))?
        };

        debug!("worker started");
        Ok(Self {
            jobs: Some(tx),
            handle: Some(handle),
            stop,
            busy,
        })
    }

    /// Hand one response text to the worker. Fails with `Busy` while a
    /// previous job is outstanding.
    pub fn submit(&self, text: impl Into<String>) -> Result<PendingGeneration, BridgeError> {
        if self.is_terminated() {
            return Err(BridgeError::Terminated);
        }
        let jobs = self.jobs.as_ref().ok_or(BridgeError::Terminated)?;
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BridgeError::Busy);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let job = Job {
            text: text.into(),
            reply: reply_tx,
            progress: progress_tx,
        };
        if jobs.send(job).is_err() {
            self.busy.store(false, Ordering::SeqCst);
            return Err(BridgeError::Terminated);
        }

        Ok(PendingGeneration {
            reply: reply_rx,
            progress: progress_rx,
        })
    }

    /// Whether a job is outstanding
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.stop.load(Ordering::SeqCst) || self.jobs.is_none()
    }

    /// Handle that can stop this worker from elsewhere
    pub fn terminator(&self) -> Terminator {
        Terminator {
            stop: Arc::clone(&self.stop),
        }
    }

    /// Stop the worker and wait for its thread to exit
    pub fn terminate(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("worker thread panicked during shutdown");
            }
            debug!("worker stopped");
        }
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn worker_loop(jobs: std_mpsc::Receiver<Job>, stop: Arc<AtomicBool>, busy: Arc<AtomicBool>) {
    while let Ok(job) = jobs.recv() {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let Job {
            text,
            reply,
            progress,
        } = job;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            #[cfg(test)]
            if text == FAULT_TRIGGER {
                panic!("forced pipeline fault");
            }
            run_pipeline(&text, |p| {
                if stop.load(Ordering::SeqCst) {
                    return ControlFlow::Break(());
                }
                if p.done % PROGRESS_INTERVAL == 0 {
                    let _ = progress.send(p);
                }
                ControlFlow::Continue(())
            })
        }));

        busy.store(false, Ordering::SeqCst);
        if stop.load(Ordering::SeqCst) {
            info!("worker terminated, dropping in-flight reply");
            break;
        }
        match outcome {
            Ok(Ok(result)) => {
                let _ = reply.send(Ok(result));
            }
            Ok(Err(())) => {
                info!("job abandoned, worker terminated");
                break;
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("pipeline panicked: {}", detail);
                let _ = reply.send(Err(BridgeError::Fault(detail)));
            }
        }
    }
    busy.store(false, Ordering::SeqCst);
}

/// Reply slot for one submitted job
#[derive(Debug)]
pub struct PendingGeneration {
    reply: oneshot::Receiver<Reply>,
    progress: mpsc::UnboundedReceiver<Progress>,
}

impl PendingGeneration {
    /// Wait for the result
    pub async fn wait(self) -> Result<GenerationResult, BridgeError> {
        self.wait_with_progress(|_| {}).await
    }

    /// Wait for the result, reporting progress as it arrives.
    /// A worker that went away without replying yields `Terminated`.
    pub async fn wait_with_progress<F>(mut self, mut on_progress: F) -> Result<GenerationResult, BridgeError>
    where
        F: FnMut(Progress),
    {
        loop {
            tokio::select! {
                Some(p) = self.progress.recv() => on_progress(p),
                reply = &mut self.reply => {
                    return match reply {
                        Ok(result) => result,
                        Err(_) => Err(BridgeError::Terminated),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_found() {
        let text = "```\n0,1,0\n0,1,0\n0,1,0\n```\n1";
        let result: Result<_, ()> = run_pipeline(text, |_| ControlFlow::Continue(()));
        let result = result.unwrap();
        let image = result.image.expect("image");
        assert_eq!(image.dimensions(), (3, 3));
        // vertical blinker turned horizontal
        assert_eq!(*image.get_pixel(0, 1), crate::core::renderer::LIVE_COLOR);
        assert_eq!(*image.get_pixel(1, 0), crate::core::renderer::DEAD_COLOR);
        assert_eq!(result.text, text);
        assert!(result.message.unwrap().contains("3x3 grid"));
    }

    #[test]
    fn test_pipeline_miss_is_success_without_image() {
        let result: Result<_, ()> = run_pipeline("just words", |_| ControlFlow::Continue(()));
        let result = result.unwrap();
        assert!(!result.has_image());
        assert!(result.message.unwrap().contains("no matrix code block"));
    }

    #[test]
    fn test_pipeline_cancel() {
        let text = "```\n1,1,0\n0,1,1\n0,1,0\n```\n500";
        let result = run_pipeline(text, |p| {
            if p.done >= 3 {
                ControlFlow::Break("stop")
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(matches!(result, Err("stop")));
    }

    #[tokio::test]
    async fn test_bridge_roundtrip() {
        let bridge = WorkerBridge::spawn().unwrap();
        let pending = bridge.submit("```\n1,1\n1,1\n```\n10").unwrap();
        let result = pending.wait().await.unwrap();
        assert!(result.has_image());
        assert!(!bridge.is_busy());
    }

    #[tokio::test]
    async fn test_panic_becomes_fault_and_frees_slot() {
        let bridge = WorkerBridge::spawn().unwrap();

        let fault = bridge.submit(FAULT_TRIGGER).unwrap().wait().await;
        assert_eq!(fault.err(), Some(BridgeError::Fault("forced pipeline fault".to_string())));
        assert!(!bridge.is_busy());
        assert!(!bridge.is_terminated());

        let next = bridge.submit("```\n1,1\n1,1\n```\n3").unwrap().wait().await.unwrap();
        assert!(next.has_image());
    }

    #[tokio::test]
    async fn test_terminated_bridge_rejects_jobs() {
        let mut bridge = WorkerBridge::spawn().unwrap();
        bridge.terminate();
        assert!(bridge.is_terminated());
        assert_eq!(bridge.submit("x").err(), Some(BridgeError::Terminated));
    }
}
