use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use crate::recognizer::{OcrBackend, OcrError};
use crate::types::RecognitionHit;

/// Pending jobs allowed before callers block.
const QUEUE_DEPTH: usize = 64;

/// An engine that must stay on the thread that created it.
pub trait LocalEngine {
    fn recognize(&mut self, image_bytes: &[u8]) -> Result<Vec<RecognitionHit>, OcrError>;
}

struct Job {
    image: Vec<u8>,
    reply: SyncSender<Result<Vec<RecognitionHit>, OcrError>>,
}

/// Owns a single engine instance on a dedicated thread and feeds it jobs.
///
/// The engine is built on the worker thread before `spawn` returns, so a
/// broken model surfaces at startup. It lives until the worker is dropped.
pub struct RecognitionWorker {
    name: &'static str,
    jobs: SyncSender<Job>,
}

impl RecognitionWorker {
    pub fn spawn<E, F>(name: &'static str, init: F) -> Result<Self, OcrError>
    where
        E: LocalEngine,
        F: FnOnce() -> Result<E, OcrError> + Send + 'static,
    {
        let (jobs, rx) = mpsc::sync_channel::<Job>(QUEUE_DEPTH);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), OcrError>>(1);

        thread::Builder::new()
            .name(format!("{name}-worker"))
            .spawn(move || match init() {
                Ok(engine) => {
                    let _ = ready_tx.send(Ok(()));
                    run(engine, rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| OcrError::Engine(format!("failed to start {name} worker: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| OcrError::Engine(format!("{name} worker exited during startup")))??;
        tracing::info!(engine = name, "recognition worker ready");
        Ok(Self { name, jobs })
    }
}

fn run<E: LocalEngine>(mut engine: E, jobs: Receiver<Job>) {
    // Ends once every sender (the worker handle) is gone.
    for job in jobs {
        let result = engine.recognize(&job.image);
        let _ = job.reply.send(result);
    }
}

impl OcrBackend for RecognitionWorker {
    fn name(&self) -> &'static str {
        self.name
    }

    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<RecognitionHit>, OcrError> {
        let stopped = || OcrError::Engine(format!("{} worker stopped", self.name));
        let (reply, result) = mpsc::sync_channel(1);
        self.jobs
            .send(Job { image: image_bytes.to_vec(), reply })
            .map_err(|_| stopped())?;
        result.recv().map_err(|_| stopped())?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Not `Send`, like a real engine handle; echoes the payload length.
    struct LengthEngine {
        _not_send: Rc<()>,
        calls: usize,
    }

    impl LocalEngine for LengthEngine {
        fn recognize(&mut self, image_bytes: &[u8]) -> Result<Vec<RecognitionHit>, OcrError> {
            self.calls += 1;
            if image_bytes.is_empty() {
                return Err(OcrError::ImageDecode("empty".into()));
            }
            Ok(vec![RecognitionHit::unplaced(
                format!("{}:{}", image_bytes.len(), self.calls),
                0.5,
            )])
        }
    }

    fn spawn_counted(inits: Arc<AtomicUsize>) -> RecognitionWorker {
        RecognitionWorker::spawn("length", move || {
            inits.fetch_add(1, Ordering::SeqCst);
            Ok(LengthEngine { _not_send: Rc::new(()), calls: 0 })
        })
        .unwrap()
    }

    #[test]
    fn engine_is_built_once_and_reused() {
        let inits = Arc::new(AtomicUsize::new(0));
        let worker = spawn_counted(inits.clone());
        assert_eq!(inits.load(Ordering::SeqCst), 1);

        assert_eq!(worker.recognize(b"abc").unwrap()[0].text, "3:1");
        assert_eq!(worker.recognize(b"abcd").unwrap()[0].text, "4:2");
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(worker.name(), "length");
    }

    #[test]
    fn concurrent_callers_share_one_engine() {
        let inits = Arc::new(AtomicUsize::new(0));
        let worker = Arc::new(spawn_counted(inits.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let w = Arc::clone(&worker);
                thread::spawn(move || w.recognize(b"xy").unwrap())
            })
            .collect();
        let mut counts: Vec<usize> = handles
            .into_iter()
            .map(|h| h.join().unwrap()[0].text.split(':').nth(1).unwrap().parse().unwrap())
            .collect();
        counts.sort_unstable();

        assert_eq!(counts, (1..=8).collect::<Vec<_>>());
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn engine_errors_reach_the_caller() {
        let worker = spawn_counted(Arc::new(AtomicUsize::new(0)));
        assert!(matches!(worker.recognize(b""), Err(OcrError::ImageDecode(_))));
        // The worker survives a failed job.
        assert!(worker.recognize(b"a").is_ok());
    }

    #[test]
    fn init_failure_is_reported_by_spawn() {
        let r = RecognitionWorker::spawn("broken", || -> Result<LengthEngine, OcrError> {
            Err(OcrError::Engine("no traineddata".into()))
        });
        match r {
            Err(OcrError::Engine(msg)) => assert_eq!(msg, "no traineddata"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("spawn should fail"),
        }
    }
}
