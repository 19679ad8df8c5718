use crate::source::ByteSource;
use crossbeam_channel::{unbounded, Sender};
use lottie_core::{Composition, ParseError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

type Delivery = Box<dyn FnOnce() + Send>;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("failed to build loader thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to spawn dispatcher thread: {0}")]
    Dispatcher(#[from] io::Error),
}

/// Handle to one asynchronous load.
///
/// Cancelling never blocks. A parse already running finishes on its worker,
/// but its outcome is dropped instead of delivered.
#[derive(Debug, Clone, Default)]
pub struct Cancellable {
    cancelled: Arc<AtomicBool>,
}

impl Cancellable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Opens `source` and parses it on the current thread.
pub fn load_sync<S>(source: &S, scale: f32) -> Result<Composition, ParseError>
where
    S: ByteSource + ?Sized,
{
    let started = Instant::now();
    let reader = source.open()?;
    let composition = lottie_core::parse(reader, scale)?;
    tracing::info!(
        "Loaded {} in {:?} ({} layers, {} warnings)",
        source.describe(),
        started.elapsed(),
        composition.layers().len(),
        composition.warnings().len()
    );
    Ok(composition)
}

/// Parses animations on a worker pool.
///
/// Every listener runs on the loader's single dispatcher thread, one at a
/// time, in the order parses complete.
pub struct Loader {
    pool: rayon::ThreadPool,
    dispatch_tx: Option<Sender<Delivery>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Loader {
    /// A loader with one worker per available CPU.
    pub fn new() -> Result<Self, LoaderError> {
        Self::with_threads(0)
    }

    /// A loader with `threads` workers; `0` picks the CPU count.
    pub fn with_threads(threads: usize) -> Result<Self, LoaderError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("lottie-loader-{i}"))
            .build()?;

        let (dispatch_tx, dispatch_rx) = unbounded::<Delivery>();
        let dispatcher = thread::Builder::new()
            .name("lottie-dispatch".to_string())
            .spawn(move || {
                for deliver in dispatch_rx {
                    deliver();
                }
                tracing::debug!("Loader dispatcher stopped");
            })?;

        Ok(Loader {
            pool,
            dispatch_tx: Some(dispatch_tx),
            dispatcher: Some(dispatcher),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Parses `source` on a worker and passes the outcome to `listener`.
    ///
    /// `listener` is called at most once, on the dispatcher thread, and not at
    /// all if the returned handle is cancelled before delivery.
    pub fn load_async<S, F>(&self, source: S, scale: f32, listener: F) -> Cancellable
    where
        S: ByteSource,
        F: FnOnce(Result<Arc<Composition>, ParseError>) + Send + 'static,
    {
        let handle = Cancellable::new();
        let Some(dispatch_tx) = self.dispatch_tx.clone() else {
            return handle;
        };
        let cancelled = handle.clone();

        self.pool.spawn(move || {
            let outcome = load_sync(&source, scale).map(Arc::new);
            if cancelled.is_cancelled() {
                tracing::debug!("Load of {} cancelled, dropping result", source.describe());
                return;
            }

            let deliver: Delivery = Box::new(move || {
                if !cancelled.is_cancelled() {
                    listener(outcome);
                }
            });
            if dispatch_tx.send(deliver).is_err() {
                tracing::warn!("Loader shut down before {} was delivered", source.describe());
            }
        });

        handle
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        // Closing our sender lets the dispatcher exit once in-flight loads have delivered.
        self.dispatch_tx.take();
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.thread().id() != thread::current().id() {
                let _ = dispatcher.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BytesSource;
    use std::time::Duration;

    const MINIMAL: &[u8] = br#"{"v":"5.7.0","fr":30,"ip":0,"op":60,"w":100,"h":100,"layers":[]}"#;

    #[test]
    fn test_cancellable_flag() {
        let handle = Cancellable::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_load_sync_from_bytes() {
        let comp = load_sync(&BytesSource::new("minimal", MINIMAL), 1.0).unwrap();
        assert_eq!(comp.duration_millis(), 2000.0);
    }

    #[test]
    fn test_listener_runs_on_dispatcher() {
        let loader = Loader::with_threads(2).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        loader.load_async(BytesSource::new("minimal", MINIMAL), 1.0, move |result| {
            let name = thread::current().name().map(str::to_string);
            let _ = tx.send((result.is_ok(), name));
        });

        let (ok, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(ok);
        assert_eq!(name.as_deref(), Some("lottie-dispatch"));
    }
}
