//! Synchronous and background loading through byte sources.

use crossbeam_channel::{bounded, Receiver};
use lottie_loader::{
    load_sync, ByteSource, BytesSource, Composition, ErrorKind, FileSource, Loader, ParseError,
};
use serde_json::json;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Outcome = Result<Arc<Composition>, ParseError>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn minimal_bytes() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "v": "5.7.0", "fr": 30, "ip": 0, "op": 60, "w": 100, "h": 100,
        "layers": [{ "ty": 3, "ind": 1, "nm": "Null" }]
    }))
    .unwrap()
}

fn listen(loader: &Loader, source: impl ByteSource) -> Receiver<Outcome> {
    let (tx, rx) = bounded(4);
    loader.load_async(source, 1.0, move |outcome| {
        let _ = tx.send(outcome);
    });
    rx
}

mod sync {
    use super::*;

    #[test]
    fn test_load_from_file() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.json");
        std::fs::write(&path, minimal_bytes()).unwrap();

        let comp = load_sync(&FileSource::new(&path), 2.0).unwrap();
        assert_eq!(comp.layers().len(), 1);
        assert_eq!(comp.bounds().width(), 200.0);
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_sync(&FileSource::new(dir.path().join("missing.json")), 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    }

    #[test]
    fn test_truncated_stream_is_source_unavailable() {
        let mut bytes = minimal_bytes();
        bytes.truncate(bytes.len() / 2);
        let err = load_sync(&BytesSource::new("half", bytes), 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    }

    #[test]
    fn test_closure_source() {
        let source = || -> io::Result<Box<dyn Read + Send>> {
            Ok(Box::new(Cursor::new(minimal_bytes())))
        };
        assert!(load_sync(&source, 1.0).is_ok());
    }
}

mod background {
    use super::*;

    #[test]
    fn test_delivers_exactly_one_outcome() {
        init_tracing();
        let loader = Loader::with_threads(2).unwrap();
        let rx = listen(&loader, BytesSource::new("minimal", minimal_bytes()));

        let comp = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(comp.duration_millis(), 2000.0);

        drop(loader);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failure_is_delivered() {
        let loader = Loader::with_threads(1).unwrap();
        let rx = listen(&loader, BytesSource::new("garbage", b"{ not json".to_vec()));

        let err = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedSyntax);
    }

    #[test]
    fn test_cancel_suppresses_delivery() {
        init_tracing();
        let loader = Loader::with_threads(1).unwrap();
        let (gate_tx, gate_rx) = bounded::<()>(1);
        let opened = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&opened);
        let source = move || -> io::Result<Box<dyn Read + Send>> {
            counter.fetch_add(1, Ordering::SeqCst);
            // Hold the worker until the test has cancelled.
            let _ = gate_rx.recv();
            Ok(Box::new(Cursor::new(minimal_bytes())))
        };

        let (tx, rx) = bounded::<Outcome>(1);
        let handle = loader.load_async(source, 1.0, move |outcome| {
            let _ = tx.send(outcome);
        });
        handle.cancel();
        assert!(handle.is_cancelled());
        gate_tx.send(()).unwrap();

        // Dropping the loader waits for the worker and the dispatcher to finish.
        drop(loader);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_many_loads_share_the_pool() {
        let loader = Loader::with_threads(2).unwrap();
        let (tx, rx) = bounded::<Outcome>(16);
        for i in 0..8 {
            let tx = tx.clone();
            loader.load_async(
                BytesSource::new(format!("anim-{i}"), minimal_bytes()),
                1.0,
                move |outcome| {
                    let _ = tx.send(outcome);
                },
            );
        }
        drop(tx);
        drop(loader);

        let delivered: Vec<Outcome> = rx.iter().collect();
        assert_eq!(delivered.len(), 8);
        assert!(delivered.iter().all(|o| o.is_ok()));
    }
}
