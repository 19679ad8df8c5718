use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Advisory messages about a composition, deduplicated by exact text.
///
/// Appends go through `&self` so renderers holding a shared composition can
/// report too. Nothing ever reads the set to decide what to do.
#[derive(Debug, Default)]
pub struct Warnings {
    inner: Mutex<WarningLog>,
}

#[derive(Debug, Default)]
struct WarningLog {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message`; returns `false` when the same text was already present.
    pub fn add(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let mut log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if log.seen.contains(&message) {
            return false;
        }
        tracing::warn!("{}", message);
        log.seen.insert(message.clone());
        log.ordered.push(message);
        true
    }

    /// All messages in first-insertion order.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .clone()
    }

    /// Like [`Warnings::add`], but places a new message ahead of all others.
    pub(crate) fn add_first(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let mut log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if log.seen.contains(&message) {
            return false;
        }
        tracing::warn!("{}", message);
        log.seen.insert(message.clone());
        log.ordered.insert(0, message);
        true
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_deduplicates_and_keeps_order() {
        let warnings = Warnings::new();
        assert!(warnings.add("b"));
        assert!(warnings.add("a"));
        assert!(!warnings.add("b"));
        assert_eq!(warnings.snapshot(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_add_first_goes_ahead() {
        let warnings = Warnings::new();
        warnings.add("later");
        assert!(warnings.add_first("early"));
        assert!(!warnings.add_first("later"));
        assert_eq!(warnings.snapshot(), vec!["early".to_string(), "later".to_string()]);
    }

    #[test]
    fn test_concurrent_adds() {
        let warnings = Arc::new(Warnings::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let warnings = Arc::clone(&warnings);
                thread::spawn(move || {
                    for n in 0..50 {
                        warnings.add(format!("w{}", (i * 50 + n) % 100));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(warnings.len(), 100);
    }
}
