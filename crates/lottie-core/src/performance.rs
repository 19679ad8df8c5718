use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Running mean of the render times reported for one layer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderTime {
    pub mean_millis: f32,
    pub samples: u32,
}

impl RenderTime {
    fn add(&mut self, millis: f32) {
        self.samples += 1;
        self.mean_millis += (millis - self.mean_millis) / self.samples as f32;
    }
}

/// Per-layer render timings, collected only while enabled.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    enabled: AtomicBool,
    render_times: Mutex<HashMap<String, RenderTime>>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn record_render_time(&self, layer_name: &str, millis: f32) {
        if !self.is_enabled() {
            return;
        }
        let mut times = self
            .render_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        times.entry(layer_name.to_string()).or_default().add(millis);
    }

    /// Layers by mean render time, slowest first.
    pub fn sorted_render_times(&self) -> Vec<(String, RenderTime)> {
        let times = self
            .render_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut sorted: Vec<_> = times.iter().map(|(k, v)| (k.clone(), *v)).collect();
        sorted.sort_by(|a, b| b.1.mean_millis.total_cmp(&a.1.mean_millis));
        sorted
    }

    pub fn clear_render_times(&self) {
        self.render_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn log_render_times(&self) {
        if !self.is_enabled() {
            return;
        }
        let sorted = self.sorted_render_times();
        tracing::info!("Render times ({} layers):", sorted.len());
        for (layer, time) in sorted {
            tracing::info!(
                "  {:<20} {:>8.3} ms ({} samples)",
                layer,
                time.mean_millis,
                time.samples
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let tracker = PerformanceTracker::new();
        tracker.record_render_time("bg", 3.0);
        assert!(tracker.sorted_render_times().is_empty());
    }

    #[test]
    fn test_mean_and_ordering() {
        let tracker = PerformanceTracker::new();
        tracker.set_enabled(true);
        tracker.record_render_time("fast", 1.0);
        tracker.record_render_time("slow", 4.0);
        tracker.record_render_time("slow", 6.0);

        let sorted = tracker.sorted_render_times();
        assert_eq!(sorted[0].0, "slow");
        assert_eq!(sorted[0].1.mean_millis, 5.0);
        assert_eq!(sorted[0].1.samples, 2);
        assert_eq!(sorted[1].0, "fast");

        tracker.clear_render_times();
        assert!(tracker.sorted_render_times().is_empty());
    }
}
