//! Progress model updated by materialising passes.
//!
//! The engine only writes positions and messages into bar values; a
//! host that wants rendering observes the registry from its own loop.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

/// One progress bar model. Position updates are monotonic.
pub struct ProgressBar {
    topic: &'static str,
    unit: &'static str,
    total: Option<u64>,
    position: AtomicU64,
    message: Mutex<Option<String>>,
}

impl ProgressBar {
    fn new(topic: &'static str, total: Option<u64>, unit: &'static str) -> Self {
        ProgressBar {
            topic,
            unit,
            total,
            position: AtomicU64::new(0),
            message: Mutex::new(None),
        }
    }

    /// What the bar measures, ex. `"filtering"`.
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Unit of the position, ex. `"commits"`.
    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// Expected total, if known up front.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Advance the position.
    pub fn increase_position(&self, delta: u64) {
        self.position.fetch_add(delta, Ordering::Relaxed);
    }

    /// Replace the free-form message shown next to the bar.
    pub fn set_message(&self, message: String) {
        *self.message.lock().unwrap() = Some(message);
    }

    /// Current message, if any.
    pub fn message(&self) -> Option<String> {
        self.message.lock().unwrap().clone()
    }
}

/// Registry of live progress bars, owned by the services bundle.
/// Dropped bars disappear from [`bars`](ProgressRegistry::bars).
#[derive(Default)]
pub struct ProgressRegistry {
    bars: Mutex<Vec<Weak<ProgressBar>>>,
}

impl ProgressRegistry {
    /// Create and register a new bar.
    pub fn bar(&self, topic: &'static str, total: Option<u64>, unit: &'static str) -> Arc<ProgressBar> {
        let bar = Arc::new(ProgressBar::new(topic, total, unit));
        let mut bars = self.bars.lock().unwrap();
        bars.retain(|b| b.strong_count() > 0);
        bars.push(Arc::downgrade(&bar));
        bar
    }

    /// Snapshot of the live bars.
    pub fn bars(&self) -> Vec<Arc<ProgressBar>> {
        self.bars
            .lock()
            .unwrap()
            .iter()
            .filter_map(|b| b.upgrade())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_updates() {
        let registry = ProgressRegistry::default();
        let bar = registry.bar("filtering", Some(10), "commits");
        bar.increase_position(1);
        bar.increase_position(2);
        bar.set_message("(prefetch text)".to_string());
        assert_eq!(bar.position(), 3);
        assert_eq!(bar.total(), Some(10));
        assert_eq!(registry.bars().len(), 1);
    }

    #[test]
    fn test_dropped_bars_are_pruned() {
        let registry = ProgressRegistry::default();
        drop(registry.bar("filtering", None, "commits"));
        assert!(registry.bars().is_empty());
    }
}
