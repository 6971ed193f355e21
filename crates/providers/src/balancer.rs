use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Picks one of `candidates` adapters that can all serve `model`.
/// Returns an index in `0..candidates`; `candidates` is never zero.
pub trait LoadBalancer: Send + Sync {
    fn name(&self) -> &str;
    fn select(&self, model: &str, candidates: usize) -> usize;
}

/// Per-model cursor advancing by one on every selection.
///
/// Cursors live in memory only and start from zero on every process start.
#[derive(Default)]
pub struct RoundRobinBalancer {
    cursors: RwLock<HashMap<String, Arc<AtomicUsize>>>,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    fn cursor(&self, model: &str) -> Arc<AtomicUsize> {
        if let Some(cursor) = self.cursors.read().get(model) {
            return cursor.clone();
        }
        self.cursors
            .write()
            .entry(model.to_string())
            .or_default()
            .clone()
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn name(&self) -> &str {
        "round_robin"
    }

    fn select(&self, model: &str, candidates: usize) -> usize {
        if candidates <= 1 {
            return 0;
        }
        self.cursor(model).fetch_add(1, Ordering::Relaxed) % candidates
    }
}

/// Always the first candidate in insertion order.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAvailableBalancer;

impl LoadBalancer for FirstAvailableBalancer {
    fn name(&self) -> &str {
        "first_available"
    }

    fn select(&self, _model: &str, _candidates: usize) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancerPolicy {
    #[default]
    RoundRobin,
    FirstAvailable,
}

impl BalancerPolicy {
    pub fn build(self) -> Arc<dyn LoadBalancer> {
        match self {
            BalancerPolicy::RoundRobin => Arc::new(RoundRobinBalancer::new()),
            BalancerPolicy::FirstAvailable => Arc::new(FirstAvailableBalancer),
        }
    }
}
