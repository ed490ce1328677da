//! Rolling history of merged tick metrics.

use crate::detector::Finding;
use crate::memory::MemoryMetrics;
use crate::scheduler::SchedulerMetrics;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 120;
pub const DEFAULT_SNAPSHOT_HISTORY: usize = 30;

/// Scheduler and memory outputs of one tick, plus what the detector found.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TickMetrics {
    #[serde(flatten)]
    pub scheduler: SchedulerMetrics,
    #[serde(flatten)]
    pub memory: MemoryMetrics,
    pub bottlenecks: Vec<Finding>,
    /// Set by the aggregator on push.
    pub timestamp: f64,
}

impl TickMetrics {
    pub fn merge(scheduler: SchedulerMetrics, memory: MemoryMetrics) -> Self {
        Self {
            scheduler,
            memory,
            bottlenecks: Vec::new(),
            timestamp: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub latest: TickMetrics,
    /// Oldest first.
    pub history: Vec<TickMetrics>,
}

#[derive(Debug)]
pub struct MetricsAggregator {
    history: VecDeque<TickMetrics>,
    capacity: usize,
    snapshot_len: usize,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_SNAPSHOT_HISTORY)
    }
}

impl MetricsAggregator {
    pub fn new(capacity: usize, snapshot_len: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            snapshot_len: snapshot_len.min(capacity),
        }
    }

    pub fn push(&mut self, mut metrics: TickMetrics, now: f64) {
        metrics.timestamp = now;
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(metrics);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&TickMetrics> {
        self.history.back()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let Some(latest) = self.history.back() else {
            return MetricsSnapshot::default();
        };
        let skip = self.history.len().saturating_sub(self.snapshot_len);
        MetricsSnapshot {
            latest: latest.clone(),
            history: self.history.iter().skip(skip).cloned().collect(),
        }
    }
}
