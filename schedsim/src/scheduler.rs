//! Priority scheduler with an adaptive quantum and aging.
//!
//! Each tick dispatches at most one process for one quantum. Selection order
//! is (priority, larger remaining burst, lower io_bound, pid); the quantum
//! then follows CPU load and every process ages toward promotion.

use crate::process::{MIN_PRIORITY, Process, ProcessState};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Remaining burst at or below which a dispatched process is considered done.
const COMPLETION_THRESHOLD: f64 = 0.1;
const IDLE_DECAY: f64 = 0.8;
const EMA_OLD_WEIGHT: f64 = 0.4;
const EMA_NEW_WEIGHT: f64 = 0.6;
const MIN_INSTANT_CPU: f64 = 5.0;
const AGING_THRESHOLD: u32 = 5;
/// Seconds without scheduling attention before a process is parked as waiting.
const STALE_AFTER_SECS: f64 = 8.0;

pub const QUANTUM_SATURATED_MS: u64 = 50;
pub const QUANTUM_BUSY_MS: u64 = 70;
pub const QUANTUM_IDLE_MS: u64 = 90;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerMetrics {
    pub cpu: f64,
    pub quantum_ms: u64,
    pub running_pid: Option<u64>,
    pub time_slice: u64,
    pub process_count: usize,
}

#[derive(Debug)]
pub struct Scheduler {
    processes: Vec<Process>,
    quantum_ms: u64,
    cpu_utilization: f64,
    time_slice: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            quantum_ms: QUANTUM_IDLE_MS,
            cpu_utilization: 0.0,
            time_slice: 0,
        }
    }

    /// Track a process. Duplicate pids are kept as separate entries.
    pub fn add_process(&mut self, process: Process) {
        debug!(
            "[scheduler] added pid={} name={} priority={} burst={:.2}",
            process.pid, process.name, process.priority, process.cpu_burst
        );
        self.processes.push(process);
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn quantum_ms(&self) -> u64 {
        self.quantum_ms
    }

    pub fn cpu_utilization(&self) -> f64 {
        self.cpu_utilization
    }

    pub fn time_slice(&self) -> u64 {
        self.time_slice
    }

    /// Advance simulated time by one quantum at wall-clock `now` (epoch seconds).
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R, now: f64) -> SchedulerMetrics {
        let running_pid = match self.select() {
            Some(idx) => Some(self.dispatch(idx, rng, now)),
            None => {
                self.cpu_utilization *= IDLE_DECAY;
                None
            }
        };

        self.adapt_quantum();
        self.age_priorities();
        self.rebalance(now);

        SchedulerMetrics {
            cpu: round2(self.cpu_utilization),
            quantum_ms: self.quantum_ms,
            running_pid,
            time_slice: self.time_slice,
            process_count: self.processes.len(),
        }
    }

    fn select(&self) -> Option<usize> {
        self.processes
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_completed() && p.cpu_burst > 0.0)
            .min_by(|(_, a), (_, b)| dispatch_order(a, b))
            .map(|(idx, _)| idx)
    }

    fn dispatch<R: Rng + ?Sized>(&mut self, idx: usize, rng: &mut R, now: f64) -> u64 {
        let quantum_ms = self.quantum_ms;
        let proc = &mut self.processes[idx];
        proc.state = ProcessState::Running;
        proc.last_seen = now;

        let spike = rng.gen_range(0.8..=1.2);
        let cpu_use = (proc.cpu_burst * spike).min(100.0);
        let io_penalty = proc.io_bound * rng.gen_range(0.1..=0.3);
        let cpu_use = (cpu_use * (1.0 - io_penalty)).max(MIN_INSTANT_CPU);
        self.cpu_utilization = self.cpu_utilization * EMA_OLD_WEIGHT + cpu_use * EMA_NEW_WEIGHT;

        let quantum_secs = quantum_ms as f64 / 1000.0;
        let work_done = quantum_secs * (1.0 - proc.io_bound * 0.3);
        proc.cpu_burst = (proc.cpu_burst - work_done).max(0.0);
        proc.cpu_time_used += work_done;

        if proc.cpu_burst <= COMPLETION_THRESHOLD {
            proc.state = ProcessState::Completed;
            proc.cpu_burst = 0.0;
            proc.completion_time = Some(now);
            info!(
                "[scheduler] pid={} ({}) completed after {:.2}s of cpu",
                proc.pid, proc.name, proc.cpu_time_used
            );
        } else {
            proc.aging = proc.aging.saturating_sub(1);
        }

        self.time_slice += quantum_ms;
        proc.pid
    }

    fn adapt_quantum(&mut self) {
        let quantum = if self.cpu_utilization > 85.0 {
            QUANTUM_SATURATED_MS
        } else if self.cpu_utilization > 70.0 {
            QUANTUM_BUSY_MS
        } else {
            QUANTUM_IDLE_MS
        };
        if quantum != self.quantum_ms {
            debug!(
                "[scheduler] quantum {}ms -> {}ms (cpu={:.1}%)",
                self.quantum_ms, quantum, self.cpu_utilization
            );
            self.quantum_ms = quantum;
        }
    }

    // Applies to completed processes as well; their counter keeps moving
    // but priority no longer matters for them.
    fn age_priorities(&mut self) {
        for proc in &mut self.processes {
            proc.aging += 1;
            if proc.aging > AGING_THRESHOLD && proc.priority > MIN_PRIORITY {
                proc.priority -= 1;
                proc.aging = 0;
            }
        }
    }

    fn rebalance(&mut self, now: f64) {
        for proc in self.processes.iter_mut().filter(|p| !p.is_completed()) {
            if now - proc.last_seen > STALE_AFTER_SECS {
                proc.state = ProcessState::Waiting;
            } else if proc.state != ProcessState::Running {
                proc.state = ProcessState::Ready;
            }
        }
    }
}

fn dispatch_order(a: &Process, b: &Process) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.cpu_burst.total_cmp(&a.cpu_burst))
        .then_with(|| a.io_bound.total_cmp(&b.io_bound))
        .then_with(|| a.pid.cmp(&b.pid))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
