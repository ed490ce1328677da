//! Simulation context: the scheduler, memory manager and aggregator behind one
//! lock, plus the background loop that ticks them.
//!
//! Every mutation and every consistent read goes through
//! [`Simulation::transaction`], so a composite tick (select, simulate, merge,
//! detect, push) is never observed half-done. Stopping flips a flag the loop
//! checks before each tick; a tick already in progress always completes.

use crate::clock::{Clock, SystemClock};
use crate::config::SimulationConfig;
use crate::detector::{BottleneckDetector, Severity};
use crate::memory::MemoryManager;
use crate::metrics::{MetricsAggregator, MetricsSnapshot, TickMetrics};
use crate::process::{Process, ProcessSpec};
use crate::scheduler::Scheduler;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;

pub struct SimState {
    pub scheduler: Scheduler,
    pub memory: MemoryManager,
    pub aggregator: MetricsAggregator,
    detector: BottleneckDetector,
    rng: Box<dyn RngCore + Send>,
    running: bool,
    // Bumped on every start so a loop left over from an earlier start exits.
    generation: u64,
}

impl SimState {
    fn tick(&mut self, now: f64) -> TickMetrics {
        let sched = self.scheduler.tick(&mut *self.rng, now);
        let mem = self
            .memory
            .tick(self.scheduler.processes(), &mut *self.rng, now);

        let mut merged = TickMetrics::merge(sched, mem);
        merged.bottlenecks = self.detector.detect(&merged);
        if merged
            .bottlenecks
            .iter()
            .any(|f| f.level == Severity::Critical)
        {
            debug!(
                "[sim] critical bottleneck at cpu={:.1}% mem={:.1}%",
                merged.scheduler.cpu, merged.memory.memory_pressure
            );
        }

        merged.timestamp = now;
        self.aggregator.push(merged.clone(), now);
        merged
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulingAverages {
    pub completed: usize,
    pub avg_turnaround_s: f64,
    pub avg_waiting_s: f64,
}

impl SchedulingAverages {
    /// Turnaround is completion minus arrival; waiting is turnaround minus
    /// time actually spent on the CPU.
    pub fn from_processes(processes: &[Process]) -> Self {
        let (count, turnaround, waiting) = processes
            .iter()
            .filter_map(|p| p.completion_time.map(|done| (p, done - p.arrival_time)))
            .fold((0usize, 0.0, 0.0), |(n, tat, wt), (p, turnaround)| {
                let waiting = (turnaround - p.cpu_time_used).max(0.0);
                (n + 1, tat + turnaround, wt + waiting)
            });
        if count == 0 {
            return Self::default();
        }
        Self {
            completed: count,
            avg_turnaround_s: turnaround / count as f64,
            avg_waiting_s: waiting / count as f64,
        }
    }
}

/// What a poller sees: latest metrics with history, the live process table
/// and whether the loop is running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationView {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
    pub processes: Vec<Process>,
    pub running: bool,
    pub averages: SchedulingAverages,
}

pub struct Simulation {
    state: Mutex<SimState>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
}

impl Simulation {
    pub fn new(config: &SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => {
                info!("[sim] using fixed seed {seed}");
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };
        Self::with_parts(config, Box::new(rng), Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: &SimulationConfig,
        rng: Box<dyn RngCore + Send>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let state = SimState {
            scheduler: Scheduler::new(),
            memory: MemoryManager::new(config.total_memory_mb, now),
            aggregator: MetricsAggregator::new(config.history_capacity, config.snapshot_history),
            detector: BottleneckDetector::new(),
            rng,
            running: false,
            generation: 0,
        };
        Self {
            state: Mutex::new(state),
            clock,
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
        }
    }

    /// Run `f` with exclusive access to the whole simulation state.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn submit(&self, spec: &ProcessSpec) -> Process {
        let now = self.clock.now();
        let proc = self.transaction(|state| {
            let proc = Process::from_spec(spec, &mut *state.rng, now);
            state.scheduler.add_process(proc.clone());
            proc
        });
        info!(
            "[sim] submitted pid={} name={} workload={} priority={}",
            proc.pid, proc.name, proc.workload, proc.priority
        );
        proc
    }

    pub fn process_count(&self) -> usize {
        self.transaction(|state| state.scheduler.processes().len())
    }

    /// One composite tick. The result is pushed into history exactly once.
    pub fn run_tick(&self) -> TickMetrics {
        let now = self.clock.now();
        self.transaction(|state| state.tick(now))
    }

    pub fn snapshot(&self) -> SimulationView {
        self.transaction(|state| {
            let processes = state.scheduler.processes().to_vec();
            SimulationView {
                metrics: state.aggregator.snapshot(),
                averages: SchedulingAverages::from_processes(&processes),
                processes,
                running: state.running,
            }
        })
    }

    pub fn is_running(&self) -> bool {
        self.transaction(|state| state.running)
    }

    /// Returns whether the running state changed.
    pub fn set_running(self: &Arc<Self>, running: bool) -> bool {
        if running { self.start() } else { self.stop() }
    }

    /// Start the background loop. A no-op if it is already running, or if
    /// there is no Tokio runtime to spawn it on.
    pub fn start(self: &Arc<Self>) -> bool {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                warn!("[sim] cannot start tick loop outside a runtime: {err}");
                return false;
            }
        };

        let generation = self.transaction(|state| {
            if state.running {
                return None;
            }
            state.running = true;
            state.generation += 1;
            Some(state.generation)
        });
        let Some(generation) = generation else {
            return false;
        };

        info!(
            "[sim] starting tick loop every {}ms",
            self.tick_interval.as_millis()
        );
        handle.spawn(run_loop(Arc::clone(self), generation));
        true
    }

    pub fn stop(&self) -> bool {
        let changed = self.transaction(|state| std::mem::replace(&mut state.running, false));
        if changed {
            info!("[sim] stopping tick loop");
        }
        changed
    }
}

async fn run_loop(sim: Arc<Simulation>, generation: u64) {
    let mut ticker = tokio::time::interval(sim.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let now = sim.clock.now();
        let ticked = sim.transaction(|state| {
            if !state.running || state.generation != generation {
                return false;
            }
            state.tick(now);
            true
        });
        if !ticked {
            break;
        }
    }
    debug!("[sim] tick loop generation {generation} exited");
}
