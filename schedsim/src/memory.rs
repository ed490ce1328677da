//! Working-set memory model.
//!
//! Every tick each process's working set takes a bounded random walk, then a
//! global pressure policy shrinks or expands all of them at once. The policy is
//! a negative-feedback loop: it corrects in the tick a threshold is crossed but
//! may need several ticks to get back inside the band.

use crate::process::Process;
use crate::scheduler::round2;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_TOTAL_MEMORY_MB: u64 = 16_384;
pub const MIN_WORKING_SET_MB: u64 = 64;

const WALK_DOWN_MB: i64 = -32;
const WALK_UP_MB: i64 = 48;
const PAGE_FAULT_PROBABILITY: f64 = 0.08;
const HIGH_PRESSURE: f64 = 0.90;
const LOW_PRESSURE: f64 = 0.50;
const SHRINK_FACTOR: f64 = 0.85;
const EXPAND_FACTOR: f64 = 1.05;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryMetrics {
    pub memory_used: u64,
    pub memory_total: u64,
    /// Percentage, 0-100.
    pub memory_pressure: f64,
    pub page_faults: u64,
    pub memory_timestamp: f64,
}

#[derive(Debug)]
pub struct MemoryManager {
    total_memory_mb: u64,
    used_memory_mb: u64,
    page_faults: u64,
    working_sets: HashMap<u64, u64>,
    last_updated: f64,
}

impl MemoryManager {
    pub fn new(total_memory_mb: u64, now: f64) -> Self {
        Self {
            total_memory_mb,
            used_memory_mb: 0,
            page_faults: 0,
            working_sets: HashMap::new(),
            last_updated: now,
        }
    }

    pub fn total_memory_mb(&self) -> u64 {
        self.total_memory_mb
    }

    pub fn used_memory_mb(&self) -> u64 {
        self.used_memory_mb
    }

    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    pub fn working_set(&self, pid: u64) -> Option<u64> {
        self.working_sets.get(&pid).copied()
    }

    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        processes: &[Process],
        rng: &mut R,
        now: f64,
    ) -> MemoryMetrics {
        // The walk step is per tick, not scaled by elapsed wall time.
        let elapsed = (now - self.last_updated).max(1.0);
        self.last_updated = now;

        let mut usage: u64 = 0;
        for proc in processes {
            let current = self.working_set_or_baseline(proc);
            let delta = rng.gen_range(WALK_DOWN_MB..=WALK_UP_MB);
            let next = current
                .saturating_add_signed(delta)
                .max(MIN_WORKING_SET_MB);
            self.working_sets.insert(proc.pid, next);
            usage = usage.saturating_add(next);
            if rng.gen_bool(PAGE_FAULT_PROBABILITY) {
                self.page_faults += 1;
            }
        }

        self.used_memory_mb = usage.min(self.total_memory_mb);
        let pressure = if self.total_memory_mb == 0 {
            0.0
        } else {
            self.used_memory_mb as f64 / self.total_memory_mb as f64
        };

        if pressure > HIGH_PRESSURE {
            debug!(
                "[memory] pressure {:.1}% after {:.1}s, shrinking working sets",
                pressure * 100.0,
                elapsed
            );
            self.shrink(processes);
        } else if pressure < LOW_PRESSURE {
            self.expand(processes);
        }

        MemoryMetrics {
            memory_used: self.used_memory_mb,
            memory_total: self.total_memory_mb,
            memory_pressure: round2(pressure * 100.0),
            page_faults: self.page_faults,
            memory_timestamp: now,
        }
    }

    fn working_set_or_baseline(&self, proc: &Process) -> u64 {
        self.working_set(proc.pid).unwrap_or(proc.memory_mb)
    }

    fn shrink(&mut self, processes: &[Process]) {
        for proc in processes {
            let ws = self.working_set_or_baseline(proc);
            let shrunk = ((ws as f64 * SHRINK_FACTOR) as u64).max(MIN_WORKING_SET_MB);
            self.working_sets.insert(proc.pid, shrunk);
        }
    }

    fn expand(&mut self, processes: &[Process]) {
        for proc in processes {
            let ws = self.working_set_or_baseline(proc);
            let grown = ((ws as f64 * EXPAND_FACTOR) as u64).min(proc.memory_mb.saturating_mul(2));
            self.working_sets.insert(proc.pid, grown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessSpec;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const NOW: f64 = 1_700_000_000.0;

    fn process_with_memory(pid: u64, memory_mb: i64) -> Process {
        let spec = ProcessSpec {
            memory_mb: Some(memory_mb),
            ..Default::default()
        };
        let mut proc = Process::from_spec(&spec, &mut StdRng::seed_from_u64(pid), NOW);
        proc.pid = pid;
        proc
    }

    #[test]
    fn empty_tick_reports_zero_pressure() {
        let mut mem = MemoryManager::new(DEFAULT_TOTAL_MEMORY_MB, NOW);
        let m = mem.tick(&[], &mut StdRng::seed_from_u64(0), NOW + 1.0);

        assert_eq!(m.memory_used, 0);
        assert_eq!(m.memory_total, DEFAULT_TOTAL_MEMORY_MB);
        assert_eq!(m.memory_pressure, 0.0);
        assert_eq!(m.page_faults, 0);
        assert_eq!(m.memory_timestamp, NOW + 1.0);
    }

    #[test]
    fn working_sets_start_from_baseline_and_walk() {
        let procs = vec![process_with_memory(1, 1000)];
        let mut mem = MemoryManager::new(DEFAULT_TOTAL_MEMORY_MB, NOW);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(mem.working_set(1), None);

        mem.tick(&procs, &mut rng, NOW);
        // Low pressure, so the walked value is also expanded by 5%.
        let ws = mem.working_set(1).unwrap();
        assert!(ws >= (968.0 * 1.05) as u64 && ws <= (1048.0 * 1.05) as u64);
    }

    #[test]
    fn working_set_never_drops_below_floor() {
        let procs = vec![process_with_memory(1, 64), process_with_memory(2, 70)];
        let mut mem = MemoryManager::new(200, NOW);
        let mut rng = StdRng::seed_from_u64(2);

        for i in 0..200 {
            mem.tick(&procs, &mut rng, NOW + i as f64);
            for proc in &procs {
                assert!(mem.working_set(proc.pid).unwrap() >= MIN_WORKING_SET_MB);
            }
        }
    }

    #[test]
    fn high_pressure_shrinks_every_working_set() {
        let procs = vec![process_with_memory(1, 2048), process_with_memory(2, 2048)];
        let mut mem = MemoryManager::new(1024, NOW);
        let mut rng = StdRng::seed_from_u64(3);
        let mut previous: Vec<u64> = procs.iter().map(|p| p.memory_mb).collect();

        for i in 0..5 {
            let m = mem.tick(&procs, &mut rng, NOW + i as f64);
            assert!(m.memory_pressure > 90.0);
            for (proc, prev) in procs.iter().zip(previous.iter_mut()) {
                let ws = mem.working_set(proc.pid).unwrap();
                assert!(ws <= *prev, "pid {} grew from {} to {}", proc.pid, prev, ws);
                assert!(ws >= MIN_WORKING_SET_MB);
                *prev = ws;
            }
        }
    }

    #[test]
    fn low_pressure_expansion_is_capped_at_twice_baseline() {
        let procs = vec![process_with_memory(1, 100)];
        let mut mem = MemoryManager::new(DEFAULT_TOTAL_MEMORY_MB, NOW);
        let mut rng = StdRng::seed_from_u64(4);

        for i in 0..300 {
            mem.tick(&procs, &mut rng, NOW + i as f64);
            assert!(mem.working_set(1).unwrap() <= 200);
        }
    }

    #[test]
    fn used_memory_is_clamped_and_pressure_bounded() {
        let procs: Vec<Process> = (1..=8).map(|pid| process_with_memory(pid, 4096)).collect();
        let mut mem = MemoryManager::new(8192, NOW);
        let mut rng = StdRng::seed_from_u64(5);
        let mut faults = 0;

        for i in 0..100 {
            let m = mem.tick(&procs, &mut rng, NOW + i as f64);
            assert!(m.memory_used <= m.memory_total);
            assert!((0.0..=100.0).contains(&m.memory_pressure));
            assert!(m.page_faults >= faults);
            faults = m.page_faults;
        }
        assert_eq!(mem.page_faults(), faults);
        assert!(mem.used_memory_mb() <= mem.total_memory_mb());
    }

    #[test]
    fn mid_band_pressure_leaves_walk_uncorrected() {
        let procs = vec![process_with_memory(1, 1000)];
        let mut mem = MemoryManager::new(1500, NOW);
        let m = mem.tick(&procs, &mut StdRng::seed_from_u64(6), NOW);

        assert!((50.0..=90.0).contains(&m.memory_pressure));
        let ws = mem.working_set(1).unwrap();
        assert!((968..=1048).contains(&ws), "working set {ws} was corrected");
        assert_eq!(mem.used_memory_mb(), ws);
    }

    #[test]
    fn oversized_baselines_saturate_instead_of_overflowing() {
        let mut procs: Vec<Process> = (1..=5).map(|pid| process_with_memory(pid, 1)).collect();
        for proc in &mut procs {
            proc.memory_mb = 1 << 62;
        }
        procs[0].memory_mb = u64::MAX;
        let mut mem = MemoryManager::new(DEFAULT_TOTAL_MEMORY_MB, NOW);
        let mut rng = StdRng::seed_from_u64(8);

        for i in 0..3 {
            let m = mem.tick(&procs, &mut rng, NOW + i as f64);
            assert_eq!(m.memory_used, mem.total_memory_mb());
            assert_eq!(m.memory_pressure, 100.0);
        }
        assert!(mem.working_set(1).unwrap() >= MIN_WORKING_SET_MB);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let procs = vec![process_with_memory(1, 512), process_with_memory(2, 900)];
        let run = |seed| {
            let mut mem = MemoryManager::new(2048, NOW);
            let mut rng = StdRng::seed_from_u64(seed);
            (0..20)
                .map(|i| mem.tick(&procs, &mut rng, NOW + i as f64))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }
}
