//! Simulated process records and the workload preset table.
//!
//! A [`Process`] is a passive record: the scheduler mutates its scheduling
//! fields, the memory manager only reads `pid` and `memory_mb`. Processes are
//! built from a [`ProcessSpec`], where every field is optional and anything
//! missing (or zero) is derived from the workload's preset.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;
/// Ceiling for any baseline footprint, so working-set arithmetic stays in range.
pub const MAX_MEMORY_MB: u64 = 1 << 32;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    Light,
    #[default]
    Medium,
    Heavy,
}

impl From<&str> for Workload {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "light" => Self::Light,
            "medium" => Self::Medium,
            "heavy" => Self::Heavy,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Heavy => "heavy",
        };
        f.write_str(name)
    }
}

/// Default ranges a workload class draws from when the spec leaves a field out.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadPreset {
    pub cpu_burst: RangeInclusive<f64>,
    pub io_bound: f64,
    pub memory_mb: RangeInclusive<u64>,
}

impl Workload {
    pub fn preset(self) -> WorkloadPreset {
        match self {
            Self::Light => WorkloadPreset {
                cpu_burst: 8.0..=18.0,
                io_bound: 0.6,
                memory_mb: 120..=256,
            },
            Self::Medium => WorkloadPreset {
                cpu_burst: 25.0..=55.0,
                io_bound: 0.3,
                memory_mb: 256..=768,
            },
            Self::Heavy => WorkloadPreset {
                cpu_burst: 60.0..=92.0,
                io_bound: 0.15,
                memory_mb: 768..=2048,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    #[default]
    Ready,
    Running,
    Waiting,
    Completed,
}

/// Caller-supplied description of a process to submit.
///
/// Numeric fields are signed so the HTTP layer can see (and reject) negative
/// input; the core itself treats anything non-positive as "not given".
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProcessSpec {
    pub name: Option<String>,
    pub workload: Option<String>,
    pub priority: Option<i64>,
    pub cpu_burst: Option<f64>,
    pub cpu_range: Option<(f64, f64)>,
    pub io_bound: Option<f64>,
    pub memory_mb: Option<i64>,
    pub memory_range: Option<(i64, i64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Process {
    pub pid: u64,
    pub name: String,
    pub priority: u8,
    pub workload: Workload,
    pub cpu_burst: f64,
    pub initial_burst: f64,
    pub io_bound: f64,
    pub memory_mb: u64,
    pub aging: u32,
    pub state: ProcessState,
    pub arrival_time: f64,
    pub last_seen: f64,
    pub cpu_time_used: f64,
    pub completion_time: Option<f64>,
}

impl Process {
    /// Resolve a spec against the workload presets and stamp it at `now`
    /// (epoch seconds).
    pub fn from_spec<R: Rng + ?Sized>(spec: &ProcessSpec, rng: &mut R, now: f64) -> Self {
        let workload = spec
            .workload
            .as_deref()
            .map(Workload::from)
            .unwrap_or_default();
        let preset = workload.preset();

        let pid = (now * 1000.0) as u64 + rng.gen_range(1..=500);
        let name = spec
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Process-{}", pid % 10_000));

        let priority = match spec.priority {
            Some(p) => p.clamp(i64::from(MIN_PRIORITY), i64::from(MAX_PRIORITY)) as u8,
            None => rng.gen_range(MIN_PRIORITY..=MAX_PRIORITY),
        };

        let cpu_burst = match positive_f64(spec.cpu_burst) {
            Some(burst) => burst,
            None => {
                let range = spec
                    .cpu_range
                    .filter(|(lo, hi)| lo.is_finite() && hi.is_finite() && *lo >= 0.0 && lo <= hi)
                    .map(|(lo, hi)| lo..=hi)
                    .unwrap_or(preset.cpu_burst);
                rng.gen_range(range)
            }
        };

        let io_bound = positive_f64(spec.io_bound)
            .map(|io| io.min(1.0))
            .unwrap_or(preset.io_bound);

        let memory_mb = match spec.memory_mb.filter(|mb| *mb > 0) {
            Some(mb) => (mb as u64).min(MAX_MEMORY_MB),
            None => {
                let range = spec
                    .memory_range
                    .filter(|(lo, hi)| *lo >= 0 && lo <= hi)
                    .map(|(lo, hi)| {
                        (lo as u64).min(MAX_MEMORY_MB)..=(hi as u64).min(MAX_MEMORY_MB)
                    })
                    .unwrap_or(preset.memory_mb);
                rng.gen_range(range)
            }
        };

        Self {
            pid,
            name,
            priority,
            workload,
            cpu_burst,
            initial_burst: cpu_burst,
            io_bound,
            memory_mb,
            aging: 0,
            state: ProcessState::Ready,
            arrival_time: now,
            last_seen: now,
            cpu_time_used: 0.0,
            completion_time: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == ProcessState::Completed
    }
}

fn positive_f64(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}
