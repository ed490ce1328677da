pub mod api;
pub mod clock;
pub mod config;
pub mod detector;
pub mod memory;
pub mod metrics;
pub mod process;
pub mod scheduler;
pub mod simulation;

pub use config::{Config, LoggingConfig, ServerConfig, SimulationConfig};
pub use detector::{BottleneckDetector, Finding, FindingKind, Severity};
pub use memory::{MemoryManager, MemoryMetrics};
pub use metrics::{MetricsAggregator, MetricsSnapshot, TickMetrics};
pub use process::{Process, ProcessSpec, ProcessState, Workload, WorkloadPreset};
pub use scheduler::{Scheduler, SchedulerMetrics};
pub use simulation::{SchedulingAverages, Simulation, SimulationView};
