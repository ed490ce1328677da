//! Threshold rules that turn a tick's metrics into bottleneck findings.

use crate::metrics::TickMetrics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Cpu,
    Memory,
    Paging,
    Scheduler,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub level: Severity,
    pub detail: String,
}

impl Finding {
    fn new(kind: FindingKind, level: Severity, detail: &str) -> Self {
        Self {
            kind,
            level,
            detail: detail.to_string(),
        }
    }
}

/// Stateless; rules fire independently and are reported in the order
/// cpu, memory, paging, scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct BottleneckDetector;

impl BottleneckDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, metrics: &TickMetrics) -> Vec<Finding> {
        let cpu = metrics.scheduler.cpu;
        let pressure = metrics.memory.memory_pressure;
        let mut findings = Vec::new();

        if cpu > 85.0 {
            findings.push(Finding::new(FindingKind::Cpu, Severity::Critical, "CPU saturation"));
        } else if cpu > 70.0 {
            findings.push(Finding::new(FindingKind::Cpu, Severity::Warning, "High CPU load"));
        }

        if pressure > 88.0 {
            findings.push(Finding::new(
                FindingKind::Memory,
                Severity::Critical,
                "Memory pressure high",
            ));
        } else if pressure > 72.0 {
            findings.push(Finding::new(
                FindingKind::Memory,
                Severity::Warning,
                "Memory pressure elevated",
            ));
        }

        if metrics.memory.page_faults > 20 {
            findings.push(Finding::new(
                FindingKind::Paging,
                Severity::Warning,
                "Frequent page faults",
            ));
        }

        if metrics.scheduler.quantum_ms < 60 && cpu > 75.0 {
            findings.push(Finding::new(
                FindingKind::Scheduler,
                Severity::Info,
                "Adaptive quantum reduced",
            ));
        }

        findings
    }
}
