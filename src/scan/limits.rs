//! Scan ceilings and the memory probe that enforces one of them.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Per-scan budgets. Breaching any of them ends the scan with a partial result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLimits {
    /// Allowed resident memory growth since the scan began.
    pub memory_ceiling_bytes: u64,
    /// Walked entries between memory and time samples.
    pub check_interval: usize,
    /// Wall-clock budget.
    pub time_budget: Duration,
    /// Maximum number of entries a scan collects.
    pub max_entries: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            memory_ceiling_bytes: 256 * 1024 * 1024,
            check_interval: 500,
            time_budget: Duration::from_secs(10),
            max_entries: 200_000,
        }
    }
}

/// Why a scan stopped before the walk was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// Resident memory grew past the ceiling.
    MemoryCeiling,
    /// The time budget ran out.
    TimeBudget,
    /// The entry limit was reached.
    EntryLimit,
}

impl StopReason {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MemoryCeiling => "memory_ceiling",
            Self::TimeBudget => "time_budget",
            Self::EntryLimit => "entry_limit",
        }
    }
}

impl FromStr for StopReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory_ceiling" => Ok(Self::MemoryCeiling),
            "time_budget" => Ok(Self::TimeBudget),
            "entry_limit" => Ok(Self::EntryLimit),
            other => Err(format!("unknown stop reason '{other}'")),
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the process's resident memory size.
pub trait MemoryProbe {
    /// Current resident set size in bytes, or `None` if unavailable.
    fn resident_bytes(&mut self) -> Option<u64>;
}

/// [`MemoryProbe`] backed by `sysinfo` for the current process.
pub struct ProcessMemory {
    system: System,
    pid: Option<Pid>,
}

impl ProcessMemory {
    /// Creates a probe for this process. Does not sample yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemory {
    fn resident_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::new().with_memory(),
        );
        self.system.process(pid).map(sysinfo::Process::memory)
    }
}

/// Tracks one scan against its limits.
///
/// Time and memory are sampled on every `check_interval`-th walked entry,
/// whether or not the filter keeps it; the entry limit counts kept entries.
pub(crate) struct ScanGuard<'a> {
    limits: &'a ScanLimits,
    probe: &'a mut dyn MemoryProbe,
    started: Instant,
    baseline: Option<u64>,
    visited: usize,
    admitted: usize,
}

impl<'a> ScanGuard<'a> {
    pub(crate) fn new(limits: &'a ScanLimits, probe: &'a mut dyn MemoryProbe) -> Self {
        let baseline = probe.resident_bytes();
        Self {
            limits,
            probe,
            started: Instant::now(),
            baseline,
            visited: 0,
            admitted: 0,
        }
    }

    /// Called for every entry the walk reaches, before filtering.
    pub(crate) fn visit(&mut self) -> Result<(), StopReason> {
        let interval = self.limits.check_interval.max(1);
        if self.visited > 0 && self.visited % interval == 0 {
            if self.started.elapsed() >= self.limits.time_budget {
                return Err(StopReason::TimeBudget);
            }
            if let (Some(baseline), Some(current)) = (self.baseline, self.probe.resident_bytes()) {
                let growth = current.saturating_sub(baseline);
                if growth > self.limits.memory_ceiling_bytes {
                    tracing::warn!(
                        growth_bytes = growth,
                        ceiling_bytes = self.limits.memory_ceiling_bytes,
                        visited = self.visited,
                        entries = self.admitted,
                        "Memory ceiling reached, returning partial result"
                    );
                    return Err(StopReason::MemoryCeiling);
                }
            }
        }

        self.visited += 1;
        Ok(())
    }

    /// Called for each entry that passed the filter, before it is kept.
    pub(crate) fn admit(&mut self) -> Result<(), StopReason> {
        if self.admitted >= self.limits.max_entries {
            return Err(StopReason::EntryLimit);
        }
        self.admitted += 1;
        Ok(())
    }

    pub(crate) const fn visited(&self) -> usize {
        self.visited
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Probe whose reading grows by `step` bytes per sample.
    pub(crate) struct GrowingProbe {
        pub(crate) current: u64,
        pub(crate) step: u64,
    }

    impl MemoryProbe for GrowingProbe {
        fn resident_bytes(&mut self) -> Option<u64> {
            self.current += self.step;
            Some(self.current)
        }
    }

    #[test]
    fn stop_reason_round_trips() {
        for reason in [
            StopReason::MemoryCeiling,
            StopReason::TimeBudget,
            StopReason::EntryLimit,
        ] {
            assert_eq!(reason.as_str().parse::<StopReason>().unwrap(), reason);
        }
        assert!("oom".parse::<StopReason>().is_err());
    }

    #[test]
    fn entry_limit_refuses_extra_entries() {
        let limits = ScanLimits {
            max_entries: 2,
            ..ScanLimits::default()
        };
        let mut probe = GrowingProbe { current: 0, step: 0 };
        let mut guard = ScanGuard::new(&limits, &mut probe);
        assert!(guard.admit().is_ok());
        assert!(guard.admit().is_ok());
        assert_eq!(guard.admit(), Err(StopReason::EntryLimit));
    }

    #[test]
    fn memory_growth_past_ceiling_stops() {
        let limits = ScanLimits {
            memory_ceiling_bytes: 1024,
            check_interval: 2,
            ..ScanLimits::default()
        };
        let mut probe = GrowingProbe {
            current: 0,
            step: 4096,
        };
        let mut guard = ScanGuard::new(&limits, &mut probe);
        assert!(guard.visit().is_ok());
        assert!(guard.visit().is_ok());
        assert_eq!(guard.visit(), Err(StopReason::MemoryCeiling));
    }

    #[test]
    fn time_budget_stops() {
        let limits = ScanLimits {
            time_budget: Duration::ZERO,
            check_interval: 1,
            ..ScanLimits::default()
        };
        let mut probe = GrowingProbe { current: 0, step: 0 };
        let mut guard = ScanGuard::new(&limits, &mut probe);
        assert!(guard.visit().is_ok());
        assert_eq!(guard.visit(), Err(StopReason::TimeBudget));
    }

    #[test]
    fn visits_do_not_count_against_entry_limit() {
        let limits = ScanLimits {
            max_entries: 1,
            ..ScanLimits::default()
        };
        let mut probe = GrowingProbe { current: 0, step: 0 };
        let mut guard = ScanGuard::new(&limits, &mut probe);
        for _ in 0..10 {
            assert!(guard.visit().is_ok());
        }
        assert_eq!(guard.visited(), 10);
        assert!(guard.admit().is_ok());
        assert_eq!(guard.admit(), Err(StopReason::EntryLimit));
    }

    #[test]
    fn process_probe_reports_memory() {
        let mut probe = ProcessMemory::new();
        assert!(probe.resident_bytes().is_some_and(|b| b > 0));
    }
}
