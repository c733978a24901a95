//! System memory pressure signal.
//!
//! The rate limiter asks for the current [`PressureLevel`] before every
//! inter-source delay. [`SystemMemoryPressure`] derives it from available RAM:
//!
//! | Level | Available RAM (defaults) |
//! |-------|--------------------------|
//! | Warning | <= 1 024 MB |
//! | Critical | <= 512 MB |
//! | Emergency | <= 256 MB |
//!
//! When available RAM cannot be read the level is `Normal`.

use crate::models::MemoryConfig;

/// Pressure level states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PressureLevel {
    Normal,
    Warning,
    Critical,
    Emergency,
}

/// Source of the current memory pressure level.
pub trait MemoryPressureSignal: Send + Sync {
    fn level(&self) -> PressureLevel;
}

/// Reads available RAM from the operating system on each call.
#[derive(Debug, Clone)]
pub struct SystemMemoryPressure {
    thresholds: MemoryConfig,
}

impl SystemMemoryPressure {
    pub fn new(thresholds: MemoryConfig) -> Self {
        Self { thresholds }
    }

    /// Map an available-RAM reading to a level.
    pub fn level_for(&self, available_mb: u64) -> PressureLevel {
        if available_mb <= self.thresholds.emergency_mb {
            PressureLevel::Emergency
        } else if available_mb <= self.thresholds.critical_mb {
            PressureLevel::Critical
        } else if available_mb <= self.thresholds.warning_mb {
            PressureLevel::Warning
        } else {
            PressureLevel::Normal
        }
    }
}

impl MemoryPressureSignal for SystemMemoryPressure {
    fn level(&self) -> PressureLevel {
        match available_memory_mb() {
            Some(mb) => {
                let level = self.level_for(mb);
                if level != PressureLevel::Normal {
                    log::debug!("Memory pressure {:?} ({} MB available)", level, mb);
                }
                level
            }
            None => PressureLevel::Normal,
        }
    }
}

/// Always reports the same level.
#[derive(Debug, Clone, Copy)]
pub struct FixedPressure(pub PressureLevel);

impl MemoryPressureSignal for FixedPressure {
    fn level(&self) -> PressureLevel {
        self.0
    }
}

/// Return the available system RAM in mebibytes, if the platform exposes it.
pub fn available_memory_mb() -> Option<u64> {
    available_memory_bytes().map(|bytes| bytes / (1024 * 1024))
}

#[cfg(target_os = "linux")]
fn available_memory_bytes() -> Option<u64> {
    let content = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo_available(&content)
}

#[cfg(target_os = "macos")]
fn available_memory_bytes() -> Option<u64> {
    let page_size = run_sysctl_u64("hw.pagesize")?;
    let free_pages = run_sysctl_u64("vm.page_free_count")?;
    Some(free_pages.saturating_mul(page_size))
}

#[cfg(target_os = "macos")]
fn run_sysctl_u64(name: &str) -> Option<u64> {
    let output = std::process::Command::new("sysctl")
        .arg("-n")
        .arg(name)
        .output()
        .ok()?;
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<u64>()
        .ok()
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn available_memory_bytes() -> Option<u64> {
    None
}

/// Pull `MemAvailable` (in kB) out of a `/proc/meminfo` dump.
#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
fn parse_meminfo_available(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb.saturating_mul(1024))
}
