//! Pool size selection.

use serde::Serialize;
use sysinfo::System;

/// Used when the user leaves concurrency unset in the UI.
pub const DEFAULT_CONCURRENCY: usize = 4;

const FALLBACK_CPUS: usize = 2;
const FALLBACK_MEM_GB: f64 = 4.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// What the pool sizing is based on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemResources {
    pub cpu_count: usize,
    pub total_mem_gb: f64,
}

impl SystemResources {
    pub fn new(cpu_count: usize, total_mem_gb: f64) -> Self {
        Self {
            cpu_count,
            total_mem_gb,
        }
    }

    /// Reads the host's CPU count and memory, falling back to 2 CPUs and
    /// 4 GB when either cannot be read.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let cpu_count = match sys.cpus().len() {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(FALLBACK_CPUS),
            n => n,
        };
        let total_mem_gb = match sys.total_memory() {
            0 => FALLBACK_MEM_GB,
            bytes => bytes as f64 / BYTES_PER_GB,
        };
        Self::new(cpu_count, total_mem_gb)
    }
}

impl Default for SystemResources {
    fn default() -> Self {
        Self::new(FALLBACK_CPUS, FALLBACK_MEM_GB)
    }
}

/// Highest concurrency that is ever chosen.
pub fn max_concurrency(resources: &SystemResources) -> usize {
    resources.cpu_count.max(1)
}

/// Recommended concurrency when the user has not chosen one:
/// `ceil(cpu * 0.75)` clamped to `[1, min(cpu, floor(mem_gb))]`.
pub fn recommended_concurrency(resources: &SystemResources) -> usize {
    let cpu = resources.cpu_count.max(1);
    let mem_bound = resources.total_mem_gb.max(0.0).floor() as usize;
    let upper = cpu.min(mem_bound).max(1);
    let wanted = (cpu as f64 * 0.75).ceil() as usize;
    wanted.clamp(1, upper)
}

/// The pool size actually used.
pub fn compute_concurrency(user_value: Option<usize>, resources: &SystemResources) -> usize {
    match user_value.filter(|v| *v > 0) {
        Some(v) => v.clamp(1, max_concurrency(resources)),
        None => recommended_concurrency(resources),
    }
}

/// Sizing details for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcurrencyInfo {
    pub cpu_count: usize,
    pub total_mem_gb: f64,
    pub recommended: usize,
    pub default: usize,
    pub user_value: Option<usize>,
    pub effective: usize,
    pub min: usize,
    pub max: usize,
}

impl ConcurrencyInfo {
    pub fn new(user_value: Option<usize>, resources: &SystemResources) -> Self {
        Self {
            cpu_count: resources.cpu_count,
            total_mem_gb: (resources.total_mem_gb * 10.0).round() / 10.0,
            recommended: recommended_concurrency(resources),
            default: DEFAULT_CONCURRENCY,
            user_value,
            effective: compute_concurrency(user_value, resources),
            min: 1,
            max: max_concurrency(resources),
        }
    }
}
