//! Point-in-time process report, dumped on SIGUSR1.

use std::fmt;
use std::time::{Duration, Instant};

use sysinfo::System;

use crate::config::SystemSettings;
use crate::error::ServerError;
use crate::worker::WorkerQueue;

/// Resident and virtual memory of this process, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessMemory {
    pub resident: u64,
    pub virtual_bytes: u64,
}

impl ProcessMemory {
    pub fn current() -> Result<Self, ServerError> {
        let pid = sysinfo::get_current_pid().map_err(|e| ServerError::Diagnostics(e.to_string()))?;
        let mut system = System::new();
        system.refresh_process(pid);
        let process = system
            .process(pid)
            .ok_or_else(|| ServerError::Diagnostics(format!("process {pid} not found")))?;
        Ok(Self {
            resident: process.memory(),
            virtual_bytes: process.virtual_memory(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub version: String,
    pub build_time: String,
    pub compiler: String,
    pub environment: String,
    pub queue_length: usize,
    pub queue_capacity: usize,
    pub active_tasks: usize,
    pub workers: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub runtime_workers: usize,
    pub runtime_alive_tasks: usize,
    pub memory: Option<ProcessMemory>,
    pub uptime: Duration,
}

impl DiagnosticReport {
    /// Read-only snapshot; nothing in the queue is touched.
    ///
    /// Memory figures are best effort and left out when the platform
    /// cannot report them.
    pub fn collect(
        system: &SystemSettings,
        queue: &WorkerQueue,
        started_at: Instant,
    ) -> Result<Self, ServerError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ServerError::Diagnostics(e.to_string()))?
            .metrics();
        let stats = queue.stats();

        Ok(Self {
            version: system.version.clone(),
            build_time: system.build_time.clone(),
            compiler: system.compiler.clone(),
            environment: system.environment.clone(),
            queue_length: stats.pending,
            queue_capacity: stats.capacity,
            active_tasks: stats.active,
            workers: stats.workers,
            completed_tasks: stats.completed,
            failed_tasks: stats.failed + stats.panicked,
            runtime_workers: runtime.num_workers(),
            runtime_alive_tasks: runtime.num_alive_tasks(),
            memory: ProcessMemory::current().ok(),
            uptime: started_at.elapsed(),
        })
    }
}

fn mib(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# version: {}", self.version)?;
        writeln!(f, "# build time: {}", self.build_time)?;
        writeln!(f, "# compiler: {}", self.compiler)?;
        writeln!(f, "# environment: {}", self.environment)?;
        writeln!(
            f,
            "# worker queue length: {}/{}",
            self.queue_length, self.queue_capacity
        )?;
        writeln!(f, "# active tasks: {}", self.active_tasks)?;
        writeln!(f, "# workers: {}", self.workers)?;
        writeln!(f, "# completed tasks: {}", self.completed_tasks)?;
        writeln!(f, "# failed tasks: {}", self.failed_tasks)?;
        writeln!(f, "# runtime workers: {}", self.runtime_workers)?;
        writeln!(f, "# runtime alive tasks: {}", self.runtime_alive_tasks)?;
        match self.memory {
            Some(memory) => {
                writeln!(f, "# resident memory: {}", mib(memory.resident))?;
                writeln!(f, "# virtual memory: {}", mib(memory.virtual_bytes))?;
            }
            None => writeln!(f, "# memory: unavailable")?,
        }
        write!(f, "# uptime: {}s", self.uptime.as_secs())
    }
}
