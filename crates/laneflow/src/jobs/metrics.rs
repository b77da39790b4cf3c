use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::System;

use crate::jobs::lane::PriorityCounts;
use crate::jobs::model::LaneKind;

#[derive(Debug, Clone, Serialize)]
pub struct LaneStatus {
    pub waiting: usize,
    pub processing: usize,
    /// Failed attempts waiting out their backoff delay.
    pub delayed: usize,
    pub max_concurrent: usize,
    pub completed: u64,
    pub failed: u64,
    pub retained: usize,
    pub waiting_by_priority: PriorityCounts,
}

impl LaneStatus {
    pub fn total(&self) -> usize {
        self.waiting + self.processing + self.delayed
    }
}

/// Memory figures in bytes. Zero when the platform does not report them.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MemoryUsage {
    pub process_resident: u64,
    pub process_virtual: u64,
    pub system_used: u64,
    pub system_total: u64,
}

/// One `sysinfo::System` shared by every status snapshot of a queue.
#[derive(Debug)]
pub struct MemoryProbe {
    sys: Mutex<System>,
    pid: Option<sysinfo::Pid>,
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn sample(&self) -> MemoryUsage {
        let mut sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_memory();

        let mut usage = MemoryUsage {
            system_used: sys.used_memory(),
            system_total: sys.total_memory(),
            ..MemoryUsage::default()
        };

        if let Some(pid) = self.pid {
            if sys.refresh_process(pid) {
                if let Some(process) = sys.process(pid) {
                    usage.process_resident = process.memory();
                    usage.process_virtual = process.virtual_memory();
                }
            }
        }

        usage
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub at: DateTime<Utc>,
    pub running: bool,
    pub video: LaneStatus,
    pub qa: LaneStatus,
    pub processing_resource_keys: Vec<String>,
    pub processed_resource_keys: Vec<String>,
    pub memory: MemoryUsage,
}

impl QueueStatus {
    pub fn lane(&self, lane: LaneKind) -> &LaneStatus {
        match lane {
            LaneKind::Video => &self.video,
            LaneKind::Qa => &self.qa,
        }
    }
}

/// Prometheus text exposition of a status snapshot.
pub fn render_prometheus(status: &QueueStatus) -> String {
    let mut out = String::new();

    gauge_header(&mut out, "laneflow_jobs_waiting", "Jobs waiting in a lane");
    for lane in LaneKind::ALL {
        let _ = writeln!(
            out,
            "laneflow_jobs_waiting{{lane=\"{lane}\"}} {}",
            status.lane(lane).waiting
        );
    }

    gauge_header(&mut out, "laneflow_jobs_processing", "Jobs currently executing");
    for lane in LaneKind::ALL {
        let _ = writeln!(
            out,
            "laneflow_jobs_processing{{lane=\"{lane}\"}} {}",
            status.lane(lane).processing
        );
    }

    gauge_header(&mut out, "laneflow_jobs_delayed", "Jobs waiting for a retry");
    for lane in LaneKind::ALL {
        let _ = writeln!(
            out,
            "laneflow_jobs_delayed{{lane=\"{lane}\"}} {}",
            status.lane(lane).delayed
        );
    }

    gauge_header(&mut out, "laneflow_lane_max_concurrent", "Concurrency ceiling per lane");
    for lane in LaneKind::ALL {
        let _ = writeln!(
            out,
            "laneflow_lane_max_concurrent{{lane=\"{lane}\"}} {}",
            status.lane(lane).max_concurrent
        );
    }

    let _ = writeln!(out, "# HELP laneflow_jobs_finished_total Jobs that reached a terminal state");
    let _ = writeln!(out, "# TYPE laneflow_jobs_finished_total counter");
    for lane in LaneKind::ALL {
        let s = status.lane(lane);
        let _ = writeln!(
            out,
            "laneflow_jobs_finished_total{{lane=\"{lane}\",outcome=\"completed\"}} {}",
            s.completed
        );
        let _ = writeln!(
            out,
            "laneflow_jobs_finished_total{{lane=\"{lane}\",outcome=\"failed\"}} {}",
            s.failed
        );
    }

    gauge_header(&mut out, "laneflow_dedup_processing", "Video resources being processed");
    let _ = writeln!(out, "laneflow_dedup_processing {}", status.processing_resource_keys.len());
    gauge_header(&mut out, "laneflow_dedup_processed", "Video resources already processed");
    let _ = writeln!(out, "laneflow_dedup_processed {}", status.processed_resource_keys.len());

    gauge_header(&mut out, "laneflow_process_resident_bytes", "Resident memory of this process");
    let _ = writeln!(out, "laneflow_process_resident_bytes {}", status.memory.process_resident);

    gauge_header(&mut out, "laneflow_dispatcher_running", "1 while the dispatch loop runs");
    let _ = writeln!(out, "laneflow_dispatcher_running {}", u8::from(status.running));

    out
}

fn gauge_header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
}
