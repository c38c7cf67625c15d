use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Settings of the capture phase, the `[capture]` table of the configuration file.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSettings {
    /// Capture tool binary, resolved through `PATH` when not absolute.
    pub tool: String,
    /// Interface selector handed to the tool (`any` captures on all interfaces).
    pub interface: String,
    /// Packet-count ceiling; the tool stops by itself once reached.
    pub max_packets: u64,
    /// Optional duration ceiling in seconds. The tool stops on whichever
    /// ceiling is reached first.
    pub max_duration_secs: Option<u64>,
    /// Extra time granted past `max_duration_secs` before the process is killed.
    pub grace_secs: u64,
    /// Capture artifact written by the tool and read by the analysis phase.
    pub artifact_path: PathBuf,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            tool: String::from("tshark"),
            interface: String::from("any"),
            max_packets: 1000,
            max_duration_secs: None,
            grace_secs: 5,
            artifact_path: PathBuf::from("capture.pcap"),
        }
    }
}

impl CaptureSettings {
    /// Watchdog deadline for the capture process. Only a duration ceiling
    /// bounds the run; a packet ceiling alone may legitimately wait forever.
    pub fn deadline(&self) -> Option<Duration> {
        self.max_duration_secs
            .map(|secs| Duration::from_secs(secs.saturating_add(self.grace_secs)))
    }
}

/// Settings of the analysis phase, the `[analysis]` table of the configuration file.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSettings {
    /// Filter tool binary.
    pub tool: String,
    pub local_address: String,
    /// No default: the secondary interface address is host specific.
    pub secondary_address: String,
    /// Scope name used in the secondary report file names.
    pub secondary_label: String,
    /// Directory receiving the four JSON reports.
    pub output_dir: PathBuf,
    /// Optional per-job time budget, measured from the job's launch.
    pub job_timeout_secs: Option<u64>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            tool: String::from("tshark"),
            local_address: String::from("127.0.0.1"),
            secondary_address: String::new(),
            secondary_label: String::from("secondary"),
            output_dir: PathBuf::from("."),
            job_timeout_secs: None,
        }
    }
}

impl AnalysisSettings {
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

/// The two validated addresses every filter predicate is scoped to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ReferenceAddresses {
    pub local: IpAddr,
    pub secondary: IpAddr,
}
