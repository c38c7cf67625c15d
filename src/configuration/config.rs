use super::types::*;
use crate::analysis::predicate::FilterPredicate;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Component, Path, PathBuf};

/// Application configuration structure that defines all runtime parameters.
///
/// The configuration is read from an optional TOML file and then refined by the
/// command-line flags of [`Args`]. Every field has a default except the secondary
/// reference address, which is host specific and must always be provided.
///
/// # Examples
///
/// ```toml
/// [capture]
/// interface = "any"
/// max_packets = 1000
/// max_duration_secs = 60
/// artifact_path = "capture.pcap"
///
/// [analysis]
/// local_address = "127.0.0.1"
/// secondary_address = "192.168.51.172"
/// secondary_label = "wlan0"
/// output_dir = "reports"
/// ```
///
/// # Fields Overview
///
/// - `capture`: how the capture tool is driven (`CaptureSettings`)
/// - `analysis`: reference addresses, filter tool and report destination (`AnalysisSettings`)
/// - `analyze_only`: skip the capture phase and analyze an existing artifact
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub capture: CaptureSettings,
    pub analysis: AnalysisSettings,
    pub analyze_only: bool,
}

/// Command-line surface of `capsplit`.
///
/// Each flag, when present, overrides the matching value of the configuration file.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "capsplit")]
#[command(version)]
#[command(about = "Capture traffic with an external tool and split it into per-host directional JSON reports")]
pub struct Args {
    /// Path to a TOML configuration file
    ///
    /// # Command Line
    /// Use `--config <PATH>` or the `CAPSPLIT_CONFIG` environment variable
    #[arg(long, short, env = "CAPSPLIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Interface selector for the capture tool (e.g. `any`, `eth0`)
    #[arg(long)]
    pub interface: Option<String>,

    /// Stop the capture after this many packets
    #[arg(long)]
    pub max_packets: Option<u64>,

    /// Stop the capture after this many seconds
    #[arg(long)]
    pub max_duration_secs: Option<u64>,

    /// Capture artifact path
    #[arg(long)]
    pub artifact: Option<PathBuf>,

    /// Local reference address
    #[arg(long)]
    pub local_address: Option<String>,

    /// Secondary (interface) reference address
    #[arg(long)]
    pub secondary_address: Option<String>,

    /// Scope label used in the secondary report file names
    #[arg(long)]
    pub secondary_label: Option<String>,

    /// Directory receiving the JSON reports
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Kill and fail any filter job running longer than this many seconds
    #[arg(long)]
    pub job_timeout_secs: Option<u64>,

    /// Skip the capture phase and analyze an existing artifact
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub analyze_only: bool,
}

impl Config {
    /// Reads a configuration from the TOML file at `path`.
    ///
    /// Missing tables and keys fall back to their defaults; unknown keys are rejected.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration file {}", path.display());
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    /// Builds the effective configuration: the file named by `args` (or the
    /// defaults), then every flag given on the command line.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Config::from_file(path)?
            }
            None => {
                info!("No configuration file given, using defaults");
                Config::default()
            }
        };
        config.apply_args(args);
        Ok(config)
    }

    /// Overrides configuration values with the flags present in `args`.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref interface) = args.interface {
            self.capture.interface = interface.clone();
        }
        if let Some(max_packets) = args.max_packets {
            self.capture.max_packets = max_packets;
        }
        if let Some(secs) = args.max_duration_secs {
            self.capture.max_duration_secs = Some(secs);
        }
        if let Some(ref artifact) = args.artifact {
            self.capture.artifact_path = artifact.clone();
        }
        if let Some(ref address) = args.local_address {
            self.analysis.local_address = address.clone();
        }
        if let Some(ref address) = args.secondary_address {
            self.analysis.secondary_address = address.clone();
        }
        if let Some(ref label) = args.secondary_label {
            self.analysis.secondary_label = label.clone();
        }
        if let Some(ref dir) = args.output_dir {
            self.analysis.output_dir = dir.clone();
        }
        if let Some(secs) = args.job_timeout_secs {
            self.analysis.job_timeout_secs = Some(secs);
        }
        if args.analyze_only {
            self.analyze_only = true;
        }
    }

    /// Checks every value and returns the parsed reference addresses.
    pub fn validate(&self) -> Result<ReferenceAddresses, ConfigError> {
        if self.capture.tool.trim().is_empty() {
            return Err(ConfigError::MissingValue("capture.tool".to_string()));
        }
        if self.analysis.tool.trim().is_empty() {
            return Err(ConfigError::MissingValue("analysis.tool".to_string()));
        }

        let interface_pattern = Regex::new(r"^[A-Za-z0-9_.:@{}\\-]+$")
            .map_err(|e| ConfigError::BadInterface(e.to_string()))?;
        if !interface_pattern.is_match(&self.capture.interface) {
            return Err(ConfigError::BadInterface(format!(
                "'{}' is not a valid interface selector",
                self.capture.interface
            )));
        }

        if self.capture.max_packets == 0 {
            return Err(ConfigError::NotInRange(
                "capture.max_packets must be at least 1".to_string(),
            ));
        }
        if self.capture.max_duration_secs == Some(0) {
            return Err(ConfigError::NotInRange(
                "capture.max_duration_secs must be at least 1".to_string(),
            ));
        }
        if self.analysis.job_timeout_secs == Some(0) {
            return Err(ConfigError::NotInRange(
                "analysis.job_timeout_secs must be at least 1".to_string(),
            ));
        }

        let label_pattern =
            Regex::new(r"^[A-Za-z0-9_.-]+$").map_err(|e| ConfigError::BadLabel(e.to_string()))?;
        let label = &self.analysis.secondary_label;
        if !label_pattern.is_match(label) || label == "local" || label == "." || label == ".." {
            return Err(ConfigError::BadLabel(format!(
                "'{}' cannot be used as a report scope label",
                label
            )));
        }

        if self.analysis.secondary_address.trim().is_empty() {
            return Err(ConfigError::MissingValue(
                "analysis.secondary_address".to_string(),
            ));
        }
        let local = parse_address("analysis.local_address", &self.analysis.local_address)?;
        let secondary = parse_address(
            "analysis.secondary_address",
            &self.analysis.secondary_address,
        )?;
        if local == secondary {
            return Err(ConfigError::IdenticalAddresses(format!(
                "local and secondary addresses are both {}",
                local
            )));
        }

        for predicate in FilterPredicate::ALL {
            let report = self
                .analysis
                .output_dir
                .join(predicate.report_file_name(label));
            if same_location(&self.capture.artifact_path, &report) {
                return Err(ConfigError::PathConflict(format!(
                    "capture.artifact_path {} is also the [{}] report",
                    self.capture.artifact_path.display(),
                    predicate
                )));
            }
        }

        Ok(ReferenceAddresses { local, secondary })
    }
}

/// Whether two file paths name the same file once their parent directories
/// are resolved. Parents that do not exist yet are compared lexically.
fn same_location(a: &Path, b: &Path) -> bool {
    fn resolved(path: &Path) -> Option<PathBuf> {
        let name = path.file_name()?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let parent = parent.canonicalize().unwrap_or_else(|_| {
            parent
                .components()
                .filter(|c| !matches!(c, Component::CurDir))
                .collect()
        });
        Some(parent.join(name))
    }
    match (resolved(a), resolved(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn parse_address(key: &str, value: &str) -> Result<IpAddr, ConfigError> {
    value
        .trim()
        .parse::<IpAddr>()
        .map_err(|e| ConfigError::BadIPFormatting(format!("{} = '{}': {}", key, value, e)))
}
