//! Configuration for the instance controller.

use std::path::PathBuf;

use anyhow::{Context, Result};
use capve_vm_options::OverflowPolicy;

/// Instance controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the JSON desired spec of the instance.
    pub spec_path: PathBuf,

    /// Data directory for local state.
    pub data_dir: PathBuf,

    /// Interval between reconciliation passes in seconds.
    pub reconcile_interval_secs: u64,

    /// Upper bound on a single pass in seconds.
    pub pass_timeout_secs: u64,

    /// What to do with extra disks beyond the slot capacity.
    pub disk_overflow: OverflowPolicy,

    /// Node handed out by the static scheduler.
    pub placement_node: String,

    /// Storage handed out by the static scheduler.
    pub placement_storage: String,

    /// First VM ID handed out by the static scheduler.
    pub first_vmid: u32,

    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let spec_path = std::env::var("CAPVE_SPEC_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/etc/capve/instance.json"));

        let data_dir = std::env::var("CAPVE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/var/lib/capve"));

        let reconcile_interval_secs = std::env::var("CAPVE_RECONCILE_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let pass_timeout_secs = std::env::var("CAPVE_PASS_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        let disk_overflow = match std::env::var("CAPVE_DISK_OVERFLOW") {
            Ok(s) => s.parse().context("invalid CAPVE_DISK_OVERFLOW")?,
            Err(_) => OverflowPolicy::default(),
        };

        let placement_node =
            std::env::var("CAPVE_PLACEMENT_NODE").unwrap_or_else(|_| "pve1".to_string());

        let placement_storage =
            std::env::var("CAPVE_PLACEMENT_STORAGE").unwrap_or_else(|_| "local-lvm".to_string());

        let first_vmid = std::env::var("CAPVE_FIRST_VMID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let log_level = std::env::var("CAPVE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            spec_path,
            data_dir,
            reconcile_interval_secs,
            pass_timeout_secs,
            disk_overflow,
            placement_node,
            placement_storage,
            first_vmid,
            log_level,
        })
    }

    /// Path of the SQLite identity database.
    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join("state.db")
    }
}
