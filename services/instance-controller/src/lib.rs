//! capve Instance Controller Library
//!
//! Reconciles the desired state of a QEMU instance against a Proxmox VE
//! cluster, ensuring exactly one VM exists per logical instance and that its
//! placement comes from a pluggable scheduler.
//!
//! ## Modules
//!
//! - `reconciler`: lookup-or-create for a single instance
//! - `platform`, `placement`, `image`, `identity`: collaborator interfaces
//! - `state`: SQLite identity persistence
//! - `controller`: periodic loop with a per-pass deadline
//! - `mock`: in-memory collaborators for development and tests
//!
//! Request construction lives in `capve-vm-options`.

pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod image;
pub mod mock;
pub mod placement;
pub mod platform;
pub mod reconciler;
pub mod state;

// Re-export commonly used types
pub use error::{ReconcileError, ReconcileResult};
pub use identity::{IdentityStore, InstanceIdentity};
pub use placement::{PlacementClient, PlacementResult, SchedulerError, SchedulingHints};
pub use platform::{PlatformError, VirtualMachine, VirtualMachineApi};
pub use reconciler::{InstanceReconciler, ReconcileAction, ReconcileOutcome};
