//! QEMU create-request construction.
//!
//! Turns a [`DesiredSpec`] into the platform's flat, slot-indexed create
//! request in two phases:
//!
//! 1. [`OptionBuilder::build`] produces a [`ProvisionalRequest`] using the
//!    spec's image storage as a placeholder.
//! 2. [`StorageInjector::inject`] rewrites the storage-dependent fields once
//!    placement is known and yields a [`FinalRequest`].
//!
//! Nothing in this crate performs I/O.
//!
//! # Invariants
//!
//! - Extra disk at position `i` lands in slot `i + 1`
//! - At most [`MAX_EXTRA_DISKS`] extra disks are ever written
//! - Injection is idempotent for a given storage

pub mod builder;
pub mod error;
pub mod inject;
pub mod request;
pub mod slots;
pub mod spec;
pub mod wire;

pub use builder::{OptionBuilder, OverflowPolicy};
pub use error::OptionsError;
pub use inject::StorageInjector;
pub use request::{CreateRequest, FinalRequest, Injectable, ProvisionalRequest};
pub use slots::{allocate_extra_disks, DiskSlots, MAX_EXTRA_DISKS, ROOT_DISK_SLOT};
pub use spec::{DesiredSpec, ExtraDisk, Hardware, ImageRef, IpConfig, Network, NetworkDevice, Options};
