//! Marquee - multi-zone home AV control hub
//!
//! Library exposing core modules for testing and reuse.
//!
//! The interesting part lives in [`router`]: given a requested
//! (zone, scene) pair it picks a route through the installed hardware,
//! arbitrates contention for shared devices, and keeps every device's
//! power state in line with its reference count.

pub mod allocation;
pub mod catalog;
pub mod commands;
pub mod drivers;
pub mod error;
pub mod power;
pub mod router;
pub mod web;

pub use catalog::{Capability, CapabilityClass, Catalog, DriverId, SceneId, ZoneId};
pub use drivers::{Driver, DriverError, DriverRegistry};
pub use error::ActivateError;
pub use router::{Activation, Router, ZoneStatus};
