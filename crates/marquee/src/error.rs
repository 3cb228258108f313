//! Failure taxonomy for zone activation.
//!
//! The arbitration variants (everything up to `DriverConflict`) are
//! reported to the caller without touching the allocation table. The
//! `CommandFailed` variant wraps a driver-level failure during the commit
//! phase: the table update stands, and the error carries the set of
//! drivers that were actually commanded before the stop.

use crate::catalog::{CapabilityClass, DriverId, SceneId, ZoneId};
use crate::drivers::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivateError {
    #[error("unknown scene {0}")]
    UnknownScene(SceneId),

    #[error("unknown zone {0}")]
    UnknownZone(ZoneId),

    #[error("unknown driver {0}")]
    UnknownDriver(DriverId),

    #[error("zone {0} has neither an active nor a default subzone")]
    NoDefaultSubzone(ZoneId),

    #[error("scene {scene} cannot serve zone {zone}")]
    CapabilityMismatch { scene: SceneId, zone: ZoneId },

    #[error("no {class} routes defined for scene {scene}")]
    NoRouteDefined {
        scene: SceneId,
        class: CapabilityClass,
    },

    #[error("no {class} route for scene {scene} matches zone {zone}")]
    NoMatchingRoute {
        scene: SceneId,
        zone: ZoneId,
        class: CapabilityClass,
    },

    #[error("driver {driver} is in use by zone {owning_zone}")]
    DriverConflict {
        driver: DriverId,
        owning_zone: ZoneId,
    },

    #[error("driver {driver} failed mid-route: {source}")]
    CommandFailed {
        driver: DriverId,
        /// Drivers that were successfully commanded before the stop
        commanded: Vec<DriverId>,
        #[source]
        source: DriverError,
    },
}

impl ActivateError {
    /// Stable machine-readable kind, used by the HTTP error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ActivateError::UnknownScene(_) => "unknown-scene",
            ActivateError::UnknownZone(_) => "unknown-zone",
            ActivateError::UnknownDriver(_) => "unknown-driver",
            ActivateError::NoDefaultSubzone(_) => "no-default-subzone",
            ActivateError::CapabilityMismatch { .. } => "capability-mismatch",
            ActivateError::NoRouteDefined { .. } => "no-route-defined",
            ActivateError::NoMatchingRoute { .. } => "no-matching-route",
            ActivateError::DriverConflict { .. } => "driver-conflict",
            ActivateError::CommandFailed { source, .. } => match source {
                DriverError::UnknownCommand { .. } => "unknown-command",
                DriverError::UnsupportedOperation { .. } => "unsupported-operation",
                DriverError::Unreachable { .. } => "driver-unreachable",
                DriverError::BadArgumentCount { .. } => "bad-argument-count",
            },
        }
    }
}
