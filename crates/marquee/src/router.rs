//! Route resolution and resource arbitration.
//!
//! The router turns an activation request into a concrete route through
//! the installed hardware, arbitrates contention for shared drivers, and
//! keeps reference counts (and with them, power states) correct.
//!
//! Everything from the conflict check through the allocation commit runs
//! under one lock, so two simultaneous activations can never both observe
//! a driver as free and both claim it. Driver I/O happens after the
//! commit without the lock; a mid-route device failure halts the command
//! sequence but the committed claims stand - a conflict already resolved
//! is not silently reverted because a downstream device misbehaved.
//!
//! Route candidates are tried strictly in declaration order. That keeps
//! selection deterministic and auditable, but it means avoiding
//! ambiguous overlapping routes is the catalog author's job, not the
//! engine's.

use crate::allocation::AllocationTable;
use crate::catalog::{
    Capability, CapabilityClass, Catalog, DriverId, DriverRef, Route, Scene, SceneId, ZoneId,
};
use crate::drivers::DriverRegistry;
use crate::error::ActivateError;
use crate::power::PowerManager;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Successful activation result.
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    /// The concrete zone that was activated
    pub zone: ZoneId,
    pub scene: SceneId,
    pub class: CapabilityClass,
    /// Every driver the zone now holds
    pub drivers: BTreeSet<DriverId>,
}

/// What a zone currently has active.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneStatus {
    /// Concrete zone id (`parent/sub` for sub-zones)
    pub zone: ZoneId,
    /// Sub-zone name when the zone is part of a virtual zone
    pub subzone: Option<String>,
    pub scene: SceneId,
    pub class: CapabilityClass,
    pub drivers: Vec<DriverId>,
    /// Capabilities stripped by overrides since activation
    pub lost: Vec<Capability>,
}

/// Everything decided under the lock, carried into the I/O phase.
struct CommitPlan {
    concrete: ZoneId,
    class: CapabilityClass,
    route: Route,
    required: BTreeSet<DriverId>,
    power_on: Vec<DriverId>,
    power_off: Vec<DriverId>,
    /// Hardware sub-index per designated driver (`receiver:2`)
    indexes: BTreeMap<DriverId, u8>,
}

/// The arbitration engine.
pub struct Router {
    catalog: Arc<Catalog>,
    registry: Arc<DriverRegistry>,
    power: PowerManager,
    table: Mutex<AllocationTable>,
}

impl Router {
    pub fn new(catalog: Arc<Catalog>, registry: Arc<DriverRegistry>) -> Self {
        let power = PowerManager::new(registry.clone());
        Self {
            catalog,
            registry,
            power,
            table: Mutex::new(AllocationTable::new()),
        }
    }

    /// Activate `scene` in `zone`.
    ///
    /// `extras` override the scene's declared driver extras. With
    /// `override_conflict` set, drivers held by other zones are forcibly
    /// released from them; callers are expected to have warned the user
    /// that this is destructive.
    pub async fn activate(
        &self,
        zone_id: &ZoneId,
        scene_id: &SceneId,
        extras: Option<BTreeMap<String, String>>,
        override_conflict: bool,
    ) -> Result<Activation, ActivateError> {
        let scene = self
            .catalog
            .scene(scene_id)
            .ok_or_else(|| ActivateError::UnknownScene(scene_id.clone()))?;

        let plan = self.plan_activation(zone_id, scene, override_conflict)?;

        info!(
            zone = %plan.concrete,
            scene = %scene_id,
            class = %plan.class,
            "activating"
        );

        let result = self.execute(scene, &plan, extras).await;
        // Drivers that lost their last reference power down regardless of
        // how command execution went.
        self.power.sweep(&plan.power_off).await;

        result.map(|()| Activation {
            zone: plan.concrete,
            scene: scene_id.clone(),
            class: plan.class,
            drivers: plan.required,
        })
    }

    /// Deactivate a zone. Deactivating an inactive (or unresolvable) zone
    /// is a no-op; this never fails.
    pub async fn deactivate(&self, zone_id: &ZoneId) {
        let released = {
            let mut table = self.table.lock().unwrap();
            let active = table.active_subzone(zone_id).map(str::to_string);
            match self.catalog.resolve_concrete(zone_id, active.as_deref()) {
                Ok(resolved) => {
                    let concrete = resolved.concrete_id().clone();
                    let was_active = table.zone_state(&concrete).is_some();
                    let released = table.release_zone(&concrete);
                    if let Some((parent, sub)) = resolved.parent {
                        if table.active_subzone(parent) == Some(sub) {
                            table.clear_active_subzone(parent);
                        }
                    }
                    if was_active {
                        info!(zone = %concrete, "deactivated");
                    }
                    released
                }
                Err(_) => Vec::new(),
            }
        };
        self.power.sweep(&released).await;
    }

    /// Current activation state for a zone, resolved like `activate`
    /// resolves it. None when inactive or unknown.
    pub fn status(&self, zone_id: &ZoneId) -> Option<ZoneStatus> {
        let table = self.table.lock().unwrap();
        let active = table.active_subzone(zone_id).map(str::to_string);
        let resolved = self.catalog.resolve_concrete(zone_id, active.as_deref()).ok()?;
        let state = table.zone_state(resolved.concrete_id())?;
        Some(ZoneStatus {
            zone: resolved.concrete_id().clone(),
            subzone: resolved.parent.map(|(_, sub)| sub.to_string()),
            scene: state.scene.clone(),
            class: state.class,
            drivers: state.held.iter().cloned().collect(),
            lost: state.lost.iter().copied().collect(),
        })
    }

    /// Resolution, route selection, conflict arbitration, and the
    /// allocation commit - one critical section.
    fn plan_activation(
        &self,
        zone_id: &ZoneId,
        scene: &Scene,
        override_conflict: bool,
    ) -> Result<CommitPlan, ActivateError> {
        let mut table = self.table.lock().unwrap();

        let active = table.active_subzone(zone_id).map(str::to_string);
        let resolved = self.catalog.resolve_concrete(zone_id, active.as_deref())?;
        let concrete = resolved.concrete_id().clone();

        // A scene offering only audio can never be given the audio+video
        // class, even if the zone supports video.
        let class = if scene.provides_video && resolved.zone.video.is_some() {
            CapabilityClass::AudioVideo
        } else if scene.provides_audio && resolved.zone.audio.is_some() {
            CapabilityClass::Audio
        } else {
            return Err(ActivateError::CapabilityMismatch {
                scene: scene.id.clone(),
                zone: concrete,
            });
        };

        let candidates = self.catalog.routes_for(&scene.id, class);
        if candidates.is_empty() {
            return Err(ActivateError::NoRouteDefined {
                scene: scene.id.clone(),
                class,
            });
        }

        let designated: Vec<&DriverRef> = match class {
            CapabilityClass::Audio => resolved.zone.audio.iter().collect(),
            CapabilityClass::AudioVideo => resolved
                .zone
                .audio
                .iter()
                .chain(resolved.zone.video.iter())
                .collect(),
        };
        let route = candidates
            .iter()
            .find(|route| {
                designated
                    .iter()
                    .all(|designated| route.contains_driver(&designated.driver))
            })
            .ok_or_else(|| ActivateError::NoMatchingRoute {
                scene: scene.id.clone(),
                zone: concrete.clone(),
                class,
            })?;

        let mut required: BTreeSet<DriverId> = route.drivers().cloned().collect();
        required.insert(scene.driver.clone());

        for driver in &required {
            if !self.registry.contains(driver) {
                return Err(ActivateError::UnknownDriver(driver.clone()));
            }
        }

        // Conflict check across the whole required set before touching
        // anything, so a refused activation applies nothing.
        let mut contested = Vec::new();
        for driver in &required {
            if let Some(owner) = table.conflicting_owner(driver, &concrete) {
                if !override_conflict {
                    return Err(ActivateError::DriverConflict {
                        driver: driver.clone(),
                        owning_zone: owner.clone(),
                    });
                }
                contested.push((driver.clone(), owner.clone()));
            }
        }

        for (driver, owner) in contested {
            let lost = self.capabilities_served(&owner, &driver);
            warn!(
                driver = %driver,
                from = %owner,
                to = %concrete,
                "override: forcibly releasing driver"
            );
            let emptied = table.force_release(&driver, &owner, &lost);
            if emptied {
                if let Some((parent, sub)) = owner.as_str().split_once('/') {
                    let parent = ZoneId::new(parent);
                    if table.active_subzone(&parent) == Some(sub) {
                        table.clear_active_subzone(&parent);
                    }
                }
            }
        }

        let diff = table.claim(&concrete, scene.id.clone(), class, required.clone());
        if let Some((parent, sub)) = resolved.parent {
            table.set_active_subzone(parent.clone(), sub.to_string());
        }

        let mut indexes = BTreeMap::new();
        for reference in [&resolved.zone.audio, &resolved.zone.video]
            .into_iter()
            .flatten()
        {
            if let Some(index) = reference.index {
                indexes.insert(reference.driver.clone(), index);
            }
        }

        Ok(CommitPlan {
            concrete,
            class,
            route: route.clone(),
            required,
            power_on: diff.newly_referenced,
            power_off: diff.released,
            indexes,
        })
    }

    /// Which capabilities `driver` serves for the given concrete zone.
    fn capabilities_served(&self, zone_id: &ZoneId, driver: &DriverId) -> Vec<Capability> {
        let Ok(resolved) = self.catalog.resolve_concrete(zone_id, None) else {
            return Vec::new();
        };
        let mut served = Vec::new();
        if let Some(audio) = &resolved.zone.audio {
            if &audio.driver == driver {
                served.push(Capability::Audio);
            }
        }
        if let Some(video) = &resolved.zone.video {
            if &video.driver == driver {
                served.push(Capability::Video);
            }
        }
        served
    }

    /// The I/O phase: power-on, extras, route commands. Runs without the
    /// allocation lock. On failure the committed claims stand and the
    /// error carries the drivers commanded so far.
    async fn execute(
        &self,
        scene: &Scene,
        plan: &CommitPlan,
        extras: Option<BTreeMap<String, String>>,
    ) -> Result<(), ActivateError> {
        let mut commanded: Vec<DriverId> = Vec::new();

        // Power must be confirmed before a freshly powered driver sees
        // commands; routes add explicit delay tokens where hardware needs
        // settle time.
        if let Err(e) = self.power.ensure_on(&plan.power_on).await {
            return Err(ActivateError::CommandFailed {
                driver: e.driver().clone(),
                commanded,
                source: e,
            });
        }

        let mut merged = scene.extras.clone();
        if let Some(extras) = extras {
            merged.extend(extras);
        }
        if !merged.is_empty() {
            let producer = self
                .registry
                .get(&scene.driver)
                .ok_or_else(|| ActivateError::UnknownDriver(scene.driver.clone()))?;
            producer
                .apply_extras(&merged)
                .await
                .map_err(|e| ActivateError::CommandFailed {
                    driver: scene.driver.clone(),
                    commanded: commanded.clone(),
                    source: e,
                })?;
        }

        for step in &plan.route.steps {
            let index = plan.indexes.get(&step.driver).copied();
            for token in &step.commands {
                if is_delay_token(token) {
                    let ms: u64 = token.parse().unwrap_or(0);
                    debug!("route delay: {}ms", ms);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    continue;
                }
                let driver = self
                    .registry
                    .get(&step.driver)
                    .ok_or_else(|| ActivateError::UnknownDriver(step.driver.clone()))?;
                driver.send(token, index, &[]).await.map_err(|e| {
                    ActivateError::CommandFailed {
                        driver: step.driver.clone(),
                        commanded: commanded.clone(),
                        source: e,
                    }
                })?;
                if !commanded.contains(&step.driver) {
                    commanded.push(step.driver.clone());
                }
            }
        }

        Ok(())
    }
}

/// A route command token that is all decimal digits is a delay in
/// milliseconds, not a device command.
fn is_delay_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_token() {
        assert!(is_delay_token("200"));
        assert!(is_delay_token("0"));
        assert!(!is_delay_token("input-hdmi1"));
        assert!(!is_delay_token("4k"));
        assert!(!is_delay_token(""));
    }
}
