//! Live allocation state: which zone holds which drivers.
//!
//! Pure bookkeeping, mutated only by the router inside its critical
//! section. Invariant: a driver's owner set always equals the set of
//! zones listing it in their held set, so the reference count is simply
//! the owner set's size.

use crate::catalog::{Capability, CapabilityClass, DriverId, SceneId, ZoneId};
use std::collections::{BTreeSet, HashMap};

/// What a concrete zone currently has active.
#[derive(Debug, Clone)]
pub struct ZoneState {
    pub scene: SceneId,
    pub class: CapabilityClass,
    pub held: BTreeSet<DriverId>,
    /// Capabilities stripped from this zone by overrides
    pub lost: BTreeSet<Capability>,
}

/// Reference-count changes produced by a claim.
#[derive(Debug, Default)]
pub struct ClaimDiff {
    /// Drivers that went from unreferenced to referenced (power-on candidates)
    pub newly_referenced: Vec<DriverId>,
    /// Drivers that dropped to zero references (power-down candidates)
    pub released: Vec<DriverId>,
}

#[derive(Debug, Default)]
pub struct AllocationTable {
    zones: HashMap<ZoneId, ZoneState>,
    owners: HashMap<DriverId, BTreeSet<ZoneId>>,
    active_subzones: HashMap<ZoneId, String>,
}

impl AllocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone_state(&self, zone: &ZoneId) -> Option<&ZoneState> {
        self.zones.get(zone)
    }

    pub fn ref_count(&self, driver: &DriverId) -> usize {
        self.owners.get(driver).map_or(0, BTreeSet::len)
    }

    /// Another zone currently holding the driver, if any.
    pub fn conflicting_owner(&self, driver: &DriverId, requester: &ZoneId) -> Option<&ZoneId> {
        self.owners
            .get(driver)
            .and_then(|owners| owners.iter().find(|owner| *owner != requester))
    }

    pub fn active_subzone(&self, parent: &ZoneId) -> Option<&str> {
        self.active_subzones.get(parent).map(String::as_str)
    }

    pub fn set_active_subzone(&mut self, parent: ZoneId, subzone: String) {
        self.active_subzones.insert(parent, subzone);
    }

    pub fn clear_active_subzone(&mut self, parent: &ZoneId) {
        self.active_subzones.remove(parent);
    }

    /// Replace the zone's claims with `required`. Claims the zone held
    /// that are not in the new set are released.
    pub fn claim(
        &mut self,
        zone: &ZoneId,
        scene: SceneId,
        class: CapabilityClass,
        required: BTreeSet<DriverId>,
    ) -> ClaimDiff {
        let mut diff = ClaimDiff::default();

        if let Some(previous) = self.zones.remove(zone) {
            for driver in previous.held.difference(&required) {
                if self.remove_owner(driver, zone) {
                    diff.released.push(driver.clone());
                }
            }
        }

        for driver in &required {
            let owners = self.owners.entry(driver.clone()).or_default();
            if owners.is_empty() {
                diff.newly_referenced.push(driver.clone());
            }
            owners.insert(zone.clone());
        }

        self.zones.insert(
            zone.clone(),
            ZoneState {
                scene,
                class,
                held: required,
                lost: BTreeSet::new(),
            },
        );

        diff
    }

    /// Drop every claim the zone holds. Returns the drivers that lost
    /// their last reference. A zone with no state is a no-op.
    pub fn release_zone(&mut self, zone: &ZoneId) -> Vec<DriverId> {
        let mut released = Vec::new();
        if let Some(state) = self.zones.remove(zone) {
            for driver in &state.held {
                if self.remove_owner(driver, zone) {
                    released.push(driver.clone());
                }
            }
        }
        released
    }

    /// Forcibly take one driver away from its owning zone (override path).
    ///
    /// The capabilities the driver served for that zone are recorded as
    /// lost. Returns true when the owner was left holding nothing and its
    /// state was removed entirely.
    pub fn force_release(
        &mut self,
        driver: &DriverId,
        owner: &ZoneId,
        lost: &[Capability],
    ) -> bool {
        self.remove_owner(driver, owner);
        if let Some(state) = self.zones.get_mut(owner) {
            state.held.remove(driver);
            state.lost.extend(lost.iter().copied());
            if state.held.is_empty() {
                self.zones.remove(owner);
                return true;
            }
        }
        false
    }

    /// Remove `zone` from the driver's owner set; true when the driver is
    /// left unreferenced.
    fn remove_owner(&mut self, driver: &DriverId, zone: &ZoneId) -> bool {
        if let Some(owners) = self.owners.get_mut(driver) {
            owners.remove(zone);
            if owners.is_empty() {
                self.owners.remove(driver);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drivers(ids: &[&str]) -> BTreeSet<DriverId> {
        ids.iter().map(|id| DriverId::new(*id)).collect()
    }

    #[test]
    fn test_claim_and_release() {
        let mut table = AllocationTable::new();
        let zone = ZoneId::new("kitchen");

        let diff = table.claim(
            &zone,
            SceneId::new("spotify"),
            CapabilityClass::Audio,
            drivers(&["receiver", "spotify"]),
        );
        assert_eq!(diff.newly_referenced.len(), 2);
        assert!(diff.released.is_empty());
        assert_eq!(table.ref_count(&DriverId::new("receiver")), 1);

        let released = table.release_zone(&zone);
        assert_eq!(released.len(), 2);
        assert_eq!(table.ref_count(&DriverId::new("receiver")), 0);
        assert!(table.zone_state(&zone).is_none());
    }

    #[test]
    fn test_release_inactive_zone_is_noop() {
        let mut table = AllocationTable::new();
        assert!(table.release_zone(&ZoneId::new("patio")).is_empty());
    }

    #[test]
    fn test_reclaim_releases_stale_drivers() {
        let mut table = AllocationTable::new();
        let zone = ZoneId::new("den");

        table.claim(
            &zone,
            SceneId::new("dvd"),
            CapabilityClass::AudioVideo,
            drivers(&["dvd", "tv", "receiver"]),
        );
        let diff = table.claim(
            &zone,
            SceneId::new("spotify"),
            CapabilityClass::Audio,
            drivers(&["spotify", "receiver"]),
        );

        assert_eq!(diff.newly_referenced, vec![DriverId::new("spotify")]);
        assert_eq!(
            diff.released,
            vec![DriverId::new("dvd"), DriverId::new("tv")]
        );
        assert_eq!(table.ref_count(&DriverId::new("receiver")), 1);
    }

    #[test]
    fn test_identical_reclaim_changes_nothing() {
        let mut table = AllocationTable::new();
        let zone = ZoneId::new("den");
        let set = drivers(&["roku", "tv"]);

        table.claim(
            &zone,
            SceneId::new("netflix"),
            CapabilityClass::AudioVideo,
            set.clone(),
        );
        let diff = table.claim(
            &zone,
            SceneId::new("netflix"),
            CapabilityClass::AudioVideo,
            set,
        );

        assert!(diff.newly_referenced.is_empty());
        assert!(diff.released.is_empty());
    }

    #[test]
    fn test_conflicting_owner() {
        let mut table = AllocationTable::new();
        let tv_zone = ZoneId::new("livingroom/tv");
        table.claim(
            &tv_zone,
            SceneId::new("netflix"),
            CapabilityClass::AudioVideo,
            drivers(&["receiver", "tv"]),
        );

        let receiver = DriverId::new("receiver");
        assert_eq!(
            table.conflicting_owner(&receiver, &ZoneId::new("livingroom/projector")),
            Some(&tv_zone)
        );
        assert_eq!(table.conflicting_owner(&receiver, &tv_zone), None);
    }

    #[test]
    fn test_force_release_marks_lost_capability() {
        let mut table = AllocationTable::new();
        let tv_zone = ZoneId::new("livingroom/tv");
        table.claim(
            &tv_zone,
            SceneId::new("netflix"),
            CapabilityClass::AudioVideo,
            drivers(&["receiver", "tv"]),
        );

        let emptied =
            table.force_release(&DriverId::new("receiver"), &tv_zone, &[Capability::Audio]);
        assert!(!emptied);

        let state = table.zone_state(&tv_zone).unwrap();
        assert!(!state.held.contains(&DriverId::new("receiver")));
        assert!(state.lost.contains(&Capability::Audio));
        assert_eq!(table.ref_count(&DriverId::new("receiver")), 0);
    }

    #[test]
    fn test_force_release_last_driver_removes_zone() {
        let mut table = AllocationTable::new();
        let zone = ZoneId::new("kitchen");
        table.claim(
            &zone,
            SceneId::new("spotify"),
            CapabilityClass::Audio,
            drivers(&["receiver"]),
        );

        let emptied = table.force_release(&DriverId::new("receiver"), &zone, &[Capability::Audio]);
        assert!(emptied);
        assert!(table.zone_state(&zone).is_none());
    }

    #[test]
    fn test_active_subzone_tracking() {
        let mut table = AllocationTable::new();
        let parent = ZoneId::new("livingroom");

        assert_eq!(table.active_subzone(&parent), None);
        table.set_active_subzone(parent.clone(), "projector".to_string());
        assert_eq!(table.active_subzone(&parent), Some("projector"));
        table.clear_active_subzone(&parent);
        assert_eq!(table.active_subzone(&parent), None);
    }
}
