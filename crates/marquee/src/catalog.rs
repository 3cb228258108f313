//! Domain types for the installation catalog.
//!
//! The catalog is built once from validated config and is read-only during
//! operation. It answers three questions: what is scene S, what is zone Z,
//! and which candidate routes realize S for a capability class.

use crate::error::ActivateError;
use marqueeconf::CatalogConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Unique identifier for a driver
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverId(pub String);

impl DriverId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a scene
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneId(pub String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a zone. Sub-zones use the `parent/sub` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single output capability of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Audio,
    Video,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Audio => write!(f, "audio"),
            Capability::Video => write!(f, "video"),
        }
    }
}

/// The kind of output a route satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityClass {
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "audio+video")]
    AudioVideo,
}

impl fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityClass::Audio => write!(f, "audio"),
            CapabilityClass::AudioVideo => write!(f, "audio+video"),
        }
    }
}

/// Reference to a driver from a zone, with an optional hardware sub-index
/// (e.g. `receiver:1` for zone 1 of a multi-zone receiver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRef {
    pub driver: DriverId,
    pub index: Option<u8>,
}

impl DriverRef {
    /// Parse the `driver[:index]` form. Config validation has already
    /// rejected malformed indexes.
    pub fn parse(reference: &str) -> Self {
        match reference.split_once(':') {
            Some((driver, index)) => Self {
                driver: DriverId::new(driver),
                index: index.parse().ok(),
            },
            None => Self {
                driver: DriverId::new(reference),
                index: None,
            },
        }
    }
}

/// A selectable content source bound to one producing driver.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: SceneId,
    pub driver: DriverId,
    /// Extra parameters handed to the producing driver on activation
    pub extras: BTreeMap<String, String>,
    pub name: String,
    pub description: String,
    pub provides_audio: bool,
    pub provides_video: bool,
    pub ux_hint: String,
}

/// A concrete zone: a place that consumes audio and/or video through
/// designated drivers.
#[derive(Debug, Clone)]
pub struct SimpleZone {
    pub id: ZoneId,
    pub name: String,
    pub audio: Option<DriverRef>,
    pub video: Option<DriverRef>,
    pub ux_hint: String,
}

impl SimpleZone {
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps = Vec::new();
        if self.audio.is_some() {
            caps.push(Capability::Audio);
        }
        if self.video.is_some() {
            caps.push(Capability::Video);
        }
        caps
    }

    /// The sub-index this zone uses for a given driver, if the driver is
    /// one of its designated audio/video drivers.
    pub fn index_for(&self, driver: &DriverId) -> Option<u8> {
        for reference in [&self.audio, &self.video].into_iter().flatten() {
            if &reference.driver == driver {
                return reference.index;
            }
        }
        None
    }
}

/// A zone as declared: either a concrete zone or a virtual zone of
/// mutually exclusive sub-zones (only one active at a time).
#[derive(Debug, Clone)]
pub enum Zone {
    Simple(SimpleZone),
    Virtual {
        id: ZoneId,
        name: String,
        default: Option<String>,
        subzones: BTreeMap<String, SimpleZone>,
        ux_hint: String,
    },
}

impl Zone {
    pub fn id(&self) -> &ZoneId {
        match self {
            Zone::Simple(zone) => &zone.id,
            Zone::Virtual { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Zone::Simple(zone) => &zone.name,
            Zone::Virtual { name, .. } => name,
        }
    }

    /// Advertised capabilities: a virtual zone advertises the union over
    /// its sub-zones.
    pub fn capabilities(&self) -> Vec<Capability> {
        match self {
            Zone::Simple(zone) => zone.capabilities(),
            Zone::Virtual { subzones, .. } => {
                let mut caps = Vec::new();
                for sub in subzones.values() {
                    for cap in sub.capabilities() {
                        if !caps.contains(&cap) {
                            caps.push(cap);
                        }
                    }
                }
                caps.sort();
                caps
            }
        }
    }
}

/// One step of a route: a driver and the ordered commands to send it.
/// An empty command list means power participation only.
#[derive(Debug, Clone)]
pub struct RouteStep {
    pub driver: DriverId,
    pub commands: Vec<String>,
}

/// A declared set of per-driver command sequences realizing a scene's
/// capability class through specific hardware.
#[derive(Debug, Clone)]
pub struct Route {
    pub steps: Vec<RouteStep>,
}

impl Route {
    pub fn contains_driver(&self, driver: &DriverId) -> bool {
        self.steps.iter().any(|step| &step.driver == driver)
    }

    pub fn drivers(&self) -> impl Iterator<Item = &DriverId> {
        self.steps.iter().map(|step| &step.driver)
    }
}

#[derive(Debug, Clone, Default)]
struct SceneRoutes {
    audio: Vec<Route>,
    audio_video: Vec<Route>,
}

/// The resolution of a zone id to a concrete zone.
#[derive(Debug, Clone)]
pub struct ResolvedZone<'a> {
    /// The concrete zone (a sub-zone for virtual zones)
    pub zone: &'a SimpleZone,
    /// Parent virtual zone id and sub-zone name, when applicable
    pub parent: Option<(&'a ZoneId, &'a str)>,
}

impl ResolvedZone<'_> {
    pub fn concrete_id(&self) -> &ZoneId {
        &self.zone.id
    }
}

/// Static, read-mostly description of scenes, zones, and routes.
#[derive(Debug, Clone)]
pub struct Catalog {
    scenes: HashMap<SceneId, Scene>,
    zones: HashMap<ZoneId, Zone>,
    routes: HashMap<SceneId, SceneRoutes>,
}

impl Catalog {
    /// Build the runtime catalog from validated config.
    pub fn from_config(config: &CatalogConfig) -> Self {
        let mut scenes = HashMap::new();
        for (id, scene) in &config.scenes {
            scenes.insert(
                SceneId::new(id),
                Scene {
                    id: SceneId::new(id),
                    driver: DriverId::new(&scene.driver),
                    extras: scene
                        .driver_extras
                        .as_deref()
                        .map(parse_extras)
                        .unwrap_or_default(),
                    name: scene.name.clone().unwrap_or_else(|| id.clone()),
                    description: scene.description.clone().unwrap_or_default(),
                    provides_audio: scene.audio,
                    provides_video: scene.video,
                    ux_hint: scene.ux_hint.clone().unwrap_or_default(),
                },
            );
        }

        let mut zones = HashMap::new();
        for (id, zone) in &config.zones {
            let zone_id = ZoneId::new(id);
            if zone.subzones.is_empty() {
                zones.insert(
                    zone_id.clone(),
                    Zone::Simple(SimpleZone {
                        id: zone_id,
                        name: zone.name.clone().unwrap_or_else(|| id.clone()),
                        audio: zone.audio.as_deref().map(DriverRef::parse),
                        video: zone.video.as_deref().map(DriverRef::parse),
                        ux_hint: zone.ux_hint.clone().unwrap_or_default(),
                    }),
                );
            } else {
                let mut subzones = BTreeMap::new();
                for (sub_name, sub) in &zone.subzones {
                    subzones.insert(
                        sub_name.clone(),
                        SimpleZone {
                            id: ZoneId::new(format!("{}/{}", id, sub_name)),
                            name: sub.name.clone().unwrap_or_else(|| sub_name.clone()),
                            audio: sub.audio.as_deref().map(DriverRef::parse),
                            video: sub.video.as_deref().map(DriverRef::parse),
                            ux_hint: sub.ux_hint.clone().unwrap_or_default(),
                        },
                    );
                }
                zones.insert(
                    zone_id.clone(),
                    Zone::Virtual {
                        id: zone_id,
                        name: zone.name.clone().unwrap_or_else(|| id.clone()),
                        default: zone.subzone_default.clone(),
                        subzones,
                        ux_hint: zone.ux_hint.clone().unwrap_or_default(),
                    },
                );
            }
        }

        let mut routes = HashMap::new();
        for (scene_id, scene_routes) in &config.routes {
            let convert = |candidates: &[marqueeconf::RouteConfig]| -> Vec<Route> {
                candidates
                    .iter()
                    .map(|route| Route {
                        steps: route
                            .steps
                            .iter()
                            .map(|step| RouteStep {
                                driver: DriverId::new(&step.driver),
                                commands: step.commands.clone(),
                            })
                            .collect(),
                    })
                    .collect()
            };
            routes.insert(
                SceneId::new(scene_id),
                SceneRoutes {
                    audio: convert(&scene_routes.audio),
                    audio_video: convert(&scene_routes.audio_video),
                },
            );
        }

        Self {
            scenes,
            zones,
            routes,
        }
    }

    pub fn scene(&self, id: &SceneId) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Candidate routes for (scene, class), in declaration order. Empty if
    /// none are declared.
    pub fn routes_for(&self, scene: &SceneId, class: CapabilityClass) -> &[Route] {
        self.routes
            .get(scene)
            .map(|routes| match class {
                CapabilityClass::Audio => routes.audio.as_slice(),
                CapabilityClass::AudioVideo => routes.audio_video.as_slice(),
            })
            .unwrap_or(&[])
    }

    /// Resolve a zone id to a concrete zone.
    ///
    /// Virtual zones resolve to the recorded active sub-zone, else their
    /// declared default. The `parent/sub` form addresses a sub-zone
    /// directly.
    pub fn resolve_concrete<'a>(
        &'a self,
        zone_id: &ZoneId,
        active_subzone: Option<&str>,
    ) -> Result<ResolvedZone<'a>, ActivateError> {
        if let Some((parent, sub_name)) = zone_id.as_str().split_once('/') {
            let parent_id = ZoneId::new(parent);
            let zone = self
                .zones
                .get(&parent_id)
                .ok_or_else(|| ActivateError::UnknownZone(zone_id.clone()))?;
            return match zone {
                Zone::Virtual { id, subzones, .. } => {
                    let (name, sub) = subzones
                        .get_key_value(sub_name)
                        .ok_or_else(|| ActivateError::UnknownZone(zone_id.clone()))?;
                    Ok(ResolvedZone {
                        zone: sub,
                        parent: Some((id, name)),
                    })
                }
                Zone::Simple(_) => Err(ActivateError::UnknownZone(zone_id.clone())),
            };
        }

        let zone = self
            .zones
            .get(zone_id)
            .ok_or_else(|| ActivateError::UnknownZone(zone_id.clone()))?;
        match zone {
            Zone::Simple(simple) => Ok(ResolvedZone {
                zone: simple,
                parent: None,
            }),
            Zone::Virtual {
                id,
                default,
                subzones,
                ..
            } => {
                let chosen = active_subzone
                    .or(default.as_deref())
                    .ok_or_else(|| ActivateError::NoDefaultSubzone(zone_id.clone()))?;
                let (name, sub) = subzones
                    .get_key_value(chosen)
                    .ok_or_else(|| ActivateError::NoDefaultSubzone(zone_id.clone()))?;
                Ok(ResolvedZone {
                    zone: sub,
                    parent: Some((id, name)),
                })
            }
        }
    }
}

/// Parse a `key=value,key=value` extras string into a map. Tokens without
/// `=` become flag-style entries with an empty value.
pub fn parse_extras(raw: &str) -> BTreeMap<String, String> {
    let mut extras = BTreeMap::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) => extras.insert(key.trim().to_string(), value.trim().to_string()),
            None => extras.insert(pair.to_string(), String::new()),
        };
    }
    extras
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let config: marqueeconf::MarqueeConfig = toml::from_str(
            r#"
[drivers.receiver]
kind = "av-receiver"
endpoint = "http://av:5000"
inputs = ["dvd"]
zones = 3

[drivers.tv]
kind = "null"

[drivers.projector]
kind = "null"

[drivers.roku]
kind = "roku"
endpoint = "http://roku:8060"

[scenes.roku-netflix]
driver = "roku"
driver-extras = "app=netflix"
audio = true
video = true

[zones.livingroom]
subzone-default = "tv"

[zones.livingroom.subzones.tv]
audio = "receiver:1"
video = "tv"

[zones.livingroom.subzones.projector]
audio = "receiver:1"
video = "projector"

[zones.kitchen]
audio = "receiver:2"

[[routes.roku-netflix.audio-video]]
steps = [
    { driver = "tv", commands = ["input-hdmi1"] },
    { driver = "receiver", commands = ["input-dvd"] },
]

[[routes.roku-netflix.audio]]
steps = [{ driver = "receiver", commands = ["input-dvd"] }]
"#,
        )
        .unwrap();
        config.catalog.validate().unwrap();
        Catalog::from_config(&config.catalog)
    }

    #[test]
    fn test_driver_ref_parse() {
        let parsed = DriverRef::parse("receiver:2");
        assert_eq!(parsed.driver.as_str(), "receiver");
        assert_eq!(parsed.index, Some(2));

        let plain = DriverRef::parse("tv");
        assert_eq!(plain.driver.as_str(), "tv");
        assert_eq!(plain.index, None);
    }

    #[test]
    fn test_parse_extras() {
        let extras = parse_extras("app=netflix, category=video,flag");
        assert_eq!(extras.get("app").map(String::as_str), Some("netflix"));
        assert_eq!(extras.get("category").map(String::as_str), Some("video"));
        assert_eq!(extras.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn test_resolve_simple_zone() {
        let catalog = catalog();
        let resolved = catalog
            .resolve_concrete(&ZoneId::new("kitchen"), None)
            .unwrap();
        assert_eq!(resolved.concrete_id().as_str(), "kitchen");
        assert!(resolved.parent.is_none());
        assert_eq!(resolved.zone.audio.as_ref().unwrap().index, Some(2));
    }

    #[test]
    fn test_resolve_virtual_default() {
        let catalog = catalog();
        let resolved = catalog
            .resolve_concrete(&ZoneId::new("livingroom"), None)
            .unwrap();
        assert_eq!(resolved.concrete_id().as_str(), "livingroom/tv");
        assert_eq!(resolved.parent.unwrap().1, "tv");
    }

    #[test]
    fn test_resolve_virtual_active_sticks() {
        let catalog = catalog();
        let resolved = catalog
            .resolve_concrete(&ZoneId::new("livingroom"), Some("projector"))
            .unwrap();
        assert_eq!(resolved.concrete_id().as_str(), "livingroom/projector");
    }

    #[test]
    fn test_resolve_subzone_addressing() {
        let catalog = catalog();
        let resolved = catalog
            .resolve_concrete(&ZoneId::new("livingroom/projector"), None)
            .unwrap();
        assert_eq!(resolved.concrete_id().as_str(), "livingroom/projector");

        assert!(matches!(
            catalog.resolve_concrete(&ZoneId::new("livingroom/attic"), None),
            Err(ActivateError::UnknownZone(_))
        ));
    }

    #[test]
    fn test_resolve_unknown_zone() {
        let catalog = catalog();
        assert!(matches!(
            catalog.resolve_concrete(&ZoneId::new("garage"), None),
            Err(ActivateError::UnknownZone(_))
        ));
    }

    #[test]
    fn test_routes_for() {
        let catalog = catalog();
        let scene = SceneId::new("roku-netflix");
        assert_eq!(
            catalog.routes_for(&scene, CapabilityClass::AudioVideo).len(),
            1
        );
        assert_eq!(catalog.routes_for(&scene, CapabilityClass::Audio).len(), 1);
        assert!(catalog
            .routes_for(&SceneId::new("ghost"), CapabilityClass::Audio)
            .is_empty());
    }

    #[test]
    fn test_virtual_capabilities_union() {
        let catalog = catalog();
        let zone = catalog.zone(&ZoneId::new("livingroom")).unwrap();
        assert_eq!(
            zone.capabilities(),
            vec![Capability::Audio, Capability::Video]
        );
    }
}
