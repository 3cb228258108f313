//! Catalog configuration - the static description of the installation.
//!
//! Drivers, scenes, zones, and routes are declared here and validated once
//! at load. Dangling references (a scene naming an undeclared driver, a
//! route step for a driver that does not exist) are rejected at startup
//! rather than surfacing at activation time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Catalog validation errors, produced at load time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("scene {scene} references undeclared driver {driver}")]
    SceneUnknownDriver { scene: String, driver: String },

    #[error("zone {zone} references undeclared driver {driver}")]
    ZoneUnknownDriver { zone: String, driver: String },

    #[error("route for scene {scene} ({class}) references undeclared driver {driver}")]
    RouteUnknownDriver {
        scene: String,
        class: String,
        driver: String,
    },

    #[error("routes declared for unknown scene {scene}")]
    RouteUnknownScene { scene: String },

    #[error("route for scene {scene} ({class}) has no steps")]
    EmptyRoute { scene: String, class: String },

    #[error("scene {scene} provides neither audio nor video")]
    SceneWithoutOutput { scene: String },

    #[error("zone {zone} has neither an audio nor a video driver")]
    ZoneWithoutCapability { zone: String },

    #[error("zone {zone} mixes direct drivers with subzones")]
    ZoneMixesSubzones { zone: String },

    #[error("zone {zone} declares default subzone {subzone} which does not exist")]
    UnknownDefaultSubzone { zone: String, subzone: String },

    #[error("zone {zone} driver reference {reference} has an invalid sub-index")]
    BadDriverReference { zone: String, reference: String },
}

/// Which concrete driver implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverKind {
    /// Roku streaming box, REST keypress protocol
    Roku,
    /// IR blaster behind an HTTP bridge, named sequences
    IrBridge,
    /// Multi-zone AV receiver, REST control
    AvReceiver,
    /// Inert driver for scenes that need no device control
    Null,
}

/// One IR command entry for an `ir-bridge` driver.
///
/// `sequence` is a comma-separated list of IR command names; a token that
/// is all decimal digits is a delay in milliseconds. Omitting `sequence`
/// sends the command name itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct IrCommandConfig {
    /// Semantic command type (e.g. "power-on", "input-select")
    #[serde(rename = "type")]
    pub command_type: String,

    #[serde(default)]
    pub sequence: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Declaration of one driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DriverConfig {
    pub kind: DriverKind,

    /// Base URL of the device or bridge. Unused by `null` drivers.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Named IR sequences (ir-bridge only)
    #[serde(default)]
    pub commands: BTreeMap<String, IrCommandConfig>,

    /// Launchable app name to app id (roku only), used by `app=` extras
    #[serde(default)]
    pub apps: BTreeMap<String, u32>,

    /// Selectable input names (av-receiver only); each becomes an
    /// `input-<name>` command.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Number of hardware zones (av-receiver only)
    #[serde(default = "default_zone_count")]
    pub zones: u8,
}

fn default_zone_count() -> u8 {
    1
}

/// Declaration of one scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SceneConfig {
    /// Producing driver
    pub driver: String,

    /// Free-form key=value list handed to the driver on activation
    #[serde(default)]
    pub driver_extras: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub audio: bool,

    #[serde(default)]
    pub video: bool,

    /// Cosmetic hints passed through to clients untouched
    #[serde(default)]
    pub ux_hint: Option<String>,
}

/// A sub-zone of a virtual zone. Sub-zones cannot nest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SubzoneConfig {
    #[serde(default)]
    pub name: Option<String>,

    /// Audio driver reference, e.g. "receiver:1"
    #[serde(default)]
    pub audio: Option<String>,

    /// Video driver reference
    #[serde(default)]
    pub video: Option<String>,

    #[serde(default)]
    pub ux_hint: Option<String>,
}

/// Declaration of one zone - either simple (audio/video refs) or virtual
/// (subzones plus a default).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ZoneConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub audio: Option<String>,

    #[serde(default)]
    pub video: Option<String>,

    #[serde(default)]
    pub subzone_default: Option<String>,

    #[serde(default)]
    pub subzones: BTreeMap<String, SubzoneConfig>,

    #[serde(default)]
    pub ux_hint: Option<String>,
}

/// One step of a route: a driver and the commands to send it, in order.
/// An empty command list means the driver participates via power only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStepConfig {
    pub driver: String,

    #[serde(default)]
    pub commands: Vec<String>,
}

/// One candidate route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub steps: Vec<RouteStepConfig>,
}

/// Candidate routes for one scene, per capability class, in declaration
/// order (declaration order is the documented tie-break).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct SceneRoutesConfig {
    #[serde(default)]
    pub audio: Vec<RouteConfig>,

    #[serde(default)]
    pub audio_video: Vec<RouteConfig>,
}

/// The full catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub drivers: BTreeMap<String, DriverConfig>,

    #[serde(default)]
    pub scenes: BTreeMap<String, SceneConfig>,

    #[serde(default)]
    pub zones: BTreeMap<String, ZoneConfig>,

    #[serde(default)]
    pub routes: BTreeMap<String, SceneRoutesConfig>,
}

impl CatalogConfig {
    /// Validate cross-references. Called once at load.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (id, scene) in &self.scenes {
            if !self.drivers.contains_key(&scene.driver) {
                return Err(ValidationError::SceneUnknownDriver {
                    scene: id.clone(),
                    driver: scene.driver.clone(),
                });
            }
            if !scene.audio && !scene.video {
                return Err(ValidationError::SceneWithoutOutput { scene: id.clone() });
            }
        }

        for (id, zone) in &self.zones {
            if !zone.subzones.is_empty() {
                if zone.audio.is_some() || zone.video.is_some() {
                    return Err(ValidationError::ZoneMixesSubzones { zone: id.clone() });
                }
                if let Some(default) = &zone.subzone_default {
                    if !zone.subzones.contains_key(default) {
                        return Err(ValidationError::UnknownDefaultSubzone {
                            zone: id.clone(),
                            subzone: default.clone(),
                        });
                    }
                }
                for (sub_name, sub) in &zone.subzones {
                    let sub_id = format!("{}/{}", id, sub_name);
                    self.check_simple_zone(&sub_id, sub.audio.as_deref(), sub.video.as_deref())?;
                }
            } else {
                self.check_simple_zone(id, zone.audio.as_deref(), zone.video.as_deref())?;
            }
        }

        for (scene_id, routes) in &self.routes {
            if !self.scenes.contains_key(scene_id) {
                return Err(ValidationError::RouteUnknownScene {
                    scene: scene_id.clone(),
                });
            }
            for (class, candidates) in [("audio", &routes.audio), ("audio+video", &routes.audio_video)]
            {
                for route in candidates {
                    if route.steps.is_empty() {
                        return Err(ValidationError::EmptyRoute {
                            scene: scene_id.clone(),
                            class: class.to_string(),
                        });
                    }
                    for step in &route.steps {
                        if !self.drivers.contains_key(&step.driver) {
                            return Err(ValidationError::RouteUnknownDriver {
                                scene: scene_id.clone(),
                                class: class.to_string(),
                                driver: step.driver.clone(),
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn check_simple_zone(
        &self,
        zone_id: &str,
        audio: Option<&str>,
        video: Option<&str>,
    ) -> Result<(), ValidationError> {
        if audio.is_none() && video.is_none() {
            return Err(ValidationError::ZoneWithoutCapability {
                zone: zone_id.to_string(),
            });
        }
        for reference in [audio, video].into_iter().flatten() {
            let (driver, index) = match reference.split_once(':') {
                Some((driver, index)) => (driver, Some(index)),
                None => (reference, None),
            };
            if !self.drivers.contains_key(driver) {
                return Err(ValidationError::ZoneUnknownDriver {
                    zone: zone_id.to_string(),
                    driver: driver.to_string(),
                });
            }
            if let Some(index) = index {
                if index.parse::<u8>().is_err() {
                    return Err(ValidationError::BadDriverReference {
                        zone: zone_id.to_string(),
                        reference: reference.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_catalog() -> CatalogConfig {
        let toml = r#"
[drivers.receiver]
kind = "av-receiver"
endpoint = "http://av:5000"
inputs = ["dvd", "cd"]
zones = 3

[drivers.roku]
kind = "roku"
endpoint = "http://roku:8060"

[scenes.netflix]
driver = "roku"
driver-extras = "app=netflix"
audio = true
video = true

[zones.kitchen]
audio = "receiver:2"

[[routes.netflix.audio]]
steps = [{ driver = "receiver", commands = ["input-dvd"] }]
"#;
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_valid_catalog() {
        minimal_catalog().validate().unwrap();
    }

    #[test]
    fn test_scene_unknown_driver() {
        let mut catalog = minimal_catalog();
        catalog.scenes.get_mut("netflix").unwrap().driver = "ghost".to_string();
        assert_eq!(
            catalog.validate(),
            Err(ValidationError::SceneUnknownDriver {
                scene: "netflix".to_string(),
                driver: "ghost".to_string(),
            })
        );
    }

    #[test]
    fn test_zone_unknown_driver() {
        let mut catalog = minimal_catalog();
        catalog.zones.get_mut("kitchen").unwrap().audio = Some("ghost:1".to_string());
        assert_eq!(
            catalog.validate(),
            Err(ValidationError::ZoneUnknownDriver {
                zone: "kitchen".to_string(),
                driver: "ghost".to_string(),
            })
        );
    }

    #[test]
    fn test_route_unknown_driver() {
        let mut catalog = minimal_catalog();
        catalog.routes.get_mut("netflix").unwrap().audio[0].steps[0].driver = "ghost".to_string();
        assert!(matches!(
            catalog.validate(),
            Err(ValidationError::RouteUnknownDriver { .. })
        ));
    }

    #[test]
    fn test_route_unknown_scene() {
        let mut catalog = minimal_catalog();
        let routes = catalog.routes.remove("netflix").unwrap();
        catalog.routes.insert("ghost".to_string(), routes);
        assert_eq!(
            catalog.validate(),
            Err(ValidationError::RouteUnknownScene {
                scene: "ghost".to_string(),
            })
        );
    }

    #[test]
    fn test_zone_without_capability() {
        let mut catalog = minimal_catalog();
        catalog.zones.insert("patio".to_string(), ZoneConfig::default());
        assert_eq!(
            catalog.validate(),
            Err(ValidationError::ZoneWithoutCapability {
                zone: "patio".to_string(),
            })
        );
    }

    #[test]
    fn test_bad_subzone_default() {
        let mut catalog = minimal_catalog();
        let mut zone = ZoneConfig::default();
        zone.subzone_default = Some("projector".to_string());
        zone.subzones.insert(
            "tv".to_string(),
            SubzoneConfig {
                name: None,
                audio: Some("receiver:1".to_string()),
                video: None,
                ux_hint: None,
            },
        );
        catalog.zones.insert("livingroom".to_string(), zone);
        assert_eq!(
            catalog.validate(),
            Err(ValidationError::UnknownDefaultSubzone {
                zone: "livingroom".to_string(),
                subzone: "projector".to_string(),
            })
        );
    }

    #[test]
    fn test_bad_driver_reference_index() {
        let mut catalog = minimal_catalog();
        catalog.zones.get_mut("kitchen").unwrap().audio = Some("receiver:main".to_string());
        assert!(matches!(
            catalog.validate(),
            Err(ValidationError::BadDriverReference { .. })
        ));
    }
}
