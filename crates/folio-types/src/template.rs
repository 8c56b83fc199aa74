//! Templates: named zone configurations that seed and filter block types.
//!
//! A template maps zone name → block type name → `{ enabled, defaults }`:
//!
//! ```json
//! {
//!   "name": "Weekly market letter",
//!   "zones": {
//!     "header": { "enabled": true, "blockTypes": {
//!         "hero": { "enabled": true, "defaults": { "ctaLabel": "Read more" } }
//!     } },
//!     "body": { "enabled": true, "blockTypes": { ... } }
//!   }
//! }
//! ```
//!
//! Zone order is the order the zones appear in the source object and is
//! significant: default resolution scans zones front to back. Templates are
//! authored elsewhere and are read-only here, so parsing is lenient. A
//! malformed template loses the parts that don't parse instead of failing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::{BlockType, FieldMap};
use crate::ids::TemplateId;

/// Per-block-type settings within one zone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneBlockConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Partial field data laid over the registry defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<FieldMap>,
}

/// A named grouping within a template (e.g. "header").
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateZone {
    #[serde(default)]
    pub enabled: bool,
    /// Keyed by block type wire name. Unknown names are kept but never match.
    #[serde(default)]
    pub block_types: IndexMap<String, ZoneBlockConfig>,
}

impl TemplateZone {
    /// Settings for `block_type` in this zone, if the zone mentions it.
    pub fn block_config(&self, block_type: BlockType) -> Option<&ZoneBlockConfig> {
        self.block_types
            .iter()
            .find(|(name, _)| BlockType::from_str(name) == Some(block_type))
            .map(|(_, config)| config)
    }
}

/// A reusable document template.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default = "TemplateId::nil")]
    pub id: TemplateId,
    #[serde(default)]
    pub name: String,
    /// Zones in definition order.
    #[serde(default)]
    pub zones: IndexMap<String, TemplateZone>,
}

impl Template {
    /// Create an empty template.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TemplateId::new(),
            name: name.into(),
            zones: IndexMap::new(),
        }
    }

    /// Append a zone (builder style). Later zones lose to earlier ones.
    pub fn with_zone(mut self, name: impl Into<String>, zone: TemplateZone) -> Self {
        self.zones.insert(name.into(), zone);
        self
    }

    /// Parse a template leniently.
    ///
    /// Missing or non-object `zones` yields a template with no zones. Zones and
    /// block entries that fail to parse are skipped. Every skip is logged.
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            tracing::warn!("template is not a JSON object, ignoring it");
            return Self {
                id: TemplateId::nil(),
                ..Default::default()
            };
        };

        let id = object
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| TemplateId::parse(s).ok())
            .unwrap_or_else(TemplateId::nil);
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut zones = IndexMap::new();
        match object.get("zones").and_then(Value::as_object) {
            Some(raw_zones) => {
                for (zone_name, raw_zone) in raw_zones {
                    if let Some(zone) = parse_zone(zone_name, raw_zone) {
                        zones.insert(zone_name.clone(), zone);
                    }
                }
            }
            None => {
                tracing::warn!(template = %name, "template has no zones object, using registry defaults only");
            }
        }

        Self { id, name, zones }
    }

    /// Block types enabled in at least one enabled zone, in first-seen order.
    ///
    /// This is a picker filter only. Adding other types is still permitted.
    pub fn offerable_block_types(&self) -> Vec<BlockType> {
        let mut offered = Vec::new();
        for zone in self.zones.values().filter(|z| z.enabled) {
            for (name, config) in &zone.block_types {
                if !config.enabled {
                    continue;
                }
                if let Some(block_type) = BlockType::from_str(name) {
                    if !offered.contains(&block_type) {
                        offered.push(block_type);
                    }
                }
            }
        }
        offered
    }
}

fn parse_zone(zone_name: &str, raw: &Value) -> Option<TemplateZone> {
    let Some(object) = raw.as_object() else {
        tracing::warn!(zone = zone_name, "skipping template zone that is not an object");
        return None;
    };
    let enabled = object.get("enabled").and_then(Value::as_bool).unwrap_or(false);

    let mut block_types = IndexMap::new();
    if let Some(raw_types) = object.get("blockTypes").and_then(Value::as_object) {
        for (type_name, raw_config) in raw_types {
            match serde_json::from_value::<ZoneBlockConfig>(raw_config.clone()) {
                Ok(config) => {
                    block_types.insert(type_name.clone(), config);
                }
                Err(e) => {
                    tracing::warn!(zone = zone_name, block_type = %type_name, error = %e, "skipping malformed zone block entry");
                }
            }
        }
    }

    Some(TemplateZone {
        enabled,
        block_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zone_order_is_definition_order() {
        let template = Template::from_json(&json!({
            "zones": {
                "zeta": {"enabled": true, "blockTypes": {}},
                "alpha": {"enabled": true, "blockTypes": {}},
            }
        }));
        let names: Vec<&str> = template.zones.keys().map(String::as_str).collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }

    #[test]
    fn test_missing_zones_is_empty() {
        let template = Template::from_json(&json!({"name": "broken"}));
        assert_eq!(template.name, "broken");
        assert!(template.zones.is_empty());
    }

    #[test]
    fn test_non_object_template_is_empty() {
        assert!(Template::from_json(&json!("nope")).zones.is_empty());
        assert!(Template::from_json(&json!({"zones": [1, 2]})).zones.is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let template = Template::from_json(&json!({
            "zones": {
                "bad": 7,
                "good": {"enabled": true, "blockTypes": {
                    "hero": {"enabled": "yes"},
                    "footer": {"enabled": true, "defaults": {"companyName": "Acme"}},
                }},
            }
        }));
        assert_eq!(template.zones.len(), 1);
        let zone = &template.zones["good"];
        assert!(zone.block_config(BlockType::Hero).is_none());
        let footer = zone.block_config(BlockType::Footer).unwrap();
        assert!(footer.enabled);
        assert_eq!(footer.defaults.as_ref().unwrap()["companyName"], json!("Acme"));
    }

    #[test]
    fn test_offerable_block_types() {
        let template = Template::from_json(&json!({
            "zones": {
                "header": {"enabled": true, "blockTypes": {
                    "hero": {"enabled": true},
                    "divider": {"enabled": false},
                }},
                "hidden": {"enabled": false, "blockTypes": {
                    "footer": {"enabled": true},
                }},
                "body": {"enabled": true, "blockTypes": {
                    "intro": {"enabled": true},
                    "hero": {"enabled": true},
                    "weather": {"enabled": true},
                }},
            }
        }));
        assert_eq!(
            template.offerable_block_types(),
            vec![BlockType::Hero, BlockType::Introduction]
        );
    }

    #[test]
    fn test_serde_roundtrip_preserves_zone_order() {
        let template = Template::new("weekly")
            .with_zone("b", TemplateZone { enabled: true, ..Default::default() })
            .with_zone("a", TemplateZone { enabled: true, ..Default::default() });
        let json = serde_json::to_value(&template).unwrap();
        let parsed = Template::from_json(&json);
        assert_eq!(parsed, template);
    }
}
