//! Template default resolution.
//!
//! Starts from the registry defaults for a block type and lays the defaults of
//! the **first** template zone that enables that type over them. Zones are
//! scanned in definition order; later zones that also enable the type are
//! ignored, even if their defaults differ. The merge is shallow: template keys
//! win, everything else falls through to the registry.
//!
//! Only the block-type entry's `enabled` flag gates a match. A zone's own
//! `enabled` flag feeds the picker filter ([`Template::offerable_block_types`])
//! and does not affect defaults.

use folio_types::{BlockType, FieldData, Template};

use crate::registry;

/// Initial field data for a new block of `block_type`.
///
/// Never fails: a template whose defaults don't fit the block schema is
/// logged and ignored, leaving the registry defaults.
pub fn resolve_defaults(block_type: BlockType, template: Option<&Template>) -> FieldData {
    let base = registry::default_field_data(block_type);
    let Some(template) = template else {
        return base;
    };

    for (zone_name, zone) in &template.zones {
        let Some(config) = zone.block_config(block_type) else {
            continue;
        };
        if !config.enabled {
            continue;
        }

        let Some(defaults) = &config.defaults else {
            tracing::debug!(zone = %zone_name, %block_type, "template zone enables block type without defaults");
            return base;
        };

        let mut merged = base.clone();
        return match merged.merge(defaults) {
            Ok(()) => {
                tracing::debug!(zone = %zone_name, %block_type, "applied template defaults");
                merged
            }
            Err(e) => {
                tracing::warn!(zone = %zone_name, %block_type, error = %e, "ignoring template defaults that do not fit the block schema");
                base
            }
        };
    }

    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(value: serde_json::Value) -> Template {
        Template::from_json(&value)
    }

    #[test]
    fn test_no_template_returns_registry_defaults() {
        assert_eq!(
            resolve_defaults(BlockType::Hero, None),
            registry::default_field_data(BlockType::Hero)
        );
    }

    #[test]
    fn test_template_overrides_and_falls_through() {
        let t = template(json!({"zones": {"header": {"enabled": true, "blockTypes": {
            "hero": {"enabled": true, "defaults": {"headline": "Weekly Markets"}}
        }}}}));
        let fields = resolve_defaults(BlockType::Hero, Some(&t));
        assert_eq!(fields.get("headline"), Some(json!("Weekly Markets")));
        // Not in the template: registry value.
        assert_eq!(fields.get("ctaLabel"), Some(json!("Read more")));
    }

    #[test]
    fn test_first_zone_wins() {
        let t = template(json!({"zones": {
            "first": {"enabled": true, "blockTypes": {
                "footer": {"enabled": true, "defaults": {"companyName": "First Co"}}
            }},
            "second": {"enabled": true, "blockTypes": {
                "footer": {"enabled": true, "defaults": {"companyName": "Second Co", "address": "2 Main St"}}
            }},
        }}));
        let fields = resolve_defaults(BlockType::Footer, Some(&t));
        assert_eq!(fields.get("companyName"), Some(json!("First Co")));
        assert_eq!(fields.get("address"), Some(json!("")));
    }

    #[test]
    fn test_disabled_entry_is_skipped() {
        let t = template(json!({"zones": {
            "first": {"enabled": true, "blockTypes": {
                "footer": {"enabled": false, "defaults": {"companyName": "Disabled Co"}}
            }},
            "second": {"enabled": true, "blockTypes": {
                "footer": {"enabled": true, "defaults": {"companyName": "Enabled Co"}}
            }},
        }}));
        let fields = resolve_defaults(BlockType::Footer, Some(&t));
        assert_eq!(fields.get("companyName"), Some(json!("Enabled Co")));
    }

    #[test]
    fn test_first_match_without_defaults_stops_scan() {
        let t = template(json!({"zones": {
            "first": {"enabled": true, "blockTypes": {"divider": {"enabled": true}}},
            "second": {"enabled": true, "blockTypes": {
                "divider": {"enabled": true, "defaults": {"style": "space"}}
            }},
        }}));
        let fields = resolve_defaults(BlockType::Divider, Some(&t));
        assert_eq!(fields.get("style"), Some(json!("line")));
    }

    #[test]
    fn test_malformed_template_degrades_to_registry() {
        let t = template(json!({"name": "no zones here"}));
        assert_eq!(
            resolve_defaults(BlockType::Introduction, Some(&t)),
            registry::default_field_data(BlockType::Introduction)
        );
    }

    #[test]
    fn test_ill_typed_defaults_degrade_to_registry() {
        let t = template(json!({"zones": {"z": {"enabled": true, "blockTypes": {
            "introduction": {"enabled": true, "defaults": {"title": {"nested": true}}}
        }}}}));
        assert_eq!(
            resolve_defaults(BlockType::Introduction, Some(&t)),
            registry::default_field_data(BlockType::Introduction)
        );
    }

    #[test]
    fn test_type_not_in_template() {
        let t = template(json!({"zones": {"z": {"enabled": true, "blockTypes": {
            "hero": {"enabled": true, "defaults": {"headline": "x"}}
        }}}}));
        assert_eq!(
            resolve_defaults(BlockType::Footer, Some(&t)),
            registry::default_field_data(BlockType::Footer)
        );
    }
}
