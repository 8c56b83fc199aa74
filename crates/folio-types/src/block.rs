//! Block types, per-type field records, and block instances.
//!
//! ## Design: BlockType + FieldData
//!
//! `BlockType` is the closed set of content blocks an editor can offer. Each
//! type has its own strongly typed field record, and `FieldData` is the tagged
//! union over those records. Matching on `FieldData` is exhaustive, so adding a
//! block type is a compile error everywhere that still needs a case for it.
//!
//! Storage treats field data as an opaque JSON object (`BlockRecord`). The
//! conversion goes through [`FieldData::from_json`] / [`FieldData::to_map`]:
//!
//! - Every typed record, and every row record nested inside one, carries a
//!   flattened `extra` map, so keys written by a newer or older editor
//!   survive a load/save cycle untouched.
//! - A `null` stored under a field reads as that field's default, the same
//!   as a `null` sent in a partial update.
//! - A record whose type tag is unknown becomes [`FieldData::Legacy`]. That is
//!   the only untyped payload the model admits.
//! - A null blob is an empty object. Field data is never absent.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::EnumString;

use crate::ids::BlockId;

/// JSON object holding field values, keyed by camelCase field name.
pub type FieldMap = Map<String, Value>;

/// What a block *is*. Determines its field schema and how it renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BlockType {
    /// Banner image with headline and call-to-action button.
    Hero,
    /// Opening title and body copy.
    #[strum(serialize = "introduction", serialize = "intro")]
    Introduction,
    /// Table of market indices with daily change.
    MarketOverview,
    /// Selected stocks with price and commentary.
    StockSpotlight,
    /// Links to longer-form articles.
    #[strum(serialize = "article_list", serialize = "articles")]
    ArticleList,
    /// Short news items from external sources.
    #[strum(serialize = "news_roundup", serialize = "news")]
    NewsRoundup,
    /// Heading, copy, and a single button.
    #[strum(serialize = "call_to_action", serialize = "cta")]
    CallToAction,
    /// Visual separator.
    Divider,
    /// Legal copy, address, unsubscribe link.
    Footer,
}

impl BlockType {
    /// Every block type, in picker order.
    pub const ALL: [BlockType; 9] = [
        BlockType::Hero,
        BlockType::Introduction,
        BlockType::MarketOverview,
        BlockType::StockSpotlight,
        BlockType::ArticleList,
        BlockType::NewsRoundup,
        BlockType::CallToAction,
        BlockType::Divider,
        BlockType::Footer,
    ];

    /// Parse from string (case-insensitive, accepts short aliases).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s.trim()).ok()
    }

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Hero => "hero",
            BlockType::Introduction => "introduction",
            BlockType::MarketOverview => "market_overview",
            BlockType::StockSpotlight => "stock_spotlight",
            BlockType::ArticleList => "article_list",
            BlockType::NewsRoundup => "news_roundup",
            BlockType::CallToAction => "call_to_action",
            BlockType::Divider => "divider",
            BlockType::Footer => "footer",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Per-type field records
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeroFields {
    pub headline: String,
    pub subheadline: String,
    pub image_url: String,
    pub cta_label: String,
    pub cta_url: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntroductionFields {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

/// One row of the market overview table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketIndex {
    pub name: String,
    /// Level of the index. Missing values read as `0.0`.
    pub value: f64,
    pub change_percent: f64,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketOverviewFields {
    pub title: String,
    pub summary: String,
    pub as_of: String,
    pub indices: Vec<MarketIndex>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StockPick {
    pub symbol: String,
    pub company: String,
    pub price: f64,
    pub change_percent: f64,
    pub commentary: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StockSpotlightFields {
    pub title: String,
    pub stocks: Vec<StockPick>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArticleLink {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub image_url: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArticleListFields {
    pub title: String,
    pub articles: Vec<ArticleLink>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewsItem {
    pub headline: String,
    pub source: String,
    pub url: String,
    pub summary: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewsRoundupFields {
    pub title: String,
    pub news_items: Vec<NewsItem>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallToActionFields {
    pub heading: String,
    pub body: String,
    pub button_label: String,
    pub button_url: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DividerFields {
    /// Free-form style hint for the rendering host ("line", "space", ...).
    pub style: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FooterFields {
    pub company_name: String,
    pub address: String,
    pub unsubscribe_url: String,
    pub disclaimer: String,
    pub social_links: Vec<SocialLink>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

// ============================================================================
// FieldData
// ============================================================================

/// Errors converting between JSON blobs and typed field records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldDataError {
    /// The blob is a JSON array, string, or number instead of an object.
    #[error("field data for {block_type} must be a JSON object, got {found}")]
    NotAnObject { block_type: String, found: &'static str },

    /// A known field holds a value of the wrong JSON type.
    #[error("invalid field data for {block_type}: {message}")]
    InvalidField { block_type: String, message: String },
}

/// Field data of one block: a typed record per [`BlockType`], or a legacy blob.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldData {
    Hero(HeroFields),
    Introduction(IntroductionFields),
    MarketOverview(MarketOverviewFields),
    StockSpotlight(StockSpotlightFields),
    ArticleList(ArticleListFields),
    NewsRoundup(NewsRoundupFields),
    CallToAction(CallToActionFields),
    Divider(DividerFields),
    Footer(FooterFields),
    /// A record whose type tag this build does not know, kept verbatim.
    Legacy { block_type: String, data: FieldMap },
}

impl FieldData {
    /// The block type, or `None` for legacy records.
    pub fn block_type(&self) -> Option<BlockType> {
        match self {
            FieldData::Hero(_) => Some(BlockType::Hero),
            FieldData::Introduction(_) => Some(BlockType::Introduction),
            FieldData::MarketOverview(_) => Some(BlockType::MarketOverview),
            FieldData::StockSpotlight(_) => Some(BlockType::StockSpotlight),
            FieldData::ArticleList(_) => Some(BlockType::ArticleList),
            FieldData::NewsRoundup(_) => Some(BlockType::NewsRoundup),
            FieldData::CallToAction(_) => Some(BlockType::CallToAction),
            FieldData::Divider(_) => Some(BlockType::Divider),
            FieldData::Footer(_) => Some(BlockType::Footer),
            FieldData::Legacy { .. } => None,
        }
    }

    /// The type tag as persisted (legacy records keep their original tag).
    pub fn type_name(&self) -> &str {
        match self {
            FieldData::Legacy { block_type, .. } => block_type,
            typed => typed.block_type().map(|t| t.as_str()).unwrap_or_default(),
        }
    }

    /// Check if this is an unrecognized legacy record.
    pub fn is_legacy(&self) -> bool {
        matches!(self, FieldData::Legacy { .. })
    }

    /// Decode a JSON object into the record for `block_type`.
    pub fn from_map(block_type: BlockType, mut map: FieldMap) -> Result<Self, FieldDataError> {
        drop_nulls(&mut map);
        let value = Value::Object(map);
        let invalid = |e: serde_json::Error| FieldDataError::InvalidField {
            block_type: block_type.as_str().to_string(),
            message: e.to_string(),
        };
        Ok(match block_type {
            BlockType::Hero => FieldData::Hero(serde_json::from_value(value).map_err(invalid)?),
            BlockType::Introduction => {
                FieldData::Introduction(serde_json::from_value(value).map_err(invalid)?)
            }
            BlockType::MarketOverview => {
                FieldData::MarketOverview(serde_json::from_value(value).map_err(invalid)?)
            }
            BlockType::StockSpotlight => {
                FieldData::StockSpotlight(serde_json::from_value(value).map_err(invalid)?)
            }
            BlockType::ArticleList => {
                FieldData::ArticleList(serde_json::from_value(value).map_err(invalid)?)
            }
            BlockType::NewsRoundup => {
                FieldData::NewsRoundup(serde_json::from_value(value).map_err(invalid)?)
            }
            BlockType::CallToAction => {
                FieldData::CallToAction(serde_json::from_value(value).map_err(invalid)?)
            }
            BlockType::Divider => FieldData::Divider(serde_json::from_value(value).map_err(invalid)?),
            BlockType::Footer => FieldData::Footer(serde_json::from_value(value).map_err(invalid)?),
        })
    }

    /// Decode a persisted blob. Unknown type names become [`FieldData::Legacy`].
    pub fn from_json(type_name: &str, value: Value) -> Result<Self, FieldDataError> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => FieldMap::new(),
            other => {
                return Err(FieldDataError::NotAnObject {
                    block_type: type_name.to_string(),
                    found: json_kind(&other),
                });
            }
        };
        match BlockType::from_str(type_name) {
            Some(block_type) => Self::from_map(block_type, map),
            None => Ok(FieldData::Legacy {
                block_type: type_name.to_string(),
                data: map,
            }),
        }
    }

    /// Decode a persisted blob, degrading undecodable data to a legacy record.
    ///
    /// Used on the read path: a corrupt row must still list and render.
    pub fn from_json_lossy(type_name: &str, value: Value) -> Self {
        match Self::from_json(type_name, value.clone()) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(block_type = type_name, error = %e, "keeping undecodable field data as legacy");
                let data = match value {
                    Value::Object(map) => map,
                    other => {
                        let mut map = FieldMap::new();
                        map.insert("value".to_string(), other);
                        map
                    }
                };
                FieldData::Legacy {
                    block_type: type_name.to_string(),
                    data,
                }
            }
        }
    }

    /// Encode as the JSON object storage persists.
    pub fn to_map(&self) -> FieldMap {
        let value = match self {
            FieldData::Hero(f) => serde_json::to_value(f),
            FieldData::Introduction(f) => serde_json::to_value(f),
            FieldData::MarketOverview(f) => serde_json::to_value(f),
            FieldData::StockSpotlight(f) => serde_json::to_value(f),
            FieldData::ArticleList(f) => serde_json::to_value(f),
            FieldData::NewsRoundup(f) => serde_json::to_value(f),
            FieldData::CallToAction(f) => serde_json::to_value(f),
            FieldData::Divider(f) => serde_json::to_value(f),
            FieldData::Footer(f) => serde_json::to_value(f),
            FieldData::Legacy { data, .. } => return data.clone(),
        };
        match value {
            Ok(Value::Object(map)) => map,
            _ => FieldMap::new(),
        }
    }

    /// Encode as a JSON value (always an object).
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// Read one field by its camelCase name.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.to_map().remove(field)
    }

    /// Shallow-merge `partial` over the current fields.
    ///
    /// Keys in `partial` replace existing values; keys it omits are retained.
    /// A `null` value resets the field to its default. The merged object is
    /// re-validated against the block's schema; on error `self` is unchanged.
    /// The variant never changes, so the block type is fixed for life.
    pub fn merge(&mut self, partial: &FieldMap) -> Result<(), FieldDataError> {
        let mut merged = self.to_map();
        for (key, value) in partial {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        match self {
            FieldData::Legacy { data, .. } => *data = merged,
            typed => {
                if let Some(block_type) = typed.block_type() {
                    *typed = Self::from_map(block_type, merged)?;
                }
            }
        }
        Ok(())
    }

    /// Set a single field. Equivalent to merging a one-key object.
    pub fn set_field(&mut self, field: &str, value: Value) -> Result<(), FieldDataError> {
        let mut partial = FieldMap::new();
        partial.insert(field.to_string(), value);
        self.merge(&partial)
    }
}

/// Remove `null` fields so they fall back to their defaults, including inside
/// row objects of nested arrays.
fn drop_nulls(map: &mut FieldMap) {
    map.retain(|_, value| !value.is_null());
    for value in map.values_mut() {
        if let Value::Array(items) = value {
            for item in items.iter_mut() {
                if let Value::Object(row) = item {
                    drop_nulls(row);
                }
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// BlockInstance / BlockRecord
// ============================================================================

/// One positioned block within a content document.
///
/// The block type is derived from `fields` and cannot be changed in place;
/// changing type is a delete followed by an add.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockInstance {
    pub id: BlockId,
    /// Position key within the parent document. Unique per document; gaps allowed.
    pub sort_order: i64,
    pub fields: FieldData,
}

impl BlockInstance {
    pub fn new(id: BlockId, sort_order: i64, fields: FieldData) -> Self {
        Self {
            id,
            sort_order,
            fields,
        }
    }

    pub fn block_type(&self) -> Option<BlockType> {
        self.fields.block_type()
    }

    pub fn type_name(&self) -> &str {
        self.fields.type_name()
    }

    /// Convert to the persistence wire shape.
    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            id: self.id,
            block_type: self.type_name().to_string(),
            sort_order: self.sort_order,
            field_data: self.fields.to_json(),
        }
    }

    /// Rebuild from a persisted record. Undecodable data degrades to legacy.
    pub fn from_record(record: BlockRecord) -> Self {
        let fields = FieldData::from_json_lossy(&record.block_type, record.field_data);
        Self {
            id: record.id,
            sort_order: record.sort_order,
            fields,
        }
    }
}

/// Block as exchanged with the persistence collaborator.
///
/// `{ "id": "...", "blockType": "hero", "sortOrder": 0, "fieldData": {...} }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub id: BlockId,
    pub block_type: String,
    pub sort_order: i64,
    #[serde(default)]
    pub field_data: Value,
}
