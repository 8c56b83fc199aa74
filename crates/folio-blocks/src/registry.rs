//! Block type registry.
//!
//! Static catalog of every [`BlockType`]: picker metadata (label, category,
//! description) and the default field data for a freshly added block. Both
//! lookups are exhaustive matches, so a new block type does not compile until
//! it has an entry here and a case in the preview renderer.

use folio_types::{
    ArticleListFields, BlockType, CallToActionFields, DividerFields, FieldData, FieldMap,
    FooterFields, HeroFields, IntroductionFields, MarketIndex, MarketOverviewFields,
    NewsRoundupFields, StockSpotlightFields,
};

/// Placeholder for index levels and percentages the author has not filled in.
pub const PLACEHOLDER_INDEX_VALUE: f64 = 0.0;

/// Index rows a new market overview starts with.
const DEFAULT_INDICES: [&str; 3] = ["S&P 500", "Dow Jones", "Nasdaq"];

const DEFAULT_DISCLAIMER: &str =
    "This newsletter is for informational purposes only and is not investment advice.";

/// Picker menu grouping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Header,
    Content,
    Markets,
    Engagement,
    Layout,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Header,
        Category::Content,
        Category::Markets,
        Category::Engagement,
        Category::Layout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Header => "header",
            Category::Content => "content",
            Category::Markets => "markets",
            Category::Engagement => "engagement",
            Category::Layout => "layout",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Display metadata for the "Add Block" picker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryEntry {
    pub block_type: BlockType,
    pub label: &'static str,
    pub category: Category,
    pub description: &'static str,
}

/// Picker metadata for one block type.
pub fn entry(block_type: BlockType) -> RegistryEntry {
    let (label, category, description) = match block_type {
        BlockType::Hero => (
            "Hero",
            Category::Header,
            "Banner image with headline and call-to-action",
        ),
        BlockType::Introduction => (
            "Introduction",
            Category::Header,
            "Opening title, subtitle, and body copy",
        ),
        BlockType::MarketOverview => (
            "Market Overview",
            Category::Markets,
            "Major indices with daily change",
        ),
        BlockType::StockSpotlight => (
            "Stock Spotlight",
            Category::Markets,
            "Selected stocks with price and commentary",
        ),
        BlockType::ArticleList => (
            "Articles",
            Category::Content,
            "Links to featured articles",
        ),
        BlockType::NewsRoundup => (
            "News Roundup",
            Category::Content,
            "Short news items with sources",
        ),
        BlockType::CallToAction => (
            "Call to Action",
            Category::Engagement,
            "Heading, copy, and a single button",
        ),
        BlockType::Divider => ("Divider", Category::Layout, "Visual separator"),
        BlockType::Footer => (
            "Footer",
            Category::Layout,
            "Address, disclaimer, and unsubscribe link",
        ),
    };
    RegistryEntry {
        block_type,
        label,
        category,
        description,
    }
}

/// All entries in picker order.
pub fn entries() -> impl Iterator<Item = RegistryEntry> {
    BlockType::ALL.into_iter().map(entry)
}

/// Entries grouped by category, skipping empty categories.
pub fn by_category() -> Vec<(Category, Vec<RegistryEntry>)> {
    Category::ALL
        .into_iter()
        .map(|category| {
            let members: Vec<_> = entries().filter(|e| e.category == category).collect();
            (category, members)
        })
        .filter(|(_, members)| !members.is_empty())
        .collect()
}

/// Label for a persisted type name, including legacy names.
pub fn label_for(type_name: &str) -> String {
    match BlockType::from_str(type_name) {
        Some(block_type) => entry(block_type).label.to_string(),
        None => type_name.to_string(),
    }
}

/// Field data for a newly created block of `block_type`.
pub fn default_field_data(block_type: BlockType) -> FieldData {
    match block_type {
        BlockType::Hero => FieldData::Hero(HeroFields {
            cta_label: "Read more".to_string(),
            ..Default::default()
        }),
        BlockType::Introduction => FieldData::Introduction(IntroductionFields::default()),
        BlockType::MarketOverview => FieldData::MarketOverview(MarketOverviewFields {
            title: "Market Overview".to_string(),
            indices: DEFAULT_INDICES
                .iter()
                .map(|name| MarketIndex {
                    name: name.to_string(),
                    value: PLACEHOLDER_INDEX_VALUE,
                    change_percent: PLACEHOLDER_INDEX_VALUE,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        BlockType::StockSpotlight => FieldData::StockSpotlight(StockSpotlightFields {
            title: "Stock Spotlight".to_string(),
            ..Default::default()
        }),
        BlockType::ArticleList => FieldData::ArticleList(ArticleListFields {
            title: "Featured Articles".to_string(),
            ..Default::default()
        }),
        BlockType::NewsRoundup => FieldData::NewsRoundup(NewsRoundupFields {
            title: "In the News".to_string(),
            ..Default::default()
        }),
        BlockType::CallToAction => FieldData::CallToAction(CallToActionFields {
            button_label: "Learn more".to_string(),
            ..Default::default()
        }),
        BlockType::Divider => FieldData::Divider(DividerFields {
            style: "line".to_string(),
            ..Default::default()
        }),
        BlockType::Footer => FieldData::Footer(FooterFields {
            disclaimer: DEFAULT_DISCLAIMER.to_string(),
            ..Default::default()
        }),
    }
}

/// Default field data for a type name. Unknown names get an empty legacy record.
pub fn default_field_data_named(type_name: &str) -> FieldData {
    match BlockType::from_str(type_name) {
        Some(block_type) => default_field_data(block_type),
        None => FieldData::Legacy {
            block_type: type_name.to_string(),
            data: FieldMap::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_introduction_defaults_are_empty_strings() {
        let fields = default_field_data(BlockType::Introduction);
        assert_eq!(
            fields.to_json(),
            json!({"title": "", "subtitle": "", "body": ""})
        );
    }

    #[test]
    fn test_every_type_has_matching_defaults() {
        for block_type in BlockType::ALL {
            let fields = default_field_data(block_type);
            assert_eq!(fields.block_type(), Some(block_type));
            assert!(fields.to_json().is_object());
        }
    }

    #[test]
    fn test_market_overview_placeholder_values() {
        let FieldData::MarketOverview(overview) = default_field_data(BlockType::MarketOverview)
        else {
            panic!("wrong variant");
        };
        assert_eq!(overview.indices.len(), 3);
        assert!(overview.indices.iter().all(|i| i.value == PLACEHOLDER_INDEX_VALUE));
    }

    #[test]
    fn test_unknown_name_falls_back_to_legacy() {
        let fields = default_field_data_named("countdown_timer");
        assert!(fields.is_legacy());
        assert_eq!(fields.type_name(), "countdown_timer");
        assert_eq!(fields.to_json(), json!({}));
    }

    #[test]
    fn test_named_lookup_accepts_aliases() {
        assert_eq!(
            default_field_data_named("intro").block_type(),
            Some(BlockType::Introduction)
        );
    }

    #[test]
    fn test_entries_cover_all_types_once() {
        let listed: Vec<BlockType> = entries().map(|e| e.block_type).collect();
        assert_eq!(listed, BlockType::ALL.to_vec());
        let grouped: usize = by_category().iter().map(|(_, m)| m.len()).sum();
        assert_eq!(grouped, BlockType::ALL.len());
    }

    #[test]
    fn test_label_for_legacy_is_raw_name() {
        assert_eq!(label_for("market_overview"), "Market Overview");
        assert_eq!(label_for("poll"), "poll");
    }
}
