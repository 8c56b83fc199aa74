//! Preview rendering: sorted blocks → a small node tree.
//!
//! The renderer dispatches on the block's typed fields and never touches
//! storage. It is total: every registered type renders, including blocks with
//! empty fields, and unknown (legacy) types render as a generic
//! `Block: <label>` paragraph. Final markup is the rendering host's job.

use std::fmt::Write as _;

use serde::Serialize;

use folio_blocks::registry;
use folio_types::{BlockId, BlockInstance, FieldData, Newsletter};

/// One element of a rendered block.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    Image { src: String, alt: String },
    Link { label: String, href: String },
    Table { headers: Vec<String>, rows: Vec<Vec<String>> },
    List { items: Vec<String> },
    /// A labelled figure with its change, e.g. an index level.
    Metric { label: String, value: String, change: String },
    Rule { style: String },
}

/// Rendered output of one block.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub block_id: BlockId,
    pub block_type: String,
    /// Registry label, or the raw type name for unknown types.
    pub label: String,
    pub nodes: Vec<Node>,
}

/// Document-level heading handed to the rendering host.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Masthead {
    pub subject: String,
    pub issue_number: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masthead: Option<Masthead>,
    pub fragments: Vec<Fragment>,
}

/// Render blocks in the order given. Callers pass the sorted list.
pub fn render(blocks: &[BlockInstance]) -> Preview {
    Preview {
        masthead: None,
        fragments: blocks.iter().map(render_block).collect(),
    }
}

/// Render blocks under the newsletter's masthead.
pub fn render_document(newsletter: &Newsletter, blocks: &[BlockInstance]) -> Preview {
    Preview {
        masthead: Some(Masthead {
            subject: newsletter.subject.clone(),
            issue_number: newsletter.issue_number,
        }),
        ..render(blocks)
    }
}

/// Render a single block.
pub fn render_block(block: &BlockInstance) -> Fragment {
    let mut nodes = Nodes::default();

    match &block.fields {
        FieldData::Hero(f) => {
            nodes.heading(1, &f.headline);
            nodes.paragraph(&f.subheadline);
            nodes.image(&f.image_url, &f.headline);
            nodes.link(&f.cta_label, &f.cta_url);
        }
        FieldData::Introduction(f) => {
            nodes.heading(2, &f.title);
            nodes.heading(3, &f.subtitle);
            for paragraph in f.body.split("\n\n") {
                nodes.paragraph(paragraph.trim());
            }
        }
        FieldData::MarketOverview(f) => {
            nodes.heading(2, &f.title);
            if !f.as_of.is_empty() {
                nodes.paragraph(&format!("As of {}", f.as_of));
            }
            for index in &f.indices {
                nodes.push(Node::Metric {
                    label: index.name.clone(),
                    value: format!("{:.2}", index.value),
                    change: percent(index.change_percent),
                });
            }
            nodes.paragraph(&f.summary);
        }
        FieldData::StockSpotlight(f) => {
            nodes.heading(2, &f.title);
            if !f.stocks.is_empty() {
                nodes.push(Node::Table {
                    headers: ["Symbol", "Company", "Price", "Change"]
                        .map(String::from)
                        .to_vec(),
                    rows: f
                        .stocks
                        .iter()
                        .map(|s| {
                            vec![
                                s.symbol.clone(),
                                s.company.clone(),
                                format!("{:.2}", s.price),
                                percent(s.change_percent),
                            ]
                        })
                        .collect(),
                });
            }
            nodes.list(
                f.stocks
                    .iter()
                    .filter(|s| !s.commentary.is_empty())
                    .map(|s| format!("{}: {}", s.symbol, s.commentary)),
            );
        }
        FieldData::ArticleList(f) => {
            nodes.heading(2, &f.title);
            for article in &f.articles {
                if article.url.is_empty() {
                    nodes.heading(3, &article.title);
                } else {
                    nodes.link(&article.title, &article.url);
                }
                nodes.image(&article.image_url, &article.title);
                nodes.paragraph(&article.summary);
            }
        }
        FieldData::NewsRoundup(f) => {
            nodes.heading(2, &f.title);
            nodes.list(f.news_items.iter().map(|item| {
                if item.source.is_empty() {
                    item.headline.clone()
                } else {
                    format!("{} ({})", item.headline, item.source)
                }
            }));
        }
        FieldData::CallToAction(f) => {
            nodes.heading(2, &f.heading);
            nodes.paragraph(&f.body);
            nodes.link(&f.button_label, &f.button_url);
        }
        FieldData::Divider(f) => {
            let style = if f.style.is_empty() { "line" } else { &f.style };
            nodes.push(Node::Rule {
                style: style.to_string(),
            });
        }
        FieldData::Footer(f) => {
            nodes.paragraph(&f.company_name);
            nodes.paragraph(&f.address);
            nodes.list(
                f.social_links
                    .iter()
                    .filter(|l| !l.url.is_empty())
                    .map(|l| format!("{}: {}", l.platform, l.url)),
            );
            nodes.link("Unsubscribe", &f.unsubscribe_url);
            nodes.paragraph(&f.disclaimer);
        }
        FieldData::Legacy { block_type, .. } => {
            nodes.push(Node::Paragraph {
                text: format!("Block: {}", registry::label_for(block_type)),
            });
        }
    }

    Fragment {
        block_id: block.id,
        block_type: block.type_name().to_string(),
        label: registry::label_for(block.type_name()),
        nodes: nodes.0,
    }
}

fn percent(value: f64) -> String {
    format!("{value:+.2}%")
}

/// Node list builder that skips empty text.
#[derive(Default)]
struct Nodes(Vec<Node>);

impl Nodes {
    fn push(&mut self, node: Node) {
        self.0.push(node);
    }

    fn heading(&mut self, level: u8, text: &str) {
        if !text.is_empty() {
            self.push(Node::Heading {
                level,
                text: text.to_string(),
            });
        }
    }

    fn paragraph(&mut self, text: &str) {
        if !text.is_empty() {
            self.push(Node::Paragraph {
                text: text.to_string(),
            });
        }
    }

    fn image(&mut self, src: &str, alt: &str) {
        if !src.is_empty() {
            self.push(Node::Image {
                src: src.to_string(),
                alt: alt.to_string(),
            });
        }
    }

    /// A link needs a target; a label alone renders as plain text.
    fn link(&mut self, label: &str, href: &str) {
        if href.is_empty() {
            self.paragraph(label);
        } else {
            self.push(Node::Link {
                label: if label.is_empty() { href } else { label }.to_string(),
                href: href.to_string(),
            });
        }
    }

    fn list(&mut self, items: impl Iterator<Item = String>) {
        let items: Vec<String> = items.collect();
        if !items.is_empty() {
            self.push(Node::List { items });
        }
    }
}

impl Preview {
    /// Plain-text outline, one fragment per paragraph.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if let Some(masthead) = &self.masthead {
            let _ = writeln!(out, "{} (Issue #{})", masthead.subject, masthead.issue_number);
            out.push('\n');
        }
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "[{}]", fragment.label);
            for node in &fragment.nodes {
                write_node(&mut out, node);
            }
        }
        out
    }
}

fn write_node(out: &mut String, node: &Node) {
    let _ = match node {
        Node::Heading { level, text } => {
            writeln!(out, "{} {}", "#".repeat(usize::from(*level)), text)
        }
        Node::Paragraph { text } => writeln!(out, "{text}"),
        Node::Image { src, alt } => writeln!(out, "[image: {alt}] {src}"),
        Node::Link { label, href } => writeln!(out, "{label} <{href}>"),
        Node::Table { headers, rows } => {
            let _ = writeln!(out, "{}", headers.join(" | "));
            rows.iter()
                .try_for_each(|row| writeln!(out, "{}", row.join(" | ")))
        }
        Node::List { items } => items
            .iter()
            .try_for_each(|item| writeln!(out, "- {item}")),
        Node::Metric {
            label,
            value,
            change,
        } => writeln!(out, "{label}: {value} ({change})"),
        Node::Rule { .. } => writeln!(out, "---"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_blocks::registry::default_field_data;
    use folio_types::{BlockType, FieldMap, HeroFields, StockPick, StockSpotlightFields};
    use serde_json::json;

    fn block(fields: FieldData) -> BlockInstance {
        BlockInstance::new(BlockId::new(), 0, fields)
    }

    #[test]
    fn test_every_type_renders_from_empty_fields() {
        for block_type in BlockType::ALL {
            let empty = FieldData::from_map(block_type, FieldMap::new()).unwrap();
            let fragment = render_block(&block(empty));
            assert_eq!(fragment.block_type, block_type.as_str());
            assert_eq!(fragment.label, registry::entry(block_type).label);

            render_block(&block(default_field_data(block_type)));
        }
    }

    #[test]
    fn test_legacy_renders_generic_fragment() {
        let legacy = FieldData::from_json("poll", json!({"question": 5})).unwrap();
        let fragment = render_block(&block(legacy));
        assert_eq!(
            fragment.nodes,
            vec![Node::Paragraph {
                text: "Block: poll".into()
            }]
        );
    }

    #[test]
    fn test_market_overview_placeholders() {
        let fragment = render_block(&block(default_field_data(BlockType::MarketOverview)));
        assert_eq!(
            fragment.nodes[0],
            Node::Heading {
                level: 2,
                text: "Market Overview".into()
            }
        );
        assert_eq!(
            fragment.nodes[1],
            Node::Metric {
                label: "S&P 500".into(),
                value: "0.00".into(),
                change: "+0.00%".into()
            }
        );
    }

    #[test]
    fn test_hero_link_needs_url() {
        let hero = HeroFields {
            headline: "Q3".into(),
            cta_label: "Read more".into(),
            ..Default::default()
        };
        let fragment = render_block(&block(FieldData::Hero(hero.clone())));
        assert_eq!(
            fragment.nodes.last(),
            Some(&Node::Paragraph {
                text: "Read more".into()
            })
        );

        let hero = HeroFields {
            cta_url: "https://example.com".into(),
            ..hero
        };
        let fragment = render_block(&block(FieldData::Hero(hero)));
        assert!(matches!(fragment.nodes.last(), Some(Node::Link { .. })));
    }

    #[test]
    fn test_stock_table() {
        let fields = StockSpotlightFields {
            title: "Picks".into(),
            stocks: vec![StockPick {
                symbol: "ACME".into(),
                company: "Acme Corp".into(),
                price: 12.5,
                change_percent: -1.25,
                ..Default::default()
            }],
            ..Default::default()
        };
        let fragment = render_block(&block(FieldData::StockSpotlight(fields)));
        let Node::Table { rows, .. } = &fragment.nodes[1] else {
            panic!("expected table");
        };
        assert_eq!(rows[0], vec!["ACME", "Acme Corp", "12.50", "-1.25%"]);
        assert_eq!(fragment.nodes.len(), 2);
    }

    #[test]
    fn test_render_is_deterministic() {
        let blocks: Vec<_> = BlockType::ALL
            .into_iter()
            .enumerate()
            .map(|(i, t)| BlockInstance::new(BlockId::new(), i as i64, default_field_data(t)))
            .collect();
        let before = blocks.clone();
        assert_eq!(render(&blocks), render(&blocks));
        assert_eq!(blocks, before);
    }

    #[test]
    fn test_document_text_outline() {
        let newsletter = Newsletter::new("Weekly Markets").with_issue_number(7);
        let blocks = vec![
            block(default_field_data(BlockType::StockSpotlight)),
            block(default_field_data(BlockType::Divider)),
        ];
        let text = render_document(&newsletter, &blocks).to_text();
        assert_eq!(
            text,
            "Weekly Markets (Issue #7)\n\n[Stock Spotlight]\n## Stock Spotlight\n\n[Divider]\n---\n"
        );
    }
}
