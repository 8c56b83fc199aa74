//! folio command-line editor.
//!
//! Drives the block services against a SQLite file, for scripting and manual
//! inspection.
//!
//! Usage:
//!   folio new "Markets Weekly" --issue 12
//!   folio add 0193a4b2 hero
//!   folio set 0193a4b2 7c1e headline '"Rates hold steady"'
//!   folio move 0193a4b2 7c1e down
//!   folio render 0193a4b2
//!
//! Documents and blocks may be named by any unique hex prefix of their ID.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt};

use folio_blocks::{BlockError, Direction, registry};
use folio_kernel::{
    BlockService, FolioConfig, InlineEditor, SqliteBackend, TemplateSource, preview,
};
use folio_types::{BlockId, Newsletter, Template, TemplateId, resolve_block_prefix};

/// Compose newsletters from ordered, typed content blocks.
#[derive(Parser, Debug)]
#[command(name = "folio", version)]
#[command(about = "Compose newsletters from ordered, typed content blocks")]
struct Args {
    /// SQLite database path (overrides the configured storage.database)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/folio/folio.ron)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered block types by category
    Types,

    /// Create a newsletter and print its ID
    New {
        subject: String,
        #[arg(long, default_value_t = 1)]
        issue: u32,
        /// Template ID (or prefix) used for new-block defaults
        #[arg(long)]
        template: Option<String>,
        #[arg(long, default_value = "")]
        locale: String,
    },

    /// List newsletters
    Docs,

    /// Import a template from a JSON file and print its ID
    ImportTemplate { file: PathBuf },

    /// List a newsletter's blocks in order
    List { doc: String },

    /// Append a block of the given type
    Add { doc: String, block_type: String },

    /// Set one field of a block. VALUE is parsed as JSON; if that does not fit
    /// the field, it is taken as a plain string
    Set {
        doc: String,
        block: String,
        field: String,
        value: String,
    },

    /// Delete a block
    Delete { doc: String, block: String },

    /// Reorder blocks. Every block must be named exactly once
    Reorder {
        doc: String,
        #[arg(required = true)]
        blocks: Vec<String>,
    },

    /// Move a block one position (up/down)
    Move {
        doc: String,
        block: String,
        direction: String,
    },

    /// Render the newsletter preview
    Render {
        doc: String,
        /// Emit the node tree as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FolioConfig::load(path)?,
        None => FolioConfig::load_default()?,
    };

    // Logs go to stderr; stdout carries command output.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Command::Types = args.command {
        print_types();
        return Ok(());
    }

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database_path())
        .context("no database path: pass --db or set storage.database")?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tracing::debug!(path = %db_path.display(), "opening database");
    let db = Arc::new(
        SqliteBackend::open(&db_path)
            .with_context(|| format!("opening {}", db_path.display()))?,
    );

    let session = Session { db, config };
    session.run(args.command).await
}

fn print_types() {
    for (category, entries) in registry::by_category() {
        println!("{}:", category.as_str());
        for entry in entries {
            println!(
                "  {:<16} {:<16} {}",
                entry.block_type.as_str(),
                entry.label,
                entry.description
            );
        }
    }
}

/// Parse a field value: JSON if it parses, otherwise the raw string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Stage a field change from command-line text. A value that parses as JSON
/// but does not fit the field (e.g. `2024` for a title) is retried as a string.
fn apply_field(editor: &InlineEditor, id: BlockId, field: &str, raw: &str) -> Result<(), BlockError> {
    let value = parse_value(raw);
    if value.is_string() {
        return editor.on_field_change(id, field, value);
    }
    match editor.on_field_change(id, field, value) {
        Err(e) if e.is_validation() => editor
            .on_field_change(id, field, Value::String(raw.to_string()))
            .map_err(|_| e),
        other => other,
    }
}

struct Session {
    db: Arc<SqliteBackend>,
    config: FolioConfig,
}

impl Session {
    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Types => print_types(),

            Command::New {
                subject,
                issue,
                template,
                locale,
            } => {
                let mut newsletter = Newsletter::new(subject)
                    .with_issue_number(issue)
                    .with_locale(locale);
                if let Some(query) = template {
                    let template_id = self.resolve_template(&query).await?;
                    newsletter = newsletter.with_template(template_id);
                }
                self.db.create_newsletter(&newsletter)?;
                tracing::info!(document = %newsletter.id, "newsletter created");
                println!("{}", newsletter.id);
            }

            Command::Docs => {
                for newsletter in self.db.list_newsletters()? {
                    println!(
                        "{}  #{:<4} {}",
                        newsletter.id.short(),
                        newsletter.issue_number,
                        newsletter.subject
                    );
                }
            }

            Command::ImportTemplate { file } => {
                let source = std::fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?;
                let raw: Value = serde_json::from_str(&source)
                    .with_context(|| format!("{} is not valid JSON", file.display()))?;
                let parsed = Template::from_json(&raw);
                let id = if parsed.id.is_nil() {
                    TemplateId::new()
                } else {
                    parsed.id
                };
                self.db.save_template(id, &raw)?;
                tracing::info!(template = %id, zones = parsed.zones.len(), "template imported");
                println!("{id}");
            }

            Command::List { doc } => {
                let newsletter = self.resolve_doc(&doc)?;
                let mut service = self.service(&newsletter).await?;
                let listed = service.list().await?;
                if listed.stale {
                    eprintln!("warning: showing cached blocks, storage unavailable");
                }
                for block in &listed.blocks {
                    println!(
                        "{}  {:>3}  {:<16} {}",
                        block.id.short(),
                        block.sort_order,
                        block.type_name(),
                        registry::label_for(block.type_name())
                    );
                }
            }

            Command::Add { doc, block_type } => {
                let newsletter = self.resolve_doc(&doc)?;
                let mut service = self.service(&newsletter).await?;
                let block = service.add_named(&block_type).await?;
                println!("{}", block.id);
            }

            Command::Set {
                doc,
                block,
                field,
                value,
            } => {
                let newsletter = self.resolve_doc(&doc)?;
                let service = self.service(&newsletter).await?;
                let id = resolve_block(&service, &block)?;
                let instance = service
                    .view()
                    .get(id)
                    .ok_or_else(|| anyhow!("block {} not found", id.short()))?;

                let editor = InlineEditor::new(service.into_shared(), self.config.quiet_period());
                editor.open(&instance);
                apply_field(&editor, id, &field, &value)?;
                editor.flush(id).await?;
            }

            Command::Delete { doc, block } => {
                let newsletter = self.resolve_doc(&doc)?;
                let mut service = self.service(&newsletter).await?;
                let id = resolve_block(&service, &block)?;
                service.delete(id).await?;
            }

            Command::Reorder { doc, blocks } => {
                let newsletter = self.resolve_doc(&doc)?;
                let mut service = self.service(&newsletter).await?;
                let ordered = blocks
                    .iter()
                    .map(|query| resolve_block(&service, query))
                    .collect::<Result<Vec<_>>>()?;
                service.reorder(&ordered).await?;
            }

            Command::Move {
                doc,
                block,
                direction,
            } => {
                let direction = Direction::from_str(&direction)
                    .ok_or_else(|| anyhow!("direction must be 'up' or 'down', got '{direction}'"))?;
                let newsletter = self.resolve_doc(&doc)?;
                let mut service = self.service(&newsletter).await?;
                let id = resolve_block(&service, &block)?;
                if !service.move_adjacent(id, direction).await? {
                    eprintln!("block {} is already at the edge", id.short());
                }
            }

            Command::Render { doc, json } => {
                let newsletter = self.resolve_doc(&doc)?;
                let service = self.service(&newsletter).await?;
                let rendered = preview::render_document(&newsletter, &service.blocks());
                if json {
                    println!("{}", serde_json::to_string_pretty(&rendered)?);
                } else {
                    print!("{}", rendered.to_text());
                }
            }
        }
        Ok(())
    }

    async fn service(&self, newsletter: &Newsletter) -> Result<BlockService> {
        let service = BlockService::open(
            newsletter.id,
            self.db.clone(),
            self.db.as_ref(),
            newsletter.template_id,
        )
        .await?;
        Ok(service)
    }

    fn resolve_doc(&self, query: &str) -> Result<Newsletter> {
        let matches: Vec<Newsletter> = self
            .db
            .list_newsletters()?
            .into_iter()
            .filter(|n| n.id.to_string() == query || n.id.matches_hex_prefix(query))
            .collect();
        match matches.len() {
            0 => bail!("no newsletter matches '{query}'"),
            1 => Ok(matches.into_iter().next().context("newsletter vanished")?),
            _ => bail!(
                "ambiguous newsletter prefix '{query}': {}",
                matches
                    .iter()
                    .map(|n| n.id.short())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    async fn resolve_template(&self, query: &str) -> Result<TemplateId> {
        let id = TemplateId::parse(query)
            .with_context(|| format!("'{query}' is not a template ID"))?;
        if self.db.template(id).await?.is_none() {
            tracing::warn!(template = %id, "template not imported yet, blocks will use registry defaults");
        }
        Ok(id)
    }
}

fn resolve_block(service: &BlockService, query: &str) -> Result<BlockId> {
    let ids = service.blocks().into_iter().map(|b| b.id);
    Ok(resolve_block_prefix(ids, query)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use folio_kernel::{DEFAULT_QUIET_PERIOD, MemoryBackend};
    use folio_types::{BlockType, DocumentId};

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from(["folio", "--db", "x.db", "move", "0193", "7c1e", "up"]).unwrap();
        assert_eq!(args.db, Some(PathBuf::from("x.db")));
        assert!(matches!(args.command, Command::Move { ref direction, .. } if direction == "up"));

        assert!(Args::try_parse_from(["folio", "reorder", "0193"]).is_err());
    }

    #[tokio::test]
    async fn test_apply_field_falls_back_to_string() {
        let mut service = BlockService::new(DocumentId::new(), Arc::new(MemoryBackend::new()));
        let intro = service.add(BlockType::Introduction).await.unwrap();
        let overview = service.add(BlockType::MarketOverview).await.unwrap();
        let editor = InlineEditor::new(service.into_shared(), DEFAULT_QUIET_PERIOD);
        editor.open(&intro);
        editor.open(&overview);

        apply_field(&editor, intro.id, "title", "2024").unwrap();
        let fields = editor.local_fields(intro.id).unwrap();
        assert_eq!(fields.get("title"), Some(serde_json::json!("2024")));

        apply_field(&editor, overview.id, "indices", r#"[{"name": "SPX", "value": 5000}]"#).unwrap();
        let fields = editor.local_fields(overview.id).unwrap();
        assert_eq!(fields.get("indices").unwrap()[0]["name"], serde_json::json!("SPX"));

        // Neither JSON nor a string fits an array field.
        let err = apply_field(&editor, overview.id, "indices", "42").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), serde_json::json!(42));
        assert_eq!(parse_value("\"quoted\""), serde_json::json!("quoted"));
        assert_eq!(parse_value("plain text"), serde_json::json!("plain text"));
        assert_eq!(parse_value("[1, 2]"), serde_json::json!([1, 2]));
    }
}
