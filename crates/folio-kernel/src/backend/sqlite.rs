//! SQLite persistence for newsletters, blocks, and templates.
//!
//! One row per block. `field_data` holds the block's JSON object as text and
//! is decoded leniently on read: a row whose data no longer fits its type is
//! surfaced as a legacy block instead of failing the whole list.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde_json::Value;

use folio_blocks::{order, BlockError, Result};
use folio_types::{
    BlockId, BlockInstance, BlockRecord, DocumentId, FieldData, FieldMap, Newsletter, TemplateId,
};

use super::BlockBackend;

const SCHEMA: &str = r#"
-- Parent documents
CREATE TABLE IF NOT EXISTS newsletters (
    id TEXT PRIMARY KEY,
    subject TEXT NOT NULL,
    issue_number INTEGER NOT NULL DEFAULT 1,
    locale TEXT NOT NULL DEFAULT '',
    template_id TEXT,
    created_at INTEGER NOT NULL
);

-- Block instances, ordered per document
CREATE TABLE IF NOT EXISTS blocks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    block_type TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    field_data TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER DEFAULT (unixepoch()),
    updated_at INTEGER DEFAULT (unixepoch()),
    UNIQUE (document_id, sort_order)
);
CREATE INDEX IF NOT EXISTS idx_blocks_document ON blocks(document_id, sort_order);

-- Templates, stored as the raw JSON they were imported from
CREATE TABLE IF NOT EXISTS templates (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    created_at INTEGER DEFAULT (unixepoch())
);
"#;

fn transport(e: rusqlite::Error) -> BlockError {
    BlockError::transport(e.to_string())
}

/// SQLite-backed block persistence.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // =========================================================================
    // Newsletters
    // =========================================================================

    /// Create a newsletter row.
    pub fn create_newsletter(&self, newsletter: &Newsletter) -> SqliteResult<()> {
        self.conn.lock().execute(
            "INSERT INTO newsletters (id, subject, issue_number, locale, template_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                newsletter.id.to_string(),
                newsletter.subject,
                newsletter.issue_number,
                newsletter.locale,
                newsletter.template_id.map(|t| t.to_string()),
                newsletter.created_at as i64,
            ],
        )?;
        Ok(())
    }

    /// Get a newsletter by ID.
    pub fn get_newsletter(&self, id: DocumentId) -> SqliteResult<Option<Newsletter>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, subject, issue_number, locale, template_id, created_at
             FROM newsletters WHERE id = ?1",
        )?;
        let newsletter = stmt
            .query_row(params![id.to_string()], row_to_newsletter)
            .optional()?;
        Ok(newsletter)
    }

    /// List all newsletters, oldest first.
    pub fn list_newsletters(&self) -> SqliteResult<Vec<Newsletter>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, subject, issue_number, locale, template_id, created_at
             FROM newsletters ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], row_to_newsletter)?;
        rows.collect()
    }

    /// Delete a newsletter and all of its blocks.
    pub fn delete_newsletter(&self, id: DocumentId) -> SqliteResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM blocks WHERE document_id = ?1", params![id.to_string()])?;
        let removed = tx.execute("DELETE FROM newsletters WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// Store a template's raw JSON under `id`, replacing any previous body.
    pub fn save_template(&self, id: TemplateId, body: &Value) -> SqliteResult<()> {
        self.conn.lock().execute(
            "INSERT INTO templates (id, body) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET body = excluded.body",
            params![id.to_string(), body.to_string()],
        )?;
        Ok(())
    }

    /// Raw JSON of a stored template. Unparseable bodies load as `Null`.
    pub fn load_template(&self, id: TemplateId) -> SqliteResult<Option<Value>> {
        let body: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT body FROM templates WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b).unwrap_or(Value::Null)))
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    fn load_blocks(conn: &Connection, document: DocumentId) -> SqliteResult<Vec<BlockInstance>> {
        let mut stmt = conn.prepare(
            "SELECT id, block_type, sort_order, field_data
             FROM blocks WHERE document_id = ?1 ORDER BY sort_order, id",
        )?;
        let rows = stmt.query_map(params![document.to_string()], |row| {
            let id: String = row.get(0)?;
            let field_data: String = row.get(3)?;
            Ok((id, row.get::<_, String>(1)?, row.get::<_, i64>(2)?, field_data))
        })?;

        let mut blocks = Vec::new();
        for row in rows {
            let (id, block_type, sort_order, field_data) = row?;
            let Ok(id) = BlockId::parse(&id) else {
                tracing::warn!(%id, "skipping block row with malformed id");
                continue;
            };
            blocks.push(BlockInstance::from_record(BlockRecord {
                id,
                block_type,
                sort_order,
                field_data: decode_field_data(id, field_data),
            }));
        }
        order::sort_blocks(&mut blocks);
        Ok(blocks)
    }

    fn load_block(
        conn: &Connection,
        document: DocumentId,
        id: BlockId,
    ) -> SqliteResult<Option<BlockInstance>> {
        conn.query_row(
            "SELECT block_type, sort_order, field_data
             FROM blocks WHERE id = ?1 AND document_id = ?2",
            params![id.to_string(), document.to_string()],
            |row| {
                let field_data: String = row.get(2)?;
                Ok(BlockInstance::from_record(BlockRecord {
                    id,
                    block_type: row.get(0)?,
                    sort_order: row.get(1)?,
                    field_data: decode_field_data(id, field_data),
                }))
            },
        )
        .optional()
    }
}

/// Parse a stored `field_data` column. Text that is not JSON is kept as a
/// string so the block loads as legacy with its raw contents intact.
fn decode_field_data(id: BlockId, text: String) -> Value {
    serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::warn!(block = ?id, error = %e, "field_data is not valid JSON");
        Value::String(text)
    })
}

fn row_to_newsletter(row: &rusqlite::Row<'_>) -> SqliteResult<Newsletter> {
    let id: String = row.get(0)?;
    let template_id: Option<String> = row.get(4)?;
    let created_at: i64 = row.get(5)?;
    Ok(Newsletter {
        id: DocumentId::parse(&id).unwrap_or_else(|_| DocumentId::nil()),
        subject: row.get(1)?,
        issue_number: row.get(2)?,
        locale: row.get(3)?,
        template_id: template_id.and_then(|t| TemplateId::parse(&t).ok()),
        created_at: created_at.max(0) as u64,
    })
}

#[async_trait]
impl BlockBackend for SqliteBackend {
    async fn list(&self, document: DocumentId) -> Result<Vec<BlockInstance>> {
        let conn = self.conn.lock();
        Self::load_blocks(&conn, document).map_err(transport)
    }

    #[tracing::instrument(skip(self, fields), fields(block_type = fields.type_name()))]
    async fn add(&self, document: DocumentId, fields: FieldData) -> Result<BlockInstance> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(transport)?;

        let next: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM blocks WHERE document_id = ?1",
                params![document.to_string()],
                |row| row.get(0),
            )
            .map_err(transport)?;

        let block = BlockInstance::new(BlockId::new(), next, fields);
        tx.execute(
            "INSERT INTO blocks (id, document_id, block_type, sort_order, field_data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                block.id.to_string(),
                document.to_string(),
                block.type_name(),
                block.sort_order,
                block.fields.to_json().to_string(),
            ],
        )
        .map_err(transport)?;
        tx.commit().map_err(transport)?;

        tracing::debug!(block = ?block.id, sort_order = block.sort_order, "block added");
        Ok(block)
    }

    async fn update(&self, document: DocumentId, id: BlockId, fields: &FieldMap) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(transport)?;

        let mut block = Self::load_block(&tx, document, id)
            .map_err(transport)?
            .ok_or(BlockError::BlockNotFound(id))?;
        block.fields.merge(fields)?;

        tx.execute(
            "UPDATE blocks SET field_data = ?1, updated_at = unixepoch() WHERE id = ?2",
            params![block.fields.to_json().to_string(), id.to_string()],
        )
        .map_err(transport)?;
        tx.commit().map_err(transport)
    }

    async fn delete(&self, document: DocumentId, id: BlockId) -> Result<()> {
        let removed = self
            .conn
            .lock()
            .execute(
                "DELETE FROM blocks WHERE id = ?1 AND document_id = ?2",
                params![id.to_string(), document.to_string()],
            )
            .map_err(transport)?;
        if removed == 0 {
            return Err(BlockError::BlockNotFound(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, ordered_ids), fields(count = ordered_ids.len()))]
    async fn reorder(&self, document: DocumentId, ordered_ids: &[BlockId]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(transport)?;

        let current: Vec<BlockId> = Self::load_blocks(&tx, document)
            .map_err(transport)?
            .into_iter()
            .map(|b| b.id)
            .collect();
        order::validate_reorder(&current, ordered_ids)?;

        // Move everything to negative slots first so the unique
        // (document_id, sort_order) index never sees a collision.
        {
            let mut stmt = tx
                .prepare("UPDATE blocks SET sort_order = ?1 WHERE id = ?2")
                .map_err(transport)?;
            for (index, id) in ordered_ids.iter().enumerate() {
                stmt.execute(params![-(index as i64) - 1, id.to_string()])
                    .map_err(transport)?;
            }
            for (index, id) in ordered_ids.iter().enumerate() {
                stmt.execute(params![index as i64, id.to_string()])
                    .map_err(transport)?;
            }
        }
        tx.commit().map_err(transport)
    }
}
