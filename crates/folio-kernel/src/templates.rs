//! Template collaborator.
//!
//! Templates are authored outside folio and only read here. A source hands
//! back parsed [`Template`]s; anything that fails to parse has already been
//! degraded by [`Template::from_json`], so a bad template never blocks adding
//! blocks.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use folio_blocks::{BlockError, Result};
use folio_types::{Template, TemplateId};

use crate::backend::SqliteBackend;

/// Read access to templates by ID.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Fetch a template. `Ok(None)` means no such template.
    async fn template(&self, id: TemplateId) -> Result<Option<Template>>;
}

/// Templates held in memory, keyed by ID.
#[derive(Default)]
pub struct MemoryTemplates {
    templates: RwLock<HashMap<TemplateId, Template>>,
}

impl MemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under its own ID.
    pub fn insert(&self, template: Template) -> TemplateId {
        let id = template.id;
        self.templates.write().insert(id, template);
        id
    }

    /// Parse raw JSON leniently and register it under `id`.
    pub fn insert_json(&self, id: TemplateId, raw: &Value) {
        let mut template = Template::from_json(raw);
        template.id = id;
        self.templates.write().insert(id, template);
    }
}

#[async_trait]
impl TemplateSource for MemoryTemplates {
    async fn template(&self, id: TemplateId) -> Result<Option<Template>> {
        Ok(self.templates.read().get(&id).cloned())
    }
}

#[async_trait]
impl TemplateSource for SqliteBackend {
    async fn template(&self, id: TemplateId) -> Result<Option<Template>> {
        let raw = self
            .load_template(id)
            .map_err(|e| BlockError::transport(e.to_string()))?;
        Ok(raw.map(|raw| {
            let mut template = Template::from_json(&raw);
            template.id = id;
            template
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_templates() {
        let source = MemoryTemplates::new();
        let id = TemplateId::new();
        source.insert_json(id, &json!({"name": "Weekly", "zones": {}}));

        let template = source.template(id).await.unwrap().unwrap();
        assert_eq!(template.id, id);
        assert_eq!(template.name, "Weekly");
        assert!(source.template(TemplateId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_template_malformed_body_degrades() {
        let db = SqliteBackend::in_memory().unwrap();
        let id = TemplateId::new();
        db.save_template(id, &json!(["not", "an", "object"])).unwrap();

        let template = db.template(id).await.unwrap().unwrap();
        assert_eq!(template.id, id);
        assert!(template.zones.is_empty());
    }
}
