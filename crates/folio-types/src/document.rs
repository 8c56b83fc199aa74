//! Parent document metadata.
//!
//! A [`Newsletter`] owns an ordered set of blocks. The core never inspects
//! these fields beyond handing them to the rendering host alongside the
//! sorted blocks.

use serde::{Deserialize, Serialize};

use crate::ids::{DocumentId, TemplateId};

/// Top-level metadata of one newsletter issue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Newsletter {
    pub id: DocumentId,
    pub subject: String,
    /// Issue number shown in the masthead. Starts at 1.
    pub issue_number: u32,
    /// Opaque locale tag (e.g. "en-US"), passed through untouched.
    #[serde(default)]
    pub locale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    pub created_at: u64,
}

impl Newsletter {
    /// Create a newsletter with a fresh ID and issue number 1.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            subject: subject.into(),
            issue_number: 1,
            locale: String::new(),
            template_id: None,
            created_at: crate::now_millis(),
        }
    }

    pub fn with_issue_number(mut self, issue_number: u32) -> Self {
        self.issue_number = issue_number;
        self
    }

    pub fn with_template(mut self, template_id: TemplateId) -> Self {
        self.template_id = Some(template_id);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let template = TemplateId::new();
        let n = Newsletter::new("Markets this week")
            .with_issue_number(42)
            .with_template(template)
            .with_locale("en-GB");
        assert_eq!(n.issue_number, 42);
        assert_eq!(n.template_id, Some(template));
        assert_eq!(n.locale, "en-GB");
        assert!(n.created_at > 0);
    }

    #[test]
    fn test_serde_camel_case() {
        let n = Newsletter::new("Hello");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["issueNumber"], 1);
        assert!(json.get("templateId").is_none());
        let parsed: Newsletter = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, n);
    }
}
