use serde::{Deserialize, Serialize};

use crate::spec::UserRef;

/// Body of `POST /rest/api/2/issue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIssuePayload {
    pub fields: CreateIssueFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIssueFields {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub project: KeyRef,
    pub issuetype: NameRef,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<UserRef>,
}

/// Reference to an entity by key (`{"key": "OPS"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRef {
    pub key: String,
}

impl KeyRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Reference to an entity by name (`{"name": "Story"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
}

impl NameRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Response of a successful issue creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
    #[serde(rename = "self", default)]
    pub self_url: Option<String>,
}

/// Body of `POST /rest/api/2/issueLink`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLinkPayload {
    #[serde(rename = "type")]
    pub link_type: NameRef,
    pub inward_issue: KeyRef,
    pub outward_issue: KeyRef,
}

/// Subset of `GET /rest/api/2/myself`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

impl User {
    /// Best human-readable identity for log lines.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email_address.as_deref())
            .or(self.name.as_deref())
            .or(self.account_id.as_deref())
            .unwrap_or("<unknown user>")
    }
}

/// Subset of `GET /rest/api/2/project/{key}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}
