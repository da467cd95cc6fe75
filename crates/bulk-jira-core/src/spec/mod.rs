//! In-file description of the issues to create and the loader that reads it.

mod resolve;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use resolve::{LinkResolutionError, SpecIndex};

/// Caller-chosen identifier scoped to one input file.
pub type SpecId = i64;

/// One issue to be created, keyed by its local identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueSpec {
    pub spec_id: SpecId,
    #[serde(default)]
    pub fields: IssueFields,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueFields {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub project: Option<ProjectRef>,
    #[serde(alias = "type")]
    pub issuetype: Option<IssueTypeRef>,
    pub assignee: Option<UserRef>,
    /// Extra labels on top of the configured run label.
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectRef {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueTypeRef {
    pub name: String,
}

/// Cloud instances identify users by `accountId`, server instances by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UserRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Directed relationship from the containing spec to another spec in the same file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Link {
    #[serde(rename = "linksTo")]
    pub links_to: SpecId,
    #[serde(rename = "type")]
    pub link_type: String,
}

/// Errors raised while reading an issue file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read issue file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid issue file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("spec_id {0} is used by more than one issue")]
    DuplicateSpecId(SpecId),
}

/// Read `path` and return its issue specs in file order.
pub fn load_specs(path: &Path) -> Result<Vec<IssueSpec>, ParseError> {
    let content = fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let specs = parse_specs(&content)?;
    debug!("loaded {} issue specs from {}", specs.len(), path.display());
    Ok(specs)
}

/// Parse a YAML sequence of issue specs, rejecting unknown keys and duplicate ids.
pub fn parse_specs(content: &str) -> Result<Vec<IssueSpec>, ParseError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let specs: Vec<IssueSpec> = serde_yaml::from_str(content)?;

    let mut seen = HashSet::with_capacity(specs.len());
    for spec in &specs {
        if !seen.insert(spec.spec_id) {
            return Err(ParseError::DuplicateSpecId(spec.spec_id));
        }
    }
    Ok(specs)
}
