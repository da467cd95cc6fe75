//! Turns loaded issue specs into create requests with resolved links.

use serde::Serialize;
use thiserror::Error;

use crate::config::DEFAULT_LABEL;
use crate::rest::{CreateIssueFields, CreateIssuePayload, KeyRef, NameRef};
use crate::spec::{IssueSpec, LinkResolutionError, SpecId, SpecIndex};

pub const DEFAULT_ISSUE_TYPE: &str = "Story";

/// Knobs applied to every issue of a run.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub label: String,
    pub default_issue_type: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_owned(),
            default_issue_type: DEFAULT_ISSUE_TYPE.to_owned(),
        }
    }
}

impl PlanOptions {
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("issue {spec_id} is missing required field '{field}'")]
    MissingField {
        spec_id: SpecId,
        field: &'static str,
    },
    #[error(transparent)]
    Link(#[from] LinkResolutionError),
}

/// One side of a planned link, identified by its local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEndpoint {
    pub spec_id: SpecId,
    pub summary: String,
}

/// A link to create once both endpoints exist remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedLink {
    pub link_type: String,
    /// The link target.
    pub outward: LinkEndpoint,
    /// The issue that declared the link.
    pub inward: LinkEndpoint,
}

/// A fully built create request for one spec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltIssue {
    pub spec_id: SpecId,
    pub request: CreateIssuePayload,
    pub links: Vec<PlannedLink>,
}

impl BuiltIssue {
    pub fn summary(&self) -> &str {
        &self.request.fields.summary
    }
}

/// Build create requests for every spec, in file order.
///
/// Fails on the first spec with a missing required field or a link that cannot
/// be resolved, before anything is sent to the remote service.
pub fn build_plan(
    specs: &[IssueSpec],
    options: &PlanOptions,
) -> Result<Vec<BuiltIssue>, BuildError> {
    let index = SpecIndex::new(specs);
    specs
        .iter()
        .map(|spec| build_issue(spec, &index, options))
        .collect()
}

/// Build the create request for a single spec, resolving its links against `index`.
pub fn build_issue(
    spec: &IssueSpec,
    index: &SpecIndex<'_>,
    options: &PlanOptions,
) -> Result<BuiltIssue, BuildError> {
    let fields = &spec.fields;
    let summary = required_summary(spec)?;
    let project = fields
        .project
        .as_ref()
        .map(|project| project.key.trim())
        .filter(|key| !key.is_empty())
        .ok_or(BuildError::MissingField {
            spec_id: spec.spec_id,
            field: "project.key",
        })?;

    let issuetype = fields
        .issuetype
        .as_ref()
        .map(|kind| kind.name.trim())
        .filter(|name| !name.is_empty())
        .unwrap_or(options.default_issue_type.as_str());

    let mut labels = vec![options.label.clone()];
    for label in &fields.labels {
        if !labels.contains(label) {
            labels.push(label.clone());
        }
    }

    let inward = LinkEndpoint {
        spec_id: spec.spec_id,
        summary: summary.to_owned(),
    };
    let links = spec
        .links
        .iter()
        .map(|link| {
            let target = index.resolve_link(spec.spec_id, link.links_to)?;
            Ok(PlannedLink {
                link_type: link.link_type.clone(),
                outward: LinkEndpoint {
                    spec_id: target.spec_id,
                    summary: target.fields.summary.clone().unwrap_or_default(),
                },
                inward: inward.clone(),
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    Ok(BuiltIssue {
        spec_id: spec.spec_id,
        request: CreateIssuePayload {
            fields: CreateIssueFields {
                summary: summary.to_owned(),
                description: fields.description.clone(),
                project: KeyRef::new(project),
                issuetype: NameRef::new(issuetype),
                labels,
                assignee: fields.assignee.clone(),
            },
        },
        links,
    })
}

fn required_summary(spec: &IssueSpec) -> Result<&str, BuildError> {
    spec.fields
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|summary| !summary.is_empty())
        .ok_or(BuildError::MissingField {
            spec_id: spec.spec_id,
            field: "summary",
        })
}
