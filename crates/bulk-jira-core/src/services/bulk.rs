use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::plan::{BuiltIssue, PlannedLink};
use crate::rest::{
    render_json, CreatedIssue, IssueLinkPayload, JiraClient, KeyRef, NameRef, RestError, User,
};
use crate::spec::SpecId;

/// Where a built issue ended up during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IssueState {
    /// Request built, not sent yet.
    Built,
    Submitted { key: String, id: String },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueOutcome {
    pub spec_id: SpecId,
    pub summary: String,
    #[serde(flatten)]
    pub state: IssueState,
}

/// Per-issue result of a run, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmitReport {
    pub issues: Vec<IssueOutcome>,
    pub links_created: usize,
}

impl SubmitReport {
    fn from_plan(plan: &[BuiltIssue]) -> Self {
        Self {
            issues: plan
                .iter()
                .map(|issue| IssueOutcome {
                    spec_id: issue.spec_id,
                    summary: issue.summary().to_owned(),
                    state: IssueState::Built,
                })
                .collect(),
            links_created: 0,
        }
    }

    /// Remote keys of the issues created so far.
    pub fn created_keys(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter_map(|outcome| match &outcome.state {
                IssueState::Submitted { key, .. } => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }

    fn set_state(&mut self, position: usize, state: IssueState) {
        if let Some(outcome) = self.issues.get_mut(position) {
            outcome.state = state;
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("failed to fetch the authenticated user: {0}")]
    Identity(#[source] RestError),
    #[error("project '{key}' is not accessible: {source}")]
    Project {
        key: String,
        #[source]
        source: RestError,
    },
    #[error("failed to create issue {spec_id}: {source}")]
    Create {
        spec_id: SpecId,
        report: SubmitReport,
        #[source]
        source: RestError,
    },
    #[error("failed to link issue {inward} to issue {outward}: {source}")]
    Link {
        inward: SpecId,
        outward: SpecId,
        report: SubmitReport,
        #[source]
        source: RestError,
    },
}

impl SubmitError {
    /// Progress made before the failure, when issues were already being created.
    pub fn report(&self) -> Option<&SubmitReport> {
        match self {
            SubmitError::Create { report, .. } | SubmitError::Link { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Creates a built plan against the remote service, one issue at a time.
#[derive(Clone)]
pub struct BulkSubmitter {
    client: JiraClient,
}

impl BulkSubmitter {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    /// Check the credentials and every project the plan targets before creating anything.
    pub async fn preflight(&self, plan: &[BuiltIssue]) -> Result<User, SubmitError> {
        let user = self.client.myself().await.map_err(SubmitError::Identity)?;
        info!("authenticated as {}", user.label());

        let keys: BTreeSet<&str> = plan
            .iter()
            .map(|issue| issue.request.fields.project.key.as_str())
            .collect();
        for key in keys {
            let project = self
                .client
                .project(key)
                .await
                .map_err(|source| SubmitError::Project {
                    key: key.to_owned(),
                    source,
                })?;
            debug!(
                "project {} ({}) is accessible",
                project.key,
                project.name.as_deref().unwrap_or("unnamed")
            );
        }
        Ok(user)
    }

    /// Create every issue of `plan` in order, stopping at the first failure.
    ///
    /// Links are created as soon as both of their endpoints exist. Nothing is
    /// rolled back on failure; the error carries the report of what was created.
    pub async fn submit(&self, plan: &[BuiltIssue]) -> Result<SubmitReport, SubmitError> {
        let mut report = SubmitReport::from_plan(plan);
        if plan.is_empty() {
            warn!("no issues to create");
            return Ok(report);
        }

        let mut keys: HashMap<SpecId, String> = HashMap::with_capacity(plan.len());
        let mut pending: Vec<&PlannedLink> = Vec::new();

        for (position, issue) in plan.iter().enumerate() {
            debug!("creating issue {}: {}", issue.spec_id, issue.summary());
            let created = match self.client.create_issue(&issue.request).await {
                Ok(created) => created,
                Err(source) => {
                    error!(
                        "issue {} was rejected; request was {}",
                        issue.spec_id,
                        render_json(&issue.request)
                    );
                    report.set_state(position, IssueState::Failed);
                    return Err(SubmitError::Create {
                        spec_id: issue.spec_id,
                        report,
                        source,
                    });
                }
            };

            info!("created {} for issue {}", created.key, issue.spec_id);
            let CreatedIssue { id, key, .. } = created;
            keys.insert(issue.spec_id, key.clone());
            report.set_state(position, IssueState::Submitted { key, id });

            pending.extend(issue.links.iter());
            let (ready, waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|link| {
                keys.contains_key(&link.inward.spec_id) && keys.contains_key(&link.outward.spec_id)
            });
            pending = waiting;

            for link in ready {
                let payload = link_payload(link, &keys);
                if let Err(source) = self.client.create_issue_link(&payload).await {
                    return Err(SubmitError::Link {
                        inward: link.inward.spec_id,
                        outward: link.outward.spec_id,
                        report,
                        source,
                    });
                }
                debug!(
                    "linked {} {} {}",
                    payload.inward_issue.key, link.link_type, payload.outward_issue.key
                );
                report.links_created += 1;
            }
        }

        Ok(report)
    }
}

fn link_payload(link: &PlannedLink, keys: &HashMap<SpecId, String>) -> IssueLinkPayload {
    let key = |spec_id: SpecId| KeyRef::new(keys.get(&spec_id).cloned().unwrap_or_default());
    IssueLinkPayload {
        link_type: NameRef::new(link.link_type.as_str()),
        inward_issue: key(link.inward.spec_id),
        outward_issue: key(link.outward.spec_id),
    }
}
