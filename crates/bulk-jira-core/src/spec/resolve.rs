use std::collections::HashMap;

use thiserror::Error;

use super::{IssueSpec, SpecId};

/// A link whose target cannot be turned into an issue of the same file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkResolutionError {
    #[error("issue {from} links to spec_id {target}, which is not defined in the file")]
    NotFound { from: SpecId, target: SpecId },
    #[error("issue {0} links to itself")]
    SelfReference(SpecId),
}

/// Lookup table from local identifier to spec, built once per run.
#[derive(Debug, Clone)]
pub struct SpecIndex<'a> {
    by_id: HashMap<SpecId, &'a IssueSpec>,
}

impl<'a> SpecIndex<'a> {
    pub fn new(specs: &'a [IssueSpec]) -> Self {
        let by_id = specs.iter().map(|spec| (spec.spec_id, spec)).collect();
        Self { by_id }
    }

    /// Find the spec whose local identifier is `id`, or `None` when no spec matches.
    pub fn resolve(&self, id: SpecId) -> Option<&'a IssueSpec> {
        self.by_id.get(&id).copied()
    }

    /// Resolve the target of a link declared on issue `from`.
    pub fn resolve_link(
        &self,
        from: SpecId,
        target: SpecId,
    ) -> Result<&'a IssueSpec, LinkResolutionError> {
        if from == target {
            return Err(LinkResolutionError::SelfReference(from));
        }
        self.resolve(target)
            .ok_or(LinkResolutionError::NotFound { from, target })
    }
}
