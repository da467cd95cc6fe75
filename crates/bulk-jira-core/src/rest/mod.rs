mod client;
mod types;

pub use client::{render_json, JiraClient, RestError, RestResult};
pub use types::{
    CreateIssueFields, CreateIssuePayload, CreatedIssue, IssueLinkPayload, KeyRef, NameRef,
    Project, User,
};
