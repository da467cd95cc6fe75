use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use super::types::{CreateIssuePayload, CreatedIssue, IssueLinkPayload, Project, User};
use crate::auth::BasicCredentials;
use crate::config::Config;

const API_PREFIX: &str = "rest/api/2/";
const USER_AGENT: &str = concat!("bulk-jira/", env!("CARGO_PKG_VERSION"));

/// Errors returned by the REST client.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} body: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("invalid Jira URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl RestError {
    /// Raw response body of a rejected request, when there is one.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            RestError::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub type RestResult<T> = Result<T, RestError>;

/// Minimal Jira REST client authenticated with basic auth.
#[derive(Debug, Clone)]
pub struct JiraClient {
    http: Client,
    base: Url,
    credentials: BasicCredentials,
}

impl JiraClient {
    pub fn new(config: &Config) -> RestResult<Self> {
        Self::with_base_url(&config.credentials, config.host.as_str())
    }

    /// Build a client against an arbitrary base URL (useful for testing).
    pub fn with_base_url(credentials: &BasicCredentials, base_url: &str) -> RestResult<Self> {
        let mut base = Url::parse(base_url)?;
        // Url::join drops the last path segment unless the base ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base,
            credentials: credentials.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Fetch the user the credentials belong to.
    pub async fn myself(&self) -> RestResult<User> {
        self.get("myself").await
    }

    pub async fn project(&self, key: &str) -> RestResult<Project> {
        self.get(&format!("project/{key}")).await
    }

    /// Requires the "Browse projects" and "Create issues" project permissions.
    pub async fn create_issue(&self, payload: &CreateIssuePayload) -> RestResult<CreatedIssue> {
        let url = self.endpoint("issue")?;
        let body = self.send(self.http.post(url).json(payload)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Link two existing issues. Jira answers `201 Created` with an empty body.
    pub async fn create_issue_link(&self, payload: &IssueLinkPayload) -> RestResult<()> {
        let url = self.endpoint("issueLink")?;
        self.send(self.http.post(url).json(payload)).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> RestResult<Url> {
        Ok(self.base.join(API_PREFIX)?.join(path)?)
    }

    async fn get<R>(&self, path: &str) -> RestResult<R>
    where
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let body = self.send(self.http.get(url)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send(&self, request: RequestBuilder) -> RestResult<String> {
        let response = request
            .basic_auth(&self.credentials.username, Some(&self.credentials.token))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let url = response.url().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} returned {}: {}", url, status, body);
            return Err(RestError::HttpStatus { status, body });
        }

        debug!("{} returned {}", url, status);
        Ok(response.text().await?)
    }
}

/// Serialize a request body the way it is sent, for diagnostics and dry runs.
pub fn render_json<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|err| format!("<unserializable: {err}>"))
}
