//! Bitbucket Pipelines helpers: links for the comment footer and posting the
//! comment to the pull request.

use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use tracing::debug;

use crate::clock::Timestamp;
use crate::error::HectorError;
use crate::report::RenderContext;

const API_BASE: &str = "https://api.bitbucket.org/2.0";
const WEB_BASE: &str = "https://bitbucket.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives the finished comment.
pub trait CommentSink {
    /// Deliver `text`, returning the HTTP status and response body.
    fn submit(&self, text: &str) -> Result<(u16, String)>;

    /// Where comments end up, for logging.
    fn target(&self) -> &str;
}

/// Values read from the Bitbucket Pipelines environment.
///
/// Every field is optional so a comment can still be rendered (e.g. in a dry
/// run outside CI); posting requires the subset checked by [`Environment::client`].
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub workspace: Option<String>,
    pub repo_slug: Option<String>,
    pub commit: Option<String>,
    pub pr_id: Option<String>,
    pub pipeline_uuid: Option<String>,
    pub step_uuid: Option<String>,
    pub exit_code: Option<String>,
    pub token: Option<String>,
}

impl Environment {
    /// Read the standard Bitbucket Pipelines variables plus `TEST_COVERAGE_TOKEN`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            workspace: get("BITBUCKET_WORKSPACE"),
            repo_slug: get("BITBUCKET_REPO_SLUG"),
            commit: get("BITBUCKET_COMMIT"),
            pr_id: get("BITBUCKET_PR_ID"),
            pipeline_uuid: get("BITBUCKET_PIPELINE_UUID"),
            step_uuid: get("BITBUCKET_STEP_UUID"),
            exit_code: get("BITBUCKET_EXIT_CODE"),
            token: get("TEST_COVERAGE_TOKEN"),
        }
    }

    /// Exit code of the previous pipeline command, 0 when unset.
    pub fn exit_code(&self) -> crate::error::Result<i32> {
        match self.exit_code.as_deref() {
            None => Ok(0),
            Some(raw) => raw.trim().parse().map_err(|_| {
                HectorError::MalformedInput(format!("BITBUCKET_EXIT_CODE is not an integer: {raw}"))
            }),
        }
    }

    fn repo_url(&self) -> String {
        format!(
            "{WEB_BASE}/{}/{}",
            self.workspace.as_deref().unwrap_or_default(),
            self.repo_slug.as_deref().unwrap_or_default()
        )
    }

    /// Commit page template; `{commit}` is filled in by the renderer.
    #[must_use]
    pub fn commit_link_template(&self) -> String {
        format!("{}/commits/{{commit}}", self.repo_url())
    }

    /// Page of the pipeline step that produced the full coverage report.
    #[must_use]
    pub fn step_link(&self) -> String {
        format!(
            "{}/pipelines/results/{}/steps/{}",
            self.repo_url(),
            self.pipeline_uuid.as_deref().unwrap_or_default(),
            self.step_uuid.as_deref().unwrap_or_default()
        )
    }

    /// Assemble the render context for this pipeline run.
    pub fn render_context<'a>(
        &self,
        exit_code: i32,
        timestamp: &'a dyn Timestamp,
    ) -> RenderContext<'a> {
        RenderContext {
            exit_code,
            review_link_template: self.commit_link_template(),
            build_link_template: self.step_link(),
            commit_id: self.commit.clone().unwrap_or_default(),
            timestamp,
        }
    }

    /// API client for the current pull request.
    pub fn client(&self) -> crate::error::Result<Client> {
        let workspace = required(&self.workspace, "BITBUCKET_WORKSPACE")?;
        let repo_slug = required(&self.repo_slug, "BITBUCKET_REPO_SLUG")?;
        let pr_id = required(&self.pr_id, "BITBUCKET_PR_ID")?;
        let token = required(&self.token, "TEST_COVERAGE_TOKEN")?;
        Ok(Client::new(
            comments_url(workspace, repo_slug, pr_id),
            token.to_string(),
        ))
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> crate::error::Result<&'a str> {
    value.as_deref().ok_or(HectorError::MissingEnv(name))
}

/// Endpoint for comments on a pull request.
#[must_use]
pub fn comments_url(workspace: &str, repo_slug: &str, pr_id: &str) -> String {
    format!("{API_BASE}/repositories/{workspace}/{repo_slug}/pullrequests/{pr_id}/comments")
}

/// Request body for a new pull request comment.
#[must_use]
pub fn comment_payload(text: &str) -> serde_json::Value {
    serde_json::json!({ "content": { "raw": text } })
}

/// Posts comments to a single pull request.
pub struct Client {
    agent: ureq::Agent,
    url: String,
    token: String,
}

impl Client {
    pub fn new(url: String, token: String) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self { agent, url, token }
    }
}

impl CommentSink for Client {
    fn target(&self) -> &str {
        &self.url
    }

    fn submit(&self, text: &str) -> Result<(u16, String)> {
        debug!(url = %self.url, "posting comment");
        let resp = self
            .agent
            .post(&self.url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/json")
            .send_json(comment_payload(text));
        match resp {
            Ok(resp) => {
                let status = resp.status();
                let body = resp
                    .into_string()
                    .context("Failed to read Bitbucket response body")?;
                Ok((status, body))
            }
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Ok((code, body))
            }
            Err(e) => bail!("Failed to post comment to Bitbucket: {}", e),
        }
    }
}
