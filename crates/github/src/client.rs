//! REST client for the GitHub issue-comment endpoints.
//!
//! Pull request conversation comments are issue comments, so the same two
//! calls cover both issues and PRs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Public API root used when no override is configured.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("mvbot/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated client for one GitHub API root.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

/// The part of a comment resource the bot cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

/// Errors from the GitHub REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum GitHubApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// GitHub returned a non-2xx status code.
    #[error("GitHub API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl GitHubClient {
    /// Create a client for `api_url` (e.g. `https://api.github.com`)
    /// authenticating with `token`.
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, token)
    }

    /// Like [`new`](Self::new), reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Post a new comment on issue or PR `number` of `repo` (`owner/name`).
    ///
    /// Returns the created comment so its id can be stored as the job's
    /// notification handle.
    pub async fn create_comment(
        &self,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<Comment, GitHubApiError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{repo}/issues/{number}/comments"),
            )
            .json(&CommentBody { body })
            .send()
            .await?;

        let comment: Comment = Self::parse_response(response).await?;
        tracing::info!(repo, number, comment_id = comment.id, "Created GitHub comment");
        Ok(comment)
    }

    /// Replace the body of comment `comment_id` in `repo`.
    pub async fn update_comment(
        &self,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<(), GitHubApiError> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/repos/{repo}/issues/comments/{comment_id}"),
            )
            .json(&CommentBody { body })
            .send()
            .await?;

        Self::check_status(response).await?;
        tracing::debug!(repo, comment_id, "Updated GitHub comment");
        Ok(())
    }

    // ---- private helpers ----

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .timeout(REQUEST_TIMEOUT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(&self.token)
    }

    /// Returns the response unchanged on success, or a
    /// [`GitHubApiError::ApiError`] with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GitHubApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GitHubApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GitHubApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), GitHubApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
