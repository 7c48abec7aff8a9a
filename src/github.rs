//! GitHub API helpers: fetch a pull request's diff and keep a single
//! coverage comment up to date on it.

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;

const COMMENT_MARKER: &str = "<!-- covtrack-report -->";
const API_VERSION: &str = "2022-11-28";

/// Resolved GitHub Actions context, read from environment variables.
pub struct Context {
    token: String,
    api_url: String,
    repo: String,
    pr_number: u64,
    pub sha: Option<String>,
}

impl Context {
    /// Build a context from standard GitHub Actions environment variables
    /// (`GITHUB_TOKEN`, `GITHUB_REPOSITORY`, `GITHUB_REF`, `GITHUB_SHA`,
    /// and optionally `GITHUB_API_URL` for GitHub Enterprise).
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN environment variable is required")?;
        let repo = std::env::var("GITHUB_REPOSITORY")
            .context("GITHUB_REPOSITORY environment variable is required")?;
        let github_ref = std::env::var("GITHUB_REF").unwrap_or_default();
        let pr_number = pr_number_from_ref(&github_ref)
            .context("could not determine PR number from GITHUB_REF")?;
        let api_url = std::env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| "https://api.github.com".to_string());
        let sha = std::env::var("GITHUB_SHA").ok();
        Ok(Self {
            token,
            api_url,
            repo,
            pr_number,
            sha,
        })
    }

    /// Fetch the unified diff for the pull request.
    pub fn fetch_diff(&self) -> Result<String> {
        tracing::info!(repo = %self.repo, pr = self.pr_number, "fetching pull request diff");
        let url = format!("{}/repos/{}/pulls/{}", self.api_url, self.repo, self.pr_number);
        self.request("GET", &url, "application/vnd.github.v3.diff")
            .call()
            .context("Failed to fetch PR diff from GitHub")?
            .into_string()
            .context("Failed to read PR diff response body")
    }

    /// Create or update the coverage comment on the pull request.
    pub fn post_comment(&self, body: &str) -> Result<()> {
        let payload = serde_json::json!({ "body": format!("{COMMENT_MARKER}\n{body}") });

        let (method, url) = match self.find_existing_comment()? {
            Some(id) => (
                "PATCH",
                format!("{}/repos/{}/issues/comments/{}", self.api_url, self.repo, id),
            ),
            None => (
                "POST",
                format!(
                    "{}/repos/{}/issues/{}/comments",
                    self.api_url, self.repo, self.pr_number
                ),
            ),
        };

        match self
            .request(method, &url, "application/vnd.github+json")
            .send_json(payload)
        {
            Ok(_) => {}
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                bail!("GitHub API error posting comment (HTTP {code}): {body}");
            }
            Err(e) => bail!("Failed to post comment: {e}"),
        }

        tracing::info!(repo = %self.repo, pr = self.pr_number, "coverage comment posted");
        Ok(())
    }

    /// Find an existing covtrack comment on the PR (by our hidden marker).
    fn find_existing_comment(&self) -> Result<Option<u64>> {
        for page in 1u32.. {
            let url = format!(
                "{}/repos/{}/issues/{}/comments?per_page=100&page={page}",
                self.api_url, self.repo, self.pr_number
            );
            let comments: Vec<Comment> = self
                .request("GET", &url, "application/vnd.github+json")
                .call()
                .context("Failed to list PR comments")?
                .into_json()
                .context("Failed to parse comments JSON")?;

            if comments.is_empty() {
                break;
            }
            if let Some(found) = comments.iter().find(|c| {
                c.body
                    .as_deref()
                    .is_some_and(|body| body.contains(COMMENT_MARKER))
            }) {
                return Ok(Some(found.id));
            }
        }
        Ok(None)
    }

    fn request(&self, method: &str, url: &str, accept: &str) -> ureq::Request {
        ureq::request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", accept)
            .set("User-Agent", "covtrack")
            .set("X-GitHub-Api-Version", API_VERSION)
    }
}

#[derive(Deserialize)]
struct Comment {
    id: u64,
    body: Option<String>,
}

/// Extract PR number from a ref like "refs/pull/42/merge".
fn pr_number_from_ref(github_ref: &str) -> Option<u64> {
    let mut parts = github_ref.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("refs"), Some("pull"), Some(number)) => number.parse().ok(),
        _ => None,
    }
}
