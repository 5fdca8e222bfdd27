//! GitHub API helpers for publishing the diff-coverage comment on a pull
//! request.

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;

const API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// Hidden marker identifying our comment, so reruns update it in place.
pub fn comment_marker(name: &str) -> String {
    format!("<!-- covdiff: {name} -->")
}

/// Resolved GitHub Actions context, read from environment variables.
pub struct Context {
    token: String,
    repo: String,
    pr_number: u64,
}

impl Context {
    /// Build a context from `GITHUB_TOKEN`, `GITHUB_REPOSITORY` and
    /// `GITHUB_REF`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN environment variable is required")?;
        let repo = std::env::var("GITHUB_REPOSITORY")
            .context("GITHUB_REPOSITORY environment variable is required")?;
        let github_ref = std::env::var("GITHUB_REF").unwrap_or_default();
        let pr_number = pr_number_from_ref(&github_ref)
            .context("could not determine PR number from GITHUB_REF")?;
        Ok(Self {
            token,
            repo,
            pr_number,
        })
    }

    /// Create or update the comment tagged with `name` on the pull request.
    pub fn upsert_comment(&self, name: &str, body: &str) -> Result<()> {
        let marker = comment_marker(name);
        let body = if body.contains(&marker) {
            body.to_string()
        } else {
            format!("{marker}\n{body}")
        };

        let (method, url, action) = match self.find_comment(&marker)? {
            Some(id) => (
                "PATCH",
                format!("{API_URL}/repos/{}/issues/comments/{id}", self.repo),
                "updating",
            ),
            None => (
                "POST",
                format!(
                    "{API_URL}/repos/{}/issues/{}/comments",
                    self.repo, self.pr_number
                ),
                "creating",
            ),
        };

        match self
            .request(method, &url)
            .send_json(serde_json::json!({ "body": body }))
        {
            Ok(_) => {}
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                bail!("GitHub API error {action} comment (HTTP {code}): {body}");
            }
            Err(e) => bail!("Failed {action} comment: {e}"),
        }

        log::info!("Comment posted to {}/pull/{}", self.repo, self.pr_number);
        Ok(())
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        ureq::request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "covdiff")
            .set("X-GitHub-Api-Version", API_VERSION)
    }

    /// Find an existing comment carrying `marker`.
    fn find_comment(&self, marker: &str) -> Result<Option<u64>> {
        let mut page = 1u32;
        loop {
            let url = format!(
                "{API_URL}/repos/{}/issues/{}/comments?per_page=100&page={page}",
                self.repo, self.pr_number
            );
            let comments: Vec<Comment> = self
                .request("GET", &url)
                .call()
                .context("Failed to list PR comments")?
                .into_json()
                .context("Failed to parse comments JSON")?;
            if comments.is_empty() {
                return Ok(None);
            }
            if let Some(c) = comments
                .iter()
                .find(|c| c.body.as_deref().is_some_and(|b| b.contains(marker)))
            {
                return Ok(Some(c.id));
            }
            page += 1;
        }
    }
}

#[derive(Deserialize)]
struct Comment {
    id: u64,
    body: Option<String>,
}

/// Extract the PR number from a ref like "refs/pull/42/merge".
fn pr_number_from_ref(github_ref: &str) -> Option<u64> {
    let parts: Vec<&str> = github_ref.split('/').collect();
    if parts.len() >= 3 && parts[0] == "refs" && parts[1] == "pull" {
        parts[2].parse().ok()
    } else {
        None
    }
}
