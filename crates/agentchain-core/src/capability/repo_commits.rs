//! Recent commits of a GitHub repository.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::read_body;
use super::fields;
use super::CapabilityError;
use crate::config::CapabilityConfig;
use crate::models::step_config::Settings;

const SERVICE: &str = "GitHub";
const DEFAULT_PER_PAGE: u64 = 10;
const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct CommitReadRequest {
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
    pub per_page: u64,
    pub token: Option<String>,
}

impl CommitReadRequest {
    /// Accepts `repository: "owner/repo"` (a full github.com URL works too)
    /// or separate `owner` and `repo` keys.
    pub fn from_settings(settings: &Settings) -> Result<Self, CapabilityError> {
        let (owner, repo) = match fields::opt_str(settings, "repository") {
            Some(full) => split_repository(&full)?,
            None => {
                let owner = fields::opt_str(settings, "owner").ok_or(CapabilityError::MissingField("repository"))?;
                let repo = fields::req_str(settings, "repo")?;
                (owner.trim().to_string(), repo.trim().to_string())
            }
        };
        for (field, part) in [("owner", &owner), ("repo", &repo)] {
            if !part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(CapabilityError::invalid(field, format!("'{}' is not a valid name", part)));
            }
        }

        let per_page = fields::opt_u64(settings, "perPage")?.unwrap_or(DEFAULT_PER_PAGE);
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(CapabilityError::invalid(
                "perPage",
                format!("must be between 1 and {}", MAX_PER_PAGE),
            ));
        }

        Ok(Self {
            owner,
            repo,
            branch: fields::opt_str(settings, "branch"),
            per_page,
            token: fields::opt_str(settings, "token"),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

fn split_repository(raw: &str) -> Result<(String, String), CapabilityError> {
    let trimmed = raw
        .trim()
        .trim_start_matches("https://github.com/")
        .trim_end_matches('/')
        .trim_end_matches(".git");
    match trimmed.split('/').collect::<Vec<_>>().as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => Ok((owner.to_string(), repo.to_string())),
        _ => Err(CapabilityError::invalid(
            "repository",
            format!("'{}' is not of the form owner/repo", raw),
        )),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitReadOutput {
    pub repository: String,
    pub commits: Vec<CommitSummary>,
}

#[async_trait]
pub trait CommitReader: Send + Sync {
    async fn list_commits(&self, request: &CommitReadRequest) -> Result<CommitReadOutput, CapabilityError>;
}

pub struct GithubClient {
    client: reqwest::Client,
    config: CapabilityConfig,
}

impl GithubClient {
    pub fn new(client: reqwest::Client, config: CapabilityConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CommitReader for GithubClient {
    async fn list_commits(&self, request: &CommitReadRequest) -> Result<CommitReadOutput, CapabilityError> {
        let url = format!(
            "{}/repos/{}/{}/commits",
            self.config.github_api_base.trim_end_matches('/'),
            request.owner,
            request.repo
        );
        let mut query = vec![("per_page", request.per_page.to_string())];
        if let Some(branch) = &request.branch {
            query.push(("sha", branch.clone()));
        }

        let mut req = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(&query);
        // Public repositories work without a token.
        if let Some(token) = request.token.as_ref().or(self.config.github_token.as_ref()) {
            req = req.bearer_auth(token);
        }

        tracing::info!("[RepoCommits] Listing {} commits of {}", request.per_page, request.full_name());
        let text = read_body(SERVICE, req.send().await?).await?;
        let json: Value = serde_json::from_str(&text).map_err(|e| CapabilityError::decode(SERVICE, e))?;

        Ok(CommitReadOutput {
            repository: request.full_name(),
            commits: parse_commits(&json)?,
        })
    }
}

fn parse_commits(json: &Value) -> Result<Vec<CommitSummary>, CapabilityError> {
    let items = json
        .as_array()
        .ok_or_else(|| CapabilityError::decode(SERVICE, "expected a JSON array of commits"))?;

    let text = |item: &Value, pointer: &str| -> String {
        item.pointer(pointer)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    Ok(items
        .iter()
        .map(|item| {
            let author = item
                .pointer("/author/login")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| text(item, "/commit/author/name"));
            CommitSummary {
                sha: text(item, "/sha"),
                message: text(item, "/commit/message"),
                author,
                date: text(item, "/commit/author/date"),
                url: text(item, "/html_url"),
            }
        })
        .collect())
}
