//! GitHub integration service
//!
//! Creates a per-job branch in a configured repository so application
//! materials (tailored résumé, cover letter sources) can be versioned per
//! application. Talks to the GitHub REST API directly.

use crate::config::AppConfig;
use crate::database::Job;
use crate::error::{AppError, Result};
use serde::Deserialize;

const API_ROOT: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("jobtrack/", env!("CARGO_PKG_VERSION"));

/// Maximum length for each sanitized branch name segment
const MAX_SEGMENT_LENGTH: usize = 30;

/// Outcome of a branch creation request
#[derive(Debug, Clone, serde::Serialize)]
pub struct BranchCreation {
    pub branch: String,
    pub url: String,
    /// True when the branch was already present and was left untouched
    pub already_existed: bool,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    #[serde(rename = "ref")]
    full_ref: String,
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

/// GitHub API service
#[derive(Clone)]
pub struct GitHubService {
    client: reqwest::Client,
    config: AppConfig,
}

impl GitHubService {
    pub fn new(config: AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Whether a token and repository are configured
    pub fn is_configured(&self) -> bool {
        self.config.github_token.is_some() && self.config.github_repo.is_some()
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .config
            .github_token
            .as_deref()
            .ok_or_else(|| AppError::GitHub("GITHUB_TOKEN is not configured".to_string()))?;
        let repo = self
            .config
            .github_repo
            .as_deref()
            .ok_or_else(|| AppError::GitHub("GITHUB_REPO is not configured".to_string()))?;
        Ok((token, repo))
    }

    /// Deterministic branch name for a job:
    /// `job/<company>/<title>-<yyyymmdd>-<id>`
    pub fn generate_branch_name(job: &Job) -> String {
        format!(
            "job/{}/{}-{}-{}",
            sanitize_segment(&job.company),
            sanitize_segment(&job.title),
            job.created_dt.format("%Y%m%d"),
            job.id
        )
    }

    /// Web URL of a branch in the configured repository
    pub fn branch_url(&self, branch: &str) -> Option<String> {
        self.config
            .github_repo
            .as_ref()
            .map(|repo| format!("https://github.com/{}/tree/{}", repo, branch))
    }

    /// Create the job's branch off the configured base branch. An existing
    /// branch is reported, not treated as a failure.
    pub async fn create_branch(&self, job: &Job) -> Result<BranchCreation> {
        let (token, repo) = self.credentials()?;
        let branch = Self::generate_branch_name(job);
        let base = &self.config.github_base_branch;

        // Resolve the base branch head to fork from
        let base_ref_url = format!("{}/repos/{}/git/ref/heads/{}", API_ROOT, repo, base);
        let response = self.get(token, &base_ref_url).await?;

        if !response.status().is_success() {
            return Err(AppError::GitHub(format!(
                "Base branch {} not found in {} (HTTP {})",
                base,
                repo,
                response.status()
            )));
        }

        let base_ref: GitRef = response.json().await?;

        let create_url = format!("{}/repos/{}/git/refs", API_ROOT, repo);
        let response = self
            .client
            .post(&create_url)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&serde_json::json!({
                "ref": format!("refs/heads/{}", branch),
                "sha": base_ref.object.sha,
            }))
            .send()
            .await?;

        let url = self.branch_url(&branch).unwrap_or_default();

        match response.status() {
            reqwest::StatusCode::CREATED => {
                tracing::info!("Created branch {} in {}", branch, repo);
                Ok(BranchCreation {
                    branch,
                    url,
                    already_existed: false,
                })
            }
            // The API answers 422 when the ref already exists
            reqwest::StatusCode::UNPROCESSABLE_ENTITY => {
                tracing::info!("Branch {} already exists in {}", branch, repo);
                Ok(BranchCreation {
                    branch,
                    url,
                    already_existed: true,
                })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::GitHub(format!(
                    "Branch creation failed (HTTP {}): {}",
                    status, body
                )))
            }
        }
    }

    /// Whether a branch exists in the configured repository
    pub async fn branch_exists(&self, branch: &str) -> Result<bool> {
        let (token, repo) = self.credentials()?;

        let url = format!("{}/repos/{}/git/ref/heads/{}", API_ROOT, repo, branch);
        let response = self.get(token, &url).await?;

        match response.status() {
            reqwest::StatusCode::OK => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(AppError::GitHub(format!(
                "Branch lookup failed (HTTP {})",
                status
            ))),
        }
    }

    /// All branches under the `job/` namespace
    pub async fn list_job_branches(&self) -> Result<Vec<String>> {
        let (token, repo) = self.credentials()?;

        let url = format!("{}/repos/{}/git/matching-refs/heads/job/", API_ROOT, repo);
        let response = self.get(token, &url).await?;

        if !response.status().is_success() {
            return Err(AppError::GitHub(format!(
                "Branch listing failed (HTTP {})",
                response.status()
            )));
        }

        let refs: Vec<GitRef> = response.json().await?;
        Ok(refs
            .into_iter()
            .filter_map(|r| {
                r.full_ref
                    .strip_prefix("refs/heads/")
                    .map(|name| name.to_string())
            })
            .collect())
    }

    async fn get(&self, token: &str, url: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?)
    }
}

/// Normalize a free-text value into a branch name segment: lowercase,
/// alphanumerics only with single hyphens between runs, length-clamped.
fn sanitize_segment(value: &str) -> String {
    let mut out = String::new();
    let mut last_hyphen = true;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
    }

    let trimmed = out.trim_end_matches('-');
    let clamped = &trimmed[..trimmed.len().min(MAX_SEGMENT_LENGTH)];
    let clamped = clamped.trim_end_matches('-');

    if clamped.is_empty() {
        "unnamed".to_string()
    } else {
        clamped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_job() -> Job {
        Job {
            id: 42,
            company: "Acme, Inc.".to_string(),
            title: "Senior Software Engineer (Backend)".to_string(),
            description: "desc".to_string(),
            location: "Remote".to_string(),
            referrer: None,
            referrer_posting_id: None,
            company_website: None,
            posting_url: None,
            salary_range_low: None,
            salary_range_high: None,
            remote_option: None,
            posting_id: None,
            created_dt: Utc.with_ymd_and_hms(2026, 3, 7, 9, 0, 0).unwrap(),
            posting_status: "Open".to_string(),
            resume_file: None,
            job_description_file: None,
            cover_letter_file: None,
            github_branch: None,
        }
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("Acme, Inc."), "acme-inc");
        assert_eq!(sanitize_segment("  --Weird__Name--  "), "weird-name");
        assert_eq!(sanitize_segment("!!!"), "unnamed");
    }

    #[test]
    fn test_sanitize_segment_clamps_length() {
        let long = "a very long company name that never seems to end";
        let segment = sanitize_segment(long);
        assert!(segment.len() <= 30);
        assert!(!segment.ends_with('-'));
    }

    #[test]
    fn test_generate_branch_name() {
        let branch = GitHubService::generate_branch_name(&sample_job());
        assert_eq!(branch, "job/acme-inc/senior-software-engineer-backe-20260307-42");
    }

    #[test]
    fn test_branch_url_requires_repo() {
        let service = GitHubService::new(AppConfig::with_app_dir(std::env::temp_dir()));
        assert!(service.branch_url("job/a/b").is_none());

        let mut config = AppConfig::with_app_dir(std::env::temp_dir());
        config.github_repo = Some("octocat/applications".to_string());
        let service = GitHubService::new(config);
        assert_eq!(
            service.branch_url("job/a/b").unwrap(),
            "https://github.com/octocat/applications/tree/job/a/b"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_service_errors() {
        let service = GitHubService::new(AppConfig::with_app_dir(std::env::temp_dir()));

        assert!(!service.is_configured());

        let result = service.create_branch(&sample_job()).await;
        assert!(matches!(result, Err(AppError::GitHub(_))));
    }
}
