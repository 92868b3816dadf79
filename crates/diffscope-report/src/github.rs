use std::str::FromStr;

use diffscope_core::{DiffScopeError, ReportStrategy};
use serde_json::{json, Value};
use tracing::debug;

use crate::comment::{has_halting_error, summarize, ReportComment, ViolationKind};

/// GitHub accepts at most this many annotations per check run request.
pub const ANNOTATION_BATCH_SIZE: usize = 50;

/// GitHub client for publishing scoped findings.
///
/// # Examples
///
/// ```
/// use diffscope_report::github::PullRequestRef;
///
/// let pr: PullRequestRef = "octocat/hello-world#42".parse().unwrap();
/// assert_eq!(pr.owner, "octocat");
/// assert_eq!(pr.repo, "hello-world");
/// assert_eq!(pr.number, 42);
/// ```
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
}

/// Where findings are published.
#[derive(Debug, Clone)]
pub struct PublishTarget {
    pub owner: String,
    pub repo: String,
    /// Required by the `review` strategy.
    pub pr: Option<u64>,
    /// Commit the comments or check run attach to.
    pub sha: String,
}

impl GitHubClient {
    /// Create a client from an explicit token or the `GITHUB_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::Config`] if no token is available, or
    /// [`DiffScopeError::GitHub`] if the client cannot be built.
    pub fn new(token: Option<&str>) -> Result<Self, DiffScopeError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                DiffScopeError::Config(
                    "GITHUB_TOKEN not set. Pass --github-token or set GITHUB_TOKEN env var".into(),
                )
            })?,
        };

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| DiffScopeError::GitHub(format!("failed to create GitHub client: {e}")))?;

        Ok(Self { octocrab })
    }

    /// Publish `comments` using `strategy`.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::Config`] when the `review` strategy has no
    /// pull request number, and [`DiffScopeError::GitHub`] on API errors.
    pub async fn publish(
        &self,
        target: &PublishTarget,
        strategy: ReportStrategy,
        check_name: &str,
        comments: &[ReportComment],
    ) -> Result<(), DiffScopeError> {
        match strategy {
            ReportStrategy::Review => {
                let pr = target.pr.ok_or_else(|| {
                    DiffScopeError::Config("the review strategy requires --pr owner/repo#number".into())
                })?;
                self.post_review(target, pr, comments).await
            }
            ReportStrategy::CommitComments => self.post_commit_comments(target, comments).await,
            ReportStrategy::CheckRun => self.create_check_run(target, check_name, comments).await,
        }
    }

    /// Post a single pull request review holding every comment.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::GitHub`] on API errors.
    pub async fn post_review(
        &self,
        target: &PublishTarget,
        pr_number: u64,
        comments: &[ReportComment],
    ) -> Result<(), DiffScopeError> {
        let route = format!(
            "/repos/{}/{}/pulls/{pr_number}/reviews",
            target.owner, target.repo
        );
        let body = review_payload(comments, &target.sha);

        debug!(route = %route, comments = comments.len(), "posting review");
        let _response: Value = self
            .octocrab
            .post(route, Some(&body))
            .await
            .map_err(|e| DiffScopeError::GitHub(format!("failed to post review: {e}")))?;

        Ok(())
    }

    /// Post one commit comment per finding.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::GitHub`] on the first failed request.
    pub async fn post_commit_comments(
        &self,
        target: &PublishTarget,
        comments: &[ReportComment],
    ) -> Result<(), DiffScopeError> {
        let route = format!(
            "/repos/{}/{}/commits/{}/comments",
            target.owner, target.repo, target.sha
        );

        for comment in comments {
            debug!(path = %comment.path, line = comment.end_line, "posting commit comment");
            let _response: Value = self
                .octocrab
                .post(&route, Some(&commit_comment_payload(comment)))
                .await
                .map_err(|e| {
                    DiffScopeError::GitHub(format!("failed to post commit comment: {e}"))
                })?;
        }

        Ok(())
    }

    /// Create a completed check run, sending annotations in batches of
    /// [`ANNOTATION_BATCH_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::GitHub`] on API errors or when the created
    /// check run has no id.
    pub async fn create_check_run(
        &self,
        target: &PublishTarget,
        name: &str,
        comments: &[ReportComment],
    ) -> Result<(), DiffScopeError> {
        let summary = summarize(comments);
        let mut batches = annotation_batches(comments).into_iter();
        let first = batches.next().unwrap_or_default();

        let route = format!("/repos/{}/{}/check-runs", target.owner, target.repo);
        let body = json!({
            "name": name,
            "head_sha": target.sha,
            "status": "completed",
            "conclusion": check_conclusion(comments),
            "completed_at": chrono::Utc::now().to_rfc3339(),
            "output": {
                "title": name,
                "summary": summary,
                "annotations": first,
            },
        });

        debug!(route = %route, annotations = comments.len(), "creating check run");
        let created: Value = self
            .octocrab
            .post(route, Some(&body))
            .await
            .map_err(|e| DiffScopeError::GitHub(format!("failed to create check run: {e}")))?;
        let id = created["id"]
            .as_u64()
            .ok_or_else(|| DiffScopeError::GitHub("check run response has no id".into()))?;

        let update_route = format!(
            "/repos/{}/{}/check-runs/{id}",
            target.owner, target.repo
        );
        for batch in batches {
            let body = json!({
                "output": {
                    "title": name,
                    "summary": summary,
                    "annotations": batch,
                },
            });
            let _response: Value = self
                .octocrab
                .patch(&update_route, Some(&body))
                .await
                .map_err(|e| {
                    DiffScopeError::GitHub(format!("failed to update check run {id}: {e}"))
                })?;
        }

        Ok(())
    }
}

/// Request body for a pull request review. Multi-line findings use
/// `start_line`; single-line ones only `line`.
pub fn review_payload(comments: &[ReportComment], commit_sha: &str) -> Value {
    let review_comments: Vec<Value> = comments
        .iter()
        .map(|c| {
            let mut comment = json!({
                "path": c.path,
                "line": c.end_line,
                "side": "RIGHT",
                "body": c.body,
            });
            if c.start_line < c.end_line {
                comment["start_line"] = json!(c.start_line);
                comment["start_side"] = json!("RIGHT");
            }
            comment
        })
        .collect();

    json!({
        "commit_id": commit_sha,
        "event": "COMMENT",
        "body": summarize(comments),
        "comments": review_comments,
    })
}

/// Request body for one commit comment.
pub fn commit_comment_payload(comment: &ReportComment) -> Value {
    json!({
        "path": comment.path,
        "line": comment.end_line,
        "body": comment.body,
    })
}

/// Check run annotations split into request-sized batches. Always holds at
/// least one (possibly empty) batch.
pub fn annotation_batches(comments: &[ReportComment]) -> Vec<Vec<Value>> {
    let annotations: Vec<Value> = comments
        .iter()
        .map(|c| {
            let level = match c.kind {
                ViolationKind::Error => "failure",
                ViolationKind::Warning => "warning",
            };
            json!({
                "path": c.path,
                "start_line": c.start_line,
                "end_line": c.end_line,
                "annotation_level": level,
                "title": c.rule,
                "message": c.body,
            })
        })
        .collect();

    if annotations.is_empty() {
        return vec![Vec::new()];
    }
    annotations
        .chunks(ANNOTATION_BATCH_SIZE)
        .map(<[Value]>::to_vec)
        .collect()
}

/// `failure` if any finding is an error, `neutral` for warnings only,
/// `success` otherwise.
pub fn check_conclusion(comments: &[ReportComment]) -> &'static str {
    if has_halting_error(comments) {
        "failure"
    } else if comments.is_empty() {
        "success"
    } else {
        "neutral"
    }
}

/// A pull request reference in `owner/repo#number` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl FromStr for PullRequestRef {
    type Err = DiffScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            DiffScopeError::Config(format!(
                "invalid PR reference '{s}', expected owner/repo#number"
            ))
        };
        let (owner_repo, number) = s.split_once('#').ok_or_else(invalid)?;
        let (owner, repo) = owner_repo.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || repo.is_empty() {
            return Err(invalid());
        }
        let number = number
            .parse()
            .map_err(|_| DiffScopeError::Config(format!("invalid PR number: {number}")))?;
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(start: u32, end: u32, kind: ViolationKind) -> ReportComment {
        ReportComment {
            path: "classes/A.cls".into(),
            start_line: start,
            end_line: end,
            kind,
            rule: "ApexDoc".into(),
            body: "**Warning** `pmd/ApexDoc` (severity 5): missing docs".into(),
        }
    }

    #[test]
    fn parse_valid_pr_reference() {
        let pr: PullRequestRef = "rust-lang/rust#12345".parse().unwrap();
        assert_eq!(
            pr,
            PullRequestRef {
                owner: "rust-lang".into(),
                repo: "rust".into(),
                number: 12345,
            }
        );
    }

    #[test]
    fn parse_pr_reference_rejects_malformed_input() {
        for input in ["owner/repo", "repo#123", "owner/repo#abc", "/repo#1", "owner/#1"] {
            assert!(input.parse::<PullRequestRef>().is_err(), "{input}");
        }
    }

    #[test]
    fn review_payload_uses_ranges_only_for_multi_line_findings() {
        let payload = review_payload(
            &[
                comment(7, 9, ViolationKind::Error),
                comment(12, 12, ViolationKind::Warning),
            ],
            "abc123",
        );
        assert_eq!(payload["commit_id"], "abc123");
        assert_eq!(payload["event"], "COMMENT");

        let comments = payload["comments"].as_array().unwrap();
        assert_eq!(comments[0]["start_line"], 7);
        assert_eq!(comments[0]["line"], 9);
        assert!(comments[1].get("start_line").is_none());
        assert_eq!(comments[1]["line"], 12);
        assert_eq!(comments[1]["side"], "RIGHT");
    }

    #[test]
    fn commit_comment_anchors_on_last_line() {
        let payload = commit_comment_payload(&comment(3, 5, ViolationKind::Warning));
        assert_eq!(payload["line"], 5);
        assert_eq!(payload["path"], "classes/A.cls");
    }

    #[test]
    fn annotations_are_batched_by_fifty() {
        let comments: Vec<_> = (1..=120)
            .map(|i| comment(i, i, ViolationKind::Warning))
            .collect();
        let batches = annotation_batches(&comments);
        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        assert_eq!(batches[2][19]["start_line"], 120);
        assert_eq!(batches[0][0]["annotation_level"], "warning");
    }

    #[test]
    fn no_annotations_still_yield_one_batch() {
        assert_eq!(annotation_batches(&[]), vec![Vec::<Value>::new()]);
    }

    #[test]
    fn conclusion_reflects_worst_finding() {
        assert_eq!(check_conclusion(&[]), "success");
        assert_eq!(check_conclusion(&[comment(1, 1, ViolationKind::Warning)]), "neutral");
        assert_eq!(
            check_conclusion(&[
                comment(1, 1, ViolationKind::Warning),
                comment(2, 2, ViolationKind::Error),
            ]),
            "failure"
        );
    }

    #[test]
    fn review_without_pr_number_is_a_config_error() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let client = rt.block_on(async { GitHubClient::new(Some("ghp_test")) }).unwrap();
        let target = PublishTarget {
            owner: "o".into(),
            repo: "r".into(),
            pr: None,
            sha: "abc".into(),
        };
        let err = rt
            .block_on(client.publish(&target, ReportStrategy::Review, "diffscope", &[]))
            .unwrap_err();
        assert!(matches!(err, DiffScopeError::Config(_)));
    }
}
