//! Git context capture for execution traces.
//!
//! Two sources feed the trace's git block: the repository itself (HEAD
//! commit metadata plus the `HEAD~1..HEAD` diff stat) and the session's own
//! Bash output, scanned for the `[branch sha]` line git prints on commit.
//! The latter catches commits made during the task even when HEAD has moved
//! on by the time the stop hook runs.

use crate::models::GitContext;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Matches the `[branch sha]` confirmation line from `git commit` output.
static COMMIT_LINE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\[[\w\-/]+\s+([a-f0-9]{7,40})\]").ok());

/// Captures git context from the repository containing `project_dir`.
///
/// Returns `None` when the directory is not inside a git work tree or the
/// repository has no commits yet. Diff stats cover `HEAD~1..HEAD` and are
/// zero for a root commit.
#[must_use]
pub fn capture_context(project_dir: &Path) -> Option<GitContext> {
    let repo = git2::Repository::discover(project_dir).ok()?;
    let head = repo.head().ok()?;
    let commit = head.peel_to_commit().ok()?;

    let author = commit.author();
    let timestamp = chrono::DateTime::from_timestamp(commit.time().seconds(), 0)
        .map(|t| t.to_rfc3339());
    let branch = head.shorthand().map(String::from);

    let mut ctx = GitContext {
        commit_hash: Some(commit.id().to_string()),
        commit_message: commit.summary().map(String::from),
        author: author.name().map(String::from),
        author_email: author.email().map(String::from),
        timestamp,
        branch,
        ..GitContext::default()
    };

    if let Some((files, insertions, deletions)) = last_commit_diff_stats(&repo, &commit) {
        ctx.files_changed = files;
        ctx.insertions = insertions;
        ctx.deletions = deletions;
    }

    Some(ctx)
}

fn last_commit_diff_stats(
    repo: &git2::Repository,
    commit: &git2::Commit<'_>,
) -> Option<(usize, usize, usize)> {
    let tree = commit.tree().ok()?;
    let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
        .ok()?;
    let stats = diff.stats().ok()?;
    Some((stats.files_changed(), stats.insertions(), stats.deletions()))
}

/// Harvests commit SHAs from Bash tool output captured during the session.
///
/// `outputs` is the raw tool-response text of each Bash call. Order is
/// preserved and duplicates are dropped.
#[must_use]
pub fn detect_session_commits<'a, I>(outputs: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let Some(re) = COMMIT_LINE_RE.as_ref() else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    let mut commits = Vec::new();
    for output in outputs {
        for caps in re.captures_iter(output) {
            if let Some(sha) = caps.get(1) {
                let sha = sha.as_str().to_string();
                if seen.insert(sha.clone()) {
                    commits.push(sha);
                }
            }
        }
    }
    commits
}
