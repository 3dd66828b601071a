//! Commit and pull request change lookups.

use rustc_hash::FxHashMap;

/// Answers which files a commit or PR touched and which commits a PR holds.
pub trait ChangeIndex: Send + Sync {
    fn commit_files(&self, repo: &str, commit_sha: &str) -> Option<Vec<String>>;

    fn pr_files(&self, repo: &str, pr_id: &str) -> Option<Vec<String>>;

    fn pr_commits(&self, repo: &str, pr_id: &str) -> Option<Vec<String>>;

    /// Monotonic PR ordinal within a repo. Defaults to the number embedded
    /// in the PR id (`"pr-42"` → 42).
    fn pr_ordinal(&self, _repo: &str, pr_id: &str) -> Option<u64> {
        let digits: String = pr_id.chars().filter(char::is_ascii_digit).collect();
        digits.parse().ok()
    }
}

/// In-memory change index, filled by the caller.
#[derive(Debug, Default)]
pub struct InMemoryChangeIndex {
    commits: FxHashMap<(String, String), Vec<String>>,
    prs: FxHashMap<(String, String), (Vec<String>, Vec<String>)>,
}

impl InMemoryChangeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_commit(&mut self, repo: &str, pr_id: &str, commit_sha: &str, files: &[&str]) {
        let files: Vec<String> = files.iter().map(|f| f.to_string()).collect();
        let entry = self
            .prs
            .entry((repo.to_string(), pr_id.to_string()))
            .or_default();
        entry.1.push(commit_sha.to_string());
        for f in &files {
            if !entry.0.contains(f) {
                entry.0.push(f.clone());
            }
        }
        self.commits
            .insert((repo.to_string(), commit_sha.to_string()), files);
    }

    /// Record PR files that are not attributed to a known commit.
    pub fn add_pr_files(&mut self, repo: &str, pr_id: &str, files: &[&str]) {
        let entry = self
            .prs
            .entry((repo.to_string(), pr_id.to_string()))
            .or_default();
        for f in files {
            if !entry.0.iter().any(|e| e == f) {
                entry.0.push(f.to_string());
            }
        }
    }
}

impl ChangeIndex for InMemoryChangeIndex {
    fn commit_files(&self, repo: &str, commit_sha: &str) -> Option<Vec<String>> {
        self.commits
            .get(&(repo.to_string(), commit_sha.to_string()))
            .cloned()
    }

    fn pr_files(&self, repo: &str, pr_id: &str) -> Option<Vec<String>> {
        self.prs
            .get(&(repo.to_string(), pr_id.to_string()))
            .map(|(files, _)| files.clone())
    }

    fn pr_commits(&self, repo: &str, pr_id: &str) -> Option<Vec<String>> {
        self.prs
            .get(&(repo.to_string(), pr_id.to_string()))
            .map(|(_, commits)| commits.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_accumulates_commit_files() {
        let mut index = InMemoryChangeIndex::new();
        index.add_commit("r", "pr-7", "c1", &["a.py", "b.py"]);
        index.add_commit("r", "pr-7", "c2", &["b.py", "c.py"]);
        assert_eq!(index.pr_files("r", "pr-7").unwrap().len(), 3);
        assert_eq!(index.pr_commits("r", "pr-7").unwrap(), vec!["c1", "c2"]);
        assert_eq!(index.pr_ordinal("r", "pr-7"), Some(7));
        assert!(index.commit_files("r", "c3").is_none());
    }
}
