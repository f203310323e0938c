//! Throwaway git repositories with controlled author dates.

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

pub(crate) struct GitRepo {
    dir: TempDir,
}

impl GitRepo {
    /// `None` when no usable `git` binary is on `PATH`.
    pub(crate) fn init() -> Option<Self> {
        let available = Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success());
        if !available {
            return None;
        }
        let repo = Self {
            dir: TempDir::new().unwrap(),
        };
        repo.git(&["init", "-q"]);
        repo.git(&["checkout", "-q", "-b", "main"]);
        Some(repo)
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn write(&self, rel: &str, body: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    /// Stage everything and commit with the given author time (unix seconds).
    pub(crate) fn commit(&self, message: &str, author_time: i64) {
        self.git(&["add", "-A"]);
        self.git_at(&["commit", "-q", "-m", message], author_time);
    }

    pub(crate) fn merge(&self, branch: &str) {
        let now = chrono::Utc::now().timestamp();
        self.git_at(
            &["merge", "-q", "--no-ff", "-m", &format!("merge {branch}"), branch],
            now,
        );
    }

    pub(crate) fn git(&self, args: &[&str]) {
        self.git_at(args, chrono::Utc::now().timestamp());
    }

    fn git_at(&self, args: &[&str], author_time: i64) {
        let output = Command::new("git")
            .args(["-c", "commit.gpgsign=false", "-c", "core.autocrlf=false"])
            .args(args)
            .current_dir(self.root())
            .env("HOME", self.root())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_AUTHOR_NAME", "Dev")
            .env("GIT_AUTHOR_EMAIL", "dev@example.com")
            .env("GIT_COMMITTER_NAME", "Dev")
            .env("GIT_COMMITTER_EMAIL", "dev@example.com")
            .env("GIT_AUTHOR_DATE", format!("@{author_time} +0000"))
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}
