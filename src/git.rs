//! Process-backed git operations.
//!
//! Everything here shells out to the system `git` executable, which
//! automatically handles SSH keys, credential helpers and any authentication
//! configured in `~/.gitconfig`. Failures carry git's own output so the
//! caller can show it verbatim. Nothing is retried.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::debug;

use crate::error::{Error, Result};
use crate::repository::{MergeOutcome, WorkingCopy};

/// Identity used for commits in scratch repositories.
const COMMITTER_NAME: &str = "pctl";
const COMMITTER_EMAIL: &str = "pctl@localhost";

/// Clone a repository at a specific ref using shallow clone
pub fn clone_shallow(url: &str, ref_name: &str, target_dir: &Path) -> Result<()> {
    // Remove target directory if it exists (git won't clone into existing non-empty dir)
    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }

    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    debug!("cloning {}@{} into {}", url, ref_name, target_dir.display());
    let output = Command::new("git")
        .args(["clone", "--branch", ref_name, "--depth", "1", url])
        .arg(target_dir)
        .output()
        .map_err(|e| Error::GitClone {
            url: url.to_string(),
            r#ref: ref_name.to_string(),
            message: e.to_string(),
            hint: Some("Make sure git is installed and on PATH".to_string()),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        let hint = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            Some(
                "Make sure you have access to the repository: add your SSH key to ssh-agent \
                 or configure git credentials"
                    .to_string(),
            )
        } else if stderr.contains("Remote branch") && stderr.contains("not found") {
            Some(format!("Check that the branch or tag '{}' exists", ref_name))
        } else {
            None
        };

        return Err(Error::GitClone {
            url: url.to_string(),
            r#ref: ref_name.to_string(),
            message: stderr.trim().to_string(),
            hint,
        });
    }

    Ok(())
}

/// A git working copy bound to one directory.
#[derive(Debug, Clone)]
pub struct GitWorkingCopy {
    dir: PathBuf,
}

impl GitWorkingCopy {
    /// Binds to an existing working copy.
    pub fn open(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Initializes a new repository in `dir` with a local committer identity.
    pub fn init(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let repo = Self::open(dir);
        repo.run(&["init", "--quiet"])?;
        repo.run(&["config", "user.name", COMMITTER_NAME])?;
        repo.run(&["config", "user.email", COMMITTER_EMAIL])?;
        repo.run(&["config", "commit.gpgsign", "false"])?;
        Ok(repo)
    }

    fn command(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|e| Error::GitCommand {
                command: args.join(" "),
                dir: self.dir.display().to_string(),
                stderr: e.to_string(),
            })
    }

    /// Runs git and returns stdout, failing on a non-zero exit code.
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.command(args)?;
        if !output.status.success() {
            return Err(self.failure(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn failure(&self, args: &[&str], output: &Output) -> Error {
        let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(stdout.trim());
        }
        Error::GitCommand {
            command: args.join(" "),
            dir: self.dir.display().to_string(),
            stderr,
        }
    }

    fn is_merging(&self) -> bool {
        self.dir.join(".git").join("MERGE_HEAD").exists()
    }
}

impl WorkingCopy for GitWorkingCopy {
    fn path(&self) -> &Path {
        &self.dir
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.run(&["symbolic-ref", "--short", "HEAD"])?.trim().to_string())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", branch]).map(|_| ())
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        if self.current_branch()? == name {
            return Ok(());
        }
        self.run(&["checkout", "--quiet", "-b", name]).map(|_| ())
    }

    fn add_all(&self) -> Result<()> {
        self.run(&["add", "."]).map(|_| ())
    }

    fn remove_all_tracked(&self) -> Result<()> {
        if self.run(&["ls-files"])?.trim().is_empty() {
            return Ok(());
        }
        self.run(&["rm", "-rf", "--quiet", "."]).map(|_| ())
    }

    fn has_changes(&self) -> Result<bool> {
        Ok(!self.run(&["status", "-s"])?.trim().is_empty())
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.add_all()?;
        if !self.is_merging() && !self.has_changes()? {
            debug!("nothing to commit in {}", self.dir.display());
            return Ok(());
        }
        self.run(&["commit", "--quiet", "-am", message]).map(|_| ())
    }

    fn merge(&self, branch: &str) -> Result<MergeOutcome> {
        let message = format!("Merge branch '{}'", branch);
        let args = ["merge", "--no-edit", "-m", message.as_str(), branch];
        let output = self.command(&args)?;
        if output.status.success() {
            return Ok(MergeOutcome::Clean);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.contains("CONFLICT") {
            return Err(self.failure(&args, &output));
        }

        let conflicts = self
            .run(&["diff", "--name-only", "--diff-filter=U"])?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(PathBuf::from)
            .collect();
        Ok(MergeOutcome::Conflicts(conflicts))
    }
}
