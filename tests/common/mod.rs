//! Shared test utilities for integration and E2E tests.
//!
//! This module provides fixtures for local git profile repositories and
//! installation directories, so tests never touch the network.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     if !git_available() {
//!         return;
//!     }
//!     let repo = ProfileRepo::new();
//!     repo.write("app/profile.yaml", profiles::APP).commit("v1").tag("app/v0.1.0");
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::profiles;
    pub use super::{git_available, ProfileRepo, TestFixture};
}

/// Profile definitions used across tests.
#[allow(dead_code)]
pub mod profiles {
    /// A kustomize overlay plus a remote chart that depends on it.
    pub const APP: &str = r#"apiVersion: weave.works/v1alpha1
kind: ProfileDefinition
metadata:
  name: app
spec:
  description: test application
  artifacts:
    - name: deploy
      kustomize:
        path: config
    - name: server
      chart:
        url: https://charts.example.com
        name: nginx
        version: 1.0.0
        defaultValues: |
          service:
            port: 80
      dependsOn:
        - name: deploy
"#;

    /// The deployment of the `deploy` artifact at a replica count.
    pub fn deployment(replicas: u32) -> String {
        format!(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: app\nspec:\n  replicas: {}\n",
            replicas
        )
    }

    /// A profile whose only artifact nests the profile at `url` on `branch`.
    pub fn nesting(name: &str, url: &str, branch: &str) -> String {
        format!(
            "metadata:\n  name: {}\nspec:\n  artifacts:\n    - name: nested\n      profile:\n        source:\n          url: {}\n          branch: {}\n",
            name, url, branch
        )
    }
}

/// Whether a `git` executable is on the PATH. Tests that need one return
/// early when it is missing.
pub fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A local git repository serving profile definitions.
pub struct ProfileRepo {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl ProfileRepo {
    /// Create an empty repository on branch `main`.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        git(temp_dir.path(), &["init", "--quiet"]);
        git(temp_dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(temp_dir.path(), &["config", "user.name", "test"]);
        git(temp_dir.path(), &["config", "user.email", "test@localhost"]);
        git(temp_dir.path(), &["config", "commit.gpgsign", "false"]);
        Self { temp_dir }
    }

    /// URL `git clone` accepts for this repository.
    pub fn url(&self) -> String {
        format!("file://{}", self.temp_dir.path().display())
    }

    /// Write a file relative to the repository root.
    pub fn write(&self, path: &str, content: &str) -> &Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Commit everything in the working tree.
    pub fn commit(&self, message: &str) -> &Self {
        git(self.temp_dir.path(), &["add", "."]);
        git(self.temp_dir.path(), &["commit", "--quiet", "-m", message]);
        self
    }

    /// Tag the current commit.
    pub fn tag(&self, name: &str) -> &Self {
        git(self.temp_dir.path(), &["tag", name]);
        self
    }

    /// Create a branch at the current commit without checking it out.
    pub fn branch(&self, name: &str) -> &Self {
        git(self.temp_dir.path(), &["branch", name]);
        self
    }

    /// Commit the `app` profile at `app/v0.1.0` (2 replicas) and
    /// `app/v0.2.0` (3 replicas).
    pub fn with_app_versions(self) -> Self {
        self.write("app/profile.yaml", profiles::APP)
            .write("app/config/deployment.yaml", &profiles::deployment(2))
            .commit("app v0.1.0")
            .tag("app/v0.1.0")
            .write("app/config/deployment.yaml", &profiles::deployment(3))
            .commit("app v0.2.0")
            .tag("app/v0.2.0");
        self
    }
}

impl Default for ProfileRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// A test fixture that provides a temporary working directory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a `pctl` command running in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("pctl");
        cmd.current_dir(self.path())
            .env_remove("PCTL_NAMESPACE")
            .env_remove("PCTL_CATALOG_FILE")
            .env_remove("PCTL_GIT_REPOSITORY")
            .env_remove("RUST_LOG");
        cmd
    }

    /// `pctl install` from `repo` at `tag`, writing to `out`.
    pub fn install(&self, repo: &ProfileRepo, tag: &str, out: &str) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.args(["install", "--name", "inst", "--url"])
            .arg(repo.url())
            .args(["--tag", tag, "--out", out, "--root-dir", "clusters/dev"])
            .args(["--git-repository", "flux-system/fleet"]);
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
