//! Shared test utilities for the CLI end-to-end tests.
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_file("env.yml", configs::APT);
//!     fixture.command().args(["list-hosts", "env.yml"]).assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Configuration sources used across the tests.
#[allow(dead_code)]
pub mod configs {
    /// A plain task list, attached to `localhost`.
    pub const APT: &str = "- apt:\n    name: zile\n";

    /// An uppercase task name: lowercased and run with privilege escalation.
    pub const APT_UPPERCASE: &str = "- APT:\n    name: zile\n";

    /// A group, its implicit hosts and a standalone host.
    pub const INVENTORY: &str = r#"
- meta:
    name: web
    hosts: [w1, w2]
  vars:
    http_port: 80
  tasks:
    - nginx
- meta:
    name: db1
    type: host
  tasks:
    - postgresql
"#;

    /// A task running a role from the fixture's `roles/` repository.
    pub const WITH_ROLE: &str = r#"
- task:
    name: ansiblebit.oracle-java
    task-type: role
"#;

    /// The same host defined twice with conflicting variables.
    pub const CONFLICT: &str = r#"
- meta: {name: h1, type: host}
  vars: {x: 1}
- meta: {name: h1, type: host}
  vars: {x: 2}
"#;

    /// Not a configuration document.
    pub const SCALAR: &str = "just a string\n";
}

/// A temporary working directory for one test.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Adds a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Adds a role named `name` to the `roles/` repository.
    pub fn with_role(self, name: &str) -> Self {
        self.with_file(&format!("roles/{name}/meta/main.yml"), "---\ndependencies: []\n")
            .with_file(
                &format!("roles/{name}/tasks/main.yml"),
                "- debug: {msg: hello}\n",
            )
    }

    /// Installs a fake `ansible-playbook` into `bin/`. It prints its
    /// arguments and the structured-output variable, then exits with
    /// `$FAKE_EXIT` (default 0).
    pub fn with_fake_executor(self) -> Self {
        let script = "#!/usr/bin/env bash\n\
                      echo \"playbook-args: $*\"\n\
                      echo \"structured=${NSBL_STRUCTURED_OUTPUT:-0}\"\n\
                      exit \"${FAKE_EXIT:-0}\"\n";
        let fixture = self.with_file("bin/ansible-playbook", script);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                fixture.path().join("bin/ansible-playbook"),
                std::fs::Permissions::from_mode(0o755),
            )
            .expect("Failed to make the fake executor executable");
        }
        fixture
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, path: &str) -> PathBuf {
        self.temp_dir.path().join(path)
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A command running in this fixture's directory, with colors and
    /// environment overrides from the caller's shell disabled.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nsbl");
        cmd.current_dir(self.path())
            .env_remove("NSBL_CONFIG")
            .env_remove("NSBL_CACHE")
            .env_remove("RUST_LOG")
            .arg("--color")
            .arg("never");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
