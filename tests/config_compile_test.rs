//! Compilation tests driven by the fixtures in `tests/testdata/configs`.
//!
//! Every `<name>.nsbl.yml` is compiled with the default compiler
//! configuration and checked against `<name>.expected.yml`, which holds
//! either the expected outcome:
//!
//! ```yaml
//! environments:
//!   - name: localhost
//!     kind: host
//!     tasks: [...]   # rendered executor tasks
//! hosts: [localhost]
//! groups: []
//! ```
//!
//! or the expected failure as `error: <ErrorKind>`.

use std::path::{Path, PathBuf};

use nsbl::config::{CompilerConfig, RenderOptions};
use nsbl::context::CompileContext;
use nsbl::phases::orchestrator;
use serde::Deserialize;
use serde_yaml::Value;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expected {
    Failure {
        error: String,
    },
    Success {
        environments: Vec<ExpectedEnvironment>,
        hosts: Vec<String>,
        groups: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
struct ExpectedEnvironment {
    name: String,
    kind: String,
    tasks: Value,
}

fn expected_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().replace(".nsbl.yml", ".expected.yml"))
        .unwrap_or_default();
    path.with_file_name(name)
}

fn test_config_compiles(path: &Path) -> datatest_stable::Result<()> {
    let expected_file = expected_path(path);
    let expected: Expected = serde_yaml::from_str(&std::fs::read_to_string(&expected_file)?)
        .map_err(|e| format!("Failed to parse {}: {}", expected_file.display(), e))?;

    let mut ctx = CompileContext::new(CompilerConfig::default())?;
    let result = orchestrator::compile(&mut ctx, &[path.display().to_string()]);

    match (expected, result) {
        (Expected::Failure { error }, Err(e)) => {
            assert_eq!(format!("{:?}", e.kind()), error, "{}: {}", path.display(), e);
        }
        (Expected::Failure { error }, Ok(_)) => {
            return Err(format!("{}: expected {} but compilation succeeded", path.display(), error).into());
        }
        (Expected::Success { .. }, Err(e)) => {
            return Err(format!("{}: compilation failed: {}", path.display(), e).into());
        }
        (
            Expected::Success {
                environments,
                hosts,
                groups,
            },
            Ok(model),
        ) => {
            let actual_hosts: Vec<&str> = model.inventory.hosts().map(|h| h.name.as_str()).collect();
            let actual_groups: Vec<&str> = model.inventory.groups().map(|g| g.name.as_str()).collect();
            assert_eq!(actual_hosts, hosts, "hosts of {}", path.display());
            assert_eq!(actual_groups, groups, "groups of {}", path.display());

            assert_eq!(
                model.environments.len(),
                environments.len(),
                "environments of {}",
                path.display()
            );
            for (actual, expected) in model.environments.iter().zip(&environments) {
                assert_eq!(actual.name, expected.name);
                assert_eq!(actual.kind.to_string(), expected.kind);
                assert_eq!(
                    actual.tasklist.render_tasks(),
                    expected.tasks,
                    "tasks of '{}' in {}",
                    actual.name,
                    path.display()
                );
            }

            let staged = orchestrator::stage(&model, &RenderOptions::new("unused"))?;
            assert!(staged.exists("run_all_plays.sh"));
            assert!(staged.exists("plays/all_plays.yml"));
            for env in &model.environments {
                assert!(staged.exists(format!("plays/{}", env.playbook_name())));
            }
        }
    }
    Ok(())
}

datatest_stable::harness!(test_config_compiles, "tests/testdata/configs", r".*\.nsbl\.yml$");
