//! End-to-end tests for the `create` command.

mod common;
use common::prelude::*;

#[test]
fn test_create_renders_environment() {
    let fixture = TestFixture::new().with_file("env.yml", configs::APT);

    fixture
        .command()
        .args(["create", "env.yml", "--output", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rendered 1 environment(s)"));

    fixture.child("out/inventory/hosts").assert(predicate::path::is_file());
    fixture.child("out/plays/all_plays.yml").assert(predicate::path::is_file());
    fixture.child("out/plays/ansible.cfg").assert(predicate::str::contains("roles_path"));
    fixture
        .child("out/plays/play_localhost_0.yml")
        .assert(predicate::str::contains("zile"));
    fixture
        .child("out/run_all_plays.sh")
        .assert(predicate::str::contains("ansible-playbook"));
}

#[test]
fn test_create_copies_internal_roles() {
    let fixture = TestFixture::new()
        .with_role("ansiblebit.oracle-java")
        .with_file("env.yml", configs::WITH_ROLE);

    fixture
        .command()
        .args(["create", "env.yml", "-o", "out", "--role-repo", "roles"])
        .assert()
        .success();

    fixture
        .child("out/roles/internal/ansiblebit.oracle-java/tasks/main.yml")
        .assert(predicate::str::contains("hello"));
    fixture
        .child("out/plays/play_localhost_0.yml")
        .assert(predicate::str::contains("include_role"));
}

#[test]
fn test_create_unknown_role_fails_with_hint() {
    let fixture = TestFixture::new().with_file("env.yml", configs::WITH_ROLE);

    fixture
        .command()
        .args(["create", "env.yml", "-o", "out"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ansiblebit.oracle-java"))
        .stderr(predicate::str::contains("hint:"));

    fixture.child("out").assert(predicate::path::missing());
}

#[test]
fn test_create_existing_target_needs_force() {
    let fixture = TestFixture::new()
        .with_file("env.yml", configs::APT)
        .with_file("out/stale.txt", "old");

    fixture
        .command()
        .args(["create", "env.yml", "-o", "out"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--force"));
    fixture.child("out/stale.txt").assert(predicate::path::exists());

    fixture
        .command()
        .args(["create", "env.yml", "-o", "out", "--force"])
        .assert()
        .success();
    fixture.child("out/stale.txt").assert(predicate::path::missing());
    fixture.child("out/run_all_plays.sh").assert(predicate::path::exists());
}

#[test]
fn test_create_extracts_vars() {
    let fixture = TestFixture::new().with_file("env.yml", configs::INVENTORY);

    fixture
        .command()
        .args(["create", "env.yml", "-o", "out", "--extract-vars"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rendered 2 environment(s)"));

    fixture
        .child("out/inventory/group_vars/web/web.yml")
        .assert(predicate::str::contains("http_port"));
}

#[test]
fn test_create_reads_config_file() {
    let fixture = TestFixture::new()
        .with_role("ansiblebit.oracle-java")
        .with_file("nsbl.yml", "role-repos: [roles]\n")
        .with_file("env.yml", configs::WITH_ROLE);

    fixture
        .command()
        .args(["create", "env.yml", "-o", "out"])
        .assert()
        .success();
    fixture
        .child("out/roles/internal/ansiblebit.oracle-java/meta/main.yml")
        .assert(predicate::path::is_file());
}

#[test]
fn test_create_missing_config_file() {
    let fixture = TestFixture::new().with_file("env.yml", configs::APT);

    fixture
        .command()
        .args(["create", "env.yml", "-o", "out", "--config", "missing.yml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Compiler configuration not found"));
}

#[test]
fn test_create_remote_source_denied() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["create", "gh:user/repo/env.yml", "-o", "out"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--allow-remote"));
}

#[test]
fn test_create_malformed_document() {
    let fixture = TestFixture::new().with_file("env.yml", configs::SCALAR);

    fixture
        .command()
        .args(["create", "env.yml", "-o", "out"])
        .assert()
        .code(1);
}

#[test]
fn test_create_inventory_conflict() {
    let fixture = TestFixture::new().with_file("env.yml", configs::CONFLICT);

    fixture
        .command()
        .args(["create", "env.yml", "-o", "out"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("h1"));
}
