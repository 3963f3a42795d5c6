//! End-to-end tests for `list-groups`, `list-hosts` and `list-tasks`.

mod common;
use common::prelude::*;

#[test]
fn test_list_groups() {
    let fixture = TestFixture::new().with_file("env.yml", configs::INVENTORY);

    fixture
        .command()
        .args(["list-groups", "env.yml"])
        .assert()
        .success()
        .stdout("web: w1, w2\n");
}

#[test]
fn test_list_hosts() {
    let fixture = TestFixture::new().with_file("env.yml", configs::INVENTORY);

    fixture
        .command()
        .args(["list-hosts", "env.yml"])
        .assert()
        .success()
        .stdout("db1\nw1 (web)\nw2 (web)\n");
}

#[test]
fn test_list_hosts_of_task_list_is_default_host() {
    let fixture = TestFixture::new().with_file("env.yml", configs::APT);

    fixture
        .command()
        .args(["list-hosts", "env.yml"])
        .assert()
        .success()
        .stdout("localhost\n");
}

#[test]
fn test_list_hosts_with_default_env_name() {
    let fixture = TestFixture::new().with_file("env.yml", configs::APT);

    fixture
        .command()
        .args(["list-hosts", "env.yml", "--default-env", "devbox"])
        .assert()
        .success()
        .stdout("devbox\n");
}

#[test]
fn test_list_tasks_tree() {
    let fixture = TestFixture::new().with_file("env.yml", configs::APT_UPPERCASE);

    fixture
        .command()
        .args(["list-tasks", "env.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("localhost (host)"))
        .stdout(predicate::str::contains("APT: apt [module]"));
}

#[test]
fn test_list_tasks_with_role_origin() {
    let fixture = TestFixture::new()
        .with_role("ansiblebit.oracle-java")
        .with_file("env.yml", configs::WITH_ROLE);

    fixture
        .command()
        .args(["list-tasks", "env.yml", "-r", "roles"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "ansiblebit.oracle-java [role, internal, include_role]",
        ));
}

#[test]
fn test_list_requires_sources() {
    let fixture = TestFixture::new();

    fixture.command().arg("list-groups").assert().code(2);
}
