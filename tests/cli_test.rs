use std::fs;

use assert_cmd::Command;

fn cclexpect() -> Command {
    let mut cmd = Command::cargo_bin("cclexpect").expect("binary is built");
    cmd.env_remove("CCLEXPECT_PASSWORD");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let output = cclexpect().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["compile", "compile-dynamic", "execute", "drop", "upload", "run"] {
        assert!(stdout.contains(sub), "help should mention {sub}: {stdout}");
    }
}

#[test]
fn test_compile_rejects_wrong_extension() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("orders.txt");
    fs::write(&source, "drop program orders go\n").unwrap();

    let output = cclexpect()
        .args(["--host", "node1", "--user", "d_build", "compile"])
        .arg(&source)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("must have a .prg extension"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn test_missing_host_is_reported() {
    let output = cclexpect().args(["drop", "orders"]).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("a host is required"), "unexpected stderr: {stderr}");
}

#[test]
fn test_plan_file_errors_name_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let plan = dir.path().join("deploy.plan");
    fs::write(&plan, "# deploy\ndrop \"orders\"\nfrobnicate \"x\"\n").unwrap();

    let output = cclexpect()
        .args(["--host", "node1", "--user", "d_build", "run"])
        .arg(&plan)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 3"), "unexpected stderr: {stderr}");
}

#[test]
fn test_bad_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("cclexpect.toml");
    fs::write(&config, "hots = \"node1\"\n").unwrap();

    let output = cclexpect()
        .arg("--config")
        .arg(&config)
        .args(["drop", "orders"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to load config file"),
        "unexpected stderr: {stderr}"
    );
}
