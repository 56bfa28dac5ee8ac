use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

/// Command isolated from any user config file.
fn toolgate(temp: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("toolgate"));
    cmd.env_remove("TOOLGATE_SANDBOX")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(temp.path().join("missing.toml"))
        .arg("--sandbox")
        .arg(temp.path());
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("toolgate"));
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("Toolgate"));
}

#[test]
fn test_classify_wrapped_command() {
    let temp = TempDir::new().unwrap();
    toolgate(&temp)
        .args(["classify", "bash", "-c", "git push"])
        .assert()
        .success()
        .stdout("dangerous\n");
}

#[test]
fn test_classify_json() {
    let temp = TempDir::new().unwrap();
    toolgate(&temp)
        .args(["--format", "json", "classify", "ls", "|", "wc"])
        .assert()
        .success()
        .stdout(contains("\"classification\": \"inscrutable\""));
}

#[test]
fn test_strict_read_outside_sandbox_is_denied() {
    let temp = TempDir::new().unwrap();
    toolgate(&temp)
        .args(["read", "/etc/hosts"])
        .assert()
        .code(1)
        .stdout(contains("outside the sandbox"));
}

#[test]
fn test_permissive_write_prompts_on_stdin() {
    let temp = TempDir::new().unwrap();
    toolgate(&temp)
        .args(["--mode", "permissive", "write", "/tmp/toolgate-out.txt"])
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(contains("allowed"))
        .stderr(contains("outside the sandbox"));
}

#[test]
fn test_shell_denied_when_input_closes() {
    let temp = TempDir::new().unwrap();
    toolgate(&temp)
        .args(["shell", "--", "git", "push"])
        .write_stdin("")
        .assert()
        .code(1)
        .stdout(contains("authorization denied"));
}

#[test]
fn test_blocked_command_never_prompts() {
    let temp = TempDir::new().unwrap();
    toolgate(&temp)
        .args(["--mode", "permissive", "shell", "curl", "example.com"])
        .assert()
        .code(1)
        .stdout(contains("command is blocked"));
}

#[test]
fn test_empty_shell_script_is_input_error() {
    let temp = TempDir::new().unwrap();
    toolgate(&temp)
        .args(["shell", "bash", "-c", " "])
        .assert()
        .code(2)
        .stderr(contains("empty command"));
}

#[test]
fn test_config_prints_defaults() {
    let temp = TempDir::new().unwrap();
    toolgate(&temp)
        .arg("config")
        .assert()
        .success()
        .stdout(contains("mode = \"strict\""));
}
