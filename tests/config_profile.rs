use assert_cmd::Command;
use predicates::str::contains;
use std::fs;

fn write_config(temp: &tempfile::TempDir, body: &str) {
    let dir = temp.path().join(".config").join("llm-runner");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), body).unwrap();
}

fn llm(temp: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("llm").unwrap();
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.path().join(".config"))
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn uses_provider_from_default_profile() {
    let temp = tempfile::tempdir().unwrap();
    write_config(
        &temp,
        r#"
default_profile = "default"

[profiles.default]
provider = "mock"
model = "mock-small"
"#,
    );
    llm(&temp)
        .arg("Hello")
        .assert()
        .success()
        .stdout("[stub answer] Hello\n");
}

#[test]
fn named_profile_and_model_logged() {
    let temp = tempfile::tempdir().unwrap();
    write_config(
        &temp,
        r#"
[profiles.offline]
provider = "mock"
model = "mock-large"
"#,
    );
    llm(&temp)
        .args(["-v", "--profile", "offline", "Hello"])
        .assert()
        .success()
        .stderr(contains("mock-large"));
}

#[test]
fn unknown_profile_fails() {
    let temp = tempfile::tempdir().unwrap();
    write_config(&temp, "[profiles.default]\nprovider = \"mock\"\n");
    llm(&temp)
        .args(["--profile", "missing", "Hello"])
        .assert()
        .code(1)
        .stderr(contains("profile not found: missing"));
}

#[test]
fn broken_config_is_a_user_error() {
    let temp = tempfile::tempdir().unwrap();
    write_config(&temp, "default_profile = [not toml");
    llm(&temp)
        .args(["--provider", "mock", "Hello"])
        .assert()
        .code(1)
        .stderr(contains("config.toml"));
}

#[test]
fn dotfile_key_is_accepted() {
    // The key is found, so the run gets past credential lookup and fails later on
    // the missing prompt file instead of with exit code 3.
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join(".openai-api-key.txt"), "sk-test\n").unwrap();
    llm(&temp)
        .arg("./missing.txt")
        .assert()
        .code(1)
        .stderr(contains("missing.txt"));
}

#[test]
fn unreadable_config_is_a_user_error() {
    let temp = tempfile::tempdir().unwrap();
    fs::create_dir_all(temp.path().join(".config/llm-runner/config.toml")).unwrap();
    llm(&temp)
        .args(["--provider", "mock", "Hello"])
        .assert()
        .code(1)
        .stderr(contains("config.toml"));
}
