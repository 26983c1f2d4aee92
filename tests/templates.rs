use assert_cmd::Command;
use std::fs;

fn llm(temp: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("llm").unwrap();
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.path().join(".config"))
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .args(["--provider", "mock"]);
    cmd
}

#[test]
fn inline_template_with_argument() {
    let temp = tempfile::tempdir().unwrap();
    llm(&temp)
        .args(["Say hello in {{language}}", "French"])
        .assert()
        .success()
        .stdout("[stub answer] Say hello in French\n");
}

#[test]
fn prompt_file_contents_are_sent() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("prompt.txt"), "Tell me a joke").unwrap();
    llm(&temp)
        .arg("prompt.txt")
        .assert()
        .success()
        .stdout("[stub answer] Tell me a joke\n");
}

#[test]
fn template_file_with_two_arguments() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("prompt_template.txt"), "Translate {{text}} into {{language}}").unwrap();
    llm(&temp)
        .args(["prompt_template.txt", "good morning", "Italian"])
        .assert()
        .success()
        .stdout("[stub answer] Translate good morning into Italian\n");
}

#[test]
fn single_variable_template_reads_stdin() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("summarize.txt"), "Summarize: {{input}}").unwrap();
    llm(&temp)
        .arg("summarize.txt")
        .write_stdin("input text")
        .assert()
        .success()
        .stdout("[stub answer] Summarize: input text\n");
}

#[test]
fn file_arguments_are_expanded_individually() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("a.txt"), "alpha").unwrap();
    fs::write(temp.path().join("b.txt"), "beta").unwrap();
    llm(&temp)
        .args(["Compare {{x}} with {{y}}", "a.txt", "b.txt"])
        .assert()
        .success()
        .stdout("[stub answer] Compare alpha with beta\n");
}

#[test]
fn dash_argument_reads_stdin() {
    let temp = tempfile::tempdir().unwrap();
    llm(&temp)
        .args(["{{lang}}: {{text}}", "German", "-"])
        .write_stdin("piped")
        .assert()
        .success()
        .stdout("[stub answer] German: piped\n");
}

#[test]
fn repeated_variable_takes_one_argument_per_marker() {
    let temp = tempfile::tempdir().unwrap();
    llm(&temp)
        .args(["{{animal}} or {{animal}}?", "cats", "dogs"])
        .assert()
        .success()
        .stdout("[stub answer] cats or dogs?\n");
}

#[test]
fn literal_prompt_ignores_extra_arguments() {
    let temp = tempfile::tempdir().unwrap();
    llm(&temp)
        .args(["Just say hello", "unused"])
        .assert()
        .success()
        .stdout("[stub answer] Just say hello\n");
}
