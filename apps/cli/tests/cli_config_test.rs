//! Integration tests for `peft config show` and layered configuration.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn peft(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("peft-cli").unwrap();
    cmd.current_dir(dir.path()).env("HOME", dir.path());
    for key in [
        "PEFT_PROJECT_ID",
        "PEFT_REGION",
        "PEFT_BUCKET_URI",
        "PEFT_SERVICE_ACCOUNT",
        "PEFT_ACCESS_TOKEN",
        "PEFT_API_BASE_URL",
        "HF_TOKEN",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_config_show_redacts_secrets() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .env("PEFT_PROJECT_ID", "my-project")
        .env("PEFT_BUCKET_URI", "gs://my-bucket")
        .env("PEFT_ACCESS_TOKEN", "ya29.very-secret")
        .env("HF_TOKEN", "hf_very_secret")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("my-project"))
        .stdout(predicate::str::contains("us-central1"))
        .stdout(predicate::str::contains("very-secret").not())
        .stdout(predicate::str::contains("hf_very_secret").not());
}

#[test]
fn test_config_show_reports_incomplete_configuration() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Incomplete:"))
        .stdout(predicate::str::contains("project_id"));
}

#[test]
fn test_local_file_overrides_global_and_flags_override_both() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join(".peft")).unwrap();
    std::fs::write(
        temp_dir.path().join(".peft").join("config.toml"),
        "project_id = \"global-project\"\nbucket_uri = \"gs://global-bucket\"\nregion = \"europe-west4\"\n",
    )
    .unwrap();
    std::fs::write(temp_dir.path().join(".peftrc"), "project_id = \"local-project\"\n").unwrap();

    let assert = peft(&temp_dir)
        .args(["--region", "us-east1", "config", "show", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("config show --json should print JSON");

    assert_eq!(json["config"]["project_id"], "local-project");
    assert_eq!(json["config"]["bucket_uri"], "gs://global-bucket");
    assert_eq!(json["config"]["region"], "us-east1");
    assert_eq!(json["config"]["api_base_url"], "https://us-east1-aiplatform.googleapis.com/v1");
    assert_eq!(json["access_token"], "not set");
    assert!(json["config"].get("access_token").is_none());
}

#[test]
fn test_bucket_must_be_a_gcs_uri() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .env("PEFT_PROJECT_ID", "p")
        .env("PEFT_BUCKET_URI", "s3://elsewhere")
        .env("HF_TOKEN", "hf")
        .args(["--dry-run", "train"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gs://"));
}
