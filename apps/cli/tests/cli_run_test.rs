//! Dry-run integration tests for the train, deploy, run, status, and cleanup commands.
//!
//! `--dry-run` swaps in the in-memory control plane, so these exercise the
//! full command flow and the run manifest without reaching the platform.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn peft(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("peft-cli").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("PEFT_PROJECT_ID", "test-project")
        .env("PEFT_BUCKET_URI", "gs://test-bucket")
        .env("HF_TOKEN", "hf_test")
        .env_remove("PEFT_ACCESS_TOKEN")
        .env_remove("PEFT_API_BASE_URL");
    cmd
}

fn manifests(dir: &Path) -> Vec<serde_json::Value> {
    let runs = dir.join(".peft").join("runs");
    if !runs.exists() {
        return Vec::new();
    }
    std::fs::read_dir(runs)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path().join("run_manifest.json");
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
        })
        .collect()
}

#[test]
fn test_run_end_to_end_dry_run() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["--dry-run", "run", "--temperature", "0.7", "--top-p", "0.9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("JOB_STATE_SUCCEEDED"))
        .stdout(predicate::str::contains("(dry run) no model was called"))
        .stdout(predicate::str::contains("Cleaned up run"));

    let runs = manifests(temp_dir.path());
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert!(run["job_name"].is_null());
    assert!(run["model_name"].is_null());
    assert!(run["endpoint_name"].is_null());
    assert_eq!(run["job_state"], "JOB_STATE_SUCCEEDED");
    assert_eq!(run["training_allocation"]["machine_type"], "a2-ultragpu-1g");
    assert_eq!(run["serving_allocation"]["machine_type"], "g2-standard-12");
}

#[test]
fn test_run_keep_leaves_resources_recorded() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["--dry-run", "run", "--temperature", "1.0", "--top-p", "1.0", "--keep"])
        .assert()
        .success()
        .stdout(predicate::str::contains("peft cleanup"));

    let runs = manifests(temp_dir.path());
    assert_eq!(runs.len(), 1);
    assert!(runs[0]["endpoint_name"].as_str().unwrap().contains("/endpoints/"));
    assert!(runs[0]["model_name"].as_str().unwrap().contains("/models/"));
    assert!(runs[0]["job_name"].as_str().unwrap().contains("/customJobs/"));
}

#[test]
fn test_run_without_sampling_params_creates_nothing() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["--dry-run", "run", "--top-p", "1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("temperature is required"));

    assert!(manifests(temp_dir.path()).is_empty());
}

#[test]
fn test_run_rejects_detach() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["--dry-run", "run", "--detach", "--temperature", "1.0", "--top-p", "1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--detach"));
}

#[test]
fn test_train_requires_hf_token() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .env_remove("HF_TOKEN")
        .args(["--dry-run", "train"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HF_TOKEN"));

    assert!(manifests(temp_dir.path()).is_empty());
}

#[test]
fn test_train_requires_project() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .env_remove("PEFT_PROJECT_ID")
        .args(["--dry-run", "train"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project_id"));
}

#[test]
fn test_train_rejects_invalid_hyperparameters() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["--dry-run", "train", "--max-steps", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid fine-tune request"));
}

#[test]
fn test_train_deploy_predict_cleanup_stage_by_stage() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["--dry-run", "train", "--accelerator", "NVIDIA_H100_80GB", "--precision", "float16"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Training complete"))
        .stdout(predicate::str::contains("gs://test-bucket/"));

    let runs = manifests(temp_dir.path());
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["training_allocation"]["machine_type"], "a3-highgpu-2g");
    assert!(runs[0]["artifact"]["merged_model_dir"].as_str().unwrap().ends_with("/merged-model"));

    peft(&temp_dir)
        .args(["--dry-run", "deploy", "--accelerator", "NVIDIA_A100_80GB"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Model deployed"));

    let runs = manifests(temp_dir.path());
    assert_eq!(runs[0]["serving_allocation"]["machine_type"], "a2-ultragpu-1g");
    assert!(runs[0]["endpoint_name"].is_string());
    assert!(runs[0]["deployed_model_id"].is_string());

    peft(&temp_dir)
        .args(["--dry-run", "predict", "What is a car?", "--temperature", "1.0", "--top-p", "1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(dry run) no model was called"));

    peft(&temp_dir)
        .args(["--dry-run", "cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted"))
        .stdout(predicate::str::contains("already gone").not());

    let runs = manifests(temp_dir.path());
    assert!(runs[0]["job_name"].is_null());
    assert!(runs[0]["model_name"].is_null());
    assert!(runs[0]["endpoint_name"].is_null());

    peft(&temp_dir)
        .args(["--dry-run", "cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to delete"));
}

#[test]
fn test_deploy_after_detached_train() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["--dry-run", "train", "--detach"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Training job submitted"));
    assert!(manifests(temp_dir.path())[0]["job_state"].is_null());

    peft(&temp_dir).args(["--dry-run", "deploy"]).assert().success();

    let runs = manifests(temp_dir.path());
    assert_eq!(runs[0]["job_state"], "JOB_STATE_SUCCEEDED");
    assert!(runs[0]["endpoint_name"].is_string());
}

#[test]
fn test_run_id_cannot_leave_the_runs_directory() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["--dry-run", "cleanup", "--run", "../.."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid run id"));
}

#[test]
fn test_predict_without_endpoint_fails() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir).args(["--dry-run", "train"]).assert().success();

    peft(&temp_dir)
        .args(["--dry-run", "predict", "What is a car?", "--temperature", "1.0", "--top-p", "1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no endpoint"));
}

#[test]
fn test_deploy_without_runs_fails() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["--dry-run", "deploy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("peft train"));
}

#[test]
fn test_status_lists_runs() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No runs yet"));

    peft(&temp_dir).args(["--dry-run", "train"]).assert().success();

    let assert = peft(&temp_dir).args(["status", "--json"]).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("status --json should print JSON");
    let runs = json.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["base_model"], "meta-llama/Meta-Llama-3-8B");
}

#[test]
fn test_status_skips_corrupt_manifest() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir).args(["--dry-run", "train"]).assert().success();

    let broken = temp_dir.path().join(".peft").join("runs").join("broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("run_manifest.json"), "{ not json").unwrap();

    let assert = peft(&temp_dir).args(["status", "--json"]).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
}
