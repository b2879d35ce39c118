//! Integration tests for the `peft resolve` command.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn peft(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("peft-cli").unwrap();
    cmd.current_dir(dir.path()).env("HOME", dir.path());
    for key in ["PEFT_PROJECT_ID", "PEFT_BUCKET_URI", "PEFT_ACCESS_TOKEN", "HF_TOKEN"] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_resolve_small_model_on_a100_quantized() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["resolve", "--model", "meta-llama/Meta-Llama-3-8B", "--accelerator", "NVIDIA_A100_80GB"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a2-ultragpu-1g"))
        .stdout(predicate::str::contains("g2-standard-12"));
}

#[test]
fn test_resolve_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let assert = peft(&temp_dir)
        .args([
            "resolve",
            "--model",
            "meta-llama/Meta-Llama-3-70B-Instruct",
            "--accelerator",
            "NVIDIA_H100_80GB",
            "--precision",
            "float16",
            "--serving-accelerator",
            "NVIDIA_A100_80GB",
            "--json",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("resolve --json should print JSON");
    assert_eq!(json["size_class"], "large");
    assert_eq!(json["training"]["machine_type"], "a3-highgpu-8g");
    assert_eq!(json["training"]["accelerator_count"], 8);
    assert_eq!(json["serving"]["machine_type"], "a2-ultragpu-4g");
    assert_eq!(json["serving"]["accelerator_type"], "NVIDIA_A100_80GB");
}

#[test]
fn test_resolve_needs_no_configuration() {
    // No project, bucket, or tokens are set in this environment.
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir).args(["resolve", "--model", "meta-llama/Meta-Llama-3-8B"]).assert().success();
}

#[test]
fn test_resolve_rejects_unknown_accelerator() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["resolve", "--model", "meta-llama/Meta-Llama-3-8B", "--accelerator", "TPU_V5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported accelerator type"));
}

#[test]
fn test_resolve_large_model_cannot_train_on_l4() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["resolve", "--model", "meta-llama/Meta-Llama-3-70B", "--accelerator", "NVIDIA_L4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported configuration"));
}

#[test]
fn test_resolve_rejects_unknown_model() {
    let temp_dir = TempDir::new().unwrap();
    peft(&temp_dir)
        .args(["resolve", "--model", "mistralai/Mistral-7B"])
        .assert()
        .failure();
}
