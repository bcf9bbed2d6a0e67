//! Usage behaviour of the `fmriqc` binary.

use std::process::Command;

use tempfile::TempDir;

fn fmriqc(dir: &TempDir, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_fmriqc"))
        .args(args)
        .current_dir(dir.path())
        .env_remove("FMRIQC_CONFIG")
        .output()
        .expect("Failed to start fmriqc")
}

fn is_empty_dir(dir: &TempDir) -> bool {
    std::fs::read_dir(dir.path()).unwrap().next().is_none()
}

#[test]
fn test_no_arguments_prints_usage() {
    let dir = TempDir::new().unwrap();
    let output = fmriqc(&dir, &[]);

    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout).to_string()
        + &String::from_utf8_lossy(&output.stderr);
    assert!(text.contains("Usage"));
    assert!(is_empty_dir(&dir));
}

#[test]
fn test_missing_positional_prints_usage() {
    let dir = TempDir::new().unwrap();
    for args in [&["run"][..], &["run", "bold.nii.gz"][..], &["batch"][..], &["aggregate"][..]] {
        let output = fmriqc(&dir, args);
        assert!(output.status.success(), "{:?}", args);
        assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
    }
    assert!(is_empty_dir(&dir));
}

#[test]
fn test_missing_input_is_reported_without_failing() {
    let dir = TempDir::new().unwrap();
    let output = fmriqc(&dir, &["run", "missing_bold.nii.gz", "qc"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("missing_bold.nii.gz"));
    assert!(!dir.path().join("qc").exists());
}

#[test]
fn test_unknown_sample_type_fails() {
    let dir = TempDir::new().unwrap();
    let output = fmriqc(&dir, &["run", "bold.nii.gz", "qc", "banana"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("banana"));
}
