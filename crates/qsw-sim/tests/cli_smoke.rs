use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::{Mutex, MutexGuard};

/// Tests in this file write executables, so spawns are serialised to keep a
/// forked child from holding a script open for writing (ETXTBSY).
fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn qsw_sim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_qsw-sim"))
}

#[test]
fn plan_command_writes_loadable_plan() {
    let _guard = serial();
    let dir = tempfile::tempdir().expect("tmp");
    let out = dir.path().join("plans").join("sweep.yaml");
    let status = qsw_sim()
        .args(["plan", "--out"])
        .arg(&out)
        .args(["--start", "8", "--end", "16", "--mode", "2", "--concurrency", "2"])
        .status()
        .expect("spawn");
    assert!(status.success());
    let plan = qsw_exp::load_plan(&out).expect("plan loads");
    assert_eq!(plan.parameters, qsw_core::ParameterRange::new(8, 16));
    assert_eq!(plan.modes, vec![qsw_core::Mode::NonUniform]);
    assert_eq!(plan.scheduler.concurrency, 2);
}

#[test]
fn plan_command_rejects_empty_range() {
    let _guard = serial();
    let dir = tempfile::tempdir().expect("tmp");
    let out = dir.path().join("sweep.yaml");
    let output = qsw_sim()
        .args(["plan", "--out"])
        .arg(&out)
        .args(["--start", "9", "--end", "3"])
        .output()
        .expect("spawn");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("empty_range"));
    assert!(!out.exists());
}

#[test]
fn parse_command_honours_marker() {
    let _guard = serial();
    let dir = tempfile::tempdir().expect("tmp");
    let capture = dir.path().join("stdout.txt");
    fs::write(
        &capture,
        "Number of command line arguments: 5\nTotal Error Sum: 4321\n",
    )
    .expect("write");

    let plain = qsw_sim().arg("parse").arg(&capture).output().expect("spawn");
    assert_eq!(String::from_utf8_lossy(&plain.stdout).trim(), "5");

    let anchored = qsw_sim()
        .arg("parse")
        .arg(&capture)
        .args(["--marker", "Total Error Sum:"])
        .output()
        .expect("spawn");
    assert_eq!(String::from_utf8_lossy(&anchored.stdout).trim(), "4321");
}

#[test]
fn parse_command_tolerates_invalid_utf8() {
    let _guard = serial();
    let dir = tempfile::tempdir().expect("tmp");
    let capture = dir.path().join("stdout.bin");
    let mut bytes = b"\xff\xfe garbage \xc3\n".to_vec();
    bytes.extend_from_slice(b"Total Error Sum: 88\n");
    fs::write(&capture, bytes).expect("write");

    let output = qsw_sim()
        .arg("parse")
        .arg(&capture)
        .args(["--marker", "Total Error Sum:"])
        .output()
        .expect("spawn");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "88");
}

#[cfg(unix)]
fn write_program(dir: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("quant.sh");
    fs::write(&path, "#!/bin/sh\necho \"Error: $(( $3 + $2 ))\"\n").expect("script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

#[cfg(unix)]
#[test]
fn run_command_writes_tables() {
    let _guard = serial();
    let dir = tempfile::tempdir().expect("tmp");
    let program = write_program(dir.path());
    let plan = dir.path().join("plan.yaml");
    fs::write(
        &plan,
        format!(
            "program: {}\ninput: img.rgb\nparameters: {{ start: 2, end: 5 }}\n",
            program.display()
        ),
    )
    .expect("plan");
    let out = dir.path().join("out");

    let output = qsw_sim()
        .args(["run", "--plan"])
        .arg(&plan)
        .arg("--out")
        .arg(&out)
        .args(["--concurrency", "2", "--combined"])
        .output()
        .expect("spawn");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let mode_two = fs::read_to_string(out.join("results_mode_2.csv")).expect("csv");
    assert_eq!(mode_two, "Buckets,Error\n2,10\n3,29\n4,66\n5,127\n");
    let combined = fs::read_to_string(out.join("results.csv")).expect("combined");
    assert_eq!(combined.lines().count(), 9);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mode 1 (uniform): 4 records, 4 measured"));
    assert!(stdout.contains("best 2 buckets -> 10"));
}
