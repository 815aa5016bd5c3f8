mod common;

use assert_cmd::Command;

const CONFIG: &str = "\
pyramid: { number: 1, scalefactor: 2, windowsize: 8 }
slider: { number: 2, step: 8, window: { width: 8, height: 8 } }
roi: { number: 2, bundle: bundle.yaml }
output: { folder: out }
";

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("roimill --help"));
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.arg("-V");
    cmd.assert().success().stdout("roimill 0.1.0\n");
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("mill"))
        .stdout(predicates::str::contains("thresh"))
        .stdout(predicates::str::contains("run"));
}

// Run subcommand tests

#[test]
fn run_missing_config_fails() {
    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.args(["run", "nonexistent/roimill.yaml"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("missing"));
}

#[test]
fn run_invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(dir.path(), "pyramid: [1, 2\n");

    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.arg("run").arg(&config);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Failed to parse configuration"));
}

#[test]
fn run_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(dir.path(), CONFIG);
    common::write_bundle(dir.path(), "max", 5.0);

    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.arg("run").arg(&config).arg(dir.path().join("absent.txt"));
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("absent.txt"));
}

#[test]
fn run_missing_bundle_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(dir.path(), CONFIG);
    let source = dir.path().join("scan.txt");
    common::write_grid(&source, &common::grid(32, 32, |_, _| 1.0));

    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.arg("run").arg(&config).arg(&source);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("bundle.yaml"));
}

#[test]
fn run_rejects_unknown_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(dir.path(), CONFIG);

    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.arg("run").arg(&config).args(["--mode", "sparkle"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("sparkle"));
}

#[test]
fn run_writes_rendered_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(dir.path(), CONFIG);
    common::write_bundle(dir.path(), "max", 5.0);
    let source = dir.path().join("scan.txt");
    common::write_grid(
        &source,
        &common::grid(32, 32, |x, y| if (8..16).contains(&x) && (8..16).contains(&y) { 9.0 } else { 1.0 }),
    );

    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.arg("run").arg(&config).arg(&source).args(["--mode", "enhance"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains(".txt"));

    let out_dir = dir.path().join("out");
    let outputs: Vec<_> = std::fs::read_dir(&out_dir).unwrap().collect();
    assert_eq!(outputs.len(), 1);
    let rendered = roimill::roi::read_dataset(&outputs[0].as_ref().unwrap().path()).unwrap();
    // Found at three pyramid levels, so the hot block is enhanced three times
    assert_eq!(rendered.get(10, 10), Some(30.375));
    assert_eq!(rendered.get(0, 0), Some(2.25));
    assert_eq!(rendered.get(31, 31), Some(1.0));
}

// Thresh subcommand tests

#[test]
fn thresh_without_a_mill_fails() {
    let dir = tempfile::tempdir().unwrap();
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let yaml = format!(
        "{CONFIG}ingestor:\n  sink: {{ hostname: 127.0.0.1, port: {port} }}\nresolver: {{ timeout_ms: 300 }}\n"
    );
    let config = common::write_config(dir.path(), &yaml);
    let source = dir.path().join("scan.txt");
    common::write_grid(&source, &common::grid(8, 8, |_, _| 1.0));

    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.arg("thresh").arg(&config).arg(&source);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Unable to find remote system sink"));
}

#[test]
fn thresh_missing_input_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(dir.path(), CONFIG);

    let mut cmd = Command::cargo_bin("roimill").unwrap();
    cmd.arg("thresh").arg(&config).arg(dir.path().join("absent.txt"));
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("absent.txt"));
}
