use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use tempfile::tempdir;

#[derive(Deserialize)]
struct CalibrateOutput {
    device: String,
    decision: String,
    points: usize,
    plot: Option<String>,
}

fn config_path() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .join("test_data/fast_session.toml")
        .to_string_lossy()
        .to_string()
}

#[test]
fn calibrate_accepts_and_plots() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let plot = dir.path().join("accuracy.png");
    let mut cmd = cargo_bin_cmd!("eyelab");
    cmd.args([
        "calibrate",
        "--config",
        &config_path(),
        "--keys",
        "space,a",
        "--plot",
        plot.to_str().unwrap(),
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: CalibrateOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.device, "TX120-203-81900130");
    assert_eq!(value.decision, "accept");
    assert_eq!(value.points, 5);
    assert!(value.plot.is_some());
    assert!(plot.metadata()?.len() > 0);
    Ok(())
}

#[test]
fn escape_aborts_calibration() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("eyelab");
    cmd.args(["calibrate", "--config", &config_path(), "--keys", "space,escape"]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: CalibrateOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.decision, "abort");
    assert!(value.plot.is_none());
    Ok(())
}

#[test]
fn too_old_unit_fails_activation() {
    let mut cmd = cargo_bin_cmd!("eyelab");
    cmd.args([
        "calibrate",
        "--config",
        &config_path(),
        "--keys",
        "space,a",
        "--sim-too-old",
    ]);
    let out = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8_lossy(&out);
    assert!(stderr.contains("too old"));
}

#[test]
fn devices_lists_the_simulated_unit() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("eyelab");
    cmd.args(["devices", "--config", &config_path()]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let first = out
        .split(|b| *b == b'\n')
        .find(|line| !line.is_empty())
        .expect("one device line");
    let device: serde_json::Value = serde_json::from_slice(first)?;
    assert_eq!(device["product_id"], "TX120-203-81900130");
    assert_eq!(device["model"], "Tobii X120");
    Ok(())
}
