use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::error::Error;
use std::path::Path;
use tempfile::tempdir;

fn placenet(dir: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("placenet")?;
    cmd.current_dir(dir);
    Ok(cmd)
}

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[test]
fn init_writes_config_once() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    placenet(tmp.path())?.arg("init").assert().success();

    let config = std::fs::read_to_string(tmp.path().join("placenet.toml"))?;
    assert!(config.contains("[network]"));
    assert!(config.contains("units = 100"));
    assert!(config.contains("[replay]"));

    placenet(tmp.path())?
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    placenet(tmp.path())?.args(["init", "--force"]).assert().success();
    Ok(())
}

#[test]
fn run_writes_trace_and_snapshot() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    placenet(tmp.path())?.arg("init").assert().success();
    placenet(tmp.path())?
        .args([
            "run",
            "--duration",
            "12",
            "--output",
            "out/trace.json",
            "--snapshot",
            "latest.json",
        ])
        .assert()
        .success();

    let report = read_json(&tmp.path().join("out/trace.json"))?;
    assert_eq!(report["ticks"], 1200);
    assert_eq!(report["interrupted"], false);
    assert_eq!(report["trace"].as_array().map(Vec::len), Some(1200));
    assert_eq!(report["trace"][0]["rates"].as_array().map(Vec::len), Some(100));

    // default scenario: reward from 8 s, so one episode starts and is still running
    let events = report["events"].as_array().cloned().unwrap_or_default();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], "Started");
    assert_eq!(events[0]["navigation"], "halt");
    assert_eq!(report["stats"]["episodes_started"], 1);

    let snapshot = read_json(&tmp.path().join("latest.json"))?;
    assert_eq!(snapshot["tick"], 1200);
    assert_eq!(snapshot["mode"], "replay");
    assert_eq!(snapshot["side"], 10);
    assert_eq!(snapshot["action_cells"].as_array().map(Vec::len), Some(4));
    Ok(())
}

#[test]
fn run_completes_episode() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    placenet(tmp.path())?
        .args(["run", "--duration", "20", "--output", "trace.json"])
        .assert()
        .success();

    let report = read_json(&tmp.path().join("trace.json"))?;
    let stats = &report["stats"];
    assert_eq!(stats["episodes_started"], 1);
    assert_eq!(stats["episodes_completed"], 1);
    assert_eq!(stats["replay_ticks"], 901);

    let events = report["events"].as_array().cloned().unwrap_or_default();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["navigation"], "return_to_base");
    assert!(events[1]["event"]["Completed"]["elapsed"].as_f64().unwrap_or(0.0) > 9.0);
    Ok(())
}

#[test]
fn topology_export() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    placenet(tmp.path())?
        .args(["topology", "--output", "weights.json"])
        .assert()
        .success();

    let report = read_json(&tmp.path().join("weights.json"))?;
    assert_eq!(report["side"], 10);
    let units = report["units"].as_array().cloned().unwrap_or_default();
    assert_eq!(units.len(), 100);

    // corner unit: three neighbours sharing the full row sum
    let corner = units[0]["neighbours"].as_object().cloned().unwrap_or_default();
    assert_eq!(corner.len(), 3);
    let sum: f64 = corner.values().filter_map(|n| n["weight"].as_f64()).sum();
    assert!((sum - 8.0).abs() < 1e-9);

    // interior unit: all eight slots
    assert_eq!(units[55]["neighbours"].as_object().map(|m| m.len()), Some(8));

    placenet(tmp.path())?
        .arg("topology")
        .assert()
        .success()
        .stdout(predicate::str::contains("Lattice: 10x10 (100 units)"));
    Ok(())
}

#[test]
fn invalid_config_is_rejected() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    std::fs::write(tmp.path().join("placenet.toml"), "[network]\nunits = 99\n")?;
    placenet(tmp.path())?
        .args(["run", "--duration", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Command failed"));

    std::fs::write(tmp.path().join("placenet.toml"), "[network]\ndt = 0.0\n")?;
    placenet(tmp.path())?
        .args(["run", "--duration", "1"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn explicit_config_and_seeded_readout() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = "[network]\nunits = 36\n\n[readout]\nsource = \"seeded\"\nseed = 7\n";
    std::fs::write(tmp.path().join("small.toml"), config)?;
    placenet(tmp.path())?
        .args([
            "--config",
            "small.toml",
            "run",
            "--duration",
            "0.5",
            "--snapshot",
            "s.json",
        ])
        .assert()
        .success();

    let snapshot = read_json(&tmp.path().join("s.json"))?;
    assert_eq!(snapshot["side"], 6);
    assert_eq!(snapshot["rates"].as_array().map(Vec::len), Some(36));
    Ok(())
}
