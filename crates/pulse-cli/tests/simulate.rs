use assert_cmd::Command;
use serde_json::Value;
use std::{error::Error, fs};
use tempfile::tempdir;

#[test]
fn short_simulated_analysis_saves_nothing() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let history = dir.path().join("history");
    let out = Command::cargo_bin("pulse")?
        .args([
            "simulate-analysis",
            "--bpm",
            "60",
            "--duration-ms",
            "1000",
            "--history",
            history.to_str().unwrap(),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&out)?;
    assert_eq!(value["status"], "insufficient-data");
    assert!(value["ppi_count"].as_u64().unwrap() < 10);
    assert!(!history.exists());
    Ok(())
}

#[test]
fn simulated_remote_analysis_is_saved() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let history = dir.path().join("history");
    let config = dir.path().join("pulse.toml");
    fs::write(&config, "[analysis.hrv]\nmin_ppi_count = 3\n")?;
    let out = Command::cargo_bin("pulse")?
        .args([
            "simulate-analysis",
            "--config",
            config.to_str().unwrap(),
            "--bpm",
            "60",
            "--duration-ms",
            "5000",
            "--remote",
            "--history",
            history.to_str().unwrap(),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&out)?;
    assert_eq!(value["status"], "completed");
    let record = &value["record"];
    assert_eq!(record["type"], "remote");
    assert_eq!(record["mean_hr"], 60);
    assert!(record["sns"].is_number());
    let saved = history.join(format!("{}.json", record["timestamp"]));
    assert!(saved.exists());
    Ok(())
}

#[test]
fn simulated_live_session_stops_on_press() -> Result<(), Box<dyn Error>> {
    let out = Command::cargo_bin("pulse")?
        .args(["simulate-live", "--bpm", "60", "--stop-after-ms", "300"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&out)?;
    assert!(value["final_bpm"].is_null());
    assert_eq!(value["updates"], 0);
    Ok(())
}

#[test]
fn history_of_empty_dir_prints_nothing() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    Command::cargo_bin("pulse")?
        .args(["history", "--dir", dir.path().join("none").to_str().unwrap()])
        .assert()
        .success()
        .stdout("");
    Ok(())
}
