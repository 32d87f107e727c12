//! CLI tests that go through trial and output files.

use clap::Parser;
use serde_json::Value;

use trialqc::cli::{load_trials, run_with_cli, Cli};

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("trialqc").chain(args.iter().copied()))
        .expect("valid args")
}

#[tokio::test]
async fn test_simulate_then_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let trials_path = dir.path().join("trials.json");
    let output_path = dir.path().join("output.json");
    let trials_arg = trials_path.to_str().expect("utf-8 path");
    let output_arg = output_path.to_str().expect("utf-8 path");

    run_with_cli(cli(&["simulate", "--sanity-checks", "--seed", "7", "-o", trials_arg]))
        .await
        .expect("simulate succeeds");

    let trials = load_trials(&trials_path).expect("trials load");
    assert_eq!(trials.len(), 50);

    run_with_cli(cli(&[
        "run",
        "-i",
        trials_arg,
        "-o",
        output_arg,
        "--rt-min",
        "150",
        "--rt-max",
        "1500",
        "--min-valid-trials",
        "10",
        "--statistic",
        "median,trimmed_mean",
        "--trim-fraction",
        "0.1",
        "--deadline-secs",
        "60",
    ]))
    .await
    .expect("run succeeds");

    let content = std::fs::read_to_string(&output_path).expect("output written");
    let output: Value = serde_json::from_str(&content).expect("valid json");

    assert!(output["run_id"].is_string());
    assert!(output["started_at"].is_string());

    let annotated = output["annotated_trials"].as_array().expect("array");
    assert_eq!(annotated.len(), 50);
    let rejected: Vec<&str> = annotated
        .iter()
        .filter(|t| t["qc_flag"] == false)
        .filter_map(|t| t["qc_reason"].as_str())
        .collect();
    assert!(rejected.contains(&"rt_too_slow"));
    assert!(rejected.contains(&"negative_rt"));

    let aggregates = output["aggregates"].as_array().expect("array");
    assert_eq!(aggregates.len(), 2 * 2 * 2);
    assert!(aggregates
        .iter()
        .all(|r| r["statistic"] == "median" || r["statistic"] == "trimmed_mean"));
}

#[tokio::test]
async fn test_run_rejects_invalid_config_before_processing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let trials_path = dir.path().join("trials.json");
    let output_path = dir.path().join("output.json");
    std::fs::write(
        &trials_path,
        r#"[{"subject":"S01","condition":"visual","trial_id":1,"reaction_time":300.0}]"#,
    )
    .expect("write trials");

    let result = run_with_cli(cli(&[
        "run",
        "-i",
        trials_path.to_str().expect("utf-8 path"),
        "-o",
        output_path.to_str().expect("utf-8 path"),
        "--rt-min",
        "2000",
        "--rt-max",
        "100",
    ]))
    .await;

    assert!(result.is_err());
    assert!(!output_path.exists());
}

#[tokio::test]
async fn test_run_flags_complete_yaml_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let trials_path = dir.path().join("trials.json");
    let config_path = dir.path().join("qc.yaml");
    let output_path = dir.path().join("output.json");

    std::fs::write(
        &trials_path,
        r#"[
            {"subject":"S01","condition":"visual","trial_id":1,"reaction_time":2500.0},
            {"subject":"S01","condition":"visual","trial_id":2,"reaction_time":3500.0}
        ]"#,
    )
    .expect("write trials");
    std::fs::write(
        &config_path,
        "rt_min: 2000\nmin_valid_trials: 2\nstatistics: [trimmed_mean]\n",
    )
    .expect("write config");

    run_with_cli(cli(&[
        "run",
        "-i",
        trials_path.to_str().expect("utf-8 path"),
        "-c",
        config_path.to_str().expect("utf-8 path"),
        "--rt-max",
        "5000",
        "--trim-fraction",
        "0.1",
        "-o",
        output_path.to_str().expect("utf-8 path"),
    ]))
    .await
    .expect("flags make the file valid");

    let output: Value =
        serde_json::from_str(&std::fs::read_to_string(&output_path).expect("output written"))
            .expect("valid json");
    let aggregates = output["aggregates"].as_array().expect("array");
    assert_eq!(aggregates.len(), 1);
    assert_eq!(aggregates[0]["statistic"], "trimmed_mean");
    assert_eq!(aggregates[0]["value"], 3000.0);
}

#[tokio::test]
async fn test_run_with_yaml_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let trials_path = dir.path().join("trials.json");
    let config_path = dir.path().join("qc.yaml");
    let output_path = dir.path().join("output.json");

    std::fs::write(
        &trials_path,
        r#"[
            {"subject":"S01","condition":"visual","trial_id":1,"reaction_time":300.0},
            {"subject":"S01","condition":"visual","trial_id":2,"reaction_time":320.0},
            {"subject":"S01","condition":"visual","trial_id":3,"reaction_time":null},
            {"subject":"S02","condition":"visual","trial_id":4,"reaction_time":100.0}
        ]"#,
    )
    .expect("write trials");
    std::fs::write(
        &config_path,
        "min_valid_trials: 2\nstatistics: [mean]\n",
    )
    .expect("write config");

    run_with_cli(cli(&[
        "run",
        "-i",
        trials_path.to_str().expect("utf-8 path"),
        "-c",
        config_path.to_str().expect("utf-8 path"),
        "-o",
        output_path.to_str().expect("utf-8 path"),
        "--json",
    ]))
    .await
    .expect("run succeeds");

    let output: Value =
        serde_json::from_str(&std::fs::read_to_string(&output_path).expect("output written"))
            .expect("valid json");

    let subjects = output["subject_qc"].as_array().expect("array");
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0]["n_valid_trials"], 2);
    assert_eq!(subjects[0]["included"], true);
    assert_eq!(subjects[1]["n_valid_trials"], 0);
    assert_eq!(subjects[1]["included"], false);

    let aggregates = output["aggregates"].as_array().expect("array");
    assert_eq!(aggregates.len(), 1);
    assert_eq!(aggregates[0]["statistic"], "mean");
    assert_eq!(aggregates[0]["value"], 310.0);
}
