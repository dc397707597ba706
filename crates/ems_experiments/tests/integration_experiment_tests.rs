mod support;

use ems_experiments::config::SelectorKind;
use ems_experiments::{
    export_records_to_csv, export_to_json, run_replications_with_progress, summarize,
    ExperimentError, Scenario, Settings,
};

use support::data_dir;

#[test]
fn replays_case_file_with_hospital_transport() {
    let dir = data_dir(
        r#",
  "cases": "cases.csv",
  "num_ambs": 2"#,
    );
    let settings = Settings::from_file(dir.path().join("settings.json")).expect("settings");
    assert_eq!(settings.num_ambulances, 2);

    let scenario = Scenario::load(settings).expect("scenario");
    assert_eq!(scenario.bases.len(), 3);
    assert_eq!(scenario.demands.len(), 4);
    assert_eq!(scenario.hospitals.len(), 1);

    let outputs = run_replications_with_progress(&scenario, false).expect("run");
    assert_eq!(outputs.len(), 1);
    let output = &outputs[0];
    assert_eq!(output.records.len(), 6);
    assert_eq!(output.metrics.finished_cases, 6);
    // Case 1 is still being treated when cases 2 to 5 arrive within two minutes.
    assert!(output.metrics.queued_cases >= 2);
    assert!(output.records.iter().all(|r| r.event_history.len() == 4));
    let coverage = output.metrics.avg_coverage.expect("coverage sampled");
    assert!((0.0..=1.0).contains(&coverage));
}

#[test]
fn replayed_cases_are_identical_across_replications() {
    let dir = data_dir(
        r#",
  "cases": "cases.csv",
  "num_ambs": 2,
  "replications": 3"#,
    );
    let settings = Settings::from_file(dir.path().join("settings.json")).expect("settings");
    let scenario = Scenario::load(settings).expect("scenario");
    let outputs = run_replications_with_progress(&scenario, false).expect("run");
    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs[0].records, outputs[1].records);
    assert_eq!(outputs[1].records, outputs[2].records);
}

#[test]
fn synthetic_cases_vary_by_seed_and_export() {
    let dir = data_dir(
        r#",
  "num_ambs": 3,
  "num_cases": 60,
  "arrival_rate_per_hour": 10.0,
  "replications": 2,
  "selector": "first_available""#,
    );
    let settings = Settings::from_file(dir.path().join("settings.json")).expect("settings");
    assert_eq!(settings.selector, SelectorKind::FirstAvailable);
    let scenario = Scenario::load(settings).expect("scenario");
    let outputs = run_replications_with_progress(&scenario, false).expect("run");

    assert_eq!(outputs[0].records.len(), 60);
    assert_eq!(outputs[1].records.len(), 60);
    assert_ne!(outputs[0].records, outputs[1].records);

    let records_path = dir.path().join("out/records.csv");
    export_records_to_csv(&outputs, &records_path).expect("records export");
    let exported = std::fs::read_to_string(&records_path).expect("read records");
    assert_eq!(exported.lines().count(), 1 + 120);

    let results: Vec<_> = outputs.iter().map(|o| o.metrics.clone()).collect();
    let summary_path = dir.path().join("out/summary.json");
    export_to_json(&results, summarize(&results).as_ref(), &summary_path).expect("json export");
    assert!(std::fs::read_to_string(summary_path)
        .expect("read summary")
        .contains("mean_avg_delay_ms"));
}

#[test]
fn missing_bases_file_is_a_configuration_error() {
    let settings = Settings::default().with_cases(10);
    assert!(matches!(
        Scenario::load(settings),
        Err(ExperimentError::Config(_))
    ));
}

#[test]
fn unreadable_dataset_names_the_file() {
    let dir = data_dir(r#", "cases": "nope.csv""#);
    let settings = Settings::from_file(dir.path().join("settings.json")).expect("settings");
    match Scenario::load(settings) {
        Err(err @ ExperimentError::Csv { .. }) => assert!(err.to_string().contains("nope.csv")),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn hourly_profile_shapes_synthetic_arrivals() {
    let mut night_shift = [1.0; 24];
    night_shift[0] = 4.0;
    let profile = format!("{night_shift:?}");
    let dir = data_dir(&format!(
        r#",
  "num_cases": 40,
  "arrival_rate_per_hour": 5.0,
  "hourly_profile": {profile}"#
    ));
    let settings = Settings::from_file(dir.path().join("settings.json")).expect("settings");
    assert_eq!(settings.hourly_profile, Some(night_shift));
    let scenario = Scenario::load(settings).expect("scenario");
    let outputs = run_replications_with_progress(&scenario, false).expect("run");
    let records = &outputs[0].records;
    assert_eq!(records.len(), 40);
    // 20 cases an hour until 01:00, 5 an hour afterwards.
    let before_one_am = records
        .iter()
        .filter(|r| r.case.datetime < 3_600_000)
        .count();
    assert!(before_one_am >= 8, "only {before_one_am} cases before 01:00");
}

#[test]
fn silent_hours_delay_synthetic_cases_without_losing_any() {
    let mut quiet_night = [1.0; 24];
    quiet_night[0] = 0.0;
    quiet_night[1] = 0.0;
    let profile = format!("{quiet_night:?}");
    let dir = data_dir(&format!(
        r#",
  "num_cases": 30,
  "arrival_rate_per_hour": 6.0,
  "hourly_profile": {profile}"#
    ));
    let settings = Settings::from_file(dir.path().join("settings.json")).expect("settings");
    let scenario = Scenario::load(settings).expect("scenario");
    let outputs = run_replications_with_progress(&scenario, false).expect("run");
    let records = &outputs[0].records;
    assert_eq!(records.len(), 30);
    assert!(records.iter().all(|r| r.case.datetime >= 2 * 3_600_000));
}

#[test]
fn zero_speed_is_rejected_before_running() {
    let dir = data_dir(
        r#",
  "num_cases": 3,
  "speed_kmh": 0.0"#,
    );
    let settings = Settings::from_file(dir.path().join("settings.json")).expect("settings");
    assert!(matches!(
        Scenario::load(settings),
        Err(ExperimentError::Config(_))
    ));
}
