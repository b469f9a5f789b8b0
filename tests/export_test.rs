use chrono::NaiveDate;
use tempfile::tempdir;
use wellbeing_explorer::export::{
    write_csv, write_json, write_records_to_timestamped_dir, ExportFormat,
};
use wellbeing_explorer::{Route, StoredRecord};

fn record(day: u32) -> StoredRecord {
    StoredRecord {
        entry_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
        phase: "Late Follicular".to_string(),
        is_weekend: 0,
        sleep_duration_minutes: 400,
        resting_heart_rate: 58,
        cramps_num: 0,
        headaches_num: 1,
        sleepissue_num: 0,
        stress_num: 2,
        lag1_mood: None,
        lag1_energy: None,
        gt_mood: Some(1),
        gt_energy: None,
        mood_pred: Some(1),
        energy_pred: Some(0),
        route: Some(Route::A),
        mood_proba: Some(vec![0.25, 0.5, 0.25]),
        energy_proba: None,
        created_at: None,
    }
}

#[test]
fn test_csv_header_and_cells() {
    let mut buffer = Vec::new();
    write_csv(&[record(1)], &mut buffer).unwrap();

    let mut reader = csv::Reader::from_reader(buffer.as_slice());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.len(), 19);
    assert_eq!(&headers[0], "entry_date");
    assert_eq!(&headers[18], "created_at");

    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(&row[0], "2024-06-01");
    assert_eq!(&row[1], "Late Follicular");
    assert_eq!(&row[9], "");
    assert_eq!(&row[11], "1");
    assert_eq!(&row[15], "A");
    assert_eq!(&row[16], "[0.25,0.5,0.25]");
    assert_eq!(&row[17], "");
}

#[test]
fn test_csv_quotes_awkward_phase_labels() {
    let mut awkward = record(2);
    awkward.phase = "Luteal, late".to_string();
    let mut buffer = Vec::new();
    write_csv(&[awkward], &mut buffer).unwrap();

    let mut reader = csv::Reader::from_reader(buffer.as_slice());
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(&row[1], "Luteal, late");
}

#[test]
fn test_json_array_of_records() {
    let mut buffer = Vec::new();
    write_json(&[record(1), record(2)], &mut buffer).unwrap();

    let parsed: Vec<StoredRecord> = serde_json::from_slice(&buffer).unwrap();
    assert_eq!(parsed, vec![record(1), record(2)]);
}

#[test]
fn test_timestamped_dir_layout() {
    let dir = tempdir().expect("Failed to create temp directory");
    let path = write_records_to_timestamped_dir(
        &[record(1)],
        ExportFormat::Csv,
        dir.path(),
        "2024-06-30_12-00-00",
    )
    .unwrap()
    .unwrap();

    assert_eq!(path, dir.path().join("2024-06-30_12-00-00").join("entries.csv"));
    let text = std::fs::read_to_string(path).unwrap();
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn test_format_display_and_extension() {
    assert_eq!(ExportFormat::default(), ExportFormat::Csv);
    assert_eq!(ExportFormat::Json.extension(), "json");
    assert_eq!(ExportFormat::Csv.to_string(), "csv");
}
