use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tabular_insight::ingestion::{
    load, Advisory, CompositeObserver, FileObserver, IngestionContext, IngestionObserver,
    IngestionOptions, IngestionSeverity, IngestionStats, ParsePath, Source, SourceFormat,
};
use tabular_insight::IngestionError;

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<IngestionStats>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
    advisories: Mutex<Vec<Advisory>>,
    contexts: Mutex<Vec<(String, SourceFormat, ParsePath)>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.contexts
            .lock()
            .unwrap()
            .push((ctx.source.clone(), ctx.format, ctx.parse_path));
        self.successes.lock().unwrap().push(stats);
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.alerts.lock().unwrap().push(severity);
    }

    fn on_advisory(&self, _ctx: &IngestionContext, advisory: &Advisory) {
        self.advisories.lock().unwrap().push(advisory.clone());
    }
}

fn tmp_path(name: &str, ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("tabular-insight-{name}-{nanos}.{ext}"))
}

fn options_with(obs: Arc<RecordingObserver>) -> IngestionOptions {
    IngestionOptions {
        observer: Some(obs),
        alert_at_or_above: IngestionSeverity::Critical,
        ..Default::default()
    }
}

#[test]
fn observer_receives_success_stats_and_context() {
    let obs = Arc::new(RecordingObserver::default());
    load(&Source::path("tests/fixtures/people.csv"), &options_with(obs.clone())).unwrap();

    assert_eq!(
        obs.successes.lock().unwrap().clone(),
        vec![IngestionStats { rows: 3, columns: 2 }]
    );
    let contexts = obs.contexts.lock().unwrap().clone();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].0.ends_with("people.csv"));
    assert_eq!(contexts[0].1, SourceFormat::Csv);
    assert_eq!(contexts[0].2, ParsePath::Standard);
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn observer_receives_failure_and_alert_on_critical_io_error() {
    let obs = Arc::new(RecordingObserver::default());

    // Missing file -> Io error -> Critical
    let _ = load(&Source::path("tests/fixtures/does_not_exist.csv"), &options_with(obs.clone())).unwrap_err();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![IngestionSeverity::Critical]);
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![IngestionSeverity::Critical]);
}

#[test]
fn observer_receives_failure_without_alert_for_parse_error() {
    let obs = Arc::new(RecordingObserver::default());
    let path = tmp_path("empty", "csv");
    std::fs::write(&path, b"").unwrap();

    // Empty file -> parse error -> Error severity (not Critical) -> no alert
    let _ = load(&Source::Path(path.clone()), &options_with(obs.clone())).unwrap_err();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![IngestionSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn lower_alert_threshold_alerts_on_parse_errors() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestionOptions {
        alert_at_or_above: IngestionSeverity::Error,
        ..options_with(obs.clone())
    };
    let _ = load(
        &Source::Upload {
            name: "broken.xml".to_string(),
            bytes: b"<a><b></a>".to_vec(),
        },
        &opts,
    )
    .unwrap_err();

    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![IngestionSeverity::Error]);
}

#[test]
fn advisories_are_forwarded_and_do_not_fail_the_load() {
    let obs = Arc::new(RecordingObserver::default());
    let ds = load(
        &Source::Upload {
            name: "cities.csv".to_string(),
            bytes: b"city,total\nS\xe3o Paulo,10\nRecife,1,extra\n".to_vec(),
        },
        &options_with(obs.clone()),
    )
    .unwrap();

    assert_eq!(ds.row_count(), 1);
    let advisories = obs.advisories.lock().unwrap().clone();
    assert_eq!(advisories.len(), 2);
    assert_eq!(advisories[0], Advisory::EncodingFallback { encoding: "latin1" });
    assert!(matches!(advisories[1], Advisory::MalformedRowSkipped { .. }));
}

#[test]
fn file_observer_records_advisory_kind_and_parse_path() {
    let log_path = tmp_path("advisory", "log");
    let opts = IngestionOptions {
        observer: Some(Arc::new(FileObserver::new(&log_path))),
        ..Default::default()
    };

    load(
        &Source::Upload {
            name: "cities.csv".to_string(),
            bytes: b"city\nS\xe3o Paulo\n".to_vec(),
        },
        &opts,
    )
    .unwrap();

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2, "advisory and success lines:\n{log}");
    assert!(lines[0].contains("event=advisory"));
    assert!(lines[0].contains("parse_path=standard kind=encoding_fallback"));
    assert!(lines[1].contains("event=loaded"));

    let _ = std::fs::remove_file(&log_path);
}

#[test]
fn file_observer_appends_lines_through_composite() {
    let log_path = tmp_path("observer", "log");
    let recording = Arc::new(RecordingObserver::default());
    let composite = CompositeObserver::new(vec![
        recording.clone() as Arc<dyn IngestionObserver>,
        Arc::new(FileObserver::new(&log_path)),
    ]);
    let opts = IngestionOptions {
        observer: Some(Arc::new(composite)),
        ..Default::default()
    };

    load(&Source::path("tests/fixtures/people.csv"), &opts).unwrap();
    let _ = load(&Source::path("tests/fixtures/missing.csv"), &opts).unwrap_err();

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3, "success, failure and alert lines:\n{log}");
    assert!(lines[0].contains("event=loaded"));
    assert!(lines[0].contains("format=csv parse_path=standard rows=3 columns=2"));
    assert!(lines[1].contains("event=failed"));
    assert!(lines[1].contains("severity=critical"));
    assert!(lines[2].contains("event=alert"));
    assert_eq!(recording.successes.lock().unwrap().len(), 1);

    let _ = std::fs::remove_file(&log_path);
}
