//! Session log and JSON export round trip

use delve::export::{ExportEnvelope, ResearchExporter};
use delve::session::ResearchSession;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_repeated_query_appends_independent_entries() {
    let mut session = ResearchSession::new("keyword");
    session.record_with_duration("what is entropy", "first answer", Duration::from_millis(120));
    session.record_with_duration("what is entropy", "second answer", Duration::from_millis(80));

    assert_eq!(session.len(), 2);
    assert_eq!(session.queries()[0], session.queries()[1]);
    assert_eq!(session.responses(), &["first answer".to_string(), "second answer".to_string()]);
    assert_eq!(session.reasoning_steps().len(), 2);
}

#[test]
fn test_session_json_roundtrip() {
    let temp = TempDir::new().unwrap();
    let exporter = ResearchExporter::new(temp.path().join("outputs"), "deep_researcher_v1.0").unwrap();

    let mut session = ResearchSession::new("routed");
    session.record_with_duration("Schrödinger's cat?", "A thought experiment.", Duration::from_millis(1500));
    session.record_with_duration("deep entropy", "Error processing query: offline", Duration::from_millis(3));

    let path = exporter.export_to_json(&session, None).unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("Schrödinger"));

    let envelope: ExportEnvelope<ResearchSession> = serde_json::from_str(&raw).unwrap();
    assert_eq!(envelope.metadata.export_format, "json");
    assert_eq!(envelope.metadata.agent_version, "deep_researcher_v1.0");
    assert_eq!(envelope.research_data, session);
    assert_eq!(envelope.research_data.reasoning_steps()[0].processing_time, "1.500s");
}

#[test]
fn test_export_failure_keeps_session() {
    let temp = TempDir::new().unwrap();
    let exporter = ResearchExporter::new(temp.path(), "v1").unwrap();

    let mut session = ResearchSession::new("keyword");
    session.record_with_duration("q", "a", Duration::from_millis(1));

    assert!(exporter.export_to_json(&session, Some("bad/name.json")).is_err());
    assert_eq!(session.len(), 1);
    assert!(session.export_history().is_empty());

    let path = exporter.export_to_json(&session, Some("session.json")).unwrap();
    session.record_export(&path, "json");
    assert_eq!(session.export_history().len(), 1);
}
