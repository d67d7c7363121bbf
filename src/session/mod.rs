//! Research session log
//!
//! An append-only record of one research conversation. Queries, responses
//! and reasoning steps are parallel logs that only [`ResearchSession::record`]
//! extends, so they always have equal length.
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// Timing entry for one top-level query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub timestamp: DateTime<Local>,
    pub query: String,
    /// Seconds with millisecond precision, e.g. `"1.234s"`
    pub processing_time: String,
}

/// A completed export of this session or one of its answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub timestamp: DateTime<Local>,
    pub path: String,
    pub format: String,
}

/// A research session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSession {
    /// Derived from the creation time
    pub session_id: String,
    pub start_time: DateTime<Local>,
    /// Agent variant serving this session
    pub mode: String,
    queries: Vec<String>,
    responses: Vec<String>,
    reasoning_steps: Vec<ReasoningStep>,
    export_history: Vec<ExportRecord>,
}

impl ResearchSession {
    /// Create a new session stamped with the current local time
    pub fn new(mode: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            session_id: now.format("%Y%m%d_%H%M%S").to_string(),
            start_time: now,
            mode: mode.into(),
            queries: Vec::new(),
            responses: Vec::new(),
            reasoning_steps: Vec::new(),
            export_history: Vec::new(),
        }
    }

    /// Append one completed query with its response and timing
    ///
    /// Failed queries are recorded with their error text as the response.
    pub fn record(&mut self, query: &str, response: &str, started: Instant) {
        self.record_with_duration(query, response, started.elapsed());
    }

    pub fn record_with_duration(&mut self, query: &str, response: &str, elapsed: Duration) {
        self.queries.push(query.to_string());
        self.responses.push(response.to_string());
        self.reasoning_steps.push(ReasoningStep {
            timestamp: Local::now(),
            query: query.to_string(),
            processing_time: format_duration(elapsed),
        });
        tracing::debug!(
            session = %self.session_id,
            queries = self.queries.len(),
            "Recorded query"
        );
    }

    /// Note a successful export
    pub fn record_export(&mut self, path: &Path, format: &str) {
        self.export_history.push(ExportRecord {
            timestamp: Local::now(),
            path: path.display().to_string(),
            format: format.to_string(),
        });
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn reasoning_steps(&self) -> &[ReasoningStep] {
        &self.reasoning_steps
    }

    pub fn export_history(&self) -> &[ExportRecord] {
        &self.export_history
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Render a duration as seconds with millisecond precision
pub fn format_duration(elapsed: Duration) -> String {
    format!("{:.3}s", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_from_start_time() {
        let session = ResearchSession::new("keyword");
        assert_eq!(
            session.session_id,
            session.start_time.format("%Y%m%d_%H%M%S").to_string()
        );
        assert!(session.is_empty());
    }

    #[test]
    fn test_record_appends_parallel_entries() {
        let mut session = ResearchSession::new("keyword");
        session.record_with_duration("q", "first", Duration::from_millis(1234));
        session.record_with_duration("q", "second", Duration::from_millis(5));

        assert_eq!(session.queries(), &["q".to_string(), "q".to_string()]);
        assert_eq!(session.responses().len(), 2);
        assert_eq!(session.reasoning_steps()[0].processing_time, "1.234s");
        assert_eq!(session.reasoning_steps()[1].processing_time, "0.005s");
    }

    #[test]
    fn test_record_export() {
        let mut session = ResearchSession::new("routed");
        session.record_export(Path::new("/tmp/out.json"), "json");
        assert_eq!(session.export_history()[0].format, "json");
        assert_eq!(session.export_history()[0].path, "/tmp/out.json");
    }

    #[test]
    fn test_serialized_shape() {
        let mut session = ResearchSession::new("keyword");
        session.record_with_duration("what", "answer", Duration::from_millis(10));

        let value = serde_json::to_value(&session).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "session_id",
                "start_time",
                "mode",
                "queries",
                "responses",
                "reasoning_steps",
                "export_history"
            ]
        );
    }
}
