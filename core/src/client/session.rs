//! Client-side task session
//!
//! Holds everything the interface shows for one task: the append-only
//! progress log, the at-most-one terminal result, and the phase and
//! connection state. All mutation goes through [`TaskSession::apply`] and
//! the submission methods, from a single consumer, in event order.

use crate::client::channel::ChannelEvent;
use crate::protocol::{InboundEvent, TaskResult};
use chrono::{DateTime, Local};

/// One line of the visible progress feed, stamped at append time.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub line: String,
}

impl LogEntry {
    fn new(line: String) -> Self {
        Self {
            at: Local::now(),
            line,
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.line)
    }
}

/// Transport-driven connection state. The session never transitions this
/// on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Where the current task stands. Purely informational: the absence of a
/// result is the only "still running" signal the server provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Idle,
    Running,
    Completed,
}

/// View-model for one sourcing task.
#[derive(Debug)]
pub struct TaskSession {
    logs: Vec<LogEntry>,
    result: Option<TaskResult>,
    phase: TaskPhase,
    connection: ConnectionState,
}

impl TaskSession {
    pub fn new() -> Self {
        Self {
            logs: Vec::new(),
            result: None,
            phase: TaskPhase::Idle,
            connection: ConnectionState::Connecting,
        }
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn result(&self) -> Option<&TaskResult> {
        self.result.as_ref()
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Start a new task. A blank query is rejected without touching any
    /// state; otherwise the log and result are cleared unconditionally.
    pub fn begin_submission(&mut self, query: &str) -> bool {
        if query.trim().is_empty() {
            return false;
        }

        self.logs.clear();
        self.result = None;
        self.phase = TaskPhase::Running;
        self.push(format!("System: Starting sourcing task for \"{}\"...", query));
        true
    }

    /// Record the accepted submission. The task id shows up in this one
    /// log line and nowhere else.
    pub fn record_submitted(&mut self, task_id: &str) {
        self.push(format!("System: Task {} accepted by the service.", task_id));
    }

    /// Record a failed submission and fall back to idle. Not retried.
    pub fn record_submission_failure(&mut self, error: &str) {
        self.push(format!("System Error: {}", error));
        self.phase = TaskPhase::Idle;
    }

    /// Apply one channel event. After the connection has closed, events
    /// are ignored entirely.
    pub fn apply(&mut self, event: ChannelEvent) {
        if self.connection == ConnectionState::Closed {
            return;
        }

        match event {
            ChannelEvent::Opened => {
                self.connection = ConnectionState::Open;
                self.push("System: Connected to real-time agent stream...".to_string());
            }
            ChannelEvent::Frame(raw) => match InboundEvent::decode(&raw) {
                InboundEvent::Result(result) => {
                    self.result = Some(result);
                    self.phase = TaskPhase::Completed;
                    self.push("System: Analysis completed.".to_string());
                }
                InboundEvent::Json(value) => {
                    self.push(format!("Agent: {}", value));
                }
                InboundEvent::Line(line) => {
                    self.push(format!("Agent: {}", line));
                }
            },
            ChannelEvent::TransportError(error) => {
                self.push(format!("System: Channel error: {}", error));
            }
            ChannelEvent::Closed => {
                self.connection = ConnectionState::Closed;
                self.push("System: Disconnected from agent stream.".to_string());
            }
        }
    }

    fn push(&mut self, line: String) {
        self.logs.push(LogEntry::new(line));
    }
}

impl Default for TaskSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TaskResult;
    use serde_json::json;

    fn open_session() -> TaskSession {
        let mut session = TaskSession::new();
        session.apply(ChannelEvent::Opened);
        session
    }

    #[test]
    fn blank_query_never_starts_a_task() {
        let mut session = open_session();
        session.apply(ChannelEvent::Frame("existing line".to_string()));
        let log_count = session.logs().len();

        assert!(!session.begin_submission(""));
        assert!(!session.begin_submission("   \t"));
        assert_eq!(session.logs().len(), log_count);
        assert_eq!(session.phase(), TaskPhase::Idle);
    }

    #[test]
    fn accepted_submission_logs_the_task_id_once() {
        let mut session = open_session();
        assert!(session.begin_submission("camping chair"));
        session.record_submitted("abc-123");

        let mentions = session
            .logs()
            .iter()
            .filter(|entry| entry.line.contains("abc-123"))
            .count();
        assert_eq!(mentions, 1);
        assert!(session.result().is_none());
        assert_eq!(session.phase(), TaskPhase::Running);
    }

    #[test]
    fn plain_frame_appends_one_derived_entry() {
        let mut session = open_session();
        let before = session.logs().len();

        session.apply(ChannelEvent::Frame("hello".to_string()));

        assert_eq!(session.logs().len(), before + 1);
        assert!(session.logs().last().unwrap().line.contains("hello"));
        assert!(session.result().is_none());
    }

    #[test]
    fn result_frame_sets_result_once_and_keeps_channel_usable() {
        let mut session = open_session();
        session.begin_submission("camping chair");
        let before = session.logs().len();

        session.apply(ChannelEvent::Frame(
            r#"{"type":"result","data":{"x":1}}"#.to_string(),
        ));

        assert_eq!(
            session.result(),
            Some(&TaskResult::Unstructured(json!({"x": 1})))
        );
        assert_eq!(session.phase(), TaskPhase::Completed);
        // Terminal system line appended
        assert_eq!(session.logs().len(), before + 1);

        // Channel stays open: later plain frames still append and leave
        // the result alone.
        session.apply(ChannelEvent::Frame("post-result chatter".to_string()));
        assert_eq!(session.logs().len(), before + 2);
        assert_eq!(
            session.result(),
            Some(&TaskResult::Unstructured(json!({"x": 1})))
        );
    }

    #[test]
    fn non_result_json_is_stringified_whole() {
        let mut session = open_session();
        let before = session.logs().len();

        session.apply(ChannelEvent::Frame(
            r#"{"type":"other","foo":"bar"}"#.to_string(),
        ));

        assert_eq!(session.logs().len(), before + 1);
        let line = &session.logs().last().unwrap().line;
        assert!(line.contains("other"));
        assert!(line.contains("bar"));
        assert!(session.result().is_none());
    }

    #[test]
    fn new_submission_clears_log_and_result_unconditionally() {
        let mut session = open_session();
        session.begin_submission("first");
        session.apply(ChannelEvent::Frame(
            r#"{"type":"result","data":{"x":1}}"#.to_string(),
        ));
        assert!(session.result().is_some());

        assert!(session.begin_submission("second"));
        assert!(session.result().is_none());
        assert_eq!(session.logs().len(), 1);
        assert!(session.logs()[0].line.contains("second"));
        assert_eq!(session.phase(), TaskPhase::Running);
    }

    #[test]
    fn teardown_logs_one_disconnect_line_then_goes_silent() {
        let mut session = open_session();
        session.apply(ChannelEvent::Closed);

        let disconnects = session
            .logs()
            .iter()
            .filter(|entry| entry.line.contains("Disconnected"))
            .count();
        assert_eq!(disconnects, 1);
        assert_eq!(session.connection(), ConnectionState::Closed);

        // Late transport events are ignored entirely.
        let after_close = session.logs().len();
        session.apply(ChannelEvent::Frame("straggler".to_string()));
        session.apply(ChannelEvent::TransportError("boom".to_string()));
        session.apply(ChannelEvent::Closed);
        assert_eq!(session.logs().len(), after_close);
    }

    #[test]
    fn transport_error_is_one_log_line_and_nothing_else() {
        let mut session = open_session();
        session.begin_submission("camping chair");
        let before = session.logs().len();

        session.apply(ChannelEvent::TransportError("connection reset".to_string()));

        assert_eq!(session.logs().len(), before + 1);
        assert_eq!(session.phase(), TaskPhase::Running);
        assert!(session.result().is_none());
        assert_eq!(session.connection(), ConnectionState::Open);
    }

    #[test]
    fn submission_failure_resets_to_idle() {
        let mut session = open_session();
        session.begin_submission("camping chair");
        session.record_submission_failure("connection refused");

        assert_eq!(session.phase(), TaskPhase::Idle);
        assert!(session
            .logs()
            .last()
            .unwrap()
            .line
            .contains("connection refused"));
    }

    #[test]
    fn later_result_replaces_earlier_one() {
        let mut session = open_session();
        session.begin_submission("camping chair");
        session.apply(ChannelEvent::Frame(
            r#"{"type":"result","data":{"x":1}}"#.to_string(),
        ));
        session.apply(ChannelEvent::Frame(
            r#"{"type":"result","data":{"x":2}}"#.to_string(),
        ));

        assert_eq!(
            session.result(),
            Some(&TaskResult::Unstructured(json!({"x": 2})))
        );
    }
}
