//! Frame history tracking for debugging and diagnostics.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::Opcode;

/// Direction of a recorded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Send,
    Receive,
}

/// A recorded frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub msg_type: MessageType,
    /// Opcode name of the frame, `unknown` for unlisted leading bytes.
    pub method: String,
    /// The frame as a hex string.
    pub message: Value,
    /// Seconds since history creation
    pub timestamp: f64,
}

/// Tracks the frames exchanged with one controller.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    latest: HashMap<MessageType, HashMap<String, Value>>,
    last_error: Option<String>,
    start_time: Instant,
    entries: Vec<HistoryEntry>,
    max_entries: usize,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 100;

    pub fn new() -> Self {
        Self {
            latest: HashMap::from([
                (MessageType::Send, HashMap::new()),
                (MessageType::Receive, HashMap::new()),
            ]),
            last_error: None,
            start_time: Instant::now(),
            entries: Vec::new(),
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::new()
        }
    }

    /// Record a frame. Empty frames are ignored.
    pub fn record(&mut self, msg_type: MessageType, frame: &[u8]) {
        let Some(first) = frame.first() else {
            return;
        };
        let method = Opcode::create(*first)
            .map(|opcode| opcode.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let message = Value::String(hex(frame));

        if let Some(type_map) = self.latest.get_mut(&msg_type) {
            type_map.insert(method.clone(), message.clone());
        }

        self.entries.push(HistoryEntry {
            msg_type,
            method,
            message,
            timestamp: self.start_time.elapsed().as_secs_f64(),
        });

        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    pub fn record_error(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Most recent frame of a kind, by opcode name.
    pub fn latest(&self, msg_type: MessageType, method: &str) -> Option<&Value> {
        self.latest.get(&msg_type).and_then(|m| m.get(method))
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.latest.values_mut().for_each(|m| m.clear());
        self.entries.clear();
        self.last_error = None;
    }

    pub fn summary(&self) -> HistorySummary {
        let count = |t: MessageType| self.entries.iter().filter(|e| e.msg_type == t).count();
        HistorySummary {
            send_count: count(MessageType::Send),
            receive_count: count(MessageType::Receive),
            total_entries: self.entries.len(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Summary of frame history for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub send_count: usize,
    pub receive_count: usize,
    pub total_entries: usize,
    pub last_error: Option<String>,
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_frame() {
        let mut history = MessageHistory::new();
        history.record(MessageType::Send, &[0x71, 0x23, 0x0F, 0xA3]);

        assert_eq!(history.len(), 1);
        assert_eq!(history.entries()[0].method, "power");
        assert_eq!(
            history.latest(MessageType::Send, "power"),
            Some(&json!("71 23 0f a3"))
        );
    }

    #[test]
    fn test_unknown_and_empty_frames() {
        let mut history = MessageHistory::new();
        history.record(MessageType::Receive, &[]);
        history.record(MessageType::Receive, &[0x42]);
        assert_eq!(history.len(), 1);
        assert_eq!(history.entries()[0].method, "unknown");
    }

    #[test]
    fn test_record_error() {
        let mut history = MessageHistory::new();
        history.record_error("Connection timeout");
        assert_eq!(history.last_error(), Some("Connection timeout"));
    }

    #[test]
    fn test_max_entries() {
        let mut history = MessageHistory::with_max_entries(2);
        for _ in 0..5 {
            history.record(MessageType::Send, &[0x81, 0x8A, 0x8B]);
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.summary().send_count, 2);
    }
}
