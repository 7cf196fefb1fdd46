//! A single log channel

use chrono::{DateTime, Local};
use serde::Serialize;

/// One received log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Payload text, verbatim
    pub text: String,
    /// Local time the entry was appended
    pub received_at: DateTime<Local>,
}

impl LogEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Local::now(),
        }
    }
}

/// A named, indexed log stream
#[derive(Debug, Clone)]
pub struct Channel {
    index: usize,
    caption: String,
    entries: Vec<LogEntry>,
}

impl Channel {
    pub fn new(index: usize, caption: impl Into<String>) -> Self {
        Self {
            index,
            caption: caption.into(),
            entries: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn set_caption(&mut self, caption: impl Into<String>) {
        self.caption = caption.into();
    }

    /// Append an entry and return the new entry count
    pub fn append(&mut self, entry: LogEntry) -> usize {
        self.entries.push(entry);
        self.entries.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            index: self.index,
            caption: self.caption.clone(),
            entry_count: self.entries.len(),
            entries: self.entries.clone(),
        }
    }
}

/// Point-in-time copy of a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSnapshot {
    pub index: usize,
    pub caption: String,
    pub entry_count: usize,
    pub entries: Vec<LogEntry>,
}

impl ChannelSnapshot {
    /// Entry texts in arrival order
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.text.as_str()).collect()
    }

    /// Caption with the entry count appended while the channel holds entries
    pub fn title(&self) -> String {
        if self.entry_count == 0 {
            self.caption.clone()
        } else {
            format!("{} ({})", self.caption, self.entry_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_clear() {
        let mut channel = Channel::new(0, "User");
        assert_eq!(channel.append(LogEntry::new("a")), 1);
        assert_eq!(channel.append(LogEntry::new("b")), 2);

        channel.clear();
        assert_eq!(channel.entry_count(), 0);
        assert_eq!(channel.caption(), "User");
    }

    #[test]
    fn test_title_shows_count() {
        let mut channel = Channel::new(1, "Errors");
        assert_eq!(channel.snapshot().title(), "Errors");

        channel.append(LogEntry::new("x"));
        channel.append(LogEntry::new("y"));
        let snapshot = channel.snapshot();
        assert_eq!(snapshot.title(), "Errors (2)");
        assert_eq!(snapshot.texts(), vec!["x", "y"]);
    }
}
