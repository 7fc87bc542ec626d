use crate::{
    errors::AppError,
    journalctl::{LogEntry, LogReader},
};

/// Follows one unit's journal across polls. The cursor is the only state carried between
/// calls; callers that want to survive restarts persist [`LogTail::cursor`] themselves.
pub struct LogTail<R> {
    reader: R,
    unit: String,
    cursor: String,
}

impl<R: LogReader> LogTail<R> {
    pub fn from_cursor(reader: R, unit: impl Into<String>, cursor: impl Into<String>) -> Self {
        Self {
            reader,
            unit: unit.into(),
            cursor: cursor.into(),
        }
    }

    /// Starts after the newest entry currently in the journal, so only entries written
    /// from now on are reported. Returns that entry alongside the tail.
    pub async fn from_end(reader: R, unit: impl Into<String>) -> Result<(Self, LogEntry), AppError> {
        let unit = unit.into();
        let last = reader.last_entry(&unit).await?;
        let tail = Self::from_cursor(reader, unit, last.cursor.clone());
        Ok((tail, last))
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Entries written since the previous poll, oldest first. A malformed line still
    /// advances the cursor past the entries decoded before it.
    pub async fn poll(&mut self) -> Result<Vec<LogEntry>, AppError> {
        match self.reader.entries_after(&self.unit, &self.cursor).await {
            Ok(entries) => {
                self.advance(&entries);
                Ok(entries)
            }
            Err(error) => {
                self.advance(error.partial_entries());
                Err(error)
            }
        }
    }

    fn advance(&mut self, entries: &[LogEntry]) {
        if let Some(newest) = entries.last() {
            self.cursor = newest.cursor.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::LogTail;
    use crate::{
        errors::AppError,
        journalctl::{LogEntry, LogReader},
    };

    fn entry(cursor: &str) -> LogEntry {
        LogEntry {
            cursor: cursor.to_string(),
            timestamp: DateTime::from_timestamp_micros(1).expect("valid timestamp"),
            message: format!("message {cursor}"),
            unit: "nginx.service".to_string(),
            priority: None,
            unit_result: None,
        }
    }

    /// In-memory journal where cursors are entry positions.
    struct MemoryJournal {
        entries: Mutex<Vec<LogEntry>>,
        fail_at: Option<usize>,
    }

    impl MemoryJournal {
        fn new(cursors: &[&str]) -> Self {
            Self {
                entries: Mutex::new(cursors.iter().map(|cursor| entry(cursor)).collect()),
                fail_at: None,
            }
        }

        fn append(&self, cursor: &str) {
            self.entries.lock().expect("entries lock").push(entry(cursor));
        }
    }

    #[async_trait]
    impl LogReader for MemoryJournal {
        async fn last_entry(&self, _unit: &str) -> Result<LogEntry, AppError> {
            Ok(self
                .entries
                .lock()
                .expect("entries lock")
                .last()
                .cloned()
                .unwrap_or_default())
        }

        async fn entries_after(&self, _unit: &str, cursor: &str) -> Result<Vec<LogEntry>, AppError> {
            let entries = self.entries.lock().expect("entries lock");
            let start = entries
                .iter()
                .position(|entry| entry.cursor == cursor)
                .map(|index| index + 1)
                .unwrap_or(0);
            let batch: Vec<LogEntry> = entries[start..].to_vec();

            match self.fail_at {
                Some(index) if index < batch.len() => Err(AppError::MalformedEntry {
                    line: index + 1,
                    entries: batch[..index].to_vec(),
                    source: serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json"),
                }),
                _ => Ok(batch),
            }
        }
    }

    fn cursors(entries: &[LogEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.cursor.as_str()).collect()
    }

    #[tokio::test]
    async fn from_end_skips_existing_entries() {
        let journal = MemoryJournal::new(&["c1", "c2"]);
        let (mut tail, last) = LogTail::from_end(journal, "nginx.service")
            .await
            .expect("seek to end");

        assert_eq!(last.cursor, "c2");
        assert_eq!(tail.cursor(), "c2");
        assert!(tail.poll().await.expect("poll").is_empty());

        tail.reader().append("c3");
        tail.reader().append("c4");
        let entries = tail.poll().await.expect("poll");
        assert_eq!(cursors(&entries), ["c3", "c4"]);
        assert_eq!(tail.cursor(), "c4");
    }

    #[tokio::test]
    async fn consecutive_polls_never_repeat_entries() {
        let journal = MemoryJournal::new(&["c1"]);
        let mut tail = LogTail::from_cursor(journal, "nginx.service", "");

        let first = tail.poll().await.expect("first poll");
        tail.reader().append("c2");
        let second = tail.poll().await.expect("second poll");
        let third = tail.poll().await.expect("third poll");

        assert_eq!(cursors(&first), ["c1"]);
        assert_eq!(cursors(&second), ["c2"]);
        assert!(third.is_empty());
        assert_eq!(tail.cursor(), "c2");
    }

    #[tokio::test]
    async fn empty_journal_keeps_empty_cursor() {
        let (mut tail, last) = LogTail::from_end(MemoryJournal::new(&[]), "nginx.service")
            .await
            .expect("seek to end");

        assert!(last.is_empty());
        assert!(tail.poll().await.expect("poll").is_empty());
        assert_eq!(tail.cursor(), "");
        assert_eq!(tail.unit(), "nginx.service");
    }

    #[tokio::test]
    async fn partial_batch_still_advances_cursor() {
        let journal = MemoryJournal {
            entries: Mutex::new(vec![entry("c1"), entry("c2"), entry("c3")]),
            fail_at: Some(2),
        };
        let mut tail = LogTail::from_cursor(journal, "nginx.service", "");

        let error = tail.poll().await.expect_err("expected malformed entry");
        assert_eq!(cursors(error.partial_entries()), ["c1", "c2"]);
        assert_eq!(tail.cursor(), "c2");
    }
}
