//! Recording session.

use chrono::{DateTime, Utc};

/// A recording session grouping the events of one flush.
///
/// A session is a value: once its batch is handed to an upload task it is
/// never referenced again, and the next event starts a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    session_id: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl Session {
    /// Starts a new session with a random identifier and the current time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Starts a new session with a random identifier at `start_time`.
    pub fn starting_at(start_time: DateTime<Utc>) -> Self {
        Session {
            session_id: uuid::Uuid::new_v4().to_string(),
            start_time,
            end_time: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Marks the session as ended now and returns the end time.
    ///
    /// The end time is set once; later calls return the original value.
    pub fn end(&mut self) -> DateTime<Utc> {
        *self.end_time.get_or_insert_with(Utc::now)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
