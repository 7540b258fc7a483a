//! Structured activity events written to the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity attached to an activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityLevel {
    /// Verbose diagnostic detail.
    Debug,
    /// Normal progress.
    Info,
    /// Degraded but recoverable behaviour.
    Warning,
    /// A failure that affected the run.
    Error,
}

impl ActivityLevel {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Run identity attached to events emitted on behalf of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityScope {
    /// Ticket the run is processing.
    pub ticket_id: Option<String>,
    /// Run identifier.
    pub run_id: Option<String>,
}

impl ActivityScope {
    /// Creates a scope for the given run and ticket.
    #[must_use]
    pub fn run(run_id: impl Into<String>, ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: Some(ticket_id.into()),
            run_id: Some(run_id.into()),
        }
    }

    /// Creates a scope carrying only a ticket identifier.
    #[must_use]
    pub fn ticket(ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: Some(ticket_id.into()),
            run_id: None,
        }
    }
}

/// One line of the activity audit trail.
///
/// Serialises to a flat JSON object: the fixed keys below plus every entry of
/// [`ActivityEvent::fields`] at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Time the event was created.
    pub timestamp: DateTime<Utc>,
    /// Event severity.
    pub level: ActivityLevel,
    /// Machine-readable event name, e.g. `stage_entered`.
    pub event: String,
    /// Component that emitted the event.
    pub component: String,
    /// Ticket the event relates to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    /// Run the event relates to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Human-readable message; defaults to the event name.
    pub message: String,
    /// Additional structured fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ActivityEvent {
    /// Creates an event with the given level and name.
    #[must_use]
    pub fn new(level: ActivityLevel, event: impl Into<String>) -> Self {
        let name = event.into();
        Self {
            timestamp: Utc::now(),
            level,
            message: name.clone(),
            event: name,
            component: String::new(),
            ticket_id: None,
            run_id: None,
            fields: Map::new(),
        }
    }

    /// Creates an informational event.
    #[must_use]
    pub fn info(event: impl Into<String>) -> Self {
        Self::new(ActivityLevel::Info, event)
    }

    /// Creates a warning event.
    #[must_use]
    pub fn warning(event: impl Into<String>) -> Self {
        Self::new(ActivityLevel::Warning, event)
    }

    /// Creates an error event.
    #[must_use]
    pub fn error(event: impl Into<String>) -> Self {
        Self::new(ActivityLevel::Error, event)
    }

    /// Attaches run identity fields.
    #[must_use]
    pub fn scoped(mut self, scope: &ActivityScope) -> Self {
        self.ticket_id.clone_from(&scope.ticket_id);
        self.run_id.clone_from(&scope.run_id);
        self
    }

    /// Replaces the human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Adds a structured field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns a structured field by key.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
