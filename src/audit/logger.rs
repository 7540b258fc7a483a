//! Component-bound handle over an activity sink.

use super::{
    domain::{ActivityEvent, ActivityLevel},
    ports::ActivitySink,
};
use std::sync::Arc;

/// Emits activity events on behalf of one component.
///
/// Each event is mirrored to `tracing` and then appended to the sink. Sink
/// failures are reported through `tracing` and otherwise ignored; the audit
/// trail never fails a run.
#[derive(Clone)]
pub struct ActivityLogger {
    component: Arc<str>,
    sink: Arc<dyn ActivitySink>,
}

impl ActivityLogger {
    /// Creates a logger for `component` writing to `sink`.
    #[must_use]
    pub fn new(component: &str, sink: Arc<dyn ActivitySink>) -> Self {
        Self {
            component: Arc::from(component),
            sink,
        }
    }

    /// Returns a logger sharing the same sink under another component name.
    #[must_use]
    pub fn for_component(&self, component: &str) -> Self {
        Self::new(component, Arc::clone(&self.sink))
    }

    /// Returns the component name.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Stamps the event with this component and records it.
    pub fn emit(&self, mut event: ActivityEvent) {
        self.component.as_ref().clone_into(&mut event.component);
        trace_event(&event);
        if let Err(err) = self.sink.record(&event) {
            tracing::warn!(
                component = %self.component,
                event = %event.event,
                error = %err,
                "activity sink rejected event"
            );
        }
    }
}

impl std::fmt::Debug for ActivityLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLogger")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

fn trace_event(event: &ActivityEvent) {
    let run_id = event.run_id.as_deref().unwrap_or_default();
    let ticket_id = event.ticket_id.as_deref().unwrap_or_default();
    let fields = serde_json::Value::Object(event.fields.clone());
    match event.level {
        ActivityLevel::Debug => tracing::debug!(
            component = %event.component, run_id, ticket_id, %fields, "{}", event.event
        ),
        ActivityLevel::Info => tracing::info!(
            component = %event.component, run_id, ticket_id, %fields, "{}", event.event
        ),
        ActivityLevel::Warning => tracing::warn!(
            component = %event.component, run_id, ticket_id, %fields, "{}", event.event
        ),
        ActivityLevel::Error => tracing::error!(
            component = %event.component, run_id, ticket_id, %fields, "{}", event.event
        ),
    }
}
