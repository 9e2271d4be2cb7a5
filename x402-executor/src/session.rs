use serde::Serialize;

use crate::{errors::SessionError, mode::SigningMode, progress::ProgressEvent};

/// The caller-side record of one execution: which service, who paid, and the event timeline.
///
/// At most one execution is in flight per session. Events are only ever appended.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSession {
    service_id: Option<String>,
    mode: Option<SigningMode>,
    events: Vec<ProgressEvent>,
    is_executing: bool,
}

impl ExecutionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new execution, discarding the previous timeline.
    pub fn begin(
        &mut self,
        service_id: impl Into<String>,
        mode: SigningMode,
    ) -> Result<(), SessionError> {
        if self.is_executing {
            return Err(SessionError::AlreadyExecuting(
                self.service_id.clone().unwrap_or_default(),
            ));
        }

        self.service_id = Some(service_id.into());
        self.mode = Some(mode);
        self.events.clear();
        self.is_executing = true;
        Ok(())
    }

    /// Append an event. A terminal event ends the execution.
    pub fn record(&mut self, event: ProgressEvent) {
        if event.is_terminal() {
            self.is_executing = false;
        }
        self.events.push(event);
    }

    /// Mark the execution as over without a terminal event, e.g. after cancelling.
    pub fn finish(&mut self) {
        self.is_executing = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    pub fn mode(&self) -> Option<SigningMode> {
        self.mode
    }

    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    pub fn is_executing(&self) -> bool {
        self.is_executing
    }

    pub fn last_event(&self) -> Option<&ProgressEvent> {
        self.events.last()
    }
}
