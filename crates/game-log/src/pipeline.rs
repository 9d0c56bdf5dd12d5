use tracing::{debug, warn};

use crate::classify::{KILL_MARKER, KillLine, ReportContext, classify};
use crate::event::{Classified, ClassifiedEvent};
use crate::identity::Identity;
use crate::state::SessionState;

/// Runs one line through state tracking and then classification.
///
/// Owns the session state; there is exactly one per monitored log.
#[derive(Debug)]
pub struct LineProcessor {
    identity: Identity,
    context: ReportContext,
    state: SessionState,
}

impl LineProcessor {
    pub fn new(identity: Identity, context: ReportContext) -> Self {
        Self {
            identity,
            context,
            state: SessionState::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Processes one line. `None` means nothing of interest.
    ///
    /// State-bearing lines are applied first; a line that is not one is
    /// classified as a kill line if it carries the kill marker and the local
    /// handle is exactly its victim or killer. Unparseable kill lines that
    /// mention the handle still go through classification so they are
    /// reported as parse errors.
    pub fn process(&mut self, line: &str, upload_allowed: bool) -> Option<Classified> {
        if let Some(event) = self.state.apply_line(line, &self.identity) {
            return Some(Classified {
                event,
                upload_allowed,
            });
        }

        let handle = self.identity.handle();
        if !line.contains(KILL_MARKER) || !line.contains(handle) {
            return None;
        }
        if KillLine::parse(line).is_ok_and(|kill| !kill.involves(handle)) {
            return None;
        }

        let classified = classify(
            line,
            &self.state,
            &self.identity,
            &self.context,
            upload_allowed,
        );
        match &classified.event {
            ClassifiedEvent::ParseError { reason } => {
                warn!(reason = %reason, line, "unparseable kill line")
            }
            ClassifiedEvent::Excluded(exclusion) => debug!(?exclusion, "kill line excluded"),
            ClassifiedEvent::Reset => debug!("environment reset"),
            _ => {}
        }
        Some(classified)
    }
}
