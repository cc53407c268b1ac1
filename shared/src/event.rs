use crate::model::SendPrompt;

/// Everything the shell can tell the core.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Launch: fetch the credential before the first request.
    AppStarted,
    CredentialRefreshRequested,

    PromptSubmitted(SendPrompt),

    /// The user refused location access; `message` replaces the readout.
    LocationPermissionDenied {
        message: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::AppStarted => "app_started",
            Event::CredentialRefreshRequested => "credential_refresh_requested",
            Event::PromptSubmitted(_) => "prompt_submitted",
            Event::LocationPermissionDenied { .. } => "location_permission_denied",
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Event::PromptSubmitted(_) | Event::LocationPermissionDenied { .. }
        )
    }
}

impl From<SendPrompt> for Event {
    fn from(command: SendPrompt) -> Self {
        Event::PromptSubmitted(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Intent;

    #[test]
    fn prompt_converts_into_user_event() {
        let event: Event = SendPrompt::new(Intent::Safety).into();
        assert_eq!(event.name(), "prompt_submitted");
        assert!(event.is_user_initiated());
        assert!(!Event::AppStarted.is_user_initiated());
        assert!(!Event::CredentialRefreshRequested.is_user_initiated());
    }
}
