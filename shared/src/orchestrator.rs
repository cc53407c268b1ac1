//! Request lifecycle: location → prompt → model → sanitize → publish.
//!
//! The orchestrator is the only writer of [`Model`]. Every request takes a
//! ticket when it publishes `Loading`; any later write carrying an older
//! ticket is discarded, so a slow answer can never overwrite the state of a
//! newer request.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::capabilities::{
    Capabilities, ConfigError, ConfigProvider, LocationError, PermissionKind,
    ThrottledConfigProvider,
};
use crate::config::CoreConfig;
use crate::event::Event;
use crate::generative::GenerateError;
use crate::model::{LocationSpec, Model, PromptRequest, RequestState, SendPrompt};
use crate::view::ViewModel;
use crate::{prompt, sanitize};

pub const LOCATION_NOT_AVAILABLE: &str = "Location not available";
pub const SERVER_PROBLEM_PREFIX: &str = "Problem with the server: ";

const TRANSITION_BUFFER: usize = 64;

/// One published state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub ticket: u64,
    pub state: RequestState,
}

/// Why a request ended in `Error`. Never leaves this module except as text.
#[derive(Debug, Error)]
enum RequestError {
    #[error("Location not available")]
    LocationUnavailable(#[source] LocationError),

    #[error("{0}")]
    Generate(#[from] GenerateError),
}

pub struct RequestOrchestrator {
    caps: Capabilities,
    config: Arc<ThrottledConfigProvider<Arc<dyn ConfigProvider>>>,
    model: watch::Sender<Model>,
    transitions: broadcast::Sender<Transition>,
}

impl RequestOrchestrator {
    pub fn new(caps: Capabilities, config: &CoreConfig) -> Result<Self, ConfigError> {
        config.validate().map_err(|e| {
            error!(error = %e, "Invalid core configuration");
            e
        })?;
        let throttled =
            ThrottledConfigProvider::new(caps.config.clone(), config.min_credential_refetch);
        let (model, _) = watch::channel(Model::default());
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);

        Ok(Self {
            caps,
            config: Arc::new(throttled),
            model,
            transitions,
        })
    }

    /// Reactive view of the current model.
    pub fn subscribe(&self) -> watch::Receiver<Model> {
        self.model.subscribe()
    }

    /// Stream of every accepted transition, in publish order.
    pub fn transitions(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    pub fn current_state(&self) -> RequestState {
        self.model.borrow().request.clone()
    }

    /// Text for the "Your Location" readout.
    pub fn current_display_location(&self) -> String {
        self.model.borrow().location_text.clone()
    }

    pub fn view(&self) -> ViewModel {
        ViewModel::from_model(&self.model.borrow())
    }

    /// Shows the shell's explanation after the user refused location access.
    pub fn report_location_denied(&self, message: impl Into<String>) {
        let message = message.into();
        self.model.send_modify(|model| model.location_text = message);
    }

    // ------------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------------

    /// Issues a new ticket and publishes `Loading` under it.
    fn begin(&self) -> u64 {
        let mut ticket = 0;
        self.model.send_modify(|model| {
            model.active_ticket += 1;
            ticket = model.active_ticket;
            model.request = RequestState::Loading;
        });
        let _ = self.transitions.send(Transition {
            ticket,
            state: RequestState::Loading,
        });
        ticket
    }

    /// Publishes `state` if `ticket` is still the newest. Returns whether it
    /// was accepted.
    fn publish(&self, ticket: u64, state: RequestState) -> bool {
        let transitions = &self.transitions;
        let accepted = self.model.send_if_modified(|model| {
            if model.active_ticket != ticket {
                return false;
            }
            model.request = state.clone();
            let _ = transitions.send(Transition {
                ticket,
                state: state.clone(),
            });
            true
        });
        if !accepted {
            debug!(ticket, ?state, "Dropping stale result");
        }
        accepted
    }

    /// Replaces the location readout if `ticket` is still the newest.
    fn publish_location(&self, ticket: u64, readout: String) -> bool {
        self.model.send_if_modified(|model| {
            if model.active_ticket != ticket {
                return false;
            }
            model.location_text = readout;
            true
        })
    }

    // ------------------------------------------------------------------------
    // Credential
    // ------------------------------------------------------------------------

    /// Startup credential fetch: `Loading`, then `Initial` or
    /// `Error("Problem with the server: ...")`.
    pub async fn bootstrap(&self) {
        self.bootstrap_cancellable(CancellationToken::new()).await
    }

    /// As [`bootstrap`](Self::bootstrap). If `cancel` fires first the fetch is
    /// dropped, the credential stays unset and a still-current bootstrap
    /// falls back to `Initial`.
    #[instrument(skip(self, cancel), fields(ticket = tracing::field::Empty))]
    pub async fn bootstrap_cancellable(&self, cancel: CancellationToken) {
        let ticket = self.begin();
        tracing::Span::current().record("ticket", ticket);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = self.load_credential() => Some(outcome),
        };

        let state = match outcome {
            None => {
                info!("Credential fetch cancelled");
                RequestState::Initial
            }
            Some(Ok(())) => RequestState::Initial,
            Some(Err(e)) => RequestState::Error(format!("{SERVER_PROBLEM_PREFIX}{e}")),
        };
        self.publish(ticket, state);
    }

    /// On-demand refetch; leaves the request state untouched.
    #[instrument(skip(self))]
    pub async fn refresh_credential(&self) -> Result<(), ConfigError> {
        self.load_credential().await
    }

    async fn load_credential(&self) -> Result<(), ConfigError> {
        let credential = self.config.fetch_credential().await?;
        self.caps.generator.configure(credential).await;
        info!("Credential installed");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Single entry point for shell events.
    #[instrument(skip(self, event, cancel), fields(event = event.name()))]
    pub async fn update(&self, event: Event, cancel: CancellationToken) {
        if event.is_user_initiated() {
            debug!("User action");
        }

        match event {
            Event::AppStarted => self.bootstrap_cancellable(cancel).await,

            Event::CredentialRefreshRequested => {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    outcome = self.refresh_credential() => Some(outcome),
                };
                match outcome {
                    None => info!("Credential refresh cancelled"),
                    Some(Ok(())) => {}
                    Some(Err(e)) => warn!(error = %e, "Credential refresh failed"),
                }
            }

            Event::PromptSubmitted(command) => self.send_prompt_cancellable(command, cancel).await,

            Event::LocationPermissionDenied { message } => self.report_location_denied(message),
        }
    }

    /// Fire-and-forget entry point for the UI.
    pub fn dispatch(self: &Arc<Self>, event: impl Into<Event>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let event = event.into();
        tokio::spawn(async move { this.update(event, CancellationToken::new()).await })
    }

    pub async fn send_prompt(&self, command: SendPrompt) {
        self.send_prompt_cancellable(command, CancellationToken::new())
            .await
    }

    /// Runs one request. If `cancel` fires first, the work is dropped and a
    /// still-current request falls back to `Initial`.
    #[instrument(skip(self, command, cancel), fields(intent = ?command.intent, ticket = tracing::field::Empty))]
    pub async fn send_prompt_cancellable(&self, command: SendPrompt, cancel: CancellationToken) {
        let ticket = self.begin();
        tracing::Span::current().record("ticket", ticket);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = self.run(ticket, command) => Some(outcome),
        };

        let state = match outcome {
            None => {
                info!("Request cancelled");
                RequestState::Initial
            }
            Some(Ok(answer)) => RequestState::Success(answer),
            Some(Err(e)) => {
                warn!(error = %e, "Request failed");
                RequestState::Error(e.to_string())
            }
        };
        self.publish(ticket, state);
    }

    async fn run(&self, ticket: u64, command: SendPrompt) -> Result<String, RequestError> {
        let location = match command.manual_location() {
            Some(place) => LocationSpec::Place(place.to_string()),
            None => self.locate(ticket).await?,
        };

        let request = PromptRequest::from_command(command, location);
        let text = prompt::build(
            request.intent,
            &request.location.prompt_text(),
            request.free_text.as_deref().unwrap_or_default(),
        );
        debug!(prompt_len = text.len(), "Prompt built");

        let answer = self
            .caps
            .generator
            .generate(&text, request.photo.as_ref())
            .await?;

        Ok(sanitize::clean(&answer))
    }

    async fn locate(&self, ticket: u64) -> Result<LocationSpec, RequestError> {
        let permission = self.caps.permissions.request(PermissionKind::Location).await;
        if !permission.is_granted() {
            warn!(?permission, "Location permission not granted");
            return Err(RequestError::LocationUnavailable(LocationError::PermissionDenied));
        }

        let fix = self
            .caps
            .location
            .current_location()
            .await
            .map_err(|e| {
                warn!(error = %e, "No GPS location");
                RequestError::LocationUnavailable(e)
            })?;

        if !self.publish_location(ticket, fix.detailed_text()) {
            debug!(ticket, "Dropping readout of superseded request");
        }

        Ok(LocationSpec::Coordinates(fix.coordinate))
    }
}
