// lib.rs - Travel assistant shared core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capabilities;
pub mod config;
pub mod event;
pub mod generative;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod sanitize;
pub mod view;

pub use capabilities::Capabilities;
pub use config::CoreConfig;
pub use event::Event;
pub use generative::{GeminiClient, GenerateError, GenerativeModel};
pub use model::{
    ApiCredential, Coordinate, CoordinateError, Intent, LocationFix, LocationSpec, Model, Photo,
    PromptRequest, RequestState, SendPrompt,
};
pub use orchestrator::{RequestOrchestrator, Transition};
pub use view::{ActionButton, ViewModel};
