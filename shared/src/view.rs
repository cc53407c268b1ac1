use serde::{Deserialize, Serialize};

use crate::model::{Intent, Model, RequestState};

pub const OUTPUT_PLACEHOLDER: &str = "(My answers will appear here)";
pub const LOADING_TEXT: &str = "Loading...";
pub const FREE_TEXT_PLACEHOLDER: &str = "Feel free to ask me more!";

impl Intent {
    /// Button caption. `Custom` has no button of its own; its caption is the
    /// placeholder of the free-text box.
    pub fn label(self) -> &'static str {
        match self {
            Intent::Initial => "Let's start, tell me where I am",
            Intent::History => "History of this place",
            Intent::Restaurants => "Restaurants nearby",
            Intent::TouristSpots => "What attractions are worth-to-visit nearby",
            Intent::Safety => "What risks should I be aware of here?",
            Intent::Custom => FREE_TEXT_PLACEHOLDER,
            Intent::Photo => "Take a picture - I will tell you what it is!",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionButton {
    pub label: String,
    pub intent: Intent,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub output_text: String,
    pub location_text: String,
    pub is_loading: bool,
    pub actions: Vec<ActionButton>,
}

impl ViewModel {
    pub fn from_model(model: &Model) -> Self {
        let output_text = match &model.request {
            RequestState::Initial => OUTPUT_PLACEHOLDER.to_string(),
            RequestState::Loading => LOADING_TEXT.to_string(),
            RequestState::Success(answer) => answer.clone(),
            RequestState::Error(message) => format!("Error: {message}"),
        };

        let actions = Intent::ALL
            .iter()
            .filter(|intent| **intent != Intent::Custom)
            .map(|&intent| ActionButton {
                label: intent.label().to_string(),
                intent,
            })
            .collect();

        Self {
            output_text,
            location_text: model.location_text.clone(),
            is_loading: model.request.is_loading(),
            actions,
        }
    }
}
