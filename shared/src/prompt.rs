//! Intent templates and placeholder substitution.
//!
//! The wording of every template is part of the output-style contract with
//! the model (no echoing of raw location values, no acknowledgements), so
//! the text must stay as written.

use crate::model::Intent;

pub const LOCATION_PLACEHOLDER: &str = "{location}";
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

impl Intent {
    pub fn template(self) -> &'static str {
        match self {
            Intent::Initial => "Tell me interesting things about this location: {location} Do not mention these values in response. Don't confirm you understand me. Behave like a tourist guide. Tell me about history, tourist spots, restaurants, etc.",
            Intent::History => "Tell me about history of this location: {location} Do not mention these values in response. Don't confirm you understand me. Behave like a tourist guide.",
            Intent::Restaurants => "Tell me about restaurants and interesting food spots in a walking distance from this location: {location} Do not mention these values in response. Don't confirm you understand me. Mention restaurants' names!",
            Intent::TouristSpots => "Tell me about 5-6 most famous and important tourist spots/ attractions around this location that are worth to visit: {location} Do not mention these values in response. Don't confirm you understand me. Behave like a tourist guide.",
            Intent::Safety => "Tell me about risks I should be careful on, and behaviours I should avoid as a tourist to stay safe in this location. Be specific. You can tell me also what behaviours should I avoid not to offend locals. Refer to this place specifically: {location} Do not mention these values in response. Don't confirm you understand me. Behave like a tourist guide.",
            Intent::Custom => "{prompt}. Please answer in relation to the place: {location} Do not mention these values in response. Don't confirm you understand me.",
            Intent::Photo => "{prompt}. Please tell me what is in the picture. Please answer in relation to the place: {location} Do not mention these values in response. Don't confirm you understand me.",
        }
    }
}

/// Fills the intent's template in a single pass over the template text.
///
/// Substituted values are never rescanned, so a location or question that
/// itself contains `{prompt}` is inserted verbatim.
pub fn build(intent: Intent, location: &str, free_text: &str) -> String {
    let template = intent.template();
    let mut out = String::with_capacity(template.len() + location.len() + free_text.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix(LOCATION_PLACEHOLDER) {
            out.push_str(location);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(PROMPT_PLACEHOLDER) {
            out.push_str(free_text);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
