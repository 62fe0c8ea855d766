//! Personality profiles and the compiled-in catalog.
//!
//! The catalog itself lives in the user store; this module supplies the
//! seed entries and the fallback profile used when the catalog cannot be
//! reached.

use serde::{Deserialize, Serialize};

use crate::ids::PersonalityId;

/// Catalog key of the default profile.
pub const DEFAULT_PERSONALITY_ID: &str = "default";

const DEFAULT_PROMPT: &str = "You are Ananya. You are a helpful and friendly AI with a warm, human-like personality. \
Talk naturally, as a real person would. Be kind, polite, and engaging. \
Your name is Ananya. Avoid using excessive emojis; use them only when a real person naturally would. \
Be a good, supportive friend. \
IMPORTANT: Keep your answers concise and to the point. Answer what the user asks without unnecessary filler.";

const SPIRITUAL_PROMPT: &str = "You are Ananya, in spiritual guide mode. You answer questions based on the wisdom of Hindu granths \
(like the Vedas, Upanishads, Puranas, Ramayana, Mahabharata, and Bhagavad Gita). \
You should quote or refer to teachings from these texts when relevant. Your tone is calm, wise, and compassionate.";

const NATIONALIST_PROMPT: &str = "You are Ananya, in nationalist mode. You are a proud Indian and you're happy to share that. \
Talk about India's culture, history, and achievements with genuine enthusiasm. \
Your tone is positive, confident, and full of hope for the country's future. \
It's like talking to a friend who really loves their homeland.";

/// A named system prompt shaping assistant behavior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityProfile {
    /// Catalog key.
    pub id: PersonalityId,
    /// Human-readable name shown in selection menus.
    pub display_name: String,
    /// Short description shown to users.
    pub description: String,
    /// System prompt sent to the model backend.
    pub system_prompt: String,
    /// Whether this is the catalog default. Exactly one entry is.
    pub is_default: bool,
}

impl PersonalityProfile {
    /// The compiled-in profile used when the catalog is unreachable.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            id: PersonalityId::from(DEFAULT_PERSONALITY_ID),
            display_name: "Default".into(),
            description: "Friendly, warm, and concise everyday companion.".into(),
            system_prompt: DEFAULT_PROMPT.into(),
            is_default: true,
        }
    }
}

/// Seed entries written to an empty catalog.
#[must_use]
pub fn builtin_catalog() -> Vec<PersonalityProfile> {
    vec![
        PersonalityProfile::fallback(),
        PersonalityProfile {
            id: PersonalityId::from("spiritual"),
            display_name: "Spiritual".into(),
            description: "Spiritual guide drawing on the wisdom of Hindu granths.".into(),
            system_prompt: SPIRITUAL_PROMPT.into(),
            is_default: false,
        },
        PersonalityProfile {
            id: PersonalityId::from("nationalist"),
            display_name: "Nationalist".into(),
            description: "Proud Indian sharing the country's culture and history.".into(),
            system_prompt: NATIONALIST_PROMPT.into(),
            is_default: false,
        },
    ]
}

/// Title-case a normalized personality key for display.
#[must_use]
pub fn display_name_for(id: &str) -> String {
    id.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_exactly_one_default() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.iter().filter(|p| p.is_default).count(), 1);
        assert_eq!(catalog[0].id.as_str(), DEFAULT_PERSONALITY_ID);
    }

    #[test]
    fn fallback_is_default_profile() {
        let fallback = PersonalityProfile::fallback();
        assert!(fallback.is_default);
        assert!(fallback.system_prompt.starts_with("You are Ananya."));
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name_for("spiritual"), "Spiritual");
        assert_eq!(display_name_for("tech_guru"), "Tech Guru");
        assert_eq!(display_name_for("old-school poet"), "Old School Poet");
    }
}
