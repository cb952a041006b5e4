use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModerationConfig {
    #[serde(default = "ModerationConfig::default_blocked_terms")]
    pub blocked_terms: Vec<String>,
}

impl ModerationConfig {
    fn default_blocked_terms() -> Vec<String> {
        ["spam", "abuse", "hate"].map(str::to_string).to_vec()
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            blocked_terms: Self::default_blocked_terms(),
        }
    }
}

/// Post-hoc audit classifier for user input. Never blocks the provider call
/// and never touches the bot response; a hit only sets the turn's flag.
pub trait ModerationFilter: Send + Sync {
    fn classify(&self, user_message: &str) -> bool;
}

pub struct TermListFilter {
    terms: Vec<String>,
}

impl TermListFilter {
    pub fn new(config: &ModerationConfig) -> Self {
        Self {
            terms: config
                .blocked_terms
                .iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

impl ModerationFilter for TermListFilter {
    fn classify(&self, user_message: &str) -> bool {
        let lowered = user_message.to_lowercase();
        self.terms.iter().any(|term| lowered.contains(term))
    }
}
