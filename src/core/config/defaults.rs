use crate::core::config::data::Config;
use crate::core::constants::{DEFAULT_BASE_URL, DEFAULT_MODEL, SYSTEM_PROMPT};
use crate::core::tools::Mood;

impl Config {
    /// Model to use, preferring an explicit override (e.g. `--model`).
    pub fn effective_model(&self, override_model: Option<&str>) -> String {
        override_model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .or(self.model.as_deref())
            .unwrap_or(DEFAULT_MODEL)
            .to_string()
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn effective_system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT)
    }

    pub fn effective_mood(&self) -> Mood {
        self.mood.unwrap_or_default()
    }
}
