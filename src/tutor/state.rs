use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Per-conversation state the tools read and write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionState {
    /// Topic tags in first-seen order, never duplicated.
    #[serde(default)]
    pub recent_topics: Vec<String>,
    /// Last language the student asked for.
    #[serde(default)]
    pub preferred_language: Option<String>,
    /// Opaque progress summary supplied by the host.
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub progress: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            recent_topics: Vec::new(),
            preferred_language: None,
            progress: empty_object(),
        }
    }
}

impl SessionState {
    /// Seed with a progress summary.
    pub fn with_progress(progress: Value) -> Self {
        Self {
            progress,
            ..Default::default()
        }
    }

    /// Append `tag` unless an identical one is already recorded; returns whether it was added.
    pub fn record_topic(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.recent_topics.contains(&tag) {
            return false;
        }
        self.recent_topics.push(tag);
        true
    }

    pub fn set_preferred_language(&mut self, language: impl Into<String>) {
        self.preferred_language = Some(language.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let state = SessionState::default();
        assert!(state.recent_topics.is_empty());
        assert_eq!(state.preferred_language, None);
        assert_eq!(state.progress, serde_json::json!({}));
    }

    #[test]
    fn topics_keep_order_without_duplicates() {
        let mut state = SessionState::default();
        assert!(state.record_topic("math:1+1"));
        assert!(state.record_topic("lit:Macbeth|undergrad"));
        assert!(!state.record_topic("math:1+1"));
        assert_eq!(state.recent_topics, ["math:1+1", "lit:Macbeth|undergrad"]);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let state: SessionState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, SessionState::default());
    }
}
