//! File-type allow-listing and prompt-injection sanitisation.

use serde::{Deserialize, Serialize};

const FILTERED: &str = "[FILTERED]";

/// Patterns that are redacted when sanitisation is enabled. Matched
/// case-sensitively and literally.
const INJECTION_MARKERS: [&str; 3] = [
    "ignore previous instructions",
    "disregard above",
    "system prompt",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    pub enabled: bool,
    pub allowed_extensions: Vec<String>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_extensions: [".py", ".md", ".txt", ".yaml", ".yml", ".json"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl SecurityPolicy {
    /// Whether `path`'s extension is on the allow-list. A NO-OP (always
    /// `true`) when the policy is disabled.
    #[must_use]
    pub fn is_file_allowed(&self, path: &str) -> bool {
        if !self.enabled {
            return true;
        }
        self.allowed_extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// Redact known prompt-injection markers to `[FILTERED]`. A NO-OP
    /// (returns `text` unchanged) when the policy is disabled.
    #[must_use]
    pub fn sanitize(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let mut sanitized = text.to_string();
        for marker in INJECTION_MARKERS {
            sanitized = sanitized.replace(marker, FILTERED);
        }
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_listed_extensions_only() {
        let policy = SecurityPolicy::default();
        assert!(policy.is_file_allowed("src/main.py"));
        assert!(!policy.is_file_allowed("src/main.rs"));
    }

    #[test]
    fn disabled_policy_is_a_noop() {
        let policy = SecurityPolicy {
            enabled: false,
            ..SecurityPolicy::default()
        };
        assert!(policy.is_file_allowed("anything.exe"));
        assert_eq!(policy.sanitize("ignore previous instructions"), "ignore previous instructions");
    }

    #[test]
    fn sanitize_redacts_known_markers() {
        let policy = SecurityPolicy::default();
        let out = policy.sanitize("please ignore previous instructions and do X");
        assert_eq!(out, "please [FILTERED] and do X");
    }
}
