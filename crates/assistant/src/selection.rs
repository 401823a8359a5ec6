//! Model selection against the provider's published model list.

use serde::Deserialize;

/// One entry from the provider's model listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelEntry {
    fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }

    fn is_experimental(&self) -> bool {
        self.name.contains("exp")
    }

    fn is_vision(&self) -> bool {
        self.name.contains("vision")
    }
}

/// Pick the model to use, resolved at most once per process.
///
/// Priority: first preferred substring that matches a non-experimental
/// generation-capable entry; then the first non-experimental, non-vision
/// generation-capable entry; then the hardcoded fallback.
pub fn select_model(entries: &[ModelEntry], preferred: &[String], fallback: &str) -> String {
    let generators: Vec<&ModelEntry> = entries.iter().filter(|e| e.supports_generation()).collect();

    for wanted in preferred {
        if let Some(entry) = generators
            .iter()
            .find(|e| e.name.contains(wanted.as_str()) && !e.is_experimental())
        {
            return entry.name.clone();
        }
    }

    if let Some(entry) = generators
        .iter()
        .find(|e| !e.is_experimental() && !e.is_vision())
    {
        return entry.name.clone();
    }

    fallback.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, methods: &[&str]) -> ModelEntry {
        ModelEntry {
            name: name.to_string(),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn preferred() -> Vec<String> {
        vec!["gemini-1.5-flash".to_string(), "gemini-1.5-pro".to_string()]
    }

    #[test]
    fn picks_highest_priority_preferred_match() {
        let entries = vec![
            entry("models/gemini-1.5-pro", &["generateContent"]),
            entry("models/gemini-1.5-flash", &["generateContent"]),
        ];
        assert_eq!(
            select_model(&entries, &preferred(), "models/default"),
            "models/gemini-1.5-flash"
        );
    }

    #[test]
    fn skips_experimental_entries() {
        let entries = vec![
            entry("models/gemini-1.5-flash-exp", &["generateContent"]),
            entry("models/gemini-1.5-pro", &["generateContent"]),
        ];
        assert_eq!(
            select_model(&entries, &preferred(), "models/default"),
            "models/gemini-1.5-pro"
        );
    }

    #[test]
    fn ignores_entries_without_generation_support() {
        let entries = vec![
            entry("models/gemini-1.5-flash", &["embedContent"]),
            entry("models/gemini-1.5-pro", &["generateContent"]),
        ];
        assert_eq!(
            select_model(&entries, &preferred(), "models/default"),
            "models/gemini-1.5-pro"
        );
    }

    #[test]
    fn falls_back_to_first_plain_generator() {
        let entries = vec![
            entry("models/other-vision", &["generateContent"]),
            entry("models/other-chat", &["generateContent"]),
        ];
        assert_eq!(
            select_model(&entries, &preferred(), "models/default"),
            "models/other-chat"
        );
    }

    #[test]
    fn falls_back_to_hardcoded_default_when_nothing_matches() {
        let entries = vec![
            entry("models/other-vision", &["generateContent"]),
            entry("models/embedder", &["embedContent"]),
        ];
        assert_eq!(
            select_model(&entries, &preferred(), "models/default"),
            "models/default"
        );
        assert_eq!(select_model(&[], &preferred(), "models/default"), "models/default");
    }
}
