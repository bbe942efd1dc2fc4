//! Natural-language answers and insights about a dataset.
//!
//! - rule-based narration, always available (`rules`)
//! - language-model narration over a [`TextCompletion`] backend (`llm`)
//!
//! [`Narrator`] prefers the backend when one is configured and falls back to
//! the rules on any failure, so callers always get text back.

pub mod llm;
pub mod rules;

pub use llm::*;
pub use rules::*;

use tracing::{debug, warn};

use crate::config::NarratorConfig;
use crate::domain::Dataset;

pub struct Narrator {
    config: NarratorConfig,
    backend: Option<Box<dyn TextCompletion>>,
}

impl Narrator {
    /// Build from settings; without an API key the narrator is rule-based.
    pub fn new(config: NarratorConfig) -> Self {
        let backend: Option<Box<dyn TextCompletion>> = match GeminiClient::new(&config) {
            Ok(client) => Some(Box::new(client)),
            Err(e) => {
                debug!(error = %e, "language model disabled");
                None
            }
        };
        Self { config, backend }
    }

    pub fn with_backend(config: NarratorConfig, backend: Box<dyn TextCompletion>) -> Self {
        Self {
            config,
            backend: Some(backend),
        }
    }

    /// Replace the settings (e.g. after the API key changed) and rebuild the backend.
    pub fn reconfigure(&mut self, config: NarratorConfig) {
        *self = Self::new(config);
    }

    pub fn config(&self) -> &NarratorConfig {
        &self.config
    }

    pub fn has_llm(&self) -> bool {
        self.backend.is_some()
    }

    /// Answer a free-text question about the dataset.
    pub fn answer(&self, query: &str, dataset: &Dataset) -> String {
        if let Some(backend) = &self.backend {
            match backend.complete(&query_prompt(query, dataset)) {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => warn!("completion returned an empty answer, using rule-based answer"),
                Err(e) => warn!(error = %e, "completion failed, using rule-based answer"),
            }
        }
        narrate_fallback(query, dataset)
    }

    /// Three to five headline observations about the dataset.
    pub fn insights(&self, dataset: &Dataset) -> Vec<String> {
        if let Some(backend) = &self.backend {
            match backend.complete(&insights_prompt(dataset)) {
                Ok(text) => {
                    let insights = parse_insights(&text);
                    if !insights.is_empty() {
                        return insights;
                    }
                    warn!("completion returned no usable insights, using rule-based insights");
                }
                Err(e) => warn!(error = %e, "completion failed, using rule-based insights"),
            }
        }
        fallback_insights(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Column;
    use crate::error::AnalysisError;

    struct Canned(Result<String, AnalysisError>);

    impl TextCompletion for Canned {
        fn complete(&self, _prompt: &str) -> Result<String, AnalysisError> {
            self.0.clone()
        }
    }

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Column::number("revenue", (0..20).map(|i| Some(i as f64)).collect()),
            Column::text("plan", (0..20).map(|i| Some(format!("p{}", i % 2))).collect()),
        ])
        .unwrap()
    }

    #[test]
    fn backend_answer_is_returned_verbatim() {
        let narrator = Narrator::with_backend(NarratorConfig::default(), Box::new(Canned(Ok("Revenue is up.".into()))));
        assert!(narrator.has_llm());
        assert_eq!(narrator.answer("how is revenue?", &dataset()), "Revenue is up.");
    }

    #[test]
    fn backend_failure_falls_back_to_rules() {
        let narrator = Narrator::with_backend(
            NarratorConfig::default(),
            Box::new(Canned(Err(AnalysisError::Completion("timeout".into())))),
        );
        let ds = dataset();
        assert_eq!(narrator.answer("average revenue", &ds), narrate_fallback("average revenue", &ds));
        assert_eq!(narrator.insights(&ds), fallback_insights(&ds));
    }

    #[test]
    fn blank_backend_answer_falls_back_to_rules() {
        let narrator = Narrator::with_backend(NarratorConfig::default(), Box::new(Canned(Ok(" \n ".into()))));
        let ds = dataset();
        assert_eq!(narrator.answer("average revenue", &ds), narrate_fallback("average revenue", &ds));
        assert_eq!(narrator.insights(&ds), fallback_insights(&ds));
    }

    #[test]
    fn insights_parse_backend_bullets() {
        let narrator = Narrator::with_backend(
            NarratorConfig::default(),
            Box::new(Canned(Ok("- First finding\n- Second finding\n".into()))),
        );
        assert_eq!(narrator.insights(&dataset()), vec!["First finding", "Second finding"]);
    }

    #[test]
    fn no_api_key_means_rule_based() {
        let mut narrator = Narrator::new(NarratorConfig::default());
        assert!(!narrator.has_llm());
        assert!(narrator.answer("hello", &dataset()).starts_with("Here is an overview"));

        let config = NarratorConfig {
            api_key: Some("test-key".into()),
            ..NarratorConfig::default()
        };
        narrator.reconfigure(config.clone());
        assert!(narrator.has_llm());
        assert_eq!(narrator.config(), &config);
    }
}
