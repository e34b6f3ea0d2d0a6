/// Answer generation through a local Ollama instance (`POST /api/generate`).
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use super::{SynthError, Synthesizer};
use crate::config::GenerationConfig;

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaSynthesizer {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaSynthesizer {
    pub fn new(config: &GenerationConfig) -> Result<Self, SynthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SynthError::RequestFailed(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

impl Synthesizer for OllamaSynthesizer {
    fn synthesize(&self, prompt: &str) -> Result<String, SynthError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, prompt_chars = prompt.len(), "requesting answer");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .map_err(|e| SynthError::RequestFailed(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(SynthError::RequestFailed(format!("{status}: {detail}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| SynthError::InvalidResponse(e.to_string()))?;
        Ok(parsed.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let json = r#"{"model":"llama3.2","response":"Forty-two.","done":true}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.response, "Forty-two.");

        let missing: GenerateResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(missing.response.is_empty());
    }

    #[test]
    fn test_model_is_static() {
        let config = GenerationConfig {
            model: "mistral".to_string(),
            ..GenerationConfig::default()
        };
        let synth = OllamaSynthesizer::new(&config).unwrap();
        assert_eq!(synth.model(), "mistral");
    }
}
