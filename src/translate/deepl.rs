//! Translation through the DeepL REST API.

use crate::error::{AutosubError, Result};
use crate::translate::Translator;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEEPL_FREE_API: &str = "https://api-free.deepl.com";
const DEEPL_PRO_API: &str = "https://api.deepl.com";

/// Translator using the DeepL API.
pub struct DeepLTranslator {
    client: Client,
    auth_key: String,
    base_url: String,
}

impl DeepLTranslator {
    /// Create a translator; free-tier keys (suffix `:fx`) use the free host.
    pub fn new(auth_key: String) -> Self {
        let base_url = if auth_key.ends_with(":fx") {
            DEEPL_FREE_API
        } else {
            DEEPL_PRO_API
        };

        Self {
            client: Client::new(),
            auth_key,
            base_url: base_url.to_string(),
        }
    }

    /// Point the translator at another API root (e.g. a local mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a [&'a str],
    target_lang: String,
}

#[derive(Deserialize, Debug)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Deserialize, Debug)]
struct Translation {
    text: String,
}

#[derive(Deserialize, Debug)]
struct DeepLError {
    message: String,
}

#[async_trait]
impl Translator for DeepLTranslator {
    async fn translate_batch(&self, texts: &[&str], target_lang: &str) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Translating {} text(s) to {}", texts.len(), target_lang);

        let request = TranslateRequest {
            text: texts,
            target_lang: target_lang.to_uppercase(),
        };

        let response = self
            .client
            .post(format!("{}/v2/translate", self.base_url))
            .header("Authorization", format!("DeepL-Auth-Key {}", self.auth_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AutosubError::Api(format!("Translation request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AutosubError::Api(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<DeepLError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AutosubError::Auth(format!("DeepL rejected the auth key: {}", message))
                }
                StatusCode::BAD_REQUEST if message.to_lowercase().contains("target_lang") => {
                    AutosubError::UnsupportedLanguage(format!("{} ({})", target_lang, message))
                }
                _ => AutosubError::Api(format!("DeepL API error ({}): {}", status, message)),
            });
        }

        let parsed: TranslateResponse = serde_json::from_str(&body).map_err(|e| {
            AutosubError::Api(format!("Failed to parse translation response: {}", e))
        })?;

        Ok(parsed.translations.into_iter().map(|t| t.text).collect())
    }

    fn name(&self) -> &'static str {
        "deepl"
    }
}
