//! Provider B: LibreTranslate-style `POST /translate` returning `{translatedText}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Translator;
use crate::error::TranslateError;

const PROVIDER: &str = "libre";

pub struct LibreTranslator {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct LibreResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

impl LibreTranslator {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Translator for LibreTranslator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn translate(&self, word: &str) -> Result<Option<String>, TranslateError> {
        let response = self
            .http
            .post(format!("{}/translate", self.base_url))
            .json(&LibreRequest {
                q: word,
                source: "auto",
                target: "zh",
                format: "text",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %body.chars().take(200).collect::<String>(),
                "libre non-OK response"
            );
            return Err(TranslateError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let parsed: LibreResponse =
            response
                .json()
                .await
                .map_err(|e| TranslateError::MalformedResponse {
                    provider: PROVIDER,
                    detail: e.to_string(),
                })?;

        Ok(parsed
            .translated_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_json_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_json(json!({"q": "dog", "source": "auto", "target": "zh", "format": "text"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"translatedText": "狗"})))
            .expect(1)
            .mount(&server)
            .await;

        let t = LibreTranslator::new(reqwest::Client::new(), &server.uri());
        assert_eq!(t.translate("dog").await.unwrap().as_deref(), Some("狗"));
    }

    #[tokio::test]
    async fn missing_field_is_a_miss_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"other": 1})))
            .mount(&server)
            .await;

        let t = LibreTranslator::new(reqwest::Client::new(), &server.uri());
        assert_eq!(t.translate("dog").await.unwrap(), None);
    }

    #[tokio::test]
    async fn detail_lookup_is_unsupported() {
        let t = LibreTranslator::new(reqwest::Client::new(), "http://127.0.0.1:9");
        assert_eq!(t.lookup_detail("dog").await.unwrap(), None);
    }
}
