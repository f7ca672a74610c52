//! Note-append collaborator: writes one markdown line per saved selection to
//! a note served by a local REST note server.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};
use tracing::{debug, info, warn};

use crate::config::NoteSettings;
use crate::error::AppendError;

/// What gets saved: the selection and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEntry {
    pub text: String,
    pub title: String,
    pub url: String,
}

/// `- **<selection>** — <title or URL host> · [source](<url>)\n`
pub fn format_line(entry: &NoteEntry) -> Result<String, AppendError> {
    let text = collapse_whitespace(&entry.text);
    if text.is_empty() {
        return Err(AppendError::NoSelection);
    }
    let title = collapse_whitespace(&entry.title);
    let origin = if title.is_empty() {
        Url::parse(&entry.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| AppendError::InvalidUrl(entry.url.clone()))?
    } else {
        title
    };
    Ok(format!("- **{text}** — {origin} · [source]({})\n", entry.url))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `<base>/vault/<note path>`, each path segment percent-encoded.
pub fn vault_url(api_base: &str, note_path: &str) -> Result<Url, AppendError> {
    let mut url = Url::parse(api_base).map_err(|e| AppendError::InvalidUrl(format!("{api_base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AppendError::InvalidUrl(api_base.to_string()))?
        .pop_if_empty()
        .push("vault")
        .extend(note_path.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}

pub struct NoteAppender {
    http: reqwest::Client,
}

impl NoteAppender {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Append-style write first, overwrite-style write second. Any non-404
    /// answer ends the sequence.
    pub async fn append(&self, settings: &NoteSettings, entry: &NoteEntry) -> Result<(), AppendError> {
        let line = format_line(entry)?;
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppendError::ConfigurationMissing(
                    "API key not set. Please configure it in extension options.".into(),
                )
            })?;

        let target = vault_url(&settings.api_base, &settings.note_path)?;
        let mut append_url = target.clone();
        append_url.set_query(Some("append=true"));
        let attempts = [(Method::POST, append_url), (Method::PUT, target)];

        let mut last_transport_error = None;
        for (method, url) in attempts {
            debug!(%method, %url, "note append attempt");
            let sent = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(api_key)
                .header(CONTENT_TYPE, "text/plain")
                .body(line.clone())
                .send()
                .await;

            let response = match sent {
                Ok(r) => r,
                Err(e) => {
                    warn!(%method, %url, error = %e, "note endpoint unreachable");
                    last_transport_error = Some(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                debug!(%method, %url, "note endpoint returned 404, trying next");
                last_transport_error = None;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            if status.is_success() {
                info!(note = %settings.note_path, "selection appended to note");
                return Ok(());
            }
            let body = if body.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                body
            };
            warn!(status = status.as_u16(), body = %body, "note service rejected append");
            return Err(AppendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        match last_transport_error {
            Some(e) => Err(AppendError::Transport(format!(
                "{} (writing {}): {e}",
                settings.api_base, settings.note_path
            ))),
            None => Err(AppendError::AllEndpointsFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(text: &str) -> NoteEntry {
        NoteEntry {
            text: text.into(),
            title: "A   Page\nTitle".into(),
            url: "https://example.com/post/1".into(),
        }
    }

    fn settings(base: &str) -> NoteSettings {
        NoteSettings {
            api_key: Some("secret".into()),
            api_base: base.into(),
            note_path: "Vocab-2.md".into(),
        }
    }

    #[test]
    fn line_format() {
        assert_eq!(
            format_line(&entry("  hello \n world ")).unwrap(),
            "- **hello world** — A Page Title · [source](https://example.com/post/1)\n"
        );
        let untitled = NoteEntry {
            title: " ".into(),
            ..entry("hi")
        };
        assert_eq!(
            format_line(&untitled).unwrap(),
            "- **hi** — example.com · [source](https://example.com/post/1)\n"
        );
    }

    #[test]
    fn vault_path_is_segment_encoded() {
        let url = vault_url("http://127.0.0.1:27124/", "Words/My Vocab.md").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:27124/vault/Words/My%20Vocab.md");
    }

    #[tokio::test]
    async fn empty_selection_fails_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let appender = NoteAppender::new(reqwest::Client::new());
        let err = appender.append(&settings(&server.uri()), &entry("   ")).await.unwrap_err();
        assert!(matches!(err, AppendError::NoSelection));
        assert_eq!(err.to_string(), "No selected text to save.");
    }

    #[tokio::test]
    async fn append_posts_line_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/Vocab-2.md"))
            .and(query_param("append", "true"))
            .and(header("authorization", "Bearer secret"))
            .and(header("content-type", "text/plain"))
            .and(body_string(
                "- **hello** — A Page Title · [source](https://example.com/post/1)\n",
            ))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let appender = NoteAppender::new(reqwest::Client::new());
        appender.append(&settings(&server.uri()), &entry("hello")).await.unwrap();
    }

    #[tokio::test]
    async fn not_found_falls_back_to_put() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/vault/Vocab-2.md"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let appender = NoteAppender::new(reqwest::Client::new());
        appender.append(&settings(&server.uri()), &entry("hello")).await.unwrap();
    }

    #[tokio::test]
    async fn non_404_failure_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let appender = NoteAppender::new(reqwest::Client::new());
        let err = appender.append(&settings(&server.uri()), &entry("hello")).await.unwrap_err();
        assert_eq!(err.to_string(), "Obsidian API error 401: bad key");
    }

    #[tokio::test]
    async fn all_404_is_all_endpoints_failed() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let appender = NoteAppender::new(reqwest::Client::new());
        let err = appender.append(&settings(&server.uri()), &entry("hello")).await.unwrap_err();
        assert!(matches!(err, AppendError::AllEndpointsFailed));
    }

    #[tokio::test]
    async fn missing_api_key_is_configuration_error() {
        let appender = NoteAppender::new(reqwest::Client::new());
        let s = NoteSettings {
            api_key: None,
            ..settings("http://127.0.0.1:9")
        };
        let err = appender.append(&s, &entry("hello")).await.unwrap_err();
        assert!(matches!(err, AppendError::ConfigurationMissing(_)));
    }
}
