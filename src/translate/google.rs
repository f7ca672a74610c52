//! Provider A: `translate_a/single` nested-array endpoint.
//! Every field of the detailed response is extracted independently; a
//! missing or oddly shaped field degrades to empty, never aborts the parse.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Definition, SynonymGroup, Translator, VocabDetail};
use crate::error::TranslateError;

const PROVIDER: &str = "google";
const TARGET_LANG: &str = "zh-CN";

pub const MAX_EXAMPLES: usize = 5;
pub const MAX_SYNONYMS_PER_POS: usize = 6;
pub const MAX_ALTERNATIVES: usize = 5;

/// `dt` parameters for the expanded lookup.
const DETAIL_DATA_TYPES: [&str; 7] = ["t", "bd", "md", "ex", "ss", "at", "rm"];

pub struct GoogleTranslator {
    http: reqwest::Client,
    base_url: String,
}

impl GoogleTranslator {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/translate_a/single", self.base_url)
    }

    async fn fetch(&self, query: &[(&str, &str)]) -> Result<Value, TranslateError> {
        let response = self
            .http
            .get(self.endpoint())
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %body.chars().take(200).collect::<String>(),
                "google non-OK response"
            );
            return Err(TranslateError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TranslateError::MalformedResponse {
                provider: PROVIDER,
                detail: e.to_string(),
            })
    }
}

/// Source language for the expanded lookup: English for ASCII words,
/// auto-detect otherwise.
pub fn detail_source_lang(word: &str) -> &'static str {
    if word.is_ascii() {
        "en"
    } else {
        "auto"
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn translate(&self, word: &str) -> Result<Option<String>, TranslateError> {
        let data = self
            .fetch(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", TARGET_LANG),
                ("dt", "t"),
                ("q", word),
            ])
            .await?;

        match primary_translation(&data) {
            Some(text) => Ok(Some(text)),
            None => Err(TranslateError::MalformedResponse {
                provider: PROVIDER,
                detail: "missing [0][0][0]".into(),
            }),
        }
    }

    async fn lookup_detail(&self, word: &str) -> Result<Option<VocabDetail>, TranslateError> {
        let mut query = vec![
            ("client", "gtx"),
            ("sl", detail_source_lang(word)),
            ("tl", TARGET_LANG),
        ];
        query.extend(DETAIL_DATA_TYPES.iter().map(|dt| ("dt", *dt)));
        query.push(("q", word));

        let data = self.fetch(&query).await?;
        let detail = parse_detail(word, &data);
        debug!(
            word,
            definitions = detail.definitions.len(),
            examples = detail.examples.len(),
            "google detail parsed"
        );
        if detail.translation.is_empty() && detail.definitions.is_empty() {
            return Ok(None);
        }
        Ok(Some(detail))
    }
}

// --- Guarded extraction helpers ---

fn at<'a>(value: &'a Value, path: &[usize]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, &i| v.get(i))
}

fn str_at(value: &Value, path: &[usize]) -> Option<String> {
    at(value, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn array_at<'a>(value: &'a Value, path: &[usize]) -> &'a [Value] {
    at(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn strings(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// `data[0][0][0]`.
pub fn primary_translation(data: &Value) -> Option<String> {
    str_at(data, &[0, 0, 0])
}

/// Full translation: segments of `data[0]` concatenated.
fn full_translation(data: &Value) -> String {
    array_at(data, &[0])
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect::<String>()
        .trim()
        .to_string()
}

/// The romanization row of `data[0]` carries the source transliteration at index 3.
fn phonetic(data: &Value) -> String {
    array_at(data, &[0])
        .iter()
        .find_map(|seg| str_at(seg, &[3]))
        .unwrap_or_default()
}

/// Dictionary rows (`data[1]`) merged with monolingual definitions (`data[12]`).
fn definitions(data: &Value) -> Vec<Definition> {
    let mut out: Vec<Definition> = array_at(data, &[1])
        .iter()
        .filter_map(|row| {
            let pos = str_at(row, &[0])?;
            Some(Definition {
                pos,
                meanings: strings(array_at(row, &[1])),
                definition: String::new(),
            })
        })
        .collect();

    for row in array_at(data, &[12]) {
        let Some(pos) = str_at(row, &[0]) else { continue };
        let Some(definition) = str_at(row, &[1, 0, 0]) else { continue };
        match out.iter_mut().find(|d| d.pos == pos) {
            Some(existing) if existing.definition.is_empty() => existing.definition = definition,
            Some(_) => {}
            None => out.push(Definition {
                pos,
                meanings: Vec::new(),
                definition,
            }),
        }
    }
    out
}

/// `data[13][0][i][0]`, HTML fragments with the headword in `<b>`.
fn examples(data: &Value) -> Vec<String> {
    array_at(data, &[13, 0])
        .iter()
        .filter_map(|ex| str_at(ex, &[0]))
        .take(MAX_EXAMPLES)
        .collect()
}

/// `data[11]`: `[pos, [[[words..], id], ..], base]`.
fn synonyms(data: &Value) -> Vec<SynonymGroup> {
    array_at(data, &[11])
        .iter()
        .filter_map(|row| {
            let pos = str_at(row, &[0])?;
            let words: Vec<String> = array_at(row, &[1])
                .iter()
                .flat_map(|set| strings(array_at(set, &[0])))
                .take(MAX_SYNONYMS_PER_POS)
                .collect();
            (!words.is_empty()).then_some(SynonymGroup { pos, words })
        })
        .collect()
}

/// `data[5][0][2][i][0]`, excluding the primary translation.
fn alternatives(data: &Value, primary: &str) -> Vec<String> {
    array_at(data, &[5, 0, 2])
        .iter()
        .filter_map(|alt| str_at(alt, &[0]))
        .filter(|alt| alt != primary)
        .take(MAX_ALTERNATIVES)
        .collect()
}

pub fn parse_detail(word: &str, data: &Value) -> VocabDetail {
    let translation = full_translation(data);
    let alternatives = alternatives(data, &translation);
    VocabDetail {
        word: word.to_string(),
        phonetic: phonetic(data),
        definitions: definitions(data),
        examples: examples(data),
        synonyms: synonyms(data),
        alternatives,
        translation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn translator(server: &MockServer) -> GoogleTranslator {
        GoogleTranslator::new(reqwest::Client::new(), &server.uri())
    }

    #[test]
    fn primary_translation_from_nested_arrays() {
        let data = json!([[["猫", "cat", null, null, 1]]]);
        assert_eq!(primary_translation(&data).as_deref(), Some("猫"));
        assert_eq!(primary_translation(&json!({"oops": 1})), None);
        assert_eq!(primary_translation(&json!([[]])), None);
    }

    #[test]
    fn detail_parse_extracts_every_field() {
        let data = json!([
            [["跑", "run", null, null, 10], [null, null, "pǎo", "rʌn"]],
            [
                ["verb", ["跑", "运行", "经营"], [["跑", ["run"]]], "run", 2],
                ["noun", ["运行"], [], "run", 1]
            ],
            "en", null, null,
            [["run", null, [["跑", 1000], ["运行", 900], ["奔跑", 800]], [[0, 3]], "run"]],
            null, null, null, null, null,
            [["verb", [[["sprint", "race", "dash", "gallop", "jog", "scurry", "scamper"], "m_1"]], "run"]],
            [["verb", [["move at a speed faster than a walk.", "m_1", "he ran across the road"]], "run"]],
            [[["she <b>ran</b> home", null, null, null, 3, "m_1"], ["they <b>run</b> a shop", null, null, null, 3, "m_2"]]]
        ]);

        let detail = parse_detail("run", &data);
        assert_eq!(detail.word, "run");
        assert_eq!(detail.translation, "跑");
        assert_eq!(detail.phonetic, "rʌn");
        assert_eq!(detail.definitions.len(), 2);
        assert_eq!(detail.definitions[0].pos, "verb");
        assert_eq!(detail.definitions[0].meanings, vec!["跑", "运行", "经营"]);
        assert_eq!(detail.definitions[0].definition, "move at a speed faster than a walk.");
        assert_eq!(detail.examples.len(), 2);
        assert_eq!(detail.synonyms[0].words.len(), MAX_SYNONYMS_PER_POS);
        assert_eq!(detail.alternatives, vec!["运行", "奔跑"]);
    }

    #[test]
    fn detail_parse_tolerates_partial_shapes() {
        let data = json!([[["猫", "cat"]], "garbage", null, null, null, {"x": 1}]);
        let detail = parse_detail("cat", &data);
        assert_eq!(detail.translation, "猫");
        assert!(detail.phonetic.is_empty());
        assert!(detail.definitions.is_empty());
        assert!(detail.examples.is_empty());
        assert!(detail.synonyms.is_empty());
        assert!(detail.alternatives.is_empty());
    }

    #[test]
    fn examples_are_capped() {
        let rows: Vec<Value> = (0..9).map(|i| json!([format!("ex {i}")])).collect();
        let mut data = vec![Value::Null; 13];
        data.push(json!([rows]));
        let detail = parse_detail("w", &Value::Array(data));
        assert_eq!(detail.examples.len(), MAX_EXAMPLES);
    }

    #[test]
    fn source_lang_depends_on_script() {
        assert_eq!(detail_source_lang("cat"), "en");
        assert_eq!(detail_source_lang("猫"), "auto");
    }

    #[tokio::test]
    async fn translate_hits_single_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("client", "gtx"))
            .and(query_param("tl", "zh-CN"))
            .and(query_param("q", "cat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([[["猫", "cat", null, null, 1]]])))
            .expect(1)
            .mount(&server)
            .await;

        let result = translator(&server).translate("cat").await.unwrap();
        assert_eq!(result.as_deref(), Some("猫"));
    }

    #[tokio::test]
    async fn unexpected_shape_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;

        let err = translator(&server).translate("cat").await.unwrap_err();
        assert!(matches!(err, TranslateError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = translator(&server).translate("cat").await.unwrap_err();
        assert!(matches!(err, TranslateError::Status { status: 429, .. }));
    }

    #[tokio::test]
    async fn detail_lookup_sends_extended_data_types() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("sl", "en"))
            .and(query_param("dt", "bd"))
            .and(query_param("dt", "rm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([[["猫", "cat"]]])))
            .expect(1)
            .mount(&server)
            .await;

        let detail = translator(&server).lookup_detail("cat").await.unwrap().unwrap();
        assert_eq!(detail.translation, "猫");
    }
}
