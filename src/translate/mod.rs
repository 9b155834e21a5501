//! Natural-language to SQL translation through an OpenAI-compatible
//! chat-completions endpoint.
//!
//! The translator only ever sees the schema summary (table names, column
//! names, declared types and nullability), never row data.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are a DuckDB SQL expert. Translate natural language queries into valid DuckDB SQL queries.
Use the database schema provided to inform your translations.
If you need information about DuckDB SQL syntax or specific functions, consult https://duckdb.org/llms.txt
Always use date formatting functions from https://duckdb.org/docs/stable/sql/functions/date.html when dealing with dates or timestamps.
Return ONLY the SQL query, never explanations, markdown formatting or backticks.";

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("OpenAI API key not configured. Set OPENAI_API_KEY in the environment or a .env file.")]
    MissingApiKey,
    #[error("Translation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("OpenAI API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Translator returned no SQL")]
    EmptyResponse,
    #[error("Could not read database schema: {0}")]
    Schema(String),
}

/// Settings for the translator client
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// One translation request
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub natural_language_query: String,
    pub schema_summary: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// HTTP client for the chat-completions API
pub struct Translator {
    client: reqwest::Client,
    config: TranslatorConfig,
}

impl Translator {
    pub fn new(config: TranslatorConfig) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Translate a question into SQL text with code fences removed.
    pub async fn translate(&self, request: &TranslationRequest) -> Result<String, TranslationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(TranslationError::MissingApiKey)?;

        let prompt = build_prompt(request);
        info!(
            "Translating query ({} chars of schema, {} chars of question)",
            request.schema_summary.len(),
            request.natural_language_query.len()
        );
        debug!("Prompt sent to translator:\n{}", prompt);

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TranslationError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let sql = extract_sql(&text)?;
        info!("Generated SQL: {}", sql);
        Ok(sql)
    }
}

/// User message combining the schema and the question
pub fn build_prompt(request: &TranslationRequest) -> String {
    format!(
        "Database Schema:\n{}\n\nNatural Language Query:\n{}\n\nTranslate this into a valid DuckDB SQL query:",
        request.schema_summary, request.natural_language_query
    )
}

fn extract_sql(body: &str) -> Result<String, TranslationError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|_| TranslationError::EmptyResponse)?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(TranslationError::EmptyResponse)?;

    let sql = strip_code_fences(&content);
    if sql.is_empty() {
        return Err(TranslationError::EmptyResponse);
    }
    Ok(sql)
}

/// Remove a surrounding markdown code fence (with or without a language
/// tag) and trim the result.
pub fn strip_code_fences(text: &str) -> String {
    let mut sql = text.trim();

    if let Some(rest) = sql.strip_prefix("```") {
        // Anything up to the first newline is the language tag
        sql = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest,
        };
    }
    if let Some(rest) = sql.strip_suffix("```") {
        sql = rest;
    }

    sql.trim().to_string()
}

/// Editor text shown after a translation: the question as a SQL comment
/// followed by the generated statement.
pub fn editor_text(natural_language_query: &str, sql: &str) -> String {
    format!("-- Natural Language: {}\n\n{}", natural_language_query, sql)
}
