use std::collections::HashSet;

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::TagGenerator;
use crate::{config::TaggingConfig, metadata::PageMetadata};

/// ASCII or full-width comma
static TAG_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,，]").expect("Failed to compile tag separator regex"));

/// OpenAI-compatible chat completion client.
pub struct ChatTagGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatTagGenerator {
    pub fn new(config: &TaggingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build http client")?;

        let api_key = config.api_key();
        if api_key.is_none() {
            log::warn!("no tagging api key configured, set TAGMARK_API_KEY");
        }

        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

impl TagGenerator for ChatTagGenerator {
    async fn generate(&self, page: &PageMetadata) -> anyhow::Result<Vec<String>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(page),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response: ChatResponse = builder
            .send()
            .await
            .with_context(|| format!("{} is unreachable", self.url))?
            .error_for_status()?
            .json()
            .await
            .context("malformed chat completion response")?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .context("chat completion has no choices")?
            .message
            .content;

        log::debug!("tag generator replied {reply:?}");
        Ok(parse_tags(&reply))
    }
}

pub fn build_prompt(page: &PageMetadata) -> String {
    format!(
        "Generate 3-5 key tags for the following web page:\n\
         Title: {}\n\
         Description: {}\n\
         Keywords: {}\n\
         \n\
         Requirements:\n\
         1. Each tag is 1-3 words long\n\
         2. Tags reflect the core content of the page\n\
         3. Reply with the tags only, as a comma separated list",
        page.title, page.description, page.keywords
    )
}

/// Splits a comma separated reply. Blanks and exact duplicates are dropped.
pub fn parse_tags(reply: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    TAG_SEPARATOR
        .split(reply)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_string()))
        .map(String::from)
        .collect()
}
