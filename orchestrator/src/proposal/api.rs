//! Remote completion API source (OpenAI-compatible or Anthropic).
//!
//! Every call is a single blocking request with the configured timeout. Any
//! transport error, non-success status, or response without text is returned
//! as an error and ends the run; nothing is retried.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::ProposalSource;
use crate::io::config::{ApiConfig, ApiProvider};
use crate::io::context::{ContextEntry, RunContext};

const DECIDE_TEMPLATE: &str = include_str!("prompts/decide.md");
const POST_DECIDE_TEMPLATE: &str = include_str!("prompts/post_decide.md");
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ── OpenAI-compatible wire types ──

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ── Anthropic wire types ──

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

/// Which block the model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pre,
    Post,
}

impl Phase {
    fn template(self) -> &'static str {
        match self {
            Phase::Pre => "decide",
            Phase::Post => "post_decide",
        }
    }
}

pub struct ApiSource {
    client: reqwest::blocking::Client,
    provider: ApiProvider,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    system_prompt: String,
    templates: Environment<'static>,
}

impl ApiSource {
    pub fn new(config: &ApiConfig, system_prompt: &str) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .context("api source requires an API key")?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            provider: config.provider,
            endpoint: endpoint(config.provider, config.base_url()),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            system_prompt: system_prompt.to_string(),
            templates: templates(),
        })
    }

    #[instrument(skip_all, fields(provider = ?self.provider, model = %self.model, step = step, phase = phase.template()))]
    fn complete(&self, phase: Phase, step: u32, context: &RunContext) -> Result<String> {
        let user = render_request(&self.templates, phase, step, context)?;
        let request = match self.provider {
            ApiProvider::OpenAi => self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&ChatRequest {
                    model: &self.model,
                    max_tokens: self.max_tokens,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: &self.system_prompt,
                        },
                        ChatMessage {
                            role: "user",
                            content: &user,
                        },
                    ],
                }),
            ApiProvider::Anthropic => self
                .client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&MessagesRequest {
                    model: &self.model,
                    max_tokens: self.max_tokens,
                    system: &self.system_prompt,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: &user,
                    }],
                }),
        };

        let response = request
            .send()
            .with_context(|| format!("request {}", self.endpoint))?;
        let status = response.status();
        let body = response.text().context("read API response body")?;
        if !status.is_success() {
            return Err(anyhow!("API error {status}: {}", body.trim()));
        }
        debug!(bytes = body.len(), "API response received");
        parse_response(self.provider, &body)
    }
}

impl ProposalSource for ApiSource {
    fn decide(&mut self, step: u32, context: &RunContext) -> Result<String> {
        self.complete(Phase::Pre, step, context)
    }

    fn post_decide(&mut self, step: u32, context: &RunContext) -> Result<String> {
        self.complete(Phase::Post, step, context)
    }
}

fn endpoint(provider: ApiProvider, base_url: &str) -> String {
    match provider {
        ApiProvider::OpenAi => format!("{base_url}/chat/completions"),
        ApiProvider::Anthropic => format!("{base_url}/v1/messages"),
    }
}

fn templates() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_template("decide", DECIDE_TEMPLATE)
        .expect("decide template should be valid");
    env.add_template("post_decide", POST_DECIDE_TEMPLATE)
        .expect("post_decide template should be valid");
    env
}

fn render_request(
    env: &Environment<'static>,
    phase: Phase,
    step: u32,
    context: &RunContext,
) -> Result<String> {
    let last_command = context.entries().iter().rev().find_map(|entry| match entry {
        ContextEntry::Pre { command, exit_code, .. } => Some((command.as_str(), *exit_code)),
        ContextEntry::Post { .. } => None,
    });
    let transcript = context.transcript();
    let template = env.get_template(phase.template())?;
    let rendered = template.render(context! {
        step => step,
        transcript => (!transcript.trim().is_empty()).then(|| transcript.trim_end()),
        last_command => last_command.map(|(command, _)| command),
        last_exit_code => last_command.map(|(_, code)| code),
    })?;
    Ok(rendered)
}

fn parse_response(provider: ApiProvider, body: &str) -> Result<String> {
    let text = match provider {
        ApiProvider::OpenAi => {
            let parsed: ChatResponse =
                serde_json::from_str(body).context("parse chat completion response")?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default()
        }
        ApiProvider::Anthropic => {
            let parsed: MessagesResponse =
                serde_json::from_str(body).context("parse messages response")?;
            parsed
                .content
                .iter()
                .filter(|block| block.kind == "text")
                .filter_map(|block| block.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        }
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(anyhow!("API returned empty content"));
    }
    Ok(text.to_string())
}
