//! LLM provider clients and forecasting prompts
//!
//! Two chat-completion providers sit behind the `ChatModel` trait: the
//! Metaculus OpenAI proxy (forecasting and summarization) and Perplexity
//! (search-augmented research). Prompt construction and probability
//! extraction live here too.

use crate::config::{MetaculusProxy, PerplexityApi};
use crate::services::ApiError;
use crate::types::Question;
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Per-call timeout for LLM requests. Forecast completions routinely take
/// tens of seconds on long prompts.
const LLM_TIMEOUT_SECS: u64 = 180;

/// System prompt for the Perplexity research step
const RESEARCH_SYSTEM_PROMPT: &str = "\
You are an intelligence analyst tasked at an international non-governmental
organization who is tasked with providing relevant up-to-date research to your
superior, who is a superforecaster.

To be an effective analyst and great assistant, you generate a concise but
detailed rundown of the most relevant news, including if the question would
resolve Yes or No based on current information.
You do not produce forecasts yourself.";

/// A chat-completion model: one prompt in, one text response out
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError>;
}

/// OpenAI-style chat completion request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// OpenAI-style chat completion response body
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(LLM_TIMEOUT_SECS))
        .build()
        .expect("Failed to create HTTP client")
}

async fn post_chat_request(
    client: &Client,
    url: &str,
    auth_header: (&str, String),
    request: &ChatRequest<'_>,
) -> Result<String, ApiError> {
    let (header_name, header_value) = auth_header;

    let response = client
        .post(url)
        .header(header_name, header_value)
        .json(request)
        .send()
        .await
        .map_err(|e| ApiError::from_reqwest(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_response(status.as_u16(), &body));
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| ApiError::from_reqwest(&e))?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ApiError::MalformedResponse("empty choices array".to_string()))
}

/// Chat completions through the Metaculus OpenAI proxy (gpt-4o).
///
/// Used for both forecast sampling and rationale summarization; the proxy
/// authenticates with the same token as the platform API.
pub struct ProxyChatModel {
    client: Client,
    metac_token: String,
}

impl ProxyChatModel {
    pub fn new(metac_token: String) -> Self {
        Self {
            client: build_client(),
            metac_token,
        }
    }
}

#[async_trait]
impl ChatModel for ProxyChatModel {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        let request = ChatRequest {
            model: MetaculusProxy::MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a helpful assistant.",
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        post_chat_request(
            &self.client,
            MetaculusProxy::CHAT_COMPLETIONS_URL,
            ("Authorization", format!("Token {}", self.metac_token)),
            &request,
        )
        .await
    }
}

/// Search-augmented completions from Perplexity, used for the research
/// step so forecasts incorporate current information.
pub struct PerplexityModel {
    client: Client,
    api_key: String,
}

impl PerplexityModel {
    pub fn new(api_key: String) -> Self {
        Self {
            client: build_client(),
            api_key,
        }
    }
}

#[async_trait]
impl ChatModel for PerplexityModel {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        let request = ChatRequest {
            model: PerplexityApi::MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: RESEARCH_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        post_chat_request(
            &self.client,
            PerplexityApi::CHAT_COMPLETIONS_URL,
            ("Authorization", format!("Bearer {}", self.api_key)),
            &request,
        )
        .await
    }
}

/// Build the forecasting prompt for one question.
///
/// `news` is the research rundown from the online model, when available.
pub fn build_forecast_prompt(question: &Question, news: Option<&str>) -> String {
    let mut prompt = format!(
        "
You are an intelligence analyst at an important government agency tasked with
assessing open-source intelligence and reasoning about similar previous
situations to develop a probabilistic estimate for a question asked by your
superior.

Your superior is also a professional forecaster, with a strong track record of
accurate forecasts of the future. They will ask you a question, and your task
is to provide the most accurate forecast you can. To do this, you evaluate past
data and trends carefully, make use of comparison classes of similar events,
take into account base rates about how past events unfolded, and outline the
best reasons for and against any particular outcome, including how they might
mutually reinforce or rule each other out.

You know that the best forecasters, among which you aspire to be, don't just
forecast according to the \"vibe\" of the question, and are not afraid to assign
very low or very high probabilities if the available evidence supports this.

Think about the question in a structured way. Consider what chain of events
might need to occur for the event in question to come true, how often it has
come true in the past in similar situations, and incorporate this in your
reasoning, which you are to present in full. In your reasoning, you are
supported by a quick overview of the available information your previous
research on the topic has shown.

You can't know the future, and your superior knows that, so it is more important
to give an honest estimate that reflects the available evidence. You do not
hedge your uncertainty, but try to give the most likely point estimate for the
event in question happening. Remember to make sure that your point estimate
accurately reflects your research and analysis.

Your interview question is:
{}

Background:
{}

{}

{}

",
        question.title,
        question.description,
        question.resolution_criteria.as_deref().unwrap_or(""),
        question.fine_print.as_deref().unwrap_or(""),
    );

    if let Some(news) = news {
        prompt.push_str(&format!("\nYour research assistant says:\n{}\n\n", news));
    }

    prompt.push_str(&format!(
        "
Today is {}.

Before answering you write:
(a) The time left until the outcome to the question is known.
(b) What the outcome would be if nothing changed.
(c) What you would forecast if there was only a quarter of the time left.
(d) What you would forecast if there was 4x the time left.

You write your rationale and then the last thing you write is your final answer as: \"Probability: ZZ%\", 0-100
",
        Utc::now().format("%Y-%m-%d")
    ));

    prompt
}

/// Prompt asking the summarizer to consolidate sample rationales
pub fn build_summarization_prompt(rationales: &[String]) -> String {
    format!(
        "Summarize the following {} rationales into 4 to 6 bulletpoints (for all the rationales combined) with the most noteworthy information repeated in most of the rationales:\n\n{}",
        rationales.len(),
        rationales.join("\n\n")
    )
}

static PERCENT_RE: OnceLock<Regex> = OnceLock::new();

/// Extract the forecast probability from LLM output.
///
/// Takes the last `NN%` match in the text (the prompt asks for the final
/// answer last), clamps it to [1, 99]%, and returns it as a fraction.
/// Returns None when the text contains no percentage.
pub fn extract_probability(text: &str) -> Option<f64> {
    let re = PERCENT_RE.get_or_init(|| Regex::new(r"(\d+)%").expect("valid regex"));

    let last = re.captures_iter(text).last()?;
    let number: u32 = last[1].parse().ok()?;
    let clamped = number.clamp(1, 99);
    Some(f64::from(clamped) / 100.0)
}
