use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use super::{parse_review, prompt, AiError, AiReviewer, ReviewRequest, ReviewVerdict};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Reviewer backed by an OpenAI-compatible chat-completions endpoint.
pub struct DeepSeekAgent {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl DeepSeekAgent {
    pub fn new(
        api_key: String,
        api_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            api_url,
            model,
        })
    }

    fn extract_content(response: ChatResponse) -> Result<String, AiError> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }
}

#[async_trait]
impl AiReviewer for DeepSeekAgent {
    fn model(&self) -> &str {
        &self.model
    }

    async fn review(&self, request: ReviewRequest<'_>) -> Result<ReviewVerdict, AiError> {
        let user_prompt = prompt::user_prompt(&request);
        info!(
            model = %self.model,
            prompt_chars = user_prompt.len(),
            criteria = request.criteria.len(),
            "Sending review request"
        );

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: prompt::system_prompt(request.source),
                },
                Message {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "AI service rejected review request");
            return Err(AiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)?;
        let content = Self::extract_content(parsed)?;
        let review = parse_review(&content, request.source.is_multi_file())?;

        info!(
            model = %self.model,
            verdict = %review.verdict,
            confidence = review.confidence,
            feedbacks = review.feedback.len(),
            "AI review completed"
        );

        Ok(review)
    }
}
