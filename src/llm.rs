//! Hosted chat completion
//!
//! The advisor talks to an Azure OpenAI deployment. The `ChatCompletion`
//! trait keeps the pipeline testable without network access.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default Azure OpenAI REST API version
pub const DEFAULT_API_VERSION: &str = "2024-05-01-preview";

/// A single chat message sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat completion engine
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Return the text of the first completion for `messages`
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Azure OpenAI chat-completions client
pub struct AzureOpenAi {
    client: reqwest::Client,
    url: url::Url,
    api_key: SecretString,
}

impl AzureOpenAi {
    /// Create a client for one deployment
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a valid URL or the key is empty
    pub fn new(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: SecretString,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("AZURE_OPENAI_KEY is required".to_string()));
        }
        if deployment.is_empty() {
            return Err(Error::Config("AZURE_OPENAI_DEPLOYMENT is required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            url: completions_url(endpoint, deployment, api_version)?,
            api_key,
        })
    }

    /// Fully-qualified completions URL
    #[must_use]
    pub const fn url(&self) -> &url::Url {
        &self.url
    }
}

fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> Result<url::Url> {
    let base = endpoint.trim_end_matches('/');
    let mut url = url::Url::parse(&format!(
        "{base}/openai/deployments/{deployment}/chat/completions"
    ))
    .map_err(|e| Error::Config(format!("invalid AZURE_OPENAI_ENDPOINT: {e}")))?;
    url.query_pairs_mut().append_pair("api-version", api_version);
    Ok(url)
}

#[async_trait]
impl ChatCompletion for AzureOpenAi {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!(messages = messages.len(), "requesting chat completion");

        let response = self
            .client
            .post(self.url.clone())
            .header("api-key", self.api_key.expose_secret())
            .json(&CompletionRequest { messages })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("completion API error {status}: {body}")));
        }

        let completion: CompletionResponse = response.json().await?;
        first_choice(completion)
    }
}

fn first_choice(completion: CompletionResponse) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| Error::Llm("completion returned no choices".to_string()))
}
