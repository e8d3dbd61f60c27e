//! OpenAI-backed question generation and answer grading.

use async_trait::async_trait;
#[cfg(feature = "openai")]
use tracing::debug;

use rote_core::error::{RoteError, RoteResult};
use rote_core::traits::{AnswerClassifier, ClassifierVerdict, QuestionGenerator};
use rote_core::types::{Item, QuestionContent, QuestionKind};

#[cfg(feature = "openai")]
use crate::parser;
#[cfg(feature = "openai")]
use crate::prompts;

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
    Client,
};

/// Configuration for the OpenAI task service.
#[derive(Debug, Clone)]
pub struct TaskServiceConfig {
    /// API key. Falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: Option<String>,
    /// Custom API base URL, for OpenAI-compatible providers.
    pub base_url: Option<String>,
    /// Model to use.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for TaskServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
        }
    }
}

/// Generates questions and grades open-form answers through the OpenAI
/// chat completions API (or any compatible endpoint via `base_url`).
#[derive(Debug)]
pub struct OpenAiTaskService {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: TaskServiceConfig,
}

impl OpenAiTaskService {
    /// Create a new task service.
    pub fn new(config: TaskServiceConfig) -> RoteResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                RoteError::Configuration(
                    "OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config.".to_string(),
                )
            })?;

        #[cfg(feature = "openai")]
        let openai_config = if let Some(ref base_url) = config.base_url {
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(base_url)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        #[cfg(feature = "openai")]
        let client = Client::with_config(openai_config);

        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        let mut config = config;
        if config.model.is_empty() {
            config.model = TaskServiceConfig::default().model;
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// The configured model name.
    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    #[cfg(feature = "openai")]
    async fn complete(&self, system: &str, user: &str) -> Result<String, String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(system.to_string()),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(user.to_string()),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            ..Default::default()
        };

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| format!("OpenAI API error: {}", e))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| "No response choices returned".to_string())?;

        choice
            .message
            .content
            .clone()
            .ok_or_else(|| "Empty response content".to_string())
    }
}

#[async_trait]
impl QuestionGenerator for OpenAiTaskService {
    #[cfg(feature = "openai")]
    async fn generate(&self, item: &Item, kind: QuestionKind) -> RoteResult<QuestionContent> {
        let prompt = prompts::generation_prompt(item, kind);
        let response = self
            .complete(prompts::GENERATION_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(RoteError::generation)?;

        debug!(term = %item.source_term, ?kind, "question generated");
        parser::parse_question(kind, &response)
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(&self, _item: &Item, _kind: QuestionKind) -> RoteResult<QuestionContent> {
        Err(RoteError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }
}

#[async_trait]
impl AnswerClassifier for OpenAiTaskService {
    #[cfg(feature = "openai")]
    async fn classify(
        &self,
        content: &QuestionContent,
        correct_answer: &str,
        raw_answer: &str,
    ) -> RoteResult<ClassifierVerdict> {
        let prompt = prompts::grading_prompt(content, correct_answer, raw_answer);
        let response = self
            .complete(prompts::GRADING_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(RoteError::grading)?;

        parser::parse_verdict(&response)
    }

    #[cfg(not(feature = "openai"))]
    async fn classify(
        &self,
        _content: &QuestionContent,
        _correct_answer: &str,
        _raw_answer: &str,
    ) -> RoteResult<ClassifierVerdict> {
        Err(RoteError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }
}
