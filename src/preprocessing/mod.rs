//! Builds the upstream chat request from a validated card prompt.

pub mod templates;

pub use templates::{GenerationDefaults, PromptTemplates, TemplateError};

use crate::llm::{CardPrompt, Config, LLMRequest, Message};

pub struct Preprocessor;

impl Preprocessor {
    /// System + user message pair. The default variant uses the fixed
    /// 汉语新解 instruction; the custom variant uses the caller's instruction.
    pub fn messages(templates: &PromptTemplates, prompt: &CardPrompt) -> Vec<Message> {
        match prompt {
            CardPrompt::Word(word) => vec![
                Message::system(templates.system()),
                Message::user(templates.default_user_message(word)),
            ],
            CardPrompt::Custom { system, word } => vec![
                Message::system(system.as_str()),
                Message::user(templates.custom_user_message(word)),
            ],
        }
    }

    pub fn build_request(
        templates: &PromptTemplates,
        config: &Config,
        prompt: &CardPrompt,
    ) -> LLMRequest {
        let defaults = templates.generation();
        LLMRequest {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| defaults.model.clone()),
            max_tokens: config.max_tokens.unwrap_or(defaults.max_tokens),
            messages: Self::messages(templates, prompt),
        }
    }
}
