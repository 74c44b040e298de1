//! The embedded 汉语新解 prompt template.

use serde::Deserialize;
use thiserror::Error;

const TEMPLATE_SOURCE: &str = include_str!("./templates.toml");
const INPUT_PLACEHOLDER: &str = "{input}";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template document is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Template `{0}` has no {{input}} placeholder in its user format")]
    MissingPlaceholder(&'static str),
}

#[derive(Deserialize, Debug, Clone)]
struct TemplateFile {
    #[allow(dead_code)]
    metadata: Metadata,
    generation: GenerationDefaults,
    default: DefaultTemplate,
    custom: CustomTemplate,
}

#[derive(Deserialize, Debug, Clone)]
struct Metadata {
    #[allow(dead_code)]
    schema_version: String,
    #[allow(dead_code)]
    description: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GenerationDefaults {
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Deserialize, Debug, Clone)]
struct DefaultTemplate {
    system: String,
    user_format: String,
}

#[derive(Deserialize, Debug, Clone)]
struct CustomTemplate {
    user_format: String,
}

/// Fixed system instruction plus the two user-message shapes.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    system: String,
    default_user_format: String,
    custom_user_format: String,
    generation: GenerationDefaults,
}

impl PromptTemplates {
    /// Parses the template compiled into the binary.
    pub fn embedded() -> Result<Self, TemplateError> {
        Self::from_toml(TEMPLATE_SOURCE)
    }

    pub fn from_toml(source: &str) -> Result<Self, TemplateError> {
        let file: TemplateFile = toml::from_str(source)?;

        if !file.default.user_format.contains(INPUT_PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder("default"));
        }
        if !file.custom.user_format.contains(INPUT_PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder("custom"));
        }

        Ok(Self {
            system: file.default.system.trim().to_string(),
            default_user_format: file.default.user_format,
            custom_user_format: file.custom.user_format,
            generation: file.generation,
        })
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn generation(&self) -> &GenerationDefaults {
        &self.generation
    }

    /// `(汉语新解 {word})`
    pub fn default_user_message(&self, word: &str) -> String {
        self.default_user_format.replace(INPUT_PLACEHOLDER, word)
    }

    /// `({word}) 输出要求: 要输出svg内容`
    pub fn custom_user_message(&self, word: &str) -> String {
        self.custom_user_format.replace(INPUT_PLACEHOLDER, word)
    }
}
