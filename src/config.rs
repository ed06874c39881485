use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variables that override the file configuration.
pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_REQUIRED_CHANNEL: &str = "REQUIRED_CHANNEL";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub image: ImageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Channel every user must be subscribed to: `@username` or a numeric chat id.
    #[serde(default = "default_required_channel")]
    pub required_channel: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl OpenAiConfig {
    /// Full URL of an API endpoint, e.g. `endpoint("chat/completions")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_image_size")]
    pub size: String,
    /// Style wrapper around the user's text; `{prompt}` marks where it goes.
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
    /// Substrings that route a message to image generation (matched case-insensitively).
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl ImageConfig {
    pub fn render_prompt(&self, prompt: &str) -> String {
        self.prompt_template.replace("{prompt}", prompt)
    }
}

fn default_required_channel() -> String {
    "@py_on".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

fn default_image_model() -> String {
    "dall-e-2".to_string()
}

fn default_image_size() -> String {
    "512x512".to_string()
}

fn default_prompt_template() -> String {
    "anime style, {prompt}, high quality".to_string()
}

fn default_keywords() -> Vec<String> {
    ["صورة", "رسم", "أنمي"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            required_channel: default_required_channel(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            system_prompt: default_system_prompt(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            size: default_image_size(),
            prompt_template: default_prompt_template(),
            keywords: default_keywords(),
        }
    }
}

impl Config {
    /// Load the configuration file at `path`, then apply environment overrides.
    ///
    /// A missing file is only an error when the path was given explicitly;
    /// otherwise the bot runs from defaults and the environment alone.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        Self::load_with_env(path, explicit, |key| std::env::var(key).ok())
    }

    fn load_with_env(
        path: &Path,
        explicit: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let content = if path.exists() {
            Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            )
        } else if explicit {
            anyhow::bail!("Config file not found: {}", path.display());
        } else {
            None
        };

        Self::from_sources(content.as_deref(), env)
    }

    /// Merge defaults, optional TOML content and environment lookups into a validated config.
    pub fn from_sources(
        toml_content: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config: Config = match toml_content {
            Some(content) => toml::from_str(content).context("Failed to parse config file")?,
            None => Config::default(),
        };

        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup(ENV_BOT_TOKEN) {
            config.telegram.bot_token = token;
        }
        if let Some(channel) = lookup(ENV_REQUIRED_CHANNEL) {
            config.telegram.required_channel = channel;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            config.openai.api_key = key;
        }
        if let Some(url) = lookup(ENV_BASE_URL) {
            config.openai.base_url = url;
        }

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "Telegram bot token is missing: set {} or [telegram].bot_token",
                ENV_BOT_TOKEN
            );
        }
        if config.telegram.required_channel.trim().is_empty() {
            anyhow::bail!("Required channel must not be empty");
        }

        Ok(config)
    }
}
