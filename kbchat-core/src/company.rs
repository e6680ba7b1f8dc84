//! Company profiles and chatbot widget settings
//!
//! Every company account owns one tenant. Its chatbot copy and widget colours are stored
//! with the profile and served to the embeddable widget without authentication.

use crate::error::KbChatResult;
use crate::validation_error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const COMPONENT: &str = "company";
const MIN_MESSAGE_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatbotTone {
    #[default]
    Friendly,
    Professional,
    Casual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    Short,
    #[default]
    Medium,
    Detailed,
}

/// Chatbot copy shown to customers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatbotCustomization {
    pub welcome_message: String,
    pub tone: ChatbotTone,
    pub fallback_message: String,
    pub response_length: ResponseLength,
}

impl Default for ChatbotCustomization {
    fn default() -> Self {
        Self {
            welcome_message: "Hello! How can I help you today?".to_string(),
            tone: ChatbotTone::Friendly,
            fallback_message:
                "I couldn't find the answer in our knowledge base. Here's what I know:".to_string(),
            response_length: ResponseLength::Medium,
        }
    }
}

impl ChatbotCustomization {
    pub fn validate(&self) -> KbChatResult<()> {
        for (field, message) in [
            ("welcomeMessage", &self.welcome_message),
            ("fallbackMessage", &self.fallback_message),
        ] {
            if message.trim().chars().count() < MIN_MESSAGE_CHARS {
                return Err(validation_error!("Message is too short", field, COMPONENT));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

/// Widget colours, as `#rgb` or `#rrggbb`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WidgetAppearance {
    pub color_scheme: ColorScheme,
    pub primary_color: String,
    pub background_color: String,
    pub text_color: String,
    pub button_color: String,
    pub button_text_color: String,
    pub header_color: String,
    pub header_text_color: String,
    pub border_color: String,
}

impl Default for WidgetAppearance {
    fn default() -> Self {
        Self {
            color_scheme: ColorScheme::Light,
            primary_color: "#3b82f6".to_string(),
            background_color: "#ffffff".to_string(),
            text_color: "#000000".to_string(),
            button_color: "#3b82f6".to_string(),
            button_text_color: "#ffffff".to_string(),
            header_color: "#f8fafc".to_string(),
            header_text_color: "#000000".to_string(),
            border_color: "#e2e8f0".to_string(),
        }
    }
}

impl WidgetAppearance {
    pub fn validate(&self) -> KbChatResult<()> {
        let colors = [
            ("primaryColor", &self.primary_color),
            ("backgroundColor", &self.background_color),
            ("textColor", &self.text_color),
            ("buttonColor", &self.button_color),
            ("buttonTextColor", &self.button_text_color),
            ("headerColor", &self.header_color),
            ("headerTextColor", &self.header_text_color),
            ("borderColor", &self.border_color),
        ];

        for (field, color) in colors {
            if !is_hex_color(color) {
                return Err(validation_error!(
                    format!("Invalid colour '{}'", color),
                    field,
                    COMPONENT
                ));
            }
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// A company account's tenant profile. The id is the tenant id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub customization: ChatbotCustomization,
    pub appearance: WidgetAppearance,
    pub created_at: DateTime<Utc>,
}

impl Company {
    /// New profile with default chatbot settings
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            customization: ChatbotCustomization::default(),
            appearance: WidgetAppearance::default(),
            created_at: Utc::now(),
        }
    }
}

/// Activity counts for a company dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyStats {
    pub documents: u64,
    pub chats: u64,
}
