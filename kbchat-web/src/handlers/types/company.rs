//! Company settings, widget and dashboard types

use kbchat_core::{ChatbotCustomization, Company, CompanyStats, WidgetAppearance};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// A company's chatbot copy and widget colours
#[derive(Debug, Serialize, ToSchema)]
pub struct CompanySettings {
    #[serde(rename = "companyId")]
    pub company_id: String,
    pub name: String,
    #[schema(value_type = Object)]
    pub customization: ChatbotCustomization,
    #[schema(value_type = Object)]
    pub appearance: WidgetAppearance,
}

impl From<Company> for CompanySettings {
    fn from(company: Company) -> Self {
        Self {
            company_id: company.id,
            name: company.name,
            customization: company.customization,
            appearance: company.appearance,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WidgetConfigQuery {
    #[serde(alias = "companyId")]
    pub company_id: Option<String>,
}

/// Everything the embeddable widget needs before the first message
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub company_id: String,
    pub title: String,
    pub welcome_message: String,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub appearance: WidgetAppearance,
}

impl From<Company> for WidgetConfig {
    fn from(company: Company) -> Self {
        Self {
            company_id: company.id,
            title: company.name,
            welcome_message: company.customization.welcome_message,
            appearance: company.appearance,
        }
    }
}

/// Dashboard counters
#[derive(Debug, Serialize, ToSchema)]
pub struct CompanyStatsResponse {
    #[schema(example = 3)]
    pub documents: u64,
    #[schema(example = 120)]
    pub chats: u64,
}

impl From<CompanyStats> for CompanyStatsResponse {
    fn from(stats: CompanyStats) -> Self {
        Self {
            documents: stats.documents,
            chats: stats.chats,
        }
    }
}

/// One row of the administrator's company listing
#[derive(Debug, Serialize, ToSchema)]
pub struct CompanySummary {
    pub id: String,
    pub name: String,
    pub documents: u64,
    pub chats: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl CompanySummary {
    pub fn new(company: Company, stats: CompanyStats) -> Self {
        Self {
            id: company.id,
            name: company.name,
            documents: stats.documents,
            chats: stats.chats,
            created_at: company.created_at,
        }
    }
}
