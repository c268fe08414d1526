//! Usage and billing queries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::client::ApiClient;
use super::error::ApiResult;

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageItem {
    pub description: String,
    #[serde(default)]
    pub sandbox_id: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_cost: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub items: Vec<UsageItem>,
}

pub struct Billing<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn billing(&self) -> Billing<'_> {
        Billing { client: self }
    }
}

impl Billing<'_> {
    /// Usage for a date range; the service defaults to the current period.
    pub async fn usage(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ApiResult<UsageReport> {
        let start = start.map(|d| d.format("%Y-%m-%d").to_string());
        let end = end.map(|d| d.format("%Y-%m-%d").to_string());

        let mut query = Vec::new();
        if let Some(start) = &start {
            query.push(("start", start.as_str()));
        }
        if let Some(end) = &end {
            query.push(("end", end.as_str()));
        }

        let url = self.client.url_with_query("billing/usage", &query)?;
        self.client.get_json(url).await
    }
}
