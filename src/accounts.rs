//! Account query service
//!
//! External data source for balances and upcoming bills, queried by account
//! id. `HttpAccountService` talks to the banking REST API;
//! `StaticAccountService` serves fixtures for development and tests.

use crate::error::AgentError;
use crate::models::{AccountRecord, BillRecord};
use crate::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

/// Trait for account balance and bill lookups
#[async_trait::async_trait]
pub trait AccountQueryService: Send + Sync {
    async fn fetch_balance(&self, account_id: &str) -> Result<f64>;
    async fn fetch_bills(&self, account_id: &str) -> Result<Vec<BillRecord>>;
}

fn require_account_id(account_id: &str) -> Result<&str> {
    let trimmed = account_id.trim();
    if trimmed.is_empty() {
        return Err(AgentError::Lookup(
            "account lookup requires a non-empty account id".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Banking API client (connection-pooled). Endpoints follow the upstream
/// API shape: `GET /accounts/{id}` and `GET /accounts/{id}/bills`, with the
/// API key as a query parameter.
pub struct HttpAccountService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpAccountService {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url,
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .get(&url)
            .query(&[("key", &self.api_key)])
            .send()
            .await
            .map_err(|e| {
                error!("Banking API request failed: {}", e);
                AgentError::Lookup(format!("banking API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Banking API error response: {}", status);
            return Err(AgentError::Lookup(format!(
                "banking API returned {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            error!("Failed to parse banking API response: {}", e);
            AgentError::Lookup(format!("banking API parse error: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl AccountQueryService for HttpAccountService {
    async fn fetch_balance(&self, account_id: &str) -> Result<f64> {
        let account_id = require_account_id(account_id)?;
        let account: AccountRecord = self.get_json(&format!("accounts/{}", account_id)).await?;
        debug!(account_id, balance = account.balance, "Balance fetched");
        Ok(account.balance)
    }

    async fn fetch_bills(&self, account_id: &str) -> Result<Vec<BillRecord>> {
        let account_id = require_account_id(account_id)?;
        let bills: Vec<BillRecord> =
            self.get_json(&format!("accounts/{}/bills", account_id)).await?;
        debug!(account_id, count = bills.len(), "Bills fetched");
        Ok(bills)
    }
}

/// Fixture-backed service for development and tests.
#[derive(Clone, Default)]
pub struct StaticAccountService {
    balances: HashMap<String, f64>,
    bills: HashMap<String, Vec<BillRecord>>,
}

impl StaticAccountService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, account_id: &str, balance: f64) -> Self {
        self.balances.insert(account_id.to_string(), balance);
        self
    }

    pub fn with_bills(mut self, account_id: &str, bills: Vec<BillRecord>) -> Self {
        self.bills.insert(account_id.to_string(), bills);
        self
    }
}

#[async_trait::async_trait]
impl AccountQueryService for StaticAccountService {
    async fn fetch_balance(&self, account_id: &str) -> Result<f64> {
        let account_id = require_account_id(account_id)?;
        self.balances
            .get(account_id)
            .copied()
            .ok_or_else(|| AgentError::Lookup(format!("unknown account {}", account_id)))
    }

    async fn fetch_bills(&self, account_id: &str) -> Result<Vec<BillRecord>> {
        let account_id = require_account_id(account_id)?;
        if !self.balances.contains_key(account_id) && !self.bills.contains_key(account_id) {
            return Err(AgentError::Lookup(format!("unknown account {}", account_id)));
        }
        Ok(self.bills.get(account_id).cloned().unwrap_or_default())
    }
}
