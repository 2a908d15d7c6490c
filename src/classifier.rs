//! Intent classification
//!
//! The classifier is an external collaborator: the engine only ever sees one
//! label from the fixed vocabulary. `HttpIntentClassifier` talks to the NLU
//! service; `KeywordIntentClassifier` keeps the system functional offline
//! with static keyword tables.

use crate::error::AgentError;
use crate::models::IntentLabel;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// Trait for utterance -> intent classification
#[async_trait::async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<IntentLabel>;
}

/// Reusable NLU client (connection-pooled). Sends the utterance as the `q`
/// query parameter and reads the top-scoring intent from the response.
pub struct HttpIntentClassifier {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct NluResponse {
    #[serde(rename = "topScoringIntent")]
    top_scoring_intent: ScoredIntent,
}

#[derive(Debug, Deserialize)]
struct ScoredIntent {
    intent: String,
}

impl HttpIntentClassifier {
    pub fn new(endpoint: String, api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl IntentClassifier for HttpIntentClassifier {
    async fn classify(&self, text: &str) -> Result<IntentLabel> {
        let response = self
            .client
            .get(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[("q", text), ("verbose", "false")])
            .send()
            .await
            .map_err(|e| {
                error!("Intent service request failed: {}", e);
                AgentError::Lookup(format!("intent service error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Intent service error response ({}): {}", status, body);
            return Err(AgentError::Lookup(format!(
                "intent service returned {}",
                status
            )));
        }

        let parsed: NluResponse = response.json().await.map_err(|e| {
            error!("Failed to parse intent service response: {}", e);
            AgentError::Lookup(format!("intent service parse error: {}", e))
        })?;

        let label = IntentLabel::parse(&parsed.top_scoring_intent.intent);
        debug!(intent = %label, "Utterance classified");
        Ok(label)
    }
}

//
// ================= Offline Fallback =================
//

const END_KEYWORDS: &[&str] = &["bye", "goodbye", "see you", "that's all", "that is all"];

// Phrases that mean "create a bill" rather than "list my bills"; checked
// before the generic bill keywords.
const NEW_BILL_KEYWORDS: &[&str] = &[
    "new bill",
    "add a bill",
    "create a bill",
    "track a bill",
    "track a new bill",
    "set up a bill",
    "set up a new bill",
];

const TRANSFER_KEYWORDS: &[&str] = &["transfer", "send money", "wire"];

const BILLS_KEYWORDS: &[&str] = &["bill", "bills", "upcoming payment"];

const BALANCE_KEYWORDS: &[&str] = &["balance", "how much money", "how much do i have"];

const GREETING_KEYWORDS: &[&str] = &["hello", "hi", "hey", "good morning", "good afternoon"];

/// Keyword classifier for development and tests. No network, no allocation
/// beyond lowercasing the utterance.
pub struct KeywordIntentClassifier;

/// Phrases are matched as substrings; single words only on word boundaries,
/// so short keywords like "hi" don't fire inside "this".
fn keyword_hit(text: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        text.contains(keyword)
    } else {
        text.split(|c: char| !c.is_alphanumeric())
            .any(|token| token == keyword)
    }
}

impl KeywordIntentClassifier {
    pub fn classify_text(text: &str) -> IntentLabel {
        let lowered = text.to_lowercase();
        let contains_any = |keywords: &[&str]| keywords.iter().any(|kw| keyword_hit(&lowered, kw));

        if contains_any(END_KEYWORDS) {
            IntentLabel::EndConversation
        } else if contains_any(NEW_BILL_KEYWORDS) {
            IntentLabel::PostBills
        } else if contains_any(TRANSFER_KEYWORDS) {
            IntentLabel::StartTransferFunds
        } else if contains_any(BILLS_KEYWORDS) {
            IntentLabel::GetBills
        } else if contains_any(BALANCE_KEYWORDS) {
            IntentLabel::Balance
        } else if contains_any(GREETING_KEYWORDS) {
            IntentLabel::StartConversation
        } else {
            IntentLabel::Unrecognized("None".to_string())
        }
    }
}

#[async_trait::async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    async fn classify(&self, text: &str) -> Result<IntentLabel> {
        Ok(Self::classify_text(text))
    }
}
