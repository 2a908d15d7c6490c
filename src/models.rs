//! Shared data shapes for the banking assistant

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Inbound Messages =================
//

/// Kind of channel activity. Only `Message` activities reach the dialog
/// engine; everything else gets a fixed greeting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    Message,
    ConversationUpdate,
    Other,
}

impl ActivityType {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "message" => ActivityType::Message,
            "conversationupdate" | "conversation_update" => ActivityType::ConversationUpdate,
            _ => ActivityType::Other,
        }
    }
}

/// One channel-agnostic inbound message per turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    pub conversation_id: Uuid,
    pub text: String,
    pub activity_type: ActivityType,
}

//
// ================= Intents =================
//

/// Fixed intent vocabulary produced by the external classifier. Labels the
/// classifier does not recognize come back as `Unrecognized` carrying the
/// raw label, which the diagnostic fallback echoes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum IntentLabel {
    StartConversation,
    EndConversation,
    Balance,
    GetBills,
    PostBills,
    StartTransferFunds,
    Unrecognized(String),
}

impl IntentLabel {
    /// Map a raw classifier label onto the fixed vocabulary.
    pub fn parse(label: &str) -> Self {
        match label {
            "StartConversation" => IntentLabel::StartConversation,
            "EndConversation" => IntentLabel::EndConversation,
            "Balance" => IntentLabel::Balance,
            "GetBills" => IntentLabel::GetBills,
            "PostBills" => IntentLabel::PostBills,
            "StartTransferFunds" => IntentLabel::StartTransferFunds,
            other => IntentLabel::Unrecognized(other.to_string()),
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentLabel::StartConversation => write!(f, "StartConversation"),
            IntentLabel::EndConversation => write!(f, "EndConversation"),
            IntentLabel::Balance => write!(f, "Balance"),
            IntentLabel::GetBills => write!(f, "GetBills"),
            IntentLabel::PostBills => write!(f, "PostBills"),
            IntentLabel::StartTransferFunds => write!(f, "StartTransferFunds"),
            IntentLabel::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}

//
// ================= Account Service Shapes =================
//

/// Account record as returned by the banking API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub nickname: String,
    pub balance: f64,
}

/// Upcoming bill record as returned by the banking API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillRecord {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payee: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub payment_date: String,
    #[serde(default)]
    pub recurring_date: i64,
    #[serde(default)]
    pub payment_amount: i64,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub upcoming_payment_date: String,
}

//
// ================= Lookup Requests =================
//

/// Signal from the engine that an external fetch must happen before a
/// response exists for this turn. These are the only two external calls the
/// engine can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupRequest {
    FetchBalance { account_id: String },
    FetchBills { account_id: String },
}

/// Result of a performed lookup, fed back into the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Balance(f64),
    Bills(Vec<BillRecord>),
}
