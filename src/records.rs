//! Finalized dialog records
//!
//! When a slot-filling dialog completes, the engine emits one of these
//! records and the orchestrator hands it to the `RecordSink` collaborator
//! (bill creation and funds transfer are external systems).

use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A completed bill-creation dialog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillInformation {
    pub status: String,
    pub payee: String,
    pub amount_cents: i64,
    /// Expected `YYYY-MM-DD`; captured verbatim, not validated.
    pub due_date: String,
    pub account_id: String,
}

/// A completed funds-transfer dialog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferInformation {
    pub payee: String,
    pub amount_cents: i64,
    pub account_id: String,
}

/// Record produced when a dialog reaches its final step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizedRecord {
    Bill(BillInformation),
    Transfer(TransferInformation),
}

/// Destination for finalized records.
#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    async fn submit_bill(&self, bill: BillInformation) -> Result<()>;
    async fn submit_transfer(&self, transfer: TransferInformation) -> Result<()>;
}

/// In-memory sink that retains everything submitted to it. Used by the demo
/// binary and by tests to inspect finalized records.
#[derive(Clone)]
pub struct InMemoryRecordSink {
    bills: Arc<RwLock<Vec<BillInformation>>>,
    transfers: Arc<RwLock<Vec<TransferInformation>>>,
}

impl InMemoryRecordSink {
    pub fn new() -> Self {
        Self {
            bills: Arc::new(RwLock::new(Vec::new())),
            transfers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn bills(&self) -> Vec<BillInformation> {
        self.bills.read().await.clone()
    }

    pub async fn transfers(&self) -> Vec<TransferInformation> {
        self.transfers.read().await.clone()
    }
}

impl Default for InMemoryRecordSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RecordSink for InMemoryRecordSink {
    async fn submit_bill(&self, bill: BillInformation) -> Result<()> {
        let mut bills = self.bills.write().await;
        bills.push(bill);
        Ok(())
    }

    async fn submit_transfer(&self, transfer: TransferInformation) -> Result<()> {
        let mut transfers = self.transfers.write().await;
        transfers.push(transfer);
        Ok(())
    }
}
