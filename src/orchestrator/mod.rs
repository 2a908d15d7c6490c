//! Turn orchestrator
//!
//! Thin shim around the dialog engine: loads conversation state, classifies
//! the utterance when the engine needs an intent, performs requested
//! lookups, hands finalized records to the sink, and persists the new state
//! before the response is returned.
//!
//! Turns are serialized per conversation: state is read, mutated, and
//! written back non-atomically across the lookup suspension point, so two
//! concurrent turns for one conversation would race. Distinct conversations
//! proceed concurrently.

use crate::accounts::AccountQueryService;
use crate::classifier::IntentClassifier;
use crate::engine::{DialogEngine, Transition, TurnOutput};
use crate::error::AgentError;
use crate::models::{ActivityType, LookupRequest, LookupResult, TurnMessage};
use crate::records::{FinalizedRecord, RecordSink};
use crate::state::{ConversationState, StateStore};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fixed reply for non-message activities (conversation updates, typing
/// indicators and the like never reach the engine).
const GREETING: &str = "Hey! I'm Tali, a virtual banking assistant.";

/// Reply when the classifier or account service is unavailable. The
/// conversation state is left untouched so the user can simply retry.
const LOOKUP_APOLOGY: &str =
    "Sorry, I couldn't reach the banking service just now. Could you try that again in a moment?";

pub struct TurnOrchestrator {
    classifier: Box<dyn IntentClassifier>,
    accounts: Box<dyn AccountQueryService>,
    sink: Box<dyn RecordSink>,
    store: Box<dyn StateStore>,
    turn_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TurnOrchestrator {
    pub fn new(
        classifier: Box<dyn IntentClassifier>,
        accounts: Box<dyn AccountQueryService>,
        sink: Box<dyn RecordSink>,
        store: Box<dyn StateStore>,
    ) -> Self {
        Self {
            classifier,
            accounts,
            sink,
            store,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Process one inbound message and return the response text.
    pub async fn handle_message(&self, message: TurnMessage) -> Result<String> {
        if message.activity_type != ActivityType::Message {
            return Ok(GREETING.to_string());
        }

        // At most one in-flight turn per conversation.
        let lock = self.conversation_lock(message.conversation_id).await;
        let _guard = lock.lock().await;

        let state = self
            .store
            .load(message.conversation_id)
            .await?
            .unwrap_or_else(ConversationState::new);

        let intent = if DialogEngine::needs_intent(&state) {
            match self.classifier.classify(&message.text).await {
                Ok(label) => {
                    info!(conversation_id = %message.conversation_id, intent = %label, "Utterance classified");
                    Some(label)
                }
                Err(AgentError::Lookup(reason)) => {
                    warn!(
                        conversation_id = %message.conversation_id,
                        "Classifier unavailable, apologizing: {}", reason
                    );
                    return Ok(LOOKUP_APOLOGY.to_string());
                }
                Err(other) => return Err(other),
            }
        } else {
            None
        };

        let transition = DialogEngine::process_turn(&state, &message.text, intent)?;

        // Lookup-producing transitions never carry a finalized record, so
        // resuming from the pre-lookup state loses nothing.
        let transition = match transition {
            Transition {
                state: pending,
                output: TurnOutput::Lookup(request),
                ..
            } => match self.perform_lookup(&request).await {
                Ok(result) => DialogEngine::resume_with_lookup(&pending, result),
                Err(AgentError::Lookup(reason)) => {
                    warn!(
                        conversation_id = %message.conversation_id,
                        "Lookup failed, apologizing: {}", reason
                    );
                    return Ok(LOOKUP_APOLOGY.to_string());
                }
                Err(other) => return Err(other),
            },
            other => other,
        };

        self.submit_finalized(&transition).await;

        let Transition {
            state: new_state,
            output,
            ..
        } = transition;

        let TurnOutput::Reply(reply) = output else {
            return Err(AgentError::Engine(
                "lookup resumed into another lookup".to_string(),
            ));
        };

        // Persist happens-before the response: a crash between the two must
        // never let the user replay a mutating turn unrecorded.
        self.store.save(message.conversation_id, &new_state).await?;

        debug!(
            conversation_id = %message.conversation_id,
            turn = new_state.turn_count,
            mode = ?new_state.dialog_mode,
            "Turn complete"
        );

        Ok(reply)
    }

    async fn perform_lookup(&self, request: &LookupRequest) -> Result<LookupResult> {
        match request {
            LookupRequest::FetchBalance { account_id } => {
                let balance = self.accounts.fetch_balance(account_id).await?;
                Ok(LookupResult::Balance(balance))
            }
            LookupRequest::FetchBills { account_id } => {
                let bills = self.accounts.fetch_bills(account_id).await?;
                Ok(LookupResult::Bills(bills))
            }
        }
    }

    /// Hand a finalized record to the sink. Failures are logged and the turn
    /// still completes: the upstream bot discarded these records entirely,
    /// so losing one here is no worse than the behavior being reproduced.
    async fn submit_finalized(&self, transition: &Transition) {
        let Some(record) = &transition.finalized else {
            return;
        };

        let result = match record.clone() {
            FinalizedRecord::Bill(bill) => {
                info!(payee = %bill.payee, amount = bill.amount_cents, "Bill dialog finalized");
                self.sink.submit_bill(bill).await
            }
            FinalizedRecord::Transfer(transfer) => {
                info!(payee = %transfer.payee, amount = transfer.amount_cents, "Transfer dialog finalized");
                self.sink.submit_transfer(transfer).await
            }
        };

        if let Err(error) = result {
            warn!("Record sink rejected finalized record: {}", error);
        }
    }

    async fn conversation_lock(&self, conversation_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        // Only the map holds a reference once a turn finishes; drop those
        // entries so the map doesn't grow with every conversation ever seen.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
