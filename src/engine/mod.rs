//! Dialog engine - the per-conversation turn-processing state machine
//!
//! A deterministic, side-effect-free transition function. One call takes the
//! current `ConversationState`, the utterance text, and (for idle turns) the
//! classified intent, and returns the next state plus either a response or a
//! lookup request the orchestrator must perform before the response exists.
//!
//! Top-level machine:
//! - onboarding (three sequential steps keyed on which fields are empty)
//! - terminal sink once the conversation has ended (empty replies forever)
//! - bill dialog, steps 1..4
//! - transfer dialog, steps 1..2
//! - idle intent dispatch

use crate::error::AgentError;
use crate::models::{IntentLabel, LookupRequest, LookupResult};
use crate::records::{BillInformation, FinalizedRecord, TransferInformation};
use crate::state::{BillDraft, ConversationState, DialogMode, TransferDraft};
use crate::Result;

const FIRST_LAUNCH_PROMPT: &str = "My omni-tool says that it's your first time using this interface!\n\
It's great to meet you. We'll run you through the first time registration setup.\n\
First off, may we get your name?\n";

const BILL_STATUS_PROMPT: &str = "We can update my omni-tool to keep track of a new bill!\n\
What's the status of this bill?\n\
Options:\n\
Pending\n\
Cancelled\n\
Completed\n\
Recurring\n";

const TRANSFER_PAYEE_PROMPT: &str = "Who are we making this transfer out to?\n";

const FAREWELL: &str = "Thank you for using Tali, your virtual banking assistant!\n";

const FOLLOW_UP_PROMPT: &str = "Do you have any other questions you wish to ask?";

/// What the engine wants the orchestrator to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutput {
    /// Final response text for this turn (possibly empty).
    Reply(String),
    /// An external fetch is required; re-invoke `resume_with_lookup` with
    /// the result to obtain the response.
    Lookup(LookupRequest),
}

/// Result of one engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ConversationState,
    pub output: TurnOutput,
    /// Present when a slot-filling dialog completed this turn.
    pub finalized: Option<FinalizedRecord>,
}

impl Transition {
    fn reply(state: ConversationState, text: impl Into<String>) -> Self {
        Self {
            state,
            output: TurnOutput::Reply(text.into()),
            finalized: None,
        }
    }

    fn lookup(state: ConversationState, request: LookupRequest) -> Self {
        Self {
            state,
            output: TurnOutput::Lookup(request),
            finalized: None,
        }
    }

    fn finalize(state: ConversationState, text: impl Into<String>, record: FinalizedRecord) -> Self {
        Self {
            state,
            output: TurnOutput::Reply(text.into()),
            finalized: Some(record),
        }
    }
}

/// The dialog engine. Stateless: all conversation data lives in the
/// `ConversationState` passed through each call.
pub struct DialogEngine;

impl DialogEngine {
    /// Whether the orchestrator must classify the utterance before calling
    /// `process_turn`. Onboarding and slot-filling turns consume raw text;
    /// ended conversations ignore input entirely.
    pub fn needs_intent(state: &ConversationState) -> bool {
        state.onboarding.completed_setup
            && !state.end_conversation
            && state.dialog_mode == DialogMode::Idle
    }

    /// Process one turn. `intent` is required exactly when `needs_intent`
    /// reports true for `state`.
    pub fn process_turn(
        state: &ConversationState,
        text: &str,
        intent: Option<IntentLabel>,
    ) -> Result<Transition> {
        // Frozen terminal sink: empty response, byte-identical state.
        if state.end_conversation {
            return Ok(Transition::reply(state.clone(), ""));
        }

        let mut next = state.clone();
        next.turn_count += 1;

        if !next.onboarding.completed_setup {
            return Ok(Self::onboarding_step(next, text));
        }

        match next.dialog_mode {
            DialogMode::CollectingBill { step } => Self::bill_step(next, step, text),
            DialogMode::CollectingTransfer { step } => Self::transfer_step(next, step, text),
            DialogMode::Idle => {
                let intent = intent.ok_or_else(|| {
                    AgentError::Engine("an intent label is required for idle turns".to_string())
                })?;
                Ok(Self::dispatch_intent(next, intent))
            }
        }
    }

    /// Render the final response after the orchestrator performed the lookup
    /// requested by `process_turn`. Does not mutate the state further.
    pub fn resume_with_lookup(state: &ConversationState, lookup: LookupResult) -> Transition {
        let reply = match lookup {
            LookupResult::Balance(balance) => {
                format!(
                    "Your account balance is ${} USD.\n{}",
                    balance, FOLLOW_UP_PROMPT
                )
            }
            LookupResult::Bills(bills) => {
                if bills.is_empty() {
                    format!(
                        "You have no upcoming bills, {}!\n{}",
                        state.onboarding.user_name, FOLLOW_UP_PROMPT
                    )
                } else {
                    let mut out = format!("You have {} bill(s):\n", bills.len());
                    for bill in &bills {
                        out.push_str(&format!(
                            "{} due on {}\n",
                            bill.nickname, bill.upcoming_payment_date
                        ));
                    }
                    out.push_str(FOLLOW_UP_PROMPT);
                    out
                }
            }
        };

        Transition::reply(state.clone(), reply)
    }

    /// Exactly one onboarding step fires per turn. Name and account id are
    /// captured verbatim; nothing is validated.
    fn onboarding_step(mut state: ConversationState, text: &str) -> Transition {
        let onboarding = &mut state.onboarding;

        let reply = if !onboarding.is_first_launch
            && onboarding.user_name.is_empty()
            && onboarding.account_id.is_empty()
        {
            onboarding.is_first_launch = true;
            FIRST_LAUNCH_PROMPT.to_string()
        } else if onboarding.user_name.is_empty() {
            onboarding.user_name = text.to_string();
            format!(
                "Great, {}! We now have your name inputted into my omni-tool.\n\
                 To finalize our suite, may we get your account ID?\n",
                onboarding.user_name
            )
        } else {
            onboarding.account_id = text.to_string();
            onboarding.completed_setup = true;
            format!(
                "Fantastic, {}! We now have you fully registered.\n\
                 What sort of questions do you have for me today?\n",
                onboarding.user_name
            )
        };

        Transition::reply(state, reply)
    }

    fn dispatch_intent(mut state: ConversationState, intent: IntentLabel) -> Transition {
        match intent {
            IntentLabel::StartConversation => {
                let reply = format!(
                    "Welcome back, {}!\nIs there something we can help you with?\n",
                    state.onboarding.user_name
                );
                Transition::reply(state, reply)
            }
            IntentLabel::EndConversation => {
                state.end_conversation = true;
                Transition::reply(state, FAREWELL)
            }
            IntentLabel::Balance => {
                let account_id = state.onboarding.account_id.clone();
                Transition::lookup(state, LookupRequest::FetchBalance { account_id })
            }
            IntentLabel::GetBills => {
                let account_id = state.onboarding.account_id.clone();
                Transition::lookup(state, LookupRequest::FetchBills { account_id })
            }
            IntentLabel::PostBills => {
                state.pending_bill = BillDraft::default();
                state.dialog_mode = DialogMode::CollectingBill { step: 1 };
                Transition::reply(state, BILL_STATUS_PROMPT)
            }
            IntentLabel::StartTransferFunds => {
                state.pending_transfer = TransferDraft::default();
                state.dialog_mode = DialogMode::CollectingTransfer { step: 1 };
                Transition::reply(state, TRANSFER_PAYEE_PROMPT)
            }
            IntentLabel::Unrecognized(raw) => {
                // TODO: replace the diagnostic echo with a real reprompt once
                // unknown-intent copy is settled.
                Transition::reply(
                    state,
                    format!("PLACEHOLDER, returned intent label is: {}", raw),
                )
            }
        }
    }

    /// Bill dialog, strictly 1 -> 2 -> 3 -> 4 -> Idle. Only the amount step
    /// parses its input; every other slot is captured verbatim.
    fn bill_step(mut state: ConversationState, step: u8, text: &str) -> Result<Transition> {
        match step {
            1 => {
                state.pending_bill.status = Some(text.to_string());
                state.dialog_mode = DialogMode::CollectingBill { step: 2 };
                let status = state.pending_bill.status.clone().unwrap_or_default();
                Ok(Transition::reply(
                    state,
                    format!(
                        "Great! We have logged a new {} bill\n\
                         Now we need the payee, who should we make this bill out to?\n",
                        status
                    ),
                ))
            }
            2 => {
                state.pending_bill.payee = Some(text.to_string());
                state.dialog_mode = DialogMode::CollectingBill { step: 3 };
                let status = state.pending_bill.status.clone().unwrap_or_default();
                let payee = state.pending_bill.payee.clone().unwrap_or_default();
                Ok(Transition::reply(
                    state,
                    format!(
                        "It looks like we have our {} bill made out to {}!\n\
                         How much are we paying {}?\n",
                        status, payee, payee
                    ),
                ))
            }
            3 => {
                let amount: i64 = text.trim().parse().map_err(|_| AgentError::Parse {
                    input: text.to_string(),
                })?;
                state.pending_bill.amount_cents = Some(amount);
                state.dialog_mode = DialogMode::CollectingBill { step: 4 };
                Ok(Transition::reply(
                    state,
                    format!(
                        "We have our payment of ${} USD\n\
                         registered! When is this bill due?\n\
                         Note: Please enter your date format as YYYY-MM-DD",
                        amount
                    ),
                ))
            }
            4 => {
                let bill = BillInformation {
                    status: state.pending_bill.status.clone().unwrap_or_default(),
                    payee: state.pending_bill.payee.clone().unwrap_or_default(),
                    amount_cents: state.pending_bill.amount_cents.unwrap_or_default(),
                    due_date: text.to_string(),
                    account_id: state.onboarding.account_id.clone(),
                };
                state.pending_bill = BillDraft::default();
                state.dialog_mode = DialogMode::Idle;
                Ok(Transition::finalize(
                    state,
                    format!(
                        "On {} it is!\nIs there anything else we can help you with?\n",
                        bill.due_date
                    ),
                    FinalizedRecord::Bill(bill),
                ))
            }
            other => Err(AgentError::Engine(format!(
                "bill dialog has no step {}",
                other
            ))),
        }
    }

    /// Transfer dialog, strictly 1 -> 2 -> Idle.
    fn transfer_step(mut state: ConversationState, step: u8, text: &str) -> Result<Transition> {
        match step {
            1 => {
                state.pending_transfer.payee = Some(text.to_string());
                state.dialog_mode = DialogMode::CollectingTransfer { step: 2 };
                let payee = state.pending_transfer.payee.clone().unwrap_or_default();
                Ok(Transition::reply(
                    state,
                    format!("How much are we paying {}?\n", payee),
                ))
            }
            2 => {
                let amount: i64 = text.trim().parse().map_err(|_| AgentError::Parse {
                    input: text.to_string(),
                })?;
                let transfer = TransferInformation {
                    payee: state.pending_transfer.payee.clone().unwrap_or_default(),
                    amount_cents: amount,
                    account_id: state.onboarding.account_id.clone(),
                };
                state.pending_transfer = TransferDraft::default();
                state.dialog_mode = DialogMode::Idle;
                Ok(Transition::finalize(
                    state,
                    format!(
                        "Fantastic! I have set up a transfer to {} for ${} USD.\n\
                         Is there anything else we can assist you with?\n",
                        transfer.payee, transfer.amount_cents
                    ),
                    FinalizedRecord::Transfer(transfer),
                ))
            }
            other => Err(AgentError::Engine(format!(
                "transfer dialog has no step {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillRecord;
    use crate::state::Onboarding;

    fn registered_state() -> ConversationState {
        let mut state = ConversationState::new();
        state.turn_count = 3;
        state.onboarding = Onboarding {
            is_first_launch: true,
            user_name: "Alice".to_string(),
            account_id: "ACC123".to_string(),
            completed_setup: true,
        };
        state
    }

    fn reply_text(transition: &Transition) -> &str {
        match &transition.output {
            TurnOutput::Reply(text) => text,
            TurnOutput::Lookup(request) => panic!("expected reply, got lookup {:?}", request),
        }
    }

    fn bill(nickname: &str, due: &str) -> BillRecord {
        BillRecord {
            id: String::new(),
            status: "recurring".to_string(),
            payee: String::new(),
            nickname: nickname.to_string(),
            payment_date: String::new(),
            recurring_date: 0,
            payment_amount: 0,
            creation_date: String::new(),
            account_id: "ACC123".to_string(),
            upcoming_payment_date: due.to_string(),
        }
    }

    // ================= Onboarding =================

    #[test]
    fn test_onboarding_fires_one_step_per_turn() {
        let fresh = ConversationState::new();

        // Turn 1: welcome + name prompt; the utterance is not consumed as data.
        let turn1 = DialogEngine::process_turn(&fresh, "hello there", None).unwrap();
        assert!(reply_text(&turn1).contains("first time"));
        assert!(reply_text(&turn1).contains("may we get your name"));
        assert!(turn1.state.onboarding.is_first_launch);
        assert!(turn1.state.onboarding.user_name.is_empty());
        assert!(!turn1.state.onboarding.completed_setup);
        assert_eq!(turn1.state.turn_count, 1);

        // Turn 2: name captured verbatim.
        let turn2 = DialogEngine::process_turn(&turn1.state, "Alice", None).unwrap();
        assert_eq!(turn2.state.onboarding.user_name, "Alice");
        assert!(reply_text(&turn2).contains("Great, Alice!"));
        assert!(reply_text(&turn2).contains("account ID"));
        assert!(!turn2.state.onboarding.completed_setup);

        // Turn 3: account id captured, setup latched.
        let turn3 = DialogEngine::process_turn(&turn2.state, "ACC123", None).unwrap();
        assert_eq!(turn3.state.onboarding.account_id, "ACC123");
        assert!(turn3.state.onboarding.completed_setup);
        assert!(reply_text(&turn3).contains("Fantastic, Alice!"));
        assert_eq!(turn3.state.turn_count, 3);
    }

    #[test]
    fn test_setup_not_complete_before_both_fields() {
        let fresh = ConversationState::new();
        let turn1 = DialogEngine::process_turn(&fresh, "hi", None).unwrap();
        let turn2 = DialogEngine::process_turn(&turn1.state, "Alice", None).unwrap();
        assert!(!turn1.state.onboarding.completed_setup);
        assert!(!turn2.state.onboarding.completed_setup);
    }

    // ================= Purity =================

    #[test]
    fn test_engine_is_deterministic() {
        let state = registered_state();
        let first =
            DialogEngine::process_turn(&state, "hello", Some(IntentLabel::StartConversation))
                .unwrap();
        let second =
            DialogEngine::process_turn(&state, "hello", Some(IntentLabel::StartConversation))
                .unwrap();
        assert_eq!(first, second);
    }

    // ================= Terminal Sink =================

    #[test]
    fn test_ended_conversation_is_frozen() {
        let mut state = registered_state();
        state.end_conversation = true;

        for text in ["hello?", "what's my balance", ""] {
            let transition = DialogEngine::process_turn(&state, text, None).unwrap();
            assert_eq!(reply_text(&transition), "");
            assert_eq!(transition.state, state);
        }
    }

    #[test]
    fn test_end_conversation_sets_flag() {
        let state = registered_state();
        let transition =
            DialogEngine::process_turn(&state, "goodbye", Some(IntentLabel::EndConversation))
                .unwrap();
        assert!(transition.state.end_conversation);
        assert!(reply_text(&transition).contains("Thank you for using Tali"));
    }

    // ================= Idle Dispatch =================

    #[test]
    fn test_start_conversation_welcomes_back() {
        let state = registered_state();
        let transition =
            DialogEngine::process_turn(&state, "hi", Some(IntentLabel::StartConversation))
                .unwrap();
        assert!(reply_text(&transition).contains("Welcome back, Alice!"));
        assert_eq!(transition.state.dialog_mode, DialogMode::Idle);
    }

    #[test]
    fn test_unrecognized_intent_echoes_label() {
        let state = registered_state();
        let transition = DialogEngine::process_turn(
            &state,
            "flerb",
            Some(IntentLabel::Unrecognized("None".to_string())),
        )
        .unwrap();
        assert!(reply_text(&transition).contains("None"));
    }

    #[test]
    fn test_idle_turn_without_intent_is_contract_error() {
        let state = registered_state();
        let result = DialogEngine::process_turn(&state, "what's my balance", None);
        assert!(matches!(result, Err(AgentError::Engine(_))));
    }

    // ================= Balance =================

    #[test]
    fn test_balance_requests_lookup_then_renders() {
        let state = registered_state();
        let transition =
            DialogEngine::process_turn(&state, "what's my balance", Some(IntentLabel::Balance))
                .unwrap();
        assert_eq!(
            transition.output,
            TurnOutput::Lookup(LookupRequest::FetchBalance {
                account_id: "ACC123".to_string()
            })
        );

        let resumed =
            DialogEngine::resume_with_lookup(&transition.state, LookupResult::Balance(250.0));
        assert!(reply_text(&resumed).contains("Your account balance is $250 USD."));
        assert!(reply_text(&resumed).contains(FOLLOW_UP_PROMPT));
    }

    // ================= Bills Listing =================

    #[test]
    fn test_no_upcoming_bills_message_is_exact() {
        let state = registered_state();
        let resumed = DialogEngine::resume_with_lookup(&state, LookupResult::Bills(vec![]));
        assert!(reply_text(&resumed).starts_with("You have no upcoming bills, Alice!\n"));
        assert!(reply_text(&resumed).ends_with(FOLLOW_UP_PROMPT));
    }

    #[test]
    fn test_bills_rendered_in_service_order() {
        let state = registered_state();
        let bills = vec![
            bill("Car Loans", "2019-02-05"),
            bill("Electric", "2019-02-11"),
        ];
        let resumed = DialogEngine::resume_with_lookup(&state, LookupResult::Bills(bills));

        let text = reply_text(&resumed);
        assert!(text.starts_with("You have 2 bill(s):\n"));
        let car = text.find("Car Loans due on 2019-02-05").unwrap();
        let electric = text.find("Electric due on 2019-02-11").unwrap();
        assert!(car < electric);
    }

    #[test]
    fn test_get_bills_requests_lookup() {
        let state = registered_state();
        let transition =
            DialogEngine::process_turn(&state, "my bills", Some(IntentLabel::GetBills)).unwrap();
        assert_eq!(
            transition.output,
            TurnOutput::Lookup(LookupRequest::FetchBills {
                account_id: "ACC123".to_string()
            })
        );
    }

    // ================= Bill Dialog =================

    #[test]
    fn test_bill_dialog_walks_steps_in_order() {
        let state = registered_state();

        let entered =
            DialogEngine::process_turn(&state, "track a new bill", Some(IntentLabel::PostBills))
                .unwrap();
        assert_eq!(
            entered.state.dialog_mode,
            DialogMode::CollectingBill { step: 1 }
        );
        assert_eq!(entered.state.pending_bill, BillDraft::default());
        assert!(reply_text(&entered).contains("What's the status of this bill?"));

        let step1 = DialogEngine::process_turn(&entered.state, "Recurring", None).unwrap();
        assert_eq!(
            step1.state.dialog_mode,
            DialogMode::CollectingBill { step: 2 }
        );
        assert_eq!(step1.state.pending_bill.status.as_deref(), Some("Recurring"));

        let step2 = DialogEngine::process_turn(&step1.state, "Honda", None).unwrap();
        assert_eq!(
            step2.state.dialog_mode,
            DialogMode::CollectingBill { step: 3 }
        );
        assert!(reply_text(&step2).contains("How much are we paying Honda?"));

        let step3 = DialogEngine::process_turn(&step2.state, "400", None).unwrap();
        assert_eq!(
            step3.state.dialog_mode,
            DialogMode::CollectingBill { step: 4 }
        );
        assert_eq!(step3.state.pending_bill.amount_cents, Some(400));
        assert!(reply_text(&step3).contains("$400 USD"));

        let step4 = DialogEngine::process_turn(&step3.state, "2019-02-20", None).unwrap();
        assert_eq!(step4.state.dialog_mode, DialogMode::Idle);
        assert_eq!(step4.state.pending_bill, BillDraft::default());
        assert_eq!(
            step4.finalized,
            Some(FinalizedRecord::Bill(BillInformation {
                status: "Recurring".to_string(),
                payee: "Honda".to_string(),
                amount_cents: 400,
                due_date: "2019-02-20".to_string(),
                account_id: "ACC123".to_string(),
            }))
        );
        assert!(reply_text(&step4).contains("On 2019-02-20 it is!"));
    }

    #[test]
    fn test_non_numeric_amount_is_parse_error() {
        let state = registered_state();
        let entered =
            DialogEngine::process_turn(&state, "new bill", Some(IntentLabel::PostBills)).unwrap();
        let step1 = DialogEngine::process_turn(&entered.state, "Recurring", None).unwrap();
        let step2 = DialogEngine::process_turn(&step1.state, "Honda", None).unwrap();

        let result = DialogEngine::process_turn(&step2.state, "four hundred", None);
        assert!(matches!(result, Err(AgentError::Parse { .. })));

        // The caller's state is untouched: still step 3, draft intact.
        assert_eq!(
            step2.state.dialog_mode,
            DialogMode::CollectingBill { step: 3 }
        );
        assert_eq!(step2.state.pending_bill.payee.as_deref(), Some("Honda"));
    }

    #[test]
    fn test_entering_bill_dialog_resets_stale_draft() {
        let mut state = registered_state();
        state.pending_bill.status = Some("Pending".to_string());
        state.pending_bill.payee = Some("Leftover".to_string());

        let entered =
            DialogEngine::process_turn(&state, "new bill", Some(IntentLabel::PostBills)).unwrap();
        assert_eq!(entered.state.pending_bill, BillDraft::default());
    }

    // ================= Transfer Dialog =================

    #[test]
    fn test_transfer_dialog_two_steps() {
        let state = registered_state();

        let entered = DialogEngine::process_turn(
            &state,
            "transfer funds",
            Some(IntentLabel::StartTransferFunds),
        )
        .unwrap();
        assert_eq!(
            entered.state.dialog_mode,
            DialogMode::CollectingTransfer { step: 1 }
        );
        assert!(reply_text(&entered).contains("Who are we making this transfer out to?"));

        let step1 = DialogEngine::process_turn(&entered.state, "Garrus", None).unwrap();
        assert_eq!(
            step1.state.dialog_mode,
            DialogMode::CollectingTransfer { step: 2 }
        );
        assert!(reply_text(&step1).contains("How much are we paying Garrus?"));

        let step2 = DialogEngine::process_turn(&step1.state, "120", None).unwrap();
        assert_eq!(step2.state.dialog_mode, DialogMode::Idle);
        assert_eq!(step2.state.pending_transfer, TransferDraft::default());
        assert_eq!(
            step2.finalized,
            Some(FinalizedRecord::Transfer(TransferInformation {
                payee: "Garrus".to_string(),
                amount_cents: 120,
                account_id: "ACC123".to_string(),
            }))
        );
        assert!(reply_text(&step2).contains("transfer to Garrus for $120 USD"));
    }

    #[test]
    fn test_transfer_amount_parse_error_keeps_step() {
        let state = registered_state();
        let entered = DialogEngine::process_turn(
            &state,
            "transfer",
            Some(IntentLabel::StartTransferFunds),
        )
        .unwrap();
        let step1 = DialogEngine::process_turn(&entered.state, "Garrus", None).unwrap();

        let result = DialogEngine::process_turn(&step1.state, "a lot", None);
        assert!(matches!(result, Err(AgentError::Parse { .. })));
        assert_eq!(
            step1.state.dialog_mode,
            DialogMode::CollectingTransfer { step: 2 }
        );
    }

    // ================= needs_intent =================

    #[test]
    fn test_needs_intent_only_for_idle_registered_turns() {
        let fresh = ConversationState::new();
        assert!(!DialogEngine::needs_intent(&fresh));

        let registered = registered_state();
        assert!(DialogEngine::needs_intent(&registered));

        let mut collecting = registered_state();
        collecting.dialog_mode = DialogMode::CollectingBill { step: 2 };
        assert!(!DialogEngine::needs_intent(&collecting));

        let mut ended = registered_state();
        ended.end_conversation = true;
        assert!(!DialogEngine::needs_intent(&ended));
    }
}
