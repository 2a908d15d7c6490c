use tracing::info;
use uuid::Uuid;
use virtual_banking_assistant::{
    accounts::StaticAccountService,
    classifier::KeywordIntentClassifier,
    models::{ActivityType, BillRecord, TurnMessage},
    orchestrator::TurnOrchestrator,
    records::InMemoryRecordSink,
    state::InMemoryStateStore,
};

fn demo_bills() -> Vec<BillRecord> {
    vec![
        BillRecord {
            id: "5c43a83eb8e2a665da3ebacc".to_string(),
            status: "recurring".to_string(),
            payee: "Honda".to_string(),
            nickname: "Car Loans".to_string(),
            payment_date: "2019-02-20".to_string(),
            recurring_date: 5,
            payment_amount: 400,
            creation_date: "2019-01-19".to_string(),
            account_id: "ACC123".to_string(),
            upcoming_payment_date: "2019-02-05".to_string(),
        },
        BillRecord {
            id: "5c43a8f0b8e2a665da3ebad1".to_string(),
            status: "recurring".to_string(),
            payee: "City Power".to_string(),
            nickname: "Electric".to_string(),
            payment_date: "2019-02-11".to_string(),
            recurring_date: 11,
            payment_amount: 85,
            creation_date: "2019-01-02".to_string(),
            account_id: "ACC123".to_string(),
            upcoming_payment_date: "2019-02-11".to_string(),
        },
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Virtual Banking Assistant demo starting");

    // Offline collaborators: keyword classifier, fixture account service,
    // in-memory sink and store.
    let sink = InMemoryRecordSink::new();
    let orchestrator = TurnOrchestrator::new(
        Box::new(KeywordIntentClassifier),
        Box::new(
            StaticAccountService::new()
                .with_balance("ACC123", 250.0)
                .with_bills("ACC123", demo_bills()),
        ),
        Box::new(sink.clone()),
        Box::new(InMemoryStateStore::new()),
    );

    let conversation_id = Uuid::new_v4();

    let script = [
        "Hello there",
        "Alice",
        "ACC123",
        "What's my balance?",
        "What bills do I have coming up?",
        "I want to set up a new bill",
        "Recurring",
        "Honda",
        "400",
        "2019-02-20",
        "I'd like to transfer funds",
        "Garrus",
        "120",
        "Goodbye!",
        "Are you still there?",
    ];

    for text in script {
        println!("User: {}", text);

        let reply = orchestrator
            .handle_message(TurnMessage {
                conversation_id,
                text: text.to_string(),
                activity_type: ActivityType::Message,
            })
            .await?;

        if reply.is_empty() {
            println!("Tali: <no reply — conversation has ended>\n");
        } else {
            println!("Tali: {}\n", reply);
        }
    }

    println!("=== FINALIZED RECORDS ===");
    for bill in sink.bills().await {
        println!(
            "Bill: {} -> {} (${}) due {}",
            bill.status, bill.payee, bill.amount_cents, bill.due_date
        );
    }
    for transfer in sink.transfers().await {
        println!("Transfer: {} (${})", transfer.payee, transfer.amount_cents);
    }

    Ok(())
}
