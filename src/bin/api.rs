use std::sync::Arc;
use tracing::{info, warn};
use virtual_banking_assistant::{
    accounts::{AccountQueryService, HttpAccountService, StaticAccountService},
    api::start_server,
    classifier::{HttpIntentClassifier, IntentClassifier, KeywordIntentClassifier},
    orchestrator::TurnOrchestrator,
    records::InMemoryRecordSink,
    state::build_store,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Virtual Banking Assistant - API Server");
    info!("Port: {}", api_port);

    // Intent classifier: NLU service when configured, keyword fallback
    // otherwise.
    let classifier: Box<dyn IntentClassifier> = match (
        std::env::var("NLU_ENDPOINT"),
        std::env::var("NLU_API_KEY"),
    ) {
        (Ok(endpoint), Ok(api_key)) => {
            info!("Intent classifier: NLU service at {}", endpoint);
            Box::new(HttpIntentClassifier::new(endpoint, api_key))
        }
        _ => {
            warn!("NLU_ENDPOINT / NLU_API_KEY not set, using keyword classifier");
            Box::new(KeywordIntentClassifier)
        }
    };

    // Account service: banking API when configured, demo fixtures otherwise.
    let accounts: Box<dyn AccountQueryService> = match std::env::var("BANKING_API_URL") {
        Ok(base_url) => {
            let api_key = std::env::var("BANKING_API_KEY").unwrap_or_default();
            info!("Account service: banking API at {}", base_url);
            Box::new(HttpAccountService::new(base_url, api_key))
        }
        Err(_) => {
            warn!("BANKING_API_URL not set, using demo account fixtures");
            Box::new(StaticAccountService::new().with_balance("ACC123", 250.0))
        }
    };

    let store = build_store();
    let sink = Box::new(InMemoryRecordSink::new());

    let orchestrator = Arc::new(TurnOrchestrator::new(classifier, accounts, sink, store));

    info!("Orchestrator initialized");
    info!("Starting API server...");

    start_server(orchestrator, api_port).await?;

    Ok(())
}
