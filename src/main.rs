use fleetledger::engine::{
    EarningAttributor, IncentiveEvaluator, Ledger, ReferralSettlement, ShiftTracker,
};
use fleetledger::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let incentives = Arc::new(IncentiveEvaluator::new(repo.clone()));
    let shifts = Arc::new(ShiftTracker::new(repo.clone(), incentives.clone()));
    let earnings = Arc::new(EarningAttributor::new(repo.clone(), config.earning_policy));
    let referrals = Arc::new(ReferralSettlement::new(repo.clone(), config.referral_policy));
    let ledger = Arc::new(Ledger::new(repo.clone(), config.withdrawal_fees));

    // Create router
    let app = api::create_router(api::AppState {
        repo,
        shifts,
        earnings,
        incentives,
        referrals,
        ledger,
    });

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
