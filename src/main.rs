use std::process;
use std::sync::Arc;

use axum::Router;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer, limit::RequestBodyLimitLayer,
    validate_request::ValidateRequestHeaderLayer,
};
use tracing_subscriber::{
    fmt::{writer::BoxMakeWriter, Layer},
    layer::SubscriberExt,
    EnvFilter, Registry,
};

use backend_wallet_engine::db::auth::AuthRepository;
use backend_wallet_engine::db::pg::PgStore;
use backend_wallet_engine::db::store::LedgerStore;
use backend_wallet_engine::engine::board::{InMemoryJobBoard, JobBoard};
use backend_wallet_engine::engine::escrow::EscrowService;
use backend_wallet_engine::engine::gateway::{HmacGateway, PaymentGateway};
use backend_wallet_engine::engine::notify::{Notifier, TracingNotifier};
use backend_wallet_engine::engine::payout::PayoutService;
use backend_wallet_engine::engine::wallet::{TopupLimits, WalletService};
use backend_wallet_engine::routes;
use backend_wallet_engine::routes::auth::AuthService;
use backend_wallet_engine::routes::payout::InternalState;

struct Config {
    jwt_secret: String,
    gateway_secret: String,
    payout_trigger_token: String,
    currency: String,
}

#[tokio::main]
async fn main() {
    // mandatory fields
    let db_url = dotenv::var("DATABASE_URL").unwrap();
    // optional fields
    let config = Config {
        jwt_secret: dotenv::var("JWT_SECRET").unwrap_or("your-jwt-secret".to_string()),
        gateway_secret: dotenv::var("GATEWAY_SECRET").unwrap_or("gateway-secret".to_string()),
        payout_trigger_token: dotenv::var("PAYOUT_TRIGGER_TOKEN")
            .unwrap_or("payout-trigger-token".to_string()),
        currency: dotenv::var("CURRENCY").unwrap_or("INR".to_string()),
    };
    let max_connection_pooling = dotenv::var("MAX_CONNECTION_POOLING")
        .unwrap_or("5".to_string())
        .parse::<u32>()
        .unwrap();
    let port = dotenv::var("PORT")
        .unwrap_or("3000".to_string())
        .parse::<u16>()
        .unwrap();
    let log_file = dotenv::var("LOG_FILE").unwrap_or("app.log".to_string());

    // add tracing layer
    let file_appender = tracing_appender::rolling::never(".", &log_file);
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = Layer::new()
        .json()
        .with_writer(BoxMakeWriter::new(move || file_writer.clone()));
    let stdout_layer = Layer::new().with_writer(BoxMakeWriter::new(move || stdout_writer.clone()));

    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(file_layer)
        .with(stdout_layer);

    tracing::subscriber::set_global_default(subscriber).expect("Unable to set global subscriber");

    let database_pool = match process_database(&db_url, max_connection_pooling).await {
        Ok(db) => {
            tracing::info!("Connected to database");
            db
        }
        Err(err) => {
            tracing::error!("Failed to connect to database: {}", err);
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(port) => {
            tracing::info!("Listening on port: {}", port.local_addr().unwrap().port());
            port
        }
        Err(err) => {
            tracing::error!("Failed to bind to port: {}", err);
            process::exit(1);
        }
    };

    let router = process_begin(database_pool, config);
    tracing::info!("Routes constructed successfully");

    //start the http service
    let http_service = axum::serve(listener, router);
    if let Err(err) = http_service.await {
        tracing::error!("Failed to start server: {}", err);
        process::exit(1);
    }
}

fn process_begin(db_pool: PgPool, config: Config) -> Router {
    let head_route = Router::new();

    let repo = AuthRepository::new(db_pool.clone());
    let auth = Arc::new(AuthService::new(repo, config.jwt_secret));

    let store: Arc<dyn LedgerStore> = Arc::new(PgStore::new(db_pool));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(HmacGateway::new(config.gateway_secret));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    // The job/application CRUD subsystems live outside this service; until
    // they are wired in, the in-process board is the integration seam.
    let board: Arc<dyn JobBoard> = Arc::new(InMemoryJobBoard::new());

    let wallets = Arc::new(WalletService::new(
        store.clone(),
        gateway,
        notifier.clone(),
        TopupLimits::default(),
        config.currency.clone(),
    ));
    let escrow = Arc::new(EscrowService::new(
        store.clone(),
        board,
        notifier.clone(),
        config.currency,
    ));
    let payouts = Arc::new(PayoutService::new(store, notifier));

    let auth_routes = routes::auth::auth_routes(auth.clone());
    let wallet_routes = routes::wallet::wallet_routes(auth.clone(), wallets.clone())
        .route_layer(ValidateRequestHeaderLayer::accept("Authorization"))
        .route_layer(CompressionLayer::new().gzip(true));
    let contract_routes = routes::contract::contract_routes(auth, escrow)
        .route_layer(ValidateRequestHeaderLayer::accept("Authorization"));
    let internal_routes = routes::payout::internal_routes(InternalState {
        payouts,
        wallets,
        trigger_token: config.payout_trigger_token,
    });

    head_route
        .nest("/v1", auth_routes)
        .nest("/v1", wallet_routes)
        .nest("/v1", contract_routes)
        .nest("/v1", internal_routes)
        .route_layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
}

async fn process_database(url: &str, max_conn_pool: u32) -> Result<PgPool, String> {
    // create a connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(max_conn_pool)
        .connect(url)
        .await
        .map_err(|err| format!("Failed to connect to database: {}", err))?;

    match sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|err| format!("Failed to run migrations: {}", err))
    {
        Ok(_) => {
            tracing::info!("Migrations run successfully");
        }
        Err(err) => {
            // if it fails we assume to continue believing that the database is already migrated
            tracing::warn!("Failed to run migrations: {err}");
        }
    }

    Ok(db_pool)
}
