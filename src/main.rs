use authgate::auth::BcryptHasher;
use authgate::clock::SystemClock;
use authgate::configuration::{get_configuration, DatabaseSettings, StorageBackend};
use authgate::startup::{run, AppState};
use authgate::store::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};
use authgate::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

async fn postgres_store(database: &DatabaseSettings) -> std::io::Result<PgCredentialStore> {
    tracing::info!(
        host = %database.host,
        port = database.port,
        database = %database.database_name,
        "Attempting to connect to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error"
            )
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
        })?;

    tracing::info!("Database connection pool created successfully");

    Ok(PgCredentialStore::new(pool))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error"
            ));
        }
    };

    let store: Arc<dyn CredentialStore> = match configuration.application.storage {
        StorageBackend::Postgres => Arc::new(postgres_store(&configuration.database).await?),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory credential store; accounts are lost on restart");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    let hasher = Arc::new(BcryptHasher::new(configuration.password.bcrypt_cost));

    let state = AppState::build(&configuration, store, hasher, Arc::new(SystemClock))
        .map_err(|e| {
            tracing::error!("Invalid security configuration: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
        })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    tracing::info!("Binding server to address: {}", address);

    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, state)?;
    tracing::info!("Server started successfully");

    server.await
}
