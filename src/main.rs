use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use lume_pairing::config::Settings;
use lume_pairing::routes::{self, AppState};
use lume_pairing::services::{AppwriteCollections, AppwriteDirectory, MemoryStore, PreferenceResolver, RedisStore, SharedStore, StoreKey};
use lume_pairing::{BackgroundSweep, EngineConfig, MatchEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle path parameter errors
pub fn handle_path_error(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_path".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_logging(level: &str, format: &str) {
    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

async fn connect_store(settings: &Settings) -> std::io::Result<Arc<dyn SharedStore>> {
    if settings.store.is_memory() {
        warn!("Using the in-memory store; pairs are not shared with other instances");
        return Ok(Arc::new(MemoryStore::new()));
    }

    match RedisStore::connect(&settings.store.redis_url).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) => {
            error!("Failed to connect to Redis: {}", e);
            Err(std::io::Error::new(std::io::ErrorKind::Other, "Redis connection required"))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings.logging.level, &settings.logging.format);

    info!("Starting Lume pairing service...");

    let store = connect_store(&settings).await?;
    let keys = StoreKey::new(settings.store.key_prefix.clone());

    let collections = AppwriteCollections {
        profiles: settings.collection.profiles.clone(),
        subscriptions: settings.collection.subscriptions.clone(),
    };

    let directory = AppwriteDirectory::new(
        settings.appwrite.endpoint.clone(),
        settings.appwrite.api_key.clone(),
        settings.appwrite.project_id.clone(),
        settings.appwrite.database_id.clone(),
        collections,
        Duration::from_secs(settings.appwrite.request_timeout_secs),
    )
    .map_err(|e| {
        error!("Failed to build Appwrite client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    info!("Appwrite directory initialized");

    let directory = Arc::new(directory);
    let resolver = if settings.cache.size > 0 {
        info!(
            "Preference cache enabled ({} entries, TTL: {}s)",
            settings.cache.size, settings.cache.ttl_secs
        );
        PreferenceResolver::with_cache(directory, settings.cache.size, Duration::from_secs(settings.cache.ttl_secs))
    } else {
        PreferenceResolver::new(directory)
    };

    let engine_config = EngineConfig::from(&settings.matching);
    info!("Match engine initialized with {:?}", engine_config);

    let engine = Arc::new(MatchEngine::new(store.clone(), keys, resolver, engine_config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep = if settings.sweep.enabled {
        let sweep = BackgroundSweep::new(engine.clone(), settings.sweep.interval());
        Some(tokio::spawn(sweep.run(shutdown_rx)))
    } else {
        info!("Background sweep disabled");
        None
    };

    let app_state = AppState { engine, store };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let served = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    // Stop the sweep once the server is done
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweep {
        if let Err(e) = handle.await {
            warn!("Background sweep ended abnormally: {}", e);
        }
    }

    info!("Lume pairing service stopped");
    served
}
