mod config;
mod dispatch;
mod docstore;
mod registry;
mod remote;
mod routes;
mod security;
mod servers;
mod services;
mod sqlstore;
mod state;

use std::path::Path;
use std::sync::Arc;

use config::AppConfig;
use dispatch::Server;
use docstore::{DocDataService, MemoryDocumentStore};
use registry::Registry;
use servers::{HttpServer, PassthroughServer};
use services::login::LoginService;
use sqlstore::{PgRelationStore, SqlDataService};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config_path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "switchboard.json".into());
    let config_path = Path::new(&config_path);
    let app_config =
        config::prepare_config(AppConfig::default(), config_path, config_path.exists(), true)
            .expect("config preparation failed");

    let signing_key = std::env::var("SIGNING_KEY")
        .unwrap_or_else(|_| app_config.signing_key.clone())
        .into_bytes();

    let registry = Arc::new(Registry::new());

    // Document data service over the in-process store.
    let doc_store = Arc::new(MemoryDocumentStore::new());
    let objects = DocDataService::new(Some(doc_store)).with_commands(app_config.doc_commands.clone());
    registry.register_service("objects", Arc::new(objects));

    // Relational data service, wired only when a database is configured.
    if let Some(database_url) = &app_config.database_url {
        match PgRelationStore::connect(database_url, 5).await {
            Ok(store) => {
                let records = SqlDataService::new(Some(Arc::new(store)))
                    .with_commands(app_config.sql_commands.clone());
                registry.register_service("records", Arc::new(records));
            }
            Err(error) => {
                tracing::warn!(%error, "relational store unavailable; records service disabled");
            }
        }
    }

    registry.register_service(
        "users",
        Arc::new(LoginService::new(
            app_config.users.clone(),
            app_config.token_expire_seconds,
            signing_key.clone(),
        )),
    );

    let app_state = state::AppState::new(
        Arc::clone(&registry),
        signing_key,
        app_config.session_cookie.clone(),
        app_config.static_dir.clone(),
    );

    registry.register_server("http", Arc::new(HttpServer::new(app_config.port, app_state)));
    if let Some(passthrough) = &app_config.passthrough {
        registry.register_server(
            "passthrough",
            Arc::new(PassthroughServer::new(passthrough.port, passthrough.upstream.clone())),
        );
    }

    for (name, server) in registry.servers() {
        if let Err(error) = server.start().await {
            tracing::error!(server = %name, %error, "server failed to start");
        }
    }

    tokio::signal::ctrl_c().await.expect("signal handler failed");
    tracing::info!("shutting down");
    for (name, server) in registry.servers() {
        if let Err(error) = server.stop().await {
            tracing::warn!(server = %name, %error, "server failed to stop");
        }
    }
}
