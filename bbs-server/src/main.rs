//! # bbs-server binary
//!
//! Boot sequence mirrors the teacher's `auth-service::main`: load config,
//! init tracing, stand up the store/cache, build the service layer, mount
//! `routes::configure`, and serve. The BBS adds two things the teacher's
//! single-purpose service doesn't need: a local+remote app bootstrap before
//! the server starts accepting connections, and a background session-reap
//! loop (§9 open question 3).

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use bbs_server::api::{self, AppState};
use bbs_server::capability::CapabilityFacade;
use bbs_server::local::LocalLoader;
use bbs_server::registry::AppRegistry;
use bbs_server::remote::RemoteLoader;
use bbs_server::service::{Identity, SessionSvc};
use bbs_server::shell::Shell;
use bbs_server::store::memory_store::InMemoryStore;
use bbs_server::store::pg_store::PgStore;
use bbs_server::store::Store;
use shared::config::AppConfig;
use shared::rate_limit::RateLimiter;
use shared::redis_client::RedisClient;
use shared::{database, tracing_config};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::from_env().expect("failed to load configuration");
    tracing_config::init_tracing(&config.service_name, config.is_production());

    let store: Arc<dyn Store> = match config.store.backend.as_str() {
        "memory" => Arc::new(InMemoryStore::new()),
        _ => {
            let pool = database::create_pool(&config.database).await.expect("failed to connect to database");
            Arc::new(PgStore::new(pool))
        }
    };

    let redis = RedisClient::new(&config.redis).await.expect("failed to connect to redis");
    let rate_limiter = Arc::new(RateLimiter::new(redis, config.rate_limit.clone()));

    let sessions = SessionSvc::new(store.clone());
    let identity = Identity::new();
    let registry = Arc::new(AppRegistry::new());
    let remote_loader = Arc::new(RemoteLoader::new(config.remote.clone(), config.sandbox.clone(), rate_limiter.clone()));

    let caps_for = {
        let store = store.clone();
        let sessions = sessions.clone();
        let identity = identity.clone();
        let rate_limiter = rate_limiter.clone();
        move |app_id: &str| CapabilityFacade::new(app_id.to_string(), store.clone(), sessions.clone(), identity.clone(), rate_limiter.clone())
    };

    LocalLoader::load_all(&registry, &caps_for).await.expect("failed to register builtin apps");

    for url in &config.remote.admin_app_urls {
        let app_id_hint = format!("admin-preinstall:{url}");
        if let Err(e) = remote_loader.install(&registry, url, caps_for(&app_id_hint)).await {
            tracing::error!(url = %url, error = %e, "failed to pre-install admin remote app");
        }
    }

    let shell = Arc::new(Shell::new(store.clone(), sessions.clone(), identity.clone(), registry.clone(), remote_loader.clone(), rate_limiter.clone()));

    let reap_sessions = sessions.clone();
    let reap_interval_hours = config.store.reap_interval_hours;
    let session_ttl_days = config.store.session_ttl_days;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(reap_interval_hours * 3600));
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(session_ttl_days);
            match reap_sessions.reap(cutoff).await {
                Ok(count) => tracing::info!(reaped = count, "session reap completed"),
                Err(e) => tracing::error!(error = %e, "session reap failed"),
            }
        }
    });

    let app_state = web::Data::new(AppState { store, sessions, identity, registry, shell });

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    tracing::info!(host = %server_host, port = server_port, "starting bbs-server");

    HttpServer::new(move || {
        let cors = Cors::default().allow_any_origin().allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(app_state.clone())
            .configure(api::routes::configure)
    })
    .bind((server_host.as_str(), server_port))?
    .run()
    .await
}
