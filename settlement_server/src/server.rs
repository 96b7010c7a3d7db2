//! Server assembly: pool construction, migrations, the job engine, route registration and the
//! graceful shutdown sequence.
use std::sync::{Arc, LazyLock};

use actix_web::{
    dev::Server,
    error::JsonPayloadError,
    middleware::{DefaultHeaders, Logger},
    web,
    App,
    HttpRequest,
    HttpServer,
};
use log::info;
use settlement_engine::{traits::PlatformDatabase, JobEngine, OrderFlowApi, PgDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    metrics,
    middleware::RequestTelemetryFactory,
    routes,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let url = config.database.connection_url();
    let db = PgDatabase::new_with_url(&url, config.database.max_conns, config.database.max_idle).await?;
    db.migrate().await?;
    info!("🗃️ Database connection established ({} max connections)", config.database.max_conns);

    let db = Arc::new(db);
    let engine = Arc::new(JobEngine::new(Arc::clone(&db), config.engine_config()));
    engine.start();
    info!(
        "⚙️ Job retry policy: {} attempts, {:?} delay (enforced by the dispatcher, not the engine)",
        config.jobs.retry_attempts, config.jobs.retry_delay
    );

    let srv = create_server_instance(&config, Arc::clone(&db), Arc::clone(&engine))?;
    info!("🚀️ HTTP server listening on {}:{}", config.host, config.port);
    let result = srv.await;

    // The HTTP listener is gone; let in-flight jobs observe cancellation and join the pool.
    engine.shutdown().await;
    result.map_err(ServerError::IoError)
}

pub fn create_server_instance<B: PlatformDatabase + 'static>(
    config: &ServerConfig,
    db: Arc<B>,
    engine: Arc<JobEngine<B>>,
) -> Result<Server, ServerError> {
    LazyLock::force(&routes::STARTED_AT);
    let srv = HttpServer::new(move || {
        let order_api = OrderFlowApi::new(Arc::clone(&db));
        // Wraps execute in reverse registration order: the Logger is outermost so it sees the
        // request id the telemetry middleware attaches.
        App::new()
            .wrap(RequestTelemetryFactory)
            .wrap(
                DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
                    .add(("Access-Control-Allow-Headers", "Origin, Content-Type, Accept, X-Request-ID"))
                    .add(("Access-Control-Expose-Headers", "X-Request-ID")),
            )
            .wrap(Logger::new("%r %s (%D ms) %a req_id=%{x-request-id}o").log_target("http"))
            .app_data(web::Data::new(order_api))
            .app_data(web::Data::from(Arc::clone(&engine)))
            .app_data(web::Data::from(Arc::clone(&db)))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .route("/health", web::get().to(routes::health::<B>))
            .route("/metrics", web::get().to(metrics::metrics_handler))
            .service(
                web::scope("/orders")
                    .route("", web::post().to(routes::create_order::<B>))
                    .route("", web::get().to(routes::list_orders::<B>))
                    .route("/{id}", web::get().to(routes::get_order::<B>)),
            )
            .service(
                web::scope("/jobs")
                    .route("/settlement", web::post().to(routes::create_settlement_job::<B>))
                    .route("/{id}", web::get().to(routes::get_job::<B>))
                    .route("/{id}/cancel", web::post().to(routes::cancel_job::<B>)),
            )
            .route("/downloads/{filename}", web::get().to(routes::download_settlement::<B>))
    })
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Malformed JSON bodies become the platform's validation error shape instead of actix's default
/// plain-text 400.
pub(crate) fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ServerError::InvalidRequestBody(err.to_string()).into()
}
