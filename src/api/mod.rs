pub mod cache_routes;
pub mod error;

pub use error::ApiError;

use crate::cache::CacheService;
use crate::config::ApiConfig;
use crate::invalidation::CacheInvalidationService;
use crate::monitoring::{AlertThresholds, CacheMonitoringService, HealthState, TraceMiddleware};
use actix_cors::Cors;
use actix_web::{web, App, Error, HttpResponse, HttpServer};
use chrono::Utc;
use serde_json::json;
use tracing::info;

/// Services shared by every worker
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheService,
    pub invalidation: CacheInvalidationService,
    pub monitoring: CacheMonitoringService,
}

impl AppState {
    /// Default invalidation policy, no alert webhook
    pub fn new(cache: CacheService, thresholds: AlertThresholds, alert_log_capacity: usize) -> Self {
        Self {
            invalidation: CacheInvalidationService::new(cache.clone()),
            monitoring: CacheMonitoringService::new(cache.clone(), thresholds, alert_log_capacity),
            cache,
        }
    }

    pub fn from_parts(
        cache: CacheService,
        invalidation: CacheInvalidationService,
        monitoring: CacheMonitoringService,
    ) -> Self {
        Self {
            cache,
            invalidation,
            monitoring,
        }
    }
}

/// Extractor failures answer with the same JSON shape as handler errors
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::bad_request(format!("Invalid request body: {}", err)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::bad_request(format!("Invalid query parameters: {}", err)).into()
    }));
}

async fn root_handler() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("pathcache is running\n\nTry /health or /api/cache/metrics\n"))
}

/// GET /health
///
/// 503 when the store is unreachable or the cache is unhealthy.
async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let reachable = state.cache.ping().await;
    let health = state.monitoring.get_health_status();
    let status = if reachable {
        health.status
    } else {
        HealthState::Unhealthy
    };
    let serving = status != HealthState::Unhealthy;
    let body = json!({
        "status": status,
        "store": {
            "backend": state.cache.store().backend_name(),
            "reachable": reachable,
        },
        "cache": health,
        "timestamp": Utc::now().to_rfc3339(),
    });

    if serving {
        Ok(HttpResponse::Ok().json(body))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(body))
    }
}

/// GET /monitoring/metrics in Prometheus text format
async fn get_prometheus_metrics() -> Result<HttpResponse, Error> {
    let prometheus_text = crate::monitoring::metrics::export_prometheus();
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(prometheus_text))
}

/// Every route served by the API
pub fn configure(cfg: &mut web::ServiceConfig) {
    configure_extractors(cfg);
    cfg.route("/", web::get().to(root_handler))
        .route("/health", web::get().to(health_check))
        .service(web::scope("/monitoring").route("/metrics", web::get().to(get_prometheus_metrics)));
    cache_routes::configure(cfg);
}

pub fn start_api_server(
    config: &ApiConfig,
    state: AppState,
) -> std::io::Result<actix_web::dev::Server> {
    let bind_addr = config.bind_addr();
    let state = web::Data::new(state);

    let mut http_server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::AUTHORIZATION,
            ])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(TraceMiddleware::new())
            .configure(configure)
    });
    if let Some(workers) = config.workers {
        http_server = http_server.workers(workers.max(1));
    } else if crate::config::dotenv_disabled() {
        http_server = http_server.workers(1);
    }

    info!(bind_addr = %bind_addr, "Starting API server");
    Ok(http_server.bind(bind_addr)?.run())
}
