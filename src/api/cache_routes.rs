// src/api/cache_routes.rs
// Cache administration endpoints under /api/cache

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::invalidation::{CleanupReport, InvalidationEvent};

const DEFAULT_ALERT_LIMIT: usize = 20;

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateQuery {
    pub pattern: Option<String>,
    pub user_id: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupResponse {
    success: bool,
    #[serde(flatten)]
    report: CleanupReport,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

// ============ Handlers ============

/// GET /api/cache/metrics?type=summary|health|report|basic
pub async fn get_metrics(
    state: web::Data<AppState>,
    query: web::Query<MetricsQuery>,
) -> Result<HttpResponse, ApiError> {
    let monitoring = &state.monitoring;
    let body = match non_empty(query.kind.as_ref()).unwrap_or("summary") {
        "summary" => json!({
            "success": true,
            "metrics": monitoring.get_performance_metrics(),
        }),
        "basic" => json!({
            "success": true,
            "metrics": state.cache.get_metrics(),
            "keyCount": state.cache.key_count().await,
        }),
        "health" => json!({
            "success": true,
            "health": monitoring.get_health_status(),
            "storeReachable": state.cache.ping().await,
        }),
        "report" => json!({
            "success": true,
            "report": monitoring.generate_performance_report(),
        }),
        other => {
            return Err(ApiError::bad_request(format!(
                "Invalid type '{}': expected summary, health, report or basic",
                other
            )))
        }
    };
    Ok(HttpResponse::Ok().json(body))
}

/// DELETE /api/cache/metrics?action=reset-metrics
pub async fn reset_metrics(
    state: web::Data<AppState>,
    query: web::Query<ActionQuery>,
) -> Result<HttpResponse, ApiError> {
    match non_empty(query.action.as_ref()) {
        Some("reset-metrics") => {
            state.cache.reset_metrics();
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Cache metrics reset",
            })))
        }
        Some(other) => Err(ApiError::bad_request(format!(
            "Invalid action '{}': expected reset-metrics",
            other
        ))),
        None => Err(ApiError::bad_request("Missing action parameter")),
    }
}

/// GET /api/cache/alerts?limit=&action=monitor|recent
pub async fn get_alerts(
    state: web::Data<AppState>,
    query: web::Query<AlertsQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    match non_empty(query.action.as_ref()).unwrap_or("recent") {
        "monitor" => {
            let new_alerts = state.monitoring.monitor_and_alert();
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "count": new_alerts.len(),
                "newAlerts": new_alerts,
            })))
        }
        "recent" => {
            let alerts = state.monitoring.get_recent_alerts(limit);
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "count": alerts.len(),
                "alerts": alerts,
            })))
        }
        other => Err(ApiError::bad_request(format!(
            "Invalid action '{}': expected monitor or recent",
            other
        ))),
    }
}

/// POST /api/cache/cleanup?action=scheduled|flush-all
pub async fn run_cleanup(
    state: web::Data<AppState>,
    query: web::Query<ActionQuery>,
) -> Result<HttpResponse, ApiError> {
    match non_empty(query.action.as_ref()) {
        Some("scheduled") => {
            let report = state.invalidation.scheduled_cleanup().await;
            Ok(HttpResponse::Ok().json(CleanupResponse {
                success: true,
                report,
            }))
        }
        Some("flush-all") => {
            if !state.cache.flush_all().await {
                return Err(ApiError::internal(
                    "Cache flush failed",
                    "key-value store rejected the flush; see server logs",
                ));
            }
            info!("Cache flushed via API");
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "flushed": true,
            })))
        }
        Some(other) => Err(ApiError::bad_request(format!(
            "Invalid action '{}': expected scheduled or flush-all",
            other
        ))),
        None => Err(ApiError::bad_request("Missing action parameter")),
    }
}

/// POST /api/cache/invalidate
pub async fn invalidate_event(
    state: web::Data<AppState>,
    event: web::Json<InvalidationEvent>,
) -> Result<HttpResponse, ApiError> {
    let event = event.into_inner();
    event
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let result = state.invalidation.invalidate(&event).await;
    Ok(HttpResponse::Ok().json(result))
}

/// DELETE /api/cache/invalidate?pattern=|userId=|key=
///
/// The first parameter present wins, in that order.
pub async fn invalidate_targets(
    state: web::Data<AppState>,
    query: web::Query<InvalidateQuery>,
) -> Result<HttpResponse, ApiError> {
    if let Some(pattern) = non_empty(query.pattern.as_ref()) {
        crate::store::validate_pattern(pattern).map_err(|e| ApiError::bad_request(e.to_string()))?;
        let outcome = state.invalidation.clear_pattern(pattern).await;
        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "pattern": pattern,
            "deletedCount": outcome.deleted_count,
            "errors": outcome.errors,
        })));
    }

    if let Some(user_id) = non_empty(query.user_id.as_ref()) {
        crate::invalidation::events::check_id("userId", user_id)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let outcome = state.invalidation.invalidate_user_cache(user_id).await;
        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "userId": user_id,
            "deletedCount": outcome.deleted_count,
            "errors": outcome.errors,
        })));
    }

    if let Some(key) = non_empty(query.key.as_ref()) {
        let deleted = state.invalidation.invalidate_key(key).await;
        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "key": key,
            "deleted": deleted,
        })));
    }

    Err(ApiError::bad_request(
        "One of pattern, userId or key is required",
    ))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/cache")
            .route("/metrics", web::get().to(get_metrics))
            .route("/metrics", web::delete().to(reset_metrics))
            .route("/alerts", web::get().to(get_alerts))
            .route("/cleanup", web::post().to(run_cleanup))
            .route("/invalidate", web::post().to(invalidate_event))
            .route("/invalidate", web::delete().to(invalidate_targets)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{keys, CacheService};
    use crate::invalidation::CacheInvalidationService;
    use crate::monitoring::{AlertThresholds, CacheMonitoringService};
    use crate::store::MemoryStore;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;
    use std::sync::Arc;

    fn state() -> AppState {
        let cache = CacheService::new(Arc::new(MemoryStore::new()));
        let thresholds = AlertThresholds {
            min_samples: 2,
            ..AlertThresholds::default()
        };
        AppState::new(cache, thresholds, 10)
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .configure(super::super::configure_extractors)
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_metrics_summary_default() {
        let state = state();
        state.cache.set("a", &1u32, None).await;
        state.cache.get::<u32>("a").await;
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/cache/metrics").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["metrics"]["hits"], 1);
        assert_eq!(body["metrics"]["hitRate"], 1.0);
    }

    #[actix_web::test]
    async fn test_metrics_health_and_report() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::get()
            .uri("/api/cache/metrics?type=health")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["health"]["status"], "healthy");
        assert_eq!(body["storeReachable"], true);

        let req = test::TestRequest::get()
            .uri("/api/cache/metrics?type=report")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["report"]["recommendations"].is_array());
    }

    #[actix_web::test]
    async fn test_unknown_metrics_type_is_400() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::get()
            .uri("/api/cache/metrics?type=bogus")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_reset_metrics() {
        let state = state();
        state.cache.get::<u32>("missing").await;
        let app = app!(state);

        let req = test::TestRequest::delete()
            .uri("/api/cache/metrics")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = test::TestRequest::delete()
            .uri("/api/cache/metrics?action=reset-metrics")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(state.cache.get_metrics().misses, 0);
    }

    #[actix_web::test]
    async fn test_alerts_monitor_then_recent() {
        let state = state();
        state.cache.get::<u32>("x").await;
        state.cache.get::<u32>("y").await;
        let app = app!(state);

        let req = test::TestRequest::get()
            .uri("/api/cache/alerts?action=monitor")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["newAlerts"][0]["kind"], "low-hit-rate");

        let req = test::TestRequest::get()
            .uri("/api/cache/alerts?action=monitor")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 0);

        let req = test::TestRequest::get()
            .uri("/api/cache/alerts?limit=5")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["alerts"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_invalid_alert_limit_is_json_400() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::get()
            .uri("/api/cache/alerts?limit=lots")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_cleanup_actions() {
        let state = state();
        state
            .cache
            .store()
            .set("module:9:detail", "not json", Some(std::time::Duration::from_secs(60)))
            .await
            .unwrap();
        state.cache.set(&keys::path_detail("1"), &"p", None).await;
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/cache/cleanup?action=scheduled")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["totalKeysRemoved"], 1);
        assert_eq!(body["perCategory"]["corrupt"], 1);

        let req = test::TestRequest::post()
            .uri("/api/cache/cleanup?action=flush-all")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["flushed"], true);
        assert_eq!(state.cache.key_count().await, Some(0));

        let req = test::TestRequest::post()
            .uri("/api/cache/cleanup?action=vacuum")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[actix_web::test]
    async fn test_invalidate_event() {
        let state = state();
        state.cache.set(&keys::path_detail("123"), &"path", None).await;
        state.cache.set(&keys::paths_list("published"), &vec![1], None).await;
        state.cache.set(&keys::path_detail("999"), &"other", None).await;
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/cache/invalidate")
            .set_json(json!({"type": "LEARNING_PATH", "entityId": "123"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        let removed: Vec<&str> = body["invalidatedKeys"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(removed.contains(&"path:123:detail"));
        assert!(removed.contains(&"paths:list:published"));
        assert!(state.cache.exists(&keys::path_detail("999")).await);
    }

    #[actix_web::test]
    async fn test_invalidate_event_rejects_bad_input() {
        let state = state();
        let app = app!(state);

        for body in [
            json!({"type": "LEARNING_PATH", "entityId": ""}),
            json!({"type": "SPACESHIP", "entityId": "1"}),
            json!({"entityId": "1"}),
        ] {
            let req = test::TestRequest::post()
                .uri("/api/cache/invalidate")
                .set_json(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["success"], false);
        }

        let req = test::TestRequest::post()
            .uri("/api/cache/invalidate")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[actix_web::test]
    async fn test_delete_invalidate_variants() {
        let state = state();
        state.cache.set(&keys::user_dashboard("7"), &1, None).await;
        state.cache.set(&keys::user_profile("7"), &1, None).await;
        state.cache.set(&keys::module_detail("3"), &1, None).await;
        state.cache.set(&keys::challenge_detail("4"), &1, None).await;
        let app = app!(state);

        let req = test::TestRequest::delete()
            .uri("/api/cache/invalidate?userId=7")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["deletedCount"], 2);

        let req = test::TestRequest::delete()
            .uri("/api/cache/invalidate?pattern=module:*")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["deletedCount"], 1);
        assert_eq!(body["errors"], serde_json::json!([]));

        let req = test::TestRequest::delete()
            .uri("/api/cache/invalidate?pattern=user:%5B12")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("user:[12"));

        let req = test::TestRequest::delete()
            .uri("/api/cache/invalidate?key=challenge:4:detail")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["deleted"], true);

        let req = test::TestRequest::delete()
            .uri("/api/cache/invalidate")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
