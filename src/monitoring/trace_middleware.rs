use crate::monitoring::metrics::REQUEST_LATENCY_MS;
use actix_service::{Service, Transform};
use actix_web::{
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    Error,
};
use std::future::{ready, Ready};
use std::task::{Context, Poll};
use std::time::Instant;
use tracing::{info_span, Instrument};

/// Per-request span, request id header and latency histogram
pub struct TraceMiddleware;

impl TraceMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TraceMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for TraceMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> <Self as Transform<S, ServiceRequest>>::Future {
        ready(Ok(TraceMiddlewareService { service }))
    }
}

pub struct TraceMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for TraceMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(
        &self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), <Self as Service<ServiceRequest>>::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> <Self as Service<ServiceRequest>>::Future {
        let method = req.method().to_string();
        let route_label = req
            .match_pattern()
            .unwrap_or_else(|| req.path().to_string());
        let request_id = req
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let span = info_span!(
            "http_request",
            method = %method,
            path = %route_label,
            request_id = %request_id,
            user_agent = %user_agent
        );

        let start = Instant::now();
        let fut = self.service.call(req);

        Box::pin(async move {
            let mut res = fut.instrument(span).await;

            if let Ok(ref mut response) = res {
                let status = response.status().as_u16();
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                let status_class = format!("{}xx", status / 100);

                REQUEST_LATENCY_MS
                    .with_label_values(&[&method, &route_label, &status_class])
                    .observe(duration_ms);

                if let Ok(value) = header::HeaderValue::from_str(&request_id) {
                    response
                        .headers_mut()
                        .insert(header::HeaderName::from_static("x-request-id"), value);
                }

                crate::log_request!(method.as_str(), route_label.as_str(), status, duration_ms);
            }

            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    #[actix_web::test]
    async fn test_request_id_is_echoed() {
        let app = test::init_service(
            App::new()
                .wrap(TraceMiddleware::new())
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/ping")
            .insert_header(("x-request-id", "req-42"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(resp.headers().get("x-request-id").unwrap(), "req-42");
    }

    #[actix_web::test]
    async fn test_request_id_generated() {
        let app = test::init_service(
            App::new()
                .wrap(TraceMiddleware::new())
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        let id = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert_eq!(id.len(), 36);
    }
}
