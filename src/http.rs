//! HTTP transport for change-metis
//!
//! Axum server exposing strategy generation and stakeholder scoring as JSON
//! endpoints. Health, info, and metrics are plain JSON.

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{cmp::Ordering, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::clients::generator_from_config;
use crate::config::Config;
use crate::error::{ChangeMetisError, Result};
use crate::mailer::{StrategyMailer, dispatch, mailer_from_config};
use crate::orchestrator::{StrategyOrchestrator, StrategyResult};
use crate::risk::{StakeholderImpact, build_impact};
use crate::schemas::Assessment;

const LATENCY_WINDOW: usize = 256;

/// Shared state for HTTP server
#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<StrategyOrchestrator>,
    pub mailer: Option<Arc<dyn StrategyMailer>>,
    pub metrics: Arc<Mutex<HttpMetrics>>,
}

impl HttpState {
    pub fn new(
        config: Arc<Config>,
        orchestrator: Arc<StrategyOrchestrator>,
        mailer: Option<Arc<dyn StrategyMailer>>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            mailer,
            metrics: Arc::new(Mutex::new(HttpMetrics::new())),
        }
    }

    /// Wire generator and mailer from configuration.
    pub fn from_config(config: Config) -> Self {
        let generator = generator_from_config(&config.generator);
        let orchestrator = StrategyOrchestrator::new(
            generator,
            Duration::from_millis(config.generator.timeout_ms),
        );
        let mailer = mailer_from_config(&config.mailer, &config.runtime);
        Self::new(Arc::new(config), Arc::new(orchestrator), mailer)
    }
}

/// Metrics for HTTP server
#[derive(Debug, Clone)]
pub struct HttpMetrics {
    pub total_requests: u64,
    pub last_request_unix: u64,
    pub errors_total: u64,
    pub strategies_total: u64,
    pub fallbacks_total: u64,
    pub latencies: Vec<f64>, // ring buffer for p95
}

impl HttpMetrics {
    fn new() -> Self {
        Self {
            total_requests: 0,
            last_request_unix: unix_now(),
            errors_total: 0,
            strategies_total: 0,
            fallbacks_total: 0,
            latencies: Vec::with_capacity(LATENCY_WINDOW),
        }
    }

    fn record_strategy(&mut self, result: &StrategyResult) {
        self.strategies_total = self.strategies_total.saturating_add(1);
        if result.fallback_used {
            self.fallbacks_total = self.fallbacks_total.saturating_add(1);
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// `POST /strategy` body as the form sends it.
#[derive(Debug, Deserialize)]
struct WrappedRequest {
    data: Assessment,
    #[serde(default)]
    email: Option<String>,
}

/// Accepts `{ "data": Assessment, "email"? }` or a bare assessment. A body with
/// a `data` key is only ever read as the wrapped form.
fn parse_strategy_request(body: &[u8]) -> Result<(Assessment, Option<String>)> {
    let value: Value = serde_json::from_slice(body)?;
    if value.get("data").is_some() {
        let wrapped: WrappedRequest = serde_json::from_value(value)?;
        Ok((wrapped.data, wrapped.email))
    } else {
        Ok((serde_json::from_value(value)?, None))
    }
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    "ok"
}

/// Info endpoint
pub async fn info_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let generator = &state.config.generator;
    (
        StatusCode::OK,
        Json(json!({
            "generator": {
                "name": state.orchestrator.generator_name(),
                "model": generator.model,
                "base_url": generator.base_url,
                "timeout_ms": generator.timeout_ms,
            },
            "mailer": {
                "enabled": state.mailer.is_some(),
            },
            "server": {
                "bind": state.config.runtime.http_bind.to_string(),
                "version": env!("CARGO_PKG_VERSION"),
            }
        })),
    )
}

/// Metrics endpoint
pub async fn metrics_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let metrics = state.metrics.lock().await.clone();

    let (avg_latency_ms, p95_latency_ms) = if metrics.latencies.is_empty() {
        (None, None)
    } else {
        let sum: f64 = metrics.latencies.iter().sum();
        let avg = sum / metrics.latencies.len() as f64;
        let mut sorted = metrics.latencies.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let p95_idx = ((sorted.len() as f64 * 0.95) as usize).min(sorted.len() - 1);
        (Some(avg), sorted.get(p95_idx).copied())
    };

    (
        StatusCode::OK,
        Json(json!({
            "metrics_version": "1",
            "total_requests": metrics.total_requests,
            "last_request_unix": metrics.last_request_unix,
            "errors_total": metrics.errors_total,
            "strategies_total": metrics.strategies_total,
            "fallbacks_total": metrics.fallbacks_total,
            "avg_latency_ms": avg_latency_ms,
            "p95_latency_ms": p95_latency_ms,
        })),
    )
}

/// Generate a strategy. Narrative failures never surface here; only bad input does.
pub async fn strategy_handler(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<Json<StrategyResult>> {
    let (assessment, email) = parse_strategy_request(&body)?;

    let result = state.orchestrator.generate(&assessment).await?;
    state.metrics.lock().await.record_strategy(&result);

    if let (Some(mailer), Some(email)) = (state.mailer.clone(), email) {
        let strategy = result.clone();
        tokio::spawn(async move {
            dispatch(mailer.as_ref(), &email, &strategy, &assessment).await;
        });
    }

    Ok(Json(result))
}

/// Score stakeholders only; accepts `stakeholders` or legacy `stakeholderGroups`.
pub async fn impact_handler(body: Bytes) -> Result<Json<StakeholderImpact>> {
    let assessment: Assessment = serde_json::from_slice(&body)?;
    Ok(Json(build_impact(&assessment.stakeholder_inputs())))
}

/// Build the application router
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/metrics", get(metrics_handler))
        .route("/strategy", post(strategy_handler))
        .route("/impact", post(impact_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            |State(metrics): State<Arc<Mutex<HttpMetrics>>>,
             req: axum::http::Request<Body>,
             next: axum::middleware::Next| async move {
                let tracked = req.method() == axum::http::Method::POST;
                let start = std::time::Instant::now();
                let resp = next.run(req).await;
                if tracked {
                    let latency_ms = start.elapsed().as_millis() as f64;
                    let mut m = metrics.lock().await;
                    m.latencies.push(latency_ms);
                    if m.latencies.len() > LATENCY_WINDOW {
                        m.latencies.remove(0);
                    }
                    if !resp.status().is_success() {
                        m.errors_total = m.errors_total.saturating_add(1);
                    }
                    m.total_requests = m.total_requests.saturating_add(1);
                    m.last_request_unix = unix_now();
                }
                resp
            },
        ))
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_http_server(config: Config) -> Result<()> {
    let bind = config.runtime.http_bind;
    let state = HttpState::from_config(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| ChangeMetisError::Internal {
            message: format!("Failed to bind HTTP listener on {}: {}", bind, e),
        })?;

    tracing::info!("Starting HTTP server on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ChangeMetisError::Internal {
            message: format!("HTTP server error: {}", e),
        })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
