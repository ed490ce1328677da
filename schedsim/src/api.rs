//! HTTP surface over a shared [`Simulation`].

use crate::process::{MAX_MEMORY_MB, ProcessSpec};
use crate::simulation::{Simulation, SimulationView};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{debug, warn};
use serde_json::{Value, json};
use std::sync::Arc;

pub fn router(sim: Arc<Simulation>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/start", post(start))
        .route("/api/stop", post(stop))
        .route("/api/add_process", post(add_process))
        .route("/api/metrics", get(metrics))
        .with_state(sim)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn start(State(sim): State<Arc<Simulation>>) -> Json<Value> {
    sim.set_running(true);
    Json(json!({ "status": "running" }))
}

async fn stop(State(sim): State<Arc<Simulation>>) -> Json<Value> {
    sim.set_running(false);
    Json(json!({ "status": "stopped" }))
}

async fn add_process(
    State(sim): State<Arc<Simulation>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let spec = parse_spec(&body)?;
    if let Err(reason) = validate_spec(&spec) {
        warn!("[api] rejected process spec: {reason}");
        return Err(ApiError::bad_request(reason));
    }

    let proc = sim.submit(&spec);
    let count = sim.process_count();
    debug!("[api] added pid={} ({} tracked)", proc.pid, count);
    Ok(Json(json!({ "added": proc, "count": count })))
}

async fn metrics(State(sim): State<Arc<Simulation>>) -> Json<SimulationView> {
    Json(sim.snapshot())
}

fn parse_spec(body: &[u8]) -> Result<ProcessSpec, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ProcessSpec::default());
    }
    match serde_json::from_slice::<Option<ProcessSpec>>(body) {
        Ok(spec) => Ok(spec.unwrap_or_default()),
        Err(err) => Err(ApiError::bad_request(format!("invalid process spec: {err}"))),
    }
}

/// Negative or oversized values, inverted ranges and io_bound outside [0, 1]
/// are rejected here; the core would replace or clamp them instead.
pub fn validate_spec(spec: &ProcessSpec) -> Result<(), String> {
    if let Some(burst) = spec.cpu_burst
        && burst < 0.0
    {
        return Err(format!("cpu_burst must not be negative (got {burst})"));
    }
    if let Some((lo, hi)) = spec.cpu_range
        && (lo < 0.0 || lo > hi)
    {
        return Err(format!("cpu_range [{lo}, {hi}] is not a valid range"));
    }
    if let Some(io) = spec.io_bound
        && !(0.0..=1.0).contains(&io)
    {
        return Err(format!("io_bound must be within [0, 1] (got {io})"));
    }
    if let Some(mb) = spec.memory_mb
        && !(0..=MAX_MEMORY_MB as i64).contains(&mb)
    {
        return Err(format!("memory_mb must be within [0, {MAX_MEMORY_MB}] (got {mb})"));
    }
    if let Some((lo, hi)) = spec.memory_range
        && (lo < 0 || lo > hi || hi > MAX_MEMORY_MB as i64)
    {
        return Err(format!("memory_range [{lo}, {hi}] is not a valid range"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_means_default_spec() {
        assert_eq!(parse_spec(b"").unwrap(), ProcessSpec::default());
        assert_eq!(parse_spec(b"  \n").unwrap(), ProcessSpec::default());
        assert_eq!(parse_spec(b"null").unwrap(), ProcessSpec::default());
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = parse_spec(b"{\"priority\": \"high\"").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn validation_catches_impossible_values() {
        let ok = ProcessSpec {
            cpu_range: Some((1.0, 2.0)),
            io_bound: Some(0.0),
            ..Default::default()
        };
        assert!(validate_spec(&ok).is_ok());

        let negative = ProcessSpec {
            cpu_burst: Some(-1.0),
            ..Default::default()
        };
        assert!(validate_spec(&negative).unwrap_err().contains("cpu_burst"));

        let inverted = ProcessSpec {
            memory_range: Some((512, 128)),
            ..Default::default()
        };
        assert!(validate_spec(&inverted).unwrap_err().contains("memory_range"));

        let io = ProcessSpec {
            io_bound: Some(1.5),
            ..Default::default()
        };
        assert!(validate_spec(&io).unwrap_err().contains("io_bound"));

        let huge = ProcessSpec {
            memory_mb: Some(i64::MAX),
            ..Default::default()
        };
        assert!(validate_spec(&huge).unwrap_err().contains("memory_mb"));

        let huge_range = ProcessSpec {
            memory_range: Some((1, i64::MAX)),
            ..Default::default()
        };
        assert!(validate_spec(&huge_range).unwrap_err().contains("memory_range"));
    }
}
