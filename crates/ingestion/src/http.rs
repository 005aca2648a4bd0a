//! HTTP listener - accepts webhook POSTs and feeds the intake

use std::future::Future;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use contracts::Event;
use dispatcher::DispatcherError;

use crate::error::{IngestionError, Result};
use crate::intake::EventIntake;

/// Build the listener router. Every path is accepted.
pub fn router(intake: EventIntake, max_body_bytes: usize) -> Router {
    Router::new()
        .fallback(handle_request)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(intake)
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve<S>(
    listener: TcpListener,
    intake: EventIntake,
    max_body_bytes: usize,
    shutdown: S,
) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, max_body_bytes, "Webhook listener started");

    axum::serve(listener, router(intake, max_body_bytes))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Webhook listener stopped");
    Ok(())
}

/// Decode a request body into events.
///
/// The body must be a JSON array whose elements are all JSON objects.
pub fn parse_events(body: &[u8]) -> Result<Vec<Event>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| IngestionError::malformed(format!("invalid JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(IngestionError::malformed("expected a JSON array of events"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            Event::from_value(item)
                .map_err(|_| IngestionError::malformed(format!("event #{index} is not a JSON object")))
        })
        .collect()
}

async fn handle_request(State(intake): State<EventIntake>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        debug!(method = %method, "Rejecting non-POST request");
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "POST")],
            "Method Not Allowed",
        )
            .into_response();
    }

    let events = match parse_events(&body) {
        Ok(events) => events,
        Err(e) => {
            intake.metrics().record_rejected("malformed_body");
            warn!(error = %e, bytes = body.len(), "Malformed webhook body");
            return e.into_response();
        }
    };

    match intake.add_events(events).await {
        Ok(receipt) => {
            debug!(accepted = receipt.accepted, dropped = receipt.dropped, "Webhook batch accepted");
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => e.into_response(),
    }
}

impl IngestionError {
    /// HTTP status reported to the webhook caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            Self::UnknownDestination { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Dispatcher(DispatcherError::UnknownDestination { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Dispatcher(DispatcherError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Dispatcher(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Webhook request failed");
        }
        (status, self.to_string()).into_response()
    }
}
