//! `GET /items` and `GET /items/plan`.
//!
//! Both read the raw query string as an ordered list of pairs so repeated
//! and bracketed keys (`price[min]`) reach the builders unchanged.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_core::{Document, QueryError, QueryPlan, ResultEnvelope};
use serde_json::json;

use super::AppState;

/// A [`QueryError`] rendered as an HTTP response.
///
/// Client errors map to `400`, data source failures and cancellations to
/// `503`. The body is `{"error": kind, "field"?: name, "message": text}`.
#[derive(Debug)]
pub struct ApiError(pub QueryError);

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        Self(error)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        if let Some(field) = self.0.field() {
            body["field"] = json!(field);
        }
        (status, Json(body)).into_response()
    }
}

/// One page of the collection.
///
/// # Errors
///
/// Returns [`ApiError`] for invalid parameters or cursors, an unavailable
/// data source, or a query cancelled by shutdown.
pub async fn items_handler(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<ResultEnvelope<Document>>, ApiError> {
    let _in_flight = state.shutdown.in_flight_guard();
    let request = state
        .executor
        .parse(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

    let envelope = state
        .executor
        .execute_cancellable(
            &request.filter,
            &request.sort,
            &request.window,
            state.source.as_ref(),
            &state.shutdown.query_token(),
        )
        .await?;
    Ok(Json(envelope))
}

/// The plan `/items` would run for the same parameters, without running it.
///
/// # Errors
///
/// Returns [`ApiError`] for invalid parameters or cursors.
pub async fn plan_handler(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<QueryPlan>, ApiError> {
    let request = state
        .executor
        .parse(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    Ok(Json(request.plan()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_bad_requests() {
        let err = ApiError(QueryError::validation("xyz", "not in allow-list"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(QueryError::invalid_cursor("bad")).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn server_side_failures_are_unavailable() {
        let err = ApiError(QueryError::source_unavailable(anyhow::anyhow!("down")));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError(QueryError::Cancelled).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn error_body_names_kind_and_field() {
        let response = ApiError(QueryError::validation("limit", "expected an integer")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "validation");
        assert_eq!(body["field"], "limit");
        assert_eq!(
            body["message"],
            "invalid parameter `limit`: expected an integer"
        );
    }
}
