//! Registry endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};

use crate::error::{ApiError, GatewayError};
use crate::registry::Model;

use super::auth::RequestId;
use super::routes::AppState;

/// `GET /v1/models`: every registry row, read from the store rather than the cache.
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<Vec<Model>>, ApiError> {
    match state.store.fetch_models().await {
        Ok(models) => Ok(Json(models)),
        Err(e) => {
            tracing::warn!("Models query failed: {}", e);
            Err(GatewayError::Internal("Failed to fetch models".into()).with_request_id(request_id))
        }
    }
}

/// `POST /v1/admin/models/invalidate`
pub async fn invalidate_models(State(state): State<Arc<AppState>>) -> StatusCode {
    state.engine.cache().invalidate().await;
    StatusCode::NO_CONTENT
}
