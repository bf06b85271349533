//! `GET /v1/usage`: the authenticated tenant's usage summary.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};

use crate::auth::TenantContext;
use crate::error::{ApiError, FieldError, GatewayError};
use crate::store::UsageRange;
use crate::usage::{summarize, UsageSummary};

use super::auth::RequestId;
use super::routes::AppState;
use super::types::UsageQuery;

fn parse_bound(
    raw: Option<&str>,
    name: &str,
    errors: &mut Vec<FieldError>,
) -> Option<DateTime<Utc>> {
    let raw = raw.filter(|s| !s.is_empty())?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(_) => {
            errors.push(FieldError::new(
                name,
                format!("Invalid datetime format for \"{}\"", name),
            ));
            None
        }
    }
}

/// Validate `from`/`to` into a range.
pub(crate) fn parse_range(query: &UsageQuery) -> Result<UsageRange, GatewayError> {
    let mut errors = Vec::new();
    let from = parse_bound(query.from.as_deref(), "from", &mut errors);
    let to = parse_bound(query.to.as_deref(), "to", &mut errors);

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            errors.push(FieldError::new(
                "from",
                "\"from\" date must be before or equal to \"to\" date",
            ));
        }
    }
    if !errors.is_empty() {
        return Err(GatewayError::validation("Invalid query parameters", errors));
    }
    Ok(UsageRange { from, to })
}

pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageSummary>, ApiError> {
    let range = parse_range(&query).map_err(|e| e.with_request_id(request_id.clone()))?;

    let rows = state
        .store
        .list_requests(&tenant.org_id, &range)
        .await
        .map_err(|e| {
            tracing::warn!(org_id = %tenant.org_id, "Usage query failed: {}", e);
            GatewayError::Internal("Failed to fetch usage".into()).with_request_id(request_id)
        })?;

    Ok(Json(summarize(&rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(from: Option<&str>, to: Option<&str>) -> UsageQuery {
        UsageQuery {
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        }
    }

    #[test]
    fn test_open_range() {
        let range = parse_range(&query(None, None)).unwrap();
        assert!(range.from.is_none() && range.to.is_none());
    }

    #[test]
    fn test_offsets_are_normalised() {
        let range = parse_range(&query(Some("2026-01-01T02:00:00+02:00"), None)).unwrap();
        assert_eq!(range.from.unwrap().to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_invalid_datetime() {
        let err = parse_range(&query(Some("yesterday"), None)).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_from_after_to() {
        let err = parse_range(&query(
            Some("2026-02-01T00:00:00Z"),
            Some("2026-01-01T00:00:00Z"),
        ))
        .unwrap_err();
        match err {
            GatewayError::Validation { details, .. } => assert_eq!(details[0].path, "from"),
            other => panic!("unexpected {other:?}"),
        }

        let same = "2026-01-01T00:00:00Z";
        assert!(parse_range(&query(Some(same), Some(same))).is_ok());
    }
}
