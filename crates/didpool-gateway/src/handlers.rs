// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Handles GET /api/v1/dids/next, GET /health, GET /metrics.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use didpool_core::DidpoolError;
use didpool_core::types::{
    AllocationRequest, CustomerContext, HealthStatus, Location, TenantContext,
};
use didpool_rotation::AllocationOutcome;
use serde::{Deserialize, Serialize};

use crate::server::GatewayState;

/// Query string of GET /api/v1/dids/next. Everything is optional pass-through.
#[derive(Debug, Default, Deserialize)]
pub struct NextDidQuery {
    pub campaign_id: Option<String>,
    pub agent_id: Option<String>,
    pub caller_id: Option<String>,
    pub customer_state: Option<String>,
    pub customer_area_code: Option<String>,
    pub customer_phone: Option<String>,
}

impl NextDidQuery {
    fn into_request(self, request_id: Option<String>) -> AllocationRequest {
        AllocationRequest {
            campaign_id: non_empty(self.campaign_id),
            agent_id: non_empty(self.agent_id),
            caller_id: non_empty(self.caller_id),
            customer: CustomerContext {
                phone: non_empty(self.customer_phone),
                state: non_empty(self.customer_state),
                area_code: non_empty(self.customer_area_code),
            },
            request_id,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
pub struct DidBody {
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub is_fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct Performance {
    pub query_time: String,
}

#[derive(Debug, Serialize)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<Performance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<&'static str>,
}

/// Response body for GET /api/v1/dids/next.
#[derive(Debug, Serialize)]
pub struct NextDidResponse {
    pub success: bool,
    pub did: DidBody,
    pub metadata: ResponseMetadata,
}

impl NextDidResponse {
    fn from_outcome(outcome: AllocationOutcome, request: &AllocationRequest) -> Self {
        let metadata = |timestamp: DateTime<Utc>| ResponseMetadata {
            campaign_id: request.campaign_id.clone(),
            agent_id: request.agent_id.clone(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            performance: None,
            strategy: None,
        };

        match outcome {
            AllocationOutcome::Allocated(allocation) => Self {
                success: true,
                did: DidBody {
                    number: allocation.did.phone_number,
                    location: allocation.did.location.filter(|l| !l.is_empty()),
                    is_fallback: false,
                },
                metadata: ResponseMetadata {
                    performance: Some(Performance {
                        query_time: format!("{}ms", allocation.query_time.as_millis()),
                    }),
                    strategy: Some(allocation.strategy.label()),
                    ..metadata(allocation.allocated_at)
                },
            },
            AllocationOutcome::Fallback { number } => Self {
                success: true,
                did: DidBody {
                    number,
                    location: None,
                    is_fallback: true,
                },
                metadata: metadata(Utc::now()),
            },
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A [`DidpoolError`] rendered as an HTTP response.
pub struct ApiError(pub DidpoolError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            DidpoolError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    success: false,
                    message,
                    error: None,
                }),
            )
                .into_response(),
            other => {
                tracing::error!(error = %other, "DID allocation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        success: false,
                        message: "Internal server error".to_string(),
                        error: Some(other.to_string()),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// GET /api/v1/dids/next
///
/// Picks the next caller ID for the authenticated tenant.
pub async fn get_next_did(
    State(state): State<GatewayState>,
    Extension(tenant): Extension<TenantContext>,
    headers: HeaderMap,
    Query(query): Query<NextDidQuery>,
) -> Result<Json<NextDidResponse>, ApiError> {
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let request = query.into_request(request_id);

    let outcome = state
        .allocator
        .allocate(&tenant, request.clone())
        .await
        .map_err(ApiError)?;

    Ok(Json(NextDidResponse::from_outcome(outcome, &request)))
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub storage: String,
}

/// GET /health
///
/// Unauthenticated. 503 when the store reports unhealthy.
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let (status, storage) = match state.health.storage.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => {
            (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {reason}"))
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {e}")),
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK { "ok" } else { "unavailable" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        storage,
    };
    (status, Json(body)).into_response()
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use didpool_core::types::{
        Did, DidId, DidStatus, DidUsage, Reputation, RotationState, TenantId,
    };
    use didpool_rotation::{Allocation, PoolStats, Strategy};

    fn allocation(location: Option<Location>) -> AllocationOutcome {
        let now = Utc::now();
        AllocationOutcome::Allocated(Allocation {
            did: Did {
                id: DidId::from("d1"),
                tenant_id: TenantId::from("t1"),
                phone_number: "+15125550100".into(),
                status: DidStatus::Active,
                capacity: None,
                reputation: Reputation::default(),
                usage: DidUsage::default(),
                location,
                created_at: now,
            },
            strategy: Strategy::UnusedInCycle,
            stats: PoolStats::default(),
            rotation_state: RotationState::fresh(now),
            allocated_at: now,
            query_time: Duration::from_millis(7),
        })
    }

    #[test]
    fn query_blank_values_are_dropped() {
        let query = NextDidQuery {
            campaign_id: Some("spring".into()),
            agent_id: Some(String::new()),
            customer_phone: Some("+15125550199".into()),
            ..Default::default()
        };
        let request = query.into_request(Some("req-1".into()));
        assert_eq!(request.campaign_id.as_deref(), Some("spring"));
        assert!(request.agent_id.is_none());
        assert_eq!(request.customer.phone.as_deref(), Some("+15125550199"));
        assert_eq!(request.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn allocated_response_shape() {
        let request = AllocationRequest {
            campaign_id: Some("spring".into()),
            ..Default::default()
        };
        let location = Location {
            state: Some("TX".into()),
            area_code: Some("512".into()),
            ..Default::default()
        };
        let body = NextDidResponse::from_outcome(allocation(Some(location)), &request);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["did"]["number"], "+15125550100");
        assert_eq!(json["did"]["is_fallback"], false);
        assert_eq!(json["did"]["location"]["state"], "TX");
        assert_eq!(json["did"]["location"]["areaCode"], "512");
        assert_eq!(json["metadata"]["campaign_id"], "spring");
        assert!(json["metadata"].get("agent_id").is_none());
        assert_eq!(json["metadata"]["performance"]["query_time"], "7ms");
        assert_eq!(json["metadata"]["strategy"], "Strategy 1: Unused in cycle");
        assert!(json["metadata"]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn empty_location_is_omitted() {
        let body =
            NextDidResponse::from_outcome(allocation(Some(Location::default())), &Default::default());
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["did"].get("location").is_none());
    }

    #[test]
    fn fallback_response_shape() {
        let body = NextDidResponse::from_outcome(
            AllocationOutcome::Fallback {
                number: "+18005551234".into(),
            },
            &AllocationRequest::default(),
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["did"]["number"], "+18005551234");
        assert_eq!(json["did"]["is_fallback"], true);
        assert!(json["metadata"].get("strategy").is_none());
        assert!(json["metadata"].get("performance").is_none());
    }

    #[test]
    fn storage_errors_map_to_500() {
        let response = ApiError(DidpoolError::Internal("db gone".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = ApiError(DidpoolError::Unauthorized("nope".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
