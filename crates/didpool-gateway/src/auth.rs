// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API-key middleware.
//!
//! Resolves `x-api-key` to a tenant through the [`TenantResolver`] and stores
//! the resulting [`TenantContext`] in the request extensions. Requests without
//! a valid key are rejected with 401.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use didpool_core::TenantResolver;

use crate::handlers::ErrorResponse;

pub const API_KEY_HEADER: &str = "x-api-key";

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            success: false,
            message: message.to_string(),
            error: None,
        }),
    )
        .into_response()
}

/// Middleware that authenticates the tenant behind `x-api-key`.
pub async fn auth_middleware(
    State(resolver): State<Arc<dyn TenantResolver>>,
    mut request: Request,
    next: Next,
) -> Response {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned);

    let Some(api_key) = api_key else {
        return unauthorized("API key required");
    };

    match resolver.resolve_api_key(&api_key).await {
        Ok(Some(tenant)) => {
            tracing::debug!(tenant_id = %tenant.tenant_id, "api key accepted");
            request.extensions_mut().insert(tenant);
            next.run(request).await
        }
        Ok(None) => {
            tracing::debug!("rejected unknown api key");
            unauthorized("Invalid API key")
        }
        Err(e) => {
            tracing::error!(error = %e, "api key lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    message: "Internal server error".to_string(),
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{Extension, Router, body::Body, middleware, routing::get};
    use didpool_core::types::{AdapterType, HealthStatus, TenantContext, TenantId};
    use didpool_core::{DidpoolError, PluginAdapter};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct OneKey;

    #[async_trait]
    impl PluginAdapter for OneKey {
        fn name(&self) -> &str {
            "one-key"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::TenantDirectory
        }
        async fn health_check(&self) -> Result<HealthStatus, DidpoolError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), DidpoolError> {
            Ok(())
        }
    }

    #[async_trait]
    impl TenantResolver for OneKey {
        async fn resolve_api_key(
            &self,
            api_key: &str,
        ) -> Result<Option<TenantContext>, DidpoolError> {
            match api_key {
                "good" => Ok(Some(TenantContext {
                    tenant_id: TenantId::from("acme"),
                    name: "Acme".into(),
                    default_capacity: None,
                })),
                "explode" => Err(DidpoolError::Internal("directory offline".into())),
                _ => Ok(None),
            }
        }
    }

    fn app() -> Router {
        let resolver: Arc<dyn TenantResolver> = Arc::new(OneKey);
        Router::new()
            .route(
                "/",
                get(|Extension(t): Extension<TenantContext>| async move { t.tenant_id.0 }),
            )
            .route_layer(middleware::from_fn_with_state(resolver, auth_middleware))
    }

    async fn call(key: Option<&str>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn valid_key_reaches_handler_with_tenant() {
        let (status, body) = call(Some("good")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "acme");
    }

    #[tokio::test]
    async fn missing_key_is_rejected() {
        let (status, body) = call(None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("API key required"));
        assert!(body.contains("\"success\":false"));
    }

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let (status, body) = call(Some("stolen")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn resolver_failure_is_a_server_error() {
        let (status, body) = call(Some("explode")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Internal server error"));
    }
}
