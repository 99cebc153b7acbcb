// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for didpool.
//!
//! Exposes the allocation handler as `GET /api/v1/dids/next` behind API-key
//! authentication, plus unauthenticated `/health` and `/metrics`.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
