//! HTTP surface for a single JSON table panel: rendered page, JSON views,
//! the authenticated fetch channel, and OpenAPI documentation.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
