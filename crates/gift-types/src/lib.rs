//! Common types module for the gift order service.
//!
//! This module defines the core data types and structures used throughout
//! the order lifecycle system. It provides a centralized location for
//! shared types to ensure consistency across all components.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Live update stream event types.
pub mod live;
/// Order types including the durable order record and canonical status.
pub mod order;
/// Checkout request types submitted by clients.
pub mod request;
/// Raw status signal types arriving from the fulfillment upstream.
pub mod signal;

// Re-export all types for convenient access
pub use api::*;
pub use live::*;
pub use order::*;
pub use request::*;
pub use signal::*;
