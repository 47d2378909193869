//! Request baskets: capture HTTP requests sent to named baskets, inspect
//! them, reply with canned responses and optionally forward them upstream.
//!
//! The core is storage agnostic: [`basket::Basket`] and
//! [`registry::BasketRegistry`] describe what a backend must provide, and the
//! in-memory implementations are the default.

pub mod basket;
pub mod config;
pub mod error;
pub mod forward;
pub mod handlers;
pub mod matcher;
pub mod model;
pub mod page;
pub mod registry;
pub mod telemetry;
