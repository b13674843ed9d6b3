//! smartmeal-core - Core library for SmartMeal
//!
//! This crate contains the retailer account-linking flow, session storage,
//! and backend client shared by all SmartMeal interfaces (mobile, CLI).

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
mod http;
pub mod lifecycle;
pub mod models;
pub mod services;
pub mod store;
pub mod util;

#[cfg(test)]
mod test_support;

pub use auth::{AuthError, AuthSession};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use lifecycle::{LifecycleEvent, LifecycleHub};
pub use models::{FlowId, Retailer, StoreLocation};
pub use services::{LinkStatus, RetailerLinkService};
pub use store::{KeyValueStore, MemoryStore, SessionStore};
