//! Data models for SmartMeal

mod flow_id;
mod retailer;

pub use flow_id::FlowId;
pub use retailer::{Retailer, StoreLocation};
