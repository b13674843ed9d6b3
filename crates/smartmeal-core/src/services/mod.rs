mod link;

pub use link::{LinkStatus, RetailerLinkService};
