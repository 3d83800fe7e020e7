//! Chart queries.
//!
//! Bar charts are a grouped count over the current issue rows and are always
//! computed. Line charts reconstruct the status of every live issue across the
//! last ten days and are served through the cache.

mod request;
mod service;

pub use request::{ChartRequest, Filter};
pub use service::ChartService;
