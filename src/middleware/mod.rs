pub mod rate_limit;
pub mod request_id;

pub use rate_limit::RateLimiter;
pub use request_id::{request_id_layer, span_for_request};
