pub mod client_ip;
pub mod rate_limit;
pub mod request_id;
pub mod user_id;

pub use client_ip::ClientIp;
pub use rate_limit::{Charge, RateLimiter, RateLimits};
pub use request_id::{make_span_with_request_id, request_id_middleware, RequestId};
pub use user_id::{UserId, USER_ID_HEADER};
