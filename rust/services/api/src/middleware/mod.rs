//! Middleware modules.

pub mod request_id;

pub use request_id::request_id_middleware;
#[allow(unused_imports)]
pub use request_id::RequestId;
