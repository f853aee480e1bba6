pub mod api;
pub mod cors;
pub mod request;
pub mod response;

pub use api::{ApiState, ApiSvc};
pub use cors::CorsPolicy;
