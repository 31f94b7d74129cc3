pub mod auth;
pub mod request_id;

pub use auth::{require_api_key, Actor, ApiKeyAuth, ACTOR_HEADER};
pub use request_id::request_id_middleware;
