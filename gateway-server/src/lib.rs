//! HTTP and WebSocket surface for the conversational analytics gateway
//! (§4.8): wires `gateway-auth`, `gateway-audit`, `gateway-router`,
//! `gateway-fabric`, and `gateway-workflow` behind one `AppState`, exposing
//! them through an axum router.

pub mod analytics;
pub mod error;
pub mod fabric_sender;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod users;

pub use error::GatewayError;
pub use routes::build_router;
pub use state::AppState;
