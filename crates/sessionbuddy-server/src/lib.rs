//! Session Buddy HTTP server: UI page, health check, and chat relay routes.

pub mod error;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
