pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod sources;
pub mod state;
pub mod validation;

// Re-export key types
pub use routes::build_router;
pub use state::{spawn_archive_purge, AppState};
