pub mod error;
pub mod files;
pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod progress;
pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
