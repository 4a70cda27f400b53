//! Remote processing service abstraction.
//!
//! The service accepts a media file, processes it asynchronously, and exposes
//! a small resource API (get, list, rename, delete) over the resulting assets.

mod assets;
mod cache;
mod gemini;
mod types;

pub use assets::AssetManager;
pub use cache::AssetCache;
pub use gemini::GeminiFilesClient;
pub use types::*;
