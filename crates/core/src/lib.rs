pub mod config;
pub mod ingest;
pub mod metrics;
pub mod progress;
pub mod remote;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use ingest::{IngestError, IngestSource, IngestionCoordinator, TokioDelay, UploadReceipt};
pub use progress::{
    IngestionSession, IngestionStage, ProgressSink, ProgressTracker, ProgressUpdate,
    SpeedEstimator,
};
pub use remote::{
    ApiContext, AssetManager, GeminiFilesClient, RemoteAsset, RemoteAssetClient,
    RemoteAssetState, RemoteServiceError,
};
