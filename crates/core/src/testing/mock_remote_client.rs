//! Mock remote asset client for testing.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::remote::{
    ApiContext, RemoteAsset, RemoteAssetClient, RemoteAssetState, RemoteServiceError,
};

/// A recorded submit call for test assertions.
#[derive(Debug, Clone)]
pub struct SubmittedFile {
    /// Local path at submit time (already deleted afterwards).
    pub path: PathBuf,
    pub display_name: String,
    pub mime_type: Option<String>,
    /// File size observed while the file still existed.
    pub bytes: u64,
    pub api_key: String,
    pub timestamp: DateTime<Utc>,
}

/// Mock implementation of the RemoteAssetClient trait.
///
/// Provides controllable behavior for testing:
/// - Script the state returned by successive `submit`/`get` calls
/// - Record submitted files for assertions
/// - Simulate failures
///
/// Each `submit` or `get` pops the next scripted state; once the script is
/// exhausted assets report ACTIVE.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockRemoteClient::new();
///
/// // submit -> PROCESSING, then three polls until ACTIVE
/// client.script_states(vec![Processing, Processing, Processing, Active]);
///
/// let asset = client.submit(&ctx, path, "clip.mp4", None).await?;
/// assert_eq!(asset.state, RemoteAssetState::Processing);
///
/// // Fail the next call
/// client.set_next_error(RemoteServiceError::Timeout);
/// ```
#[derive(Debug)]
pub struct MockRemoteClient {
    assets: Arc<Mutex<HashMap<String, RemoteAsset>>>,
    script: Arc<Mutex<VecDeque<RemoteAssetState>>>,
    submitted: Arc<Mutex<Vec<SubmittedFile>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<Mutex<Option<RemoteServiceError>>>,
    get_calls: AtomicUsize,
    id_counter: AtomicUsize,
}

impl Default for MockRemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteClient {
    pub fn new() -> Self {
        Self {
            assets: Arc::new(Mutex::new(HashMap::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            submitted: Arc::new(Mutex::new(Vec::new())),
            next_error: Arc::new(Mutex::new(None)),
            get_calls: AtomicUsize::new(0),
            id_counter: AtomicUsize::new(0),
        }
    }

    /// Replace the scripted state sequence.
    pub fn script_states(&self, states: Vec<RemoteAssetState>) {
        *self.script.lock().unwrap() = states.into();
    }

    /// Make the next operation fail.
    pub fn set_next_error(&self, error: RemoteServiceError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// Seed an existing asset.
    pub fn insert_asset(&self, asset: RemoteAsset) {
        self.assets.lock().unwrap().insert(asset.name.clone(), asset);
    }

    pub fn asset(&self, name: &str) -> Option<RemoteAsset> {
        self.assets.lock().unwrap().get(name).cloned()
    }

    pub fn submitted(&self) -> Vec<SubmittedFile> {
        self.submitted.lock().unwrap().clone()
    }

    /// Number of `get` calls made so far.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn check_error(&self) -> Result<(), RemoteServiceError> {
        match self.next_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn next_state(&self) -> RemoteAssetState {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RemoteAssetState::Active)
    }
}

#[async_trait]
impl RemoteAssetClient for MockRemoteClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(
        &self,
        ctx: &ApiContext,
        path: &Path,
        display_name: &str,
        mime_type: Option<&str>,
    ) -> Result<RemoteAsset, RemoteServiceError> {
        self.check_error()?;
        let bytes = tokio::fs::metadata(path).await?.len();

        let id = self.id_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut asset = RemoteAsset::new(format!("files/mock-{}", id), self.next_state())
            .with_display_name(display_name);
        asset.mime_type = mime_type.map(str::to_string);
        asset.size_bytes = Some(bytes);
        asset.create_time = Some(Utc::now());

        self.submitted.lock().unwrap().push(SubmittedFile {
            path: path.to_path_buf(),
            display_name: display_name.to_string(),
            mime_type: mime_type.map(str::to_string),
            bytes,
            api_key: ctx.api_key().to_string(),
            timestamp: Utc::now(),
        });
        self.insert_asset(asset.clone());
        Ok(asset)
    }

    async fn get(&self, _ctx: &ApiContext, name: &str) -> Result<RemoteAsset, RemoteServiceError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_error()?;

        let state = self.next_state();
        let mut assets = self.assets.lock().unwrap();
        let asset = assets
            .entry(name.to_string())
            .or_insert_with(|| RemoteAsset::new(name, state));
        asset.state = state;
        Ok(asset.clone())
    }

    async fn delete(&self, _ctx: &ApiContext, name: &str) -> Result<(), RemoteServiceError> {
        self.check_error()?;
        self.assets
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RemoteServiceError::NotFound(name.to_string()))
    }

    async fn rename(
        &self,
        _ctx: &ApiContext,
        name: &str,
        display_name: &str,
    ) -> Result<RemoteAsset, RemoteServiceError> {
        self.check_error()?;
        let mut assets = self.assets.lock().unwrap();
        let asset = assets
            .get_mut(name)
            .ok_or_else(|| RemoteServiceError::NotFound(name.to_string()))?;
        asset.display_name = Some(display_name.to_string());
        Ok(asset.clone())
    }

    async fn list(&self, _ctx: &ApiContext) -> Result<Vec<RemoteAsset>, RemoteServiceError> {
        self.check_error()?;
        let mut assets: Vec<RemoteAsset> = self.assets.lock().unwrap().values().cloned().collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assets)
    }
}
