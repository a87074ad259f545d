use crate::models::{ModelEntry, WorkerEvent};
use crate::services::engine::OnnxEngine;
use crate::services::removal::BackgroundRemover;
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::UnboundedSender;

/// Shared slot holding the loaded model handle.
///
/// Owned by the controller, filled by the install task, read by the
/// worker at job start. Cleared (invalidated) when the user switches
/// models; the next install task replaces the engine.
#[derive(Clone, Default)]
pub struct SessionSlot {
    inner: Arc<RwLock<Option<Arc<dyn BackgroundRemover>>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a freshly loaded engine
    pub fn install(&self, remover: Arc<dyn BackgroundRemover>) {
        *self.inner.write().unwrap() = Some(remover);
    }

    /// Invalidate the current handle (model switch)
    pub fn clear(&self) {
        *self.inner.write().unwrap() = None;
    }

    /// Grab the current handle, if any. The worker clones the `Arc` at
    /// job start, so a later model switch cannot affect a running job.
    pub fn get(&self) -> Option<Arc<dyn BackgroundRemover>> {
        self.inner.read().unwrap().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.read().unwrap().is_some()
    }
}

/// Where a catalog entry lives inside the models directory.
pub fn model_path(models_dir: &Utf8Path, entry: &ModelEntry) -> Utf8PathBuf {
    models_dir.join(&entry.file)
}

/// Check whether the model file is already on disk.
pub fn is_cached(models_dir: &Utf8Path, entry: &ModelEntry) -> bool {
    model_path(models_dir, entry).is_file()
}

/// Download the model weights to the models directory.
///
/// Streams into a `.part` file and renames on completion, so an aborted
/// download never masquerades as a cached model.
pub fn fetch_model(entry: &ModelEntry, models_dir: &Utf8Path) -> Result<Utf8PathBuf> {
    fs::create_dir_all(models_dir)
        .with_context(|| format!("Failed to create models directory: {}", models_dir))?;

    let dest = model_path(models_dir, entry);
    let partial = models_dir.join(format!("{}.part", entry.file));

    tracing::info!("Downloading {} ({} MB) from {}", entry.file, entry.size_mb, entry.url);

    let response = ureq::get(&entry.url)
        .call()
        .with_context(|| format!("Failed to download model from {}", entry.url))?;

    if response.status() != 200 {
        bail!("HTTP {} when downloading {}", response.status(), entry.url);
    }

    let mut reader = response.into_reader();
    let mut file = fs::File::create(&partial)
        .with_context(|| format!("Failed to create {}", partial))?;
    let bytes = std::io::copy(&mut reader, &mut file)
        .with_context(|| format!("Failed while downloading {}", entry.url))?;
    drop(file);

    fs::rename(&partial, &dest)
        .with_context(|| format!("Failed to move {} into place", partial))?;

    tracing::info!("Downloaded {} ({} bytes)", dest, bytes);
    Ok(dest)
}

/// The install task: make the model usable, end to end.
///
/// Ensures the weights are on disk (downloading if needed), loads the
/// session, publishes it into the slot, and reports through the same
/// event queue the worker uses. Runs on the blocking pool; mutually
/// exclusive with a processing job via control disabling.
pub fn run_install(
    name: String,
    entry: ModelEntry,
    models_dir: Utf8PathBuf,
    slot: SessionSlot,
    events: UnboundedSender<WorkerEvent>,
) {
    match ensure_and_load(&name, &entry, &models_dir, &events) {
        Ok(engine) => {
            slot.install(engine);
            let _ = events.send(WorkerEvent::InstallSuccess);
        }
        Err(e) => {
            tracing::error!("Model setup failed for '{}': {:#}", name, e);
            let _ = events.send(WorkerEvent::InstallError(format!("{e:#}")));
        }
    }
}

fn ensure_and_load(
    name: &str,
    entry: &ModelEntry,
    models_dir: &Utf8Path,
    events: &UnboundedSender<WorkerEvent>,
) -> Result<Arc<dyn BackgroundRemover>> {
    let path = if is_cached(models_dir, entry) {
        model_path(models_dir, entry)
    } else {
        let _ = events.send(WorkerEvent::Status(format!(
            "Downloading model '{name}' (~{} MB)... This may take a few minutes.",
            entry.size_mb
        )));
        fetch_model(entry, models_dir)?
    };

    let _ = events.send(WorkerEvent::Status(format!("Loading model '{name}'...")));
    let engine = OnnxEngine::new_session(&path)?;
    Ok(Arc::new(engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::removal::RemovalError;
    use tempfile::TempDir;

    struct NoopRemover;

    impl BackgroundRemover for NoopRemover {
        fn remove(&self, _input: &[u8]) -> Result<Vec<u8>, RemovalError> {
            Ok(Vec::new())
        }
    }

    fn entry() -> ModelEntry {
        ModelEntry {
            file: "u2net.onnx".to_string(),
            url: "https://example.invalid/u2net.onnx".to_string(),
            size_mb: 176,
        }
    }

    #[test]
    fn test_session_slot_lifecycle() {
        let slot = SessionSlot::new();
        assert!(!slot.is_ready());
        assert!(slot.get().is_none());

        slot.install(Arc::new(NoopRemover));
        assert!(slot.is_ready());
        assert!(slot.get().is_some());

        slot.clear();
        assert!(!slot.is_ready());
    }

    #[test]
    fn test_slot_clone_shares_handle() {
        let slot1 = SessionSlot::new();
        let slot2 = slot1.clone();

        slot1.install(Arc::new(NoopRemover));
        assert!(slot2.is_ready());
    }

    #[test]
    fn test_model_path_and_cache_check() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let entry = entry();

        assert_eq!(model_path(&dir, &entry), dir.join("u2net.onnx"));
        assert!(!is_cached(&dir, &entry));

        fs::write(dir.join("u2net.onnx"), b"weights").unwrap();
        assert!(is_cached(&dir, &entry));
    }

    #[test]
    fn test_partial_download_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let entry = entry();

        fs::write(dir.join("u2net.onnx.part"), b"half").unwrap();
        assert!(!is_cached(&dir, &entry));
    }
}
