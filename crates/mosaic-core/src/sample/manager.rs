use super::{Sample, SampleId, SampleLoader};
use crate::Result;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Owner of every loaded sample.
///
/// Lookups are lock-free reads through `DashMap`; loading runs the configured
/// [`SampleLoader`] on the calling thread and is meant for the serialization
/// thread only. A path loaded twice returns the same id.
pub struct SampleManager {
    samples: DashMap<SampleId, Arc<Sample>>,
    by_path: DashMap<PathBuf, SampleId>,
    loader: Box<dyn SampleLoader>,
}

impl SampleManager {
    pub fn new(loader: impl SampleLoader + 'static) -> Self {
        Self {
            samples: DashMap::new(),
            by_path: DashMap::new(),
            loader: Box::new(loader),
        }
    }

    /// Load (or find) the sample at `path`. `None` if decoding failed.
    pub fn load_sample_by_path(&self, path: impl AsRef<Path>) -> Option<SampleId> {
        match self.try_load_sample_by_path(path.as_ref()) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(path = %path.as_ref().display(), error = %e, "sample load failed");
                None
            }
        }
    }

    /// Like [`load_sample_by_path`](Self::load_sample_by_path) but keeps the error.
    pub fn try_load_sample_by_path(&self, path: &Path) -> Result<SampleId> {
        if let Some(id) = self.by_path.get(path) {
            return Ok(*id);
        }

        let sample = self.loader.load(path)?;
        let id = sample.id();
        tracing::info!(
            %id,
            path = %path.display(),
            frames = sample.frames(),
            channels = sample.channel_count(),
            "sample loaded"
        );
        self.samples.insert(id, Arc::new(sample));
        self.by_path.insert(path.to_path_buf(), id);
        Ok(id)
    }

    /// Register an already decoded sample.
    pub fn insert(&self, sample: Sample) -> SampleId {
        let id = sample.id();
        if let Some(path) = sample.path() {
            self.by_path.insert(path.to_path_buf(), id);
        }
        self.samples.insert(id, Arc::new(sample));
        id
    }

    pub fn get(&self, id: SampleId) -> Option<Arc<Sample>> {
        self.samples.get(&id).map(|s| Arc::clone(&s))
    }

    pub fn id_for_path(&self, path: &Path) -> Option<SampleId> {
        self.by_path.get(path).map(|id| *id)
    }

    /// Forget a sample. Zones still holding it keep it alive.
    pub fn remove(&self, id: SampleId) -> Option<Arc<Sample>> {
        let (_, sample) = self.samples.remove(&id)?;
        if let Some(path) = sample.path() {
            self.by_path.remove(path);
        }
        Some(sample)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for SampleManager {
    #[cfg(feature = "wav")]
    fn default() -> Self {
        Self::new(super::WavLoader)
    }

    #[cfg(not(feature = "wav"))]
    fn default() -> Self {
        Self::new(|path: &Path| -> Result<Sample> {
            Err(crate::Error::UnsupportedFormat(format!(
                "no loader configured for {}",
                path.display()
            )))
        })
    }
}

impl std::fmt::Debug for SampleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleManager")
            .field("samples", &self.samples.len())
            .finish()
    }
}
