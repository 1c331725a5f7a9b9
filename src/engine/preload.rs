//! Asset preloading: frame URL derivation and all-or-nothing frame loads.
//!
//! Every frame of a program is requested at once, one worker per frame. The
//! preload only reports when every request has settled, and it reports a
//! single aggregate outcome; callers never observe a partial frame set.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};
use thiserror::Error;

use super::guard::Generation;

// ---------------------------------------------------------------------------
// URL scheme
// ---------------------------------------------------------------------------

/// `/{base}/{stage}/{mood}/{NN}.{extension}`, stage and mood lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetScheme {
    pub base: String,
    pub extension: String,
}

impl Default for AssetScheme {
    fn default() -> Self {
        Self {
            base: "dragons".into(),
            extension: "png".into(),
        }
    }
}

impl AssetScheme {
    pub fn new(base: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            extension: extension.into(),
        }
    }

    pub fn frame_url(&self, stage: &str, mood: &str, frame: u32) -> String {
        format!(
            "/{}/{}/{}/{frame:02}.{}",
            self.base.trim_matches('/'),
            stage.to_lowercase(),
            mood.to_lowercase(),
            self.extension.trim_start_matches('.'),
        )
    }

    /// URLs for frames `1..=total_frames`, in frame order.
    pub fn frame_urls(&self, stage: &str, mood: &str, total_frames: u32) -> Vec<String> {
        (1..=total_frames)
            .map(|frame| self.frame_url(stage, mood, frame))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{url}: not found")]
    NotFound { url: String },
    #[error("{url}: {source}")]
    Io {
        url: String,
        #[source]
        source: io::Error,
    },
    #[error("{url}: empty asset")]
    Empty { url: String },
    #[error("{url}: loader stopped without reporting")]
    Abandoned { url: String },
}

/// Platform image loader seam. Implementations are called from worker threads.
pub trait AssetLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<Vec<u8>, LoadError>;
}

/// Serves asset URLs from a directory: `/dragons/baby/idle/01.png` is read
/// from `{root}/dragons/baby/idle/01.png`.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a URL onto the root. URLs that would escape it map to nothing.
    pub fn path_for(&self, url: &str) -> Option<PathBuf> {
        let relative = Path::new(url.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl AssetLoader for FsLoader {
    fn load(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let path = self.path_for(url).ok_or_else(|| LoadError::NotFound {
            url: url.to_string(),
        })?;
        let bytes = std::fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                url: url.to_string(),
            },
            _ => LoadError::Io {
                url: url.to_string(),
                source,
            },
        })?;
        if bytes.is_empty() {
            return Err(LoadError::Empty {
                url: url.to_string(),
            });
        }
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------------
// Preload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFrame {
    pub url: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// Every frame loaded; frames are in frame-number order.
    Success { frames: Vec<LoadedFrame> },
    /// At least one frame failed. The list is informational only.
    Failure { failed: Vec<String> },
}

impl PreloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PreloadOutcome::Success { .. })
    }
}

type Settled = (usize, Result<Vec<u8>, LoadError>);

/// One in-flight, all-or-nothing load of a program's frames.
pub struct Preload {
    generation: Generation,
    urls: Vec<String>,
    results: Vec<Option<Result<Vec<u8>, LoadError>>>,
    remaining: usize,
    rx: Receiver<Settled>,
    finished: bool,
}

impl Preload {
    /// Issue one concurrent load per URL.
    pub fn start(generation: Generation, loader: Arc<dyn AssetLoader>, urls: Vec<String>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();

        for (index, url) in urls.iter().enumerate() {
            let tx = tx.clone();
            let loader = Arc::clone(&loader);
            let url = url.clone();
            let spawned = thread::Builder::new()
                .name(format!("preload-{generation}-{:02}", index + 1))
                .spawn(move || {
                    let result = loader.load(&url);
                    // The receiver is gone once nobody wants this generation.
                    let _ = tx.send((index, result));
                });
            if let Err(e) = spawned {
                log::error!("could not start a loader for frame {}: {e}", index + 1);
            }
        }

        Self {
            generation,
            results: urls.iter().map(|_| None).collect(),
            remaining: urls.len(),
            urls,
            rx,
            finished: false,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Number of frames that have not settled yet.
    pub fn pending(&self) -> usize {
        self.remaining
    }

    /// Collect whatever has settled without blocking. Returns the outcome
    /// exactly once, when the last frame settles.
    pub fn poll(&mut self) -> Option<PreloadOutcome> {
        if self.finished {
            return None;
        }
        while self.remaining > 0 {
            match self.rx.try_recv() {
                Ok((index, result)) => self.settle(index, result),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.abandon_unsettled(),
            }
        }
        if self.remaining == 0 {
            Some(self.finish())
        } else {
            None
        }
    }

    /// Block until every frame has settled.
    pub fn wait(mut self) -> PreloadOutcome {
        while self.remaining > 0 {
            match self.rx.recv() {
                Ok((index, result)) => self.settle(index, result),
                Err(_) => self.abandon_unsettled(),
            }
        }
        self.finish()
    }

    fn settle(&mut self, index: usize, result: Result<Vec<u8>, LoadError>) {
        let Some(slot) = self.results.get_mut(index) else {
            return;
        };
        if slot.is_some() {
            return;
        }
        if let Err(e) = &result {
            log::error!("{}: failed to load {e}", self.generation);
        }
        *slot = Some(result);
        self.remaining -= 1;
    }

    // A worker that panicked or never started drops its sender silently.
    fn abandon_unsettled(&mut self) {
        for index in 0..self.results.len() {
            if self.results[index].is_none() {
                let url = self.urls[index].clone();
                self.settle(index, Err(LoadError::Abandoned { url }));
            }
        }
    }

    fn finish(&mut self) -> PreloadOutcome {
        self.finished = true;
        let results = std::mem::take(&mut self.results);

        let failed: Vec<String> = results
            .iter()
            .zip(&self.urls)
            .filter(|(r, _)| !matches!(r, Some(Ok(_))))
            .map(|(_, url)| url.clone())
            .collect();
        if !failed.is_empty() {
            log::warn!(
                "{}: {} of {} frame(s) failed to load",
                self.generation,
                failed.len(),
                self.urls.len()
            );
            return PreloadOutcome::Failure { failed };
        }

        let frames = results
            .into_iter()
            .zip(&self.urls)
            .filter_map(|(r, url)| match r {
                Some(Ok(bytes)) => Some(LoadedFrame {
                    url: url.clone(),
                    bytes,
                }),
                _ => None,
            })
            .collect();
        log::info!("{}: loaded {} frame(s)", self.generation, self.urls.len());
        PreloadOutcome::Success { frames }
    }
}
