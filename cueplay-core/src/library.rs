use crate::config::LibraryConfig;
use crate::cue::CueSheet;
use crate::error::{CoreError, Result};
use crate::time::format_clock;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const CUE_EXTENSION: &str = "cue";

/// One listed directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    Dir { name: String },
    File { name: String },
    Cue { name: String },
}

impl Entry {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Dir { name } | Self::File { name } | Self::Cue { name } => name,
        }
    }

    const fn is_dir(&self) -> bool {
        matches!(self, Self::Dir { .. })
    }
}

/// Contents of one library directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// Path relative to the library root, empty at the root
    pub current: String,
    /// Relative parent path; `None` at the root
    pub parent: Option<String>,
    pub entries: Vec<Entry>,
}

/// A cue track as shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CueTrackEntry {
    pub number: u32,
    pub title: Option<String>,
    pub file: Option<String>,
    pub start_ms: u64,
    pub end_ms: Option<u64>,
    /// `mm:ss` start offset
    pub start: String,
}

/// The music folder served to clients.
///
/// Client paths are always interpreted relative to the root and can never
/// name anything outside it.
#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
    audio_extensions: Vec<String>,
}

impl Library {
    /// Open the library at `config.music_dir`
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FileNotFound`] if the folder does not exist.
    pub fn new(config: &LibraryConfig) -> Result<Self> {
        let root = fs::canonicalize(&config.music_dir).map_err(|_| CoreError::FileNotFound {
            path: config.music_dir.clone(),
        })?;

        debug!("Music library at {}", root.display());
        Ok(Self {
            root,
            audio_extensions: config
                .audio_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List a directory. A path escaping the root lists the root instead.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FileNotFound`] if the directory does not exist,
    /// or [`CoreError::IoError`] if it cannot be read.
    pub fn browse(&self, rel: &str) -> Result<Listing> {
        let relative = confine(rel).unwrap_or_else(|| {
            warn!("Browse path {:?} escapes the library, listing root", rel);
            PathBuf::new()
        });
        let dir = self.root.join(&relative);
        if !dir.is_dir() {
            return Err(CoreError::FileNotFound { path: dir });
        }

        let mut entries = Vec::new();
        for item in fs::read_dir(&dir)? {
            let item = item?;
            let name = item.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let path = item.path();
            if path.is_dir() {
                entries.push(Entry::Dir { name });
            } else if has_extension(&path, CUE_EXTENSION) {
                entries.push(Entry::Cue { name });
            } else if self.is_audio(&path) {
                entries.push(Entry::File { name });
            }
        }
        entries.sort_by(compare_entries);

        let current = to_client_path(&relative);
        let parent = relative.parent().map(to_client_path);

        Ok(Listing {
            current,
            parent,
            entries,
        })
    }

    /// Map a client path to an existing file or folder under the root.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PathOutsideLibrary`] if `rel` escapes the root,
    /// including through a symlink, or [`CoreError::FileNotFound`] if nothing
    /// exists there.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let relative = confine(rel).ok_or_else(|| CoreError::PathOutsideLibrary {
            path: PathBuf::from(rel),
        })?;

        let joined = self.root.join(relative);
        let resolved =
            fs::canonicalize(&joined).map_err(|_| CoreError::FileNotFound { path: joined })?;

        if !resolved.starts_with(&self.root) {
            warn!("{} resolves outside the library", resolved.display());
            return Err(CoreError::PathOutsideLibrary {
                path: PathBuf::from(rel),
            });
        }
        Ok(resolved)
    }

    /// Parse a cue sheet in the library for display
    ///
    /// # Errors
    ///
    /// Returns the [`resolve`](Self::resolve) errors, or
    /// [`CoreError::MalformedSheet`] if the sheet cannot be parsed.
    pub fn cue_tracks(&self, rel: &str) -> Result<Vec<CueTrackEntry>> {
        let path = self.resolve(rel)?;
        let sheet = CueSheet::from_path(&path)?;

        Ok(sheet
            .tracks()
            .iter()
            .map(|t| CueTrackEntry {
                number: t.number,
                title: t.title.clone(),
                file: t.source_file.clone(),
                start_ms: t.start_ms,
                end_ms: t.end_ms,
                start: format_clock(t.start_ms),
            })
            .collect())
    }

    fn is_audio(&self, path: &Path) -> bool {
        self.audio_extensions
            .iter()
            .any(|ext| has_extension(path, ext))
    }
}

/// Whether a client file name refers to a cue sheet
#[must_use]
pub fn is_cue_path(path: &Path) -> bool {
    has_extension(path, CUE_EXTENSION)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Normalize a client path lexically; `None` if it leaves the root
fn confine(rel: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(rel.trim_start_matches(['/', '\\'])).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

fn to_client_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    b.is_dir()
        .cmp(&a.is_dir())
        .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
}
