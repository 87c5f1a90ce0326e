//! Per-directory project file holding the saved delays.
//!
//! ```json
//! {
//!   "default_delay_ms": 83,
//!   "frames": [ { "name": "a.png", "delay_ms": -1 } ]
//! }
//! ```
//!
//! Older files written with `default-delay` / `delay` keys are still read.

use std::path::{Path, PathBuf};

use framereel_common::error::ReelError;
use serde::{Deserialize, Deserializer, Serialize};

use crate::delay::DelayPolicy;
use crate::store::FrameStore;

/// Saved state for one animation directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSidecar {
    #[serde(
        default,
        alias = "default-delay",
        deserialize_with = "lenient_optional_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_delay_ms: Option<i64>,

    #[serde(default)]
    pub frames: Vec<SidecarFrame>,
}

/// Saved delay for one frame, matched by file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarFrame {
    pub name: String,

    /// Override in milliseconds; `-1` (or any value `<= 0`) means "use default".
    #[serde(alias = "delay", deserialize_with = "lenient_ms")]
    pub delay_ms: i64,
}

/// Errors reading or writing a sidecar.
#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<SidecarError> for ReelError {
    fn from(err: SidecarError) -> Self {
        ReelError::project(err.to_string())
    }
}

/// Location of the sidecar inside `directory`.
pub fn sidecar_path(directory: &Path, file_name: &str) -> PathBuf {
    directory.join(file_name)
}

impl ProjectSidecar {
    /// Capture the store's overrides and the policy's default.
    pub fn from_store(store: &FrameStore, policy: &DelayPolicy) -> Self {
        let frames = store
            .iter()
            .filter_map(|frame| {
                frame.file_name().map(|name| SidecarFrame {
                    name: name.to_string(),
                    delay_ms: frame.delay_override().map(i64::from).unwrap_or(-1),
                })
            })
            .collect();
        Self {
            default_delay_ms: Some(policy.default_delay_ms() as i64),
            frames,
        }
    }

    /// Read a sidecar. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, SidecarError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SidecarError::IoError {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let sidecar = serde_json::from_str(&content).map_err(|e| SidecarError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Some(sidecar))
    }

    /// Write the sidecar as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), SidecarError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| SidecarError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| SidecarError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), frames = self.frames.len(), "Saved sidecar");
        Ok(())
    }

    /// Apply saved delays to `store` and `policy`.
    ///
    /// Entries naming files that are not in the store are ignored. Returns
    /// the number of frames that matched an entry.
    pub fn apply(&self, store: &mut FrameStore, policy: &mut DelayPolicy) -> usize {
        if let Some(ms) = self.default_delay_ms {
            if let Err(e) = policy.set_default_delay(ms) {
                tracing::warn!(value = ms, error = %e, "Ignoring saved default delay");
            }
        }

        let directory = store.directory().to_path_buf();
        let mut matched = 0;
        for entry in &self.frames {
            // A name with separators could escape the directory.
            if Path::new(&entry.name).file_name().and_then(|n| n.to_str())
                != Some(entry.name.as_str())
            {
                continue;
            }
            if store.set_delay(&directory.join(&entry.name), entry.delay_ms) {
                matched += 1;
            }
        }
        if matched < self.frames.len() {
            tracing::debug!(
                unmatched = self.frames.len() - matched,
                "Sidecar entries without a matching frame"
            );
        }
        matched
    }
}

fn lenient_ms<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.round() as i64)
}

fn lenient_optional_ms<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|v| v.round() as i64))
}
