// persist.rs - Reference preference saved between runs

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{OverlapError, Result};

/// Plain-text file holding one decimal α.
#[derive(Debug, Clone)]
pub struct AlphaStore {
    path: PathBuf,
}

impl AlphaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored α, or `None` when the run has to search. A missing file is
    /// silent; an unreadable or malformed one is logged and ignored.
    pub fn load(&self) -> Option<f64> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored reference preference");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read stored reference preference");
                return None;
            }
        };
        let line = text.lines().next().unwrap_or("").trim();
        match line.parse::<f64>() {
            Ok(alpha) if alpha.is_finite() && alpha > 0.0 => Some(alpha),
            _ => {
                warn!(path = %self.path.display(), content = line, "ignoring malformed reference preference");
                None
            }
        }
    }

    /// Write `alpha` to a sibling temporary file and rename it into place.
    pub fn save(&self, alpha: f64) -> Result<()> {
        let tmp = self.tmp_path();
        let write = || -> io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            writeln!(f, "{alpha}")?;
            f.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|source| {
            let _ = fs::remove_file(&tmp);
            OverlapError::Persist { path: self.path.clone(), source }
        })?;
        debug!(path = %self.path.display(), alpha, "stored reference preference");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "alpha".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
