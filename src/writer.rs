//! Content-gated atomic writer for the generated proxy files.
//!
//! The rendered text is written in full to `<target>.tmp`, flushed, and
//! only then compared with the current target by SHA-256.  Identical
//! content leaves the target untouched (no rename, no mtime change);
//! different or missing targets are replaced with a single `rename`, so
//! a concurrent reader sees either the old file or the new one.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::{BackendGroups, DomainMap};

const HASH_BLOCK_SIZE: usize = 65536;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("renaming {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: &Path, source: io::Error) -> WriteError {
    WriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What [`update`] did to the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

/// A generated configuration artifact.
pub trait ConfigFile {
    /// Short name used in log lines.
    const KIND: &'static str;

    /// Canonical text; must depend only on the data.
    fn render(&self) -> String;
}

impl ConfigFile for BackendGroups {
    const KIND: &'static str = "backends";

    fn render(&self) -> String {
        let mut out = String::new();
        for (stack, servers) in &self.0 {
            let _ = write!(out, "\nbackend {}\n  mode http\n", stack);
            for (id, backend) in servers {
                let _ = writeln!(out, "  server {} {}:{}", id, backend.address, backend.port);
            }
        }
        out
    }
}

impl ConfigFile for DomainMap {
    const KIND: &'static str = "domainmaps";

    fn render(&self) -> String {
        let mut out = String::new();
        for (fqdn, stack) in &self.0 {
            let _ = writeln!(out, "{} {}", fqdn, stack);
        }
        out
    }
}

pub fn tmp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Render `data` and replace `target` with it if the content changed.
///
/// On a failed rename the temp file is left behind for inspection.
pub fn update<C: ConfigFile>(data: &C, target: &Path) -> Result<WriteOutcome, WriteError> {
    let tmp = tmp_path(target);
    write_fully(&tmp, data.render().as_bytes())?;

    let outcome = if target.is_file() {
        if hash_file(target)? == hash_file(&tmp)? {
            debug!("config: {} unchanged", C::KIND);
            fs::remove_file(&tmp).map_err(|e| io_err(&tmp, e))?;
            return Ok(WriteOutcome::Unchanged);
        }
        info!("config: {} has changed, updating", C::KIND);
        WriteOutcome::Updated
    } else {
        info!("config: {} does not exist yet, creating {}", C::KIND, target.display());
        WriteOutcome::Created
    };

    fs::rename(&tmp, target).map_err(|source| WriteError::Rename {
        from: tmp.clone(),
        to: target.to_path_buf(),
        source,
    })?;
    Ok(outcome)
}

fn write_fully(path: &Path, contents: &[u8]) -> Result<(), WriteError> {
    let mut file = File::create(path).map_err(|e| io_err(path, e))?;
    file.write_all(contents).map_err(|e| io_err(path, e))?;
    file.sync_all().map_err(|e| io_err(path, e))
}

fn hash_file(path: &Path) -> Result<String, WriteError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| io_err(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
