//! RbdCli talks to the cluster by running the `rbd` tool with `--format json`.

use std::path::PathBuf;
use std::process::Command;

use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ImageHandle, ImageSpec, ParentSpec, RbdBackend, Snapshot};
use crate::error::{AuditError, Result};

/// stderr marker for ENOENT from librbd
const NO_SUCH_IMAGE: &str = "No such file or directory";

/// Backend driving the `rbd` command line tool.
#[derive(Debug, Clone)]
pub struct RbdCli {
    binary: PathBuf,
    conf: PathBuf,
    user: String,
    pool: String,
}

#[derive(Debug, Deserialize)]
struct SnapEntry {
    name: String,
}

/// `rbd children` prints objects on recent releases and `pool/image` strings on old ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChildEntry {
    Spec { pool: String, image: String },
    Path(String),
}

#[derive(Debug, Deserialize)]
struct InfoEntry {
    #[serde(default)]
    parent: Option<ParentEntry>,
}

#[derive(Debug, Deserialize)]
struct ParentEntry {
    pool: String,
    image: String,
    snapshot: String,
}

impl RbdCli {
    /// Connect to `pool` with the given ceph.conf and client id.
    ///
    /// Verifies the pool is reachable by listing it once.
    pub fn connect(
        binary: impl Into<PathBuf>,
        conf: impl Into<PathBuf>,
        user: impl Into<String>,
        pool: impl Into<String>,
    ) -> Result<Self> {
        let backend = Self {
            binary: binary.into(),
            conf: conf.into(),
            user: user.into(),
            pool: pool.into(),
        };
        backend.list()?;
        Ok(backend)
    }

    /// Run `rbd <args> --format json` and decode stdout.
    fn run<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        debug!("rbd {}", args.join(" "));
        let output = Command::new(&self.binary)
            .arg("--conf")
            .arg(&self.conf)
            .args(["--id", self.user.as_str()])
            .args(args)
            .args(["--format", "json"])
            .output()
            .map_err(|e| AuditError::Command(format!("Failed to execute {}: {}", self.binary.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains(NO_SUCH_IMAGE) {
                return Err(AuditError::ImageNotFound(args.last().copied().unwrap_or_default().to_string()));
            }
            return Err(AuditError::Command(format!("rbd {}: {}", args.join(" "), stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            // Some releases print nothing instead of `[]`
            return Ok(serde_json::from_str("[]")?);
        }
        Ok(serde_json::from_str(&stdout)?)
    }

    fn info(&self, spec: &ImageSpec) -> Result<InfoEntry> {
        self.run(&["info", &spec.to_string()])
    }
}

impl RbdBackend for RbdCli {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn list(&self) -> Result<Vec<String>> {
        self.run(&["ls", "--pool", &self.pool])
    }

    fn open(&self, spec: &ImageSpec) -> Result<ImageHandle> {
        self.info(spec)?;
        Ok(ImageHandle::new(spec.clone()))
    }

    fn snapshots(&self, image: &ImageHandle) -> Result<Vec<Snapshot>> {
        let entries: Vec<SnapEntry> = self.run(&["snap", "ls", &image.spec().to_string()])?;
        Ok(entries.into_iter().map(|e| Snapshot { name: e.name }).collect())
    }

    fn children(&self, snapshot: &ImageHandle) -> Result<Vec<ImageSpec>> {
        let entries: Vec<ChildEntry> = self.run(&["children", &snapshot.spec().to_string()])?;
        Ok(entries.into_iter().filter_map(child_spec).collect())
    }

    fn parent(&self, image: &ImageHandle) -> Result<Option<ParentSpec>> {
        let info = self.info(image.spec())?;
        Ok(info.parent.map(|p| ParentSpec {
            pool: p.pool,
            image: p.image,
            snapshot: p.snapshot,
        }))
    }
}

fn child_spec(entry: ChildEntry) -> Option<ImageSpec> {
    match entry {
        ChildEntry::Spec { pool, image } => Some(ImageSpec::new(pool, image)),
        ChildEntry::Path(path) => {
            let (pool, image) = path.split_once('/')?;
            Some(ImageSpec::new(pool, image))
        }
    }
}
