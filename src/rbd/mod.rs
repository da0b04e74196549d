//! Storage backend interface: the handful of RBD primitives the walker needs.

pub mod cli;
pub mod memory;

use std::fmt;

use crate::error::Result;

pub use cli::RbdCli;
pub use memory::MemoryCluster;

/// `pool/image[@snapshot]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageSpec {
    pub pool: String,
    pub image: String,
    pub snapshot: Option<String>,
}

impl ImageSpec {
    pub fn new(pool: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            image: image.into(),
            snapshot: None,
        }
    }

    pub fn at_snapshot(&self, snapshot: impl Into<String>) -> Self {
        Self {
            pool: self.pool.clone(),
            image: self.image.clone(),
            snapshot: Some(snapshot.into()),
        }
    }
}

impl fmt::Display for ImageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pool, self.image)?;
        if let Some(snap) = &self.snapshot {
            write!(f, "@{}", snap)?;
        }
        Ok(())
    }
}

/// An image (or snapshot) opened read-only.
///
/// Handles carry no open resources of their own, so dropping one is releasing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    spec: ImageSpec,
}

impl ImageHandle {
    pub(crate) fn new(spec: ImageSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }
}

/// Snapshot as reported by `snap ls`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
}

/// Clone parent of an image: the snapshot it was cloned from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentSpec {
    pub pool: String,
    pub image: String,
    pub snapshot: String,
}

/// Read-only view of one pool of an RBD cluster
pub trait RbdBackend {
    /// Pool this backend was connected to
    fn pool(&self) -> &str;

    /// Every image name in the pool
    fn list(&self) -> Result<Vec<String>>;

    /// Open an image or snapshot read-only. Missing images are `AuditError::ImageNotFound`.
    fn open(&self, spec: &ImageSpec) -> Result<ImageHandle>;

    /// Snapshots of an image, in backend order
    fn snapshots(&self, image: &ImageHandle) -> Result<Vec<Snapshot>>;

    /// Clones made from a snapshot, in any pool
    fn children(&self, snapshot: &ImageHandle) -> Result<Vec<ImageSpec>>;

    /// Clone parent, or `None` if the image is not a clone
    fn parent(&self, image: &ImageHandle) -> Result<Option<ParentSpec>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_spec_display() {
        let spec = ImageSpec::new("cinder", "img");
        assert_eq!(spec.to_string(), "cinder/img");
        assert_eq!(spec.at_snapshot("snap").to_string(), "cinder/img@snap");
    }

    #[test]
    fn test_handle_spec() {
        let handle = ImageHandle::new(ImageSpec::new("cinder", "img").at_snapshot("s"));
        assert_eq!(handle.spec().image, "img");
        assert_eq!(handle.spec().snapshot.as_deref(), Some("s"));
    }
}
