//! In-memory cluster for tests and offline runs.

use std::cell::RefCell;
use std::collections::HashMap;

use super::{ImageHandle, ImageSpec, ParentSpec, RbdBackend, Snapshot};
use crate::error::{AuditError, Result};

#[derive(Debug, Default)]
struct MemoryImage {
    snapshots: Vec<String>,
    /// Listed by `snapshots` but gone by the time they are opened
    vanished: Vec<String>,
    parent: Option<ParentSpec>,
}

/// A fake cluster holding images of several pools; the backend view is one pool.
#[derive(Debug)]
pub struct MemoryCluster {
    pool: String,
    /// Keyed by (pool, image), kept in creation order for `list`
    images: Vec<((String, String), MemoryImage)>,
    /// Clone links whose child image no longer exists
    dangling: Vec<(ParentSpec, ImageSpec)>,
    opens: RefCell<HashMap<String, usize>>,
}

impl MemoryCluster {
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            images: Vec::new(),
            dangling: Vec::new(),
            opens: RefCell::new(HashMap::new()),
        }
    }

    /// Add an image to the backend's own pool.
    pub fn with_image(self, name: &str) -> Self {
        let pool = self.pool.clone();
        self.with_image_in(&pool, name)
    }

    pub fn with_image_in(mut self, pool: &str, name: &str) -> Self {
        if self.find(pool, name).is_none() {
            self.images
                .push(((pool.to_string(), name.to_string()), MemoryImage::default()));
        }
        self
    }

    /// Add a snapshot to an image in the backend's pool, creating the image if needed.
    pub fn with_snapshot(self, image: &str, snapshot: &str) -> Self {
        let pool = self.pool.clone();
        self.with_snapshot_in(&pool, image, snapshot)
    }

    pub fn with_snapshot_in(mut self, pool: &str, image: &str, snapshot: &str) -> Self {
        self = self.with_image_in(pool, image);
        if let Some(img) = self.find_mut(pool, image) {
            img.snapshots.push(snapshot.to_string());
        }
        self
    }

    /// Clone `child` from `parent@snapshot`, all in the backend's pool.
    pub fn with_clone(self, parent: &str, snapshot: &str, child: &str) -> Self {
        let pool = self.pool.clone();
        self.with_clone_in(&pool, parent, snapshot, &pool, child)
    }

    pub fn with_clone_in(
        mut self,
        parent_pool: &str,
        parent: &str,
        snapshot: &str,
        child_pool: &str,
        child: &str,
    ) -> Self {
        let has_snap = self
            .find(parent_pool, parent)
            .is_some_and(|img| img.snapshots.iter().any(|s| s == snapshot));
        if !has_snap {
            self = self.with_snapshot_in(parent_pool, parent, snapshot);
        }
        self = self.with_image_in(child_pool, child);
        if let Some(img) = self.find_mut(child_pool, child) {
            img.parent = Some(ParentSpec {
                pool: parent_pool.to_string(),
                image: parent.to_string(),
                snapshot: snapshot.to_string(),
            });
        }
        self
    }

    /// Record `child` as a clone of `parent@snapshot` without creating the child image,
    /// as seen when a clone is removed between listing and opening it.
    pub fn with_dangling_child(mut self, parent: &str, snapshot: &str, child: &str) -> Self {
        let pool = self.pool.clone();
        let has_snap = self
            .find(&pool, parent)
            .is_some_and(|img| img.snapshots.iter().any(|s| s == snapshot));
        if !has_snap {
            self = self.with_snapshot_in(&pool, parent, snapshot);
        }
        self.dangling.push((
            ParentSpec {
                pool: pool.clone(),
                image: parent.to_string(),
                snapshot: snapshot.to_string(),
            },
            ImageSpec::new(pool, child),
        ));
        self
    }

    /// Create `child` with a parent link to `parent@snapshot`, which does not exist.
    pub fn with_dangling_parent(mut self, child: &str, parent: &str, snapshot: &str) -> Self {
        let pool = self.pool.clone();
        self = self.with_image_in(&pool, child);
        if let Some(img) = self.find_mut(&pool, child) {
            img.parent = Some(ParentSpec {
                pool,
                image: parent.to_string(),
                snapshot: snapshot.to_string(),
            });
        }
        self
    }

    /// List `snapshot` on `image` but fail to open it.
    pub fn with_vanished_snapshot(mut self, image: &str, snapshot: &str) -> Self {
        let pool = self.pool.clone();
        self = self.with_image_in(&pool, image);
        if let Some(img) = self.find_mut(&pool, image) {
            img.vanished.push(snapshot.to_string());
        }
        self
    }

    /// How many times `open` was called for this image (any snapshot).
    pub fn open_count(&self, image: &str) -> usize {
        self.opens.borrow().get(image).copied().unwrap_or(0)
    }

    /// Opens of the image itself, not of its snapshots
    pub fn image_open_count(&self, image: &str) -> usize {
        self.opens
            .borrow()
            .get(&format!("{}@", image))
            .copied()
            .unwrap_or(0)
    }

    fn find(&self, pool: &str, name: &str) -> Option<&MemoryImage> {
        self.images
            .iter()
            .find(|((p, n), _)| p == pool && n == name)
            .map(|(_, img)| img)
    }

    fn find_mut(&mut self, pool: &str, name: &str) -> Option<&mut MemoryImage> {
        self.images
            .iter_mut()
            .find(|((p, n), _)| p == pool && n == name)
            .map(|(_, img)| img)
    }

    fn lookup(&self, spec: &ImageSpec) -> Result<&MemoryImage> {
        self.find(&spec.pool, &spec.image)
            .ok_or_else(|| AuditError::ImageNotFound(spec.to_string()))
    }
}

impl RbdBackend for MemoryCluster {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .images
            .iter()
            .filter(|((pool, _), _)| *pool == self.pool)
            .map(|((_, name), _)| name.clone())
            .collect())
    }

    fn open(&self, spec: &ImageSpec) -> Result<ImageHandle> {
        let image = self.lookup(spec)?;
        if let Some(snap) = &spec.snapshot
            && !image.snapshots.contains(snap)
        {
            return Err(AuditError::ImageNotFound(spec.to_string()));
        }

        let mut opens = self.opens.borrow_mut();
        *opens.entry(spec.image.clone()).or_insert(0) += 1;
        if spec.snapshot.is_none() {
            *opens.entry(format!("{}@", spec.image)).or_insert(0) += 1;
        }
        Ok(ImageHandle::new(spec.clone()))
    }

    fn snapshots(&self, image: &ImageHandle) -> Result<Vec<Snapshot>> {
        let img = self.lookup(image.spec())?;
        Ok(img
            .snapshots
            .iter()
            .chain(&img.vanished)
            .map(|name| Snapshot { name: name.clone() })
            .collect())
    }

    fn children(&self, snapshot: &ImageHandle) -> Result<Vec<ImageSpec>> {
        let spec = snapshot.spec();
        let snap = spec
            .snapshot
            .as_deref()
            .ok_or_else(|| AuditError::Command(format!("{} is not a snapshot", spec)))?;
        let is_link =
            |p: &ParentSpec| p.pool == spec.pool && p.image == spec.image && p.snapshot == snap;
        let mut children: Vec<ImageSpec> = self
            .images
            .iter()
            .filter(|(_, img)| img.parent.as_ref().is_some_and(is_link))
            .map(|((pool, name), _)| ImageSpec::new(pool.clone(), name.clone()))
            .collect();
        children.extend(
            self.dangling
                .iter()
                .filter(|(parent, _)| is_link(parent))
                .map(|(_, child)| child.clone()),
        );
        Ok(children)
    }

    fn parent(&self, image: &ImageHandle) -> Result<Option<ParentSpec>> {
        Ok(self.lookup(image.spec())?.parent.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_only_own_pool() {
        let cluster = MemoryCluster::new("cinder")
            .with_image("a")
            .with_image_in("images", "b")
            .with_image("c");
        assert_eq!(cluster.list().unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn test_clone_creates_parent_snapshot_and_link() {
        let cluster = MemoryCluster::new("cinder").with_clone("base", "snap", "child");

        let base = cluster.open(&ImageSpec::new("cinder", "base")).unwrap();
        let snaps = cluster.snapshots(&base).unwrap();
        assert_eq!(snaps, vec![Snapshot { name: "snap".to_string() }]);

        let snap = cluster
            .open(&ImageSpec::new("cinder", "base").at_snapshot("snap"))
            .unwrap();
        assert_eq!(
            cluster.children(&snap).unwrap(),
            vec![ImageSpec::new("cinder", "child")]
        );

        let child = cluster.open(&ImageSpec::new("cinder", "child")).unwrap();
        let parent = cluster.parent(&child).unwrap().unwrap();
        assert_eq!(parent.image, "base");
        assert_eq!(parent.snapshot, "snap");
        assert!(cluster.parent(&base).unwrap().is_none());
    }

    #[test]
    fn test_open_missing_image() {
        let cluster = MemoryCluster::new("cinder");
        let result = cluster.open(&ImageSpec::new("cinder", "ghost"));
        assert!(matches!(result, Err(AuditError::ImageNotFound(_))));
    }

    #[test]
    fn test_open_missing_snapshot() {
        let cluster = MemoryCluster::new("cinder").with_image("a");
        let result = cluster.open(&ImageSpec::new("cinder", "a").at_snapshot("nope"));
        assert!(matches!(result, Err(AuditError::ImageNotFound(_))));
    }

    #[test]
    fn test_open_counts() {
        let cluster = MemoryCluster::new("cinder").with_snapshot("a", "s");
        cluster.open(&ImageSpec::new("cinder", "a")).unwrap();
        cluster.open(&ImageSpec::new("cinder", "a").at_snapshot("s")).unwrap();
        assert_eq!(cluster.open_count("a"), 2);
        assert_eq!(cluster.image_open_count("a"), 1);
    }

    #[test]
    fn test_dangling_child_is_listed_but_cannot_be_opened() {
        let cluster = MemoryCluster::new("cinder")
            .with_clone("base", "snap", "child")
            .with_dangling_child("base", "snap", "gone");

        let snap = cluster
            .open(&ImageSpec::new("cinder", "base").at_snapshot("snap"))
            .unwrap();
        assert_eq!(
            cluster.children(&snap).unwrap(),
            vec![ImageSpec::new("cinder", "child"), ImageSpec::new("cinder", "gone")]
        );
        assert!(!cluster.list().unwrap().contains(&"gone".to_string()));
        let result = cluster.open(&ImageSpec::new("cinder", "gone"));
        assert!(matches!(result, Err(AuditError::ImageNotFound(_))));
    }

    #[test]
    fn test_dangling_parent() {
        let cluster = MemoryCluster::new("cinder").with_dangling_parent("child", "gone", "snap");

        let child = cluster.open(&ImageSpec::new("cinder", "child")).unwrap();
        let parent = cluster.parent(&child).unwrap().unwrap();
        assert_eq!(parent.image, "gone");
        let result = cluster.open(&ImageSpec::new("cinder", "gone"));
        assert!(matches!(result, Err(AuditError::ImageNotFound(_))));
    }

    #[test]
    fn test_vanished_snapshot_is_listed_but_cannot_be_opened() {
        let cluster = MemoryCluster::new("cinder")
            .with_snapshot("a", "s")
            .with_vanished_snapshot("a", "old");

        let image = cluster.open(&ImageSpec::new("cinder", "a")).unwrap();
        let names: Vec<String> = cluster
            .snapshots(&image)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["s", "old"]);
        let result = cluster.open(&ImageSpec::new("cinder", "a").at_snapshot("old"));
        assert!(matches!(result, Err(AuditError::ImageNotFound(_))));
    }
}
