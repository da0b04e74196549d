//! Recursive walk of the parent/snapshot/clone lineage of RBD images.
//!
//! From an image the walker goes down through each snapshot to the clones made
//! from it, and up to the snapshot the image was itself cloned from. A hop down
//! never climbs back up and a hop up never comes back down, so each lineage is
//! covered once in each direction from the starting image.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::classify::{display_color, display_shape};
use crate::error::{AuditError, Result};
use crate::graph::{LineageGraph, snapshot_label};
use crate::oracle::{DeletionWorklist, ExistenceOracle};
use crate::rbd::{ImageHandle, ImageSpec, RbdBackend};

pub struct LineageWalker<'a, B: RbdBackend> {
    backend: &'a B,
    oracle: ExistenceOracle<'a>,
    /// Every image opened this run, by name; each is opened at most once
    handles: HashMap<String, ImageHandle>,
    /// Images whose clones have been followed
    descended: HashSet<String>,
    graph: LineageGraph,
}

impl<'a, B: RbdBackend> LineageWalker<'a, B> {
    pub fn new(backend: &'a B, oracle: ExistenceOracle<'a>) -> Self {
        Self {
            backend,
            oracle,
            handles: HashMap::new(),
            descended: HashSet::new(),
            graph: LineageGraph::new(),
        }
    }

    /// Open an image of the pool, reusing the handle if it was opened before.
    pub fn open(&mut self, name: &str) -> Result<ImageHandle> {
        if let Some(handle) = self.handles.get(name) {
            return Ok(handle.clone());
        }
        let handle = self
            .backend
            .open(&ImageSpec::new(self.backend.pool(), name))?;
        self.handles.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    /// Like `open`, but an image that vanished since it was listed is skipped.
    fn open_related(&mut self, name: &str) -> Result<Option<ImageHandle>> {
        match self.open(name) {
            Ok(handle) => Ok(Some(handle)),
            Err(AuditError::ImageNotFound(spec)) => {
                warn!("{} disappeared during the scan, skipping", spec);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Add `name` and its lineage to the graph.
    ///
    /// `descend` follows snapshots to their clones, `ascend` follows the clone parent.
    pub fn walk(&mut self, root: &ImageHandle, name: &str, descend: bool, ascend: bool) -> Result<()> {
        info!("Starting from root {}", name);
        let shape = display_shape(name);
        let verdict = self.oracle.exists(name)?;
        self.graph.add_node(name, display_color(name), shape, !verdict.exists);
        if descend {
            self.descended.insert(name.to_string());
        }

        for snapshot in self.backend.snapshots(root)? {
            let snap_spec = root.spec().at_snapshot(&snapshot.name);
            let snap = match self.backend.open(&snap_spec) {
                Ok(snap) => snap,
                Err(AuditError::ImageNotFound(spec)) => {
                    warn!("{} disappeared during the scan, skipping", spec);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let snap_label = snapshot_label(name, &snapshot.name);
            info!("Found snapshot {}", snap_spec);
            self.graph
                .add_node(&snap_label, display_color(&snapshot.name), shape, false);
            self.graph.add_edge(name, &snap_label);

            if !descend {
                continue;
            }
            for child in self.backend.children(&snap)? {
                if child.pool != self.backend.pool() {
                    debug!("Ignoring child {} outside pool {}", child, self.backend.pool());
                    continue;
                }
                let Some(child_handle) = self.open_related(&child.image)? else {
                    continue;
                };
                info!("Found child {}", child);
                self.walk(&child_handle, &child.image, true, false)?;
                self.graph.add_edge(&snap_label, &child.image);
            }
        }

        if ascend {
            self.ascend(root, name)?;
        }
        Ok(())
    }

    fn ascend(&mut self, root: &ImageHandle, name: &str) -> Result<()> {
        let Some(parent) = self.backend.parent(root)? else {
            debug!("{} has no parent", name);
            return Ok(());
        };
        if parent.pool != self.backend.pool() {
            debug!("Ignoring parent {}/{} outside pool {}", parent.pool, parent.image, self.backend.pool());
            return Ok(());
        }
        let Some(parent_handle) = self.open_related(&parent.image)? else {
            return Ok(());
        };

        self.walk(&parent_handle, &parent.image, false, true)?;
        info!("Found parent {}@{}", parent.image, parent.snapshot);
        let label = snapshot_label(&parent.image, &parent.snapshot);
        self.graph.add_node(
            &label,
            display_color(&parent.snapshot),
            display_shape(&parent.image),
            false,
        );
        self.graph.add_edge(label, name);
        Ok(())
    }

    pub fn graph(&self) -> &LineageGraph {
        &self.graph
    }

    /// Whether the clones of `name` were followed. An image only reached while
    /// ascending is in the graph without its other children.
    pub fn walked_down(&self, name: &str) -> bool {
        self.descended.contains(name)
    }

    /// Number of distinct images opened so far
    pub fn opened(&self) -> usize {
        self.handles.len()
    }

    pub fn finish(self) -> (LineageGraph, DeletionWorklist) {
        (self.graph, self.oracle.into_worklist())
    }
}
