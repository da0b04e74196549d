//! One audit run: pick the root images, walk each, collect graph and worklist.

use log::{debug, info};

use crate::error::Result;
use crate::graph::LineageGraph;
use crate::oracle::{DeletionWorklist, ExistenceOracle};
use crate::rbd::RbdBackend;
use crate::walker::LineageWalker;

pub const WORKLIST_HEADER: &str = "This is the list of commands you should issue";
pub const NOTHING_TO_REMOVE: &str = "there is no image that can be removed";

/// Roots for a whole-pool scan.
///
/// Volumes and instance disks are left out: they are reached from the images
/// they were cloned from.
pub fn select_roots(pool_images: Vec<String>) -> Vec<String> {
    pool_images
        .into_iter()
        .filter(|name| !name.ends_with("_disk") && !name.starts_with("volume-"))
        .collect()
}

/// Graph and worklist produced by a run
#[derive(Debug)]
pub struct AuditReport {
    pub graph: LineageGraph,
    pub worklist: DeletionWorklist,
}

/// Walk `roots`, or every eligible image of the pool when `roots` is empty.
pub fn run<B: RbdBackend>(backend: &B, oracle: ExistenceOracle<'_>, roots: &[String]) -> Result<AuditReport> {
    let roots = if roots.is_empty() {
        let roots = select_roots(backend.list()?);
        info!("Scanning {} images of pool {}", roots.len(), backend.pool());
        roots
    } else {
        roots.to_vec()
    };

    let mut walker = LineageWalker::new(backend, oracle);
    for root in &roots {
        if walker.walked_down(root) {
            debug!("{} already walked", root);
            continue;
        }
        let handle = walker.open(root)?;
        walker.walk(&handle, root, true, true)?;
    }
    info!("Opened {} images", walker.opened());

    let (graph, worklist) = walker.finish();
    Ok(AuditReport { graph, worklist })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_roots_filters_volumes_and_disks() {
        let all = names(&[
            "volume-11111111-2222-3333-4444-555555555555",
            "11111111-2222-3333-4444-555555555555_disk",
            "11111111-2222-3333-4444-555555555555",
            "scratch",
            "my_disk_backup",
        ]);
        assert_eq!(
            select_roots(all),
            names(&["11111111-2222-3333-4444-555555555555", "scratch", "my_disk_backup"])
        );
    }
}
