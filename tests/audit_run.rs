//! End-to-end audit runs
//!
//! Runs whole scans against the in-memory cluster and inventory.

use rbd_lineage::audit;
use rbd_lineage::error::Result;
use rbd_lineage::graph::{NodeColor, snapshot_label};
use rbd_lineage::openstack::StaticInventory;
use rbd_lineage::oracle::ExistenceOracle;
use rbd_lineage::rbd::{MemoryCluster, RbdBackend};
use tempfile::TempDir;

const VOL_UUID: &str = "11111111-2222-3333-4444-555555555555";
const IMAGE_UUID: &str = "99999999-8888-7777-6666-555555555555";
const SERVER_UUID: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

fn volume() -> String {
    format!("volume-{}", VOL_UUID)
}

fn disk() -> String {
    format!("{}_disk", SERVER_UUID)
}

/// Glance image with one volume and one instance disk cloned from it
fn cluster() -> MemoryCluster {
    MemoryCluster::new("cinder")
        .with_clone(IMAGE_UUID, "snap", &volume())
        .with_clone(IMAGE_UUID, "snap", &disk())
        .with_image("scratch")
}

#[test]
fn test_orphaned_volume_is_listed() -> Result<()> {
    let cluster = cluster();
    let inventory = StaticInventory::new()
        .with_image(IMAGE_UUID, None)
        .with_server(SERVER_UUID);
    let oracle = ExistenceOracle::new(&inventory, &inventory, &inventory, "cinder");

    let report = audit::run(&cluster, oracle, &[])?;

    assert_eq!(
        report.worklist.commands(),
        &["volume: rbd -p cinder rm volume-11111111-2222-3333-4444-555555555555".to_string()]
    );
    let node = report.graph.node(&volume()).unwrap();
    assert!(node.filled);
    assert_eq!(node.color, NodeColor::Gray);
    Ok(())
}

#[test]
fn test_everything_in_use() -> Result<()> {
    let cluster = cluster();
    let inventory = StaticInventory::new()
        .with_image(IMAGE_UUID, None)
        .with_attached_volume(VOL_UUID, SERVER_UUID)
        .with_server(SERVER_UUID);
    let oracle = ExistenceOracle::new(&inventory, &inventory, &inventory, "cinder");

    let report = audit::run(&cluster, oracle, &[])?;

    assert!(report.worklist.is_empty());
    assert!(!report.graph.node(IMAGE_UUID).unwrap().filled);
    Ok(())
}

#[test]
fn test_pool_scan_roots_skip_volumes_and_disks() -> Result<()> {
    let cluster = cluster();
    let roots = audit::select_roots(cluster.list()?);
    assert_eq!(roots, vec![IMAGE_UUID.to_string(), "scratch".to_string()]);
    Ok(())
}

#[test]
fn test_pool_scan_reaches_clones_through_their_parent() -> Result<()> {
    let cluster = cluster();
    let inventory = StaticInventory::new();
    let oracle = ExistenceOracle::new(&inventory, &inventory, &inventory, "cinder");

    let report = audit::run(&cluster, oracle, &[])?;

    let snap = snapshot_label(IMAGE_UUID, "snap");
    assert!(report.graph.has_edge(IMAGE_UUID, &snap));
    assert!(report.graph.has_edge(&snap, &volume()));
    assert!(report.graph.has_edge(&snap, &disk()));
    assert!(report.graph.contains("scratch"));
    // image, snapshot, volume, disk, scratch
    assert_eq!(report.graph.nodes().len(), 5);
    // scratch is unclassified: filled but never listed
    assert!(report.graph.node("scratch").unwrap().filled);
    assert_eq!(report.worklist.len(), 3);
    Ok(())
}

#[test]
fn test_explicit_roots_share_open_handles() -> Result<()> {
    let cluster = cluster();
    let inventory = StaticInventory::new();
    let oracle = ExistenceOracle::new(&inventory, &inventory, &inventory, "cinder");
    let roots = vec![volume(), IMAGE_UUID.to_string()];

    let report = audit::run(&cluster, oracle, &roots)?;

    // the image was only climbed to from the volume, so it is still walked down
    assert!(report.graph.has_edge(&snapshot_label(IMAGE_UUID, "snap"), &disk()));
    assert_eq!(cluster.image_open_count(IMAGE_UUID), 1);
    assert_eq!(cluster.image_open_count(&volume()), 1);
    Ok(())
}

#[test]
fn test_clone_listed_before_its_base() -> Result<()> {
    let clone = format!("{}_disk_clone_0123456789abcdef0123456789abcdef", SERVER_UUID);
    let cluster = MemoryCluster::new("cinder")
        .with_image(&clone)
        .with_clone(IMAGE_UUID, "snap", &clone)
        .with_clone(IMAGE_UUID, "snap", &volume());
    assert_eq!(audit::select_roots(cluster.list()?), vec![clone.clone(), IMAGE_UUID.to_string()]);
    let inventory = StaticInventory::new();
    let oracle = ExistenceOracle::new(&inventory, &inventory, &inventory, "cinder");

    let report = audit::run(&cluster, oracle, &[])?;

    let snap = snapshot_label(IMAGE_UUID, "snap");
    assert!(report.graph.has_edge(&snap, &clone));
    assert!(report.graph.has_edge(&snap, &volume()));
    assert!(report.graph.node(&volume()).unwrap().filled);
    assert!(
        report
            .worklist
            .commands()
            .contains(&format!("volume: rbd -p cinder rm {}", volume()))
    );
    assert_eq!(report.worklist.len(), 3);
    Ok(())
}

#[test]
fn test_graph_written_as_dot() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("plot-rbd.dot");
    let cluster = cluster();
    let inventory = StaticInventory::new().with_image(IMAGE_UUID, None);
    let oracle = ExistenceOracle::new(&inventory, &inventory, &inventory, "cinder");

    let report = audit::run(&cluster, oracle, &[IMAGE_UUID.to_string()])?;
    report.graph.write(&path)?;

    let dot = std::fs::read_to_string(&path)?;
    assert!(dot.starts_with("strict digraph {"));
    assert!(dot.contains(&format!("\"{}\\n@snap\" -> \"{}\";", IMAGE_UUID, volume())));
    assert!(dot.contains(&format!("\"{}\" [color=gray, shape=ellipse, style=filled];", volume())));
    assert!(dot.contains(&format!("\"{}\" [color=gray, shape=ellipse];", IMAGE_UUID)));
    Ok(())
}

#[test]
fn test_unknown_root_is_an_error() {
    let cluster = cluster();
    let inventory = StaticInventory::new();
    let oracle = ExistenceOracle::new(&inventory, &inventory, &inventory, "cinder");

    let result = audit::run(&cluster, oracle, &["ghost".to_string()]);

    assert!(result.is_err());
}
