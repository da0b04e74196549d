//! rbd-lineage - audit an RBD pool for images OpenStack no longer uses
//!
//! Walks the parent/snapshot/clone lineage of the images in a pool, asks Cinder,
//! Nova or Glance whether each image is still referenced, and produces a
//! Graphviz plot of the lineage plus the `rbd rm` commands for the orphans.

pub mod audit;
pub mod classify;
pub mod error;
pub mod graph;
pub mod openstack;
pub mod oracle;
pub mod rbd;
pub mod walker;

pub use error::{AuditError, Result};
