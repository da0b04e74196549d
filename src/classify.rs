//! Name classification for RBD images.
//!
//! OpenStack services name the images they create in a recognisable way:
//! - Cinder: `volume-<uuid>`
//! - Nova ephemeral root disks: `<uuid>_disk`
//! - Nova snapshots uploaded to Glance: `<uuid>_disk_clone_<32 hex>`
//! - Glance images: the bare image `<uuid>`
//!
//! The category decides which service is asked whether the image is still in use.

use crate::graph::{NodeColor, NodeShape};

const UUID_LEN: usize = 36;
const CLONE_TOKEN_LEN: usize = 32;
const DISK_SUFFIX: &str = "_disk";
const DISK_CLONE_INFIX: &str = "_disk_clone_";
const VOLUME_PREFIX: &str = "volume-";
const GLANCE_DELETED_MARKER: &str = "to_be_deleted_by_glance";

/// Origin of an image, as inferred from its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameClass {
    /// Cinder volume
    PersistentVolume { uuid: String },
    /// Nova instance root disk
    EphemeralDisk { uuid: String },
    /// Nova instance snapshot stored as a Glance image
    ImageCloneDisk { uuid: String },
    /// Glance image
    BareImageId { uuid: String },
    Unclassified,
}

/// Classify an image name. Rules are tried in a fixed order; the first match wins.
pub fn classify(name: &str) -> NameClass {
    if let Some(uuid) = volume_uuid(name) {
        return NameClass::PersistentVolume { uuid: uuid.to_string() };
    }
    if let Some(uuid) = disk_uuid(name) {
        return NameClass::EphemeralDisk { uuid: uuid.to_string() };
    }
    if let Some(uuid) = disk_clone_uuid(name) {
        return NameClass::ImageCloneDisk { uuid: uuid.to_string() };
    }
    if is_uuid(name) {
        return NameClass::BareImageId { uuid: name.to_string() };
    }
    NameClass::Unclassified
}

/// Red for images Glance has renamed for deferred deletion, gray otherwise
pub fn display_color(name: &str) -> NodeColor {
    if name.contains(GLANCE_DELETED_MARKER) {
        NodeColor::Red
    } else {
        NodeColor::Gray
    }
}

/// Box for Glance image clones, ellipse for everything else
pub fn display_shape(name: &str) -> NodeShape {
    if name.contains("disk_clone") {
        NodeShape::Box
    } else {
        NodeShape::Ellipse
    }
}

/// `volume-<uuid>...`
fn volume_uuid(name: &str) -> Option<&str> {
    let rest = name.strip_prefix(VOLUME_PREFIX)?;
    let uuid = rest.get(..UUID_LEN)?;
    is_uuid(uuid).then_some(uuid)
}

/// `...<uuid>_disk`
fn disk_uuid(name: &str) -> Option<&str> {
    trailing_uuid(name.strip_suffix(DISK_SUFFIX)?)
}

/// `...<uuid>_disk_clone_<32 hex>`
fn disk_clone_uuid(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(CLONE_TOKEN_LEN)?;
    let (head, token) = (name.get(..split)?, name.get(split..)?);
    if !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    trailing_uuid(head.strip_suffix(DISK_CLONE_INFIX)?)
}

fn trailing_uuid(s: &str) -> Option<&str> {
    let start = s.len().checked_sub(UUID_LEN)?;
    let uuid = s.get(start..)?;
    is_uuid(uuid).then_some(uuid)
}

/// 8-4-4-4-12 hex groups, nothing else
fn is_uuid(s: &str) -> bool {
    s.len() == UUID_LEN
        && s.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}
