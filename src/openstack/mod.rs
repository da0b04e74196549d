//! OpenStack inventory lookups.
//!
//! The oracle only asks "does this exist?", so each service exposes exactly the
//! lookups it needs. A 404 is an answer (`Lookup::NotFound`), not an error.

pub mod client;
pub mod memory;
pub mod session;

use serde::Deserialize;

use crate::error::{AuditError, Result};

pub use client::OpenStackClient;
pub use memory::StaticInventory;
pub use session::{Credentials, Session};

/// Outcome of a lookup by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
}

/// Cinder volume
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Volume {
    /// Server of the first attachment that has an attachment id
    pub fn attached_server(&self) -> Option<&str> {
        self.attachments
            .first()
            .filter(|a| a.attachment_id.as_deref().is_some_and(|id| !id.is_empty()))
            .and_then(|a| a.server_id.as_deref())
    }
}

/// Nova server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Glance image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Only present when Glance exposes `show_image_direct_url`
    #[serde(default)]
    pub direct_url: Option<String>,
}

impl Image {
    pub fn direct_url(&self) -> Result<&str> {
        self.direct_url.as_deref().ok_or_else(|| AuditError::MissingField {
            record: format!("image {}", self.id),
            field: "direct_url".to_string(),
        })
    }
}

/// Block storage (Cinder)
pub trait VolumeService {
    fn volume(&self, id: &str) -> Result<Lookup<Volume>>;
}

/// Compute (Nova)
pub trait ComputeService {
    fn server(&self, id: &str) -> Result<Lookup<Server>>;
}

/// Image (Glance)
pub trait ImageService {
    fn image(&self, id: &str) -> Result<Lookup<Image>>;

    /// Every image visible to the session
    fn images(&self) -> Result<Vec<Image>>;
}
