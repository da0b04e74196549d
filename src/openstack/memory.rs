//! Fixed inventory for tests and offline runs.

use std::cell::Cell;

use super::{Attachment, ComputeService, Image, ImageService, Lookup, Server, Volume, VolumeService};
use crate::error::Result;

/// Inventory answering from fixed lists, counting the queries it receives.
#[derive(Debug, Default)]
pub struct StaticInventory {
    volumes: Vec<Volume>,
    servers: Vec<Server>,
    images: Vec<Image>,
    queries: Cell<usize>,
    listings: Cell<usize>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(mut self, id: &str) -> Self {
        self.volumes.push(Volume {
            id: id.to_string(),
            attachments: Vec::new(),
        });
        self
    }

    pub fn with_attached_volume(mut self, id: &str, server_id: &str) -> Self {
        self.volumes.push(Volume {
            id: id.to_string(),
            attachments: vec![Attachment {
                attachment_id: Some(format!("att-{}", id)),
                server_id: Some(server_id.to_string()),
            }],
        });
        self
    }

    pub fn with_server(mut self, id: &str) -> Self {
        self.servers.push(Server {
            id: id.to_string(),
            name: None,
        });
        self
    }

    pub fn with_image(mut self, id: &str, direct_url: Option<&str>) -> Self {
        self.images.push(Image {
            id: id.to_string(),
            name: None,
            direct_url: direct_url.map(str::to_string),
        });
        self
    }

    /// Lookups by id served so far
    pub fn queries(&self) -> usize {
        self.queries.get()
    }

    /// Image listings served so far
    pub fn listings(&self) -> usize {
        self.listings.get()
    }

    fn find<T: Clone>(&self, items: &[T], id: &str, id_of: impl Fn(&T) -> &str) -> Lookup<T> {
        self.queries.set(self.queries.get() + 1);
        match items.iter().find(|item| id_of(item) == id) {
            Some(item) => Lookup::Found(item.clone()),
            None => Lookup::NotFound,
        }
    }
}

impl VolumeService for StaticInventory {
    fn volume(&self, id: &str) -> Result<Lookup<Volume>> {
        Ok(self.find(&self.volumes, id, |v| v.id.as_str()))
    }
}

impl ComputeService for StaticInventory {
    fn server(&self, id: &str) -> Result<Lookup<Server>> {
        Ok(self.find(&self.servers, id, |s| s.id.as_str()))
    }
}

impl ImageService for StaticInventory {
    fn image(&self, id: &str) -> Result<Lookup<Image>> {
        Ok(self.find(&self.images, id, |i| i.id.as_str()))
    }

    fn images(&self) -> Result<Vec<Image>> {
        self.listings.set(self.listings.get() + 1);
        Ok(self.images.clone())
    }
}
