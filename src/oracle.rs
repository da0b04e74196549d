//! Existence checks against OpenStack, and the removal worklist they feed.

use std::collections::HashMap;

use log::{debug, error, info};

use crate::classify::{NameClass, classify};
use crate::error::Result;
use crate::openstack::{ComputeService, Image, ImageService, Lookup, VolumeService};

/// Verdict for one image name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistenceResult {
    pub exists: bool,
    /// Why the image is considered orphaned
    pub reason: Option<String>,
}

impl ExistenceResult {
    pub fn found() -> Self {
        Self {
            exists: true,
            reason: None,
        }
    }

    pub fn missing(reason: impl Into<String>) -> Self {
        Self {
            exists: false,
            reason: Some(reason.into()),
        }
    }
}

/// Removal commands for orphaned images, in discovery order. Nothing is executed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionWorklist {
    commands: Vec<String>,
}

impl DeletionWorklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

/// Removal command for an orphan of the given class
pub fn removal_command(class: &NameClass, pool: &str, name: &str) -> Option<String> {
    let prefix = match class {
        NameClass::PersistentVolume { .. } => "volume:",
        NameClass::EphemeralDisk { .. } => "disk:",
        NameClass::ImageCloneDisk { .. } => "disk_clone",
        NameClass::BareImageId { .. } => "uuid:",
        NameClass::Unclassified => return None,
    };
    Some(format!("{} rbd -p {} rm {}", prefix, pool, name))
}

/// Asks the service that owns an image whether it still knows about it.
///
/// Verdicts are remembered per name for the lifetime of the oracle, so an image
/// reached along several lineage paths is queried and listed for removal once.
pub struct ExistenceOracle<'a> {
    volumes: &'a dyn VolumeService,
    compute: &'a dyn ComputeService,
    images: &'a dyn ImageService,
    pool: String,
    verdicts: HashMap<String, ExistenceResult>,
    image_listing: Option<Vec<Image>>,
    worklist: DeletionWorklist,
}

impl<'a> ExistenceOracle<'a> {
    pub fn new(
        volumes: &'a dyn VolumeService,
        compute: &'a dyn ComputeService,
        images: &'a dyn ImageService,
        pool: impl Into<String>,
    ) -> Self {
        Self {
            volumes,
            compute,
            images,
            pool: pool.into(),
            verdicts: HashMap::new(),
            image_listing: None,
            worklist: DeletionWorklist::new(),
        }
    }

    /// Classify `name` and check it.
    pub fn exists(&mut self, name: &str) -> Result<ExistenceResult> {
        let class = classify(name);
        self.check_exists(&class, name)
    }

    /// Check an already classified name; orphans are appended to the worklist.
    pub fn check_exists(&mut self, class: &NameClass, name: &str) -> Result<ExistenceResult> {
        if let Some(verdict) = self.verdicts.get(name) {
            debug!("Reusing verdict for {}", name);
            return Ok(verdict.clone());
        }

        let verdict = self.query(class, name)?;
        if !verdict.exists
            && let Some(command) = removal_command(class, &self.pool, name)
        {
            self.worklist.push(command);
        }
        self.verdicts.insert(name.to_string(), verdict.clone());
        Ok(verdict)
    }

    fn query(&mut self, class: &NameClass, name: &str) -> Result<ExistenceResult> {
        match class {
            NameClass::PersistentVolume { uuid } => {
                info!("Checking if cinder volume {} exists", uuid);
                match self.volumes.volume(uuid)? {
                    Lookup::Found(volume) => {
                        info!("Volume {} exists.", uuid);
                        if let Some(server) = volume.attached_server() {
                            info!("Volume {} is attached to {}", uuid, server);
                        }
                        Ok(ExistenceResult::found())
                    }
                    Lookup::NotFound => Ok(orphan(name, format!("cinder volume {} not found", uuid))),
                }
            }
            NameClass::EphemeralDisk { uuid } => {
                info!("Checking if instance {} owning ephemeral disk exists", uuid);
                match self.compute.server(uuid)? {
                    Lookup::Found(_) => {
                        info!("Instance {} exists.", uuid);
                        Ok(ExistenceResult::found())
                    }
                    Lookup::NotFound => Ok(orphan(name, format!("nova instance {} not found", uuid))),
                }
            }
            NameClass::ImageCloneDisk { .. } => {
                info!("Checking if a glance image is backed by {}", name);
                for image in self.image_listing()? {
                    match image.direct_url() {
                        Ok(url) if url.contains(name) => {
                            info!("Image {} is backed by {}.", image.id, name);
                            return Ok(ExistenceResult::found());
                        }
                        Ok(_) => {}
                        Err(e) => debug!("Skipping image {}: {}", image.id, e),
                    }
                }
                Ok(orphan(name, "no glance image uses it as direct_url"))
            }
            NameClass::BareImageId { uuid } => {
                info!("Checking if glance image {} exists", uuid);
                match self.images.image(uuid)? {
                    Lookup::Found(_) => {
                        info!("Image {} exists.", uuid);
                        Ok(ExistenceResult::found())
                    }
                    Lookup::NotFound => Ok(orphan(name, format!("glance image {} not found", uuid))),
                }
            }
            NameClass::Unclassified => {
                info!("No api found for {}", name);
                Ok(ExistenceResult::missing("name matches no openstack service"))
            }
        }
    }

    /// Glance listing, fetched on first use
    fn image_listing(&mut self) -> Result<&[Image]> {
        if self.image_listing.is_none() {
            self.image_listing = Some(self.images.images()?);
        }
        Ok(self.image_listing.as_deref().unwrap_or_default())
    }

    #[cfg(test)]
    fn worklist(&self) -> &DeletionWorklist {
        &self.worklist
    }

    pub fn into_worklist(self) -> DeletionWorklist {
        self.worklist
    }
}

fn orphan(name: &str, reason: impl Into<String>) -> ExistenceResult {
    let result = ExistenceResult::missing(reason);
    error!(
        "Not Found: {} rbd image should be deleted ({})",
        name,
        result.reason.as_deref().unwrap_or_default()
    );
    result
}
