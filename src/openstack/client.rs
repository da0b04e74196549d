//! REST client for the three services the oracle consults.

use log::debug;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ComputeService, Image, ImageService, Lookup, Server, Session, Volume, VolumeService};
use crate::error::{AuditError, Result};

/// Catalog types for block storage, newest first
const VOLUME_SERVICE_TYPES: &[&str] = &["block-storage", "volumev3", "volumev2", "volume"];
const COMPUTE_SERVICE_TYPES: &[&str] = &["compute"];
const IMAGE_SERVICE_TYPES: &[&str] = &["image"];

#[derive(Debug, Deserialize)]
struct VolumeBody {
    volume: Volume,
}

#[derive(Debug, Deserialize)]
struct ServerBody {
    server: Server,
}

#[derive(Debug, Deserialize)]
struct ImagePage {
    images: Vec<Image>,
    #[serde(default)]
    next: Option<String>,
}

/// Cinder, Nova and Glance behind one authenticated session.
#[derive(Debug, Clone)]
pub struct OpenStackClient {
    session: Session,
    volume_url: String,
    compute_url: String,
    /// Glance root, without the `/v2` suffix
    image_url: String,
    image_page_size: u32,
}

impl OpenStackClient {
    /// Resolve all three endpoints up front so a broken catalog fails at startup.
    pub fn new(session: Session, interface: &str, region: Option<&str>, image_page_size: u32) -> Result<Self> {
        let volume_url = session.endpoint(VOLUME_SERVICE_TYPES, interface, region)?;
        let compute_url = session.endpoint(COMPUTE_SERVICE_TYPES, interface, region)?;
        let image_url = session.endpoint(IMAGE_SERVICE_TYPES, interface, region)?;
        let image_url = image_url.trim_end_matches("/v2").to_string();
        debug!(
            "Endpoints: volume={} compute={} image={}",
            volume_url, compute_url, image_url
        );

        Ok(Self {
            session,
            volume_url,
            compute_url,
            image_url,
            image_page_size,
        })
    }

    /// GET a JSON document; 404 maps to `Lookup::NotFound`.
    fn get<T: DeserializeOwned>(&self, service: &str, url: &str) -> Result<Lookup<T>> {
        debug!("GET {}", url);
        let response = self
            .session
            .client()
            .get(url)
            .header("X-Auth-Token", self.session.token())
            .header("Accept", "application/json")
            .send()?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Lookup::NotFound);
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(AuditError::Api {
                service: service.to_string(),
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }
        Ok(Lookup::Found(response.json()?))
    }
}

impl VolumeService for OpenStackClient {
    fn volume(&self, id: &str) -> Result<Lookup<Volume>> {
        let url = format!("{}/volumes/{}", self.volume_url, id);
        Ok(match self.get::<VolumeBody>("volume", &url)? {
            Lookup::Found(body) => Lookup::Found(body.volume),
            Lookup::NotFound => Lookup::NotFound,
        })
    }
}

impl ComputeService for OpenStackClient {
    fn server(&self, id: &str) -> Result<Lookup<Server>> {
        let url = format!("{}/servers/{}", self.compute_url, id);
        Ok(match self.get::<ServerBody>("compute", &url)? {
            Lookup::Found(body) => Lookup::Found(body.server),
            Lookup::NotFound => Lookup::NotFound,
        })
    }
}

impl ImageService for OpenStackClient {
    fn image(&self, id: &str) -> Result<Lookup<Image>> {
        let url = format!("{}/v2/images/{}", self.image_url, id);
        self.get("image", &url)
    }

    /// Walks every page of `/v2/images`.
    fn images(&self) -> Result<Vec<Image>> {
        let mut images = Vec::new();
        let mut url = format!("{}/v2/images?limit={}", self.image_url, self.image_page_size);
        loop {
            let page = match self.get::<ImagePage>("image", &url)? {
                Lookup::Found(page) => page,
                Lookup::NotFound => {
                    return Err(AuditError::Api {
                        service: "image".to_string(),
                        status: StatusCode::NOT_FOUND.as_u16(),
                        message: format!("image list not found at {}", url),
                    });
                }
            };
            images.extend(page.images);
            match page.next {
                Some(next) => url = next_page_url(&self.image_url, &next),
                None => break,
            }
        }
        debug!("Glance lists {} images", images.len());
        Ok(images)
    }
}

/// Glance returns `next` as a path such as `/v2/images?marker=...`
fn next_page_url(root: &str, next: &str) -> String {
    if next.starts_with("http://") || next.starts_with("https://") {
        next.to_string()
    } else {
        format!("{}/{}", root, next.trim_start_matches('/'))
    }
}
