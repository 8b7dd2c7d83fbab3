//! Background image loading for placeholder tokens.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use spanmark_engine::{ImageData, ResolutionRequest};
use ureq::Agent;

/// A finished load, sent back to the UI loop.
#[derive(Debug)]
pub struct Fetched {
    pub token: String,
    pub image: Option<ImageData>,
}

/// Loads image references: `http(s)` over the network, anything else as a
/// file relative to the document's directory.
pub struct ImageSource {
    agent: Agent,
    base_dir: PathBuf,
}

pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Width and height from a PNG IHDR chunk.
pub fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 24 || &data[0..8] != b"\x89PNG\r\n\x1a\n" {
        return None;
    }
    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    Some((width, height))
}

impl ImageSource {
    pub fn new(base_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn load(&self, reference: &str) -> Result<ImageData> {
        let bytes = if is_remote(reference) {
            self.fetch(reference)?
        } else {
            let path = self.base_dir.join(reference);
            std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?
        };
        if bytes.is_empty() {
            bail!("{reference} is empty");
        }

        let image = ImageData::new(bytes);
        Ok(match png_dimensions(&image.bytes) {
            Some((width, height)) => image.with_size(width, height),
            None => image,
        })
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.agent.get(url).call()?;
        let status = response.status().as_u16();
        if status >= 400 {
            bail!("HTTP {status} fetching {url}");
        }
        Ok(response.into_body().read_to_vec()?)
    }
}

/// Serves requests until every sender is gone. Failed loads are reported as
/// `None` so the placeholder stays visible.
pub fn spawn_fetcher(
    source: ImageSource,
    requests: Receiver<ResolutionRequest>,
    results: Sender<Fetched>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for request in requests {
            let image = match source.load(&request.reference) {
                Ok(image) => Some(image),
                Err(e) => {
                    log::warn!("Could not load image {}: {e:#}", request.reference);
                    None
                }
            };
            let fetched = Fetched {
                token: request.token,
                image,
            };
            if results.send(fetched).is_err() {
                break;
            }
        }
        log::debug!("Fetch worker for {} finished", source.base_dir().display());
    })
}
