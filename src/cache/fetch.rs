use std::io::Read;

use crate::error::{Error, Result};

/// Source of raw asset bytes for cache misses.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Default byte source: http(s) URLs go over the network, anything else is
/// treated as a local file path.
pub struct DefaultFetcher {
    agent: ureq::Agent,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            // Non-2xx statuses surface as errors from `call`.
            let response = self
                .agent
                .get(url)
                .call()
                .map_err(|err| Error::fetch(format!("request for '{url}' failed: {err}")))?;
            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|err| Error::fetch(format!("reading body of '{url}' failed: {err}")))?;
            Ok(bytes)
        } else {
            std::fs::read(url).map_err(|err| Error::fetch(format!("failed to read '{url}': {err}")))
        }
    }
}
