//! Archive download and the idempotent package fetcher

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use reqwest::redirect::Policy;
use sprout_config::ChecksumPolicy;
use sprout_core::error::SproutError;
use sprout_core::types::{PackageId, PackageRecord};
use sprout_core::utils::verify_checksum;
use tracing::{debug, info, warn};

use crate::tarball::unpack_archive;
use crate::CacheResult;

/// Maximum redirects followed for one download
pub const MAX_REDIRECTS: usize = 10;

/// Downloads raw archive bytes
pub trait ArchiveFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = CacheResult<Vec<u8>>> + Send;
}

/// `ArchiveFetcher` over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> CacheResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("sprout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SproutError::network("Failed to create HTTP client".to_string(), e))?;
        Ok(Self { client })
    }
}

impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CacheResult<Vec<u8>> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SproutError::network(format!("Request to {} failed", url), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SproutError::Network {
                message: format!("{} returned HTTP {}", url, status),
                source: None,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SproutError::network(format!("Failed to read body from {}", url), e))?;
        Ok(bytes.to_vec())
    }
}

/// Downloads, verifies and unpacks packages into the registry directory
pub struct PackageFetcher<F> {
    fetcher: F,
    registry_dir: PathBuf,
    policy: ChecksumPolicy,
    fetched: HashMap<PackageId, PathBuf>,
}

impl<F: ArchiveFetcher> PackageFetcher<F> {
    pub fn new(fetcher: F, registry_dir: impl Into<PathBuf>, policy: ChecksumPolicy) -> Self {
        Self {
            fetcher,
            registry_dir: registry_dir.into(),
            policy,
            fetched: HashMap::new(),
        }
    }

    /// Unpacked source directory of `record`, downloading it from `url`
    /// only when neither this run nor an earlier one has unpacked it
    pub async fn fetch(&mut self, record: &PackageRecord, url: &str) -> CacheResult<PathBuf> {
        let id = record.id();
        if let Some(dir) = self.fetched.get(&id) {
            return Ok(dir.clone());
        }

        let dir_name = id.to_string();
        let dest = self.registry_dir.join(&dir_name);
        if dest.is_dir() {
            debug!("{} already unpacked at {}", id, dest.display());
            self.fetched.insert(id, dest.clone());
            return Ok(dest);
        }

        info!("Downloading {} from {}", id, url);
        let data = self.fetcher.fetch(url).await?;
        self.check_integrity(record, &data)?;

        tokio::fs::create_dir_all(&self.registry_dir)
            .await
            .map_err(|e| SproutError::io(format!("Failed to create {}", self.registry_dir.display()), e))?;

        let registry_dir = self.registry_dir.clone();
        let unpacked = tokio::task::spawn_blocking(move || unpack_archive(&data, &registry_dir, &dir_name))
            .await
            .map_err(|e| {
                SproutError::io(
                    "Unpack task failed".to_string(),
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                )
            })??;

        self.fetched.insert(id, unpacked.clone());
        Ok(unpacked)
    }

    fn check_integrity(&self, record: &PackageRecord, data: &[u8]) -> CacheResult<()> {
        let Some(expected) = record.checksum.as_deref() else {
            debug!("No checksum recorded for {}", record.id());
            return Ok(());
        };

        match verify_checksum(&record.id().to_string(), data, expected) {
            Ok(()) => Ok(()),
            Err(err @ SproutError::ChecksumMismatch { .. }) if self.policy == ChecksumPolicy::Warn => {
                warn!("{}; using the archive anyway", err);
                Ok(())
            },
            Err(err) => Err(err),
        }
    }
}
