//! Sharded on-disk registry index

use std::path::PathBuf;

use sprout_core::error::SproutError;
use sprout_core::types::{PackageRecord, VersionReq};
use tracing::{debug, info};

use crate::record::IndexRecord;
use crate::RegistryResult;

/// Read-only view of a registry index checkout
#[derive(Debug, Clone)]
pub struct RegistryIndex {
    root: PathBuf,
}

impl RegistryIndex {
    /// Open the index checked out at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Relative index file for a package name.
    ///
    /// Names of 1 and 2 characters live under `1/` and `2/`, 3 characters
    /// under `3/<first char>/`, and longer names under
    /// `<chars 0-1>/<chars 2-3>/`. Paths are lower-cased.
    pub fn index_path(name: &str) -> PathBuf {
        let name = name.to_lowercase();
        let chars: Vec<char> = name.chars().collect();
        let shard = |range: std::ops::Range<usize>| chars[range].iter().collect::<String>();

        let mut path = PathBuf::new();
        match chars.len() {
            0 => {},
            1 => path.push("1"),
            2 => path.push("2"),
            3 => {
                path.push("3");
                path.push(shard(0..1));
            },
            _ => {
                path.push(shard(0..2));
                path.push(shard(2..4));
            },
        }
        path.push(&name);
        path
    }

    /// Every published version of `name`, in file order
    pub async fn records(&self, name: &str) -> RegistryResult<Vec<IndexRecord>> {
        let path = self.root.join(Self::index_path(name));
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SproutError::io(
                    format!("Failed to read index file {}", path.display()),
                    e,
                ))
            },
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(IndexRecord::parse_line)
            .collect()
    }

    /// Highest version of `name` satisfying `req`
    pub async fn lookup(
        &self,
        name: &str,
        req: &VersionReq,
        requested_by: &str,
    ) -> RegistryResult<PackageRecord> {
        let mut candidates = Vec::new();
        for record in self.records(name).await? {
            let version = record.version()?;
            candidates.push((version, record));
        }
        debug!("{} has {} published versions", name, candidates.len());

        let (_, best) = req
            .select_max(candidates, |(version, _)| version)
            .ok_or_else(|| SproutError::NotFound {
                name: name.to_string(),
                req: req.to_string(),
                requested_by: requested_by.to_string(),
            })?;

        let record = best.into_record()?;
        info!("Selected {}-{} for '{}' ({})", record.name, record.version, req, requested_by);
        Ok(record)
    }
}
