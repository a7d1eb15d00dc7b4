//! Index `config.json` and download URL templates

use std::path::Path;

use serde::Deserialize;
use sprout_core::error::SproutError;
use sprout_core::types::PackageRecord;
use tracing::debug;

use crate::RegistryResult;

/// Download template used when the index has no `config.json`
pub const DEFAULT_DOWNLOAD_TEMPLATE: &str = "https://crates.io/api/v1/crates/{crate}/{version}/download";

const MARKERS: [&str; 5] = ["{crate}", "{version}", "{prefix}", "{lowerprefix}", "{sha256-checksum}"];

/// Contents of `config.json` at the index root
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexConfig {
    pub dl: String,
    pub api: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dl: DEFAULT_DOWNLOAD_TEMPLATE.to_string(),
            api: None,
        }
    }
}

impl IndexConfig {
    /// Read `config.json` from the index root, or use the default template
    pub async fn load(index_root: &Path) -> RegistryResult<Self> {
        let path = index_root.join("config.json");
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| SproutError::parse("index config", &path.display().to_string(), e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config.json in {}, using default download URL", index_root.display());
                Ok(Self::default())
            },
            Err(e) => Err(SproutError::io(format!("Failed to read {}", path.display()), e)),
        }
    }

    /// Archive URL for a record
    pub fn download_url(&self, record: &PackageRecord) -> String {
        let name = &record.name;
        if !MARKERS.iter().any(|marker| self.dl.contains(marker)) {
            return format!("{}/{}/{}/download", self.dl.trim_end_matches('/'), name, record.version);
        }

        let prefix = url_prefix(name);
        self.dl
            .replace("{crate}", name)
            .replace("{version}", &record.version.to_string())
            .replace("{lowerprefix}", &prefix.to_lowercase())
            .replace("{prefix}", &prefix)
            .replace("{sha256-checksum}", record.checksum.as_deref().unwrap_or_default())
    }
}

/// Index directory prefix of a name, without lower-casing
fn url_prefix(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    match chars.len() {
        0 => String::new(),
        1 => "1".to_string(),
        2 => "2".to_string(),
        3 => format!("3/{}", chars[0]),
        _ => format!(
            "{}/{}",
            chars[..2].iter().collect::<String>(),
            chars[2..4].iter().collect::<String>()
        ),
    }
}
