//! Fixed-schema cloud-config
//!
//! The subset of cloud-config that `add-ssh-key` reads and writes. Fields not
//! listed here are dropped on load.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CidataError;
use crate::userdata::{self, CLOUD_CONFIG_HEADER};

/// Destination of the private key inside the guest
pub const PRIVATE_KEY_PATH: &str = "/priv_key";

/// Destination of the public key inside the guest
pub const PUBLIC_KEY_PATH: &str = "/pub_key";

/// Mode of the private key file
pub const PRIVATE_KEY_PERMISSIONS: &str = "0400";

/// Mode of the public key file
pub const PUBLIC_KEY_PERMISSIONS: &str = "0600";

/// Cloud-config structure with a fixed set of fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Locale to set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Timezone to set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Whether to upgrade packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_upgrade: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_reboot_if_required: Option<bool>,

    /// APT sources keyed by repository name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apt: Option<BTreeMap<String, AptSource>>,

    /// Default user password (a hash once edited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chpasswd: Option<ChpasswdConfig>,

    /// SSH authorized keys for default user
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_authorized_keys: Vec<String>,

    /// Files to write
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub write_files: Vec<WriteFileConfig>,
}

/// APT repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AptSource {
    pub arches: Vec<String>,
    pub uri: String,
}

/// chpasswd configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChpasswdConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire: Option<bool>,
}

/// File to write
///
/// There is no `owner` field: cloud-init applies ownership before the default
/// user exists, which breaks boots when the owner names that user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteFileConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub permissions: String,
}

impl WriteFileConfig {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        permissions: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            permissions: permissions.into(),
        }
    }
}

impl CloudConfig {
    /// Parse cloud-config from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // Strip #cloud-config header if present
        let yaml = yaml
            .strip_prefix(CLOUD_CONFIG_HEADER)
            .map(|s| s.trim_start())
            .unwrap_or(yaml);

        if userdata::is_blank_document(yaml) {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Load cloud-config from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CidataError> {
        let path = path.as_ref();
        let text = userdata::read_text(path)?;
        if !Self::is_cloud_config(&text) {
            debug!("{} has no {} header", path.display(), CLOUD_CONFIG_HEADER);
        }
        Ok(Self::from_yaml(&text)?)
    }

    /// Append a public key to `ssh_authorized_keys`
    pub fn add_ssh_key(&mut self, key: impl Into<String>) {
        self.ssh_authorized_keys.push(key.into());
    }

    /// Replace `write_files` with the key pair at their fixed guest paths
    pub fn set_key_pair_files(&mut self, private_key: &str, public_key: &str) {
        self.write_files = vec![
            WriteFileConfig::new(PRIVATE_KEY_PATH, private_key, PRIVATE_KEY_PERMISSIONS),
            WriteFileConfig::new(PUBLIC_KEY_PATH, public_key, PUBLIC_KEY_PERMISSIONS),
        ];
    }

    /// Render with the `#cloud-config` header
    pub fn to_cloud_config(&self) -> Result<String, CidataError> {
        userdata::render_cloud_config(self)
    }

    /// Check if this looks like a cloud-config (starts with #cloud-config)
    pub fn is_cloud_config(data: &str) -> bool {
        data.trim_start().starts_with(CLOUD_CONFIG_HEADER)
    }
}
