//! User-data documents
//!
//! Loading, editing and writing of cloud-init user-data:
//! - Schema-less editing on an ordered YAML mapping ([`UserDataDocument`])
//! - Rendering any serializable document with the `#cloud-config` header

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::CidataError;

/// First line of every user-data file cloud-init treats as cloud-config
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

/// Key holding the default user's password hash
pub const PASSWORD_KEY: &str = "password";

/// Key holding the default user's SSH authorized keys
pub const SSH_AUTHORIZED_KEYS_KEY: &str = "ssh_authorized_keys";

/// Render a document as cloud-config text, header line first
pub fn render_cloud_config<T: Serialize + ?Sized>(doc: &T) -> Result<String, CidataError> {
    let body = serde_yaml::to_string(doc)?;
    Ok(format!("{}\n{}", CLOUD_CONFIG_HEADER, body))
}

/// Render a document and write it to `path`, truncating any existing file
pub fn write_cloud_config<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    doc: &T,
) -> Result<(), CidataError> {
    let path = path.as_ref();
    // Render before touching the output so a serialize failure leaves no file
    let rendered = render_cloud_config(doc)?;
    fs::write(path, rendered).map_err(|e| CidataError::write(path, e))?;
    debug!("Wrote cloud-config to {}", path.display());
    Ok(())
}

/// Read a text file, mapping failures to a read error naming the path
pub fn read_text(path: impl AsRef<Path>) -> Result<String, CidataError> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|e| CidataError::read(path, e))
}

/// Untyped user-data: an ordered mapping of string keys to arbitrary YAML values
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UserDataDocument {
    mapping: Mapping,
}

impl UserDataDocument {
    /// Parse user-data YAML. An empty document yields an empty mapping.
    pub fn from_yaml(yaml: &str) -> Result<Self, CidataError> {
        if is_blank_document(yaml) {
            return Ok(Self::default());
        }

        // The header is a YAML comment, so it needs no stripping here
        match serde_yaml::from_str::<Value>(yaml)? {
            Value::Null => Ok(Self::default()),
            Value::Mapping(mapping) => Ok(Self { mapping }),
            other => Err(CidataError::schema(
                "user-data",
                "mapping",
                value_kind(&other),
            )),
        }
    }

    /// Load user-data from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CidataError> {
        let path = path.as_ref();
        let doc = Self::from_yaml(&read_text(path)?)?;
        debug!("Loaded {} top-level keys from {}", doc.len(), path.display());
        Ok(doc)
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.mapping.get(key)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Store a password hash, replacing any previous value
    pub fn set_password_hash(&mut self, hash: impl Into<String>) {
        self.mapping.insert(
            Value::String(PASSWORD_KEY.to_string()),
            Value::String(hash.into()),
        );
    }

    /// Append a key to `ssh_authorized_keys`, creating the sequence if needed
    ///
    /// An existing value that is not a sequence is left untouched and reported
    /// as a schema error.
    pub fn append_ssh_key(&mut self, key: impl Into<String>) -> Result<(), CidataError> {
        let key = Value::String(key.into());
        match self.mapping.get_mut(SSH_AUTHORIZED_KEYS_KEY) {
            Some(Value::Sequence(keys)) => keys.push(key),
            Some(other) => {
                return Err(CidataError::schema(
                    SSH_AUTHORIZED_KEYS_KEY,
                    "sequence",
                    value_kind(other),
                ));
            }
            None => {
                self.mapping.insert(
                    Value::String(SSH_AUTHORIZED_KEYS_KEY.to_string()),
                    Value::Sequence(vec![key]),
                );
            }
        }
        Ok(())
    }

    /// Render with the `#cloud-config` header
    pub fn to_cloud_config(&self) -> Result<String, CidataError> {
        render_cloud_config(self)
    }
}

/// True when the text holds nothing but comments, blank lines and document markers
pub(crate) fn is_blank_document(yaml: &str) -> bool {
    yaml.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---"
    })
}

/// Human-readable name of a YAML value's type
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_empty_mapping() {
        let doc = UserDataDocument::from_yaml("").unwrap();
        assert!(doc.is_empty());

        let doc = UserDataDocument::from_yaml("{}").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_header_only_document() {
        let doc = UserDataDocument::from_yaml("#cloud-config\n").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_non_mapping_document_rejected() {
        let err = UserDataDocument::from_yaml("- a\n- b\n").unwrap_err();
        assert!(matches!(
            err,
            CidataError::Schema {
                found: "sequence",
                ..
            }
        ));
    }

    #[test]
    fn test_append_creates_sequence() {
        let mut doc = UserDataDocument::default();
        doc.append_ssh_key("ssh-ed25519 AAAA user@host").unwrap();

        assert_eq!(
            doc.to_cloud_config().unwrap(),
            "#cloud-config\nssh_authorized_keys:\n- ssh-ed25519 AAAA user@host\n"
        );
    }

    #[test]
    fn test_append_keeps_existing_order() {
        let mut doc =
            UserDataDocument::from_yaml("ssh_authorized_keys:\n  - first\n  - second\n").unwrap();
        doc.append_ssh_key("third").unwrap();

        let keys = doc.get(SSH_AUTHORIZED_KEYS_KEY).unwrap().as_sequence().unwrap();
        let keys: Vec<&str> = keys.iter().map(|k| k.as_str().unwrap()).collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_append_to_string_value_fails() {
        let mut doc = UserDataDocument::from_yaml("ssh_authorized_keys: ssh-rsa AAAA\n").unwrap();
        let err = doc.append_ssh_key("ssh-ed25519 BBBB").unwrap_err();

        assert!(matches!(
            err,
            CidataError::Schema {
                expected: "sequence",
                found: "string",
                ..
            }
        ));
        // Original value is untouched
        assert_eq!(
            doc.get(SSH_AUTHORIZED_KEYS_KEY).unwrap().as_str(),
            Some("ssh-rsa AAAA")
        );
    }

    #[test]
    fn test_set_password_overwrites() {
        let mut doc = UserDataDocument::from_yaml("password: plain\nlocale: C\n").unwrap();
        doc.set_password_hash("$2b$11$hash");

        assert_eq!(doc.get(PASSWORD_KEY).unwrap().as_str(), Some("$2b$11$hash"));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_round_trip_preserves_key_order() {
        let yaml = "timezone: UTC\nlocale: en_US.UTF-8\npackage_upgrade: true\n";
        let doc = UserDataDocument::from_yaml(yaml).unwrap();

        assert_eq!(
            doc.to_cloud_config().unwrap(),
            format!("{}\n{}", CLOUD_CONFIG_HEADER, yaml)
        );
    }

    #[test]
    fn test_render_starts_with_header() {
        let doc = UserDataDocument::from_yaml("a: 1\n").unwrap();
        let rendered = doc.to_cloud_config().unwrap();
        assert_eq!(rendered.lines().next(), Some(CLOUD_CONFIG_HEADER));
    }
}
