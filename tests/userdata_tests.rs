//! Tests for user-data editing

use cidata_tool::CidataError;
use cidata_tool::commands::ModifyUserData;
use cidata_tool::password::SecretSource;
use cidata_tool::userdata::{CLOUD_CONFIG_HEADER, UserDataDocument};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::fs;
use std::io;
use tempfile::TempDir;

/// Answers prompts from a fixed list
struct CannedSecrets(VecDeque<&'static str>);

impl SecretSource for CannedSecrets {
    fn read_secret(&mut self, _prompt: &str) -> io::Result<String> {
        self.0
            .pop_front()
            .map(String::from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "exhausted"))
    }
}

// ==================== Password ====================

/// Test a mismatched pair is retried and the stored value is a verifying hash
#[test]
fn test_password_confirmation_loop() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in.yaml");
    fs::write(&input, "#cloud-config\nchpasswd:\n  expire: false\n").unwrap();

    let opts = ModifyUserData {
        input,
        output: temp.path().join("out.yaml"),
        prompt_password: true,
        pub_key: None,
    };
    let mut secrets = CannedSecrets(VecDeque::from(["first", "second", "correct", "correct"]));
    opts.run(&mut secrets).unwrap();
    assert!(secrets.0.is_empty());

    let written = fs::read_to_string(&opts.output).unwrap();
    let doc = UserDataDocument::from_yaml(&written).unwrap();
    let hash = doc.get("password").unwrap().as_str().unwrap();
    assert!(bcrypt::verify("correct", hash).unwrap());
    assert!(!written.contains("correct"));
    // Existing keys survive
    assert!(doc.get("chpasswd").is_some());
}

/// Test a prompt failure aborts before any output is written
#[test]
fn test_password_prompt_failure() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in.yaml");
    fs::write(&input, "{}").unwrap();

    let opts = ModifyUserData {
        input,
        output: temp.path().join("out.yaml"),
        prompt_password: true,
        pub_key: None,
    };
    let err = opts.run(&mut CannedSecrets(VecDeque::new())).unwrap_err();

    assert!(matches!(err, CidataError::Prompt(_)));
    assert!(!opts.output.exists());
}

// ==================== Round trip ====================

/// Test re-serializing without edits only adds the header
#[test]
fn test_round_trip_adds_only_header() {
    let yaml = "hostname: vm\nusers:\n- name: ubuntu\n  shell: /bin/bash\nruncmd:\n- - echo\n  - hi\n";
    let doc = UserDataDocument::from_yaml(yaml).unwrap();
    let rendered = doc.to_cloud_config().unwrap();

    assert_eq!(rendered, format!("{}\n{}", CLOUD_CONFIG_HEADER, yaml));
}

proptest! {
    /// Appending keeps N existing keys in order and puts the new one last
    #[test]
    fn prop_append_preserves_order(
        existing in prop::collection::vec("ssh-rsa [A-Za-z0-9+/]{4,40}( [a-z]{1,8}@[a-z]{1,8})?", 0..8),
        new_key in "ssh-ed25519 [A-Za-z0-9+/]{8,40}",
    ) {
        let mut doc = UserDataDocument::default();
        for key in &existing {
            doc.append_ssh_key(key.clone()).unwrap();
        }

        let reparsed = UserDataDocument::from_yaml(&doc.to_cloud_config().unwrap()).unwrap();
        let mut doc = reparsed;
        doc.append_ssh_key(new_key.clone()).unwrap();

        let keys: Vec<String> = doc
            .get("ssh_authorized_keys")
            .unwrap()
            .as_sequence()
            .unwrap()
            .iter()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();

        prop_assert_eq!(keys.len(), existing.len() + 1);
        prop_assert_eq!(&keys[..existing.len()], &existing[..]);
        prop_assert_eq!(keys.last().unwrap(), &new_key);
    }

    /// Output always starts with the cloud-config header
    #[test]
    fn prop_header_first(key in "[a-z]{1,10}", value in "[a-zA-Z0-9]{0,20}") {
        let doc = UserDataDocument::from_yaml(&format!("{}: '{}'\n", key, value)).unwrap();
        let rendered = doc.to_cloud_config().unwrap();
        prop_assert_eq!(rendered.lines().next(), Some(CLOUD_CONFIG_HEADER));
    }
}
