//! `modify-user-data`: set a password hash or add an SSH key on schema-less user-data

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use tracing::info;

use super::{CommandArgs, required};
use crate::CidataError;
use crate::cli::CommandKind;
use crate::password::{self, SecretSource, TerminalPrompt};
use crate::userdata::{self, UserDataDocument};

#[derive(Debug, Parser)]
#[command(name = "modify-user-data", about = "Modify user-data", disable_version_flag = true)]
pub struct ModifyUserDataArgs {
    /// Input user-data YAML file (required)
    #[arg(long = "in", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Output user-data YAML file (required)
    #[arg(long = "out", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Prompt for the default user's password
    #[arg(
        long = "passwd",
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub passwd: bool,

    /// Add this SSH public key file to ssh_authorized_keys
    #[arg(long = "pub-key", value_name = "PATH")]
    pub pub_key: Option<PathBuf>,
}

impl ModifyUserDataArgs {
    pub fn into_options(self) -> Result<ModifyUserData, CidataError> {
        let kind = Self::KIND;
        Ok(ModifyUserData {
            input: required(self.input, kind, "in")?,
            output: required(self.output, kind, "out")?,
            prompt_password: self.passwd,
            pub_key: self.pub_key,
        })
    }
}

impl CommandArgs for ModifyUserDataArgs {
    const KIND: CommandKind = CommandKind::ModifyUserData;

    fn execute(self) -> Result<(), CidataError> {
        self.into_options()?.run(&mut TerminalPrompt)
    }
}

/// Resolved `modify-user-data` options
#[derive(Debug, Clone)]
pub struct ModifyUserData {
    pub input: PathBuf,
    pub output: PathBuf,
    pub prompt_password: bool,
    pub pub_key: Option<PathBuf>,
}

impl ModifyUserData {
    /// Edit the input document and write the result
    ///
    /// The output file is only created once every edit has succeeded.
    pub fn run(&self, secrets: &mut dyn SecretSource) -> Result<(), CidataError> {
        let password = if self.prompt_password {
            Some(password::read_confirmed_password(secrets)?)
        } else {
            None
        };

        let mut doc = UserDataDocument::load(&self.input)?;

        if let Some(password) = password {
            doc.set_password_hash(password::hash_password(&password)?);
            info!("Set password hash");
        }

        if let Some(path) = &self.pub_key {
            let key = userdata::read_text(path)?;
            doc.append_ssh_key(key)?;
            info!("Added SSH public key from {}", path.display());
        }

        userdata::write_cloud_config(&self.output, &doc)?;
        info!("Wrote user-data to {}", self.output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::tests::ScriptedSecrets;
    use std::fs;
    use tempfile::TempDir;

    fn options(temp: &TempDir, passwd: bool, pub_key: Option<&str>) -> ModifyUserData {
        ModifyUserData {
            input: temp.path().join("user-data.in"),
            output: temp.path().join("user-data"),
            prompt_password: passwd,
            pub_key: pub_key.map(|name| temp.path().join(name)),
        }
    }

    #[test]
    fn test_required_flags() {
        let args = ModifyUserDataArgs::try_parse_from(["modify-user-data", "--out", "x"]).unwrap();
        assert!(matches!(
            args.into_options(),
            Err(CidataError::RequiredOption { option: "in", .. })
        ));

        let args = ModifyUserDataArgs::try_parse_from(["modify-user-data", "--in", "x"]).unwrap();
        assert!(matches!(
            args.into_options(),
            Err(CidataError::RequiredOption { option: "out", .. })
        ));
    }

    #[test]
    fn test_passwd_flag_forms() {
        let parse = |extra: &[&str]| {
            let argv = ["modify-user-data", "--in", "a", "--out", "b"];
            ModifyUserDataArgs::try_parse_from(argv.iter().chain(extra)).map(|args| args.passwd)
        };
        assert!(!parse(&[]).unwrap());
        assert!(parse(&["--passwd"]).unwrap());
        assert!(parse(&["--passwd=true"]).unwrap());
        assert!(!parse(&["--passwd=false"]).unwrap());
        assert!(parse(&["--passwd", "--pub-key", "k.pub"]).unwrap());
        assert!(parse(&["--passwd=maybe"]).is_err());
    }

    #[test]
    fn test_add_public_key() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("user-data.in"), "{}").unwrap();
        fs::write(temp.path().join("key.pub"), "ssh-ed25519 AAAA user@host").unwrap();

        let opts = options(&temp, false, Some("key.pub"));
        opts.run(&mut ScriptedSecrets::default()).unwrap();

        assert_eq!(
            fs::read_to_string(&opts.output).unwrap(),
            "#cloud-config\nssh_authorized_keys:\n- ssh-ed25519 AAAA user@host\n"
        );
    }

    #[test]
    fn test_password_prompt_retries_until_match() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("user-data.in"), "password: old\n").unwrap();

        let opts = options(&temp, true, None);
        let mut secrets = ScriptedSecrets::new(&["abc", "abd", "s3cret", "s3cret"]);
        opts.run(&mut secrets).unwrap();
        assert_eq!(secrets.prompts.len(), 4);

        let written = UserDataDocument::from_yaml(&fs::read_to_string(&opts.output).unwrap())
            .unwrap();
        let hash = written.get("password").unwrap().as_str().unwrap();
        assert_ne!(hash, "s3cret");
        assert!(bcrypt::verify("s3cret", hash).unwrap());
    }

    #[test]
    fn test_schema_error_writes_nothing() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("user-data.in"),
            "ssh_authorized_keys: not-a-list\n",
        )
        .unwrap();
        fs::write(temp.path().join("key.pub"), "ssh-ed25519 AAAA").unwrap();

        let opts = options(&temp, false, Some("key.pub"));
        let err = opts.run(&mut ScriptedSecrets::default()).unwrap_err();

        assert!(matches!(err, CidataError::Schema { .. }));
        assert!(!opts.output.exists());
    }

    #[test]
    fn test_missing_key_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("user-data.in"), "{}").unwrap();

        let opts = options(&temp, false, Some("missing.pub"));
        let err = opts.run(&mut ScriptedSecrets::default()).unwrap_err();
        assert!(matches!(err, CidataError::Read { .. }));
    }
}
