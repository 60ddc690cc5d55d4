//! Password input and hashing
//!
//! Secrets are read twice without echo until both entries match, then hashed
//! with bcrypt before they are written into user-data.

use std::io::{self, Write};

use tracing::warn;

use crate::CidataError;

/// bcrypt work factor for the default user's password
pub const BCRYPT_COST: u32 = 11;

const PASSWORD_PROMPT: &str = "Password: ";
const CONFIRM_PROMPT: &str = "Confirm password: ";

/// Source of secret input
pub trait SecretSource {
    /// Show `prompt` and read one secret line
    fn read_secret(&mut self, prompt: &str) -> io::Result<String>;
}

/// Reads secrets from the controlling terminal with echo disabled
///
/// The prompt goes to stdout; input always comes from the terminal even when
/// stdin is redirected.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl SecretSource for TerminalPrompt {
    fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        rpassword::read_password()
    }
}

/// Prompt for a password and its confirmation until both match
pub fn read_confirmed_password(source: &mut dyn SecretSource) -> Result<String, CidataError> {
    loop {
        let first = source.read_secret(PASSWORD_PROMPT).map_err(CidataError::Prompt)?;
        let second = source.read_secret(CONFIRM_PROMPT).map_err(CidataError::Prompt)?;

        if first.as_bytes() == second.as_bytes() {
            return Ok(first);
        }
        warn!("Passwords do not match, try again");
    }
}

/// Hash a password with bcrypt at [`BCRYPT_COST`]
pub fn hash_password(password: &str) -> Result<String, CidataError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}
