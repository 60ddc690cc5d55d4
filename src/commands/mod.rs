//! Subcommand handlers
//!
//! Each handler has a clap flag set (`*Args`) whose required flags are checked
//! by hand, so a missing flag surfaces as [`CidataError::RequiredOption`], and a
//! resolved options struct that performs the work.

pub mod add_ssh_key;
pub mod make_iso;
pub mod modify_user_data;

pub use add_ssh_key::{AddSshKey, AddSshKeyArgs};
pub use make_iso::{MakeIso, MakeIsoArgs};
pub use modify_user_data::{ModifyUserData, ModifyUserDataArgs};

use clap::Parser;

use crate::CidataError;
use crate::cli::CommandKind;

/// A parsed flag set that can run its subcommand
pub trait CommandArgs: Parser {
    const KIND: CommandKind;

    fn execute(self) -> Result<(), CidataError>;
}

/// Unwrap a required flag or report it as missing
pub(crate) fn required<T>(
    value: Option<T>,
    command: CommandKind,
    option: &'static str,
) -> Result<T, CidataError> {
    value.ok_or_else(|| CidataError::required(command, option))
}
