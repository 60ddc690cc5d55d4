//! Command dispatcher
//!
//! The first argument selects a subcommand; everything after it is parsed by
//! that subcommand's own flag set. Flags may be written Go-style with a single
//! dash (`-in file`) or with two (`--in file`).

use std::io::{self, Write};

use clap::CommandFactory;
use tracing::debug;

use crate::CidataError;
use crate::commands::{AddSshKeyArgs, CommandArgs, MakeIsoArgs, ModifyUserDataArgs};

/// Exit code on success
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for runtime failures
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for usage errors
pub const EXIT_USAGE: i32 = 2;

const DEFAULT_PROGRAM_NAME: &str = "cidata";

/// Subcommands, also used to tag which flag set a required option belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    ModifyUserData,
    AddSshKey,
    MakeIso,
}

impl CommandKind {
    pub const ALL: [CommandKind; 3] = [
        CommandKind::ModifyUserData,
        CommandKind::AddSshKey,
        CommandKind::MakeIso,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::ModifyUserData => "modify-user-data",
            CommandKind::AddSshKey => "add-ssh-key",
            CommandKind::MakeIso => "make-iso",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            CommandKind::ModifyUserData => "Modify user-data.",
            CommandKind::AddSshKey => "Add an SSH key pair to user-data.",
            CommandKind::MakeIso => "Make an ISO image.",
        }
    }

    /// Flag set of this subcommand, named as it is invoked
    fn command(&self, program: &str) -> clap::Command {
        let command = match self {
            CommandKind::ModifyUserData => ModifyUserDataArgs::command(),
            CommandKind::AddSshKey => AddSshKeyArgs::command(),
            CommandKind::MakeIso => MakeIsoArgs::command(),
        };
        command.bin_name(format!("{} {}", program, self.name()))
    }

    /// Help text of this subcommand
    pub fn usage(&self, program: &str) -> String {
        self.command(program).render_help().to_string()
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Top-level usage listing the subcommands
pub fn global_usage(program: &str) -> String {
    let mut usage = format!("Usage: {} <subcommand> [options]\n\nsubcommands:\n", program);
    for kind in CommandKind::ALL {
        usage.push_str(&format!("  {:<20}{}\n", kind.name(), kind.summary()));
    }
    usage.push_str(&format!(
        "\nRun {} <subcommand> -h to show help for subcommand.\n",
        program
    ));
    usage
}

/// Rewrite a single-dash long flag (`-in`, `-pub-key=x`) to clap's `--in` form
pub fn normalize_flag(arg: &str) -> String {
    let mut chars = arg.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some('-'), Some(c), Some(_)) if c.is_ascii_alphabetic() => format!("-{}", arg),
        _ => arg.to_string(),
    }
}

/// Normalize the flag-position tokens of `flags` for `command`
///
/// A value following a flag is joined to it (`-out -seed.iso` becomes
/// `--out=-seed.iso`) so values are never mistaken for flags. Flags whose
/// value must be attached with `=` (such as `-passwd=true`) consume nothing.
pub fn normalize_flags(command: &clap::Command, flags: &[String]) -> Vec<String> {
    let mut normalized = Vec::with_capacity(flags.len());
    let mut i = 0;
    while i < flags.len() {
        let token = &flags[i];
        i += 1;
        if token == "--" {
            normalized.extend(flags[i - 1..].iter().cloned());
            break;
        }
        let flag = normalize_flag(token);
        let takes_value = flag
            .strip_prefix("--")
            .filter(|name| !name.contains('='))
            .is_some_and(|name| takes_separate_value(command, name));
        match flags.get(i) {
            Some(value) if takes_value => {
                normalized.push(format!("{}={}", flag, value));
                i += 1;
            }
            _ => normalized.push(flag),
        }
    }
    normalized
}

fn takes_separate_value(command: &clap::Command, name: &str) -> bool {
    command
        .get_arguments()
        .find(|arg| arg.get_long() == Some(name))
        .is_some_and(|arg| arg.get_action().takes_values() && !arg.is_require_equals_set())
}

/// Run with the process's stdout and stderr
pub fn run(args: Vec<String>) -> i32 {
    run_with(args, &mut io::stdout(), &mut io::stderr())
}

/// Dispatch `args` (program name first) and return the process exit code
pub fn run_with(args: Vec<String>, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    let mut args = args.into_iter();
    let program = args
        .next()
        .unwrap_or_else(|| DEFAULT_PROGRAM_NAME.to_string());
    let rest: Vec<String> = args.collect();

    let Some(first) = rest.first() else {
        let _ = write!(stdout, "{}", global_usage(&program));
        return EXIT_USAGE;
    };
    if matches!(first.as_str(), "-h" | "-help" | "--help" | "help") {
        let _ = write!(stdout, "{}", global_usage(&program));
        return EXIT_SUCCESS;
    }
    let Some(kind) = CommandKind::from_name(first) else {
        let _ = write!(stdout, "{}", global_usage(&program));
        return EXIT_USAGE;
    };

    debug!("Running {}", kind);
    let flags = &rest[1..];
    let result = match kind {
        CommandKind::ModifyUserData => invoke::<ModifyUserDataArgs>(&program, flags),
        CommandKind::AddSshKey => invoke::<AddSshKeyArgs>(&program, flags),
        CommandKind::MakeIso => invoke::<MakeIsoArgs>(&program, flags),
    };

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(Failure::Flags(err)) => {
            let rendered = err.render();
            let _ = if err.use_stderr() {
                write!(stderr, "{}", rendered)
            } else {
                write!(stdout, "{}", rendered)
            };
            err.exit_code()
        }
        Err(Failure::Command(err)) => {
            let _ = writeln!(stderr, "Error: {}\n", err);
            if let CidataError::RequiredOption { command, .. } = &err {
                let _ = write!(stderr, "{}", command.usage(&program));
                return EXIT_USAGE;
            }
            EXIT_FAILURE
        }
    }
}

enum Failure {
    Flags(clap::Error),
    Command(CidataError),
}

/// Parse the flag set of `T` and run it
fn invoke<T: CommandArgs>(program: &str, flags: &[String]) -> Result<(), Failure> {
    let command = T::KIND.command(program);
    let argv = std::iter::once(T::KIND.name().to_string())
        .chain(normalize_flags(&command, flags))
        .collect::<Vec<_>>();
    let matches = command.try_get_matches_from(argv).map_err(Failure::Flags)?;
    let args = T::from_arg_matches(&matches).map_err(Failure::Flags)?;
    args.execute().map_err(Failure::Command)
}
