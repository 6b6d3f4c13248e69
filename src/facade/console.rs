//! Text Command Console
//!
//! A small line-oriented command surface over [`MediaDir`], suitable
//! for driving from a control socket or stdin. Replies carry a numeric
//! code in the 9xx range: 900 for success, 901 for any failure.

use std::path::Path;

use tracing::info;

use crate::error::Error;

use super::{ImportOutcome, MediaDir};

/// Command completed.
pub const REPLY_OK: u16 = 900;
/// Command failed; the text carries the reason.
pub const REPLY_ERR: u16 = 901;

/// Outcome of one dispatched command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            code: REPLY_OK,
            text: text.into(),
        }
    }

    fn err(text: impl Into<String>) -> Self {
        Self {
            code: REPLY_ERR,
            text: text.into(),
        }
    }
}

/// Per-command usage strings, in presentation order.
pub fn help_pages() -> &'static [&'static str] {
    &[
        "BALANCE\n    Force a rebuild of the volume partition table.",
        "REGISTER <path>\n    Place a new recording path on its assigned volume.",
        "IMPORT_ONE <path>\n    Import the first recording directory found under <path>.",
        "IMPORT_ONE_DRYRUN <path>\n    Show what IMPORT_ONE would do, without touching anything.",
        "IMPORT_NEXT <path>\n    Name the directory the next IMPORT_ONE would pick up.",
        "DEBUG\n    Toggle verbose operation tracing.",
        "HELP\n    List the available commands.",
    ]
}

/// Parse and execute one command line against the façade.
///
/// The command word is case-insensitive; everything after it is the
/// (single) argument. Unknown commands and failed operations reply with
/// [`REPLY_ERR`] and never panic.
pub fn dispatch(dir: &MediaDir, line: &str) -> Reply {
    let line = line.trim();
    let (command, option) = match line.split_once(char::is_whitespace) {
        Some((c, o)) => (c.to_ascii_uppercase(), o.trim()),
        None => (line.to_ascii_uppercase(), ""),
    };

    info!(command = %command, option = %option, "console command");

    match command.as_str() {
        "BALANCE" => match dir.balance(true) {
            Ok(_) => Reply::ok("BALANCE"),
            Err(e) => Reply::err(e.to_string()),
        },
        "REGISTER" => match require_arg(&command, option) {
            Err(e) => Reply::err(e.to_string()),
            Ok(path) => match dir.register(Path::new(path)) {
                Ok(target) => Reply::ok(format!("REGISTER {} -> {}", path, target.display())),
                Err(e) => Reply::err(e.to_string()),
            },
        },
        "IMPORT_ONE" => import_reply(dir, &command, option, false),
        "IMPORT_ONE_DRYRUN" => import_reply(dir, &command, option, true),
        "IMPORT_NEXT" => match require_arg(&command, option) {
            Err(e) => Reply::err(e.to_string()),
            Ok(path) => match dir.import_next(Path::new(path)) {
                Some(name) => Reply::ok(name),
                None => Reply::err(format!("nothing to import under {}", path)),
            },
        },
        "DEBUG" => {
            if dir.toggle_debug() {
                Reply::ok("DEBUG=ON")
            } else {
                Reply::ok("DEBUG=OFF")
            }
        }
        "HELP" => Reply::ok(help_pages().join("\n")),
        _ => Reply::err(Error::UnknownCommand(command).to_string()),
    }
}

fn require_arg<'a>(command: &str, option: &'a str) -> crate::error::Result<&'a str> {
    if option.is_empty() {
        Err(Error::MissingArgument {
            command: command.to_string(),
        })
    } else {
        Ok(option)
    }
}

fn import_reply(dir: &MediaDir, command: &str, option: &str, dry_run: bool) -> Reply {
    let path = match require_arg(command, option) {
        Ok(p) => p,
        Err(e) => return Reply::err(e.to_string()),
    };
    match dir.import(Path::new(path), true, dry_run) {
        Ok(ImportOutcome::Enqueued(names)) if names.is_empty() => {
            Reply::err(format!("nothing to import under {}", path))
        }
        Ok(ImportOutcome::Enqueued(names)) => {
            Reply::ok(format!("IMPORT {}", names.join(", ")))
        }
        Ok(ImportOutcome::DryRun(report)) if report.actions.is_empty() => {
            Reply::err(format!("nothing to import under {}", path))
        }
        Ok(ImportOutcome::DryRun(report)) => match serde_json::to_string_pretty(&report) {
            Ok(json) => Reply::ok(json),
            Err(e) => Reply::err(e.to_string()),
        },
        Err(e) => Reply::err(e.to_string()),
    }
}
