// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command line assembly
//!
//! Every argument is wrapped in double quotes with inner double quotes
//! backslash-escaped. The bare pipe and background tokens `|` and `&` pass
//! through unquoted so callers can build pipelines and detach; nothing else
//! gets through the assembly layer unquoted.

use crate::Redirect;

/// Quote a single argument for a POSIX shell command line.
pub fn quote(arg: &str) -> String {
    let trimmed = arg.trim();
    if trimmed == "|" || trimmed == "&" {
        return trimmed.to_string();
    }

    format!("\"{}\"", arg.replace('"', "\\\""))
}

/// Join an argument vector into one quoted command line.
pub fn join(args: &[&str]) -> String {
    args.iter()
        .map(|arg| quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Assemble the full line sent to the host shell.
///
/// The command is prefixed with `cd "<cwd>" && ` when a working directory
/// is given, and suffixed with ` > "<path>"` or ` >> "<path>"` when stdout
/// redirection is requested. The redirection suffix is how small text files
/// (state snapshots, run scripts) are written remotely without a transfer
/// channel.
pub fn assemble(args: &[&str], cwd: Option<&str>, redirect: Option<Redirect<'_>>) -> String {
    let mut line = match cwd {
        Some(cwd) => format!("cd {} && {}", quote(cwd), join(args)),
        None => join(args),
    };

    if let Some(redirect) = redirect {
        line.push_str(if redirect.append { " >> " } else { " > " });
        line.push_str(&quote(redirect.path));
    }

    line
}

#[cfg(test)]
#[path = "quote_tests.rs"]
mod tests;
