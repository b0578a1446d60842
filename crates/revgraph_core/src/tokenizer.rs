//! Command line splitting for subprocess invocation.
//!
//! Commands are built as plain strings and split here into an argument
//! vector, so arguments containing spaces must be quoted. Besides single and
//! double quotes, [`QUOTE_CHAR`] wraps a whole pre-quoted argument such as a
//! commit message that itself contains quotes.

use crate::error::{RevError, Result};
use tracing::warn;

/// Internal delimiter for arguments that contain quotes of their own.
pub const QUOTE_CHAR: char = '$';

/// Placeholder separators, tried in order.
const SEPARATOR_CANDIDATES: [char; 5] = ['#', '%', '&', '!', '?'];

/// Splits a command line into arguments.
///
/// Quoted spans survive as single arguments with their enclosing quotes
/// removed. A quote character only opens a span when it occurs an even number
/// of times in the whole command.
///
/// # Errors
///
/// Returns `RevError::TokenizeFailure` when quoting is present and every
/// placeholder separator candidate already occurs in the command.
///
/// # Examples
///
/// ```
/// use revgraph_core::tokenize;
///
/// let args = tokenize(r#"cmd arg1 "some thing" v='some value'"#).unwrap();
/// assert_eq!(args, ["cmd", "arg1", "some thing", "v='some value'"]);
/// ```
pub fn tokenize(command: &str) -> Result<Vec<String>> {
    if !command.contains([QUOTE_CHAR, '"', '\'']) {
        return Ok(command.split_whitespace().map(String::from).collect());
    }

    let sep = SEPARATOR_CANDIDATES
        .iter()
        .copied()
        .find(|c| !command.contains(*c))
        .ok_or_else(|| {
            warn!(command, "no unique separator found");
            RevError::TokenizeFailure {
                command: command.to_string(),
            }
        })?;

    let mut chars: Vec<char> = command
        .chars()
        .map(|c| if c.is_whitespace() { sep } else { c })
        .collect();

    restore_spaces(&mut chars, sep);

    let joined: String = chars.into_iter().filter(|c| *c != QUOTE_CHAR).collect();

    Ok(joined
        .split(sep)
        .filter(|arg| !arg.is_empty())
        .map(strip_outer_quotes)
        .collect())
}

/// Turns separators inside quoted spans back into spaces.
fn restore_spaces(chars: &mut [char], sep: char) {
    let balanced = |q: char| chars.iter().filter(|c| **c == q).count() % 2 == 0;
    let openers: Vec<char> = [QUOTE_CHAR, '"', '\'']
        .into_iter()
        .filter(|q| balanced(*q))
        .collect();

    let mut open: Option<char> = None;
    for c in chars.iter_mut() {
        match open {
            None if openers.contains(c) => open = Some(*c),
            Some(q) if *c == q => open = None,
            Some(_) if *c == sep => *c = ' ',
            _ => {}
        }
    }
}

fn strip_outer_quotes(arg: &str) -> String {
    let bytes = arg.as_bytes();
    let quoted = bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0];
    if quoted {
        arg[1..arg.len() - 1].to_string()
    } else {
        arg.to_string()
    }
}
