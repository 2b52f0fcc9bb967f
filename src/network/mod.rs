//! Network device support: platforms, configuration normalization, command
//! rendering and the device session wrapper.
//!
//! # Normalization
//!
//! [`normalize`] turns the raw text printed by `show running-config` (or
//! `show configuration` on Junos) into a [`ConfigSnapshot`]. Each platform has
//! its own parsing strategy:
//!
//! - IOS, EOS and NX-OS print indented lines; indentation gives the nesting.
//! - Junos prints braces and semicolons, or `set` statements when the output
//!   was piped through `display set`.
//!
//! All strategies feed the same classification step, which assigns each
//! statement a [`StatementPath`](crate::snapshot::StatementPath) and body.
//! Equivalent configurations produce identical statement sets regardless of
//! whitespace, comments or vendor banners.
//!
//! ```rust,ignore
//! use netdrift::network::{normalize, Platform};
//!
//! let snapshot = normalize("core-1", Platform::Ios, &running, Some(&version))?;
//! for statement in &snapshot.statements {
//!     println!("{} = {}", statement.path, statement.body);
//! }
//! ```

mod classify;
pub mod device;
pub mod facts;
mod indented;
pub mod interfaces;
mod junos;
pub mod platform;
pub mod render;

pub use device::NetworkDevice;
pub use facts::extract_facts;
pub use interfaces::parse_interfaces;
pub use platform::Platform;
pub use render::{render_commands, render_delta, render_removals};

use crate::snapshot::{ConfigSnapshot, Statement, StatementPath};
use thiserror::Error;

/// Errors produced while normalizing device output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input contained no configuration statements.
    #[error("no configuration statements found")]
    Empty,

    /// A line could not be understood.
    #[error("line {line}: {message}")]
    Malformed {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Two statements normalized to the same path.
    #[error("line {line}: duplicate statement '{path}' (first seen on line {first_line})")]
    DuplicatePath {
        /// Line of the second occurrence
        line: usize,
        /// Line of the first occurrence
        first_line: usize,
        /// Rendered path
        path: String,
    },
}

impl ParseError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }
}

/// Raw statement produced by a platform parser, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawStatement {
    pub line: usize,
    pub parents: Vec<String>,
    pub text: String,
    pub shape: RawShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawShape {
    /// A single configuration line
    Line,
    /// Header of a nested block
    Section,
    /// Multi-line literal such as a banner, kept verbatim
    Literal { body: String },
}

/// Parse configuration text into sorted, path-unique statements.
pub fn parse_statements(platform: Platform, text: &str) -> Result<Vec<Statement>, ParseError> {
    if let Some(index) = text.lines().position(|l| l.contains('\0')) {
        return Err(ParseError::malformed(index + 1, "line contains a null character"));
    }

    let raw = match platform {
        Platform::Ios => indented::parse(text, &indented::IOS)?,
        Platform::Eos => indented::parse(text, &indented::EOS)?,
        Platform::Nxos => indented::parse(text, &indented::NXOS)?,
        Platform::Junos => junos::parse(text)?,
    };

    let negation = platform.is_line_oriented().then_some("no");
    let statements = classify::collect(raw, &platform.keyed_settings(), negation)?;
    if statements.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(statements)
}

/// Parse Junos `delete` lines into the paths they remove.
///
/// Used when deriving expectations from a command plan; running
/// configuration output never contains deletions.
pub fn parse_deletions(platform: Platform, text: &str) -> Vec<StatementPath> {
    if platform != Platform::Junos {
        return Vec::new();
    }
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("delete "))
        .map(|rest| StatementPath::new(rest.split_whitespace()))
        .collect()
}

/// Normalize raw device output into a snapshot.
///
/// `version_output` is the text of `show version`, used only for facts.
pub fn normalize(
    device: &str,
    platform: Platform,
    running: &str,
    version_output: Option<&str>,
) -> Result<ConfigSnapshot, ParseError> {
    let statements = parse_statements(platform, running)?;

    let mut facts = version_output
        .map(|output| extract_facts(platform, output))
        .unwrap_or_default();
    facts.insert("platform".to_string(), platform.to_string());
    if !facts.contains_key("hostname") {
        let hostname_path = match platform {
            Platform::Junos => StatementPath::new(["system", "host-name"]),
            _ => StatementPath::new(["hostname"]),
        };
        if let Some(stmt) = statements.iter().find(|s| s.path == hostname_path) {
            facts.insert("hostname".to_string(), stmt.body.clone());
        }
    }

    Ok(ConfigSnapshot::new(device, platform, statements).with_facts(facts))
}
