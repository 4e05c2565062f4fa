// Copyright 2025 Pavel Roskin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Locate, decode and execute compiled terminfo entries
//!
//! ```no_run
//! use terminfo_exec::{SearchEnvironment, Value, load};
//!
//! let entry = load(&SearchEnvironment::from_env())?;
//! let sequence = entry.render("setab", &[Value::from(5)])?;
//! # Ok::<(), terminfo_exec::Error>(())
//! ```

pub mod expand;
pub mod locate;
pub mod names;
pub mod parse;

pub use expand::{ExpandContext, ExpandOptions, Value, expand, render};
pub use locate::{
    EntrySource, FileSystem, LocatedEntry, SearchEnvironment, locate, locate_in,
    search_directories,
};
pub use parse::{TerminalEntry, parse};

use tracing::debug;

/// Any error reported by this crate
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Locate(#[from] locate::Error),
    #[error(transparent)]
    Parse(#[from] parse::Error),
    #[error(transparent)]
    Expand(#[from] expand::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Find and decode the entry for the terminal described by `env`
pub fn load(env: &SearchEnvironment) -> Result<TerminalEntry, Error> {
    let located = locate_in(env, &FileSystem)?;
    let entry = parse(&located.content)?;
    debug!(path = %located.path.display(), terminal = entry.name(), "loaded terminal entry");
    Ok(entry)
}

impl TerminalEntry {
    /// Load the entry for the current terminal from the process environment
    pub fn from_env() -> Result<Self, Error> {
        load(&SearchEnvironment::from_env())
    }
}
