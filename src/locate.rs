// Copyright 2025 Pavel Roskin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Search for terminfo database file for the terminal

use std::{
    env,
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

const LIB_TERMINFO: &str = "/lib/terminfo";
const USR_SHARE_LIB_TERMINFO: &str = "/usr/share/lib/terminfo";
const DEFAULT_TERMINFO: &str = "/usr/share/terminfo";

/// Errors reported when looking for a terminfo database file
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The terminal type is unset or empty
    #[error("Terminal type is not set")]
    MissingTerminalType,
    /// None of the candidate paths yielded a terminfo file
    #[error("Terminfo entry not found")]
    EntryNotFound,
}

/// Snapshot of everything that steers the search
///
/// Captured once so that the search itself never reads the process
/// environment. Empty variables are treated as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchEnvironment {
    /// Terminal type, normally `$TERM`
    pub term: Option<OsString>,
    /// Directory override, normally `$TERMINFO`
    pub terminfo: Option<PathBuf>,
    /// Home directory, the per-user `.terminfo` lives there
    pub home: Option<PathBuf>,
    /// Directory override, normally `$TERMINFO_DIRS`
    pub terminfo_dirs: Option<PathBuf>,
}

fn non_empty_var(name: &str) -> Option<OsString> {
    env::var_os(name).filter(|value| !value.is_empty())
}

impl SearchEnvironment {
    /// Environment with only the terminal type set
    pub fn new(term: impl Into<OsString>) -> Self {
        Self {
            term: Some(term.into()),
            ..Self::default()
        }
    }

    /// Capture `TERM`, `TERMINFO`, `TERMINFO_DIRS` and the home directory
    pub fn from_env() -> Self {
        Self {
            term: non_empty_var("TERM"),
            terminfo: non_empty_var("TERMINFO").map(PathBuf::from),
            home: env::home_dir().filter(|home| !home.as_os_str().is_empty()),
            terminfo_dirs: non_empty_var("TERMINFO_DIRS").map(PathBuf::from),
        }
    }

    fn term_name(&self) -> Result<&OsStr, Error> {
        match &self.term {
            Some(term) if !term.is_empty() => Ok(term),
            _ => Err(Error::MissingTerminalType),
        }
    }
}

/// Produces one candidate directory, or nothing if it does not apply
type Resolver = fn(&SearchEnvironment) -> Option<PathBuf>;

fn terminfo_override(env: &SearchEnvironment) -> Option<PathBuf> {
    env.terminfo.clone()
}

fn user_directory(env: &SearchEnvironment) -> Option<PathBuf> {
    env.home.as_ref().map(|home| home.join(".terminfo"))
}

// The whole value is one directory, it is not split on colons.
fn terminfo_dirs_override(env: &SearchEnvironment) -> Option<PathBuf> {
    env.terminfo_dirs.clone()
}

fn lib_terminfo(_: &SearchEnvironment) -> Option<PathBuf> {
    Some(PathBuf::from(LIB_TERMINFO))
}

fn usr_share_lib_terminfo(_: &SearchEnvironment) -> Option<PathBuf> {
    Some(PathBuf::from(USR_SHARE_LIB_TERMINFO))
}

fn default_terminfo(_: &SearchEnvironment) -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_TERMINFO))
}

/// Search order, first match wins
const RESOLVERS: [Resolver; 6] = [
    terminfo_override,
    user_directory,
    terminfo_dirs_override,
    lib_terminfo,
    usr_share_lib_terminfo,
    default_terminfo,
];

/// Source of terminfo file contents
///
/// The search only needs to know whether a candidate path yields bytes, so
/// tests can substitute an in-memory tree for the real filesystem.
pub trait EntrySource {
    /// Content of the file at `path`, `None` if there is no readable file
    fn read_entry(&self, path: &Path) -> Option<Vec<u8>>;
}

/// Reads candidates from the real filesystem
#[derive(Clone, Copy, Debug, Default)]
pub struct FileSystem;

impl EntrySource for FileSystem {
    fn read_entry(&self, path: &Path) -> Option<Vec<u8>> {
        match fs::read(path) {
            Ok(content) => Some(content),
            Err(err) => {
                trace!(path = %path.display(), %err, "candidate not readable");
                None
            }
        }
    }
}

/// Terminfo file found by [`locate_in`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatedEntry {
    pub path: PathBuf,
    pub content: Vec<u8>,
}

/// Returns all directories that are searched for terminfo files
///
/// This function does not attempt to verify if the directories to be searched actually exist.
pub fn search_directories(env: &SearchEnvironment) -> Vec<PathBuf> {
    RESOLVERS.iter().filter_map(|resolve| resolve(env)).collect()
}

/// Leaf directory named by a single byte, as `tic` creates it
#[cfg(unix)]
fn leaf_directory(first_byte: u8) -> OsString {
    use std::os::unix::ffi::OsStrExt;

    OsStr::from_bytes(&[first_byte]).to_os_string()
}

#[cfg(not(unix))]
fn leaf_directory(first_byte: u8) -> OsString {
    OsString::from(char::from(first_byte).to_string())
}

/// Standard layout - leaf directories use the first byte of the terminal name.
fn entry_path(term_name: &OsStr, dir: &Path) -> Result<PathBuf, Error> {
    let Some(first_byte) = term_name.as_encoded_bytes().first() else {
        return Err(Error::MissingTerminalType);
    };
    Ok(dir.join(leaf_directory(*first_byte)).join(term_name))
}

/// Candidate file paths for the terminal, in search order
pub fn candidates(env: &SearchEnvironment) -> Result<Vec<PathBuf>, Error> {
    let term_name = env.term_name()?;
    search_directories(env)
        .iter()
        .map(|dir| entry_path(term_name, dir))
        .collect()
}

/// Find terminfo database file for the terminal
///
/// Returns the path of the first candidate that can be read as a file.
pub fn locate(env: &SearchEnvironment) -> Result<PathBuf, Error> {
    locate_in(env, &FileSystem).map(|found| found.path)
}

/// Find and read terminfo database file for the terminal from `source`
pub fn locate_in(
    env: &SearchEnvironment,
    source: &impl EntrySource,
) -> Result<LocatedEntry, Error> {
    for path in candidates(env)? {
        if let Some(content) = source.read_entry(&path) {
            debug!(path = %path.display(), size = content.len(), "read terminfo entry");
            return Ok(LocatedEntry { path, content });
        }
    }
    Err(Error::EntryNotFound)
}
