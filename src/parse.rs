// Copyright 2025 Pavel Roskin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Parsing terminfo database files
//!
//! Only the legacy format with 16-bit numbers is understood. Extended
//! (user-defined) capabilities following the string table are ignored.

use std::{
    collections::BTreeMap,
    io::{Cursor, Read},
};

use tracing::debug;

use crate::names::{BOOLEAN_NAMES, NUMBER_NAMES, STRING_NAMES};

const MAGIC: [u8; 2] = [0x1a, 0x01];
const HEADER_SIZE: u64 = 12;

const ABSENT_NUMBER: u16 = 0xffff;
/// Filler seen in some compiled entries, two ASCII `7` characters
const FILLER_NUMBER: u16 = 0x3737;

const ABSENT_STRING: u16 = 0xffff;
const CANCELED_STRING: u16 = 0xfffe;

/// Errors reported when parsing a terminfo database
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Not a terminfo database this parser understands
    #[error("Invalid terminfo format: {0}")]
    InvalidFormat(&'static str),
    /// A section extends past the end of the data
    #[error("Truncated terminfo data")]
    TruncatedData,
}

/// Parse terminfo database from the supplied buffer
///
/// Returns `TerminalEntry` instance with data populated from the buffer.
pub fn parse(buffer: &[u8]) -> Result<TerminalEntry, Error> {
    TerminalEntry::parse(buffer)
}

fn read_u8(reader: &mut impl Read) -> Result<u8, Error> {
    let mut buffer = [0u8; 1];
    reader
        .read_exact(&mut buffer)
        .map_err(|_| Error::TruncatedData)?;
    Ok(buffer[0])
}

fn read_le16(reader: &mut impl Read) -> Result<u16, Error> {
    let mut buffer = [0u8; 2];
    reader
        .read_exact(&mut buffer)
        .map_err(|_| Error::TruncatedData)?;
    Ok(u16::from_le_bytes(buffer))
}

fn read_slice<'a>(reader: &mut Cursor<&'a [u8]>, size: usize) -> Result<&'a [u8], Error> {
    let buffer: &'a [u8] = *reader.get_ref();
    let start = reader.position() as usize;
    let end = start.checked_add(size).ok_or(Error::TruncatedData)?;
    let slice = buffer.get(start..end).ok_or(Error::TruncatedData)?;
    reader.set_position(end as u64);
    Ok(slice)
}

/// Bytes from `offset` up to the next NUL
fn get_string(heap: &[u8], offset: usize) -> Result<&[u8], Error> {
    let Some(string_slice) = heap.get(offset..) else {
        return Err(Error::TruncatedData);
    };
    match string_slice.iter().position(|c| *c == b'\0') {
        Some(string_length) => Ok(&string_slice[..string_length]),
        None => Err(Error::TruncatedData),
    }
}

/// Convert ABSENT and CANCELED to None
const fn check_offset(offset: u16) -> Option<usize> {
    match offset {
        ABSENT_STRING | CANCELED_STRING => None,
        _ => Some(offset as usize),
    }
}

/// Skip a byte if needed to ensure 2-byte alignment
fn align_cursor(reader: &mut Cursor<&[u8]>) {
    let position = reader.position();
    if position & 1 == 1 {
        reader.set_position(position + 1);
    }
}

/// Split the name section into the primary name and the description
///
/// Aliases after the second `|` are dropped.
fn split_names(names: &[u8]) -> Result<(String, String), Error> {
    let names = names.strip_suffix(b"\0").unwrap_or(names);
    let mut tokens = names.split(|c| *c == b'|');
    let name = tokens.next().unwrap_or_default();
    if name.is_empty() {
        return Err(Error::InvalidFormat("empty terminal name"));
    }
    let description = tokens.next().unwrap_or_default();
    Ok((
        String::from_utf8_lossy(name).into_owned(),
        String::from_utf8_lossy(description).into_owned(),
    ))
}

/// Parsed terminfo entry
///
/// Immutable once parsed; share it freely between threads rendering
/// capabilities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalEntry {
    name: String,
    description: String,
    booleans: BTreeMap<&'static str, bool>,
    numbers: BTreeMap<&'static str, u16>,
    strings: BTreeMap<&'static str, Vec<u8>>,
}

impl TerminalEntry {
    /// Parse a compiled terminfo entry
    pub fn parse(buffer: &[u8]) -> Result<Self, Error> {
        let mut reader = Cursor::new(buffer);

        if read_slice(&mut reader, MAGIC.len())? != MAGIC {
            return Err(Error::InvalidFormat("unknown magic number"));
        }

        let name_size = usize::from(read_le16(&mut reader)?);
        let bool_size = usize::from(read_le16(&mut reader)?);
        let num_count = usize::from(read_le16(&mut reader)?);
        let str_count = usize::from(read_le16(&mut reader)?);
        debug!(name_size, bool_size, num_count, str_count, "terminfo header");

        // Only `bool_size - 1` flags are stored, the last declared byte is skipped.
        let bool_count = bool_size.saturating_sub(1);
        if bool_count > BOOLEAN_NAMES.len()
            || num_count > NUMBER_NAMES.len()
            || str_count > STRING_NAMES.len()
        {
            return Err(Error::InvalidFormat("more capabilities than known names"));
        }

        reader.set_position(HEADER_SIZE);
        let (name, description) = split_names(read_slice(&mut reader, name_size)?)?;

        let mut booleans = BTreeMap::new();
        let bool_start = reader.position();
        for cap_name in BOOLEAN_NAMES.iter().take(bool_count) {
            if read_u8(&mut reader)? != 0 {
                booleans.insert(*cap_name, true);
            }
        }
        reader.set_position(bool_start + bool_size as u64);
        align_cursor(&mut reader);

        let mut numbers = BTreeMap::new();
        for cap_name in NUMBER_NAMES.iter().take(num_count) {
            match read_le16(&mut reader)? {
                0 | ABSENT_NUMBER | FILLER_NUMBER => {}
                value => {
                    numbers.insert(*cap_name, value);
                }
            }
        }

        let str_offsets = read_slice(&mut reader, 2 * str_count)?;
        let mut str_offsets_reader = Cursor::new(str_offsets);
        let heap = buffer
            .get(reader.position() as usize..)
            .ok_or(Error::TruncatedData)?;

        let mut strings = BTreeMap::new();
        for cap_name in STRING_NAMES.iter().take(str_count) {
            let Some(offset) = check_offset(read_le16(&mut str_offsets_reader)?) else {
                continue;
            };
            strings.insert(*cap_name, get_string(heap, offset)?.to_vec());
        }

        debug!(
            %name,
            booleans = booleans.len(),
            numbers = numbers.len(),
            strings = strings.len(),
            "parsed terminfo entry"
        );

        Ok(Self {
            name,
            description,
            booleans,
            numbers,
            strings,
        })
    }

    /// Primary terminal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable description, empty if the entry has none
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the boolean capability is set
    pub fn flag(&self, name: &str) -> bool {
        self.booleans.get(name).copied().unwrap_or(false)
    }

    /// Value of the numeric capability
    ///
    /// A capability stored as zero is dropped during parsing, so `None`
    /// means "absent or zero". The two cannot be told apart.
    pub fn number(&self, name: &str) -> Option<u16> {
        self.numbers.get(name).copied()
    }

    /// Unexpanded template of the string capability
    pub fn string(&self, name: &str) -> Option<&[u8]> {
        self.strings.get(name).map(Vec::as_slice)
    }

    /// Boolean capabilities that are set
    pub const fn booleans(&self) -> &BTreeMap<&'static str, bool> {
        &self.booleans
    }

    /// Numeric capabilities, see [`TerminalEntry::number`] about zero values
    pub const fn numbers(&self) -> &BTreeMap<&'static str, u16> {
        &self.numbers
    }

    /// String capabilities
    pub const fn strings(&self) -> &BTreeMap<&'static str, Vec<u8>> {
        &self.strings
    }
}
