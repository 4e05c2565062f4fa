// Copyright 2019 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Parameterized string expansion
//!
//! Templates are interpreted one byte at a time by a small stack machine.
//! Every call owns its stack and dynamic variables; static variables are
//! reset per call unless [`StaticVariables::Persistent`] is selected.

use std::iter::repeat_n;

use tracing::trace;

use crate::parse::TerminalEntry;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum States {
    Literal,
    /// `$` seen while stripping padding, `true` once inside `$<...>`
    Padding(bool),
    Percent,
    /// Skipping the "then" part of a false conditional, with nesting depth
    SkipThen(usize),
    SkipThenPercent(usize),
    /// Skipping the "else" part after a taken branch, with nesting depth
    SkipElse(usize),
    SkipElsePercent(usize),
    PushPositional,
    SetVariable,
    GetVariable,
    CharLiteralStart,
    CharLiteralEnd,
    IntegerLiteral(Option<i32>),
    FormatFlags,
}

#[derive(Copy, PartialEq, Eq, Clone)]
enum FormatState {
    Flags,
    Width,
    Precision,
}

/// Types of values on the stack and of capability arguments
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Integer(i32),
    Text(Vec<u8>),
}

impl Value {
    /// Length of the value printed as text
    fn text_len(&self) -> usize {
        match self {
            Self::Integer(value) => value.to_string().len(),
            Self::Text(text) => text.len(),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Text(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(value: &[u8; N]) -> Self {
        Self::Text(value.to_vec())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Text(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value.into_bytes())
    }
}

/// Errors reported when expanding a string
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("Capability {0} is not supported by the terminal")]
    UnsupportedCapability(String),
    #[error("Not enough stack elements for operator {0}")]
    StackUnderflow(char),
    /// `None` if the template ends right after `%p`
    #[error("No argument for parameter {}", describe(.0))]
    MissingArgument(Option<char>),
    #[error("Malformed literal")]
    MalformedLiteral,
    /// `None` if the template ends right after `%P` or `%g`
    #[error("Invalid variable name: {}", describe(.0))]
    InvalidVariableName(Option<char>),
    #[error("Parameter type not expected by operator {0}")]
    TypeMismatch(char),
    #[error("Unrecognized directive: {0}")]
    UnrecognizedDirective(char),
}

// thiserror hands fields over by reference
#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
fn describe(name: &Option<char>) -> String {
    name.map_or_else(|| "end of template".to_owned(), String::from)
}

/// What ends a `%:` format specification
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatTermination {
    /// The next `%` applies the collected format, the conversion letter only
    /// selects the base
    #[default]
    Percent,
    /// The conversion letter applies the format, like `printf`; flags may
    /// also follow `%` directly without `:`
    Conversion,
}

/// Lifetime of the static variables `A`-`Z`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StaticVariables {
    /// Cleared at the start of every expansion
    #[default]
    ResetPerCall,
    /// Kept in the [`ExpandContext`] between successful expansions, as
    /// ncurses does for one terminal
    Persistent,
}

/// Handling of directives the interpreter does not know
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DirectivePolicy {
    #[default]
    Ignore,
    Reject,
}

/// Operand order of `%-`, `%/`, `%m` and the other binary arithmetic
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OperandOrder {
    /// `first popped <op> second popped`
    #[default]
    PopOrder,
    /// `second popped <op> first popped`, as in ncurses
    Conventional,
}

/// Handling of `$<..>` padding specifications
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Padding {
    /// Copied to the output like any literal text
    #[default]
    Emit,
    Strip,
}

/// Interpreter behavior switches
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    pub format_termination: FormatTermination,
    pub static_variables: StaticVariables,
    pub unknown_directives: DirectivePolicy,
    pub operand_order: OperandOrder,
    pub padding: Padding,
}

/// Context for variable expansion
///
/// Holds the options and, with [`StaticVariables::Persistent`], the static
/// variables. Use one context per terminal to get ncurses-like persistence.
#[derive(Clone, Debug)]
pub struct ExpandContext {
    options: ExpandOptions,
    /// Static variables A-Z
    static_variables: [i32; 26],
}

impl ExpandContext {
    /// Return a newly initialized `ExpandContext` with default options
    pub fn new() -> Self {
        Self::with_options(ExpandOptions::default())
    }

    pub const fn with_options(options: ExpandOptions) -> Self {
        Self {
            options,
            static_variables: [0; 26],
        }
    }

    pub const fn options(&self) -> ExpandOptions {
        self.options
    }

    /// Expand a parameterized capability
    ///
    /// # Arguments
    /// * `cap`    - string to expand
    /// * `params` - vector of params for %p1 etc
    pub fn expand(&mut self, cap: &[u8], params: &[Value]) -> Result<Vec<u8>, Error> {
        let static_variables = match self.options.static_variables {
            StaticVariables::ResetPerCall => [0; 26],
            StaticVariables::Persistent => self.static_variables,
        };
        let mut interpreter = Interpreter::new(self.options, params, static_variables, cap.len());
        for &c in cap {
            interpreter.step(c)?;
        }
        interpreter.finish()?;
        self.static_variables = interpreter.static_variables;
        Ok(interpreter.output)
    }

    /// Expand the string capability `name` of `entry`
    pub fn render(
        &mut self,
        entry: &TerminalEntry,
        name: &str,
        params: &[Value],
    ) -> Result<Vec<u8>, Error> {
        let Some(cap) = entry.string(name) else {
            trace!(capability = name, terminal = entry.name(), "capability not supported");
            return Err(Error::UnsupportedCapability(name.to_owned()));
        };
        self.expand(cap, params)
    }
}

impl Default for ExpandContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand a template with default options
pub fn expand(cap: &[u8], params: &[Value]) -> Result<Vec<u8>, Error> {
    ExpandContext::new().expand(cap, params)
}

/// Expand the string capability `name` of `entry` with default options
pub fn render(entry: &TerminalEntry, name: &str, params: &[Value]) -> Result<Vec<u8>, Error> {
    ExpandContext::new().render(entry, name, params)
}

impl TerminalEntry {
    /// Expand the string capability `name` with default options
    pub fn render(&self, name: &str, params: &[Value]) -> Result<Vec<u8>, Error> {
        render(self, name, params)
    }
}

enum Slot {
    Static(usize),
    Dynamic(usize),
}

fn variable_slot(name: char) -> Result<Slot, Error> {
    match name {
        'A'..='Z' => Ok(Slot::Static(name as usize - 'A' as usize)),
        'a'..='z' => Ok(Slot::Dynamic(name as usize - 'a' as usize)),
        _ => Err(Error::InvalidVariableName(Some(name))),
    }
}

/// State of a single expansion
struct Interpreter {
    options: ExpandOptions,
    /// Local copy of the arguments, `%i` modifies them
    params: Vec<Value>,
    stack: Vec<Value>,
    static_variables: [i32; 26],
    dynamic_variables: [i32; 26],
    state: States,
    /// Flags, width and precision collected after `%:`
    format: String,
    conversion: Option<char>,
    output: Vec<u8>,
}

impl Interpreter {
    fn new(
        options: ExpandOptions,
        params: &[Value],
        static_variables: [i32; 26],
        capacity: usize,
    ) -> Self {
        Self {
            options,
            params: params.to_vec(),
            stack: Vec::new(),
            static_variables,
            dynamic_variables: [0; 26],
            state: States::Literal,
            format: String::new(),
            conversion: None,
            // expanded cap will only rarely be larger than the cap itself
            output: Vec::with_capacity(capacity),
        }
    }

    fn step(&mut self, c: u8) -> Result<(), Error> {
        let cur = c as char;
        self.state = match self.state {
            States::Literal => self.literal(c),
            States::Padding(false) => {
                if c == b'<' {
                    States::Padding(true)
                } else {
                    self.output.push(b'$');
                    self.literal(c)
                }
            }
            States::Padding(true) => {
                if c == b'>' {
                    States::Literal
                } else {
                    States::Padding(true)
                }
            }
            States::Percent => self.directive(cur)?,
            States::PushPositional => {
                self.push_positional(cur)?;
                States::Literal
            }
            States::SetVariable => {
                let slot = variable_slot(cur)?;
                let value = self.pop_integer('P')?;
                match slot {
                    Slot::Static(index) => self.static_variables[index] = value,
                    Slot::Dynamic(index) => self.dynamic_variables[index] = value,
                }
                States::Literal
            }
            States::GetVariable => {
                let value = match variable_slot(cur)? {
                    Slot::Static(index) => self.static_variables[index],
                    Slot::Dynamic(index) => self.dynamic_variables[index],
                };
                self.stack.push(Value::Integer(value));
                States::Literal
            }
            States::CharLiteralStart => {
                self.stack.push(Value::Integer(i32::from(c)));
                States::CharLiteralEnd
            }
            States::CharLiteralEnd => {
                if cur != '\'' {
                    return Err(Error::MalformedLiteral);
                }
                States::Literal
            }
            States::IntegerLiteral(value) => match cur {
                '}' => {
                    let value = value.ok_or(Error::MalformedLiteral)?;
                    self.stack.push(Value::Integer(value));
                    States::Literal
                }
                '0'..='9' => {
                    let value = value
                        .unwrap_or(0)
                        .checked_mul(10)
                        .and_then(|value| value.checked_add(i32::from(c - b'0')))
                        .ok_or(Error::MalformedLiteral)?;
                    States::IntegerLiteral(Some(value))
                }
                _ => return Err(Error::MalformedLiteral),
            },
            States::FormatFlags => self.format_flag(cur)?,
            States::SkipThen(level) => {
                if cur == '%' {
                    States::SkipThenPercent(level)
                } else {
                    States::SkipThen(level)
                }
            }
            States::SkipThenPercent(level) => match cur {
                ';' | 'e' if level == 0 => States::Literal,
                ';' => States::SkipThen(level - 1),
                '?' => States::SkipThen(level + 1),
                _ => States::SkipThen(level),
            },
            States::SkipElse(level) => {
                if cur == '%' {
                    States::SkipElsePercent(level)
                } else {
                    States::SkipElse(level)
                }
            }
            States::SkipElsePercent(level) => match cur {
                ';' if level == 0 => States::Literal,
                ';' => States::SkipElse(level - 1),
                '?' => States::SkipElse(level + 1),
                _ => States::SkipElse(level),
            },
        };
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Error> {
        match self.state {
            States::Padding(false) => self.output.push(b'$'),
            States::CharLiteralStart | States::CharLiteralEnd | States::IntegerLiteral(_) => {
                return Err(Error::MalformedLiteral);
            }
            States::PushPositional => return Err(Error::MissingArgument(None)),
            States::SetVariable | States::GetVariable => {
                return Err(Error::InvalidVariableName(None));
            }
            States::FormatFlags
                if self.options.format_termination == FormatTermination::Percent =>
            {
                self.apply_format()?;
            }
            _ => {}
        }
        Ok(())
    }

    fn literal(&mut self, c: u8) -> States {
        match c {
            b'%' => States::Percent,
            b'$' if self.options.padding == Padding::Strip => States::Padding(false),
            _ => {
                self.output.push(c);
                States::Literal
            }
        }
    }

    /// Execute the character following `%`
    fn directive(&mut self, cur: char) -> Result<States, Error> {
        match cur {
            '%' => self.output.push(b'%'),
            'c' => match self.pop_integer(cur)? {
                // if c is 0, use 0200 (128) for ncurses compatibility
                0 => self.output.push(128u8),
                // Don't check bounds. ncurses just casts and truncates.
                c => self.output.push(c as u8),
            },
            'p' => return Ok(States::PushPositional),
            'P' => return Ok(States::SetVariable),
            'g' => return Ok(States::GetVariable),
            '\'' => return Ok(States::CharLiteralStart),
            '{' => return Ok(States::IntegerLiteral(None)),
            'l' => {
                let value = self.pop(cur)?;
                self.stack.push(Value::Integer(value.text_len() as i32));
            }
            '+' | '-' | '*' | '/' | 'm' | '&' | '|' | '^' => self.arithmetic(cur)?,
            '=' | '<' | '>' | 'A' | 'O' => self.comparison(cur)?,
            '!' => {
                let value = self.pop_integer(cur)?;
                self.stack.push(Value::Integer(i32::from(value == 0)));
            }
            '~' => {
                let value = self.pop_integer(cur)?;
                self.stack.push(Value::Integer(!value));
            }
            'i' => {
                for param in self.params.iter_mut().take(2) {
                    match param {
                        Value::Integer(value) => *value = value.wrapping_add(1),
                        Value::Text(_) => return Err(Error::TypeMismatch(cur)),
                    }
                }
            }

            // printf-style support for %doxXs
            'd' | 'o' | 'x' | 'X' | 's' => {
                let arg = self.pop(cur)?;
                let result = format(arg, cur, Flags::default())?;
                self.output.extend(result);
            }
            ':' => return Ok(self.begin_format(None)),
            '#' | ' ' | '.' | '0'..='9'
                if self.options.format_termination == FormatTermination::Conversion =>
            {
                return Ok(self.begin_format(Some(cur)));
            }

            // conditionals
            '?' | ';' => (),
            't' => {
                if self.pop_integer(cur)? == 0 {
                    return Ok(States::SkipThen(0));
                }
            }
            'e' => return Ok(States::SkipElse(0)),
            _ => self.unknown_directive(cur)?,
        }
        Ok(States::Literal)
    }

    fn unknown_directive(&self, cur: char) -> Result<(), Error> {
        match self.options.unknown_directives {
            DirectivePolicy::Ignore => {
                trace!(directive = %cur.escape_debug(), "ignoring unknown directive");
                Ok(())
            }
            DirectivePolicy::Reject => Err(Error::UnrecognizedDirective(cur)),
        }
    }

    fn pop(&mut self, op: char) -> Result<Value, Error> {
        self.stack.pop().ok_or(Error::StackUnderflow(op))
    }

    fn pop_integer(&mut self, op: char) -> Result<i32, Error> {
        match self.pop(op)? {
            Value::Integer(value) => Ok(value),
            Value::Text(_) => Err(Error::TypeMismatch(op)),
        }
    }

    fn push_positional(&mut self, cur: char) -> Result<(), Error> {
        // params are 1-indexed
        let index = match cur {
            '1'..='9' => cur as usize - '1' as usize,
            _ => return Err(Error::MissingArgument(Some(cur))),
        };
        let Some(value) = self.params.get(index) else {
            return Err(Error::MissingArgument(Some(cur)));
        };
        self.stack.push(value.clone());
        Ok(())
    }

    fn arithmetic(&mut self, op: char) -> Result<(), Error> {
        let first = self.pop_integer(op)?;
        let second = self.pop_integer(op)?;
        let (x, y) = match self.options.operand_order {
            OperandOrder::PopOrder => (first, second),
            OperandOrder::Conventional => (second, first),
        };
        let result = match op {
            '+' => x.wrapping_add(y),
            '-' => x.wrapping_sub(y),
            '*' => x.wrapping_mul(y),
            // ncurses yields 0 when dividing by zero
            '/' => x.checked_div(y).unwrap_or(0),
            'm' => x.checked_rem(y).unwrap_or(0),
            '&' => x & y,
            '|' => x | y,
            '^' => x ^ y,
            _ => unreachable!("logic error"),
        };
        self.stack.push(Value::Integer(result));
        Ok(())
    }

    /// Comparisons always test `second popped <op> first popped`
    fn comparison(&mut self, op: char) -> Result<(), Error> {
        let y = self.pop_integer(op)?;
        let x = self.pop_integer(op)?;
        let result = match op {
            '=' => x == y,
            '<' => x < y,
            '>' => x > y,
            'A' => x > 0 && y > 0,
            'O' => x > 0 || y > 0,
            _ => unreachable!("logic error"),
        };
        self.stack.push(Value::Integer(i32::from(result)));
        Ok(())
    }

    fn begin_format(&mut self, first: Option<char>) -> States {
        self.format.clear();
        self.conversion = None;
        self.format.extend(first);
        States::FormatFlags
    }

    fn format_flag(&mut self, cur: char) -> Result<States, Error> {
        let termination = self.options.format_termination;
        match (termination, cur) {
            (_, '+' | '-' | '#' | ' ' | '.' | '0'..='9') => {
                self.format.push(cur);
                Ok(States::FormatFlags)
            }
            (FormatTermination::Percent, '%') => {
                self.apply_format()?;
                Ok(States::Literal)
            }
            (FormatTermination::Percent, 'd' | 'o' | 'x' | 'X' | 's') => {
                self.conversion = Some(cur);
                Ok(States::FormatFlags)
            }
            (FormatTermination::Percent, _) => Ok(States::FormatFlags),
            (FormatTermination::Conversion, 'd' | 'o' | 'x' | 'X' | 's') => {
                self.conversion = Some(cur);
                self.apply_format()?;
                Ok(States::Literal)
            }
            (FormatTermination::Conversion, _) => {
                self.unknown_directive(cur)?;
                self.format.clear();
                Ok(States::Literal)
            }
        }
    }

    /// Pop a value and print it with the collected format
    fn apply_format(&mut self) -> Result<(), Error> {
        let op = self.conversion.take().unwrap_or('d');
        let flags = Flags::parse(&self.format)?;
        self.format.clear();
        let arg = self.pop(op)?;
        let result = format(arg, op, flags)?;
        self.output.extend(result);
        Ok(())
    }
}

#[derive(Copy, PartialEq, Eq, Clone, Default)]
struct Flags {
    width: u16,
    precision: Option<u16>,
    alternate: bool,
    left: bool,
    sign: bool,
    space: bool,
}

impl Flags {
    fn parse(spec: &str) -> Result<Self, Error> {
        let mut flags = Self::default();
        let mut fstate = FormatState::Flags;
        for cur in spec.chars() {
            match (fstate, cur) {
                (FormatState::Flags, '#') => flags.alternate = true,
                (FormatState::Flags, '-') => flags.left = true,
                (FormatState::Flags, '+') => flags.sign = true,
                (FormatState::Flags, ' ') => flags.space = true,
                (FormatState::Flags | FormatState::Width, '0'..='9') => {
                    flags.width = append_digit(flags.width, cur)?;
                    fstate = FormatState::Width;
                }
                (FormatState::Flags | FormatState::Width, '.') => {
                    fstate = FormatState::Precision;
                }
                (FormatState::Precision, '0'..='9') => {
                    flags.precision = Some(append_digit(flags.precision.unwrap_or(0), cur)?);
                }
                // Flags out of place have no effect
                _ => {}
            }
        }
        Ok(flags)
    }
}

fn append_digit(value: u16, digit: char) -> Result<u16, Error> {
    value
        .checked_mul(10)
        .and_then(|value| value.checked_add(digit as u16 - '0' as u16))
        .ok_or(Error::MalformedLiteral)
}

fn format_integer(d: i32, op: char, flags: Flags) -> String {
    match op {
        'o' => match flags.precision {
            Some(precision) => {
                if flags.alternate {
                    // Leading octal zero counts against precision.
                    format!("0{d:0prec$o}", prec = precision.saturating_sub(1).into())
                } else {
                    format!("{d:0prec$o}", prec = precision.into())
                }
            }
            None => {
                if flags.alternate {
                    format!("0{d:o}")
                } else {
                    format!("{d:o}")
                }
            }
        },
        'x' => match flags.precision {
            Some(precision) if flags.alternate && d != 0 => {
                format!("0x{d:0prec$x}", prec = precision.into())
            }
            Some(precision) => format!("{d:0prec$x}", prec = precision.into()),
            None if flags.alternate && d != 0 => format!("0x{d:x}"),
            None => format!("{d:x}"),
        },
        'X' => match flags.precision {
            Some(precision) if flags.alternate && d != 0 => {
                format!("0X{d:0prec$X}", prec = precision.into())
            }
            Some(precision) => format!("{d:0prec$X}", prec = precision.into()),
            None if flags.alternate && d != 0 => format!("0X{d:X}"),
            None => format!("{d:X}"),
        },
        _ => match flags.precision {
            Some(precision) => {
                if flags.sign {
                    format!("{d:+0prec$}", prec = usize::from(precision) + 1)
                } else if d < 0 {
                    format!("{d:0prec$}", prec = usize::from(precision) + 1)
                } else if flags.space {
                    format!(" {d:0prec$}", prec = precision.into())
                } else {
                    format!("{d:0prec$}", prec = precision.into())
                }
            }
            None => {
                if flags.sign {
                    format!("{d:+}")
                } else if d >= 0 && flags.space {
                    format!(" {d}")
                } else {
                    format!("{d}")
                }
            }
        },
    }
}

fn format(val: Value, op: char, flags: Flags) -> Result<Vec<u8>, Error> {
    let mut s = match (val, op) {
        (Value::Integer(d), 's') => d.to_string().into_bytes(),
        (Value::Integer(d), _) => format_integer(d, op, flags).into_bytes(),
        (Value::Text(s), 's') => s,
        (Value::Text(_), _) => return Err(Error::TypeMismatch(op)),
    };
    if op == 's'
        && let Some(precision) = flags.precision
    {
        s.truncate(usize::from(precision));
    }
    if usize::from(flags.width) > s.len() {
        let n = usize::from(flags.width) - s.len();
        if flags.left {
            s.extend(repeat_n(b' ', n));
        } else {
            let mut s_ = Vec::with_capacity(usize::from(flags.width));
            s_.extend(repeat_n(b' ', n));
            s_.extend(s);
            s = s_;
        }
    }
    Ok(s)
}

#[cfg(test)]
mod test {
    use super::{
        DirectivePolicy, Error, ExpandContext, ExpandOptions, FormatTermination, OperandOrder,
        Padding, StaticVariables, Value, expand,
    };

    /// Compare the result of `expand()` to the expected string
    fn assert_str(actual: Result<Vec<u8>, Error>, expected: &str) {
        assert_eq!(str::from_utf8(&actual.unwrap()).unwrap(), expected);
    }

    fn conventional() -> ExpandContext {
        ExpandContext::with_options(ExpandOptions {
            format_termination: FormatTermination::Conversion,
            operand_order: OperandOrder::Conventional,
            ..Default::default()
        })
    }

    #[test]
    fn plain_text() {
        assert_str(expand(b"\x1b[H\x1b[2J", &[]), "\x1b[H\x1b[2J");
    }

    #[test]
    fn single_parameter() {
        assert_str(expand(b"%p1%d", &[Value::from(7)]), "7");
    }

    #[test]
    fn multiple_parameters() {
        assert_str(
            expand(
                b"%p1%p2%p3%p4%p5%p6%p7%p8%p9%d%d%d%d%d%s%s%s%d",
                &[
                    Value::from(1),
                    Value::from(b"Two"),
                    Value::from(b"Three".as_slice()),
                    Value::from("Four"),
                    Value::from(5),
                    Value::from(6),
                    Value::from(7),
                    Value::from(8),
                    Value::from(9),
                ],
            ),
            "98765FourThreeTwo1",
        );
    }

    #[test]
    fn missing_argument() {
        assert_eq!(
            expand(b"%p1%d%p2%d", &[Value::from(1)]),
            Err(Error::MissingArgument(Some('2')))
        );
        assert_eq!(expand(b"%p0", &[]), Err(Error::MissingArgument(Some('0'))));
        assert_eq!(expand(b"%px", &[]), Err(Error::MissingArgument(Some('x'))));
    }

    #[test]
    fn padding_emitted() {
        assert_str(
            expand(b"%p1%d$<5*/>%p1%d", &[Value::from(42)]),
            "42$<5*/>42",
        );
    }

    #[test]
    fn padding_stripped() {
        let mut expand_context = ExpandContext::with_options(ExpandOptions {
            padding: Padding::Strip,
            ..Default::default()
        });
        assert_str(
            expand_context.expand(b"%p1%d$<5*/>%p1%d", &[Value::from(42)]),
            "4242",
        );
        assert_str(expand_context.expand(b"US$5 $%%", &[]), "US$5 $%");
        assert_str(expand_context.expand(b"cost$", &[]), "cost$");
    }

    #[test]
    fn percent_escape() {
        assert_str(expand(b"%p1%%%%%d", &[Value::from(42)]), "%%42");
    }

    #[test]
    fn char_output() {
        assert_eq!(
            expand(
                b"%p1%c%p2%c%p3%c",
                &[Value::from(42), Value::from(0), Value::from(257)],
            ),
            Ok(vec![42, 128, 1]),
        );
    }

    #[test]
    fn type_mismatch_expected_number() {
        for op in "c!~+-*/|&^m=><AOti".chars() {
            let cap = format!("%p1%p2%{op}");
            assert_eq!(
                expand(cap.as_bytes(), &[Value::from(42), Value::from("word")]),
                Err(Error::TypeMismatch(op)),
                "Failed for %{op}"
            );
        }
    }

    #[test]
    fn type_mismatch_format() {
        for op in "doxX".chars() {
            let cap = format!("%p1%{op}");
            assert_eq!(
                expand(cap.as_bytes(), &[Value::from("one")]),
                Err(Error::TypeMismatch(op)),
                "Failed for %{op}"
            );
        }
        assert_eq!(
            expand(b"%p1%PA", &[Value::from("one")]),
            Err(Error::TypeMismatch('P'))
        );
    }

    #[test]
    fn integer_as_string() {
        assert_str(expand(b"%p1%s", &[Value::from(63)]), "63");
    }

    #[test]
    fn stack_underflow_unary() {
        for op in "cl!~doxXst".chars() {
            let cap = format!("%{op}");
            assert_eq!(
                expand(cap.as_bytes(), &[]),
                Err(Error::StackUnderflow(op)),
                "Failed for %{op}"
            );
        }
    }

    #[test]
    fn stack_underflow_format() {
        for op in "doxXs".chars() {
            let cap = format!("%:{op}%");
            assert_eq!(
                expand(cap.as_bytes(), &[]),
                Err(Error::StackUnderflow(op)),
                "Failed for %{op}"
            );
        }
    }

    #[test]
    fn stack_underflow_binary() {
        for op in "+-*/|&^m=><AO".chars() {
            let cap = format!("%p1%{op}");
            assert_eq!(
                expand(cap.as_bytes(), &[Value::from(42)]),
                Err(Error::StackUnderflow(op)),
                "Failed for %{op}"
            );
        }
    }

    #[test]
    fn stack_underflow_variable() {
        assert_eq!(expand(b"%Pa", &[]), Err(Error::StackUnderflow('P')));
    }

    #[test]
    fn variables_reset_per_call() {
        let mut expand_context = ExpandContext::new();
        assert_str(
            expand_context.expand(
                b"%p1%PA%p2%PZ%p3%Pa%p4%Pz%gA%d%gZ%d%ga%d%gz%d",
                &[
                    Value::from(1),
                    Value::from(2),
                    Value::from(3),
                    Value::from(4),
                ],
            ),
            "1234",
        );
        assert_str(expand_context.expand(b"%gA%d%gZ%d%ga%d%gz%d", &[]), "0000");
    }

    #[test]
    fn variable_persistence() {
        let mut expand_context = ExpandContext::with_options(ExpandOptions {
            static_variables: StaticVariables::Persistent,
            ..Default::default()
        });
        assert_str(
            expand_context.expand(
                b"%p1%PA%p2%PZ%p3%Pa%p4%Pz%gA%d%gZ%d%ga%d%gz%d",
                &[
                    Value::from(1),
                    Value::from(2),
                    Value::from(3),
                    Value::from(4),
                ],
            ),
            "1234",
        );
        assert_str(expand_context.expand(b"%gA%d%gZ%d%ga%d%gz%d", &[]), "1200");
    }

    #[test]
    fn failed_expansion_keeps_variables() {
        let mut expand_context = ExpandContext::with_options(ExpandOptions {
            static_variables: StaticVariables::Persistent,
            ..Default::default()
        });
        assert_str(expand_context.expand(b"%{3}%PB", &[]), "");
        assert_eq!(
            expand_context.expand(b"%{5}%PB%p1%d", &[]),
            Err(Error::MissingArgument(Some('1')))
        );
        assert_str(expand_context.expand(b"%gB%d", &[]), "3");
    }

    #[test]
    fn directive_cut_short() {
        assert_eq!(expand(b"%p", &[]), Err(Error::MissingArgument(None)));
        assert_eq!(expand(b"%g", &[]), Err(Error::InvalidVariableName(None)));
        assert_eq!(expand(b"%{1}%P", &[]), Err(Error::InvalidVariableName(None)));
        assert_eq!(
            Error::MissingArgument(None).to_string(),
            "No argument for parameter end of template"
        );
    }

    #[test]
    fn variable_bad_name() {
        assert_eq!(
            expand(b"%p1%P7", &[Value::from(42)]),
            Err(Error::InvalidVariableName(Some('7')))
        );
        assert_eq!(expand(b"%g8", &[]), Err(Error::InvalidVariableName(Some('8'))));
        assert_eq!(expand(b"%P[", &[]), Err(Error::InvalidVariableName(Some('['))));
    }

    #[test]
    fn constants() {
        assert_str(expand(b"%{456}%d %'A'%d", &[]), "456 65");
    }

    #[test]
    fn bad_char_constant() {
        assert_eq!(expand(b"%'ab'", &[]), Err(Error::MalformedLiteral));
        assert_eq!(expand(b"%'a", &[]), Err(Error::MalformedLiteral));
        assert_eq!(expand(b"%'", &[]), Err(Error::MalformedLiteral));
    }

    #[test]
    fn bad_integer_constant() {
        assert_eq!(expand(b"%{2b}", &[]), Err(Error::MalformedLiteral));
        assert_eq!(expand(b"%{}", &[]), Err(Error::MalformedLiteral));
        assert_eq!(expand(b"%{12", &[]), Err(Error::MalformedLiteral));
        assert_eq!(expand(b"%{2147483648}", &[]), Err(Error::MalformedLiteral));
    }

    #[test]
    fn string_length() {
        assert_str(
            expand(b"%p1%l%d", &[Value::from("Hello, World!")]),
            "13",
        );
        assert_str(expand(b"%p1%l%d", &[Value::from(-123)]), "4");
    }

    #[test]
    fn arithmetic_pop_order() {
        let tests = [
            (12, '+', 29, "41"),
            (35, '-', 7, "-28"),
            (3, '*', 16, "48"),
            (3, '/', 70, "23"),
            (3, '|', 5, "7"),
            (15, '&', 35, "3"),
            (15, '^', 35, "44"),
            (7, 'm', 101, "3"),
        ];
        for (operand1, operation, operand2, expect) in tests {
            let cap = format!("%p1%p2%{operation}%d");
            assert_str(
                expand(
                    cap.as_bytes(),
                    &[Value::from(operand1), Value::from(operand2)],
                ),
                expect,
            );
        }
    }

    #[test]
    fn arithmetic_conventional_order() {
        let tests = [
            (12, '+', 29, "41"),
            (35, '-', 7, "28"),
            (70, '/', 3, "23"),
            (101, 'm', 7, "3"),
        ];
        let mut expand_context = conventional();
        for (operand1, operation, operand2, expect) in tests {
            let cap = format!("%p1%p2%{operation}%d");
            assert_str(
                expand_context.expand(
                    cap.as_bytes(),
                    &[Value::from(operand1), Value::from(operand2)],
                ),
                expect,
            );
        }
    }

    #[test]
    fn comparisons() {
        let tests = [
            (5, '=', 7, "0"),
            (15, '=', 15, "1"),
            (17, '<', 8, "0"),
            (17, '<', 50, "1"),
            (17, '>', 8, "1"),
            (17, '>', 50, "0"),
            (0, 'A', 0, "0"),
            (15, 'A', 0, "0"),
            (0, 'A', 9, "0"),
            (15, 'A', 32, "1"),
            (0, 'O', 0, "0"),
            (15, 'O', 0, "1"),
            (0, 'O', 9, "1"),
            (15, 'O', 32, "1"),
        ];
        for (operand1, operation, operand2, expect) in tests {
            let cap = format!("%p1%p2%{operation}%d");
            assert_str(
                expand(
                    cap.as_bytes(),
                    &[Value::from(operand1), Value::from(operand2)],
                ),
                expect,
            );
        }
    }

    #[test]
    fn division_by_zero() {
        assert_str(expand(b"%p1%p2%/%d", &[Value::from(0), Value::from(7)]), "0");
        assert_str(expand(b"%p1%p2%m%d", &[Value::from(0), Value::from(7)]), "0");
    }

    #[test]
    fn negation() {
        assert_str(
            expand(
                b"%p1%!%d %p2%!%d %p3%!%d %p1%~%d %p2%~%d",
                &[Value::from(0), Value::from(15), Value::from(-3)],
            ),
            "1 0 0 -1 -16",
        );
    }

    #[test]
    fn increment() {
        assert_str(
            expand(
                b"%i%p1%d_%p2%d_%p3%d_%i%p1%d_%p2%d_%p3%d",
                &[Value::from(10), Value::from(15), Value::from(20)],
            ),
            "11_16_20_12_17_20",
        );
        assert_str(expand(b"%i%p1%d", &[Value::from(0)]), "1");
        assert_str(expand(b"%i", &[]), "");
    }

    #[test]
    fn increment_leaves_caller_arguments() {
        let params = [Value::from(1), Value::from(2)];
        assert_str(expand(b"%i%p1%d;%p2%d", &params), "2;3");
        assert_eq!(params, [Value::from(1), Value::from(2)]);
    }

    #[test]
    fn conditional_if_then() {
        let cap = b"%p1%p2%?%<%tless%;";
        assert_str(expand(cap, &[Value::from(1), Value::from(2)]), "less");
        assert_str(expand(cap, &[Value::from(2), Value::from(1)]), "");
    }

    #[test]
    fn conditional_if_then_else() {
        let cap = b"%?%p1%t<A>%e<B>%;";
        assert_str(expand(cap, &[Value::from(1)]), "<A>");
        assert_str(expand(cap, &[Value::from(0)]), "<B>");
    }

    #[test]
    fn conditional_else_if() {
        let cap = b"%?%p1%{1}%=%tone%e%p1%{2}%=%ttwo%eother%;!";
        assert_str(expand(cap, &[Value::from(1)]), "one!");
        assert_str(expand(cap, &[Value::from(2)]), "two!");
        assert_str(expand(cap, &[Value::from(3)]), "other!");
    }

    #[test]
    fn conditional_nested() {
        let cap = b"%?%p1%t+%?%p2%t+%e-%;%e-%?%p2%t+%e-%;%;";
        assert_str(expand(cap, &[Value::from(0), Value::from(0)]), "--");
        assert_str(expand(cap, &[Value::from(0), Value::from(1)]), "-+");
        assert_str(expand(cap, &[Value::from(1), Value::from(0)]), "+-");
        assert_str(expand(cap, &[Value::from(1), Value::from(1)]), "++");
    }

    #[test]
    fn conditional_nested_in_skipped_branch() {
        let cap = b"%?%p1%t%?%p2%tA%eB%;%eC%;.";
        assert_str(expand(cap, &[Value::from(0), Value::from(1)]), "C.");
        assert_str(expand(cap, &[Value::from(1), Value::from(1)]), "A.");
        assert_str(expand(cap, &[Value::from(1), Value::from(0)]), "B.");

        let cap = b"%?%p1%tX%e%?%p2%tA%eB%;Y%;Z";
        assert_str(expand(cap, &[Value::from(1), Value::from(0)]), "XZ");
        assert_str(expand(cap, &[Value::from(0), Value::from(0)]), "BYZ");
    }

    #[test]
    fn conditional_skips_escaped_percent() {
        let cap = b"%?%p1%t100%%%;";
        assert_str(expand(cap, &[Value::from(0)]), "");
        assert_str(expand(cap, &[Value::from(1)]), "100%");
    }

    #[test]
    fn format_ends_at_percent() {
        assert_str(expand(b"%p1%:-5d%|", &[Value::from(63)]), "63   |");
        assert_str(expand(b"%p1%:#x", &[Value::from(63)]), "0x3f");
        assert_str(expand(b"%p1%:+.3", &[Value::from(5)]), "+005");
        // The terminating `%` is consumed, not taken as the next directive.
        assert_str(
            expand(b"%p1%p1%:5d%p2%d", &[Value::from(63), Value::from(7)]),
            "   63p263",
        );
        // Text between the conversion and the next `%` is swallowed.
        assert_str(expand(b"%p1%:5dabc%%", &[Value::from(63)]), "   63");
    }

    #[test]
    fn digits_after_percent() {
        assert_str(expand(b"%p1%2d", &[Value::from(63)]), "d");
        assert_str(
            conventional().expand(b"%p1%2d", &[Value::from(63)]),
            "63",
        );
        assert_str(
            conventional().expand(b"%p1%3d", &[Value::from(63)]),
            " 63",
        );
    }

    #[test]
    fn format_flags() {
        let tests = [
            (63, "%x", "3f"),
            (63, "%#x", "0x3f"),
            (63, "%6x", "    3f"),
            (63, "%:-6x", "3f    "),
            (63, "%:+d", "+63"),
            (63, "% d", " 63"),
            (63, "%p1%:-+ #10.5x", "0x0003f   "),
        ];
        let mut expand_context = conventional();
        for (param1, format, expected) in tests {
            let cap = format!("%p1{format}");
            assert_str(
                expand_context.expand(cap.as_bytes(), &[Value::from(param1)]),
                expected,
            );
        }
    }

    #[test]
    fn format_bad_flag() {
        assert_str(
            conventional().expand(b"%p1%:^x", &[Value::from(63)]),
            "x",
        );
        let mut expand_context = ExpandContext::with_options(ExpandOptions {
            format_termination: FormatTermination::Conversion,
            unknown_directives: DirectivePolicy::Reject,
            ..Default::default()
        });
        assert_eq!(
            expand_context.expand(b"%p1%:^x", &[Value::from(63)]),
            Err(Error::UnrecognizedDirective('^'))
        );
    }

    #[test]
    fn format_decimal() {
        let tests = [
            (42, "%d", "42"),
            (-42, "%d", "-42"),
            (42, "%:+d", "+42"),
            (-42, "%:+d", "-42"),
            (42, "% d", " 42"),
            (-42, "% d", "-42"),
            (42, "%.5d", "00042"),
            (-42, "%.5d", "-00042"),
            (42, "%:+.5d", "+00042"),
            (-42, "%:+.5d", "-00042"),
            (42, "% .5d", " 00042"),
            (-42, "% .5d", "-00042"),
        ];
        let mut expand_context = conventional();
        for (param1, format, expected) in tests {
            let cap = format!("%p1{format}");
            assert_str(
                expand_context.expand(cap.as_bytes(), &[Value::from(param1)]),
                expected,
            );
        }
    }

    #[test]
    fn format_octal() {
        let tests = [
            (42, "%o", "52"),
            (42, "%#o", "052"),
            (42, "%.5o", "00052"),
            (42, "%#.5o", "00052"),
        ];
        let mut expand_context = conventional();
        for (param1, format, expected) in tests {
            let cap = format!("%p1{format}");
            assert_str(
                expand_context.expand(cap.as_bytes(), &[Value::from(param1)]),
                expected,
            );
        }
    }

    #[test]
    fn format_hexadecimal() {
        let tests = [
            (42, "%x", "2a"),
            (42, "%#x", "0x2a"),
            (0, "%#x", "0"),
            (42, "%.5x", "0002a"),
            (42, "%#.5x", "0x0002a"),
            (0, "%#.5x", "00000"),
            (42, "%X", "2A"),
            (42, "%#X", "0X2A"),
            (0, "%#X", "0"),
            (42, "%.5X", "0002A"),
            (42, "%#.5X", "0X0002A"),
            (0, "%#.5X", "00000"),
        ];
        let mut expand_context = conventional();
        for (param1, format, expected) in tests {
            let cap = format!("%p1{format}");
            assert_str(
                expand_context.expand(cap.as_bytes(), &[Value::from(param1)]),
                expected,
            );
        }
    }

    #[test]
    fn format_string() {
        let tests = [
            ("One", "%s", "One"),
            ("One", "%5s", "  One"),
            ("One", "%5.2s", "   On"),
            ("One", "%:-5.4s", "One  "),
        ];
        let mut expand_context = conventional();
        for (param1, format, expected) in tests {
            let cap = format!("%p1{format}");
            assert_str(
                expand_context.expand(cap.as_bytes(), &[Value::from(param1)]),
                expected,
            );
        }
    }

    #[test]
    fn format_width_overflow() {
        assert_eq!(expand(b"%{1}%:65536d%", &[]), Err(Error::MalformedLiteral));
        assert_eq!(
            conventional().expand(b"%{1}%.65536d", &[]),
            Err(Error::MalformedLiteral)
        );
    }

    #[test]
    fn unknown_directive_ignored() {
        assert_str(expand(b"a%Yb", &[]), "ab");
    }

    #[test]
    fn unknown_directive_rejected() {
        let mut expand_context = ExpandContext::with_options(ExpandOptions {
            unknown_directives: DirectivePolicy::Reject,
            ..Default::default()
        });
        assert_eq!(
            expand_context.expand(b"%Y", &[]),
            Err(Error::UnrecognizedDirective('Y'))
        );
    }

    #[test]
    fn error_discards_output() {
        assert_eq!(
            expand(b"visible%p1%d", &[]),
            Err(Error::MissingArgument(Some('1')))
        );
    }
}
