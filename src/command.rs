//! Typed commands as handed to a session, before a codec serializes them.

use heapless::String;
use thiserror::Error;

/// Longest command name we accept.
pub const NAME_LEN: usize = 8;
/// Longest argument string we accept.
pub const ARGS_LEN: usize = 32;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command name is empty")]
    EmptyName,
    #[error("Command name longer than 8 characters")]
    NameTooLong,
    #[error("Command arguments longer than 32 characters")]
    ArgsTooLong,
}

/// A named command and its already formatted arguments.
///
/// Names keep the caller's casing, the codec decides how they go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String<NAME_LEN>,
    args: String<ARGS_LEN>,
}

impl Command {
    pub fn new(name: &str, args: &str) -> Result<Self, CommandError> {
        if name.is_empty() {
            return Err(CommandError::EmptyName);
        }
        let mut command = Self {
            name: String::new(),
            args: String::new(),
        };
        command
            .name
            .push_str(name)
            .map_err(|_| CommandError::NameTooLong)?;
        command
            .args
            .push_str(args)
            .map_err(|_| CommandError::ArgsTooLong)?;
        Ok(command)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &str {
        &self.args
    }

    /// Whether both commands share a name, ignoring ASCII case.
    pub fn same_name(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }

    /// Replace the arguments, keeping the name.
    pub(crate) fn replace_args(&mut self, args: String<ARGS_LEN>) {
        self.args = args;
    }

    pub(crate) fn into_args(self) -> String<ARGS_LEN> {
        self.args
    }
}
