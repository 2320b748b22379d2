//! Builder for constructing commands
//!
//! Generic wrapper mainly used as helper for creating command frames.
//! However, it can also be used to execute custom/arbitrary commands. See [CustomCommand](crate::commands::custom) for more details.
//!
//! For best performance, especially with large amounts of data, it is recommended to pass
//! [Bytes](<https://docs.rs/bytes/latest/bytes/>) arguments, as cloning them is shallow.
use crate::codec::{CommandArg, CommandFrame};
use crate::commands::custom::CustomCommand;
use bytes::Bytes;

/// Builder for constructing commands
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    pub(crate) name: &'static str,
    pub(crate) args: Vec<CommandArg>,
}

impl CommandBuilder {
    pub fn new(keyword: &'static str) -> Self {
        CommandBuilder { name: keyword, args: vec![] }
    }

    /// Converts builder to command ready for being sent by the multiplexer
    pub fn to_command(self) -> CustomCommand {
        self.into()
    }

    /// Encodes the command
    pub fn to_frame(&self) -> CommandFrame {
        CommandFrame::new(self.name, &self.args)
    }

    /// Command keyword as given on construction
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn args(&self) -> &[CommandArg] {
        &self.args
    }

    /// Adds a static argument
    pub fn arg_static(mut self, arg: &'static str) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds a static argument
    pub fn arg_static_option(mut self, arg: Option<&'static str>) -> Self {
        if let Some(arg_str) = arg {
            self.args.push(arg_str.into());
        }
        self
    }

    /// Adds cased string of uint
    pub fn arg_uint(mut self, arg: usize) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds cased string of int
    pub fn arg_int(mut self, arg: i64) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds a double, see [format_double](crate::codec::format_double)
    pub fn arg_double(mut self, arg: f64) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds a byte argument
    /// Note: Besides static, the most efficient way caused by the nature how Bytes cloning is working
    pub fn arg(mut self, arg: &Bytes) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Just adding byte if option is Some
    pub fn arg_option(mut self, arg: Option<&Bytes>) -> Self {
        if let Some(inner) = arg {
            self.args.push(inner.into());
        }
        self
    }
}

impl From<CommandBuilder> for CustomCommand {
    fn from(builder: CommandBuilder) -> Self {
        CustomCommand::new(builder)
    }
}

impl From<CommandBuilder> for CommandFrame {
    fn from(builder: CommandBuilder) -> Self {
        builder.to_frame()
    }
}
