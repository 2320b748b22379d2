
use crate::commands::Command;

/// Wire bytes of the given command
pub(crate) fn encoded<C: Command>(command: &C) -> Vec<u8> {
    command.encode().to_frame().as_bytes().to_vec()
}
