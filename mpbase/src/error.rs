use std::ops::RangeInclusive;

use thiserror::Error;

use crate::path::PathId;

/// Errors raised while building the scheduler inputs.
///
/// The scheduling algorithms themselves never fail, they answer "nothing to
/// do" instead. These errors come from the configuration layer and from path
/// bookkeeping on the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("r_beta {0} is out of bounds {1:?}")]
    RBetaOutOfBounds(u32, RangeInclusive<u32>),
    #[error("path index {0} does not fit in a path mask")]
    PathIndexOverflow(u8),
    #[error("{0} already exists")]
    DuplicatePath(PathId),
    #[error("{0} does not exist")]
    UnknownPath(PathId),
}
