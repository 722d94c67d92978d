//! Core structures of the multipath scheduler: the per-path snapshot,
//! the segments waiting to be sent and the aggregate connection that owns
//! both.
//!
//! Everything here is plain data. The congestion controller and the RTT
//! estimator of the host transport keep [`Path`]s up to date, the host keeps
//! the queues of the [`MetaConnection`] filled, and the policies in
//! `mpsched` read them to decide where the next segment goes.

pub mod error;
pub mod meta;
pub mod param;
pub mod path;
pub mod segment;

pub use error::Error;
pub use meta::{Mapping, MetaConnection};
pub use path::{CongestionState, Path, PathId, PathMask};
pub use segment::Segment;
