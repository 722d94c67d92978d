//! Schedulers deciding which path carries the next segment of a multipath
//! stream.
//!
//! A [`Scheduler`] is created per connection and driven synchronously from
//! the connection's send path. It reads the [`MetaConnection`] snapshot the
//! host keeps current and answers with a [`Transmit`], or with nothing when
//! no path should send right now.
//!
//! Two policies ship with the crate, see [`registry::Registry::builtin`]:
//! - [`DefaultScheduler`]: the path with the lowest smoothed RTT,
//! - [`EcfScheduler`]: earliest completion first, which may prefer waiting
//!   for the fastest path over using a slower one.

use std::time::Instant;

use mpbase::{MetaConnection, PathId, Segment};

pub mod baseline;
mod ecf;
mod minrtt;
pub mod rebuffer;
pub mod registry;
mod segment;
mod state;

pub use baseline::{BaselineSelector, MinRtt};
pub use ecf::{
    EcfScheduler,
    estimator::{Backlog, Candidate, Decision, Estimate, estimate},
};
pub use minrtt::DefaultScheduler;
pub use segment::split_limit;
pub use state::SchedulerState;

/// Where the segment of a [`Transmit`] was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reinjection {
    /// The head of the send queue.
    Regular,
    /// The head of the reinjection queue.
    Reinjected,
    /// A connection-level retransmission of the oldest unacknowledged
    /// segment, sent to unblock the receive buffer.
    Optimized,
}

/// A scheduling decision: send up to `limit` bytes of `segment` on `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    pub segment: Segment,
    pub path: PathId,
    pub limit: usize,
    pub reinjection: Reinjection,
}

/// The [`Scheduler`] trait is the contract between a multipath transport and
/// its scheduling policy.
pub trait Scheduler: Send {
    /// The name the policy is registered under.
    fn name(&self) -> &'static str;

    /// Resets the per-connection state, stamping every path of `meta`.
    fn init(&mut self, meta: &MetaConnection, now: Instant);

    /// A new subflow finished its handshake.
    fn init_path(&mut self, path: PathId, now: Instant);

    /// A subflow was closed, its state can be dropped.
    fn remove_path(&mut self, path: PathId);

    /// Chooses the path `unit` should go on.
    ///
    /// # Returns
    /// `None` if no path can or should send it now, the caller skips this
    /// opportunity and retries later.
    fn get_subflow(
        &mut self,
        meta: &MetaConnection,
        unit: Option<&Segment>,
        zero_window_probe: bool,
    ) -> Option<PathId>;

    /// Picks the next segment, its path and how many of its bytes to send.
    ///
    /// May shrink the congestion window of slow paths when the receive
    /// buffer is the bottleneck, this is the only mutation of `meta`.
    fn next_segment(&mut self, meta: &mut MetaConnection, now: Instant) -> Option<Transmit>;
}
