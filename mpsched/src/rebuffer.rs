//! Receive buffer optimization.
//!
//! When the peer's receive buffer fills up because one slow path holds back
//! the oldest connection-level byte, a faster path retransmits that byte and
//! the slow paths are penalised by halving their congestion window. See
//! Raiciu et al., "How Hard Can It Be? Designing and Implementing a
//! Deployable Multipath TCP", NSDI 2012.

use std::time::Instant;

use mpbase::{CongestionState, MetaConnection, Path, PathId, Segment};

use crate::state::SchedulerState;

/// Returns a copy of the retransmission queue head to send on `path`, if
/// worth it.
///
/// With `penalize`, or when the connection is out of send buffer, the other
/// paths that carry the head and are slower than `path` get their window
/// halved. This happens at most once per smoothed RTT of `path`.
pub fn rcv_buf_optimization(
    meta: &mut MetaConnection,
    state: &mut SchedulerState,
    path: PathId,
    penalize: bool,
    now: Instant,
) -> Option<Segment> {
    let head = meta.rtx_head()?.clone();
    let srtt = meta.path(path)?.srtt();
    let mask = head.path_mask();

    if (penalize || !meta.is_memory_free()) && state.rbuf_cooldown_elapsed(path, srtt, now) {
        for other in meta.paths_mut() {
            if other.id() == path || !mask.contains(other.id()) {
                continue;
            }
            if srtt < other.srtt() && other.ca_state() == CongestionState::Open {
                halve_cwnd(other);
                tracing::debug!(
                    target: "rebuffer",
                    penalized = %other.id(),
                    by = %path,
                    cwnd = other.cwnd(),
                    "halve window of a slower path"
                );
                state.stamp_rbuf_opti(path, now);
            }
        }
    }

    // already retransmitted on this path
    if mask.contains(path) {
        return None;
    }

    let mut retransmit = false;
    for other in meta.paths() {
        if other.id() == path || !mask.contains(other.id()) {
            continue;
        }
        // the other window is too small for fast retransmit to kick in
        if other.cwnd() <= 4 {
            retransmit = true;
            break;
        }
        if srtt * 4 >= other.srtt() {
            retransmit = false;
            break;
        }
        retransmit = true;
    }

    let this = meta.path(path)?;
    (retransmit && this.is_available(Some(&head), false)).then_some(head)
}

fn halve_cwnd(path: &mut Path) {
    let prior_cwnd = path.cwnd();
    path.set_cwnd((prior_cwnd >> 1).max(1));
    if prior_cwnd >= path.ssthresh() {
        path.set_ssthresh((path.ssthresh() >> 1).max(2));
    }
}
