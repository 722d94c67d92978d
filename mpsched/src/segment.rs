use std::time::Instant;

use mpbase::{MetaConnection, Path, PathId, Segment};

use crate::{Reinjection, Transmit, rebuffer::rcv_buf_optimization, state::SchedulerState};

/// What the segment provider needs from a scheduling policy.
pub(crate) trait SelectPath {
    fn select_path(
        &mut self,
        meta: &MetaConnection,
        unit: Option<&Segment>,
        zero_window_probe: bool,
    ) -> Option<PathId>;

    fn state_mut(&mut self) -> &mut SchedulerState;
}

/// The unit to schedule next: the reinjection queue goes before the send
/// queue, and with both empty a blocked writer gets a retransmission of the
/// oldest unacknowledged segment.
fn next_unit<S: SelectPath>(
    scheduler: &mut S,
    meta: &mut MetaConnection,
    now: Instant,
) -> Option<(Segment, Reinjection)> {
    // a fallen back connection has one path and nothing to reinject
    if meta.is_fallback() {
        return meta
            .send_head()
            .map(|segment| (segment.clone(), Reinjection::Regular));
    }

    if let Some(segment) = meta.reinject_queue().front() {
        return Some((segment.clone(), Reinjection::Reinjected));
    }
    if let Some(segment) = meta.send_head() {
        return Some((segment.clone(), Reinjection::Regular));
    }

    if !meta.is_send_buffer_blocked() {
        return None;
    }
    let path = scheduler.select_path(meta, None, false)?;
    let segment = rcv_buf_optimization(meta, scheduler.state_mut(), path, false, now)?;
    tracing::trace!(target: "segment", %path, seq = segment.seq(), "blocked writer, retransmit head");
    Some((segment, Reinjection::Optimized))
}

pub(crate) fn next_segment<S: SelectPath>(
    scheduler: &mut S,
    meta: &mut MetaConnection,
    now: Instant,
) -> Option<Transmit> {
    let (mut segment, mut reinjection) = next_unit(scheduler, meta, now)?;
    let path = scheduler.select_path(meta, Some(&segment), false)?;
    let mss = meta.path(path)?.mss();

    if reinjection == Reinjection::Regular && !meta.fits_send_window(&segment, mss) {
        segment = rcv_buf_optimization(meta, scheduler.state_mut(), path, true, now)?;
        reinjection = Reinjection::Optimized;
    }

    let limit = split_limit(meta.path(path)?, &segment)?;

    tracing::trace!(
        target: "segment",
        %path,
        seq = segment.seq(),
        limit,
        ?reinjection,
        "next segment"
    );
    Some(Transmit {
        segment,
        path,
        limit,
        reinjection,
    })
}

/// How many bytes of `segment` `path` may take in one go, bounded by its
/// congestion window quota, its GSO batch size and its send window. A
/// segment of at most one MSS is never split: it goes whole or not at all.
///
/// Returns `None` if that is nothing.
pub fn split_limit(path: &Path, segment: &Segment) -> Option<usize> {
    let len = segment.len();
    if len <= path.mss() {
        return (path.cwnd_quota() > 0 && len <= path.send_window()).then_some(len);
    }

    let gso_max_segs = u32::from(path.gso_max_segs().max(1));
    let max_segs = path.cwnd_quota().min(gso_max_segs);
    if max_segs == 0 {
        return None;
    }
    let limit = (path.mss() * max_segs as usize)
        .min(path.send_window())
        .min(segment.len());
    (limit > 0).then_some(limit)
}
