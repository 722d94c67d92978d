use std::time::Duration;

use derive_more::{Display, From, Into};
use getset::{CopyGetters, Setters};

use crate::segment::Segment;

/// Smoothed RTT assumed before the first sample arrives.
pub const INITIAL_RTT: Duration = Duration::from_millis(333);
// The upper bound for the initial window will be
// min (10*MSS, max (2*MSS, 14600))
// See https://datatracker.ietf.org/doc/html/rfc6928#autoid-3
pub const INIT_CWND: u32 = 10;
pub const INFINITE_SSTHRESH: u32 = u32::MAX;
pub const DEFAULT_MSS: usize = 1460;
const DEFAULT_SEND_WINDOW: usize = 1 << 20;

/// Index of a path inside its connection.
///
/// Only indexes below [`PathMask::WIDTH`] can be tracked in a [`PathMask`],
/// the connection refuses to add paths beyond that.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into)]
#[display("path#{_0}")]
pub struct PathId(u8);

impl PathId {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn flag(self) -> PathMask {
        PathMask(1u64.checked_shl(self.0 as u32).unwrap_or(0))
    }
}

/// The set of paths a segment has already been sent on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathMask(u64);

impl PathMask {
    pub const WIDTH: u8 = u64::BITS as u8;

    pub fn contains(&self, path: PathId) -> bool {
        self.0 & path.flag().0 != 0
    }

    pub fn insert(&mut self, path: PathId) {
        self.0 |= path.flag().0;
    }

    pub fn remove(&mut self, path: PathId) {
        self.0 &= !path.flag().0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }
}

impl FromIterator<PathId> for PathMask {
    fn from_iter<I: IntoIterator<Item = PathId>>(iter: I) -> Self {
        let mut mask = PathMask::default();
        for path in iter {
            mask.insert(path);
        }
        mask
    }
}

/// Congestion control state of a path, as reported by its controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CongestionState {
    #[default]
    Open,
    Disorder,
    Cwr,
    Recovery,
    Loss,
}

/// Snapshot of one subflow.
///
/// The host keeps the fields current; schedulers only read them, except for
/// the rebuffer penalty which shrinks `cwnd`/`ssthresh` of slow paths.
#[derive(CopyGetters, Setters, Debug, Clone, PartialEq)]
pub struct Path {
    #[getset(get_copy = "pub")]
    id: PathId,
    /// The subflow is in a state that allows sending data.
    #[getset(get_copy = "pub", set = "pub")]
    can_send: bool,
    /// The handshake has completed, the subflow may carry data.
    #[getset(get_copy = "pub", set = "pub")]
    established: bool,
    #[getset(get_copy = "pub", set = "pub")]
    potentially_failed: bool,
    /// Backup paths are used only if no regular path is available.
    #[getset(get_copy = "pub", set = "pub")]
    backup: bool,
    #[getset(get_copy = "pub", set = "pub")]
    srtt: Duration,
    #[getset(get_copy = "pub", set = "pub")]
    rttvar: Duration,
    /// Congestion window in segments.
    #[getset(get_copy = "pub")]
    cwnd: u32,
    #[getset(get_copy = "pub", set = "pub")]
    ssthresh: u32,
    #[getset(get_copy = "pub")]
    cwnd_clamp: u32,
    #[getset(get_copy = "pub", set = "pub")]
    mss: usize,
    #[getset(get_copy = "pub", set = "pub")]
    packets_out: u32,
    #[getset(get_copy = "pub", set = "pub")]
    in_flight: u32,
    /// Bytes queued on the subflow and not yet acknowledged.
    #[getset(get_copy = "pub", set = "pub")]
    wmem_queued: usize,
    /// Bytes the peer window still admits on this subflow.
    #[getset(get_copy = "pub", set = "pub")]
    send_window: usize,
    /// Segments the NIC can coalesce into one transmission, 0 without GSO.
    #[getset(get_copy = "pub", set = "pub")]
    gso_max_segs: u16,
    #[getset(get_copy = "pub", set = "pub")]
    ca_state: CongestionState,
}

impl Path {
    /// A freshly established subflow with default transport estimates.
    pub fn new(id: PathId) -> Self {
        Self {
            id,
            can_send: true,
            established: true,
            potentially_failed: false,
            backup: false,
            srtt: INITIAL_RTT,
            rttvar: INITIAL_RTT / 2,
            cwnd: INIT_CWND,
            ssthresh: INFINITE_SSTHRESH,
            cwnd_clamp: u32::MAX,
            mss: DEFAULT_MSS,
            packets_out: 0,
            in_flight: 0,
            wmem_queued: 0,
            send_window: DEFAULT_SEND_WINDOW,
            gso_max_segs: 0,
            ca_state: CongestionState::Open,
        }
    }

    /// Sets the congestion window, never above the clamp.
    pub fn set_cwnd(&mut self, cwnd: u32) -> &mut Self {
        self.cwnd = cwnd.min(self.cwnd_clamp);
        self
    }

    /// Sets the clamp and shrinks the window if it is above it.
    pub fn set_cwnd_clamp(&mut self, clamp: u32) -> &mut Self {
        self.cwnd_clamp = clamp;
        self.cwnd = self.cwnd.min(clamp);
        self
    }

    /// A path may carry data only once it can send and its handshake is done.
    pub fn is_eligible(&self) -> bool {
        self.can_send && self.established
    }

    /// Whether `unit` may be sent on this path right now.
    ///
    /// With `zero_window_probe` the congestion window is not checked, a probe
    /// has to go out even if the window is full.
    pub fn is_available(&self, unit: Option<&Segment>, zero_window_probe: bool) -> bool {
        if !self.is_eligible() || self.potentially_failed {
            return false;
        }
        if self.ca_state == CongestionState::Loss {
            return false;
        }
        if !zero_window_probe && self.in_flight >= self.cwnd {
            return false;
        }
        // Never put the same segment twice on one path.
        !unit.is_some_and(|unit| unit.path_mask().contains(self.id))
    }

    /// Segments the congestion window still admits.
    pub fn cwnd_quota(&self) -> u32 {
        self.cwnd.saturating_sub(self.in_flight)
    }

    pub fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }
}

/// Converts a bandwidth cap into a congestion window clamp, rounding to the
/// nearest segment.
///
/// Returns `None` while the RTT is below one millisecond, there is no
/// meaningful window to derive from it yet.
pub fn cwnd_clamp_for_rate(rate_kbps: u32, srtt: Duration, mss: usize) -> Option<u32> {
    let rtt_ms = srtt.as_millis() as u64;
    if rtt_ms == 0 {
        return None;
    }
    let mss_bits = if mss > 0 { mss as u64 * 8 } else { 1500 * 8 };
    let clamp = (rate_kbps as u64 * rtt_ms + mss_bits / 2) / mss_bits;
    Some(clamp.clamp(1, u32::MAX as u64) as u32)
}

/// Decodes the compact rate form, `2^exponent` kbps.
///
/// Exponents from 32 upwards cannot be shifted and are taken literally.
pub fn rate_from_exponent(exponent: u8) -> u32 {
    if exponent < 32 {
        1 << exponent
    } else {
        exponent as u32
    }
}
