//! Completion time estimation of the ECF scheduler.
//!
//! See Lim et al., "ECF: An MPTCP Path Scheduler to Manage Heterogeneous
//! Paths", CoNEXT 2017.

use std::time::Duration;

use mpbase::Path;

/// The transport estimates of one path that enter the estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub srtt: Duration,
    pub rttvar: Duration,
    /// Congestion window in segments.
    pub cwnd: u32,
}

impl From<&Path> for Candidate {
    fn from(path: &Path) -> Self {
        Self {
            srtt: path.srtt(),
            rttvar: path.rttvar(),
            cwnd: path.cwnd(),
        }
    }
}

/// Bytes the connection still has to deliver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Backlog {
    /// Bytes held by the connection.
    pub meta_queued: usize,
    pub meta_packets_out: u64,
    /// Sum over the eligible paths of the bytes queued on them.
    pub sub_queued: usize,
    pub sub_packets_out: u64,
}

impl Backlog {
    /// Bytes not yet accounted to any path. Packets out at the connection
    /// level that no path claims count as `mss` each.
    pub fn unassigned(&self, mss: usize) -> u128 {
        let mut assigned = self.sub_queued as u128;
        if self.meta_packets_out > self.sub_packets_out {
            assigned += (self.meta_packets_out - self.sub_packets_out) as u128 * mss as u128;
        }
        (self.meta_queued as u128).saturating_sub(assigned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Send on the baseline's pick.
    Selected,
    /// Send nothing, the fastest path will finish earlier once it has room.
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    pub decision: Decision,
    /// The switching margin to keep for the next estimation.
    pub margin: u32,
}

/// Decides between the baseline's pick `selected` and waiting for
/// `fastest`.
///
/// All products are taken in 128 bits: microseconds times bytes times
/// `r_beta` cannot overflow there.
pub fn estimate(
    fastest: &Candidate,
    selected: &Candidate,
    mss: usize,
    backlog: &Backlog,
    margin: u32,
    r_beta: u32,
) -> Estimate {
    let mss = mss as u128;
    let srtt_f = fastest.srtt.as_micros();
    let srtt_s = selected.srtt.as_micros();
    let delta = fastest.rttvar.max(selected.rttvar).as_micros();
    let sndbuf = backlog.unassigned(mss as usize);

    let cwnd_f = fastest.cwnd as u128 * mss;
    // at least one window over the fastest path is required
    let x_f = sndbuf.max(cwnd_f);
    let lhs = srtt_f * (x_f + cwnd_f);
    let rhs = cwnd_f * (srtt_s + delta);

    let r_beta = r_beta as u128;
    if r_beta * lhs < r_beta * rhs + margin as u128 * rhs {
        let cwnd_s = selected.cwnd as u128 * mss;
        let x_s = sndbuf.max(cwnd_s);
        let lhs_s = srtt_s * x_s;
        let rhs_s = cwnd_s * (2 * srtt_f + delta);

        if lhs_s >= rhs_s {
            // too much slower than the fastest
            return Estimate {
                decision: Decision::Wait,
                margin: 1,
            };
        }
        Estimate {
            decision: Decision::Selected,
            margin,
        }
    } else {
        Estimate {
            decision: Decision::Selected,
            margin: 0,
        }
    }
}
