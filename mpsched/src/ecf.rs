use std::time::Instant;

use mpbase::{MetaConnection, Path, PathId, Segment, param};

use crate::{
    Scheduler, Transmit,
    baseline::{BaselineSelector, MinRtt, data_fin_path},
    segment::{self, SelectPath},
    state::SchedulerState,
};

pub mod estimator;

use estimator::{Backlog, Candidate, Decision};

/// Earliest completion first.
///
/// Asks a [`BaselineSelector`] for a path, then checks whether the rest of
/// the backlog would complete sooner by waiting for the lowest RTT path to
/// open its window again. If so, nothing is sent.
#[derive(Debug)]
pub struct EcfScheduler<B = MinRtt> {
    baseline: B,
    state: SchedulerState,
    /// Pinned `r_beta`, the process-wide value is read when unset.
    r_beta: Option<u32>,
}

impl Default for EcfScheduler<MinRtt> {
    fn default() -> Self {
        Self::new(MinRtt)
    }
}

impl<B: BaselineSelector> EcfScheduler<B> {
    pub fn new(baseline: B) -> Self {
        Self {
            baseline,
            state: SchedulerState::new(),
            r_beta: None,
        }
    }

    /// Uses `r_beta` instead of [`param::ecf_r_beta`].
    pub fn with_r_beta(mut self, r_beta: u32) -> Self {
        self.r_beta = Some(r_beta);
        self
    }

    pub fn r_beta(&self) -> u32 {
        self.r_beta.unwrap_or_else(param::ecf_r_beta)
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Chooses the path for `unit`, `None` to wait.
    pub fn select_path(
        &mut self,
        meta: &MetaConnection,
        unit: Option<&Segment>,
        zero_window_probe: bool,
    ) -> Option<PathId> {
        if let Some(path) = data_fin_path(meta, unit, zero_window_probe) {
            return Some(path);
        }

        let mut backlog = Backlog {
            meta_queued: meta.wmem_queued(),
            meta_packets_out: meta.packets_out() as u64,
            ..Default::default()
        };
        let mut fastest: Option<&Path> = None;
        for path in meta.paths().iter().filter(|path| path.is_eligible()) {
            backlog.sub_queued += path.wmem_queued();
            backlog.sub_packets_out += path.packets_out() as u64;
            if fastest.is_none_or(|fastest| path.srtt() < fastest.srtt()) {
                fastest = Some(path);
            }
        }

        let selected = self
            .baseline
            .select(meta, unit, zero_window_probe)
            .and_then(|id| meta.path(id));

        match (fastest, selected) {
            (fastest, None) => fastest
                .filter(|fastest| fastest.is_available(unit, zero_window_probe))
                .map(Path::id),
            (None, Some(selected)) => Some(selected.id()),
            (Some(fastest), Some(selected)) if fastest.id() == selected.id() => Some(selected.id()),
            (Some(fastest), Some(selected)) => {
                let estimate = estimator::estimate(
                    &Candidate::from(fastest),
                    &Candidate::from(selected),
                    selected.mss(),
                    &backlog,
                    self.state.switching_margin(),
                    self.r_beta(),
                );
                self.state.set_switching_margin(estimate.margin);
                match estimate.decision {
                    Decision::Selected => Some(selected.id()),
                    Decision::Wait => {
                        tracing::debug!(
                            target: "ecf",
                            fastest = %fastest.id(),
                            selected = %selected.id(),
                            "wait for the fastest path"
                        );
                        None
                    }
                }
            }
        }
    }
}

impl<B: BaselineSelector> SelectPath for EcfScheduler<B> {
    fn select_path(
        &mut self,
        meta: &MetaConnection,
        unit: Option<&Segment>,
        zero_window_probe: bool,
    ) -> Option<PathId> {
        EcfScheduler::select_path(self, meta, unit, zero_window_probe)
    }

    fn state_mut(&mut self) -> &mut SchedulerState {
        &mut self.state
    }
}

impl<B: BaselineSelector> Scheduler for EcfScheduler<B> {
    fn name(&self) -> &'static str {
        "ecf"
    }

    fn init(&mut self, meta: &MetaConnection, now: Instant) {
        self.state.reset(meta, now);
    }

    fn init_path(&mut self, path: PathId, now: Instant) {
        self.state.init_path(path, now);
    }

    fn remove_path(&mut self, path: PathId) {
        self.state.remove_path(path);
    }

    fn get_subflow(
        &mut self,
        meta: &MetaConnection,
        unit: Option<&Segment>,
        zero_window_probe: bool,
    ) -> Option<PathId> {
        self.select_path(meta, unit, zero_window_probe)
    }

    fn next_segment(&mut self, meta: &mut MetaConnection, now: Instant) -> Option<Transmit> {
        segment::next_segment(self, meta, now)
    }
}
