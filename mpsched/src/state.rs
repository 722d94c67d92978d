use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use mpbase::{MetaConnection, PathId};

/// Per-connection memory of a scheduler.
#[derive(Debug, Default, Clone)]
pub struct SchedulerState {
    // This is "waiting" in the ECF algorithm description: 1 after the
    // scheduler chose to wait for the fastest path, biasing the next
    // decisions towards waiting again.
    switching_margin: u32,
    last_rbuf_opti: HashMap<PathId, Instant>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switching_margin(&self) -> u32 {
        self.switching_margin
    }

    pub(crate) fn set_switching_margin(&mut self, margin: u32) {
        self.switching_margin = margin;
    }

    /// Clears the margin and stamps every path of `meta` with `now`.
    pub fn reset(&mut self, meta: &MetaConnection, now: Instant) {
        self.switching_margin = 0;
        self.last_rbuf_opti.clear();
        for path in meta.paths() {
            self.last_rbuf_opti.insert(path.id(), now);
        }
    }

    /// A subflow joined the connection.
    pub fn init_path(&mut self, path: PathId, now: Instant) {
        self.switching_margin = 0;
        self.last_rbuf_opti.insert(path, now);
    }

    pub fn remove_path(&mut self, path: PathId) {
        self.last_rbuf_opti.remove(&path);
    }

    pub fn last_rbuf_opti(&self, path: PathId) -> Option<Instant> {
        self.last_rbuf_opti.get(&path).copied()
    }

    pub(crate) fn stamp_rbuf_opti(&mut self, path: PathId, now: Instant) {
        self.last_rbuf_opti.insert(path, now);
    }

    /// Whether at least `srtt` passed since `path` last penalised the others.
    /// A path that never did has no cooldown.
    pub(crate) fn rbuf_cooldown_elapsed(&self, path: PathId, srtt: Duration, now: Instant) -> bool {
        self.last_rbuf_opti(path)
            .is_none_or(|last| now.saturating_duration_since(last) >= srtt)
    }
}
