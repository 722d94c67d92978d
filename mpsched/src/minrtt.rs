use std::time::Instant;

use mpbase::{MetaConnection, PathId, Segment};

use crate::{
    Scheduler, Transmit,
    baseline::{BaselineSelector, MinRtt},
    segment::{self, SelectPath},
    state::SchedulerState,
};

/// Always the available path with the lowest smoothed RTT.
#[derive(Debug, Default)]
pub struct DefaultScheduler {
    state: SchedulerState,
}

impl DefaultScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }
}

impl SelectPath for DefaultScheduler {
    fn select_path(
        &mut self,
        meta: &MetaConnection,
        unit: Option<&Segment>,
        zero_window_probe: bool,
    ) -> Option<PathId> {
        MinRtt.select(meta, unit, zero_window_probe)
    }

    fn state_mut(&mut self) -> &mut SchedulerState {
        &mut self.state
    }
}

impl Scheduler for DefaultScheduler {
    fn name(&self) -> &'static str {
        "default"
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
        MinRtt.select(meta, unit, zero_window_probe)
    }

    fn next_segment(&mut self, meta: &mut MetaConnection, now: Instant) -> Option<Transmit> {
        segment::next_segment(self, meta, now)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use mpbase::Path;

    use super::*;

    #[test]
    fn test_never_waits() {
        let mut meta = MetaConnection::new();
        let mut fast = Path::new(PathId::from(0));
        fast.set_srtt(Duration::from_millis(10)).set_in_flight(10);
        meta.add_path(fast).unwrap();
        let mut slow = Path::new(PathId::from(1));
        slow.set_srtt(Duration::from_millis(40));
        meta.add_path(slow).unwrap();
        meta.set_wmem_queued(1000);
        meta.send_queue_mut()
            .push_back(Segment::new(0, Bytes::from_static(&[0; 1000])));

        let mut scheduler = DefaultScheduler::new();
        assert_eq!(scheduler.name(), "default");
        assert_eq!(scheduler.get_subflow(&meta, None, false), Some(PathId::from(1)));
        let transmit = scheduler.next_segment(&mut meta, Instant::now()).unwrap();
        assert_eq!(transmit.path, PathId::from(1));
        assert_eq!(transmit.limit, 1000);
    }
}
