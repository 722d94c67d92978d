//! Discrete-time transfer over simulated paths.
//!
//! Time advances in ticks of one millisecond. Every transmission is
//! acknowledged exactly one RTT later unless its path fails first, then it
//! is handed back to the connection for reinjection. Congestion windows grow
//! by slow start up to `ssthresh` and by congestion avoidance after that,
//! never above the rate clamp of the path.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    time::{Duration, Instant},
};

use bytes::Bytes;
use mpbase::{MetaConnection, Path, PathId, Segment};
use mpsched::{Reinjection, Scheduler, Transmit};

use crate::{
    error::Error,
    report::{PathReport, Report},
    scenario::Scenario,
};

const TICK: Duration = Duration::from_millis(1);
const MAX_TRANSMITS_PER_TICK: usize = 4096;

#[derive(Debug)]
struct InFlight {
    path: PathId,
    segment: Segment,
    segments: u32,
    ack_at: Instant,
}

pub struct Simulation {
    meta: MetaConnection,
    scheduler: Box<dyn Scheduler>,
    start: Instant,
    duration_limit: Duration,
    total_bytes: u64,
    chunk_size: usize,
    /// Bytes the application has written so far.
    written: u64,
    /// Highest sequence number sent.
    snd_nxt: u64,
    in_flight: Vec<InFlight>,
    /// Acknowledged ranges above `snd_una`, start to end.
    out_of_order: BTreeMap<u64, u64>,
    /// Acked segments counted towards the next window increase in
    /// congestion avoidance.
    cwnd_cnt: HashMap<PathId, u32>,
    failures: Vec<(Duration, PathId)>,
    report: Report,
}

impl Simulation {
    pub fn new(scenario: &Scenario, scheduler: Box<dyn Scheduler>) -> Result<Self, Error> {
        let mut meta = MetaConnection::new();
        meta.set_sndbuf(scenario.send_buffer)
            .set_snd_wnd(scenario.receive_window);

        let mut failures = Vec::new();
        let mut paths = Vec::with_capacity(scenario.paths.len());
        for (index, spec) in scenario.paths.iter().enumerate() {
            let index = u8::try_from(index)
                .map_err(|_| Error::Scenario(format!("path index {index} out of range")))?;
            let id = PathId::from(index);
            meta.add_path(spec.to_path(id))?;
            if let Some(at) = spec.fail_at() {
                failures.push((at, id));
            }
            paths.push(PathReport {
                path: index,
                ..Default::default()
            });
        }

        let report = Report {
            scheduler: scheduler.name().to_owned(),
            r_beta: mpbase::param::ecf_r_beta(),
            total_bytes: scenario.total_bytes,
            paths,
            ..Default::default()
        };
        Ok(Self {
            meta,
            scheduler,
            start: Instant::now(),
            duration_limit: Duration::from_millis(scenario.duration_limit_ms),
            total_bytes: scenario.total_bytes,
            chunk_size: scenario.chunk_size,
            written: 0,
            snd_nxt: 0,
            in_flight: Vec::new(),
            out_of_order: BTreeMap::new(),
            cwnd_cnt: HashMap::new(),
            failures,
            report,
        })
    }

    pub fn run(mut self) -> Report {
        self.scheduler.init(&self.meta, self.start);

        let mut elapsed = Duration::ZERO;
        while elapsed <= self.duration_limit {
            let now = self.start + elapsed;
            self.fail_paths(elapsed);
            self.deliver_acks(now);
            self.write();

            if self.meta.snd_una() >= self.total_bytes {
                let ms = elapsed.as_millis() as u64;
                tracing::info!(target: "sim", ms, "transfer complete");
                self.report.completion_ms = Some(ms);
                break;
            }
            self.schedule(now);
            elapsed += TICK;
        }
        self.finish()
    }

    fn fail_paths(&mut self, elapsed: Duration) {
        let failing = self
            .failures
            .iter()
            .filter(|(at, _)| *at == elapsed)
            .map(|(_, id)| *id)
            .collect::<Vec<_>>();

        for id in failing {
            let Some(path) = self.meta.path_mut(id) else {
                continue;
            };
            path.set_potentially_failed(true)
                .set_can_send(false)
                .set_in_flight(0)
                .set_packets_out(0)
                .set_wmem_queued(0);

            let snd_una = self.meta.snd_una();
            let (lost, kept) = std::mem::take(&mut self.in_flight)
                .into_iter()
                .partition::<Vec<_>, _>(|flight| flight.path == id);
            self.in_flight = kept;
            tracing::debug!(target: "sim", %id, lost = lost.len(), "path failed");

            for flight in lost {
                if flight.segment.end_seq() > snd_una {
                    self.meta.reinject_queue_mut().push_back(flight.segment);
                }
            }
            if let Some(report) = self.report.paths.get_mut(id.index() as usize) {
                report.failed = true;
            }
            self.refresh();
        }
    }

    fn deliver_acks(&mut self, now: Instant) {
        let (arrived, pending) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition::<Vec<_>, _>(|flight| flight.ack_at <= now);
        self.in_flight = pending;

        for flight in arrived {
            if let Some(path) = self.meta.path_mut(flight.path) {
                let in_flight = path.in_flight().saturating_sub(flight.segments);
                let packets_out = path.packets_out().saturating_sub(flight.segments);
                let wmem_queued = path.wmem_queued().saturating_sub(flight.segment.len());
                path.set_in_flight(in_flight)
                    .set_packets_out(packets_out)
                    .set_wmem_queued(wmem_queued);
                let cnt = self.cwnd_cnt.entry(flight.path).or_default();
                grow_cwnd(path, flight.segments, cnt);
            }
            self.on_acked(flight.segment.seq(), flight.segment.end_seq());
        }
        self.refresh();
    }

    fn on_acked(&mut self, seq: u64, end: u64) {
        let mut snd_una = self.meta.snd_una();
        if end <= snd_una {
            return;
        }
        let start = seq.max(snd_una);
        let range_end = self.out_of_order.entry(start).or_insert(end);
        *range_end = (*range_end).max(end);

        while let Some((&start, &end)) = self.out_of_order.first_key_value() {
            if start > snd_una {
                break;
            }
            snd_una = snd_una.max(end);
            self.out_of_order.pop_first();
        }
        self.meta.set_snd_una(snd_una);

        let rtx_queue = self.meta.rtx_queue_mut();
        while let Some(front) = rtx_queue.front_mut() {
            if front.end_seq() <= snd_una {
                rtx_queue.pop_front();
                continue;
            }
            if front.seq() < snd_una {
                front.split_to((snd_una - front.seq()) as usize);
            }
            break;
        }
        self.meta
            .reinject_queue_mut()
            .retain(|segment| segment.end_seq() > snd_una);
    }

    /// The application writes as much as the send buffer takes.
    fn write(&mut self) {
        while self.written < self.total_bytes {
            let len = self
                .chunk_size
                .min((self.total_bytes - self.written) as usize);
            if self.meta.wmem_queued() + len > self.meta.sndbuf() {
                self.meta.set_write_blocked(true);
                return;
            }
            let payload = Bytes::from(vec![0; len]);
            let segment = if self.written + len as u64 == self.total_bytes {
                Segment::data_fin(self.written, payload)
            } else {
                Segment::new(self.written, payload)
            };
            self.meta.send_queue_mut().push_back(segment);
            self.written += len as u64;
            self.refresh();
        }
        self.meta.set_write_blocked(false);
    }

    fn schedule(&mut self, now: Instant) {
        for _ in 0..MAX_TRANSMITS_PER_TICK {
            match self.scheduler.next_segment(&mut self.meta, now) {
                Some(transmit) => self.commit(transmit, now),
                None => {
                    if !self.meta.send_queue().is_empty() || !self.meta.reinject_queue().is_empty()
                    {
                        self.report.no_path += 1;
                    }
                    return;
                }
            }
        }
    }

    fn commit(&mut self, transmit: Transmit, now: Instant) {
        let Transmit {
            segment,
            path,
            limit,
            reinjection,
        } = transmit;

        let sent = match reinjection {
            Reinjection::Regular => take_front(self.meta.send_queue_mut(), limit),
            Reinjection::Reinjected => take_front(self.meta.reinject_queue_mut(), limit),
            Reinjection::Optimized => {
                let mut segment = segment;
                Some(if limit < segment.len() {
                    segment.split_to(limit)
                } else {
                    segment
                })
            }
        };
        let Some(mut sent) = sent else {
            return;
        };
        sent.mark_sent_on(path);

        let Some(subflow) = self.meta.path_mut(path) else {
            return;
        };
        let segments = sent.len().div_ceil(subflow.mss().max(1)) as u32;
        let in_flight = subflow.in_flight() + segments;
        let packets_out = subflow.packets_out() + segments;
        let wmem_queued = subflow.wmem_queued() + sent.len();
        subflow
            .set_in_flight(in_flight)
            .set_packets_out(packets_out)
            .set_wmem_queued(wmem_queued);
        let ack_at = now + subflow.srtt();

        match reinjection {
            Reinjection::Regular => {
                self.snd_nxt = self.snd_nxt.max(sent.end_seq());
                self.meta.rtx_queue_mut().push_back(sent.clone());
                self.report.regular += 1;
            }
            Reinjection::Reinjected | Reinjection::Optimized => {
                for queued in self.meta.rtx_queue_mut().iter_mut() {
                    if queued.seq() < sent.end_seq() && sent.seq() < queued.end_seq() {
                        queued.mark_sent_on(path);
                    }
                }
                if reinjection == Reinjection::Reinjected {
                    self.report.reinjected += 1;
                } else {
                    self.report.optimized += 1;
                }
            }
        }
        if let Some(report) = self.report.paths.get_mut(path.index() as usize) {
            report.bytes += sent.len() as u64;
            report.segments += u64::from(segments);
        }

        tracing::trace!(
            target: "sim",
            %path,
            seq = sent.seq(),
            len = sent.len(),
            ?reinjection,
            "transmit"
        );
        self.in_flight.push(InFlight {
            path,
            segment: sent,
            segments,
            ack_at,
        });
        self.refresh();
    }

    /// Recomputes the connection aggregates the schedulers read.
    fn refresh(&mut self) {
        let snd_una = self.meta.snd_una();
        self.meta
            .set_wmem_queued(self.written.saturating_sub(snd_una) as usize);
        let packets_out = self.meta.paths().iter().map(Path::packets_out).sum();
        self.meta.set_packets_out(packets_out);

        let window = (snd_una + self.meta.snd_wnd()).saturating_sub(self.snd_nxt) as usize;
        for path in self.meta.paths_mut() {
            path.set_send_window(window);
        }
    }

    fn finish(mut self) -> Report {
        self.report.delivered_bytes = self.meta.snd_una();
        for path in self.meta.paths() {
            if let Some(report) = self.report.paths.get_mut(path.id().index() as usize) {
                report.final_cwnd = path.cwnd();
            }
        }
        self.report
    }
}

fn take_front(queue: &mut VecDeque<Segment>, limit: usize) -> Option<Segment> {
    let front = queue.front_mut()?;
    if limit < front.len() {
        Some(front.split_to(limit))
    } else {
        queue.pop_front()
    }
}

fn grow_cwnd(path: &mut Path, acked: u32, cnt: &mut u32) {
    for _ in 0..acked {
        if path.in_slow_start() {
            path.set_cwnd(path.cwnd().saturating_add(1));
        } else {
            *cnt += 1;
            if *cnt >= path.cwnd() {
                *cnt = 0;
                path.set_cwnd(path.cwnd().saturating_add(1));
            }
        }
    }
}
