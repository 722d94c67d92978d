use std::time::{Duration, Instant};

use bytes::Bytes;
use mpbase::{MetaConnection, Path, PathId, Segment};
use mpsched::{
    EcfScheduler, Reinjection, Scheduler, SchedulerState, rebuffer::rcv_buf_optimization,
    registry::Registry,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

const MSS: usize = 1000;
const FAST: PathId = PathId::new(0);
const SLOW: PathId = PathId::new(1);

fn path(id: PathId, srtt: Duration, cwnd: u32) -> Path {
    let mut path = Path::new(id);
    path.set_srtt(srtt).set_rttvar(Duration::ZERO).set_mss(MSS);
    path.set_cwnd(cwnd);
    path
}

/// The fast path has a full window, the slow one has room.
fn connection(slow_rtt: Duration, backlog: usize) -> MetaConnection {
    let mut meta = MetaConnection::new();
    let mut fast = path(FAST, Duration::from_millis(10), 10);
    fast.set_in_flight(10);
    meta.add_path(fast).unwrap();
    meta.add_path(path(SLOW, slow_rtt, 10)).unwrap();
    meta.set_wmem_queued(backlog);
    meta
}

#[test]
fn fastest_available_path_no_estimation() {
    let mut meta = connection(Duration::from_millis(40), 20_000);
    meta.path_mut(FAST).unwrap().set_in_flight(0);

    let mut ecf = EcfScheduler::default().with_r_beta(4);
    for _ in 0..3 {
        assert_eq!(ecf.get_subflow(&meta, None, false), Some(FAST));
        assert_eq!(ecf.state().switching_margin(), 0);
    }
}

#[test]
fn wait_is_sticky() {
    let meta = connection(Duration::from_millis(40), 20_000);
    let mut ecf = EcfScheduler::default().with_r_beta(4);
    assert_eq!(ecf.get_subflow(&meta, None, false), None);
    assert_eq!(ecf.state().switching_margin(), 1);
    assert_eq!(ecf.get_subflow(&meta, None, false), None);
    assert_eq!(ecf.state().switching_margin(), 1);
}

#[test]
fn analytic_threshold() {
    for backlog in (0..=60_000).step_by(500) {
        let meta = connection(Duration::from_millis(40), backlog);
        let mut ecf = EcfScheduler::default().with_r_beta(4);
        let expected = if backlog < 30_000 { None } else { Some(SLOW) };
        assert_eq!(ecf.get_subflow(&meta, None, false), expected, "backlog {backlog}");
        assert_eq!(
            ecf.state().switching_margin(),
            u32::from(backlog < 30_000),
            "backlog {backlog}"
        );
    }
}

#[test]
fn hysteresis() {
    // unscaled threshold at 45 ms for a 35000 bytes backlog
    let mut ecf = EcfScheduler::default().with_r_beta(4);
    let mut decisions = Vec::new();
    for i in 0..20 {
        let slow_rtt = if i % 2 == 0 { 44_000 } else { 46_000 };
        let meta = connection(Duration::from_micros(slow_rtt), 35_000);
        decisions.push(ecf.get_subflow(&meta, None, false));
    }
    assert_eq!(decisions[0], Some(SLOW));
    assert!(decisions[1..].iter().all(Option::is_none));

    let flips = decisions.windows(2).filter(|w| w[0] != w[1]).count();
    assert_eq!(flips, 1);
}

#[test]
fn reinjection_before_regular() {
    let mut meta = connection(Duration::from_millis(40), 0);
    meta.path_mut(FAST).unwrap().set_in_flight(0);
    meta.send_queue_mut()
        .push_back(Segment::new(1000, Bytes::from_static(&[1; 500])));
    meta.reinject_queue_mut()
        .push_back(Segment::new(0, Bytes::from_static(&[2; 500])));

    let mut ecf = EcfScheduler::default().with_r_beta(4);
    let transmit = ecf.next_segment(&mut meta, Instant::now()).unwrap();
    assert_eq!(transmit.reinjection, Reinjection::Reinjected);
    assert_eq!(transmit.segment.seq(), 0);
    assert_eq!(transmit.path, FAST);
}

#[test]
fn limit_bounds_randomized() {
    let mut rng = StdRng::seed_from_u64(0x6563_66);
    let now = Instant::now();
    for _ in 0..1000 {
        let mut meta = MetaConnection::new();
        let mut only = path(FAST, Duration::from_millis(rng.random_range(1..200)), 0);
        let cwnd = rng.random_range(1..64);
        only.set_cwnd(cwnd)
            .set_in_flight(rng.random_range(0..cwnd))
            .set_mss(rng.random_range(500..1500))
            .set_gso_max_segs(rng.random_range(0..16))
            .set_send_window(rng.random_range(0..100_000));
        let mss = only.mss();
        let quota = only.cwnd_quota() as usize;
        let window = only.send_window();
        meta.add_path(only).unwrap();

        let len = rng.random_range(1..50_000);
        meta.send_queue_mut()
            .push_back(Segment::new(0, Bytes::from(vec![0; len])));
        meta.set_wmem_queued(len);

        let mut ecf = EcfScheduler::default().with_r_beta(4);
        let Some(transmit) = ecf.next_segment(&mut meta, now) else {
            continue;
        };
        assert!(transmit.limit > 0);
        assert!(transmit.limit <= len);
        assert!(transmit.limit <= (quota * mss).min(window));
    }
}

#[test]
fn rebuffer_halves_once_per_rtt_randomized() {
    let mut rng = StdRng::seed_from_u64(7);
    let srtt = Duration::from_millis(20);
    let start = Instant::now();

    let mut meta = MetaConnection::new();
    meta.add_path(path(FAST, srtt, 10)).unwrap();
    meta.add_path(path(SLOW, Duration::from_millis(200), 1 << 16)).unwrap();
    let mut head = Segment::new(0, Bytes::from_static(&[0; 1000]));
    head.mark_sent_on(SLOW);
    meta.rtx_queue_mut().push_back(head);

    let mut state = SchedulerState::new();
    let mut halvings = Vec::new();
    let mut elapsed = Duration::ZERO;
    for _ in 0..200 {
        elapsed += Duration::from_millis(rng.random_range(0..15));
        let prior = meta.path(SLOW).unwrap().cwnd();
        rcv_buf_optimization(&mut meta, &mut state, FAST, true, start + elapsed);
        if meta.path(SLOW).unwrap().cwnd() < prior {
            halvings.push(elapsed);
        }
    }

    assert!(!halvings.is_empty());
    assert!(halvings.windows(2).all(|w| w[1] - w[0] >= srtt));
}

#[test]
fn registry_builds_independent_instances() {
    let registry = Registry::builtin();
    let meta = connection(Duration::from_millis(40), 20_000);

    let mut first = registry.create("ecf").unwrap();
    let mut second = registry.create("ecf").unwrap();
    assert_eq!(first.get_subflow(&meta, None, false), None);

    // 35000 bytes are past the 30000 threshold only without margin
    let meta = connection(Duration::from_millis(40), 35_000);
    second.init(&meta, Instant::now());
    assert_eq!(second.get_subflow(&meta, None, false), Some(SLOW));
    // the margin of the first one survives the init of the second
    assert_eq!(first.get_subflow(&meta, None, false), None);
    // the default scheduler never waits
    let mut default = registry.create("default").unwrap();
    assert_eq!(default.get_subflow(&meta, None, false), Some(SLOW));
}
