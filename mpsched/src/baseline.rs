use mpbase::{MetaConnection, PathId, Segment};

/// The path a baseline policy would pick for `unit`.
///
/// ECF only arbitrates between this pick and the fastest path, it never
/// chooses on its own. Any closure with the same signature works as a
/// baseline, which is how tests feed synthetic picks.
pub trait BaselineSelector: Send {
    fn select(
        &self,
        meta: &MetaConnection,
        unit: Option<&Segment>,
        zero_window_probe: bool,
    ) -> Option<PathId>;
}

impl<F> BaselineSelector for F
where
    F: Fn(&MetaConnection, Option<&Segment>, bool) -> Option<PathId> + Send,
{
    fn select(
        &self,
        meta: &MetaConnection,
        unit: Option<&Segment>,
        zero_window_probe: bool,
    ) -> Option<PathId> {
        self(meta, unit, zero_window_probe)
    }
}

/// Lowest smoothed RTT among the available paths, regular paths first and
/// backup paths only when no regular path can take the unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct MinRtt;

impl BaselineSelector for MinRtt {
    fn select(
        &self,
        meta: &MetaConnection,
        unit: Option<&Segment>,
        zero_window_probe: bool,
    ) -> Option<PathId> {
        if let Some(path) = data_fin_path(meta, unit, zero_window_probe) {
            return Some(path);
        }
        lowest_rtt(meta, unit, zero_window_probe, false)
            .or_else(|| lowest_rtt(meta, unit, zero_window_probe, true))
    }
}

fn lowest_rtt(
    meta: &MetaConnection,
    unit: Option<&Segment>,
    zero_window_probe: bool,
    backup: bool,
) -> Option<PathId> {
    meta.paths()
        .iter()
        .filter(|path| path.backup() == backup && path.is_available(unit, zero_window_probe))
        .min_by_key(|path| path.srtt())
        .map(|path| path.id())
}

/// Answer a data-fin on the path the peer's data-fin came from.
pub(crate) fn data_fin_path(
    meta: &MetaConnection,
    unit: Option<&Segment>,
    zero_window_probe: bool,
) -> Option<PathId> {
    let unit = unit.filter(|unit| unit.is_data_fin())?;
    if !meta.rcv_shutdown() {
        return None;
    }
    let path = meta.path(meta.dfin_path()?)?;
    path.is_available(Some(unit), zero_window_probe)
        .then(|| path.id())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use mpbase::Path;

    use super::*;

    fn path(id: u8, rtt_ms: u64) -> Path {
        let mut path = Path::new(PathId::from(id));
        path.set_srtt(Duration::from_millis(rtt_ms));
        path
    }

    #[test]
    fn test_lowest_rtt_first_seen() {
        let mut meta = MetaConnection::new();
        meta.add_path(path(0, 30)).unwrap();
        meta.add_path(path(1, 10)).unwrap();
        meta.add_path(path(2, 10)).unwrap();
        assert_eq!(MinRtt.select(&meta, None, false), Some(PathId::from(1)));

        meta.path_mut(PathId::from(1)).unwrap().set_in_flight(10);
        assert_eq!(MinRtt.select(&meta, None, false), Some(PathId::from(2)));
        // a probe ignores the full window
        assert_eq!(MinRtt.select(&meta, None, true), Some(PathId::from(1)));
    }

    #[test]
    fn test_backup_only_as_last_resort() {
        let mut meta = MetaConnection::new();
        let mut backup = path(0, 5);
        backup.set_backup(true);
        meta.add_path(backup).unwrap();
        meta.add_path(path(1, 50)).unwrap();
        assert_eq!(MinRtt.select(&meta, None, false), Some(PathId::from(1)));

        meta.path_mut(PathId::from(1)).unwrap().set_can_send(false);
        assert_eq!(MinRtt.select(&meta, None, false), Some(PathId::from(0)));

        meta.path_mut(PathId::from(0)).unwrap().set_potentially_failed(true);
        assert_eq!(MinRtt.select(&meta, None, false), None);
    }

    #[test]
    fn test_skip_paths_carrying_the_unit() {
        let mut meta = MetaConnection::new();
        meta.add_path(path(0, 10)).unwrap();
        meta.add_path(path(1, 20)).unwrap();
        let mut unit = Segment::new(0, Bytes::from_static(b"data"));
        unit.mark_sent_on(PathId::from(0));
        assert_eq!(MinRtt.select(&meta, Some(&unit), false), Some(PathId::from(1)));
    }

    #[test]
    fn test_data_fin_same_path() {
        let mut meta = MetaConnection::new();
        meta.add_path(path(0, 10)).unwrap();
        meta.add_path(path(1, 80)).unwrap();
        meta.set_rcv_shutdown(true).set_dfin_path(Some(PathId::from(1)));

        let fin = Segment::data_fin(0, Bytes::new());
        assert_eq!(MinRtt.select(&meta, Some(&fin), false), Some(PathId::from(1)));

        let data = Segment::new(0, Bytes::from_static(b"data"));
        assert_eq!(MinRtt.select(&meta, Some(&data), false), Some(PathId::from(0)));

        // the fin path is unavailable, fall back to the usual choice
        meta.path_mut(PathId::from(1)).unwrap().set_in_flight(10);
        assert_eq!(MinRtt.select(&meta, Some(&fin), false), Some(PathId::from(0)));
    }

    #[test]
    fn test_closure_baseline() {
        let mut meta = MetaConnection::new();
        meta.add_path(path(0, 10)).unwrap();
        let baseline = |_: &MetaConnection, _: Option<&Segment>, _: bool| Some(PathId::from(7));
        assert_eq!(baseline.select(&meta, None, false), Some(PathId::from(7)));
    }
}
