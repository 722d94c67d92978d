use std::collections::VecDeque;

use getset::{CopyGetters, Getters, MutGetters, Setters};

use crate::{
    error::Error,
    path::{Path, PathId, PathMask},
    segment::Segment,
};

const DEFAULT_SNDBUF: usize = 4 << 20;
const DEFAULT_SND_WND: u64 = 1 << 20;

/// How the connection maps its stream onto the subflows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mapping {
    /// Data is split across all subflows.
    #[default]
    Multipath,
    /// Fallback to a single subflow carrying the stream as is, splitting and
    /// reinjection are off.
    Infinite,
}

/// The connection-level ("meta") view of a multipath stream.
///
/// Owns its paths and the three queues a scheduler draws from:
/// - the send queue, bytes the application wrote that were never sent,
/// - the reinjection queue, bytes that must be delivered again over another
///   path, it always goes first,
/// - the retransmission queue, bytes sent but not acknowledged at the
///   connection level yet.
#[derive(Getters, MutGetters, CopyGetters, Setters, Debug, Clone)]
pub struct MetaConnection {
    paths: Vec<Path>,
    #[getset(get = "pub", get_mut = "pub")]
    send_queue: VecDeque<Segment>,
    #[getset(get = "pub", get_mut = "pub")]
    reinject_queue: VecDeque<Segment>,
    #[getset(get = "pub", get_mut = "pub")]
    rtx_queue: VecDeque<Segment>,
    /// Bytes held by the connection, unsent plus unacknowledged.
    #[getset(get_copy = "pub", set = "pub")]
    wmem_queued: usize,
    #[getset(get_copy = "pub", set = "pub")]
    sndbuf: usize,
    #[getset(get_copy = "pub", set = "pub")]
    packets_out: u32,
    #[getset(get_copy = "pub", set = "pub")]
    snd_una: u64,
    /// Receive window advertised by the peer, counted from `snd_una`.
    #[getset(get_copy = "pub", set = "pub")]
    snd_wnd: u64,
    #[getset(get_copy = "pub", set = "pub")]
    rcv_shutdown: bool,
    /// The path the peer's data-fin arrived on.
    #[getset(get_copy = "pub", set = "pub")]
    dfin_path: Option<PathId>,
    #[getset(get_copy = "pub", set = "pub")]
    mapping: Mapping,
    /// The application is waiting for send buffer space.
    #[getset(get_copy = "pub", set = "pub")]
    write_blocked: bool,
}

impl Default for MetaConnection {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            send_queue: VecDeque::new(),
            reinject_queue: VecDeque::new(),
            rtx_queue: VecDeque::new(),
            wmem_queued: 0,
            sndbuf: DEFAULT_SNDBUF,
            packets_out: 0,
            snd_una: 0,
            snd_wnd: DEFAULT_SND_WND,
            rcv_shutdown: false,
            dfin_path: None,
            mapping: Mapping::Multipath,
            write_blocked: false,
        }
    }
}

impl MetaConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_path(&mut self, path: Path) -> Result<(), Error> {
        let id = path.id();
        if id.index() >= PathMask::WIDTH {
            return Err(Error::PathIndexOverflow(id.index()));
        }
        if self.path(id).is_some() {
            return Err(Error::DuplicatePath(id));
        }
        tracing::debug!(target: "meta", %id, "add path");
        self.paths.push(path);
        Ok(())
    }

    pub fn remove_path(&mut self, id: PathId) -> Result<Path, Error> {
        let idx = self
            .paths
            .iter()
            .position(|path| path.id() == id)
            .ok_or(Error::UnknownPath(id))?;
        tracing::debug!(target: "meta", %id, "remove path");
        Ok(self.paths.remove(idx))
    }

    /// Paths in the order they were added, which is also the tie-break order
    /// of every scheduler.
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> impl Iterator<Item = &mut Path> {
        self.paths.iter_mut()
    }

    pub fn path(&self, id: PathId) -> Option<&Path> {
        self.paths.iter().find(|path| path.id() == id)
    }

    pub fn path_mut(&mut self, id: PathId) -> Option<&mut Path> {
        self.paths.iter_mut().find(|path| path.id() == id)
    }

    pub fn is_fallback(&self) -> bool {
        self.mapping == Mapping::Infinite
    }

    /// The first byte range that was never sent.
    pub fn send_head(&self) -> Option<&Segment> {
        self.send_queue.front()
    }

    pub fn rtx_head(&self) -> Option<&Segment> {
        self.rtx_queue.front()
    }

    /// The send buffer still has room, the application is not the bottleneck.
    pub fn is_memory_free(&self) -> bool {
        self.wmem_queued < self.sndbuf
    }

    /// The application blocked on a full send buffer and less than a third of
    /// the buffer is free: the receiver is not draining fast enough.
    pub fn is_send_buffer_blocked(&self) -> bool {
        let wspace = self.sndbuf.saturating_sub(self.wmem_queued);
        let min_wspace = self.wmem_queued / 2;
        self.write_blocked && wspace < min_wspace
    }

    /// Whether the first `mss` bytes of `segment` fit in the peer's receive
    /// window.
    pub fn fits_send_window(&self, segment: &Segment, mss: usize) -> bool {
        let end = segment.seq().saturating_add(segment.len().min(mss) as u64);
        end <= self.snd_una.saturating_add(self.snd_wnd)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_add_remove_path() {
        let mut meta = MetaConnection::new();
        meta.add_path(Path::new(PathId::from(0))).unwrap();
        meta.add_path(Path::new(PathId::from(1))).unwrap();
        assert_eq!(
            meta.add_path(Path::new(PathId::from(1))),
            Err(Error::DuplicatePath(PathId::from(1)))
        );
        assert_eq!(
            meta.add_path(Path::new(PathId::from(64))),
            Err(Error::PathIndexOverflow(64))
        );
        assert_eq!(meta.paths().len(), 2);

        let removed = meta.remove_path(PathId::from(0)).unwrap();
        assert_eq!(removed.id(), PathId::from(0));
        assert_eq!(meta.paths()[0].id(), PathId::from(1));
        assert_eq!(
            meta.remove_path(PathId::from(0)),
            Err(Error::UnknownPath(PathId::from(0)))
        );
    }

    #[test]
    fn test_send_buffer_blocked() {
        let mut meta = MetaConnection::new();
        meta.set_sndbuf(3000).set_wmem_queued(2500);
        assert!(meta.is_memory_free());
        // not blocked unless the writer waits for space
        assert!(!meta.is_send_buffer_blocked());

        meta.set_write_blocked(true);
        // wspace 500 < min_wspace 1250
        assert!(meta.is_send_buffer_blocked());

        meta.set_wmem_queued(1000);
        // wspace 2000 >= min_wspace 500
        assert!(!meta.is_send_buffer_blocked());

        meta.set_wmem_queued(3000);
        assert!(!meta.is_memory_free());
    }

    #[test]
    fn test_fits_send_window() {
        let mut meta = MetaConnection::new();
        meta.set_snd_una(1000).set_snd_wnd(2000);

        let segment = Segment::new(2000, Bytes::from(vec![0u8; 5000]));
        // only the first mss is checked
        assert!(meta.fits_send_window(&segment, 1000));
        assert!(!meta.fits_send_window(&segment, 1001));

        let beyond = Segment::new(3000, Bytes::from_static(b"x"));
        assert!(!meta.fits_send_window(&beyond, 1000));
    }

    #[test]
    fn test_fits_send_window_near_max() {
        let mut meta = MetaConnection::new();
        meta.set_snd_una(u64::MAX - 10).set_snd_wnd(1000);

        let segment = Segment::new(u64::MAX - 5, Bytes::from(vec![0u8; 100]));
        assert!(meta.fits_send_window(&segment, 1000));

        meta.set_snd_una(0).set_snd_wnd(1000);
        assert!(!meta.fits_send_window(&segment, 1000));
    }
}
