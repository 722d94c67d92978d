use std::{fs, path::Path as FsPath, time::Duration};

use mpbase::{
    Path, PathId, PathMask,
    param::Parameters,
    path::{DEFAULT_MSS, INFINITE_SSTHRESH, INIT_CWND, cwnd_clamp_for_rate, rate_from_exponent},
};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A transfer over a fixed set of paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub paths: Vec<PathSpec>,
    pub total_bytes: u64,
    /// Bytes the application writes at once.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
    #[serde(default = "default_receive_window")]
    pub receive_window: u64,
    #[serde(default = "default_duration_limit_ms")]
    pub duration_limit_ms: u64,
    #[serde(default)]
    pub params: Parameters,
}

fn default_chunk_size() -> usize {
    DEFAULT_MSS
}

fn default_send_buffer() -> usize {
    4 << 20
}

fn default_receive_window() -> u64 {
    1 << 20
}

fn default_duration_limit_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSpec {
    pub rtt_ms: u64,
    #[serde(default)]
    pub rttvar_ms: u64,
    #[serde(default = "default_cwnd")]
    pub cwnd: u32,
    #[serde(default)]
    pub ssthresh: Option<u32>,
    #[serde(default = "default_mss")]
    pub mss: usize,
    #[serde(default)]
    pub gso_max_segs: u16,
    /// Bandwidth cap in kbps.
    #[serde(default)]
    pub rate_kbps: Option<u32>,
    /// Bandwidth cap as `2^rate_exponent` kbps, ignored with `rate_kbps`.
    #[serde(default)]
    pub rate_exponent: Option<u8>,
    #[serde(default)]
    pub backup: bool,
    /// The path stops working at this time, its data in flight is lost.
    #[serde(default)]
    pub fail_at_ms: Option<u64>,
}

fn default_cwnd() -> u32 {
    INIT_CWND
}

fn default_mss() -> usize {
    DEFAULT_MSS
}

impl Scenario {
    pub fn from_file(path: &FsPath) -> Result<Self, Error> {
        let json = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let scenario: Self = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.paths.is_empty() {
            return Err(Error::Scenario("no paths".to_owned()));
        }
        if self.paths.len() > PathMask::WIDTH as usize {
            return Err(Error::Scenario(format!(
                "{} paths, at most {} are supported",
                self.paths.len(),
                PathMask::WIDTH
            )));
        }
        if self.total_bytes == 0 || self.chunk_size == 0 {
            return Err(Error::Scenario("nothing to transfer".to_owned()));
        }
        if let Some(index) = self.paths.iter().position(|path| path.mss == 0) {
            return Err(Error::Scenario(format!("path {index} has a zero mss")));
        }
        self.params.validate()?;
        Ok(())
    }
}

impl PathSpec {
    pub fn rate_kbps(&self) -> Option<u32> {
        self.rate_kbps
            .or_else(|| self.rate_exponent.map(rate_from_exponent))
    }

    pub fn fail_at(&self) -> Option<Duration> {
        self.fail_at_ms.map(Duration::from_millis)
    }

    /// The path as the connection sees it right after the handshake.
    pub fn to_path(&self, id: PathId) -> Path {
        let srtt = Duration::from_millis(self.rtt_ms);
        let mut path = Path::new(id);
        path.set_srtt(srtt)
            .set_rttvar(Duration::from_millis(self.rttvar_ms))
            .set_ssthresh(self.ssthresh.unwrap_or(INFINITE_SSTHRESH))
            .set_mss(self.mss)
            .set_gso_max_segs(self.gso_max_segs)
            .set_backup(self.backup);
        if let Some(clamp) = self
            .rate_kbps()
            .and_then(|rate| cwnd_clamp_for_rate(rate, srtt, self.mss))
        {
            path.set_cwnd_clamp(clamp);
        }
        path.set_cwnd(self.cwnd);
        path
    }
}
