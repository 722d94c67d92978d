use std::fmt;

use serde::Serialize;

/// Outcome of one simulated transfer.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Report {
    pub scheduler: String,
    pub r_beta: u32,
    pub total_bytes: u64,
    /// Bytes acknowledged at the connection level.
    pub delivered_bytes: u64,
    /// `None` if the duration limit was hit first.
    pub completion_ms: Option<u64>,
    pub regular: u64,
    pub reinjected: u64,
    pub optimized: u64,
    /// Scheduling opportunities with data queued where no path was chosen.
    pub no_path: u64,
    pub paths: Vec<PathReport>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PathReport {
    pub path: u8,
    pub bytes: u64,
    pub segments: u64,
    pub final_cwnd: u32,
    pub failed: bool,
}

impl Report {
    pub fn is_complete(&self) -> bool {
        self.completion_ms.is_some()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scheduler: {} (r_beta {})", self.scheduler, self.r_beta)?;
        match self.completion_ms {
            Some(ms) => writeln!(f, "completed {} bytes in {ms} ms", self.total_bytes)?,
            None => writeln!(
                f,
                "incomplete: {} of {} bytes delivered",
                self.delivered_bytes, self.total_bytes
            )?,
        }
        writeln!(
            f,
            "transmits: {} regular, {} reinjected, {} optimized, {} without path",
            self.regular, self.reinjected, self.optimized, self.no_path
        )?;
        for path in &self.paths {
            writeln!(
                f,
                "  path#{}: {} bytes in {} segments, cwnd {}{}",
                path.path,
                path.bytes,
                path.segments,
                path.final_cwnd,
                if path.failed { ", failed" } else { "" }
            )?;
        }
        Ok(())
    }
}
