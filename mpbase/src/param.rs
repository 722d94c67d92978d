//! Tunables of the schedulers.
//!
//! `r_beta` is the inverse of the ECF beta factor: the fastest path wins
//! unless the slower one finishes within `1 + 1/r_beta` of it. It has
//! process scope: set once by the host, read on every estimation.

use std::{
    ops::RangeInclusive,
    sync::atomic::{AtomicU32, Ordering},
};

use derive_builder::Builder;
use getset::CopyGetters;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// beta = 1 / r_beta = 0.25
pub const DEFAULT_R_BETA: u32 = 4;
pub const R_BETA_BOUNDS: RangeInclusive<u32> = 1..=1024;

static ECF_R_BETA: AtomicU32 = AtomicU32::new(DEFAULT_R_BETA);

/// The process-wide `r_beta`.
pub fn ecf_r_beta() -> u32 {
    ECF_R_BETA.load(Ordering::Relaxed)
}

/// Replaces the process-wide `r_beta`, rejecting values out of
/// [`R_BETA_BOUNDS`].
pub fn set_ecf_r_beta(r_beta: u32) -> Result<(), Error> {
    check_r_beta(r_beta)?;
    tracing::info!(target: "param", r_beta, "set ecf r_beta");
    ECF_R_BETA.store(r_beta, Ordering::Relaxed);
    Ok(())
}

fn check_r_beta(r_beta: u32) -> Result<(), Error> {
    if !R_BETA_BOUNDS.contains(&r_beta) {
        return Err(Error::RBetaOutOfBounds(r_beta, R_BETA_BOUNDS));
    }
    Ok(())
}

/// Scheduler parameters as read from a configuration file.
#[derive(Builder, CopyGetters, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[builder(default, setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct Parameters {
    #[getset(get_copy = "pub")]
    r_beta: u32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            r_beta: DEFAULT_R_BETA,
        }
    }
}

impl Parameters {
    pub fn builder() -> ParametersBuilder {
        ParametersBuilder::default()
    }

    /// Deserialization bypasses the builder, values read from a file have to
    /// be checked with this before use.
    pub fn validate(&self) -> Result<(), Error> {
        check_r_beta(self.r_beta)
    }

    /// Publishes these parameters process-wide.
    pub fn apply(&self) -> Result<(), Error> {
        set_ecf_r_beta(self.r_beta)
    }
}

impl ParametersBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.r_beta {
            Some(r_beta) => check_r_beta(r_beta).map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }
}
