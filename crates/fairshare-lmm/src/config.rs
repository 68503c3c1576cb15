// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! # System Configuration
//!
//! Everything that used to be process-wide state of a sharing engine lives
//! in a `SystemConfig` owned by each `System`: the comparison precision,
//! whether solves are restricted to the dirty part of the system, the
//! concurrency limit given to new constraints, and the algorithm `solve`
//! dispatches to.
//!
//! ## Usage
//!
//! ```rust
//! use fairshare_lmm::config::{Algorithm, SystemConfigBuilder};
//!
//! let config = SystemConfigBuilder::new()
//!     .with_precision(1e-9)
//!     .with_selective_update(true)
//!     .with_algorithm("reno".parse().unwrap())
//!     .build()
//!     .unwrap();
//! assert!(config.selective_update());
//! assert_eq!(config.algorithm().to_string(), "lagrange-reno");
//! ```

use crate::error::LmmError;
use crate::lagrange::utility::UtilityKind;
use fairshare_core::num::precision::{Precision, DEFAULT_MAXMIN_PRECISION};

/// The solver used by `System::solve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// Weighted max-min fairness by progressive saturation.
    #[default]
    MaxMin,
    /// Equal-increment bottleneck fairness.
    FairBottleneck,
    /// Utility maximization by Lagrangian relaxation.
    Lagrange(UtilityKind),
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::MaxMin => write!(f, "maxmin"),
            Algorithm::FairBottleneck => write!(f, "fairbottleneck"),
            Algorithm::Lagrange(UtilityKind::Vegas) => write!(f, "lagrange-vegas"),
            Algorithm::Lagrange(UtilityKind::Reno) => write!(f, "lagrange-reno"),
            Algorithm::Lagrange(UtilityKind::Reno2) => write!(f, "lagrange-reno2"),
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = LmmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "maxmin" | "max-min" => Ok(Algorithm::MaxMin),
            "fairbottleneck" | "fair-bottleneck" | "bottleneck" => Ok(Algorithm::FairBottleneck),
            "lagrange" | "vegas" | "lagrange-vegas" => Ok(Algorithm::Lagrange(UtilityKind::Vegas)),
            "reno" | "lagrange-reno" => Ok(Algorithm::Lagrange(UtilityKind::Reno)),
            "reno2" | "lagrange-reno2" => Ok(Algorithm::Lagrange(UtilityKind::Reno2)),
            _ => Err(LmmError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// The configuration of a `System`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemConfig {
    pub(crate) precision: Precision,
    pub(crate) selective_update: bool,
    pub(crate) concurrency_limit: Option<usize>,
    pub(crate) algorithm: Algorithm,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            precision: Precision::default(),
            selective_update: false,
            concurrency_limit: None,
            algorithm: Algorithm::default(),
        }
    }
}

impl SystemConfig {
    /// Returns the precision used for every floating-point comparison.
    #[inline]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Returns `true` if solves only revisit dirty constraints.
    #[inline]
    pub fn selective_update(&self) -> bool {
        self.selective_update
    }

    /// Returns the concurrency limit given to new constraints.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        self.concurrency_limit
    }

    #[inline]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl std::fmt::Display for SystemConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "System Configuration:")?;
        writeln!(f, "  Algorithm: {}", self.algorithm)?;
        writeln!(f, "  Precision: {}", self.precision)?;
        writeln!(f, "  Selective Update: {}", self.selective_update)?;
        match self.concurrency_limit {
            Some(limit) => writeln!(f, "  Concurrency Limit: {}", limit),
            None => writeln!(f, "  Concurrency Limit: unlimited"),
        }
    }
}

/// Builder for `SystemConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfigBuilder {
    precision: f64,
    selective_update: bool,
    concurrency_limit: Option<usize>,
    algorithm: Algorithm,
}

impl Default for SystemConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemConfigBuilder {
    /// Creates a builder holding the default configuration.
    #[inline]
    pub fn new() -> Self {
        Self {
            precision: DEFAULT_MAXMIN_PRECISION,
            selective_update: false,
            concurrency_limit: None,
            algorithm: Algorithm::default(),
        }
    }

    #[inline]
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    #[inline]
    pub fn with_selective_update(mut self, selective_update: bool) -> Self {
        self.selective_update = selective_update;
        self
    }

    /// Sets the concurrency limit of constraints created afterwards.
    #[inline]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    #[inline]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `LmmError::InvalidPrecision` if the precision is not finite
    /// and strictly positive.
    pub fn build(self) -> Result<SystemConfig, LmmError> {
        let precision =
            Precision::new(self.precision).ok_or(LmmError::InvalidPrecision(self.precision))?;
        Ok(SystemConfig {
            precision,
            selective_update: self.selective_update,
            concurrency_limit: self.concurrency_limit,
            algorithm: self.algorithm,
        })
    }
}
