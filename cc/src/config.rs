//! Calculation parameters with derived-threshold defaults and a
//! consistency check.

use mra::KernelParameters;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Numerical parameters of a correlation calculation.
///
/// The accuracy hierarchy hangs off the 6D truncation threshold: 3D
/// functions are kept two orders tighter, the tight variants one further
/// order, and the convergence criteria follow. [`Parameters::derived`]
/// builds a consistent set from one number; individual fields can then be
/// overridden, with [`Parameters::sanity_check`] flagging combinations
/// that undermine the requested accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Truncation threshold for 6D pair functions.
    pub thresh_6d: f64,
    pub tight_thresh_6d: f64,
    /// Truncation threshold for 3D one-particle functions.
    pub thresh_3d: f64,
    pub tight_thresh_3d: f64,
    /// Truncation threshold after kernel applications.
    pub thresh_op: f64,
    /// Short-distance kernel regularization.
    pub lo: f64,
    /// Correlation-factor exponent.
    pub gamma: f64,
    /// Convergence criterion for pair-function residuals.
    pub dconv_6d: f64,
    /// Convergence criterion for singles residuals.
    pub dconv_3d: f64,
    /// Convergence criterion for the correlation energy.
    pub econv: f64,
    /// Convergence criterion for individual pair energies.
    pub econv_pairs: f64,
    /// Number of frozen core orbitals.
    pub freeze: usize,
    /// Enables expensive consistency checks during iteration.
    pub debug: bool,
}

impl Parameters {
    /// A consistent parameter set derived from the 6D threshold.
    pub fn derived(thresh_6d: f64) -> Self {
        let thresh_3d = 0.01 * thresh_6d;
        let dconv = thresh_6d;
        let econv = 0.1 * dconv;
        Parameters {
            thresh_6d,
            tight_thresh_6d: 0.1 * thresh_6d,
            thresh_3d,
            tight_thresh_3d: 0.1 * thresh_3d,
            // the operator threshold follows thresh_3d down once the
            // hierarchy gets tighter than the usual operator accuracy
            thresh_op: thresh_3d.min(1.0e-6),
            lo: 1.0e-6,
            gamma: 1.0,
            dconv_6d: dconv,
            dconv_3d: dconv,
            econv,
            econv_pairs: econv,
            freeze: 0,
            debug: false,
        }
    }

    /// The kernel-construction parameters implied by this set.
    pub fn kernel_parameters(&self) -> KernelParameters {
        KernelParameters {
            lo: self.lo,
            thresh_op: self.thresh_op,
            gamma: self.gamma,
        }
    }

    /// Checks the threshold hierarchy; every violation is logged and
    /// collected, none is fatal.
    pub fn sanity_check(&self) -> SanityReport {
        let mut violations = Vec::new();
        let mut flag = |rule: ParameterRule, message: String| {
            warn!("parameter check: {message}");
            violations.push(rule);
        };

        if self.thresh_3d > 0.01 * self.thresh_6d {
            flag(
                ParameterRule::Thresh3dTooLoose,
                format!(
                    "thresh_3d {:.1e} is looser than 0.01 * thresh_6d {:.1e}",
                    self.thresh_3d, self.thresh_6d
                ),
            );
        }
        if self.tight_thresh_6d > 0.1 * self.thresh_6d {
            flag(
                ParameterRule::TightThresh6dTooLoose,
                format!(
                    "tight_thresh_6d {:.1e} is looser than 0.1 * thresh_6d {:.1e}",
                    self.tight_thresh_6d, self.thresh_6d
                ),
            );
        }
        if self.tight_thresh_3d > 0.1 * self.thresh_3d {
            flag(
                ParameterRule::TightThresh3dTooLoose,
                format!(
                    "tight_thresh_3d {:.1e} is looser than 0.1 * thresh_3d {:.1e}",
                    self.tight_thresh_3d, self.thresh_3d
                ),
            );
        }
        if self.dconv_3d < self.thresh_3d {
            flag(
                ParameterRule::Dconv3dBelowThresh,
                format!(
                    "dconv_3d {:.1e} is below thresh_3d {:.1e} and cannot be reached",
                    self.dconv_3d, self.thresh_3d
                ),
            );
        }
        if self.dconv_6d < self.thresh_6d {
            flag(
                ParameterRule::Dconv6dBelowThresh,
                format!(
                    "dconv_6d {:.1e} is below thresh_6d {:.1e} and cannot be reached",
                    self.dconv_6d, self.thresh_6d
                ),
            );
        }
        if self.econv < 0.1 * self.thresh_6d {
            flag(
                ParameterRule::EconvBelowThresh,
                format!(
                    "econv {:.1e} is below 0.1 * thresh_6d {:.1e} and cannot be reached",
                    self.econv, self.thresh_6d
                ),
            );
        }
        if self.econv_pairs < self.econv {
            flag(
                ParameterRule::EconvPairsBelowEconv,
                format!(
                    "econv_pairs {:.1e} is tighter than econv {:.1e}",
                    self.econv_pairs, self.econv
                ),
            );
        }
        if self.thresh_op <= 0.0 || self.thresh_op > self.thresh_3d {
            flag(
                ParameterRule::ThreshOpRange,
                format!(
                    "thresh_op {:.1e} must be positive and no looser than thresh_3d {:.1e}",
                    self.thresh_op, self.thresh_3d
                ),
            );
        }
        if self.lo <= 0.0 {
            flag(
                ParameterRule::LoNotPositive,
                format!("kernel regularization lo {:.1e} must be positive", self.lo),
            );
        }
        if self.gamma <= 0.0 {
            flag(
                ParameterRule::GammaNotPositive,
                format!("correlation exponent gamma {:.1e} must be positive", self.gamma),
            );
        }

        SanityReport { violations }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters::derived(1.0e-3)
    }
}

/// The individual rules checked by [`Parameters::sanity_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterRule {
    Thresh3dTooLoose,
    TightThresh6dTooLoose,
    TightThresh3dTooLoose,
    Dconv3dBelowThresh,
    Dconv6dBelowThresh,
    EconvBelowThresh,
    EconvPairsBelowEconv,
    ThreshOpRange,
    LoNotPositive,
    GammaNotPositive,
}

/// Outcome of a parameter consistency check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityReport {
    pub violations: Vec<ParameterRule>,
}

impl SanityReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.violations.len()
    }
}
