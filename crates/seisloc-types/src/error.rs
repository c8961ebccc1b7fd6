// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Error Taxonomy
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

/// Coarse failure class, used by the option loop to decide whether a
/// different location policy is worth trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resource,
    InsufficientData,
    Numerical,
    Divergence,
    Configuration,
}

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Insufficient number of defining phases: {ndef} < {required}")]
    InsufficientPhases { ndef: usize, required: usize },

    #[error("Phase loss: {ndef} defining phases left (< {required}), {loss_percent:.1}% lost")]
    PhaseLoss {
        ndef: usize,
        required: usize,
        loss_percent: f64,
    },

    #[error("Insufficient number of independent phases: rank {rank} < {required}")]
    InsufficientIndependentPhases { rank: usize, required: usize },

    #[error("Singular G matrix: rank {rank} < {unknowns} free parameters")]
    SingularSystem { rank: usize, unknowns: usize },

    #[error("Abnormally ill-conditioned problem: condition number {condition:.1} > {ceiling}")]
    IllConditioned { condition: f64, ceiling: f64 },

    #[error("Maximum number of iterations ({iterations}) reached without convergence")]
    MaxIterations { iterations: usize },

    #[error("Divergent solution at iteration {iteration}: model norm {model_norm:.1}")]
    Diverged { iteration: usize, model_norm: f64 },

    #[error("No convergent solution after trying {attempts} location options")]
    NoConvergentSolution { attempts: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Linear algebra error: {0}")]
    LinAlg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LocatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LocatorError::InsufficientPhases { .. }
            | LocatorError::PhaseLoss { .. }
            | LocatorError::InsufficientIndependentPhases { .. } => ErrorKind::InsufficientData,
            LocatorError::SingularSystem { .. } | LocatorError::IllConditioned { .. } => {
                ErrorKind::Numerical
            }
            LocatorError::MaxIterations { .. }
            | LocatorError::Diverged { .. }
            | LocatorError::NoConvergentSolution { .. } => ErrorKind::Divergence,
            LocatorError::ConfigError(_) | LocatorError::Io(_) | LocatorError::Json(_) => {
                ErrorKind::Configuration
            }
            LocatorError::LinAlg(_) => ErrorKind::Resource,
        }
    }

    /// True if another location policy may still succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InsufficientData | ErrorKind::Numerical | ErrorKind::Divergence
        )
    }
}

pub type LocatorResult<T> = Result<T, LocatorError>;
