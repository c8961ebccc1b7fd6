// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Convergence
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Convergence / divergence decisions over a three-deep history of the
//! Paige-Saunders test, model norm, weighted RMS and defining count.

use seisloc_types::config::IterationConfig;

/// A model perturbation this small (mixed s/km units) means converged.
const SMALL_MODEL_NORM: f64 = 0.1;
/// Weighted RMS this small means converged.
const SMALL_WEIGHTED_RMS: f64 = 0.01;
/// Model norm must grow by this ratio twice running to diverge.
const DIVERGENCE_RATIO: f64 = 1.1;
/// ... and exceed this.
const DIVERGENCE_NORM: f64 = 500.0;
/// Step scale is never halved below this.
const MIN_STEP: f64 = 0.05;
/// Relaxed criteria apply past this fraction of the iteration budget.
const LATE_FRACTION: f64 = 0.75;
/// Relaxed test tolerance as a multiple of the strict one.
const LATE_TOLERANCE_FACTOR: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceState {
    Iterating,
    Converged,
    Diverged,
}

/// Per-iteration quantities fed to the monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationSample {
    pub ndef: usize,
    pub test: f64,
    pub model_norm: f64,
    pub weighted_rms: f64,
}

#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    tolerance: f64,
    min_iterations: usize,
    max_iterations: usize,
    /// Most recent first.
    history: [Option<IterationSample>; 3],
    step: f64,
}

impl ConvergenceMonitor {
    pub fn new(config: &IterationConfig) -> Self {
        Self {
            tolerance: config.convergence_tolerance,
            min_iterations: config.min_iterations,
            max_iterations: config.max_iterations,
            history: [None; 3],
            step: 1.0,
        }
    }

    /// Current step scale applied to the solution vector.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Forget the history, e.g. when the free-parameter set changes and
    /// test values are no longer comparable. The step scale persists.
    pub fn reset_history(&mut self) {
        self.history = [None; 3];
    }

    /// Record one iteration and decide. `may_converge` is false while the
    /// caller is still holding depth fixed against the requested policy.
    pub fn record(
        &mut self,
        iteration: usize,
        sample: IterationSample,
        may_converge: bool,
    ) -> ConvergenceState {
        self.history.rotate_right(1);
        self.history[0] = Some(sample);
        let cur = sample;

        if let Some(prev) = self.history[1] {
            // halve the step when neither the test nor the fit improved
            if cur.test >= prev.test && cur.weighted_rms >= prev.weighted_rms && self.step > MIN_STEP
            {
                self.step *= 0.5;
            }
        }

        if let (Some(prev), Some(prev2)) = (self.history[1], self.history[2]) {
            if iteration > self.min_iterations
                && cur.model_norm > DIVERGENCE_RATIO * prev.model_norm
                && prev.model_norm > DIVERGENCE_RATIO * prev2.model_norm
                && cur.model_norm > DIVERGENCE_NORM
            {
                return ConvergenceState::Diverged;
            }
        }

        // the last allowed iteration never converges
        if !may_converge || iteration + 1 >= self.max_iterations {
            return ConvergenceState::Iterating;
        }
        let Some(prev) = self.history[1] else {
            return ConvergenceState::Iterating;
        };

        let tol = self.tolerance;
        let stable = cur.ndef == prev.ndef
            && (cur.test < tol
                || cur.model_norm < SMALL_MODEL_NORM
                || cur.weighted_rms < SMALL_WEIGHTED_RMS);
        let settled = cur.test <= prev.test && cur.test < tol;
        let late = iteration as f64 >= LATE_FRACTION * self.max_iterations as f64
            && (cur.test < LATE_TOLERANCE_FACTOR * tol || (cur.test - prev.test).abs() < tol);

        if stable || settled || late {
            ConvergenceState::Converged
        } else {
            ConvergenceState::Iterating
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ndef: usize, test: f64, model_norm: f64, weighted_rms: f64) -> IterationSample {
        IterationSample {
            ndef,
            test,
            model_norm,
            weighted_rms,
        }
    }

    fn monitor() -> ConvergenceMonitor {
        ConvergenceMonitor::new(&IterationConfig::default())
    }

    #[test]
    fn test_needs_two_samples() {
        let mut m = monitor();
        assert_eq!(m.record(0, sample(10, 0.0, 0.0, 0.0), true), ConvergenceState::Iterating);
        assert_eq!(m.record(1, sample(10, 0.0, 0.0, 0.0), true), ConvergenceState::Converged);
    }

    #[test]
    fn test_small_model_norm_with_stable_ndef() {
        let mut m = monitor();
        m.record(4, sample(10, 0.5, 5.0, 1.0), true);
        assert_eq!(m.record(5, sample(9, 0.4, 0.05, 0.9), true), ConvergenceState::Iterating);
        assert_eq!(m.record(6, sample(9, 0.3, 0.05, 0.8), true), ConvergenceState::Converged);
    }

    #[test]
    fn test_last_iteration_never_converges() {
        let mut m = monitor();
        m.record(18, sample(10, 0.0, 0.0, 0.0), true);
        assert_eq!(m.record(19, sample(10, 0.0, 0.0, 0.0), true), ConvergenceState::Iterating);
    }

    #[test]
    fn test_held_depth_blocks_convergence() {
        let mut m = monitor();
        m.record(0, sample(10, 0.0, 0.0, 0.0), false);
        assert_eq!(m.record(1, sample(10, 0.0, 0.0, 0.0), false), ConvergenceState::Iterating);
    }

    #[test]
    fn test_divergence() {
        let mut m = monitor();
        m.record(5, sample(10, 0.5, 400.0, 1.0), true);
        m.record(6, sample(10, 0.5, 480.0, 1.0), true);
        assert_eq!(m.record(7, sample(10, 0.5, 600.0, 1.0), true), ConvergenceState::Diverged);
    }

    #[test]
    fn test_no_divergence_before_floor() {
        let mut m = monitor();
        m.record(1, sample(10, 0.5, 400.0, 1.0), true);
        m.record(2, sample(10, 0.5, 480.0, 1.0), true);
        assert_eq!(m.record(3, sample(10, 0.5, 600.0, 1.0), true), ConvergenceState::Iterating);
    }

    #[test]
    fn test_step_halving_floor() {
        let mut m = monitor();
        m.record(0, sample(10, 0.5, 10.0, 1.0), true);
        for i in 1..10 {
            m.record(i, sample(10, 0.5, 10.0, 1.0), false);
        }
        assert!((m.step() - 0.03125).abs() < 1e-15);
    }

    #[test]
    fn test_late_relaxed_tolerance() {
        let mut m = monitor();
        m.record(14, sample(10, 0.2, 5.0, 1.0), true);
        assert_eq!(m.record(15, sample(11, 0.2 + 1e-9, 5.0, 1.0), true), ConvergenceState::Converged);
    }
}
