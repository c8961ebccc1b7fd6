//! Iterative linearised least-squares hypocentre locator.
//!
//! Phase identification, depth resolution, correlated-error projection,
//! SVD inversion and the outer location-policy loop.

pub mod convergence;
pub mod covariance;
pub mod depth_phase;
pub mod depth_resolution;
pub mod eventloc;
pub mod locate;
pub mod phase_id;
pub mod residuals;
pub mod solver;
pub mod stations;
pub mod system;
pub mod travel_time;
pub mod uncertainty;

pub use eventloc::{EventLocator, LocationPolicy, LocationReport};
pub use locate::{locate_event, LocatorServices};
