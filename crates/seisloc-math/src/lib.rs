//! Mathematical primitives for the seismic event locator.

pub mod geodesy;
pub mod interp;
pub mod linalg;
pub mod stats;
pub mod tridiag;
