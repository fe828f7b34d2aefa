//! Numerical support: linear algebra, distributions and descriptive statistics.

pub mod descriptive;
pub mod distributions;
pub mod linalg;
