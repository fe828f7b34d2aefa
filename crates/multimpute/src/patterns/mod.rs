//! Missingness pattern analysis.

mod analyzer;
mod flux;

pub use analyzer::MissingnessAnalyzer;
pub use flux::{
    flux, inbound, influx, md_pairs, md_pattern, outbound, outflux, FluxStatistics,
    MissingPairs, MissingPatterns, PatternRow,
};
