//! Pairwise and row-wise missing data statistics.
//!
//! These describe how well each column connects to the observed and missing
//! parts of the others and help decide which columns make useful predictors.

use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::table::Table;

/// Pairwise response/missing counts between columns.
///
/// Entry `[j, k]` counts rows where column `j` has the first state and
/// column `k` the second (`r` = observed, `m` = missing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingPairs {
    pub columns: Vec<String>,
    /// Both observed.
    pub rr: Array2<f64>,
    /// `j` observed, `k` missing.
    pub rm: Array2<f64>,
    /// `j` missing, `k` observed.
    pub mr: Array2<f64>,
    /// Both missing.
    pub mm: Array2<f64>,
}

/// One distinct row missingness pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRow {
    /// Number of rows sharing the pattern.
    pub count: usize,
    /// 1 = observed, 0 = missing, in [`MissingPatterns::columns`] order.
    pub observed: Vec<u8>,
    /// Missing cells in the pattern.
    pub nmis: usize,
}

/// Distinct row patterns; columns sorted by ascending missing count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingPatterns {
    pub columns: Vec<String>,
    pub patterns: Vec<PatternRow>,
}

/// Per-column flux summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxStatistics {
    /// Proportion observed.
    pub pobs: f64,
    /// Influx coefficient.
    pub influx: f64,
    /// Outflux coefficient.
    pub outflux: f64,
    /// Average inbound statistic.
    pub ainb: f64,
    /// Average outbound statistic.
    pub aout: f64,
}

fn observed_indicator(table: &Table) -> Array2<f64> {
    let n = table.n_rows();
    let p = table.n_cols();
    let mut r = Array2::zeros((n, p));
    for (j, (_, data)) in table.columns().enumerate() {
        for i in 0..n {
            if !data.is_missing(i) {
                r[[i, j]] = 1.0;
            }
        }
    }
    r
}

/// Count response/missing pairs for every pair of columns.
pub fn md_pairs(table: &Table) -> MissingPairs {
    let r = observed_indicator(table);
    let m = r.mapv(|v| 1.0 - v);
    MissingPairs {
        columns: table.column_names().into_iter().map(String::from).collect(),
        rr: r.t().dot(&r),
        rm: r.t().dot(&m),
        mr: m.t().dot(&r),
        mm: m.t().dot(&m),
    }
}

/// Group rows by their missingness pattern.
pub fn md_pattern(table: &Table) -> MissingPatterns {
    let names = table.column_names();
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by_key(|&j| table.missing_count(names[j]));

    let missing = table.missing_matrix();
    let mut groups: IndexMap<String, usize> = IndexMap::new();
    for row in &missing {
        let key: String = order
            .iter()
            .map(|&j| if row[j] { '1' } else { '0' })
            .collect();
        *groups.entry(key).or_insert(0) += 1;
    }
    groups.sort_keys();

    let patterns = groups
        .into_iter()
        .map(|(key, count)| {
            let observed: Vec<u8> = key.chars().map(|c| if c == '1' { 0 } else { 1 }).collect();
            let nmis = observed.iter().filter(|&&o| o == 0).count();
            PatternRow {
                count,
                observed,
                nmis,
            }
        })
        .collect();

    MissingPatterns {
        columns: order.iter().map(|&j| names[j].to_string()).collect(),
        patterns,
    }
}

fn ratio(num: f64, denom: f64) -> f64 {
    if denom == 0.0 { f64::NAN } else { num / denom }
}

fn elementwise_ratio(num: &Array2<f64>, denom: &Array2<f64>) -> Array2<f64> {
    let mut out = num.clone();
    out.zip_mut_with(denom, |n, &d| *n = ratio(*n, d));
    out
}

/// Inbound statistic `I[j, k]`: share of rows with `j` missing where `k` is observed.
pub fn inbound(table: &Table) -> Array2<f64> {
    let pairs = md_pairs(table);
    elementwise_ratio(&pairs.mr, &(&pairs.mr + &pairs.mm))
}

/// Outbound statistic `O[j, k]`: share of rows with `j` observed where `k` is missing.
pub fn outbound(table: &Table) -> Array2<f64> {
    let pairs = md_pairs(table);
    elementwise_ratio(&pairs.rm, &(&pairs.rm + &pairs.rr))
}

fn influx_from(pairs: &MissingPairs) -> Array1<f64> {
    let num = pairs.mr.sum_axis(ndarray::Axis(1));
    let denom = (&pairs.mr + &pairs.rr).sum_axis(ndarray::Axis(1));
    num.iter().zip(denom.iter()).map(|(&n, &d)| ratio(n, d)).collect()
}

fn outflux_from(pairs: &MissingPairs) -> Array1<f64> {
    let num = pairs.rm.sum_axis(ndarray::Axis(1));
    let denom = (&pairs.rm + &pairs.mm).sum_axis(ndarray::Axis(1));
    num.iter().zip(denom.iter()).map(|(&n, &d)| ratio(n, d)).collect()
}

/// Influx coefficient per column. 0 for complete columns, 1 for fully missing ones.
pub fn influx(table: &Table) -> Array1<f64> {
    influx_from(&md_pairs(table))
}

/// Outflux coefficient per column. 1 for complete columns, 0 for fully missing ones.
pub fn outflux(table: &Table) -> Array1<f64> {
    outflux_from(&md_pairs(table))
}

/// Mean of a row ignoring NaN, over `len - 1` entries (the diagonal is excluded by convention).
fn row_mean_excluding_self(row: ndarray::ArrayView1<'_, f64>) -> f64 {
    let sum: f64 = row.iter().filter(|v| !v.is_nan()).sum();
    ratio(sum, row.len() as f64 - 1.0)
}

/// Flux summary for every column, keyed by column name.
pub fn flux(table: &Table) -> IndexMap<String, FluxStatistics> {
    let pairs = md_pairs(table);
    let inb = elementwise_ratio(&pairs.mr, &(&pairs.mr + &pairs.mm));
    let outb = elementwise_ratio(&pairs.rm, &(&pairs.rm + &pairs.rr));
    let inf = influx_from(&pairs);
    let outf = outflux_from(&pairs);
    let n = table.n_rows() as f64;

    pairs
        .columns
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let observed = n - table.missing_count(name) as f64;
            let stats = FluxStatistics {
                pobs: ratio(observed, n),
                influx: inf[j],
                outflux: outf[j],
                ainb: row_mean_excluding_self(inb.row(j)),
                aout: row_mean_excluding_self(outb.row(j)),
            };
            (name.clone(), stats)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnData;

    fn table() -> Table {
        // a: complete, b: missing rows 1 and 3, c: missing row 3
        Table::from_columns(vec![
            ("a", ColumnData::from_f64(vec![1.0, 2.0, 3.0, 4.0])),
            ("b", ColumnData::from_f64(vec![1.0, f64::NAN, 3.0, f64::NAN])),
            ("c", ColumnData::from_f64(vec![1.0, 2.0, 3.0, f64::NAN])),
        ])
        .unwrap()
    }

    #[test]
    fn test_md_pairs_counts() {
        let pairs = md_pairs(&table());
        // a observed everywhere, b observed in 2 rows
        assert_eq!(pairs.rr[[0, 1]], 2.0);
        assert_eq!(pairs.rm[[0, 1]], 2.0);
        assert_eq!(pairs.mr[[1, 0]], 2.0);
        assert_eq!(pairs.mm[[1, 2]], 1.0);
        assert_eq!(pairs.mm[[1, 1]], 2.0);
    }

    #[test]
    fn test_md_pattern() {
        let patterns = md_pattern(&table());
        assert_eq!(patterns.columns, vec!["a", "c", "b"]);
        assert_eq!(patterns.patterns.len(), 3);
        // complete rows first
        assert_eq!(patterns.patterns[0].observed, vec![1, 1, 1]);
        assert_eq!(patterns.patterns[0].count, 2);
        assert_eq!(patterns.patterns[0].nmis, 0);
        let total: usize = patterns.patterns.iter().map(|p| p.count).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_influx_outflux_limits() {
        let t = table();
        let inf = influx(&t);
        let outf = outflux(&t);
        assert_eq!(inf[0], 0.0);
        assert_eq!(outf[0], 1.0);
        assert!(inf[1] > 0.0);
    }

    #[test]
    fn test_inbound_nan_for_complete_column() {
        let inb = inbound(&table());
        // column a never missing: 0/0
        assert!(inb[[0, 1]].is_nan());
        // b missing in rows 1,3; a observed in both
        assert_eq!(inb[[1, 0]], 1.0);
    }

    #[test]
    fn test_flux_summary() {
        let stats = flux(&table());
        assert_eq!(stats["a"].pobs, 1.0);
        assert_eq!(stats["b"].pobs, 0.5);
        assert_eq!(stats["a"].outflux, 1.0);
    }
}
