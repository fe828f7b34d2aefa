//! Numeric encoding of predictor columns.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::schema::{ColumnDescriptor, ColumnType};
use crate::table::{Table, Value};

use super::ModelError;

/// How one predictor column becomes design-matrix columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Encoding {
    /// Numeric column used as is.
    Numeric { column: String },
    /// One indicator per non-reference level; the first level is the reference.
    Dummies { column: String, levels: Vec<Value> },
}

impl Encoding {
    /// Encoding implied by a column descriptor.
    pub fn for_descriptor(descriptor: &ColumnDescriptor) -> Encoding {
        match descriptor.column_type {
            ColumnType::Continuous => Encoding::Numeric {
                column: descriptor.name.clone(),
            },
            ColumnType::Binary | ColumnType::Categorical => Encoding::Dummies {
                column: descriptor.name.clone(),
                levels: descriptor.levels.clone(),
            },
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Encoding::Numeric { column } | Encoding::Dummies { column, .. } => column,
        }
    }

    /// Names of the design columns this encoding produces.
    pub fn output_names(&self) -> Vec<String> {
        match self {
            Encoding::Numeric { column } => vec![column.clone()],
            Encoding::Dummies { column, levels } => levels
                .iter()
                .skip(1)
                .map(|level| format!("{}[{}]", column, level))
                .collect(),
        }
    }

    fn width(&self) -> usize {
        match self {
            Encoding::Numeric { .. } => 1,
            Encoding::Dummies { levels, .. } => levels.len().saturating_sub(1),
        }
    }
}

/// A numeric design matrix over all rows of a table, without intercept.
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    pub matrix: Array2<f64>,
    pub names: Vec<String>,
}

impl Design {
    /// A design with no predictor columns.
    pub fn empty(n_rows: usize) -> Self {
        Self {
            matrix: Array2::zeros((n_rows, 0)),
            names: Vec::new(),
        }
    }

    /// Encode the given predictors for every row of `table`.
    ///
    /// Every referenced cell must be observed.
    pub fn encode(table: &Table, encodings: &[Encoding]) -> Result<Self, ModelError> {
        let n = table.n_rows();
        let width: usize = encodings.iter().map(Encoding::width).sum();
        let mut matrix = Array2::zeros((n, width));
        let mut names = Vec::with_capacity(width);
        let mut offset = 0;

        for encoding in encodings {
            let data = table.column(encoding.column()).ok_or_else(|| {
                ModelError::Shape(format!("unknown predictor column '{}'", encoding.column()))
            })?;

            match encoding {
                Encoding::Numeric { column } => {
                    for row in 0..n {
                        let value = data.get_f64(row).ok_or_else(|| {
                            ModelError::MissingValue {
                                column: column.clone(),
                                row,
                            }
                        })?;
                        matrix[[row, offset]] = value;
                    }
                }
                Encoding::Dummies { column, levels } => {
                    for row in 0..n {
                        let value = data.get(row).ok_or_else(|| ModelError::MissingValue {
                            column: column.clone(),
                            row,
                        })?;
                        let code = levels
                            .iter()
                            .position(|l| l.total_cmp(&value) == std::cmp::Ordering::Equal);
                        if let Some(code) = code.filter(|&c| c > 0) {
                            matrix[[row, offset + code - 1]] = 1.0;
                        }
                    }
                }
            }

            names.extend(encoding.output_names());
            offset += encoding.width();
        }

        Ok(Self { matrix, names })
    }

    pub fn n_rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Rows of the matrix in the given order.
    pub fn rows(&self, rows: &[usize]) -> Array2<f64> {
        self.matrix.select(Axis(0), rows)
    }

    /// Indices of columns that vary over the given rows.
    pub fn varying_columns(&self, rows: &[usize]) -> Vec<usize> {
        (0..self.n_cols())
            .filter(|&j| {
                let mut iter = rows.iter().map(|&r| self.matrix[[r, j]]);
                match iter.next() {
                    Some(first) => iter.any(|v| v != first),
                    None => false,
                }
            })
            .collect()
    }
}

/// Prepend a column of ones.
pub fn add_intercept(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut out = Array2::ones((n, x.ncols() + 1));
    out.slice_mut(ndarray::s![.., 1..]).assign(x);
    out
}

/// Pick columns of `x` by index.
pub fn select_columns(x: &Array2<f64>, columns: &[usize]) -> Array2<f64> {
    x.select(Axis(1), columns)
}

/// Linear predictor `X b` for a design without intercept and coefficients with one.
pub fn linear_predictor(x: &Array2<f64>, params: &Array1<f64>, intercept: bool) -> Array1<f64> {
    if intercept {
        x.dot(&params.slice(ndarray::s![1..])) + params[0]
    } else {
        x.dot(params)
    }
}
