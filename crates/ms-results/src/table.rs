//! Tabular solver output and its CSV form.
//!
//! The solver writes one row per refinement level:
//!
//! ```text
//! Refinements,DOFs,AvgGMRES,AbsEval0,AbsEval1
//! 1,1234,12.5,0.31,0.12
//! 2,9876,13,0.33,NaN
//! ```
//!
//! `Refinements` and `DOFs` are mandatory; every other column is a metric
//! whose cells may be missing (`NaN` or empty).

use serde::{Deserialize, Serialize};

use crate::{ResultsError, ResultsResult};

pub const REFINEMENT_COLUMN: &str = "Refinements";
pub const DOFS_COLUMN: &str = "DOFs";

const MISSING: &str = "NaN";

/// What a metric column measures, judged from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// `AbsEval<i>`: magnitude of an error-operator eigenvalue.
    EigenvalueMagnitude,
    /// Solver iteration statistics such as `AvgGMRES`.
    IterationCount,
    Other,
}

impl MetricKind {
    pub fn classify(column: &str) -> Self {
        if column
            .strip_prefix("AbsEval")
            .is_some_and(|idx| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()))
        {
            MetricKind::EigenvalueMagnitude
        } else if column.to_ascii_uppercase().contains("GMRES") {
            MetricKind::IterationCount
        } else {
            MetricKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub refinement: u32,
    pub dofs: u64,
    /// One entry per metric column, in header order.
    pub metrics: Vec<Option<f64>>,
}

/// Rows of one (mesh, cycle) solver run, ordered by increasing refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    metric_columns: Vec<String>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(metric_columns: Vec<String>, rows: Vec<ResultRow>) -> ResultsResult<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.metrics.len() != metric_columns.len() {
                return Err(malformed(format!(
                    "row {} has {} metric values, expected {}",
                    i,
                    row.metrics.len(),
                    metric_columns.len()
                )));
            }
        }
        for pair in rows.windows(2) {
            if pair[1].refinement <= pair[0].refinement {
                return Err(malformed(format!(
                    "refinement levels not increasing ({} then {})",
                    pair[0].refinement, pair[1].refinement
                )));
            }
        }

        Ok(Self {
            metric_columns,
            rows,
        })
    }

    pub fn metric_columns(&self) -> &[String] {
        &self.metric_columns
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Deepest refinement level present, `None` for an empty table.
    pub fn max_refinement(&self) -> Option<u32> {
        self.rows.last().map(|r| r.refinement)
    }

    /// Metric columns of the given kind, in header order.
    pub fn columns_of_kind(&self, kind: MetricKind) -> Vec<&str> {
        self.metric_columns
            .iter()
            .filter(|c| MetricKind::classify(c) == kind)
            .map(String::as_str)
            .collect()
    }

    /// `(DOFs, value)` pairs for a metric column, skipping rows where it is missing.
    pub fn series(&self, name: &str) -> Option<Vec<(u64, f64)>> {
        let idx = self.metric_index(name)?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| row.metrics[idx].map(|v| (row.dofs, v)))
                .collect(),
        )
    }

    fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_columns.iter().position(|c| c == name)
    }

    pub fn parse_csv(content: &str) -> ResultsResult<Self> {
        let mut lines = content
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());

        let header_line = lines.next().ok_or_else(|| malformed("missing header row"))?;
        let header: Vec<&str> = split_cells(header_line);

        let refinement_idx = header
            .iter()
            .position(|c| *c == REFINEMENT_COLUMN)
            .ok_or_else(|| malformed(format!("missing '{}' column", REFINEMENT_COLUMN)))?;
        let dofs_idx = header
            .iter()
            .position(|c| *c == DOFS_COLUMN)
            .ok_or_else(|| malformed(format!("missing '{}' column", DOFS_COLUMN)))?;

        let metric_indices: Vec<usize> = (0..header.len())
            .filter(|&i| i != refinement_idx && i != dofs_idx)
            .collect();
        let metric_columns: Vec<String> = metric_indices
            .iter()
            .map(|&i| header[i].to_string())
            .collect();

        let mut rows = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let cells = split_cells(line);
            if cells.len() != header.len() {
                return Err(malformed(format!(
                    "data row {} has {} cells, header has {}",
                    line_no + 1,
                    cells.len(),
                    header.len()
                )));
            }

            let refinement = parse_integer(cells[refinement_idx], REFINEMENT_COLUMN)?;
            let dofs = parse_integer(cells[dofs_idx], DOFS_COLUMN)?;
            let metrics = metric_indices
                .iter()
                .map(|&i| parse_metric(cells[i], header[i]))
                .collect::<ResultsResult<Vec<_>>>()?;

            rows.push(ResultRow {
                refinement,
                dofs,
                metrics,
            });
        }

        Self::new(metric_columns, rows)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = format!("{},{}", REFINEMENT_COLUMN, DOFS_COLUMN);
        for column in &self.metric_columns {
            csv.push(',');
            csv.push_str(column);
        }
        csv.push('\n');

        for row in &self.rows {
            csv.push_str(&format!("{},{}", row.refinement, row.dofs));
            for value in &row.metrics {
                csv.push(',');
                match value {
                    Some(v) => csv.push_str(&v.to_string()),
                    None => csv.push_str(MISSING),
                }
            }
            csv.push('\n');
        }

        csv
    }
}

fn split_cells(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

fn parse_integer<T: std::str::FromStr>(cell: &str, column: &str) -> ResultsResult<T> {
    if let Ok(v) = cell.parse::<T>() {
        return Ok(v);
    }
    // Some writers emit integral columns as floats ("3.0").
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => {
            format!("{}", f as u64).parse::<T>().map_err(|_| {
                malformed(format!("'{}' out of range in column '{}'", cell, column))
            })
        }
        _ => Err(malformed(format!(
            "'{}' is not an integer in column '{}'",
            cell, column
        ))),
    }
}

fn parse_metric(cell: &str, column: &str) -> ResultsResult<Option<f64>> {
    if cell.is_empty() {
        return Ok(None);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_nan() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(_) if cell.eq_ignore_ascii_case("-nan") => Ok(None),
        Err(_) => Err(malformed(format!(
            "'{}' is not a number in column '{}'",
            cell, column
        ))),
    }
}

fn malformed(reason: impl Into<String>) -> ResultsError {
    ResultsError::Malformed {
        reason: reason.into(),
    }
}
