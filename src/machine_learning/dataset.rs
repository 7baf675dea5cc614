use csv::{ReaderBuilder, Trim};
use ndarray::{Array2, ArrayView1};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::error::{DatasetError, ModelError};

/// Numeric feature columns of the transaction file, in matrix order
pub const FEATURE_COLUMNS: [&str; 5] = [
    "Amount",
    "CountryRisk",
    "TimeOfDay",
    "SenderBlacklisted",
    "SenderAgeDays",
];

/// Columns a transaction file must carry
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "TransactionID",
    "Amount",
    "CountryRisk",
    "TimeOfDay",
    "SenderBlacklisted",
    "SenderAgeDays",
    "Label",
];

/// Check that a label slice is binary
pub fn validate_labels(labels: &[u8]) -> Result<(), ModelError> {
    match labels.iter().position(|&l| l > 1) {
        Some(idx) => Err(ModelError::invalid_input(format!(
            "label {} at row {} is not 0 or 1",
            labels[idx], idx
        ))),
        None => Ok(()),
    }
}

/// A validated batch of transactions
///
/// Features form an `n × k` matrix with `n ≥ 1`, `k ≥ 1` and no missing or
/// infinite values; labels hold one value in {0, 1} per row, 1 meaning fraud.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDataset {
    features: Array2<f64>,
    labels: Vec<u8>,
}

impl TransactionDataset {
    /// Create a new dataset from a feature matrix and label vector
    pub fn new(features: Array2<f64>, labels: Vec<u8>) -> Result<Self, ModelError> {
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(ModelError::invalid_input(format!(
                "feature matrix must be non-empty, got {}x{}",
                features.nrows(),
                features.ncols()
            )));
        }

        if features.nrows() != labels.len() {
            return Err(ModelError::invalid_input(format!(
                "number of feature rows ({}) does not match number of labels ({})",
                features.nrows(),
                labels.len()
            )));
        }

        if let Some(((row, col), value)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::invalid_input(format!(
                "non-finite value {} at row {}, column {}",
                value, row, col
            )));
        }

        validate_labels(&labels)?;

        Ok(Self { features, labels })
    }

    /// Load a transaction CSV file
    ///
    /// The header must name every column in [`REQUIRED_COLUMNS`]; order is
    /// free and extra columns are ignored. `TimeOfDay` accepts `Day`/`Night`
    /// as well as a number. Fields may be quoted.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_reader(File::open(path)?);

        let positions: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !positions.contains_key(**c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DatasetError::MissingColumns(missing));
        }

        let feature_positions: Vec<usize> = FEATURE_COLUMNS.iter().map(|c| positions[*c]).collect();
        let label_position = positions["Label"];

        let mut values = Vec::new();
        let mut labels = Vec::new();

        for record in reader.records() {
            let record = record?;
            let line_number = record.position().map_or(0, |p| p.line() as usize);

            for (&pos, &name) in feature_positions.iter().zip(FEATURE_COLUMNS.iter()) {
                let cell = record.get(pos).unwrap_or("");
                values.push(parse_feature(name, cell).ok_or_else(|| DatasetError::Parse {
                    line: line_number,
                    column: name.to_string(),
                    value: cell.to_string(),
                })?);
            }

            let cell = record.get(label_position).unwrap_or("");
            let label = cell.parse::<u8>().map_err(|_| DatasetError::Parse {
                line: line_number,
                column: "Label".to_string(),
                value: cell.to_string(),
            })?;
            labels.push(label);
        }

        let features = Array2::from_shape_vec((labels.len(), FEATURE_COLUMNS.len()), values)
            .map_err(|e| ModelError::invalid_input(e.to_string()))?;

        debug!(rows = labels.len(), "Loaded transaction file");
        Ok(Self::new(features, labels)?)
    }

    /// Get the number of samples in the dataset
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Get a single sample
    pub fn sample(&self, index: usize) -> Option<(ArrayView1<'_, f64>, u8)> {
        self.labels
            .get(index)
            .map(|&label| (self.features.row(index), label))
    }

    /// Number of fraud-labelled rows
    pub fn fraud_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// Split back into owned parts
    pub fn into_parts(self) -> (Array2<f64>, Vec<u8>) {
        (self.features, self.labels)
    }
}

fn parse_feature(column: &str, cell: &str) -> Option<f64> {
    if column == "TimeOfDay" {
        match cell {
            "Day" => return Some(0.0),
            "Night" => return Some(1.0),
            _ => {}
        }
    }
    cell.parse::<f64>().ok()
}
