//! The pre-computed regression dataset the report is rendered from.
//!
//! The JSON document maps operation names to their fitted models and chart image:
//!
//! ```json
//! {
//!   "insert": {
//!     "models": [
//!       { "degree": 1, "coef": [0.5, 1.25], "var": 0.01, "sd": 0.1, "code": "++" }
//!     ],
//!     "image": "insert.png"
//!   }
//! }
//! ```
//!
//! Operations keep the order in which they appear in the document.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::error::{ReportError, Result};
use crate::significance::SignificanceCode;

/// Number of coefficient slots (`a0`..`a4`) shown for every model.
pub const COEFFICIENT_SLOTS: usize = 5;

/// A single fitted polynomial model.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Model {
    /// Polynomial degree.
    pub degree: u32,
    /// Coefficients `a0`, `a1`, ... in ascending order of power.
    #[serde(default)]
    pub coef: Vec<f64>,
    /// Residual variance estimate.
    #[serde(rename = "var")]
    pub variance: f64,
    /// Residual standard deviation.
    #[serde(rename = "sd")]
    pub std_dev: f64,
    /// Compact significance code, see [`crate::significance`].
    pub code: String,
    /// Optional free-text annotation.
    #[serde(default)]
    pub comment: Option<String>,
}

impl Model {
    /// Returns the coefficient stored in `slot`, if the model has one.
    pub fn coefficient(&self, slot: usize) -> Option<f64> {
        self.coef.get(slot).copied()
    }

    /// Returns the comment unless it is missing or blank.
    pub fn comment(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
    }
}

/// Models and chart reference of one operation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OperationInfo {
    /// Models in the order they were fitted.
    pub models: Vec<Model>,
    /// File name of the chart image, relative to the assets directory.
    pub image: String,
}

impl OperationInfo {
    /// Whether any model of the operation carries a comment.
    pub fn has_comments(&self) -> bool {
        self.models.iter().any(|model| model.comment().is_some())
    }
}

/// Ordered mapping from operation name to its regression results.
///
/// A name repeated in the document keeps its first position and takes the last value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ReportData {
    operations: IndexMap<String, OperationInfo>,
}

impl ReportData {
    /// Parses and validates a dataset from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let data: Self = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    /// Parses and validates a dataset from a reader yielding JSON.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let data: Self = serde_json::from_reader(reader)?;
        data.validate()?;
        Ok(data)
    }

    /// Loads and validates the dataset stored at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading report data from {}", path.display());
        let data = Self::from_reader(BufReader::new(File::open(path)?))?;
        debug!(
            "Loaded {} operations from {}",
            data.len(),
            path.display()
        );
        Ok(data)
    }

    /// Checks every model against the significance code pattern and the coefficient slot limit.
    pub fn validate(&self) -> Result<()> {
        for (name, info) in self.operations() {
            for (index, model) in info.models.iter().enumerate() {
                if model.code.parse::<SignificanceCode>().is_err() {
                    return Err(ReportError::InvalidCode {
                        operation: name.to_owned(),
                        index,
                        code: model.code.clone(),
                    });
                }
                if model.coef.len() > COEFFICIENT_SLOTS {
                    return Err(ReportError::TooManyCoefficients {
                        operation: name.to_owned(),
                        index,
                        count: model.coef.len(),
                        max: COEFFICIENT_SLOTS,
                    });
                }
            }
        }
        Ok(())
    }

    /// Iterates over the operations in document order.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &OperationInfo)> + '_ {
        self.operations
            .iter()
            .map(|(name, info)| (name.as_str(), info))
    }

    /// Looks up an operation by name.
    pub fn get(&self, name: &str) -> Option<&OperationInfo> {
        self.operations.get(name)
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the dataset contains no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
