//! Request bodies sent to the prediction endpoint.
//!
//! Workers share one immutable [`PayloadSequence`] and each keeps its own
//! cursor into it, so there is no shared mutable state on the payload path.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::errors::ConfigError;

/// Ordered, non-empty, read-only rotation of JSON request bodies.
///
/// Cloning is cheap: clones share the same backing slice.
#[derive(Debug, Clone)]
pub struct PayloadSequence {
    payloads: Arc<[Value]>,
}

impl PayloadSequence {
    /// Builds a sequence from `payloads`, or None when it is empty.
    pub fn new(payloads: Vec<Value>) -> Option<Self> {
        if payloads.is_empty() {
            return None;
        }
        Some(Self {
            payloads: payloads.into(),
        })
    }

    /// The built-in rotation of transaction-feature samples.
    pub fn samples() -> Self {
        Self {
            payloads: sample_payloads().into(),
        }
    }

    /// Loads a sequence from a file containing a JSON array of objects.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::PayloadFileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed: Value =
            serde_json::from_str(&raw).map_err(|e| ConfigError::PayloadFileFormat {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let Value::Array(items) = parsed else {
            return Err(ConfigError::PayloadFileFormat {
                path: path.to_path_buf(),
                message: "top-level value is not an array".to_string(),
            });
        };

        if let Some(position) = items.iter().position(|item| !item.is_object()) {
            return Err(ConfigError::PayloadFileFormat {
                path: path.to_path_buf(),
                message: format!("element {} is not an object", position),
            });
        }

        Self::new(items).ok_or_else(|| ConfigError::EmptyPayloads {
            path: path.to_path_buf(),
        })
    }

    /// Returns the payload for a worker-local `index`, wrapping around.
    pub fn get(&self, index: usize) -> &Value {
        &self.payloads[index % self.payloads.len()]
    }

    /// Number of distinct bodies in the rotation. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }
}

fn sample_payloads() -> Vec<Value> {
    vec![
        json!({
            "txn_count": 10.0,
            "total_debit": 5000.0,
            "total_credit": 3000.0,
            "avg_amount": 500.0,
            "kw_rent": 1,
            "kw_netflix": 0,
            "kw_tesco": 1,
            "kw_payroll": 1,
            "kw_bonus": 0
        }),
        json!({
            "txn_count": 15.0,
            "total_debit": 8000.0,
            "total_credit": 5000.0,
            "avg_amount": 650.0,
            "kw_rent": 1,
            "kw_netflix": 1,
            "kw_tesco": 0,
            "kw_payroll": 1,
            "kw_bonus": 1
        }),
        json!({
            "txn_count": 5.0,
            "total_debit": 2000.0,
            "total_credit": 1500.0,
            "avg_amount": 350.0,
            "kw_rent": 0,
            "kw_netflix": 1,
            "kw_tesco": 1,
            "kw_payroll": 0,
            "kw_bonus": 0
        }),
        json!({
            "txn_count": 20.0,
            "total_debit": 12000.0,
            "total_credit": 8000.0,
            "avg_amount": 800.0,
            "kw_rent": 1,
            "kw_netflix": 0,
            "kw_tesco": 1,
            "kw_payroll": 1,
            "kw_bonus": 0
        }),
        json!({
            "txn_count": 8.0,
            "total_debit": 3500.0,
            "total_credit": 2500.0,
            "avg_amount": 450.0,
            "kw_rent": 0,
            "kw_netflix": 1,
            "kw_tesco": 0,
            "kw_payroll": 1,
            "kw_bonus": 0
        }),
    ]
}
