//! State variable storage for simulations.
//!
//! A [`VarsList`] is a contiguous, indexed vector of scalar state variables
//! with one distinguished time variable. Every entry carries a sequence
//! number that increments whenever the variable is written discontinuously
//! (an impulse, a restore, a user drag); observers such as plotters use the
//! sequence numbers to break their traces at discontinuities.

use serde::{Deserialize, Serialize};

/// A contiguous vector of named scalar state variables plus a time value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarsList {
    names: Vec<String>,
    values: Vec<f64>,
    sequence: Vec<u32>,
    time_index: usize,
}

impl VarsList {
    /// Creates a variable list from names; `time_index` selects the variable
    /// holding simulation time.
    ///
    /// # Panics
    /// Panics if `time_index` is out of range.
    pub fn new(names: Vec<String>, time_index: usize) -> Self {
        assert!(time_index < names.len(), "time index out of range");
        let n = names.len();
        Self {
            names,
            values: vec![0.0; n],
            sequence: vec![0; n],
            time_index,
        }
    }

    /// Number of variables, time included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the list has no variables.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the time variable.
    pub fn time_index(&self) -> usize {
        self.time_index
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.values[self.time_index]
    }

    /// Name of variable `i`.
    pub fn name(&self, i: usize) -> &str {
        &self.names[i]
    }

    /// Value of variable `i`.
    #[inline]
    pub fn value(&self, i: usize) -> f64 {
        self.values[i]
    }

    /// All values as a slice, in index order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Sequence number of variable `i`.
    pub fn sequence(&self, i: usize) -> u32 {
        self.sequence[i]
    }

    /// Writes variable `i` as a continuous change.
    #[inline]
    pub fn set_value(&mut self, i: usize, value: f64) {
        self.values[i] = value;
    }

    /// Writes variable `i` as a discontinuous change, incrementing its
    /// sequence number.
    pub fn set_value_discontinuous(&mut self, i: usize, value: f64) {
        self.values[i] = value;
        self.sequence[i] = self.sequence[i].wrapping_add(1);
    }

    /// Overwrites all values as a continuous change.
    ///
    /// # Panics
    /// Panics if `values` has the wrong length.
    pub fn set_values(&mut self, values: &[f64]) {
        assert_eq!(values.len(), self.values.len(), "variable count mismatch");
        self.values.copy_from_slice(values);
    }

    /// Overwrites all values, incrementing every sequence number.
    pub fn set_values_discontinuous(&mut self, values: &[f64]) {
        self.set_values(values);
        for s in &mut self.sequence {
            *s = s.wrapping_add(1);
        }
    }

    /// Appends a variable, returning its index.
    pub fn add_variable(&mut self, name: impl Into<String>) -> usize {
        self.names.push(name.into());
        self.values.push(0.0);
        self.sequence.push(0);
        self.values.len() - 1
    }
}
