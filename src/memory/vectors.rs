//! Contiguous embedding storage.
//!
//! All vectors live in one row-major `Array2<f32>`; row `i` is the embedding of
//! the ledger record whose `embedding_ref == i`. Rows are only ever appended at
//! the end or removed with the tail shifted down, so positions stay dense.

use ndarray::{Array2, ArrayView1, Axis};

use crate::error::ProviderError;

#[derive(Debug, Clone)]
pub struct VectorStore {
    rows: Array2<f32>,
    /// Fixed by the first write (or by a loaded snapshot).
    dimension: Option<usize>,
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorStore {
    pub fn new() -> Self {
        Self {
            rows: Array2::zeros((0, 0)),
            dimension: None,
        }
    }

    /// Rebuild from a flat row-major buffer, as read from a snapshot.
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self, String> {
        if dimension == 0 {
            return Err("vector dimension is zero".into());
        }
        if data.len() % dimension != 0 {
            return Err(format!(
                "{} values do not divide into rows of {dimension}",
                data.len()
            ));
        }
        let count = data.len() / dimension;
        let rows = Array2::from_shape_vec((count, dimension), data).map_err(|e| e.to_string())?;
        Ok(Self {
            rows,
            dimension: Some(dimension),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn row(&self, position: usize) -> ArrayView1<'_, f32> {
        self.rows.row(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = ArrayView1<'_, f32>> {
        self.rows.rows().into_iter()
    }

    /// All values in row order, for serialisation.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.rows.iter().copied()
    }

    /// Reject a vector that cannot join this store.
    pub fn check(&self, vector: &[f32]) -> Result<(), ProviderError> {
        if vector.is_empty() {
            return Err(ProviderError::InvalidResponse("empty embedding".into()));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(ProviderError::InvalidResponse(
                "embedding contains non-finite values".into(),
            ));
        }
        match self.dimension {
            Some(expected) if expected != vector.len() => Err(ProviderError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Append a row, returning its position.
    pub(crate) fn push(&mut self, vector: &[f32]) -> Result<usize, ProviderError> {
        self.check(vector)?;
        if self.dimension.is_none() {
            self.rows = Array2::zeros((0, vector.len()));
            self.dimension = Some(vector.len());
        }
        self.rows
            .push_row(ArrayView1::from(vector))
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(self.len() - 1)
    }

    /// Remove a row and shift every later row down by one.
    pub(crate) fn remove(&mut self, position: usize) {
        self.rows.remove_index(Axis(0), position);
    }
}
