//! Structured covariance matrices
//!
//! The augmented tracking state holds one latent per pixel, so a dense
//! covariance over it would be quadratic in the image size. [`Covariance`]
//! keeps diagonal and block-diagonal structure explicit and only densifies
//! when asked to.

use nalgebra::{DMatrix, DVector};

use crate::common::linalg::psd_square_root;
use crate::filter::errors::FilterError;

/// Covariance matrix with explicit structure
#[derive(Debug, Clone, PartialEq)]
pub enum Covariance {
    /// Full symmetric matrix
    Dense(DMatrix<f64>),
    /// Diagonal matrix stored as its variances
    Diagonal(DVector<f64>),
    /// Block-diagonal matrix; blocks may themselves be structured
    BlockDiagonal(Vec<Covariance>),
}

impl Covariance {
    /// Identity covariance of the given dimension (diagonal)
    pub fn identity(dim: usize) -> Self {
        Covariance::Diagonal(DVector::from_element(dim, 1.0))
    }

    /// Isotropic diagonal covariance `variance · I`
    pub fn isotropic(dim: usize, variance: f64) -> Self {
        Covariance::Diagonal(DVector::from_element(dim, variance))
    }

    /// Matrix dimension
    pub fn dimension(&self) -> usize {
        match self {
            Covariance::Dense(m) => m.nrows(),
            Covariance::Diagonal(d) => d.len(),
            Covariance::BlockDiagonal(blocks) => blocks.iter().map(|b| b.dimension()).sum(),
        }
    }

    /// Main diagonal (variances)
    pub fn diagonal(&self) -> DVector<f64> {
        match self {
            Covariance::Dense(m) => m.diagonal(),
            Covariance::Diagonal(d) => d.clone(),
            Covariance::BlockDiagonal(blocks) => {
                let values: Vec<f64> = blocks
                    .iter()
                    .flat_map(|b| b.diagonal().iter().copied().collect::<Vec<_>>())
                    .collect();
                DVector::from_vec(values)
            }
        }
    }

    /// Dense representation
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Covariance::Dense(m) => m.clone(),
            Covariance::Diagonal(d) => DMatrix::from_diagonal(d),
            Covariance::BlockDiagonal(blocks) => {
                let n = self.dimension();
                let mut out = DMatrix::zeros(n, n);
                let mut offset = 0;
                for block in blocks {
                    let k = block.dimension();
                    out.view_mut((offset, offset), (k, k))
                        .copy_from(&block.to_dense());
                    offset += k;
                }
                out
            }
        }
    }

    /// Dense copy of the principal sub-matrix `[start, start + len)`
    ///
    /// Cross terms between different blocks are zero by construction.
    pub fn dense_block(&self, start: usize, len: usize) -> Result<DMatrix<f64>, FilterError> {
        let n = self.dimension();
        if start + len > n {
            return Err(FilterError::dimension_mismatch(
                n,
                start + len,
                "covariance block range",
            ));
        }
        match self {
            Covariance::Dense(m) => Ok(m.view((start, start), (len, len)).into_owned()),
            Covariance::Diagonal(d) => Ok(DMatrix::from_diagonal(&d.rows(start, len).into_owned())),
            Covariance::BlockDiagonal(blocks) => {
                let mut out = DMatrix::zeros(len, len);
                let mut offset = 0;
                for block in blocks {
                    let k = block.dimension();
                    let lo = start.max(offset);
                    let hi = (start + len).min(offset + k);
                    if lo < hi {
                        let sub = block.dense_block(lo - offset, hi - lo)?;
                        out.view_mut((lo - start, lo - start), (hi - lo, hi - lo))
                            .copy_from(&sub);
                    }
                    offset += k;
                }
                Ok(out)
            }
        }
    }

    /// Multiply by a scalar
    pub fn scale(&self, factor: f64) -> Self {
        match self {
            Covariance::Dense(m) => Covariance::Dense(m * factor),
            Covariance::Diagonal(d) => Covariance::Diagonal(d * factor),
            Covariance::BlockDiagonal(blocks) => {
                Covariance::BlockDiagonal(blocks.iter().map(|b| b.scale(factor)).collect())
            }
        }
    }

    /// Matrix-vector product
    pub fn mul_vector(&self, v: &DVector<f64>) -> Result<DVector<f64>, FilterError> {
        let n = self.dimension();
        if v.len() != n {
            return Err(FilterError::dimension_mismatch(n, v.len(), "covariance product"));
        }
        Ok(match self {
            Covariance::Dense(m) => m * v,
            Covariance::Diagonal(d) => d.component_mul(v),
            Covariance::BlockDiagonal(blocks) => {
                let mut out = DVector::zeros(n);
                let mut offset = 0;
                for block in blocks {
                    let k = block.dimension();
                    let part = block.mul_vector(&v.rows(offset, k).into_owned())?;
                    out.rows_mut(offset, k).copy_from(&part);
                    offset += k;
                }
                out
            }
        })
    }

    /// Square root factor `L` with `L·Lᵀ = self`, preserving structure
    ///
    /// Fails with [`FilterError::InvalidCovariance`] when the matrix is not
    /// symmetric positive semi-definite.
    pub fn square_root(&self) -> Result<Covariance, FilterError> {
        match self {
            Covariance::Dense(m) => psd_square_root(m)
                .map(Covariance::Dense)
                .ok_or_else(|| {
                    FilterError::invalid_covariance(format!(
                        "{}x{} dense matrix is not symmetric positive semi-definite",
                        m.nrows(),
                        m.ncols()
                    ))
                }),
            Covariance::Diagonal(d) => {
                if let Some((i, v)) = d
                    .iter()
                    .enumerate()
                    .find(|(_, v)| !v.is_finite() || **v < 0.0)
                {
                    return Err(FilterError::invalid_covariance(format!(
                        "variance {} at index {} is negative or not finite",
                        v, i
                    )));
                }
                Ok(Covariance::Diagonal(d.map(f64::sqrt)))
            }
            Covariance::BlockDiagonal(blocks) => blocks
                .iter()
                .map(|b| b.square_root())
                .collect::<Result<Vec<_>, _>>()
                .map(Covariance::BlockDiagonal),
        }
    }

    /// Validate structure and semi-definiteness
    pub fn validate(&self) -> Result<(), FilterError> {
        if let Covariance::Dense(m) = self {
            if !m.is_square() {
                return Err(FilterError::invalid_covariance(format!(
                    "matrix is {}x{}, expected square",
                    m.nrows(),
                    m.ncols()
                )));
            }
        }
        self.square_root().map(|_| ())
    }
}
