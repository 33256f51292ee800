//! Gaussian elimination kernel for the impulse equations.
//!
//! The collision matrix is symmetric but frequently rank-deficient: stacked
//! or mirrored contacts produce identical rows. Elimination therefore uses
//! scaled partial pivoting on rows and falls back to column exchange when a
//! pivot column dies out; a rank-deficient system is still solvable provided
//! the right-hand side lies in the column space, in which case the free
//! variables are taken as zero.

use nalgebra::{DMatrix, DVector};

use crate::error::{SimError, SimResult};

/// Solves `a x = b`, tolerating rank deficiency.
///
/// `zero_tol` decides when a pivot or residual counts as zero, scaled by the
/// magnitude of the row it appears in.
///
/// # Errors
/// Returns [`SimError::SingularMatrix`] naming the offending (post-pivot)
/// row when `b` is not in the column space of `a`.
pub fn solve_linear(a: &DMatrix<f64>, b: &DVector<f64>, zero_tol: f64) -> SimResult<DVector<f64>> {
    let n = a.nrows();
    debug_assert_eq!(a.ncols(), n);
    debug_assert_eq!(b.len(), n);
    if n == 0 {
        return Ok(DVector::zeros(0));
    }

    let mut m = a.clone_owned();
    let mut rhs = b.clone_owned();
    let mut colperm: Vec<usize> = (0..n).collect();

    // Per-row scale factors for the pivoting metric.
    let scale: Vec<f64> = (0..n)
        .map(|i| m.row(i).iter().fold(1.0_f64, |acc, v| acc.max(v.abs())))
        .collect();
    let mut row_scale: Vec<f64> = scale;

    let mut rank = n;
    for k in 0..n {
        // Scaled partial pivot in column k, rows k..n.
        let pivot = best_pivot(&m, &row_scale, k, k, zero_tol);
        let pivot = match pivot {
            Some(p) => Some((k, p)),
            None => {
                // Column exchange: any later column with a usable pivot.
                (k + 1..n).find_map(|c| best_pivot(&m, &row_scale, k, c, zero_tol).map(|p| (c, p)))
            }
        };
        let Some((col, pivot_row)) = pivot else {
            rank = k;
            break;
        };
        if col != k {
            m.swap_columns(k, col);
            colperm.swap(k, col);
        }
        if pivot_row != k {
            m.swap_rows(k, pivot_row);
            rhs.swap_rows(k, pivot_row);
            row_scale.swap(k, pivot_row);
        }
        let pivot_val = m[(k, k)];
        for i in (k + 1)..n {
            let f = m[(i, k)] / pivot_val;
            if f == 0.0 {
                continue;
            }
            for j in k..n {
                m[(i, j)] -= f * m[(k, j)];
            }
            rhs[i] -= f * rhs[k];
            m[(i, k)] = 0.0;
        }
    }

    // Zero rows must carry a zero right-hand side, else no solution exists.
    let b_scale = b.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    for i in rank..n {
        if rhs[i].abs() > zero_tol * b_scale {
            return Err(SimError::SingularMatrix { row: i });
        }
    }

    // Back substitution; free variables beyond the rank stay zero.
    let mut x = DVector::zeros(n);
    for k in (0..rank).rev() {
        let mut sum = rhs[k];
        for j in (k + 1)..n {
            sum -= m[(k, j)] * x[j];
        }
        x[k] = sum / m[(k, k)];
    }

    let mut result = DVector::zeros(n);
    for j in 0..n {
        result[colperm[j]] = x[j];
    }
    Ok(result)
}

/// Best usable pivot row for column `col` among rows `from..n`, by the
/// scaled magnitude metric. `None` when every candidate is below tolerance.
fn best_pivot(
    m: &DMatrix<f64>,
    row_scale: &[f64],
    from: usize,
    col: usize,
    zero_tol: f64,
) -> Option<usize> {
    let n = m.nrows();
    let mut best: Option<(usize, f64)> = None;
    for i in from..n {
        let denom = row_scale[i].max(1.0);
        let metric = m[(i, col)].abs() / denom;
        if m[(i, col)].abs() <= zero_tol * denom {
            continue;
        }
        if best.map_or(true, |(_, b)| metric > b) {
            best = Some((i, metric));
        }
    }
    best.map(|(i, _)| i)
}
