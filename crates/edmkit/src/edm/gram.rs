//! Linear maps between Gram matrices, squared-distance matrices and point sets.

use nalgebra::DMatrix;

/// Orthonormal basis of the complement of the all-ones vector, shape `n × (n-1)`.
///
/// `Vᵀ 1 = 0` and `Vᵀ V = I`, so any `B = V G Vᵀ` has zero row and column
/// sums: configurations parametrised through `V` are centred.
pub fn centering_basis(n: usize) -> DMatrix<f64> {
    if n < 2 {
        return DMatrix::zeros(n, 0);
    }
    let nf = n as f64;
    let x = -1.0 / (nf + nf.sqrt());
    let y = -1.0 / nf.sqrt();
    DMatrix::from_fn(n, n - 1, |i, j| {
        if i == 0 {
            y
        } else if i - 1 == j {
            1.0 + x
        } else {
            x
        }
    })
}

/// Gram-to-distance map: `E_ij = B_ii + B_jj - 2 B_ij`.
pub fn edm_from_gram(b: &DMatrix<f64>) -> DMatrix<f64> {
    let n = b.nrows();
    DMatrix::from_fn(n, n, |i, j| b[(i, i)] + b[(j, j)] - 2.0 * b[(i, j)])
}

/// Double centering: `G = -½ J D J` with `J = I - 11ᵀ/n`.
///
/// Means are accumulated on `D / max|D|` and every term is halved before
/// summing, so any finite `D` gives a finite `G`.
pub fn gram_from_edm(d: &DMatrix<f64>) -> DMatrix<f64> {
    let n = d.nrows();
    if n == 0 {
        return DMatrix::zeros(0, 0);
    }
    let scale = d.amax();
    let scale = if scale > 0.0 && scale.is_finite() { scale } else { 1.0 };
    let nf = n as f64;
    let row_means: Vec<f64> = (0..n)
        .map(|i| d.row(i).iter().map(|v| v / scale).sum::<f64>() / nf)
        .collect();
    let col_means: Vec<f64> = (0..n)
        .map(|j| d.column(j).iter().map(|v| v / scale).sum::<f64>() / nf)
        .collect();
    let grand_mean = row_means.iter().sum::<f64>() / nf;
    DMatrix::from_fn(n, n, |i, j| {
        -0.5 * d[(i, j)] + 0.5 * scale * row_means[i] + 0.5 * scale * col_means[j]
            - 0.5 * scale * grand_mean
    })
}

/// Exact squared distances between the columns of a `dim × n` coordinate matrix.
pub fn edm_from_coords(x: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.ncols();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            0.0
        } else {
            (x.column(i) - x.column(j)).norm_squared()
        }
    })
}

/// Force exact symmetry and a zero diagonal; optionally clamp negatives to zero.
pub(crate) fn project_structure(m: &DMatrix<f64>, clamp_negatives: bool) -> DMatrix<f64> {
    let n = m.nrows();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            return 0.0;
        }
        let v = 0.5 * (m[(i, j)] + m[(j, i)]);
        if clamp_negatives {
            v.max(0.0)
        } else {
            v
        }
    })
}

/// `‖a - b‖_F / ‖b‖_F`, or the absolute error when `b` is zero.
pub fn relative_error(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    let num = (a - b).norm();
    let den = b.norm();
    if den > 0.0 {
        num / den
    } else {
        num
    }
}
