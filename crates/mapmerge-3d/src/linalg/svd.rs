//! 3×3 Singular Value Decomposition in double precision.
//!
//! The right singular vectors are the eigenvectors of `Aᵀ A`, computed with a
//! cyclic Jacobi eigenvalue iteration. The left singular vectors come from a
//! Givens QR decomposition of `A V`, which keeps `U` well defined when `A` is
//! rank deficient (coplanar or collinear point sets in rigid alignment).
//!
//! # Example
//!
//! ```
//! use glam::{DMat3, DVec3};
//! use mapmerge_3d::linalg::svd::svd3;
//!
//! let matrix = DMat3::from_diagonal(DVec3::new(1.0, 3.0, 2.0));
//! let svd = svd3(&matrix);
//! assert!((svd.s().x - 3.0).abs() < 1e-12);
//! ```
//!
//! # References
//!
//! * McAdams, Selle, Tamstorf, Teran, and Sifakis (2011).
//!   "Computing the Singular Value Decomposition of 3x3 matrices with minimal
//!   branching and elementary floating point operations."
//!   University of Wisconsin-Madison Technical Report TR1690.

use glam::{DMat3, DVec3};

const SVD3_EPSILON: f64 = 1e-12;
const MAX_SWEEPS: usize = 32;

/// Helper struct to store the cosine/sine pair of a Givens rotation.
#[derive(Debug)]
struct Givens {
    cos_theta: f64,
    sin_theta: f64,
}

/// Result of [`svd3`]: `A = U * diag(S) * Vᵀ`.
#[derive(Debug, Clone)]
pub struct Svd3 {
    u: DMat3,
    s: DVec3,
    v: DMat3,
}

impl Svd3 {
    /// Get the left singular vectors matrix.
    #[inline]
    pub fn u(&self) -> &DMat3 {
        &self.u
    }

    /// Get the singular values, sorted in descending order.
    #[inline]
    pub fn s(&self) -> &DVec3 {
        &self.s
    }

    /// Get the right singular vectors matrix.
    #[inline]
    pub fn v(&self) -> &DMat3 {
        &self.v
    }
}

#[inline]
fn at(m: &DMat3, row: usize, col: usize) -> f64 {
    m.col(col)[row]
}

/// Jacobi rotation `J` such that `(Jᵀ A J)[p][q] == 0` for a symmetric `A`.
fn jacobi_rotation(a: &DMat3, p: usize, q: usize) -> Option<DMat3> {
    let a_pq = at(a, p, q);
    if a_pq.abs() < f64::MIN_POSITIVE {
        return None;
    }

    let theta = (at(a, q, q) - at(a, p, p)) / (2.0 * a_pq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let g = Givens {
        cos_theta: 1.0 / (t * t + 1.0).sqrt(),
        sin_theta: t / (t * t + 1.0).sqrt(),
    };

    // column-major storage: cols[col][row]
    let mut cols = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    cols[p][p] = g.cos_theta;
    cols[q][q] = g.cos_theta;
    cols[q][p] = g.sin_theta;
    cols[p][q] = -g.sin_theta;
    Some(DMat3::from_cols_array_2d(&cols))
}

/// Eigenvectors (as columns) of a symmetric matrix.
fn jacobi_eigenanalysis(mut a: DMat3) -> DMat3 {
    let mut v = DMat3::IDENTITY;
    let scale = a.to_cols_array().iter().map(|x| x * x).sum::<f64>();

    for _ in 0..MAX_SWEEPS {
        let off_diag = at(&a, 0, 1).powi(2) + at(&a, 0, 2).powi(2) + at(&a, 1, 2).powi(2);
        if off_diag <= f64::EPSILON * f64::EPSILON * scale {
            break;
        }

        for (p, q) in [(0, 1), (0, 2), (1, 2)] {
            if let Some(j) = jacobi_rotation(&a, p, q) {
                a = j.transpose() * a * j;
                v *= j;
            }
        }
    }
    v
}

fn swap_columns(m: &mut DMat3, i: usize, j: usize) {
    let ci = m.col(i);
    let cj = m.col(j);
    *m.col_mut(i) = cj;
    *m.col_mut(j) = ci;
}

/// Sorts the singular values in descending order and adjusts the corresponding singular vectors accordingly.
///
/// Every swap negates one column so that `det(V)` is preserved.
fn sort_singular_values(b: &mut DMat3, v: &mut DMat3) {
    for (i, j) in [(0, 1), (0, 2), (1, 2)] {
        if b.col(i).length_squared() < b.col(j).length_squared() {
            swap_columns(b, i, j);
            swap_columns(v, i, j);
            *b.col_mut(j) = -b.col(j);
            *v.col_mut(j) = -v.col(j);
        }
    }
}

/// Givens rotation (half-angle form) zeroing `a2` against `a1`.
#[inline]
fn qr_givens_quaternion(a1: f64, a2: f64) -> Givens {
    let rho = (a1 * a1 + a2 * a2).sqrt();

    let mut g = Givens {
        cos_theta: a1.abs() + f64::max(rho, SVD3_EPSILON),
        sin_theta: if rho > SVD3_EPSILON { a2 } else { 0.0 },
    };

    if a1 < 0.0 {
        std::mem::swap(&mut g.sin_theta, &mut g.cos_theta);
    }

    let w = (g.cos_theta * g.cos_theta + g.sin_theta * g.sin_theta)
        .sqrt()
        .recip();
    g.cos_theta *= w;
    g.sin_theta *= w;
    g
}

/// Apply the row rotation defined by (`cos`, `sin`) on rows `r0` and `r1` of every column.
fn rotate_rows(b: &mut DMat3, r0: usize, r1: usize, cos: f64, sin: f64) {
    for c in 0..3 {
        let col = b.col_mut(c);
        let x0 = col[r0];
        let x1 = col[r1];
        col[r0] = cos * x0 + sin * x1;
        col[r1] = -sin * x0 + cos * x1;
    }
}

/// Row-rotation matrix `Q` such that `Qᵀ` acts on rows `r0`, `r1` as in [`rotate_rows`].
fn rotation_matrix(r0: usize, r1: usize, cos: f64, sin: f64) -> DMat3 {
    let mut cols = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    cols[r0][r0] = cos;
    cols[r1][r1] = cos;
    cols[r0][r1] = sin;
    cols[r1][r0] = -sin;
    DMat3::from_cols_array_2d(&cols)
}

/// QR decomposition of `b` using Givens rotations. Returns `(Q, R)`.
fn qr_decomposition(mut b: DMat3) -> (DMat3, DMat3) {
    let mut q = DMat3::IDENTITY;
    for (r0, r1, col) in [(0, 1, 0), (0, 2, 0), (1, 2, 1)] {
        let g = qr_givens_quaternion(at(&b, r0, col), at(&b, r1, col));
        // double the half angle
        let cos = 1.0 - 2.0 * g.sin_theta * g.sin_theta;
        let sin = 2.0 * g.cos_theta * g.sin_theta;
        rotate_rows(&mut b, r0, r1, cos, sin);
        q *= rotation_matrix(r0, r1, cos, sin);
    }
    (q, b)
}

/// Compute the singular value decomposition of a 3x3 matrix.
pub fn svd3(a: &DMat3) -> Svd3 {
    // eigenvectors of AᵀA are the right singular vectors
    let mut v = jacobi_eigenanalysis(a.transpose() * *a);
    let mut b = *a * v;

    sort_singular_values(&mut b, &mut v);

    let (mut u, r) = qr_decomposition(b);

    let mut s = DVec3::new(at(&r, 0, 0), at(&r, 1, 1), at(&r, 2, 2));
    for i in 0..3 {
        if s[i] < 0.0 {
            *u.col_mut(i) = -u.col(i);
            s[i] = -s[i];
        }
    }

    Svd3 { u, s, v }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify_svd_properties(a: &DMat3, svd: &Svd3, epsilon: f64) {
        let reconstruction = svd.u * DMat3::from_diagonal(svd.s) * svd.v.transpose();
        assert!(
            a.abs_diff_eq(reconstruction, epsilon),
            "Reconstruction failed: A != U*S*V.T\nA:\n{}\nReconstruction:\n{}",
            a,
            reconstruction
        );

        let u_t_u = svd.u.transpose() * svd.u;
        assert!(
            DMat3::IDENTITY.abs_diff_eq(u_t_u, epsilon),
            "U is not orthogonal: {}",
            u_t_u
        );

        let v_t_v = svd.v.transpose() * svd.v;
        assert!(
            DMat3::IDENTITY.abs_diff_eq(v_t_v, epsilon),
            "V is not orthogonal: {}",
            v_t_v
        );

        let s = svd.s;
        assert!(s.min_element() >= 0.0, "negative singular values: {:?}", s);
        assert!(
            s.x >= s.y - epsilon && s.y >= s.z - epsilon,
            "Singular values are not sorted: {:?}",
            s
        );
    }

    #[test]
    fn test_svd3_diagonal_unsorted() {
        let a = DMat3::from_diagonal(DVec3::new(2.0, 3.0, 1.0));
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, 1e-10);
        assert!(svd.s.abs_diff_eq(DVec3::new(3.0, 2.0, 1.0), 1e-10));
    }

    #[test]
    fn test_svd3_zero() {
        let a = DMat3::ZERO;
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, 1e-10);
        assert!(svd.s.abs_diff_eq(DVec3::ZERO, 1e-10));
    }

    #[test]
    fn test_svd3_rotation_matrix() {
        let a = DMat3::from_rotation_y(std::f64::consts::FRAC_PI_4);
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, 1e-10);
        assert!(svd.s.abs_diff_eq(DVec3::ONE, 1e-10));
    }

    #[test]
    fn test_svd3_singular_rank1() {
        let a = DMat3::from_cols(
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(2.0, 4.0, 6.0),
            DVec3::new(3.0, 6.0, 9.0),
        );
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, 1e-9);
        assert!(svd.s.x > 1.0);
        assert!(svd.s.y.abs() < 1e-6);
        assert!(svd.s.z.abs() < 1e-6);
    }

    #[test]
    fn test_svd3_general_full_rank() {
        let a = DMat3::from_cols(
            DVec3::new(1.0, 4.0, 7.0),
            DVec3::new(2.0, 5.0, 8.0),
            DVec3::new(3.0, 6.0, 10.0),
        );
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, 1e-9);
        assert!(svd.s.min_element() > 1e-6);
    }

    #[test]
    fn test_svd3_singular_rank2() {
        let a = DMat3::from_cols(
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(4.0, 5.0, 6.0),
            DVec3::new(5.0, 7.0, 9.0),
        );
        let svd = svd3(&a);
        verify_svd_properties(&a, &svd, 1e-9);
        assert!(svd.s.y > 1e-6);
        assert!(svd.s.z.abs() < 1e-6);
    }
}
