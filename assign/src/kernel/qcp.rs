//! Optimal superposition with the quaternion characteristic polynomial (QCP) method.
//!
//! Reference: D. L. Theobald, Acta Cryst. A61, 478 (2005);
//!            P. Liu, D. K. Agrafiotis, D. L. Theobald, J. Comput. Chem. 31, 1561 (2010).
use shared::{
    Mat33,
    ndarray::ArrayView2,
};


const EVAL_PREC: f64 = 1e-11;
const EVEC_PREC: f64 = 1e-6;
const MAX_NEWTON_ITER: usize = 50;

const IDENTITY: Mat33<f64> = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];


#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Superposition {
    /// Minimal RMSD between the two centered sets.
    pub rmsd:     f64,
    /// Rotation bringing the mobile set onto the reference one: `R . mobile ~ reference`.
    pub rotation: Mat33<f64>,
}


/// Centroid of `atoms` in `xyz` and the coordinates of `atoms` relative to it.
pub fn centered(xyz: ArrayView2<f32>, atoms: &[usize]) -> ([f64; 3], Vec<[f64; 3]>) {
    let c = shared::numeric_methods::centroid(xyz, atoms);
    let pos = atoms.iter()
        .map(|&i| [0, 1, 2].map(|k| xyz[[i, k]] as f64 - c[k]))
        .collect();
    (c, pos)
}


#[inline]
pub fn rotate(r: &Mat33<f64>, v: [f64; 3]) -> [f64; 3] {
    [
        r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
        r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
        r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
    ]
}


/// Superpose two centered coordinate sets of equal length.
pub fn superpose(reference: &[[f64; 3]], mobile: &[[f64; 3]]) -> Superposition {
    debug_assert_eq!(reference.len(), mobile.len());
    let n = reference.len();
    if n == 0 {
        return Superposition { rmsd: 0.0, rotation: IDENTITY };
    }

    // A[i][j] = sum(ref_i * mob_j), E0 = (G_ref + G_mob) / 2
    let mut a = [[0f64; 3]; 3];
    let mut g = 0f64;
    for (r, m) in reference.iter().zip(mobile.iter()) {
        for i in 0 .. 3 {
            for j in 0 .. 3 {
                a[i][j] += r[i] * m[j];
            }
            g += r[i] * r[i] + m[i] * m[i];
        }
    }
    let e0 = g * 0.5;

    if e0 <= f64::MIN_POSITIVE {
        return Superposition { rmsd: 0.0, rotation: IDENTITY };
    }

    // scale-free thresholds
    a.iter_mut().flatten().for_each(|x| *x /= e0);

    let lambda = max_eigenvalue(&a);
    let rmsd = (2.0 * e0 * (1.0 - lambda) / n as f64).abs().sqrt();
    let rotation = rotation_from_eigenvalue(&a, lambda);

    Superposition { rmsd, rotation }
}


/// Largest root of the characteristic polynomial of the key matrix, with `E0` normalized to 1.
fn max_eigenvalue(a: &Mat33<f64>) -> f64 {
    let [[sxx, sxy, sxz], [syx, syy, syz], [szx, szy, szz]] = *a;

    let sxx2 = sxx * sxx;
    let syy2 = syy * syy;
    let szz2 = szz * szz;
    let sxy2 = sxy * sxy;
    let syz2 = syz * syz;
    let sxz2 = sxz * sxz;
    let syx2 = syx * syx;
    let szy2 = szy * szy;
    let szx2 = szx * szx;

    let syzszymsyyszz2 = 2.0 * (syz * szy - syy * szz);
    let sxx2syy2szz2syz2szy2 = syy2 + szz2 - sxx2 + syz2 + szy2;

    let c2 = -2.0 * (sxx2 + syy2 + szz2 + sxy2 + syx2 + sxz2 + szx2 + syz2 + szy2);
    let c1 = 8.0 * (sxx * syz * szy + syy * szx * sxz + szz * sxy * syx
                  - sxx * syy * szz - syz * szx * sxy - szy * syx * sxz);

    let sxzpszx = sxz + szx;
    let syzpszy = syz + szy;
    let sxypsyx = sxy + syx;
    let syzmszy = syz - szy;
    let sxzmszx = sxz - szx;
    let sxymsyx = sxy - syx;
    let sxxpsyy = sxx + syy;
    let sxxmsyy = sxx - syy;
    let sxy2sxz2syx2szx2 = sxy2 + sxz2 - syx2 - szx2;

    let c0 = sxy2sxz2syx2szx2 * sxy2sxz2syx2szx2
        + (sxx2syy2szz2syz2szy2 + syzszymsyyszz2) * (sxx2syy2szz2syz2szy2 - syzszymsyyszz2)
        + (-sxzpszx * syzmszy + sxymsyx * (sxxmsyy - szz)) * (-sxzmszx * syzpszy + sxymsyx * (sxxmsyy + szz))
        + (-sxzpszx * syzpszy - sxypsyx * (sxxpsyy - szz)) * (-sxzmszx * syzmszy - sxypsyx * (sxxpsyy + szz))
        + ( sxypsyx * syzpszy + sxzpszx * (sxxmsyy + szz)) * (-sxymsyx * syzmszy + sxzpszx * (sxxpsyy + szz))
        + ( sxypsyx * syzmszy + sxzmszx * (sxxmsyy - szz)) * (-sxymsyx * syzpszy + sxzmszx * (sxxpsyy - szz));

    // Newton-Raphson from the upper bound E0 = 1
    let mut lambda = 1.0f64;
    for _ in 0 .. MAX_NEWTON_ITER {
        let old = lambda;
        let x2 = lambda * lambda;
        let b = (x2 + c2) * lambda;
        let a = b + c1;
        let denom = 2.0 * x2 * lambda + b + a;
        if denom == 0.0 {
            break;
        }
        lambda -= (a * lambda + c0) / denom;
        if (lambda - old).abs() < (EVAL_PREC * lambda).abs() {
            break;
        }
    }

    lambda
}


/// Rotation matrix from the eigenvector belonging to `lambda`, computed with the adjoint of
/// `K - lambda I`. Rows are tried in turn when the cofactors degenerate.
fn rotation_from_eigenvalue(a: &Mat33<f64>, lambda: f64) -> Mat33<f64> {
    let [[sxx, sxy, sxz], [syx, syy, syz], [szx, szy, szz]] = *a;

    let a11 = sxx + syy + szz - lambda;
    let a12 = syz - szy;
    let a13 = szx - sxz;
    let a14 = sxy - syx;
    let a21 = a12;
    let a22 = sxx - syy - szz - lambda;
    let a23 = sxy + syx;
    let a24 = szx + sxz;
    let a31 = a13;
    let a32 = a23;
    let a33 = syy - sxx - szz - lambda;
    let a34 = syz + szy;
    let a41 = a14;
    let a42 = a24;
    let a43 = a34;
    let a44 = szz - sxx - syy - lambda;

    let a3344_4334 = a33 * a44 - a43 * a34;
    let a3244_4234 = a32 * a44 - a42 * a34;
    let a3243_4233 = a32 * a43 - a42 * a33;
    let a3143_4133 = a31 * a43 - a41 * a33;
    let a3144_4134 = a31 * a44 - a41 * a34;
    let a3142_4132 = a31 * a42 - a41 * a32;

    let a1324_1423 = a13 * a24 - a14 * a23;
    let a1224_1422 = a12 * a24 - a14 * a22;
    let a1223_1322 = a12 * a23 - a13 * a22;
    let a1124_1421 = a11 * a24 - a14 * a21;
    let a1123_1321 = a11 * a23 - a13 * a21;
    let a1122_1221 = a11 * a22 - a12 * a21;

    let candidates = [
        [
             a22 * a3344_4334 - a23 * a3244_4234 + a24 * a3243_4233,
            -a21 * a3344_4334 + a23 * a3144_4134 - a24 * a3143_4133,
             a21 * a3244_4234 - a22 * a3144_4134 + a24 * a3142_4132,
            -a21 * a3243_4233 + a22 * a3143_4133 - a23 * a3142_4132,
        ],
        [
             a12 * a3344_4334 - a13 * a3244_4234 + a14 * a3243_4233,
            -a11 * a3344_4334 + a13 * a3144_4134 - a14 * a3143_4133,
             a11 * a3244_4234 - a12 * a3144_4134 + a14 * a3142_4132,
            -a11 * a3243_4233 + a12 * a3143_4133 - a13 * a3142_4132,
        ],
        [
             a42 * a1324_1423 - a43 * a1224_1422 + a44 * a1223_1322,
            -a41 * a1324_1423 + a43 * a1124_1421 - a44 * a1123_1321,
             a41 * a1224_1422 - a42 * a1124_1421 + a44 * a1122_1221,
            -a41 * a1223_1322 + a42 * a1123_1321 - a43 * a1122_1221,
        ],
        [
             a32 * a1324_1423 - a33 * a1224_1422 + a34 * a1223_1322,
            -a31 * a1324_1423 + a33 * a1124_1421 - a34 * a1123_1321,
             a31 * a1224_1422 - a32 * a1124_1421 + a34 * a1122_1221,
            -a31 * a1223_1322 + a32 * a1123_1321 - a33 * a1122_1221,
        ],
    ];

    let found = candidates.into_iter()
        .map(|q| (q, q.iter().map(|x| x * x).sum::<f64>()))
        .find(|&(_, qsqr)| qsqr >= EVEC_PREC);

    let ([q1, q2, q3, q4], qsqr) = match found {
        Some(found) => found,
        None => return IDENTITY,
    };

    let norm = qsqr.sqrt();
    let (q1, q2, q3, q4) = (q1 / norm, q2 / norm, q3 / norm, q4 / norm);

    let a2 = q1 * q1;
    let x2 = q2 * q2;
    let y2 = q3 * q3;
    let z2 = q4 * q4;

    let xy = q2 * q3;
    let az = q1 * q4;
    let zx = q4 * q2;
    let ay = q1 * q3;
    let yz = q3 * q4;
    let ax = q1 * q2;

    [
        [a2 + x2 - y2 - z2, 2.0 * (xy + az),   2.0 * (zx - ay)],
        [2.0 * (xy - az),   a2 - x2 + y2 - z2, 2.0 * (yz + ax)],
        [2.0 * (zx + ay),   2.0 * (yz - ax),   a2 - x2 - y2 + z2],
    ]
}
