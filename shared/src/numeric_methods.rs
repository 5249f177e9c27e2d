use ndarray::ArrayView2;
use num_traits::Float;


/// Position and value of the smallest element.
///
/// The first occurrence wins on ties, NaNs never win over a comparable value.
/// Returns `None` for an empty input or an input full of NaNs.
pub fn argmin<T, I>(xs: I) -> Option<(usize, T)>
where T: Float,
      I: IntoIterator<Item=T>,
{
    xs.into_iter()
        .enumerate()
        .filter(|(_, x)| !x.is_nan())
        .fold(None, |acc, (i, x)| match acc {
            Some((_, m)) if m <= x => acc,
            _ => Some((i, x)),
        })
}


/// Geometric center of the selected rows of a `[n_atoms, 3]` coordinate block.
///
/// Requirements: `atoms` is not empty.
pub fn centroid(xyz: ArrayView2<f32>, atoms: &[usize]) -> [f64; 3] {
    assert!(!atoms.is_empty());

    let mut c = [0.0f64; 3];
    for &i in atoms {
        for k in 0 .. 3 {
            c[k] += xyz[[i, k]] as f64;
        }
    }

    let n = atoms.len() as f64;
    [c[0] / n, c[1] / n, c[2] / n]
}


/// Root-mean-square deviation between the selected atoms of two frames, without any fitting.
///
/// Requirements: `atoms` is not empty.
pub fn rmsd_in_place(a: ArrayView2<f32>, b: ArrayView2<f32>, atoms: &[usize]) -> f64 {
    assert!(!atoms.is_empty());

    let sum = atoms.iter()
        .map(|&i| {
            (0 .. 3).map(|k| {
                let d = a[[i, k]] as f64 - b[[i, k]] as f64;
                d * d
            })
            .sum::<f64>()
        })
        .sum::<f64>();

    (sum / atoms.len() as f64).sqrt()
}
