//! Trajectory loading, superposition and RMSD.
//!
//! The assignment loop only talks to the [`Kernel`] trait, [`NativeKernel`] is the implementation
//! shipped with the binary.
use std::fmt;
use std::path::Path;

use clap::ValueEnum;
use rayon::prelude::*;
use serde::Deserialize;
use shared::{
    Array1,
    Result,
    Topology,
    Trajectory,
    ensure,
    ndarray::{ArrayView2, Axis},
    numeric_methods::rmsd_in_place,
    trajectory::check_atom_indices,
};
use md_parsers::TrajFormat;

use crate::error::AssignError;

pub mod qcp;


pub trait Kernel: Sync {
    /// Load the topology and its reference frame.
    fn load_topology(&self, path: &Path) -> Result<Topology>;

    /// Load a trajectory matching `topology`, keeping only the atoms of `idx` in that order.
    fn load(&self, path: &Path, topology: &Topology, idx: &[usize]) -> Result<Trajectory>;

    /// Move every frame of `traj` so that its `atoms` best match those of `reference`.
    fn superpose(&self, traj: Trajectory, reference: ArrayView2<f32>, atoms: &[usize]) -> Result<Trajectory>;

    /// RMSD of the `atoms` of every frame of `traj` to `reference`, one value per frame.
    fn rmsd(&self, traj: &Trajectory, reference: ArrayView2<f32>, atoms: &[usize]) -> Result<Array1<f64>>;
}


#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
/// How the scoring atoms are compared once every frame is superposed on the alignment atoms.
///
/// `Aligned` does no further fit: a ligand that rotates in place counts as moved. MDTraj-style
/// scoring with `md.RMSD(..., atom_indices=ligand, precentered=True)` still optimises a rotation
/// of the ligand atoms, `Refit` is the closer match to it.
pub enum ScoringMode {
    /// Plain RMSD of the scoring atoms in the frame of the alignment atoms, no second fit.
    #[default]
    Aligned,
    /// Minimal RMSD of the scoring atoms after their own optimal rotation about their centroid.
    Refit,
}


impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match self {
            ScoringMode::Aligned => "aligned",
            ScoringMode::Refit   => "refit",
        })
    }
}


#[derive(Clone, Copy, Debug, Default)]
pub struct NativeKernel {
    pub scoring: ScoringMode,
}


impl NativeKernel {
    pub fn new(scoring: ScoringMode) -> Self {
        Self { scoring }
    }
}


fn check_shapes(traj: &Trajectory, reference: &ArrayView2<f32>, atoms: &[usize]) -> Result<()> {
    ensure!(reference.shape() == [traj.n_atoms(), 3],
            "Reference in shape of {:?} does not match {} atoms of the trajectory.",
            reference.shape(), traj.n_atoms());
    ensure!(!atoms.is_empty(), "No atom selected for superposition or RMSD.");
    check_atom_indices(atoms, traj.n_atoms())
}


impl Kernel for NativeKernel {
    fn load_topology(&self, path: &Path) -> Result<Topology> {
        match TrajFormat::from_path(path) {
            Some(TrajFormat::Pdb) => md_parsers::load_topology(path),
            _ => Err(AssignError::UnsupportedFormat(path.to_path_buf()).into()),
        }
    }

    fn load(&self, path: &Path, topology: &Topology, idx: &[usize]) -> Result<Trajectory> {
        if TrajFormat::from_path(path).is_none() {
            return Err(AssignError::UnsupportedFormat(path.to_path_buf()).into());
        }

        md_parsers::load_trajectory(path, Some(topology), Some(idx))
            .map_err(|e| AssignError::UnreadableTrajectory {
                path:   path.to_path_buf(),
                reason: format!("{:#}", e),
            }.into())
    }

    fn superpose(&self, mut traj: Trajectory, reference: ArrayView2<f32>, atoms: &[usize]) -> Result<Trajectory> {
        check_shapes(&traj, &reference, atoms)?;
        let (c_ref, ref_pos) = qcp::centered(reference, atoms);

        traj.xyz.axis_iter_mut(Axis(0))
            .par_bridge()
            .for_each(|mut frame| {
                let (c_mob, mob_pos) = qcp::centered(frame.view(), atoms);
                let rot = qcp::superpose(&ref_pos, &mob_pos).rotation;

                for mut atom in frame.axis_iter_mut(Axis(0)) {
                    let x = [0, 1, 2].map(|k| atom[k] as f64 - c_mob[k]);
                    let y = qcp::rotate(&rot, x);
                    for k in 0 .. 3 {
                        atom[k] = (y[k] + c_ref[k]) as f32;
                    }
                }
            });

        Ok(traj)
    }

    fn rmsd(&self, traj: &Trajectory, reference: ArrayView2<f32>, atoms: &[usize]) -> Result<Array1<f64>> {
        check_shapes(traj, &reference, atoms)?;

        let ret = match self.scoring {
            ScoringMode::Aligned => {
                (0 .. traj.n_frames()).into_par_iter()
                    .map(|i| rmsd_in_place(traj.frame(i), reference, atoms))
                    .collect::<Vec<f64>>()
            },
            ScoringMode::Refit => {
                let (_, ref_pos) = qcp::centered(reference, atoms);
                (0 .. traj.n_frames()).into_par_iter()
                    .map(|i| {
                        let (_, mob_pos) = qcp::centered(traj.frame(i), atoms);
                        qcp::superpose(&ref_pos, &mob_pos).rmsd
                    })
                    .collect::<Vec<f64>>()
            },
        };

        Ok(Array1::from(ret))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use shared::Array3;

    // a rigid, non-planar tetrahedron plus two loose atoms
    fn body() -> Vec<[f32; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.5, 0.5, 0.5],
            [1.0, 1.0, 0.0],
        ]
    }

    fn rz(theta: f32, p: [f32; 3]) -> [f32; 3] {
        let (s, c) = theta.sin_cos();
        [c * p[0] - s * p[1], s * p[0] + c * p[1], p[2]]
    }

    fn traj_of(frames: &[Vec<[f32; 3]>]) -> Trajectory {
        let n = frames[0].len();
        let data = frames.iter().flatten().flatten().copied().collect();
        Trajectory::from_flat(frames.len(), n, data).unwrap()
    }

    #[test]
    fn test_superpose_undoes_rigid_motion() {
        let reference = traj_of(&[body()]);
        let moved = body().into_iter()
            .map(|p| rz(0.7, p))
            .map(|p| [p[0] + 3.0, p[1] - 1.0, p[2] + 0.5])
            .collect::<Vec<_>>();
        let traj = traj_of(&[moved, body()]);

        let kernel = NativeKernel::default();
        let aligned = kernel.superpose(traj, reference.frame(0), &[0, 1, 2, 3]).unwrap();

        for iframe in 0 .. 2 {
            for (a, b) in aligned.frame(iframe).iter().zip(reference.frame(0).iter()) {
                assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
            }
        }
    }

    #[test]
    fn test_scoring_modes() {
        let reference = traj_of(&[body()]);

        // the scoring atoms 4 and 5 are shifted rigidly together
        let mut shifted = body();
        shifted[4][2] += 0.3;
        shifted[5][2] += 0.3;
        let traj = traj_of(&[body(), shifted]);

        let aligned = NativeKernel::new(ScoringMode::Aligned)
            .rmsd(&traj, reference.frame(0), &[4, 5]).unwrap();
        assert!(aligned[0].abs() < 1e-9);
        assert!((aligned[1] - 0.3).abs() < 1e-6);

        let refit = NativeKernel::new(ScoringMode::Refit)
            .rmsd(&traj, reference.frame(0), &[4, 5]).unwrap();
        assert!(refit[0].abs() < 1e-4);
        assert!(refit[1].abs() < 1e-4);
    }

    #[test]
    fn test_shape_checks() {
        let kernel = NativeKernel::default();
        let traj = traj_of(&[body()]);
        let wrong = Array3::<f32>::zeros((1, 3, 3));
        let wrong = wrong.index_axis(Axis(0), 0);

        assert!(kernel.rmsd(&traj, wrong, &[0]).is_err());
        assert!(kernel.rmsd(&traj, traj.frame(0), &[]).is_err());
        assert!(kernel.rmsd(&traj, traj.frame(0), &[6]).is_err());
        assert!(kernel.superpose(traj.clone(), traj.frame(0), &[9]).is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let kernel = NativeKernel::default();
        let top = Topology::new(vec![], shared::Array2::zeros((0, 3))).unwrap();
        let err = kernel.load(Path::new("traj.xtc"), &top, &[]).unwrap_err();
        assert!(matches!(err.downcast_ref::<AssignError>(), Some(AssignError::UnsupportedFormat(_))));

        let err = kernel.load_topology(Path::new("native.gro")).unwrap_err();
        assert!(matches!(err.downcast_ref::<AssignError>(), Some(AssignError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_unreadable_trajectory() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = NativeKernel::default();
        let top = Topology::new(vec![], shared::Array2::zeros((0, 3))).unwrap();

        // a known extension with garbage inside, then a valid header cut short
        let garbage = dir.path().join("garbage.dcd");
        std::fs::write(&garbage, [7u8; 150]).unwrap();
        let truncated = dir.path().join("truncated.dcd");
        let mut bytes = 84i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"CORD");
        std::fs::write(&truncated, bytes).unwrap();

        for fname in [garbage, truncated] {
            let err = kernel.load(&fname, &top, &[]).unwrap_err();
            match err.downcast_ref::<AssignError>() {
                Some(AssignError::UnreadableTrajectory { path, reason }) => {
                    assert_eq!(path, &fname);
                    assert!(!reason.is_empty());
                },
                other => panic!("unexpected error {:?}", other),
            }
        }
    }
}
