use ndarray::{
    Array3,
    ArrayView2,
    Axis,
};

use crate::{Result, bail, ensure};


/// Check that every index of `idx` addresses one of `n_atoms` atoms.
pub fn check_atom_indices(idx: &[usize], n_atoms: usize) -> Result<()> {
    if let Some(&i) = idx.iter().find(|&&i| i >= n_atoms) {
        bail!("Atom index {} is out of range, only {} atoms available.", i, n_atoms);
    }
    Ok(())
}


/// Ordered frames over a fixed set of atoms.
///
/// `xyz` is in shape of `[n_frames, n_atoms, 3]`, in nanometers.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    pub xyz: Array3<f32>,
}


impl Trajectory {
    pub fn new(xyz: Array3<f32>) -> Result<Self> {
        ensure!(xyz.shape()[2] == 3, "Coordinates must be three dimensional, got shape {:?}.", xyz.shape());
        Ok(Self { xyz })
    }

    /// Build from frame-major flattened coordinates: `[f0a0x, f0a0y, f0a0z, f0a1x, ...]`.
    pub fn from_flat(n_frames: usize, n_atoms: usize, data: Vec<f32>) -> Result<Self> {
        ensure!(data.len() == n_frames * n_atoms * 3,
                "Expected {} coordinates for {} frames of {} atoms, got {}.",
                n_frames * n_atoms * 3, n_frames, n_atoms, data.len());
        let xyz = Array3::from_shape_vec((n_frames, n_atoms, 3), data)?;
        Ok(Self { xyz })
    }

    pub fn n_frames(&self) -> usize { self.xyz.shape()[0] }
    pub fn n_atoms(&self) -> usize { self.xyz.shape()[1] }

    /// Coordinates of frame `iframe`, in shape of `[n_atoms, 3]`.
    pub fn frame(&self, iframe: usize) -> ArrayView2<f32> {
        self.xyz.index_axis(Axis(0), iframe)
    }

    /// New trajectory holding only the atoms in `idx`, in the order of `idx`.
    pub fn restrict_atoms(&self, idx: &[usize]) -> Result<Self> {
        check_atom_indices(idx, self.n_atoms())?;
        Ok(Self { xyz: self.xyz.select(Axis(1), idx) })
    }
}
