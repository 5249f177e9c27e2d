use ndarray::{
    Array2,
    ArrayView2,
    Axis,
};

use crate::{Result, ensure};
use crate::trajectory::check_atom_indices;


#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomRecord {
    pub serial:  usize,
    pub name:    String,
    pub resname: String,
    pub resid:   i32,
    pub chain:   char,
    pub element: String,
}


/// Static description of a system: its atoms plus one reference frame (`[n_atoms, 3]`, nanometers).
#[derive(Clone, Debug, PartialEq)]
pub struct Topology {
    pub atoms: Vec<AtomRecord>,
    pub xyz:   Array2<f32>,
}


impl Topology {
    pub fn new(atoms: Vec<AtomRecord>, xyz: Array2<f32>) -> Result<Self> {
        ensure!(xyz.shape() == [atoms.len(), 3],
                "Reference coordinates in shape of {:?} do not match {} atoms.", xyz.shape(), atoms.len());
        Ok(Self { atoms, xyz })
    }

    pub fn n_atoms(&self) -> usize { self.atoms.len() }

    pub fn reference(&self) -> ArrayView2<f32> { self.xyz.view() }

    /// New topology holding only the atoms in `idx`, in the order of `idx`.
    pub fn restrict_atoms(&self, idx: &[usize]) -> Result<Self> {
        check_atom_indices(idx, self.n_atoms())?;
        Ok(Self {
            atoms: idx.iter().map(|&i| self.atoms[i].clone()).collect(),
            xyz:   self.xyz.select(Axis(0), idx),
        })
    }
}
