use std::collections::HashSet;
use std::path::Path;

use itertools::Itertools;
use shared::{
    Result,
    Context,
    read_indices,
};

use crate::error::AssignError;


/// Atoms loaded from every file, and which of them drive the alignment and the scoring.
///
/// `alignment` and `scoring` are local indices into `idx`. With index files, `idx` is
/// `protein ++ ligand` so the alignment atoms take `[0, n_protein)` and the scoring atoms take
/// `[n_protein, n_protein + n_ligand)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomSelection {
    pub idx:       Vec<usize>,
    pub alignment: Vec<usize>,
    pub scoring:   Vec<usize>,
}


impl AtomSelection {
    /// Every atom is loaded, aligned and scored.
    pub fn all(n_atoms: usize) -> Self {
        let idx = (0 .. n_atoms).collect::<Vec<_>>();
        Self {
            alignment: idx.clone(),
            scoring:   idx.clone(),
            idx,
        }
    }

    pub fn from_sets(protein: &[usize], ligand: &[usize], n_atoms: usize) -> Result<Self> {
        check_set("protein", protein, n_atoms)?;
        check_set("ligand", ligand, n_atoms)?;

        let protein_set = protein.iter().copied().collect::<HashSet<usize>>();
        let overlap = ligand.iter()
            .copied()
            .filter(|i| protein_set.contains(i))
            .sorted()
            .collect::<Vec<_>>();
        if !overlap.is_empty() {
            return Err(AssignError::IndexSetOverlap(overlap).into());
        }

        let np = protein.len();
        let nl = ligand.len();
        Ok(Self {
            idx:       protein.iter().chain(ligand.iter()).copied().collect(),
            alignment: (0 .. np).collect(),
            scoring:   (np .. np + nl).collect(),
        })
    }

    /// Read both index files, or select every atom if none is given.
    pub fn load(indices: Option<(&Path, &Path)>, n_atoms: usize) -> Result<Self> {
        match indices {
            Some((pfname, lfname)) => {
                let protein = read_indices(pfname, n_atoms)
                    .map_err(|e| AssignError::InvalidIndexSet(format!("{:#}", e)))?;
                let ligand = read_indices(lfname, n_atoms)
                    .map_err(|e| AssignError::InvalidIndexSet(format!("{:#}", e)))?;
                Self::from_sets(&protein, &ligand, n_atoms)
                    .with_context(|| format!("Invalid index files {:?} and {:?}.", pfname, lfname))
            },
            None => Ok(Self::all(n_atoms)),
        }
    }
}


fn check_set(name: &str, set: &[usize], n_atoms: usize) -> Result<()> {
    if set.is_empty() {
        return Err(AssignError::InvalidIndexSet(format!("{} index set is empty", name)).into());
    }

    if let Some(&i) = set.iter().find(|&&i| i >= n_atoms) {
        return Err(AssignError::InvalidIndexSet(
                format!("{} index {} is out of range, the topology holds {} atoms", name, i, n_atoms)
            ).into());
    }

    if let Some(i) = set.iter().duplicates().next() {
        return Err(AssignError::InvalidIndexSet(
                format!("{} index {} appears more than once", name, i)
            ).into());
    }

    Ok(())
}
