use std::path::Path;

use shared::{
    Context,
    Result,
    bail,
    ensure,
    Topology,
    Trajectory,
};

pub mod dcd;
pub mod pdb;
pub mod h5traj;

pub use dcd::{
    Dcd,
    DcdHeader,
    write_dcd,
};
pub use pdb::Pdb;
pub use h5traj::{
    read_h5_trajectory,
    write_h5_trajectory,
};


/// Coordinates in the files are stored in Angstrom, while [`Trajectory`] keeps nanometers.
pub const ANGSTROM_PER_NM: f32 = 10.0;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrajFormat {
    Dcd,
    Pdb,
    Hdf5,
}


impl TrajFormat {
    /// Guess the format from the file name, `.gz` is only understood for PDB files.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        let (stem, gzipped) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None       => (name.as_str(), false),
        };

        match (Path::new(stem).extension()?.to_str()?, gzipped) {
            ("dcd", false)                         => Some(TrajFormat::Dcd),
            ("pdb" | "ent", _)                     => Some(TrajFormat::Pdb),
            ("h5" | "lh5" | "hdf5", false)         => Some(TrajFormat::Hdf5),
            _ => None,
        }
    }
}


/// Load a trajectory in any supported format.
///
/// If `topology` is given, the atom count of the file must match it. If `atom_indices` is given,
/// only those atoms are kept, in the order of `atom_indices`.
pub fn load_trajectory(path: &Path, topology: Option<&Topology>, atom_indices: Option<&[usize]>) -> Result<Trajectory> {
    let format = TrajFormat::from_path(path)
        .with_context(|| format!("Unknown trajectory format of {:?}.", path))?;

    let restrict = |traj: Trajectory| -> Result<Trajectory> {
        match atom_indices {
            Some(idx) => traj.restrict_atoms(idx),
            None      => Ok(traj),
        }
    };

    let (n_atoms, traj) = match format {
        TrajFormat::Dcd => {
            let dcd = Dcd::from_file(path, atom_indices)?;
            (dcd.header.natoms, dcd.traj)
        },
        TrajFormat::Pdb => {
            let traj = Pdb::from_file(path)?.traj;
            (traj.n_atoms(), restrict(traj)?)
        },
        TrajFormat::Hdf5 => {
            let traj = read_h5_trajectory(path)?;
            (traj.n_atoms(), restrict(traj)?)
        },
    };

    if let Some(top) = topology {
        ensure!(n_atoms == top.n_atoms(),
                "{:?} holds {} atoms while the topology holds {}.", path, n_atoms, top.n_atoms());
    }

    Ok(traj)
}


/// Load a topology with its reference frame. Only PDB files carry one.
pub fn load_topology(path: &Path) -> Result<Topology> {
    match TrajFormat::from_path(path) {
        Some(TrajFormat::Pdb) => Ok(Pdb::from_file(path)?.topology),
        _ => bail!("Cannot read topology from {:?}, only PDB files (.pdb, .ent, .pdb.gz) are supported.", path),
    }
}
