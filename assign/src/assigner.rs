use std::path::{Path, PathBuf};

use shared::{
    Array2,
    Result,
    Topology,
    Trajectory,
    Context,
    info,
    ndarray::Axis,
    numeric_methods::argmin,
};

use crate::atoms::AtomSelection;
use crate::error::AssignError;
use crate::kernel::Kernel;


/// Nearest generator of every frame of one trajectory, and the distance to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub assignments: Vec<usize>,
    pub distances:   Vec<f64>,
}


impl Assignment {
    pub fn n_frames(&self) -> usize { self.assignments.len() }
}


/// Assigns trajectories to pre-aligned generators. Holds the state shared by every file of one
/// worker, loaded once.
pub struct Assigner<'a, K: Kernel> {
    kernel:     &'a K,
    topology:   Topology,
    reference:  Topology,
    selection:  AtomSelection,
    generators: Trajectory,
}


impl<'a, K: Kernel> Assigner<'a, K> {
    /// Load the topology, the index sets and the generators, then align the generators onto the
    /// reference frame.
    pub fn new(kernel: &'a K, topology: &Path, gens: &Path, indices: Option<(&Path, &Path)>) -> Result<Self> {
        let topology = kernel.load_topology(topology)
            .with_context(|| format!("Failed to load topology {:?}.", topology))?;
        let selection = AtomSelection::load(indices, topology.n_atoms())?;
        let generators = kernel.load(gens, &topology, &selection.idx)
            .with_context(|| format!("Failed to load generators {:?}.", gens))?;

        Self::from_parts(kernel, topology, selection, generators, gens)
    }

    pub fn from_parts(kernel: &'a K, topology: Topology, selection: AtomSelection,
                      generators: Trajectory, gens: &Path) -> Result<Self> {
        if generators.n_frames() == 0 {
            return Err(AssignError::NoGenerators(gens.to_path_buf()).into());
        }

        let reference  = topology.restrict_atoms(&selection.idx)?;
        let generators = kernel.superpose(generators, reference.reference(), &selection.alignment)?;

        Ok(Self { kernel, topology, reference, selection, generators })
    }

    pub fn n_generators(&self) -> usize { self.generators.n_frames() }

    pub fn assign_file(&self, path: &Path) -> Result<Assignment> {
        let traj = self.kernel.load(path, &self.topology, &self.selection.idx)?;
        let ret = self.assign_trajectory(traj)
            .with_context(|| format!("Failed to assign {:?}.", path))?;
        info!("Assigned {} frames of {:?}", ret.n_frames(), path);
        Ok(ret)
    }

    /// Superpose `traj` (restricted to the selected atoms) and pick the closest generator of
    /// every frame. The lowest generator index wins on ties.
    pub fn assign_trajectory(&self, traj: Trajectory) -> Result<Assignment> {
        let traj = self.kernel.superpose(traj, self.reference.reference(), &self.selection.alignment)?;
        let nframes = traj.n_frames();
        let ngens   = self.n_generators();

        let mut rmsds = Array2::<f64>::zeros((ngens, nframes));
        for (igen, mut row) in rmsds.axis_iter_mut(Axis(0)).enumerate() {
            let d = self.kernel.rmsd(&traj, self.generators.frame(igen), &self.selection.scoring)?;
            row.assign(&d);
        }

        let mut assignments = Vec::with_capacity(nframes);
        let mut distances   = Vec::with_capacity(nframes);
        for (iframe, col) in rmsds.axis_iter(Axis(1)).enumerate() {
            let (igen, d) = argmin(col.iter().copied())
                .with_context(|| format!("No finite distance for frame #{}.", iframe))?;
            assignments.push(igen);
            distances.push(d);
        }

        Ok(Assignment { assignments, distances })
    }
}


/// Result of one trajectory file.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectoryResult {
    pub path:       PathBuf,
    pub assignment: Assignment,
}


impl<'a, K: Kernel> Assigner<'a, K> {
    /// Assign every file of `shard` in turn, stopping at the first failure.
    pub fn assign_shard(&self, shard: &[PathBuf]) -> Result<Vec<TrajectoryResult>> {
        shard.iter()
            .map(|path| Ok(TrajectoryResult {
                path:       path.clone(),
                assignment: self.assign_file(path)?,
            }))
            .collect()
    }
}
