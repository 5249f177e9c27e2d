use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hdf5::File as H5File;
use shared::{
    Array1,
    Array2,
    Result,
    Context,
    info,
    warn,
};

use crate::assigner::{Assignment, TrajectoryResult};
use crate::error::AssignError;


pub const ASSIGNMENTS_FNAME: &str = "Assignments.h5";
pub const DISTANCES_FNAME: &str   = "Assignments.h5.distances";


/// Assignments of every trajectory, one row per file in sorted file order, padded with `-1`.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentTable {
    pub assignments: Array2<i32>,
    pub distances:   Array2<f64>,
    pub completed:   Array1<bool>,
}


impl AssignmentTable {
    pub fn n_trajs(&self) -> usize { self.assignments.nrows() }
    pub fn max_frames(&self) -> usize { self.assignments.ncols() }

    /// Lay out `results` in the order of `listing`, which must name every result exactly once.
    pub fn from_results(results: Vec<TrajectoryResult>, listing: &[PathBuf]) -> Result<Self> {
        let mut by_path: HashMap<PathBuf, Assignment> = HashMap::with_capacity(results.len());
        for r in results {
            if by_path.insert(r.path.clone(), r.assignment).is_some() {
                return Err(AssignError::MergeMismatch(format!("{:?} was assigned more than once", r.path)).into());
            }
        }

        let rows = listing.iter()
            .map(|path| by_path.remove(path)
                 .ok_or_else(|| AssignError::MergeMismatch(format!("no result for {:?}", path))))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if let Some(path) = by_path.keys().next() {
            return Err(AssignError::MergeMismatch(format!("{:?} was assigned but not listed", path)).into());
        }

        let n_trajs    = rows.len();
        let max_frames = rows.iter().map(|a| a.n_frames()).max().unwrap_or(0);

        let mut assignments = Array2::<i32>::from_elem((n_trajs, max_frames), -1);
        let mut distances   = Array2::<f64>::from_elem((n_trajs, max_frames), -1.0);

        for (j, row) in rows.iter().enumerate() {
            for (dst, &src) in assignments.row_mut(j).iter_mut().zip(row.assignments.iter()) {
                *dst = src as i32;
            }
            for (dst, &src) in distances.row_mut(j).iter_mut().zip(row.distances.iter()) {
                *dst = src;
            }
        }

        Ok(Self {
            assignments,
            distances,
            completed: Array1::from_elem(n_trajs, true),
        })
    }

    /// Write `{outdir}/Assignments.h5` and `{outdir}/Assignments.h5.distances`.
    pub fn save_to_h5<P>(&self, outdir: P) -> Result<()>
    where P: AsRef<Path> {
        let outdir = outdir.as_ref();

        let fname = outdir.join(ASSIGNMENTS_FNAME);
        let f = H5File::create(&fname)
            .with_context(|| format!("Failed to create {:?}.", fname))?;
        f.new_dataset_builder().with_data(&self.assignments).create("arr_0")?;
        f.new_dataset_builder().with_data(&self.completed).create("completed_trajs")?;
        info!("Assignments written to {:?}", fname);

        let fname = outdir.join(DISTANCES_FNAME);
        let f = H5File::create(&fname)
            .with_context(|| format!("Failed to create {:?}.", fname))?;
        f.new_dataset_builder().with_data(&self.distances).create("arr_0")?;
        f.new_dataset_builder().with_data(&self.completed).create("completed_trajs")?;
        info!("Distances written to {:?}", fname);

        Ok(())
    }

    pub fn from_h5<P>(outdir: P) -> Result<Self>
    where P: AsRef<Path> {
        let outdir = outdir.as_ref();

        let f = H5File::open(outdir.join(ASSIGNMENTS_FNAME))?;
        let assignments: Array2<i32> = f.dataset("arr_0")?.read()?;
        let completed: Array1<bool>  = f.dataset("completed_trajs")?.read()?;

        let f = H5File::open(outdir.join(DISTANCES_FNAME))?;
        let distances: Array2<f64> = f.dataset("arr_0")?.read()?;

        if assignments.shape() != distances.shape() || completed.len() != assignments.nrows() {
            return Err(AssignError::MergeMismatch(format!(
                "inconsistent result files in {:?}: assignments {:?}, distances {:?}, completed {}",
                outdir, assignments.shape(), distances.shape(), completed.len())).into());
        }

        Ok(Self { assignments, distances, completed })
    }
}


/// Gather the results of every worker into one table ordered as `listing`.
pub fn merge(per_worker: Vec<Vec<TrajectoryResult>>, listing: &[PathBuf]) -> Result<AssignmentTable> {
    if listing.is_empty() {
        warn!("No trajectory found, the result files will be empty.");
    }
    let results = per_worker.into_iter().flatten().collect::<Vec<_>>();
    AssignmentTable::from_results(results, listing)
}
