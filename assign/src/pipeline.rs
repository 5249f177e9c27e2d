use std::fs;
use std::path::PathBuf;
use std::thread;

use shared::{
    Result,
    Context,
    bail,
    error,
    info,
};

use crate::assigner::{Assigner, TrajectoryResult};
use crate::comm::{Communicator, LocalComm};
use crate::config::RunConfig;
use crate::error::AssignError;
use crate::kernel::Kernel;
use crate::logging::Timing;
use crate::merge::{AssignmentTable, merge};
use crate::partition::{discover_trajectories, partition};


/// What a worker sends back to rank 0: its results, or why it has none.
#[derive(Debug)]
struct WorkerReport {
    rank:    usize,
    outcome: std::result::Result<Vec<TrajectoryResult>, String>,
}


/// Everything one worker does. Rank 0 passes the validated config and gets the merged table
/// back, which is also written to the output directory. The other ranks pass `None` and get
/// `None`.
pub fn run_rank<C, K>(comm: &C, kernel: &K, run: Option<RunConfig>) -> Result<Option<AssignmentTable>>
where C: Communicator,
      K: Kernel,
{
    let ctx = comm.context();

    let (run, shards, listing) = if ctx.is_root() {
        let run = match run {
            Some(run) => run,
            None => bail!("Rank 0 needs the run config."),
        };
        let listing = discover_trajectories(&run.dir, &run.ext)?;
        info!("Found {} trajectories in {:?} with extension \"{}\"", listing.len(), run.dir, run.ext);
        let shards = partition(&listing, ctx.world_size)?;
        (Some(run), Some(shards), listing)
    } else {
        (None, None, vec![])
    };

    let run: RunConfig = comm.broadcast(run)?;
    let shard: Vec<PathBuf> = comm.distribute(shards)?;

    if ctx.is_root() {
        info!("Starting...");
    }

    let outcome = {
        let _timing = Timing::new(ctx.rank, "Assigning...");
        Assigner::new(kernel, &run.topology, &run.gens, run.indices())
            .and_then(|a| a.assign_shard(&shard))
    };
    if let Err(e) = outcome.as_ref() {
        error!("<RANK {}> {:?}", ctx.rank, e);
    }

    comm.barrier()?;
    let report = WorkerReport {
        rank:    ctx.rank,
        outcome: outcome.map_err(|e| format!("{:#}", e)),
    };
    let reports = match comm.collect(report)? {
        Some(reports) => reports,
        None => return Ok(None),
    };

    let mut per_worker = Vec::with_capacity(reports.len());
    for report in reports {
        match report.outcome {
            Ok(results) => per_worker.push(results),
            Err(reason) => return Err(AssignError::WorkerFailed { rank: report.rank, reason }.into()),
        }
    }

    let _timing = Timing::new(ctx.rank, "Writing assignments...");
    let table = merge(per_worker, &listing)?;
    fs::create_dir_all(&run.outdir)
        .with_context(|| format!("Failed to create output directory {:?}.", run.outdir))?;
    table.save_to_h5(&run.outdir)?;
    info!("Done!");

    Ok(Some(table))
}


/// Run `run.nworkers` workers in this process, rank 0 on the calling thread.
pub fn run_world<K: Kernel>(run: RunConfig, kernel: &K) -> Result<AssignmentTable> {
    let mut comms = LocalComm::world(run.nworkers)?;
    let root = comms.remove(0);

    thread::scope(|s| -> Result<AssignmentTable> {
        let mut handles = Vec::with_capacity(comms.len());
        for comm in comms {
            let rank = comm.context().rank;
            let spawned = thread::Builder::new()
                .name(format!("rank-{}", rank))
                .spawn_scoped(s, move || run_rank(&comm, kernel, None));
            match spawned {
                Ok(h) => handles.push((rank, h)),
                Err(e) => {
                    // the workers already started abort once the root is gone
                    drop(root);
                    return Err(shared::anyhow::Error::new(e)
                        .context(format!("Failed to spawn worker of rank {}.", rank)));
                },
            }
        }

        let ret = run_rank(&root, kernel, Some(run));
        drop(root);

        for (rank, h) in handles {
            match h.join() {
                Ok(Ok(_)) => (),
                Ok(Err(e)) => error!("<RANK {}> stopped: {:#}", rank, e),
                Err(_) => error!("<RANK {}> panicked.", rank),
            }
        }

        ret?.context("Rank 0 produced no result table.")
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use crate::assigner::tests::{FakeKernel, ligand_walk, topology};
    use crate::kernel::ScoringMode;

    struct Fixture {
        dir:    tempfile::TempDir,
        kernel: FakeKernel,
    }

    impl Fixture {
        // three trajectories of 5, 3 and 7 frames, two generators with the ligand at x = 0 and 2
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let trajs = dir.path().join("trajs");
            fs::create_dir(&trajs).unwrap();

            let mut files = HashMap::new();
            let walks: [&[f32]; 3] = [
                &[0.0, 0.4, 1.2, 1.8, 2.5],
                &[2.1, -0.3, 0.9],
                &[0.2, 0.2, 1.7, 3.0, -1.0, 1.1, 2.0],
            ];
            for (i, xs) in walks.into_iter().enumerate() {
                let path = trajs.join(format!("t{}.dcd", i));
                fs::write(&path, b"").unwrap();
                files.insert(path, ligand_walk(xs));
            }

            let gens = dir.path().join("Gens.h5");
            let top  = dir.path().join("native.pdb");
            fs::write(&gens, b"").unwrap();
            fs::write(&top, b"").unwrap();
            files.insert(gens, ligand_walk(&[0.0, 2.0]));

            Self { dir, kernel: FakeKernel { topology: topology(3), files } }
        }

        fn path(&self, name: &str) -> PathBuf { self.dir.path().join(name) }

        fn run_config(&self, nworkers: usize, indices: bool) -> RunConfig {
            let indices = indices.then(|| {
                fs::write(self.path("protein.dat"), "0 1").unwrap();
                fs::write(self.path("ligand.dat"), "2").unwrap();
                (self.path("protein.dat"), self.path("ligand.dat"))
            });
            RunConfig {
                dir:      self.path("trajs"),
                ext:      "dcd".to_string(),
                topology: self.path("native.pdb"),
                gens:     self.path("Gens.h5"),
                indices,
                outdir:   self.path("Data"),
                nworkers,
                nthreads: 1,
                scoring:  ScoringMode::Aligned,
            }
        }
    }

    #[test]
    fn test_two_workers() {
        let fx = Fixture::new();
        let listing = discover_trajectories(&fx.path("trajs"), "dcd").unwrap();
        let shards = partition(&listing, 2).unwrap();
        assert_eq!(shards[0], vec![fx.path("trajs/t0.dcd"), fx.path("trajs/t2.dcd")]);
        assert_eq!(shards[1], vec![fx.path("trajs/t1.dcd")]);

        let table = run_world(fx.run_config(2, true), &fx.kernel).unwrap();
        assert_eq!(table.assignments.shape(), &[3, 7]);
        assert_eq!(table.assignments.row(0).to_vec(), vec![0, 0, 1, 1, 1, -1, -1]);
        assert_eq!(table.assignments.row(1).to_vec(), vec![1, 0, 0, -1, -1, -1, -1]);
        assert_eq!(table.assignments.row(2).to_vec(), vec![0, 0, 1, 1, 0, 1, 1]);
        assert!((table.distances[[2, 6]] - 0.0).abs() < 1e-6);
        assert!((table.distances[[1, 0]] - 0.1).abs() < 1e-6);
        assert_eq!(table.distances[[1, 3]], -1.0);

        assert_eq!(AssignmentTable::from_h5(fx.path("Data")).unwrap(), table);

        let single = run_world(fx.run_config(1, true), &fx.kernel).unwrap();
        assert_eq!(single, table);
    }

    #[test]
    fn test_without_index_files() {
        let fx = Fixture::new();
        let table = run_world(fx.run_config(3, false), &fx.kernel).unwrap();
        assert_eq!(table.assignments.shape(), &[3, 7]);
        // all atoms aligned and scored: distances shrink but the ranking of generators holds
        assert_eq!(table.assignments.row(0).to_vec(), vec![0, 0, 1, 1, 1, -1, -1]);
        assert_eq!(table.assignments.row(2).to_vec(), vec![0, 0, 1, 1, 0, 1, 1]);
    }

    #[test]
    fn test_failure_reaches_root() {
        let mut fx = Fixture::new();
        fx.kernel.files.remove(&fx.path("trajs/t1.dcd"));

        let err = run_world(fx.run_config(2, true), &fx.kernel).unwrap_err();
        match err.downcast_ref::<AssignError>() {
            Some(AssignError::WorkerFailed { rank, reason }) => {
                assert_eq!(*rank, 1);
                assert!(reason.contains("t1.dcd"), "{}", reason);
            },
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!Path::new(&fx.path("Data/Assignments.h5")).exists());
    }

    #[test]
    fn test_more_workers_than_files() {
        let fx = Fixture::new();
        let table = run_world(fx.run_config(5, true), &fx.kernel).unwrap();
        assert_eq!(table.assignments.shape(), &[3, 7]);
    }
}
