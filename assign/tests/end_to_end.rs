use std::fs;
use std::path::Path;

use assign_lp::config::AssignConfig;
use assign_lp::error::AssignError;
use assign_lp::kernel::{NativeKernel, ScoringMode};
use assign_lp::merge::AssignmentTable;
use assign_lp::pipeline::run_world;
use md_parsers::{write_dcd, write_h5_trajectory};
use shared::{Array3, Trajectory};


// four protein atoms that pin the orientation down, in nm
const PROTEIN: [[f32; 3]; 4] = [
    [ 1.0,  0.0,  0.0],
    [ 0.0,  1.2,  0.0],
    [ 0.0,  0.0,  0.9],
    [-0.8, -0.7, -0.6],
];

const GENS_X: [f32; 2] = [0.0, 2.0];

const WALKS: [&[f32]; 3] = [
    &[0.0, 0.4, 1.2, 1.8, 2.5],
    &[2.1, -0.3, 0.9],
    &[0.2, 0.2, 1.7, 3.0, -1.0, 1.1, 2.0],
];


fn rigid(p: [f32; 3], theta: f32, shift: [f32; 3]) -> [f32; 3] {
    let (s, c) = theta.sin_cos();
    [c * p[0] - s * p[1] + shift[0], s * p[0] + c * p[1] + shift[1], p[2] + shift[2]]
}


/// Protein plus a ligand atom at `(x, 0.3, 0.1)`, every frame moved rigidly by a
/// frame-dependent rotation about z and a shift.
fn walk(xs: &[f32], seed: f32) -> Trajectory {
    let xyz = Array3::from_shape_fn((xs.len(), 5, 3), |(f, a, k)| {
        let p = if a < 4 { PROTEIN[a] } else { [xs[f], 0.3, 0.1] };
        let theta = seed + 0.37 * f as f32;
        rigid(p, theta, [0.5 * seed, -0.2 * f as f32, 1.0])[k]
    });
    Trajectory::new(xyz).unwrap()
}


fn pdb_text() -> String {
    let mut atoms = PROTEIN.iter()
        .map(|p| ("CA", "ALA", 'A', 1, *p))
        .collect::<Vec<_>>();
    atoms.push(("C1", "LIG", 'B', 2, [0.0, 0.3, 0.1]));

    let mut txt = String::from("REMARK   native structure\n");
    for (i, (name, resname, chain, resid, p)) in atoms.into_iter().enumerate() {
        txt += &format!("ATOM  {:>5} {:<4} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00          {:>2}\n",
                        i + 1, name, resname, chain, resid, p[0] * 10.0, p[1] * 10.0, p[2] * 10.0, "C");
    }
    txt += "END\n";
    txt
}


fn setup(root: &Path, with_indices: bool, nworkers: usize) -> AssignConfig {
    let trajs = root.join("trajs");
    fs::create_dir(&trajs).unwrap();
    for (i, xs) in WALKS.iter().enumerate() {
        write_dcd(trajs.join(format!("traj{}.dcd", i)), &walk(xs, 0.3 * i as f32)).unwrap();
    }
    // not a trajectory of this run
    fs::write(trajs.join("notes.txt"), "frames in nm").unwrap();

    write_h5_trajectory(root.join("Gens.h5"), &walk(&GENS_X, 1.1)).unwrap();
    fs::write(root.join("native.pdb"), pdb_text()).unwrap();

    let mut cfg = format!(
        "dir = {:?}\ntopology = {:?}\ngens = {:?}\noutdir = {:?}\nnworkers = {}\nnthreads = 2\n",
        trajs, root.join("native.pdb"), root.join("Gens.h5"), root.join("Data"), nworkers);
    if with_indices {
        fs::write(root.join("protein.dat"), "0 1\n2 3\n").unwrap();
        fs::write(root.join("ligand.dat"), "4\n").unwrap();
        cfg += &format!("protein_indices = {:?}\nligand_indices = {:?}\n",
                        root.join("protein.dat"), root.join("ligand.dat"));
    }

    let fname = root.join("assign.toml");
    fs::write(&fname, cfg).unwrap();
    AssignConfig::from_file(&fname).unwrap()
}


#[test]
fn test_protein_aligned_ligand_scored() {
    let dir = tempfile::tempdir().unwrap();
    let run = setup(dir.path(), true, 2).validate().unwrap();
    assert_eq!(run.scoring, ScoringMode::Aligned);

    let table = run_world(run, &NativeKernel::new(ScoringMode::Aligned)).unwrap();
    assert_eq!(table.assignments.shape(), &[3, 7]);
    assert_eq!(table.assignments.row(0).to_vec(), vec![0, 0, 1, 1, 1, -1, -1]);
    assert_eq!(table.assignments.row(1).to_vec(), vec![1, 0, 0, -1, -1, -1, -1]);
    assert_eq!(table.assignments.row(2).to_vec(), vec![0, 0, 1, 1, 0, 1, 1]);

    for (j, xs) in WALKS.iter().enumerate() {
        for (f, x) in xs.iter().enumerate() {
            let expect = GENS_X.iter().map(|g| (x - g).abs()).fold(f32::INFINITY, f32::min) as f64;
            let d = table.distances[[j, f]];
            assert!((d - expect).abs() < 1e-4, "traj #{} frame #{}: {} != {}", j, f, d, expect);
        }
        for f in xs.len() .. 7 {
            assert_eq!(table.assignments[[j, f]], -1);
            assert_eq!(table.distances[[j, f]], -1.0);
        }
    }
    assert!(table.completed.iter().all(|&c| c));

    let saved = AssignmentTable::from_h5(dir.path().join("Data")).unwrap();
    assert_eq!(saved, table);
}


#[test]
fn test_every_atom_without_index_files() {
    let dir = tempfile::tempdir().unwrap();
    let run = setup(dir.path(), false, 3).validate().unwrap();
    assert_eq!(run.indices, None);

    let table = run_world(run, &NativeKernel::new(ScoringMode::Aligned)).unwrap();
    assert_eq!(table.assignments.shape(), &[3, 7]);

    // frames identical to a generator up to a rigid motion
    assert_eq!(table.assignments[[0, 0]], 0);
    assert_eq!(table.assignments[[2, 6]], 1);
    assert!(table.distances[[0, 0]] < 1e-4);
    assert!(table.distances[[2, 6]] < 1e-4);
    assert_eq!(table.assignments[[1, 3]], -1);
}


#[test]
fn test_single_worker_matches_many() {
    let one = tempfile::tempdir().unwrap();
    let many = tempfile::tempdir().unwrap();
    let kernel = NativeKernel::new(ScoringMode::Aligned);

    let a = run_world(setup(one.path(), true, 1).validate().unwrap(), &kernel).unwrap();
    let b = run_world(setup(many.path(), true, 4).validate().unwrap(), &kernel).unwrap();
    assert_eq!(a.assignments, b.assignments);
    for (x, y) in a.distances.iter().zip(b.distances.iter()) {
        assert!((x - y).abs() < 1e-9);
    }
}


#[test]
fn test_corrupt_trajectory_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = setup(dir.path(), true, 2);
    // sorted last, so striped onto rank 1
    let corrupt = dir.path().join("trajs").join("traj3.dcd");
    fs::write(&corrupt, b"not a dcd file at all").unwrap();

    let err = run_world(cfg.validate().unwrap(), &NativeKernel::new(ScoringMode::Aligned)).unwrap_err();
    match err.downcast_ref::<AssignError>() {
        Some(AssignError::WorkerFailed { rank, reason }) => {
            assert_eq!(*rank, 1);
            assert!(reason.contains("traj3.dcd"), "{}", reason);
            assert!(reason.contains("cannot read trajectory"), "{}", reason);
        },
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!dir.path().join("Data").join("Assignments.h5").exists());
    assert!(!dir.path().join("Data").join("Assignments.h5.distances").exists());
}
