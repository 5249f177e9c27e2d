//! Trajectories stored in HDF5, such as generator files (`Gens.lh5`).
//!
//! Coordinates live in a `[n_frames, n_atoms, 3]` dataset named `coordinates`, in nanometers.
//! Legacy files keep them in `XYZList` instead, possibly as integers in picometers.
use std::path::Path;

use hdf5::{
    Dataset,
    File as H5File,
    types::TypeDescriptor,
};
use shared::{
    Array3,
    Context,
    Result,
    bail,
    Trajectory,
};


const PM_PER_NM: f32 = 1000.0;


pub fn read_h5_trajectory<P>(fname: P) -> Result<Trajectory>
where P: AsRef<Path> {
    let fname = fname.as_ref();
    let f = H5File::open(fname)
        .with_context(|| format!("Failed to open {:?} as HDF5.", fname))?;

    let (name, ds) = match find_dataset(&f) {
        Some(found) => found,
        None => bail!("Neither \"coordinates\" nor \"XYZList\" found in {:?}.", fname),
    };

    let xyz: Array3<f32> = match ds.dtype()?.to_descriptor()? {
        TypeDescriptor::Float(_) => ds.read()?,
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
            let raw: Array3<i64> = ds.read()?;
            raw.mapv(|v| v as f32 / PM_PER_NM)
        },
        other => bail!("Dataset \"{}\" of {:?} has unsupported type {}.", name, fname, other),
    };

    Trajectory::new(xyz)
        .with_context(|| format!("Invalid coordinates in {:?}.", fname))
}


fn find_dataset(f: &H5File) -> Option<(&'static str, Dataset)> {
    ["coordinates", "XYZList"].into_iter()
        .find_map(|name| f.dataset(name).ok().map(|ds| (name, ds)))
}


pub fn write_h5_trajectory<P>(fname: P, traj: &Trajectory) -> Result<()>
where P: AsRef<Path> {
    let f = H5File::create(fname.as_ref())
        .with_context(|| format!("Failed to create {:?}.", fname.as_ref()))?;
    f.new_dataset_builder().with_data(&traj.xyz).create("coordinates")?;
    Ok(())
}
