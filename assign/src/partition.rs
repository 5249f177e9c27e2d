use std::path::{Path, PathBuf};

use shared::{
    Result,
    Context,
    ensure,
};


/// Split `items` into `nworkers` striped shards: shard `w` takes positions `w, w + W, w + 2W, ...`.
///
/// Every item lands in exactly one shard and shard sizes differ by at most one. Trailing shards
/// may be empty when there are fewer items than workers.
pub fn partition<T: Clone>(items: &[T], nworkers: usize) -> Result<Vec<Vec<T>>> {
    ensure!(nworkers >= 1, "At least one worker is required to partition the trajectories.");

    let mut shards = vec![Vec::with_capacity(items.len() / nworkers + 1); nworkers];
    for (i, item) in items.iter().enumerate() {
        shards[i % nworkers].push(item.clone());
    }
    Ok(shards)
}


/// Sorted listing of `{dir}/*.{ext}`.
pub fn discover_trajectories(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let dir_str = dir.to_str()
        .with_context(|| format!("Directory {:?} is not valid UTF-8.", dir))?;
    let pattern = format!("{}/*.{}", glob::Pattern::escape(dir_str), ext);

    let mut ret = glob::glob(&pattern)
        .with_context(|| format!("Invalid glob pattern {:?}.", pattern))?
        .collect::<std::result::Result<Vec<PathBuf>, _>>()?;
    ret.retain(|p| p.is_file());
    ret.sort();
    Ok(ret)
}
