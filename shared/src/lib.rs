use std::fs;
use std::path::Path;

pub use anyhow::{
    self,
    Result,
    Context,
    bail,
    ensure,
};
pub use ndarray::{
    self,
    Array1,
    Array2,
    Array3,
};
pub use regex::Regex;
pub use log::{
    self,
    warn,
    info,
    debug,
    error,
};

pub mod numeric_methods;
pub mod topology;
pub mod trajectory;

pub use topology::{AtomRecord, Topology};
pub use trajectory::Trajectory;

pub type Mat33<T> = [[T;3];3];   // 3x3 matrix, row-major


/// Parse the content of an atom index file into 0-based indices below `n_atoms`, keeping the
/// order of the file.
///
/// Tokens are separated by whitespaces (newlines included) and can be
///   - non-negative integers: `12`;
///   - integral floats as written by `numpy.savetxt`: `1.200000000000000000e+01`;
///   - inclusive ranges: `3..7` expands to `[3, 4, 5, 6, 7]`.
///
/// Everything after a `#` on a line is ignored. Ranges are bounds-checked before expansion.
pub fn parse_indices(input: &str, n_atoms: usize) -> Result<Vec<usize>> {
    let re_range = Regex::new(r"^(\d+)\.\.(\d+)$")?;
    let in_range = |i: usize, s: &str| -> Result<usize> {
        ensure!(i < n_atoms, "[PARSE_INDICES]: index {} of token \'{}\' is out of range, {} atoms available", i, s, n_atoms);
        Ok(i)
    };
    let mut ret = vec![];

    for line in input.lines() {
        let line = line.split('#').next().unwrap_or_default();

        for s in line.split_ascii_whitespace() {
            if let Ok(i) = s.parse::<usize>() {
                ret.push(in_range(i, s)?);
            } else if let Some(m) = re_range.captures(s) {
                let start = m[1].parse::<usize>()?;
                let end   = m[2].parse::<usize>()?;

                if start > end {
                    bail!("[PARSE_INDICES]: start is greater than end in token \'{}\'", s);
                }
                ret.extend(start ..= in_range(end, s)?);
            } else if let Ok(x) = s.parse::<f64>() {
                if !x.is_finite() || x < 0.0 || x.fract() != 0.0 {
                    bail!("[PARSE_INDICES]: token \'{}\' is not a valid atom index", s);
                }
                ensure!(x < n_atoms as f64, "[PARSE_INDICES]: token \'{}\' is out of range, {} atoms available", s, n_atoms);
                ret.push(x as usize);
            } else {
                bail!("[PARSE_INDICES]: token \'{}\' is invalid, cannot be parsed as range or integer", s);
            }
        }
    }

    Ok(ret)
}


/// Read an atom index file of a system of `n_atoms` atoms, see [`parse_indices`] for the syntax.
pub fn read_indices<P>(fname: P, n_atoms: usize) -> Result<Vec<usize>>
where P: AsRef<Path> {
    let raw = fs::read_to_string(fname.as_ref())
        .with_context(|| format!("Failed to read index file {:?}.", fname.as_ref()))?;
    parse_indices(&raw, n_atoms)
        .with_context(|| format!("Failed to parse index file {:?}.", fname.as_ref()))
}


/// Copy the file `from` to the path `target`, overwriting what is there unless `target` is
/// `from` itself, in which case nothing is done. Returns the number of bytes copied.
pub fn copy_file_as<P, Q>(from: P, target: Q) -> Result<u64>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (from, target) = (from.as_ref(), target.as_ref());
    ensure!(from.is_file(), "{:?} is not a file.", from);

    if target.is_file() && fs::canonicalize(target)? == fs::canonicalize(from)? {
        return Ok(0);
    }
    fs::copy(from, target)
        .with_context(|| format!("Failed to copy {:?} to {:?}.", from, target))
}
