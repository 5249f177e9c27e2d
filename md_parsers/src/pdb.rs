use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use itertools::Itertools;
use shared::{
    Array2,
    Context,
    Result,
    bail,
    ensure,
    AtomRecord,
    Topology,
    Trajectory,
};

use crate::ANGSTROM_PER_NM;


/// Fixed-column PDB file with one or more `MODEL`s.
///
/// The first model makes the topology and its reference frame; every model, the first one
/// included, makes one frame of `traj`.
#[derive(Clone, Debug)]
pub struct Pdb {
    pub topology: Topology,
    pub traj:     Trajectory,
}


impl Pdb {
    pub fn from_file<P>(fname: P) -> Result<Self>
    where P: AsRef<Path> {
        let fname = fname.as_ref();
        let gzipped = fname.extension().map_or(false, |e| e.eq_ignore_ascii_case("gz"));

        let raw = if gzipped {
            let file = fs::File::open(fname)
                .with_context(|| format!("Failed to open {:?}.", fname))?;
            let mut raw = String::new();
            GzDecoder::new(file).read_to_string(&mut raw)
                .with_context(|| format!("Failed to decompress {:?}.", fname))?;
            raw
        } else {
            fs::read_to_string(fname)
                .with_context(|| format!("Failed to read {:?}.", fname))?
        };

        Self::parse(&raw)
            .with_context(|| format!("Failed to parse {:?} as PDB.", fname))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut models: Vec<Vec<(AtomRecord, [f32; 3])>> = vec![];
        let mut current = vec![];
        let mut in_model = false;

        for (iline, line) in raw.lines().enumerate() {
            let record = line.get(.. 6).unwrap_or(line).trim_end();
            match record {
                "MODEL" => {
                    if in_model || !current.is_empty() {
                        bail!("Line {}: MODEL opened before the previous one is closed.", iline + 1);
                    }
                    in_model = true;
                },
                "ENDMDL" => {
                    ensure!(in_model, "Line {}: ENDMDL without MODEL.", iline + 1);
                    models.push(std::mem::take(&mut current));
                    in_model = false;
                },
                "ATOM" | "HETATM" => {
                    let atom = parse_atom_line(line)
                        .with_context(|| format!("Line {}: invalid atom record.", iline + 1))?;
                    current.push(atom);
                },
                "END" => break,
                _ => (),
            }
        }

        if !current.is_empty() {
            models.push(current);
        }
        ensure!(!models.is_empty(), "No atom found.");

        let natoms = models[0].len();
        ensure!(natoms > 0, "The first model holds no atoms.");
        if let Some((imodel, m)) = models.iter().find_position(|m| m.len() != natoms) {
            bail!("Model #{} holds {} atoms while the first one holds {}.", imodel + 1, m.len(), natoms);
        }

        let nframes = models.len();
        let data = models.iter()
            .flat_map(|m| m.iter().flat_map(|(_, xyz)| xyz.map(|v| v / ANGSTROM_PER_NM)))
            .collect::<Vec<f32>>();
        let traj = Trajectory::from_flat(nframes, natoms, data)?;

        let atoms = models.swap_remove(0).into_iter()
            .map(|(atom, _)| atom)
            .collect::<Vec<_>>();
        let reference: Array2<f32> = traj.frame(0).to_owned();
        let topology = Topology::new(atoms, reference)?;

        Ok(Self { topology, traj })
    }
}


fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start .. end).unwrap_or_default().trim()
}


fn parse_atom_line(line: &str) -> Result<(AtomRecord, [f32; 3])> {
    ensure!(line.len() >= 54, "Atom record is shorter than 54 columns.");

    let serial  = column(line, 6, 11).parse::<usize>().unwrap_or(0);
    let name    = column(line, 12, 16).to_string();
    let resname = column(line, 17, 20).to_string();
    let chain   = line.get(21 .. 22).and_then(|s| s.chars().next()).unwrap_or(' ');
    let resid   = column(line, 22, 26).parse::<i32>().unwrap_or(0);

    let mut xyz = [0f32; 3];
    for (k, (start, end)) in [(30, 38), (38, 46), (46, 54)].into_iter().enumerate() {
        let s = column(line, start, end);
        xyz[k] = s.parse::<f32>()
            .with_context(|| format!("Cannot parse coordinate \'{}\'.", s))?;
    }

    let element = match column(line, 76, 78) {
        "" => element_from_name(&name),
        e  => e.to_string(),
    };

    Ok((AtomRecord { serial, name, resname, resid, chain, element }, xyz))
}


/// Guess the element from an atom name like `CA`, `1HB` or `OXT`: its first alphabetic character.
fn element_from_name(name: &str) -> String {
    name.chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use flate2::{
        Compression,
        write::GzEncoder,
    };
    use tempdir::TempDir;

    const TWO_MODELS: &str = "\
REMARK   test system
MODEL        1
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00           C
HETATM    3  C1  LIG B 201       1.000   2.000   3.000  1.00  0.00
ENDMDL
MODEL        2
ATOM      1  N   ALA A   1      12.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      12.639   6.071  -5.147  1.00  0.00           C
HETATM    3  C1  LIG B 201       2.000   2.000   3.000  1.00  0.00
ENDMDL
END
";

    #[test]
    fn test_parse_models() {
        let pdb = Pdb::parse(TWO_MODELS).unwrap();
        assert_eq!(pdb.topology.n_atoms(), 3);
        assert_eq!(pdb.traj.n_frames(), 2);

        let ca = &pdb.topology.atoms[1];
        assert_eq!(ca.serial, 2);
        assert_eq!(ca.name, "CA");
        assert_eq!(ca.resname, "ALA");
        assert_eq!(ca.chain, 'A');
        assert_eq!(ca.resid, 1);
        assert_eq!(ca.element, "C");

        let lig = &pdb.topology.atoms[2];
        assert_eq!(lig.resid, 201);
        assert_eq!(lig.element, "C");

        assert!((pdb.topology.xyz[[0, 0]] - 1.1104).abs() < 1e-6);
        assert!((pdb.traj.xyz[[1, 2, 0]] - 0.2).abs() < 1e-6);
        assert_eq!(pdb.topology.xyz, pdb.traj.frame(0));
    }

    #[test]
    fn test_single_model_without_model_records() {
        let raw = TWO_MODELS.lines()
            .filter(|l| l.starts_with("ATOM"))
            .take(2)
            .join("\n");
        let pdb = Pdb::parse(&raw).unwrap();
        assert_eq!(pdb.traj.n_frames(), 1);
        assert_eq!(pdb.traj.n_atoms(), 2);
    }

    #[test]
    fn test_invalid() {
        assert!(Pdb::parse("REMARK nothing here\nEND\n").is_err());

        let uneven = TWO_MODELS.replacen(
            "HETATM    3  C1  LIG B 201       2.000   2.000   3.000  1.00  0.00\n", "", 1);
        assert!(Pdb::parse(&uneven).is_err());

        let broken = TWO_MODELS.replacen("11.104", "xx.xxx", 1);
        assert!(Pdb::parse(&broken).is_err());
    }

    #[test]
    fn test_gzipped() {
        let dir = TempDir::new("pdb").unwrap();
        let fname = dir.path().join("native.pdb.gz");
        let mut enc = GzEncoder::new(fs::File::create(&fname).unwrap(), Compression::default());
        enc.write_all(TWO_MODELS.as_bytes()).unwrap();
        enc.finish().unwrap();

        let pdb = Pdb::from_file(&fname).unwrap();
        assert_eq!(pdb.traj.n_frames(), 2);
    }
}
