use std::fs;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use shared::{
    log,
    Result,
    Context,
    ensure,
};

use crate::error::AssignError;
use crate::kernel::ScoringMode;


#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignConfig {
    // Directory holding the trajectories, every `{dir}/*.{ext}` file is assigned.
    pub(crate) dir: Option<PathBuf>,

    #[serde(default = "AssignConfig::default_ext")]
    pub(crate) ext: String,

    // Topology with the reference frame, PDB only.
    pub(crate) topology: Option<PathBuf>,

    #[serde(default = "AssignConfig::default_gens")]
    pub(crate) gens: PathBuf,

    // Index files of the alignment (protein) and scoring (ligand) atoms, 0-based.
    // Give both or none of them. Without them, every atom is aligned and scored.
    pub(crate) protein_indices: Option<PathBuf>,
    pub(crate) ligand_indices: Option<PathBuf>,

    #[serde(default = "AssignConfig::default_outdir")]
    pub(crate) outdir: PathBuf,

    // 0 for the number of logical cores.
    #[serde(default = "AssignConfig::default_nworkers")]
    pub(crate) nworkers: usize,

    // Threads of the RMSD kernel, 0 for the number of logical cores.
    #[serde(default)]
    pub(crate) nthreads: usize,

    #[serde(default)]
    pub(crate) scoring: ScoringMode,
}


/// Configuration after the argument pre-pass: every input is present and exists.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub dir:      PathBuf,
    pub ext:      String,
    pub topology: PathBuf,
    pub gens:     PathBuf,
    pub indices:  Option<(PathBuf, PathBuf)>,
    pub outdir:   PathBuf,
    pub nworkers: usize,
    pub nthreads: usize,
    pub scoring:  ScoringMode,
}


impl RunConfig {
    pub fn indices(&self) -> Option<(&Path, &Path)> {
        self.indices.as_ref().map(|(p, l)| (p.as_path(), l.as_path()))
    }
}


impl AssignConfig {
    fn default_ext() -> String { "dcd".to_string() }
    fn default_gens() -> PathBuf { PathBuf::from("./Gens.lh5") }
    fn default_outdir() -> PathBuf { PathBuf::from("Data") }
    fn default_nworkers() -> usize { 1 }

    pub fn from_file<P>(fname: P) -> Result<Self>
    where P: AsRef<Path> {
        ensure!(fname.as_ref().is_file(), "Config file {:?} not available.", fname.as_ref());
        let raw = fs::read_to_string(fname.as_ref())?;
        let cfg = toml::from_str::<Self>(&raw)
            .with_context(|| format!("Failed to parse config file {:?}.", fname.as_ref()))?;
        Ok(cfg)
    }

    pub fn to_file<P>(&self, fname: P) -> Result<()>
    where P: AsRef<Path> {
        if fname.as_ref().is_file() {
            log::warn!("File {:?} exists, overwriting ...", fname.as_ref());
        }
        log::info!("Writing config to file {:?}", fname.as_ref());
        fs::write(fname.as_ref(), self.to_string())?;
        Ok(())
    }

    /// Check the arguments before any file is listed or read.
    pub fn validate(&self) -> Result<RunConfig> {
        let dir = self.dir.clone()
            .ok_or_else(|| AssignError::MissingArgument("trajectory directory (--dir)".into()))?;
        let topology = self.topology.clone()
            .ok_or_else(|| AssignError::MissingArgument("topology file (--top)".into()))?;

        if !dir.is_dir() {
            return Err(AssignError::MissingInput { kind: "directory", path: dir }.into());
        }
        if !topology.is_file() {
            return Err(AssignError::MissingInput { kind: "topology", path: topology }.into());
        }
        if !self.gens.is_file() {
            return Err(AssignError::MissingInput { kind: "generator file", path: self.gens.clone() }.into());
        }

        let indices = match (&self.protein_indices, &self.ligand_indices) {
            (Some(p), Some(l)) => {
                for f in [p, l] {
                    if !f.is_file() {
                        return Err(AssignError::MissingInput { kind: "index file", path: f.clone() }.into());
                    }
                }
                Some((p.clone(), l.clone()))
            },
            (None, None) => None,
            (Some(_), None) => return Err(AssignError::MissingArgument(
                    "ligand index file (--ligand-indices) must come with the protein one".into()).into()),
            (None, Some(_)) => return Err(AssignError::MissingArgument(
                    "protein index file (--protein-indices) must come with the ligand one".into()).into()),
        };

        if self.ext.is_empty() {
            return Err(AssignError::MissingArgument("trajectory extension (--ext)".into()).into());
        }

        let nworkers = match self.nworkers {
            0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            n => n,
        };

        Ok(RunConfig {
            dir,
            ext: self.ext.trim_start_matches('.').to_string(),
            topology,
            gens: self.gens.clone(),
            indices,
            outdir: self.outdir.clone(),
            nworkers,
            nthreads: self.nthreads,
            scoring: self.scoring,
        })
    }

    pub fn print_to_log(&self) {
        let hashtag_line = "#".repeat(100);
        log::info!("Config loaded. The formatted config is:\n\n{hashtag_line}\n{}\n{hashtag_line}\n\n", self);
    }
}


impl fmt::Display for AssignConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt_path(f: &mut fmt::Formatter<'_>, key: &str, p: Option<&PathBuf>, hint: &str) -> fmt::Result {
            match p {
                Some(p) => writeln!(f, " {:>16} = {:?}", key, p),
                None    => writeln!(f, "#{:>16} = \"{}\" # to be filled", key, hint),
            }
        }

        writeln!(f, "# assign_lp config")?;
        writeln!(f)?;

        opt_path(f, "dir", self.dir.as_ref(), "trajectories")?;
        writeln!(f, " {:>16} = {:?}", "ext", self.ext)?;
        opt_path(f, "topology", self.topology.as_ref(), "native.pdb")?;
        writeln!(f, " {:>16} = {:?}", "gens", self.gens)?;
        writeln!(f)?;

        writeln!(f, "# 0-based atom indices; integers, `start..end` ranges or integral floats.")?;
        writeln!(f, "# Give both files or none; without them every atom is aligned and scored.")?;
        opt_path(f, "protein_indices", self.protein_indices.as_ref(), "protein.dat")?;
        opt_path(f, "ligand_indices", self.ligand_indices.as_ref(), "ligand.dat")?;
        writeln!(f)?;

        writeln!(f, " {:>16} = {:?}", "outdir", self.outdir)?;
        writeln!(f, " {:>16} = {} # 0 for all logical cores", "nworkers", self.nworkers)?;
        writeln!(f, " {:>16} = {} # 0 for all logical cores", "nthreads", self.nthreads)?;
        writeln!(f, " {:>16} = \"{}\" # \"aligned\" or \"refit\"", "scoring", self.scoring)?;

        Ok(())
    }
}


impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ext: Self::default_ext(),
            topology: None,
            gens: Self::default_gens(),
            protein_indices: None,
            ligand_indices: None,
            outdir: Self::default_outdir(),
            nworkers: Self::default_nworkers(),
            nthreads: 0,
            scoring: ScoringMode::default(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn kind(err: &shared::anyhow::Error) -> Option<&AssignError> {
        err.downcast_ref::<AssignError>()
    }

    #[test]
    fn test_deserialize() {
        let txt = r#"
        dir = "trajs"
        topology = "native.pdb"
        protein_indices = "protein.dat"
        ligand_indices = "ligand.dat"
        nworkers = 4
        scoring = "refit"
        "#;

        let actual_cfg: AssignConfig = toml::from_str(txt).unwrap();
        let expect_cfg = AssignConfig {
            dir: Some(PathBuf::from("trajs")),
            topology: Some(PathBuf::from("native.pdb")),
            protein_indices: Some(PathBuf::from("protein.dat")),
            ligand_indices: Some(PathBuf::from("ligand.dat")),
            nworkers: 4,
            scoring: ScoringMode::Refit,
            ..Default::default()
        };
        assert_eq!(expect_cfg, actual_cfg);

        assert!(toml::from_str::<AssignConfig>("dir = \"a\"\nunknown = 1").is_err());
        assert!(toml::from_str::<AssignConfig>("scoring = \"kabsch\"").is_err());
    }

    #[test]
    fn test_template_round_trip() {
        let cfg = AssignConfig::default();
        let parsed: AssignConfig = toml::from_str(&cfg.to_string()).unwrap();
        assert_eq!(parsed, cfg);

        let cfg = AssignConfig {
            dir: Some(PathBuf::from("trajs")),
            protein_indices: Some(PathBuf::from("p.dat")),
            ..Default::default()
        };
        let parsed: AssignConfig = toml::from_str(&cfg.to_string()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let top  = dir.path().join("native.pdb");
        let gens = dir.path().join("Gens.h5");
        let pi   = dir.path().join("protein.dat");
        fs::write(&top, "").unwrap();
        fs::write(&gens, "").unwrap();
        fs::write(&pi, "0").unwrap();

        let err = AssignConfig::default().validate().unwrap_err();
        assert!(matches!(kind(&err), Some(AssignError::MissingArgument(_))));

        let mut cfg = AssignConfig {
            dir: Some(dir.path().to_path_buf()),
            topology: Some(top.clone()),
            gens: gens.clone(),
            ext: ".dcd".to_string(),
            ..Default::default()
        };
        let run = cfg.validate().unwrap();
        assert_eq!(run.ext, "dcd");
        assert_eq!(run.indices, None);
        assert_eq!(run.nworkers, 1);

        cfg.protein_indices = Some(pi.clone());
        let err = cfg.validate().unwrap_err();
        assert!(matches!(kind(&err), Some(AssignError::MissingArgument(_))));

        cfg.ligand_indices = Some(dir.path().join("missing.dat"));
        let err = cfg.validate().unwrap_err();
        assert!(matches!(kind(&err), Some(AssignError::MissingInput { kind: "index file", .. })));

        cfg.topology = Some(dir.path().join("missing.pdb"));
        let err = cfg.validate().unwrap_err();
        assert!(matches!(kind(&err), Some(AssignError::MissingInput { kind: "topology", .. })));

        cfg.topology = Some(top);
        cfg.ligand_indices = None;
        cfg.protein_indices = None;
        cfg.nworkers = 0;
        assert!(cfg.validate().unwrap().nworkers >= 1);
    }
}
