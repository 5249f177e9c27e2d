use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use clap::{
    Parser,
    ValueEnum,
    builder::styling::{
        AnsiColor,
        Effects,
        Styles,
    },
};

use shared::{log, Result, Context, copy_file_as};
use crate::config::AssignConfig;
use crate::kernel::{NativeKernel, ScoringMode};
use crate::logging::{logger_init, logger_redirect};
use crate::pipeline::run_world;
use crate::version::Version;


pub fn get_style() -> Styles {
    static INSTANCE: OnceLock<Styles> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        Styles::styled()
            .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
            .usage(AnsiColor::Green.on_default()   | Effects::BOLD)
            .literal(AnsiColor::Green.on_default() | Effects::BOLD)
            .placeholder(AnsiColor::BrightBlue.on_default())
            .error(AnsiColor::BrightRed.on_default())
            .valid(AnsiColor::BrightYellow.on_default())
    }).to_owned()
}


pub trait OptProcess : Parser {
    fn process(&self) -> Result<()>;
}


#[derive(Debug, Parser)]
#[command(name = "assign_lp",
          about = Version::new().to_string(),
          long_about = format!("{:#}", Version::new()),
          version,
          styles = get_style())]
/// Assign every frame of a set of trajectories to its nearest generator by RMSD.
///
/// The protein atoms superpose every frame onto the topology, the ligand atoms measure the
/// distance. Flags override the values of the config file.
pub struct AssignCommand {
    #[arg(short='d', long)]
    /// Directory holding the trajectories.
    dir: Option<PathBuf>,

    #[arg(short='e', long)]
    /// Extension of the trajectory files [default: dcd].
    ext: Option<String>,

    #[arg(short='t', long="top", alias="topology")]
    /// Topology file in PDB format, its first model is the reference frame.
    ///
    /// Alias: "topology".
    topology: Option<PathBuf>,

    #[arg(short='g', long)]
    /// Generator file [default: ./Gens.lh5].
    gens: Option<PathBuf>,

    #[arg(short='p', long, aliases=["pi", "protein_indices"])]
    /// File of 0-based protein atom indices used for the alignment.
    ///
    /// Aliases: "pi", "protein_indices".
    protein_indices: Option<PathBuf>,

    #[arg(short='l', long, aliases=["li", "ligand_indices"])]
    /// File of 0-based ligand atom indices used for the distance.
    ///
    /// Aliases: "li", "ligand_indices".
    ligand_indices: Option<PathBuf>,

    #[arg(short='o', long)]
    /// Output directory of the assignment files [default: Data].
    outdir: Option<PathBuf>,

    #[arg(short='w', long)]
    /// Number of workers, each one takes a striped share of the trajectories [default: 1].
    ///
    /// If 0 is set, it will fall back to the number of logic CPU cores of you machine.
    nworkers: Option<usize>,

    #[arg(short='n', long)]
    /// Number of threads for the RMSD computation [default: 0].
    ///
    /// If 0 is set, it will fall back to the number of logic CPU cores of you machine.
    nthreads: Option<usize>,

    #[arg(long, value_enum)]
    /// How the ligand distance is measured [default: aligned].
    ///
    /// "aligned" takes the plain ligand RMSD once the protein is superposed, without fitting the
    /// ligand again. "refit" also superposes the ligand onto the generator before measuring, which
    /// is closer to the MDTraj `md.RMSD(..., precentered=True)` ligand distance.
    scoring: Option<ScoringMode>,

    #[arg(short='c', long, aliases=["cfg", "conf"])]
    /// Config file name.
    ///
    /// Aliases: "cfg", "conf".
    config: Option<PathBuf>,

    #[arg(long, value_enum, alias="gen")]
    /// Generate auxiliary files for the calculation.
    ///
    /// The assignment will not run if this flag is set.
    ///
    /// Alias: "gen".
    generate: Option<TemplateGenerator>,
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum TemplateGenerator {
    #[value(aliases=["config", "cfg", "conf"])]
    /// Generate config template for the assignment.
    /// Aliases: "config", "cfg" and "conf".
    ConfigTemplate,
}


impl AssignCommand {
    /// Values of the config file, if any, overridden by the flags.
    pub fn to_config(&self) -> Result<AssignConfig> {
        let mut cfg = match self.config.as_ref() {
            Some(fname) => AssignConfig::from_file(fname)?,
            None        => AssignConfig::default(),
        };

        if let Some(v) = self.dir.as_ref()             { cfg.dir = Some(v.clone()); }
        if let Some(v) = self.ext.as_ref()             { cfg.ext = v.clone(); }
        if let Some(v) = self.topology.as_ref()        { cfg.topology = Some(v.clone()); }
        if let Some(v) = self.gens.as_ref()            { cfg.gens = v.clone(); }
        if let Some(v) = self.protein_indices.as_ref() { cfg.protein_indices = Some(v.clone()); }
        if let Some(v) = self.ligand_indices.as_ref()  { cfg.ligand_indices = Some(v.clone()); }
        if let Some(v) = self.outdir.as_ref()          { cfg.outdir = v.clone(); }
        if let Some(v) = self.nworkers                 { cfg.nworkers = v; }
        if let Some(v) = self.nthreads                 { cfg.nthreads = v; }
        if let Some(v) = self.scoring                  { cfg.scoring = v; }

        Ok(cfg)
    }
}


impl OptProcess for AssignCommand {
    fn process(&self) -> Result<()> {
        use TemplateGenerator::*;

        logger_init();
        log::info!("Global logger initialized with targets being stderr and \"./globalrun.log\"");

        if let Some(g) = self.generate {
            return match g {
                ConfigTemplate => AssignConfig::default().to_file("assign_config_template.toml"),
            }
        }

        let cfg = self.to_config()?;
        let run = cfg.validate()?;

        rayon::ThreadPoolBuilder::new().num_threads(run.nthreads).build_global()
            .context("Failed to build the global thread pool.")?;

        fs::create_dir_all(&run.outdir)
            .with_context(|| format!("Failed to create output directory {:?}.", run.outdir))?;
        logger_redirect(&run.outdir)?;
        cfg.print_to_log();

        keep_inputs(&run.outdir, self.config.as_deref(), run.indices())?;
        log::info!("Running with {} worker(s) and {} kernel thread(s).", run.nworkers, rayon::current_num_threads());

        let kernel = NativeKernel::new(run.scoring);
        run_world(run, &kernel)?;
        Ok(())
    }
}


/// Copy the inputs of a run into `outdir`, each name prefixed by the role of the file
/// (`config.`, `protein_indices.`, `ligand_indices.`) so that inputs sharing a file name are all
/// kept.
fn keep_inputs(outdir: &Path, config: Option<&Path>, indices: Option<(&Path, &Path)>) -> Result<Vec<PathBuf>> {
    let mut inputs = vec![];
    if let Some(fname) = config {
        inputs.push(("config", fname));
    }
    if let Some((pfname, lfname)) = indices {
        inputs.push(("protein_indices", pfname));
        inputs.push(("ligand_indices", lfname));
    }

    inputs.into_iter()
        .map(|(role, from)| -> Result<PathBuf> {
            let name = from.file_name()
                .with_context(|| format!("{:?} has no file name.", from))?;
            let target = outdir.join(format!("{}.{}", role, name.to_string_lossy()));
            copy_file_as(from, &target)?;
            log::info!("Input {:?} kept as {:?}", from, target);
            Ok(target)
        })
        .collect()
}


pub fn run() -> Result<()> {
    AssignCommand::parse().process()
}
