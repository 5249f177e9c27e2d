use std::fmt;
use once_cell::sync::OnceCell;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}


const LOGO: &str = r"
+-----------------------------------------------------------------+
|                                                                 |
|      ___              _                  _      ___             |
|     / _ \ ___ ___ ___(_)__ _ _ _   ___  | |    | _ \            |
|    | |_| (_-<(_-<(_-<| / _` | ' \ |___| | |__  |  _/            |
|    |_| |_/__//__//__/|_\__, |_||_|      |____| |_|              |
|                        |___/                                    |
|                                                                 |
+-----------------------------------------------------------------+";


/// Build time in the local timezone, parsed once.
fn local_built_time() -> &'static str {
    static CELL: OnceCell<String> = OnceCell::new();
    CELL.get_or_init(|| {
        built::util::strptime(built_info::BUILT_TIME_UTC)
            .with_timezone(&built::chrono::offset::Local)
            .to_string()
    })
}


/// Banner of `--help`, `{:#}` adds the build details.
#[derive(Clone, Copy, Debug)]
pub struct Version {
    pkg:       &'static str,
    version:   &'static str,
    authors:   &'static str,
    built_at:  &'static str,
    git_short: Option<&'static str>,
    git_long:  Option<&'static str>,
    git_dirty: Option<bool>,
    features:  &'static str,
    profile:   &'static str,
    rustc:     &'static str,
    target:    &'static str,
}


impl Version {
    pub fn new() -> Self {
        Self {
            pkg:       built_info::PKG_NAME,
            version:   built_info::PKG_VERSION,
            authors:   built_info::PKG_AUTHORS,
            built_at:  local_built_time(),
            git_short: built_info::GIT_COMMIT_HASH_SHORT,
            git_long:  built_info::GIT_COMMIT_HASH,
            git_dirty: built_info::GIT_DIRTY,
            features:  built_info::FEATURES_LOWERCASE_STR,
            profile:   built_info::PROFILE,
            rustc:     built_info::RUSTC_VERSION,
            target:    built_info::TARGET,
        }
    }
}


impl Default for Version {
    fn default() -> Self { Self::new() }
}


impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", LOGO.trim_start())?;
        writeln!(f)?;
        writeln!(f, "{} {}: nearest-generator assignment of MD trajectories by RMSD", self.pkg, self.version)?;
        writeln!(f, "    commit:      {}", self.git_short.unwrap_or("unknown"))?;
        writeln!(f, "    author(s):   {}", self.authors)?;
        writeln!(f, "    built at:    {}", self.built_at)?;

        if !f.alternate() {
            return Ok(());
        }

        let dirty = match self.git_dirty {
            Some(true)  => " (dirty)",
            _           => "",
        };
        writeln!(f, "        full commit:    {}{}", self.git_long.unwrap_or("unknown"), dirty)?;
        writeln!(f, "        features:       {}", if self.features.is_empty() { "none" } else { self.features })?;
        writeln!(f, "        profile:        {}", self.profile)?;
        writeln!(f, "        rustc:          {}", self.rustc)?;
        writeln!(f, "        target:         {}", self.target)?;
        writeln!(f)?;
        writeln!(f, "Files are read in Angstrom and stored in nanometers; RMSDs are reported in nanometers.")
    }
}
