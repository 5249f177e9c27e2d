use std::path::Path;
use std::io::IsTerminal;
use std::time::Instant;
use once_cell::sync::Lazy;
use std::sync::Mutex;

use shared::{
    Result,
    anyhow,
    info,
    log::LevelFilter,
};
use log4rs::{
    append::{
        console::{
            ConsoleAppender,
            Target,
        },
        file::FileAppender,
    },
    config::{
        Appender,
        Config,
        Root,
    },
    encode::pattern::PatternEncoder,
    init_config,
    Handle,
};


pub static HANDLE: Lazy<Mutex<Handle>> = Lazy::new(|| {
    let config = gen_logger_config(Option::<&str>::None)
        .expect("Failed to build the default logger config");
    let handle = init_config(config)
        .expect("Global logger already initialized");
    Mutex::new(handle)
});


const ENCODE_STR: &str = "{d(%Y-%m-%d %H:%M:%S)} [{h({l:>5})}] {m}{n}";


fn file_appender(path: impl AsRef<Path>) -> Result<FileAppender> {
    Ok(FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENCODE_STR)))
        .build(path)?)
}


fn gen_logger_config(path: Option<impl AsRef<Path>>) -> Result<Config> {
    let level = LevelFilter::Info;
    let isatty = std::io::stderr().is_terminal();

    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENCODE_STR)))
        .target(Target::Stderr)
        .build();

    let global_log = if isatty {
        Some(file_appender("./globalrun.log")?)
    } else {
        None
    };

    let logfile = match path {
        Some(p) => Some(file_appender(p.as_ref().join("run.log"))?),
        None    => None,
    };

    let root = Root::builder().appender("stderr");
    let root = if global_log.is_some() { root.appender("global_log") } else { root };
    let root = if logfile.is_some() { root.appender("logfile") } else { root };
    let root = root.build(level);

    let builder = Config::builder().appender(Appender::builder().build("stderr", Box::new(stderr)));
    let builder = if let Some(global_log) = global_log {
        builder.appender(Appender::builder().build("global_log", Box::new(global_log)))
    } else {
        builder
    };
    let builder = if let Some(logfile) = logfile {
        builder.appender(Appender::builder().build("logfile", Box::new(logfile)))
    } else {
        builder
    };

    Ok(builder.build(root)?)
}


pub fn logger_init() {
    Lazy::force(&HANDLE);
}


/// Add `{path}/run.log` to the log targets.
pub fn logger_redirect(path: impl AsRef<Path>) -> Result<()> {
    let config = gen_logger_config(Some(path))?;
    HANDLE.lock()
        .map_err(|_| anyhow::anyhow!("Logger handle poisoned."))?
        .set_config(config);
    Ok(())
}


/// Logs the wall time of a scope when dropped:
///
/// `<RANK 0> PERFORMANCE [Assigning...] : 1.234 seconds`
pub struct Timing<'a> {
    rank:  usize,
    name:  &'a str,
    start: Instant,
}


impl<'a> Timing<'a> {
    pub fn new(rank: usize, name: &'a str) -> Self {
        Self { rank, name, start: Instant::now() }
    }
}


impl Drop for Timing<'_> {
    fn drop(&mut self) {
        info!("<RANK {}> PERFORMANCE [{}] : {:.3} seconds",
              self.rank, self.name, self.start.elapsed().as_secs_f64());
    }
}
