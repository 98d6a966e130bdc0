use crate::parameters::RunInputs;
use crate::prelude_crate::*;
use clap::{Arg, ArgMatches, Command};
use core_affinity::{get_core_ids, set_for_current};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub inputs: RunInputs,
    pub max_runtime: Option<Duration>,
    pub number_of_threads: NonZeroUsize,
    pub core_affinity: bool,
    pub config: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn get_number_of_threads(&self) -> usize {
        usize::from(self.number_of_threads)
    }

    /// The settings file to load: the one given on the command line, else
    /// `dropimpact.yaml` in the output directory when it exists.
    pub fn settings_path(&self) -> Option<PathBuf> {
        match &self.config {
            Some(path) => Some(path.clone()),
            None => {
                let path = self.output_dir.join(SETTINGS_FILE);
                path.is_file().then_some(path)
            }
        }
    }
}

const POSITIONALS: [(&str, &str, &str); 8] = [
    ("max_level", "MAXLEVEL", "Maximum refinement level"),
    ("impact_angle", "ANGLE", "Impact angle in degrees (90 is normal incidence)"),
    ("drop_velocity", "DROP_VELOCITY", "Drop velocity (m/s)"),
    ("pool_velocity", "POOL_VELOCITY", "Pool velocity (m/s)"),
    ("drop_radius", "DROP_RADIUS", "Drop radius (m)"),
    ("pool_depth", "POOL_DEPTH", "Pool depth (m)"),
    ("domain_size", "DOMAIN_SIZE", "Domain size in drop radii"),
    ("end_time", "END_TIME", "End time in drop-crossing times"),
];

pub fn command() -> Command {
    let mut command = clap::command!().arg_required_else_help(true);
    for (id, value_name, help) in POSITIONALS {
        let arg = Arg::new(id).value_name(value_name).help(help).required(true);
        command = command.arg(match id {
            "max_level" => arg.value_parser(clap::value_parser!(u8)),
            _ => arg.value_parser(clap::value_parser!(f64)).allow_negative_numbers(true),
        });
    }
    command
        .arg(
            Arg::new("max_runtime")
                .short('m')
                .long("max-runtime")
                .value_name("DURATION")
                .help("Wall-clock budget, in seconds or as hh:mm:ss")
                .value_parser(parse_max_runtime),
        )
        .arg(
            Arg::new("number_of_threads")
                .short('n')
                .long("num-threads")
                .value_name("NTHREADS")
                .help("The number of threads used (min = 1)")
                .value_parser(clap::value_parser!(NonZeroUsize))
                .default_value("1"),
        )
        .arg(
            Arg::new("core_affinity")
                .long("affinity")
                .help("Set the core affinity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("YAML settings file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Root directory of the run outputs")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("."),
        )
}

pub fn get_args() -> ArgMatches {
    command().get_matches()
}

pub fn parse_matches(matches: &ArgMatches) -> ImpactResult<Config> {
    let number = |id: &str| required::<f64>(matches, id);
    let inputs = RunInputs {
        max_level: required::<u8>(matches, "max_level")?,
        impact_angle: number("impact_angle")?,
        drop_velocity: number("drop_velocity")?,
        pool_velocity: number("pool_velocity")?,
        drop_radius: number("drop_radius")?,
        pool_depth: number("pool_depth")?,
        domain_size: number("domain_size")?,
        end_time: number("end_time")?,
    };
    Ok(Config {
        inputs,
        max_runtime: matches.get_one::<Duration>("max_runtime").copied(),
        number_of_threads: required::<NonZeroUsize>(matches, "number_of_threads")?,
        core_affinity: matches.get_flag("core_affinity"),
        config: matches.get_one::<PathBuf>("config").cloned(),
        output_dir: required::<PathBuf>(matches, "output_dir")?,
    })
}

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> ImpactResult<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .ok_or_else(|| ImpactError::config(format!("missing argument {id}")))
}

/// Accepts plain seconds, `mm:ss` or `hh:mm:ss`.
pub fn parse_max_runtime(value: &str) -> Result<Duration, String> {
    let parts = value
        .split(':')
        .map(|part| part.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid duration '{value}': {e}"))?;
    let seconds = match parts.as_slice() {
        [s] => *s,
        [m, s] if *s < 60 => m * 60 + s,
        [h, m, s] if *m < 60 && *s < 60 => h * 3600 + m * 60 + s,
        _ => return Err(format!("invalid duration '{value}', expected seconds or hh:mm:ss")),
    };
    Ok(Duration::from_secs(seconds))
}

pub fn init_global_pool(num_threads: usize, pin_all_cores: bool) -> ImpactResult<()> {
    let builder = rayon::ThreadPoolBuilder::new().num_threads(num_threads);
    let builder = if pin_all_cores {
        let cores = get_core_ids()
            .filter(|cores| !cores.is_empty())
            .ok_or_else(|| ImpactError::config("could not list the system cores"))?;
        builder.start_handler(move |idx| {
            let core = cores[idx % cores.len()];
            let _ = set_for_current(core);
        })
    } else {
        builder
    };
    builder
        .build_global()
        .map_err(|e| ImpactError::config(format!("thread pool: {e}")))?;
    log::debug!("global pool started with {num_threads} threads");
    Ok(())
}
