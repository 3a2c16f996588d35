//! SimOS driver - replays a script of simulated events
//!
//! Usage: sim-os [OPTIONS] <script_file> [output_file]
//!
//! Each event or query in the script is applied to a fresh engine; query
//! results are written one per line to the output file, or stdout.

use std::process;
use std::str::FromStr;

use clap::{App, Arg, ArgMatches};

use sim_os::io::{execute, read_script, write_results};
use sim_os::{logger, PriorityOrder, SimConfig, SimOS};

/// Command-line configuration
struct Config {
    script_file: String,
    output_file: Option<String>,
    sim: SimConfig,
    check: bool,
    verbosity: u64,
}

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = logger::init(logger::level_for_verbosity(config.verbosity)) {
        eprintln!("{}", e);
    }

    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn parse_args() -> Result<Config, String> {
    let matches = App::new("sim-os")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Replays process, memory and disk events against a simulated OS")
        .arg(Arg::with_name("SCRIPT")
             .help("Script with one event or query per line")
             .required(true)
             .index(1))
        .arg(Arg::with_name("OUTPUT")
             .help("Where to write query results (default: stdout)")
             .index(2))
        .arg(Arg::with_name("disks")
             .short("d")
             .long("disks")
             .takes_value(true)
             .help("Number of disks"))
        .arg(Arg::with_name("ram")
             .short("m")
             .long("ram")
             .takes_value(true)
             .help("Amount of RAM in bytes"))
        .arg(Arg::with_name("os-size")
             .short("s")
             .long("os-size")
             .takes_value(true)
             .help("Size of the resident OS process in bytes"))
        .arg(Arg::with_name("lower-first")
             .long("lower-first")
             .help("Treat smaller priority numbers as more urgent"))
        .arg(Arg::with_name("check")
             .long("check")
             .help("Verify engine invariants after every command"))
        .arg(Arg::with_name("verbose")
             .short("v")
             .long("verbose")
             .multiple(true)
             .help("Log engine events to stderr (repeat for more detail)"))
        .get_matches();

    let defaults = SimConfig::default();
    let sim = SimConfig {
        disks: numeric_arg(&matches, "disks", defaults.disks)?,
        ram: numeric_arg(&matches, "ram", defaults.ram)?,
        os_size: numeric_arg(&matches, "os-size", defaults.os_size)?,
        priority_order: if matches.is_present("lower-first") {
            PriorityOrder::LowerFirst
        } else {
            PriorityOrder::HigherFirst
        },
    };

    if sim.ram == 0 {
        return Err("RAM size must be positive".to_string());
    }
    if sim.os_size == 0 || sim.os_size > sim.ram {
        return Err(format!("OS size must be between 1 and {}", sim.ram));
    }

    Ok(Config {
        script_file: matches.value_of("SCRIPT").unwrap_or_default().to_string(),
        output_file: matches.value_of("OUTPUT").map(str::to_string),
        sim,
        check: matches.is_present("check"),
        verbosity: matches.occurrences_of("verbose"),
    })
}

fn numeric_arg<T: FromStr>(matches: &ArgMatches, name: &str, default: T) -> Result<T, String> {
    match matches.value_of(name) {
        Some(raw) => raw.parse().map_err(|_| format!("Invalid value for --{}: {}", name, raw)),
        None => Ok(default),
    }
}

/// Main logic separated from main() for cleaner error handling
fn run(config: &Config) -> Result<(), String> {
    let script = read_script(&config.script_file)?;
    log::info!("{}: {} commands", config.script_file, script.len());

    let mut sim = SimOS::with_config(&config.sim);
    let results = execute(&mut sim, &script, config.check)?;

    match &config.output_file {
        Some(path) => {
            write_results(path, &results)?;
            log::info!("results written to {}", path);
        }
        None => {
            for line in &results {
                println!("{}", line);
            }
        }
    }

    log::info!(
        "final state: CPU {}, {} ready, {} bytes free",
        sim.get_cpu(),
        sim.get_ready_queue().len(),
        sim.free_memory()
    );
    Ok(())
}
