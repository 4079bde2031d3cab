use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::{debug, info, warn};

use backdoor_search::dimacs::parse_dimacs_file;
use backdoor_search::ea::EvolutionaryAlgorithm;
use backdoor_search::{Solver, Var, LBOOL_FALSE, LBOOL_TRUE, LBOOL_UNDEF};

/// Searches for rho-backdoors of a CNF formula: small variable sets whose
/// assignments are almost all refuted by unit propagation alone.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// DIMACS CNF input, plain or gzipped
    input: PathBuf,

    /// Optional file receiving the SAT/UNSAT verdict
    result_output: Option<PathBuf>,

    /// Verbosity level (0=silent, 1=some, 2=more)
    #[arg(long, default_value_t = 1)]
    verb: u32,

    /// Limit on CPU time allowed in seconds (best effort)
    #[arg(long)]
    cpu_lim: Option<u64>,

    /// Limit on memory usage in megabytes (best effort)
    #[arg(long)]
    mem_lim: Option<u64>,

    /// Run the CDCL search instead of the backdoor search and exit with
    /// the solver verdict (10=SAT, 20=UNSAT, 0=indeterminate)
    #[arg(long)]
    solve: bool,

    /// Seed for the evolutionary algorithm
    #[arg(long, default_value_t = 42)]
    ea_seed: u64,

    /// Number of EA runs
    #[arg(long, default_value_t = 1)]
    ea_num_runs: usize,

    /// Number of EA iterations in each run
    #[arg(long, default_value_t = 1000)]
    ea_num_iters: usize,

    /// Instance size in the EA
    #[arg(long, default_value_t = 10)]
    ea_instance_size: usize,

    /// Comma-separated 0-based variable indices (N or A-B intervals) to
    /// draw backdoor variables from; all variables when absent
    #[arg(long)]
    ea_vars: Option<String>,

    /// Comma-separated 0-based variable indices (N or A-B intervals) to
    /// keep out of the backdoor pool
    #[arg(long)]
    ea_bans: Option<String>,

    /// Output file collecting the best backdoor of each EA run
    #[arg(long, default_value = "backdoors.txt")]
    ea_output_path: PathBuf,
}

fn main() {
    let args = Args::parse();

    let level = match args.verb {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::builder().filter_level(level).init();

    set_resource_limits(&args);

    let mut solver = Solver::new();
    solver.verbosity = args.verb;

    let start = cpu_time::ProcessTime::now();
    if let Err(err) = parse_dimacs_file(&args.input, &mut solver) {
        eprintln!("ERROR! {}: {}", args.input.display(), err);
        exit(1);
    }
    info!("number of variables: {}", solver.num_vars());
    info!("number of clauses: {}", solver.num_clauses());

    if !solver.simplify() {
        if let Some(path) = &args.result_output {
            write_verdict(path, "UNSAT");
        }
        info!("solved by unit propagation");
        if args.verb > 0 {
            solver.stats_info(start);
        }
        eprintln!("UNSATISFIABLE");
        exit(20);
    }

    if args.solve {
        let status = solver.solve();
        if args.verb > 0 {
            solver.stats_info(start);
        }
        if status == LBOOL_TRUE {
            eprintln!("SATISFIABLE");
            if let Some(path) = &args.result_output {
                write_model(path, &solver);
            }
            exit(10);
        } else if status == LBOOL_FALSE {
            eprintln!("UNSATISFIABLE");
            if let Some(path) = &args.result_output {
                write_verdict(path, "UNSAT");
            }
            exit(20);
        } else {
            eprintln!("INDETERMINATE");
            if let Some(path) = &args.result_output {
                write_verdict(path, "INDET");
            }
            exit(0);
        }
    }

    let pool = match build_pool(&solver, &args) {
        Ok(pool) => pool,
        Err(message) => {
            eprintln!("ERROR! {}", message);
            exit(1);
        }
    };
    info!("pool size: {}", pool.len());

    if args.ea_instance_size > 63 {
        eprintln!("ERROR! instance size {} exceeds 63", args.ea_instance_size);
        exit(1);
    }

    // Start every invocation from a clean slate; runs append below.
    if let Err(err) = File::create(&args.ea_output_path) {
        eprintln!(
            "ERROR! could not open {}: {}",
            args.ea_output_path.display(),
            err
        );
        exit(1);
    }

    let mut ea = EvolutionaryAlgorithm::new(&mut solver, args.ea_seed);
    for run in 1..=args.ea_num_runs {
        info!("=== [{}/{}] ===", run, args.ea_num_runs);
        let _best = ea.run(
            args.ea_num_iters,
            args.ea_instance_size,
            pool.clone(),
            &args.ea_output_path,
        );
    }
    drop(ea);
    info!("done {} EA runs", args.ea_num_runs);

    if args.verb > 0 {
        solver.stats_info(start);
    }
}

/// Pool of candidate variables: the requested universe minus bans, minus
/// variables already assigned at level 0, minus variables that occur in no
/// clause. Sorted ascending.
fn build_pool(solver: &Solver, args: &Args) -> Result<Vec<Var>, String> {
    let n_vars = solver.num_vars();

    let universe: Vec<usize> = match &args.ea_vars {
        Some(list) => parse_intervals(list)?,
        None => (0..n_vars).collect(),
    };

    let mut banned = vec![false; n_vars];
    if let Some(list) = &args.ea_bans {
        for v in parse_intervals(list)? {
            if v >= n_vars {
                return Err(format!("banned variable {} out of range 0..{}", v, n_vars));
            }
            banned[v] = true;
        }
    }

    let occurs = solver.occurring_vars();
    let mut pool = Vec::new();
    for v in universe {
        if v >= n_vars {
            return Err(format!("variable {} out of range 0..{}", v, n_vars));
        }
        if banned[v] {
            continue;
        }
        if solver.value(Var(v as i32)) != LBOOL_UNDEF {
            continue;
        }
        if !occurs[v] {
            // A variable in no clause can never drive propagation.
            debug!("skipping hole variable {}", v);
            continue;
        }
        pool.push(Var(v as i32));
    }
    pool.sort();
    pool.dedup();
    Ok(pool)
}

/// Comma-separated list of `N` or `A-B` items; intervals are inclusive and
/// may run in either direction. 0-based indices.
fn parse_intervals(list: &str) -> Result<Vec<usize>, String> {
    let mut result = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('-') {
            Some((a, b)) => {
                let start: usize = a
                    .trim()
                    .parse()
                    .map_err(|_| format!("bad interval start '{}'", a))?;
                let end: usize = b
                    .trim()
                    .parse()
                    .map_err(|_| format!("bad interval end '{}'", b))?;
                if start <= end {
                    result.extend(start..=end);
                } else {
                    result.extend((end..=start).rev());
                }
            }
            None => {
                let single: usize = part
                    .parse()
                    .map_err(|_| format!("bad variable index '{}'", part))?;
                result.push(single);
            }
        }
    }
    Ok(result)
}

fn write_verdict(path: &PathBuf, verdict: &str) {
    match File::create(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{}", verdict);
        }
        Err(err) => eprintln!("ERROR! could not open {}: {}", path.display(), err),
    }
}

fn write_model(path: &PathBuf, solver: &Solver) {
    match File::create(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "SAT");
            let mut line = String::new();
            for (i, value) in solver.model.iter().enumerate() {
                if *value == LBOOL_UNDEF {
                    continue;
                }
                if !line.is_empty() {
                    line.push(' ');
                }
                if *value == LBOOL_FALSE {
                    line.push('-');
                }
                line.push_str(&(i + 1).to_string());
            }
            let _ = writeln!(file, "{} 0", line);
        }
        Err(err) => eprintln!("ERROR! could not open {}: {}", path.display(), err),
    }
}

#[cfg(unix)]
fn set_resource_limits(args: &Args) {
    unsafe {
        if let Some(cpu_s) = args.cpu_lim {
            let rl = libc::rlimit {
                rlim_cur: cpu_s,
                rlim_max: cpu_s,
            };
            if libc::setrlimit(libc::RLIMIT_CPU, &rl) != 0 {
                warn!("could not set the CPU-time limit");
            }
        }
        if let Some(mem_mb) = args.mem_lim {
            let bytes = mem_mb.saturating_mul(1024 * 1024);
            let rl = libc::rlimit {
                rlim_cur: bytes,
                rlim_max: bytes,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &rl) != 0 {
                warn!("could not set the memory limit");
            }
        }
    }
}

#[cfg(not(unix))]
fn set_resource_limits(args: &Args) {
    if args.cpu_lim.is_some() || args.mem_lim.is_some() {
        warn!("resource limits are not supported on this platform");
    }
}

#[cfg(test)]
mod tests {
    use super::parse_intervals;

    #[test]
    fn intervals_parse_in_both_directions() {
        assert_eq!(parse_intervals("3").unwrap(), vec![3]);
        assert_eq!(parse_intervals("1,4-6,9").unwrap(), vec![1, 4, 5, 6, 9]);
        assert_eq!(parse_intervals("5-3").unwrap(), vec![5, 4, 3]);
        assert!(parse_intervals("x").is_err());
        assert!(parse_intervals("1-y").is_err());
    }
}
