//! (1+1) evolutionary search for backdoor variable sets.
//!
//! An individual is a fixed-size sequence of variable slots drawn from a
//! pool; mutation swaps slots with pool positions, so the effective set
//! both changes membership and drifts in size. Fitness is the fraction of
//! the 2^|B| cubes that unit propagation fails to refute; smaller is
//! better, and the empty set is infinitely bad so it always sorts last.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use fxhash::FxHashMap;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Solver, Var};

/// Fitness of a candidate backdoor. All comparisons delegate to `score`;
/// `rho` and `hard` ride along for reporting.
#[derive(Debug, Clone, Copy)]
pub struct Fitness {
    pub score: f64,
    pub rho: f64,
    pub hard: u64,
}

impl Fitness {
    /// The fitness of an empty variable set: worse than anything real.
    pub fn worst() -> Fitness {
        Fitness {
            score: f64::INFINITY,
            rho: 0.0,
            hard: 1,
        }
    }
}

impl PartialEq for Fitness {
    fn eq(&self, other: &Fitness) -> bool {
        self.score == other.score
    }
}

impl PartialOrd for Fitness {
    fn partial_cmp(&self, other: &Fitness) -> Option<std::cmp::Ordering> {
        self.score.partial_cmp(&other.score)
    }
}

/// A candidate backdoor: `data` holds the selected variable slots (None is
/// an empty placeholder) and `pool` the currently unused variables in the
/// same representation. Swapping between the two is how both mutation and
/// initialization move variables around.
#[derive(Debug)]
pub struct Instance {
    data: Vec<Option<Var>>,
    pool: Vec<Option<Var>>,
    cached_fitness: Option<Fitness>,
}

impl Clone for Instance {
    fn clone(&self) -> Self {
        // A copy carries the data but not the locally cached fitness.
        Instance {
            data: self.data.clone(),
            pool: self.pool.clone(),
            cached_fitness: None,
        }
    }
}

impl Instance {
    pub fn empty() -> Instance {
        Instance {
            data: Vec::new(),
            pool: Vec::new(),
            cached_fitness: None,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.data.iter().filter(|slot| slot.is_some()).count()
    }

    /// The canonical key of this candidate: its filled slots, sorted.
    pub fn variables(&self) -> Vec<Var> {
        let mut vars: Vec<Var> = self.data.iter().filter_map(|slot| *slot).collect();
        vars.sort();
        vars
    }

    pub fn fitness(&self) -> Option<Fitness> {
        self.cached_fitness
    }
}

impl std::fmt::Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.variables().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

pub struct EvolutionaryAlgorithm<'a> {
    solver: &'a mut Solver,
    rng: StdRng,
    cache: FxHashMap<Vec<Var>, Fitness>,
    cache_hits: u64,
    cache_misses: u64,
}

impl<'a> EvolutionaryAlgorithm<'a> {
    pub fn new(solver: &'a mut Solver, seed: u64) -> Self {
        EvolutionaryAlgorithm {
            solver,
            rng: StdRng::seed_from_u64(seed),
            cache: FxHashMap::default(),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// One full (1+1) run. Returns the best individual found; its summary
    /// line is appended to `output_path`.
    pub fn run(
        &mut self,
        num_iterations: usize,
        instance_size: usize,
        pool: Vec<Var>,
        output_path: &Path,
    ) -> Instance {
        info!("running EA for {} iterations", num_iterations);
        info!("instance size: {}", instance_size);
        info!("solver variables: {}", self.solver.num_vars());
        info!("pool size: {}", pool.len());

        if pool.is_empty() || instance_size == 0 {
            info!("pool of variables is empty, cannot run");
            let mut empty = Instance::empty();
            empty.cached_fitness = Some(Fitness::worst());
            return empty;
        }

        let mut instance = self.initialize(instance_size, pool);
        let mut fit = self.evaluate(&mut instance);
        info!(
            "initial fitness {} (rho={}, hard={}) for {} vars: {}",
            fit.score,
            fit.rho,
            fit.hard,
            instance.num_variables(),
            instance
        );

        let mut best = instance.clone();
        let mut best_fitness = fit;
        let mut best_iteration = 0;

        for i in 1..=num_iterations {
            // Cancellation is only observed between iterations, so every
            // cache insert is all-or-nothing.
            if self.solver.interrupted() {
                warn!("interrupted on iteration {}", i);
                break;
            }

            let start = Instant::now();

            let mut mutated = instance.clone();
            self.mutate(&mut mutated);
            let mutated_fitness = self.evaluate(&mut mutated);

            if log_iteration(i) {
                info!(
                    "[{}/{}] fitness {} (rho={}, hard={}) for {} vars {} in {} ms",
                    i,
                    num_iterations,
                    mutated_fitness.score,
                    mutated_fitness.rho,
                    mutated_fitness.hard,
                    mutated.num_variables(),
                    mutated,
                    start.elapsed().as_millis()
                );
            }

            if mutated_fitness < best_fitness {
                best_iteration = i;
                best = mutated.clone();
                best_fitness = mutated_fitness;
            }

            // (1+1) acceptance: keep the offspring unless it is worse.
            if mutated_fitness <= fit {
                instance = mutated;
                fit = mutated_fitness;
            }
        }

        let best_vars = best.variables();
        let summary = format!(
            "Best fitness {} (rho={}, hard={}) on iteration {} with {} variables: {}",
            best_fitness.score,
            best_fitness.rho,
            best_fitness.hard,
            best_iteration,
            best_vars.len(),
            best
        );
        info!("{}", summary);

        if let Err(err) = append_line(output_path, &summary) {
            warn!("could not write {}: {}", output_path.display(), err);
        }

        info!("cache hits: {}", self.cache_hits);
        info!("cache misses: {}", self.cache_misses);

        best.cached_fitness = Some(best_fitness);
        best
    }

    /// Draw `instance_size` variables from the pool without replacement by
    /// swapping them into the slots, then drop the emptied pool positions.
    fn initialize(&mut self, instance_size: usize, pool: Vec<Var>) -> Instance {
        let mut pool: Vec<Option<Var>> = pool.into_iter().map(Some).collect();
        let mut data: Vec<Option<Var>> = vec![None; instance_size];

        let mut available = pool.len();
        for slot in data.iter_mut() {
            if available == 0 {
                break;
            }
            while slot.is_none() {
                let j = self.rng.gen_range(0..pool.len());
                if pool[j].is_some() {
                    std::mem::swap(slot, &mut pool[j]);
                }
            }
            available -= 1;
        }
        pool.retain(|entry| entry.is_some());

        Instance {
            data,
            pool,
            cached_fitness: None,
        }
    }

    /// Each slot swaps with a uniformly chosen pool position with
    /// probability 1/size. Swapping may move a None either way, which is
    /// how the effective variable count drifts.
    fn mutate(&mut self, instance: &mut Instance) {
        let size = instance.data.len();
        if size == 0 || instance.pool.is_empty() {
            return;
        }
        for i in 0..size {
            if self.rng.gen::<f64>() < 1.0 / size as f64 {
                let j = self.rng.gen_range(0..instance.pool.len());
                std::mem::swap(&mut instance.data[i], &mut instance.pool[j]);
            }
        }
    }

    /// Fitness with the global cache in front of the enumerator. The
    /// instance's own cached fitness is refreshed either way.
    fn evaluate(&mut self, instance: &mut Instance) -> Fitness {
        let key = instance.variables();
        let fit = match self.cache.get(&key) {
            Some(&cached) => {
                self.cache_hits += 1;
                cached
            }
            None => {
                self.cache_misses += 1;
                let computed = fitness_by_propagation(self.solver, &key);
                self.cache.insert(key, computed);
                computed
            }
        };
        instance.cached_fitness = Some(fit);
        fit
    }
}

/// rho = easy/2^|B|, score = 1 - rho = hard/2^|B|. An empty set scores
/// infinitely bad.
pub fn fitness_by_propagation(solver: &mut Solver, vars: &[Var]) -> Fitness {
    if vars.is_empty() {
        return Fitness::worst();
    }
    let result = solver.enumerate_hard_cubes(vars, 0);
    let num_cubes = 1u64 << vars.len();
    let rho = 1.0 - result.total as f64 / num_cubes as f64;
    Fitness {
        score: 1.0 - rho,
        rho,
        hard: result.total,
    }
}

/// First ten iterations, then logarithmically sparser.
fn log_iteration(i: usize) -> bool {
    i <= 10
        || (i < 1_000 && i % 100 == 0)
        || (i < 10_000 && i % 1_000 == 0)
        || i % 10_000 == 0
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}
