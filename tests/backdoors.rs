use std::io::Cursor;

use backdoor_search::dimacs::parse_dimacs;
use backdoor_search::ea::{fitness_by_propagation, EvolutionaryAlgorithm};
use backdoor_search::{Solver, Var, LBOOL_UNDEF};

fn solver_from_dimacs(text: &str) -> Solver {
    let mut solver = Solver::new();
    parse_dimacs(Cursor::new(text), &mut solver).expect("well-formed test formula");
    solver
}

/// The pool-construction rule of the binary: all unassigned non-hole
/// variables, ascending.
fn default_pool(solver: &Solver) -> Vec<Var> {
    let occurs = solver.occurring_vars();
    (0..solver.num_vars())
        .filter(|&v| occurs[v] && solver.value(Var(v as i32)) == LBOOL_UNDEF)
        .map(|v| Var(v as i32))
        .collect()
}

#[test]
fn single_variable_backdoor_of_a_two_clause_xor() {
    // Branching on either variable, propagation completes the other one
    // without conflict, so both cubes of the 1-variable backdoor are hard.
    let mut solver = solver_from_dimacs("p cnf 2 2\n1 2 0\n-1 -2 0\n");
    assert!(solver.simplify());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backdoors.txt");

    let pool = default_pool(&solver);
    assert_eq!(pool, vec![Var(0), Var(1)]);

    let mut ea = EvolutionaryAlgorithm::new(&mut solver, 1);
    let best = ea.run(0, 1, pool, &path);
    assert_eq!(best.num_variables(), 1);
    let fit = best.fitness().unwrap();
    assert_eq!(fit.hard, 2);
    assert_eq!(fit.rho, 0.0);
    assert_eq!(fit.score, 1.0);

    let text = std::fs::read_to_string(&path).unwrap();
    let line = text.lines().next().unwrap();
    assert!(line.starts_with("Best fitness "));
    assert!(line.contains("on iteration 0 with 1 variables: ["));
}

#[test]
fn three_variable_xor_backdoor_has_four_hard_cubes() {
    let text = "p cnf 3 4\n-1 -2 -3 0\n-1 2 3 0\n1 -2 3 0\n1 2 -3 0\n";
    let mut solver = solver_from_dimacs(text);
    assert!(solver.simplify());

    let fit = fitness_by_propagation(&mut solver, &[Var(0), Var(1), Var(2)]);
    assert_eq!(fit.hard, 4);
    assert_eq!(fit.rho, 0.5);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backdoors.txt");
    let pool = default_pool(&solver);
    let mut ea = EvolutionaryAlgorithm::new(&mut solver, 42);
    let best = ea.run(10, 3, pool, &path);
    // The full variable set is the only size-3 candidate, and nothing
    // mutated below it can do better than rho = 0.5 on this formula.
    assert!(best.fitness().unwrap().score <= 0.5);
}

#[test]
fn formula_refuted_by_unit_propagation_fails_simplify() {
    let mut solver = solver_from_dimacs("p cnf 1 2\n1 0\n-1 0\n");
    assert!(!solver.simplify());
    // And the state is sticky, as the binary relies on for its exit code.
    assert!(!solver.simplify());
    assert_eq!(solver.solve().as_bool(), Some(false));
}

#[test]
fn hole_variables_stay_out_of_the_pool_and_the_backdoor() {
    // Variable 3 (0-based index 2) is declared but appears in no clause.
    let mut solver = solver_from_dimacs("p cnf 3 2\n1 2 0\n-1 -2 0\n");
    assert!(solver.simplify());

    let occurs = solver.occurring_vars();
    assert!(!occurs[2]);
    let pool = default_pool(&solver);
    assert_eq!(pool, vec![Var(0), Var(1)]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backdoors.txt");
    let mut ea = EvolutionaryAlgorithm::new(&mut solver, 7);
    for _ in 0..3 {
        let best = ea.run(25, 2, pool.clone(), &path);
        assert!(!best.variables().contains(&Var(2)));
    }
}

#[test]
fn cache_is_bounded_by_the_number_of_subsets() {
    let mut solver = solver_from_dimacs("p cnf 3 3\n1 2 0\n2 3 0\n-1 -3 0\n");
    assert!(solver.simplify());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backdoors.txt");
    let mut ea = EvolutionaryAlgorithm::new(&mut solver, 5);
    let _ = ea.run(1000, 2, vec![Var(0), Var(1), Var(2)], &path);
    // Every canonical key is a subset of a 3-variable pool.
    assert!(ea.cache_len() <= 8);
}

#[test]
fn enumerator_limit_caps_collected_cubes_only() {
    let mut solver = Solver::new();
    for _ in 0..5 {
        solver.new_var(LBOOL_UNDEF, true);
    }
    let b: Vec<Var> = (0..5).map(Var).collect();
    let result = solver.enumerate_hard_cubes(&b, 3);
    assert_eq!(result.total, 32);
    assert_eq!(result.cubes.len(), 3);
}

#[test]
fn identical_seeds_give_identical_runs() {
    let formula = "p cnf 6 7\n1 2 0\n-2 3 0\n3 4 -5 0\n-1 -4 0\n5 6 0\n-3 -6 0\n2 4 6 0\n";

    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backdoors.txt");
        let mut solver = solver_from_dimacs(formula);
        assert!(solver.simplify());
        let pool = default_pool(&solver);
        let mut ea = EvolutionaryAlgorithm::new(&mut solver, 42);
        let best = ea.run(100, 3, pool, &path);
        let line = std::fs::read_to_string(&path).unwrap();
        (best.variables(), best.fitness().unwrap().hard, line)
    };

    let (vars_a, hard_a, line_a) = run();
    let (vars_b, hard_b, line_b) = run();
    assert_eq!(vars_a, vars_b);
    assert_eq!(hard_a, hard_b);
    assert_eq!(line_a, line_b);
}

#[test]
fn each_run_appends_a_line_to_the_output_file() {
    let mut solver = solver_from_dimacs("p cnf 4 3\n1 2 0\n-2 3 0\n3 -4 0\n");
    assert!(solver.simplify());
    let pool = default_pool(&solver);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backdoors.txt");
    let mut ea = EvolutionaryAlgorithm::new(&mut solver, 9);
    for _ in 0..3 {
        let _ = ea.run(20, 2, pool.clone(), &path);
    }

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 3);
    for line in text.lines() {
        assert!(line.starts_with("Best fitness "), "bad line: {}", line);
    }
}

#[test]
fn gzip_and_plain_inputs_agree() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let text = "p cnf 3 4\n-1 -2 -3 0\n-1 2 3 0\n1 -2 3 0\n1 2 -3 0\n";
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("f.cnf");
    let gz = dir.path().join("f.cnf.gz");
    std::fs::write(&plain, text).unwrap();
    {
        let file = std::fs::File::create(&gz).unwrap();
        let mut enc = GzEncoder::new(file, Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap();
    }

    let mut s1 = Solver::new();
    let mut s2 = Solver::new();
    backdoor_search::dimacs::parse_dimacs_file(&plain, &mut s1).unwrap();
    backdoor_search::dimacs::parse_dimacs_file(&gz, &mut s2).unwrap();
    assert_eq!(s1.num_vars(), s2.num_vars());
    assert_eq!(s1.num_clauses(), s2.num_clauses());

    let f1 = fitness_by_propagation(&mut s1, &[Var(0), Var(1), Var(2)]);
    let f2 = fitness_by_propagation(&mut s2, &[Var(0), Var(1), Var(2)]);
    assert_eq!(f1.hard, f2.hard);
}
