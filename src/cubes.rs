//! Enumeration of the hard cubes of a candidate backdoor.
//!
//! A *cube* is a total assignment to the backdoor variables. A cube is
//! *easy* when unit propagation from it derives a conflict, and *hard*
//! otherwise. Rather than propagating every cube from scratch, the
//! enumerator walks the binary assignment tree depth-first and keeps the
//! solver trail alive between adjacent leaves, so moving to the next cube
//! costs one backtrack to the deepest flipped position plus one propagation.

use log::trace;

use crate::{Lit, Solver, Var, CLAUSE_NONE, LBOOL_FALSE, LBOOL_TRUE};

/// Result of an enumeration: the number of hard cubes, and up to `limit`
/// of them as sign vectors over the backdoor (false = positive literal).
#[derive(Debug, Default)]
pub struct HardCubes {
    pub total: u64,
    pub cubes: Vec<Vec<bool>>,
}

#[derive(Clone, Copy)]
enum WalkState {
    Descending,
    Ascending,
    Propagating,
}

impl Solver {
    /// Propagate `assumps` one literal at a time, each at a fresh decision
    /// level, and collect everything that became assigned along the way
    /// into `prop`. Returns false iff some assumption was already false or
    /// propagation ran into a conflict; in that case the conflicting
    /// literal is appended to `prop` as well. The trail is rewound before
    /// returning.
    ///
    /// `phase_saving` temporarily overrides the solver's phase saving mode
    /// so that the rewind does not pollute saved polarities.
    pub fn prop_check(&mut self, assumps: &[Lit], prop: &mut Vec<Lit>, phase_saving: i32) -> bool {
        prop.clear();

        if !self.ok {
            return false;
        }

        let mut consistent = true;
        let level = self.decision_level();
        let mut confl = CLAUSE_NONE;

        let saved_phase_mode = self.params.phase_saving;
        self.params.phase_saving = phase_saving;

        for &p in assumps {
            if !consistent || confl != CLAUSE_NONE {
                break;
            }
            if self.lit_value(p) == LBOOL_FALSE {
                consistent = false;
            } else if self.lit_value(p) != LBOOL_TRUE {
                self.new_decision_level();
                self.unchecked_enqueue(p, CLAUSE_NONE);
                confl = self.propagate();
            }
        }

        if self.decision_level() > level {
            for c in self.trail_lim[level as usize] as usize..self.trail.len() {
                prop.push(self.trail[c]);
            }
            // On a conflict, report the conflicting literal too.
            if confl != CLAUSE_NONE {
                prop.push(self.clause_database.lit(confl, 0));
            }
            self.cancel_until(level);
        }

        self.params.phase_saving = saved_phase_mode;
        consistent && confl == CLAUSE_NONE
    }

    /// Count the hard cubes over `variables` (at most 63 of them), keeping
    /// at most `limit` of the cubes themselves.
    ///
    /// Enters and leaves at decision level 0 with the assumption stack
    /// empty. A conflicted or contradicted prefix prunes its whole subtree:
    /// every cube below it is easy.
    pub fn enumerate_hard_cubes(&mut self, variables: &[Var], limit: usize) -> HardCubes {
        assert!(variables.len() < 64);
        assert!(self.ok);
        self.cancel_until(0);

        self.assumptions.clear();
        for &v in variables {
            self.assumptions.push(Lit::positive(v));
        }

        let depth = variables.len();
        let mut cube = vec![false; depth];
        let mut out = HardCubes::default();

        if depth == 0 {
            self.assumptions.clear();
            return out;
        }

        let mut state = WalkState::Descending;

        loop {
            debug_assert!(self.decision_level() as usize <= depth);

            match state {
                WalkState::Descending => {
                    if self.decision_level() as usize == depth {
                        // Consistent leaf: propagation never refuted this
                        // cube, so it is a hard one.
                        trace!("hard cube {:?}", cube);
                        if out.cubes.len() < limit {
                            out.cubes.push(cube.clone());
                        }
                        out.total += 1;
                        state = WalkState::Ascending;
                    } else {
                        while (self.decision_level() as usize) < depth {
                            self.new_decision_level();
                            let p = self.assumptions[self.decision_level() as usize - 1];
                            if self.lit_value(p) == LBOOL_TRUE {
                                // Already implied by the prefix.
                            } else if self.lit_value(p) == LBOOL_FALSE {
                                // The prefix forces the opposite sign, so
                                // the whole subtree is easy.
                                state = WalkState::Ascending;
                                break;
                            } else {
                                self.unchecked_enqueue(p, CLAUSE_NONE);
                                state = WalkState::Propagating;
                                break;
                            }
                        }
                    }
                }

                WalkState::Ascending => {
                    debug_assert!(self.decision_level() > 0);

                    // Rightmost position still carrying a 0 sign, 1-based.
                    let mut i = self.decision_level() as usize;
                    while i > 0 && cube[i - 1] {
                        i -= 1;
                    }
                    if i == 0 {
                        break;
                    }

                    cube[i - 1] = true;
                    for s in cube.iter_mut().skip(i) {
                        *s = false;
                    }
                    for j in i..=depth {
                        self.assumptions[j - 1] = Lit::new(variables[j - 1], cube[j - 1]);
                    }

                    self.cancel_until(i as i32 - 1);
                    state = WalkState::Descending;
                }

                WalkState::Propagating => {
                    let confl = self.propagate();
                    state = if confl != CLAUSE_NONE {
                        WalkState::Ascending
                    } else {
                        WalkState::Descending
                    };
                }
            }
        }

        self.cancel_until(0);
        self.assumptions.clear();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LBOOL_UNDEF;

    fn vars(solver: &mut Solver, n: usize) -> Vec<Lit> {
        (0..n).map(|_| solver.new_var(LBOOL_UNDEF, true)).collect()
    }

    /// XOR over three variables: the four odd-parity assignments are
    /// excluded by one clause each.
    fn xor3(solver: &mut Solver) -> Vec<Lit> {
        let xs = vars(solver, 3);
        let (a, b, c) = (xs[0], xs[1], xs[2]);
        assert!(solver.add_clause([a.inverse(), b.inverse(), c.inverse()].iter().cloned()));
        assert!(solver.add_clause([a.inverse(), b, c].iter().cloned()));
        assert!(solver.add_clause([a, b.inverse(), c].iter().cloned()));
        assert!(solver.add_clause([a, b, c.inverse()].iter().cloned()));
        xs
    }

    /// Reference procedure: classify every cube independently with
    /// prop_check, restarting from scratch each time.
    fn hard_count_by_prop_check(solver: &mut Solver, variables: &[Var]) -> u64 {
        let n = variables.len();
        let mut count = 0;
        let mut prop = Vec::new();
        for bits in 0..(1u64 << n) {
            let assumps: Vec<Lit> = variables
                .iter()
                .enumerate()
                .map(|(i, &v)| Lit::new(v, bits & (1 << i) != 0))
                .collect();
            if solver.prop_check(&assumps, &mut prop, 0) {
                count += 1;
            }
            solver.cancel_until(0);
        }
        count
    }

    #[test]
    fn xor_on_all_three_variables_has_four_hard_cubes() {
        let mut solver = Solver::new();
        let xs = xor3(&mut solver);
        let b: Vec<Var> = xs.iter().map(|l| l.var()).collect();
        let result = solver.enumerate_hard_cubes(&b, 8);
        // Branching on all three variables decides the formula: exactly the
        // even-parity half of the cube space survives propagation.
        assert_eq!(result.total, 4);
        assert_eq!(result.cubes.len(), 4);
        for c in &result.cubes {
            // Sign true means the negative literal, so an even number of
            // positive assignments shows up as an odd number of signs.
            assert_eq!(c.iter().filter(|&&s| s).count() % 2, 1);
        }
    }

    #[test]
    fn enumerator_agrees_with_independent_prop_checks() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 5);
        assert!(solver.add_clause([xs[0], xs[1]].iter().cloned()));
        assert!(solver.add_clause([xs[1].inverse(), xs[2]].iter().cloned()));
        assert!(solver.add_clause([xs[2].inverse(), xs[3], xs[4].inverse()].iter().cloned()));
        assert!(solver.add_clause([xs[0].inverse(), xs[4]].iter().cloned()));

        for b in vec![
            vec![xs[0].var(), xs[1].var()],
            vec![xs[0].var(), xs[2].var(), xs[4].var()],
            vec![xs[1].var(), xs[2].var(), xs[3].var(), xs[4].var()],
        ] {
            let tree_count = solver.enumerate_hard_cubes(&b, 0).total;
            let independent_count = hard_count_by_prop_check(&mut solver, &b);
            assert_eq!(tree_count, independent_count, "backdoor {:?}", b);
        }
    }

    #[test]
    fn enumerator_leaves_solver_at_level_zero() {
        let mut solver = Solver::new();
        let xs = xor3(&mut solver);
        let b: Vec<Var> = xs.iter().map(|l| l.var()).collect();
        let _ = solver.enumerate_hard_cubes(&b, 0);
        assert_eq!(solver.decision_level(), 0);
        assert!(solver.assumptions.is_empty());
        for l in &xs {
            assert!(solver.lit_value(*l) == LBOOL_UNDEF);
        }
    }

    #[test]
    fn limit_truncates_collected_cubes_but_not_the_count() {
        // No clauses at all: every one of the 32 cubes is hard.
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 5);
        let b: Vec<Var> = xs.iter().map(|l| l.var()).collect();
        let result = solver.enumerate_hard_cubes(&b, 3);
        assert_eq!(result.total, 32);
        assert_eq!(result.cubes.len(), 3);
    }

    #[test]
    fn empty_backdoor_enumerates_nothing() {
        let mut solver = Solver::new();
        let _ = vars(&mut solver, 2);
        let result = solver.enumerate_hard_cubes(&[], 4);
        assert_eq!(result.total, 0);
        assert!(result.cubes.is_empty());
    }

    #[test]
    fn level_zero_units_prune_half_the_tree() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 2);
        assert!(solver.add_clause([xs[0]].iter().cloned()));
        let b: Vec<Var> = xs.iter().map(|l| l.var()).collect();
        let result = solver.enumerate_hard_cubes(&b, 8);
        // Cubes assigning x0 the negative sign contradict the unit clause.
        assert_eq!(result.total, 2);
        for c in &result.cubes {
            assert!(!c[0]);
        }
    }

    #[test]
    fn prop_check_reports_implied_literals() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 3);
        assert!(solver.add_clause([xs[0].inverse(), xs[1]].iter().cloned()));
        assert!(solver.add_clause([xs[1].inverse(), xs[2]].iter().cloned()));

        let mut prop = Vec::new();
        assert!(solver.prop_check(&[xs[0]], &mut prop, 0));
        assert!(prop.contains(&xs[0]));
        assert!(prop.contains(&xs[1]));
        assert!(prop.contains(&xs[2]));
        assert_eq!(solver.decision_level(), 0);

        // Assuming a literal that is directly contradicted fails.
        assert!(solver.add_clause([xs[0]].iter().cloned()));
        assert!(!solver.prop_check(&[xs[0].inverse()], &mut prop, 0));
    }
}
