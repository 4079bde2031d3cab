//! A CDCL propagation core and the machinery built on top of it for finding
//! rho-backdoors: small sets of variables whose assignment space is mostly
//! closed under unit propagation.
//!
//! The solver keeps the classic MiniSat shape: a relocatable clause arena,
//! two-watched-literal propagation, first-UIP learning with deep clause
//! minimization, Luby restarts and activity-driven branching. On top of it,
//! `cubes` walks the 2^|B| assignment tree of a candidate backdoor reusing
//! the solver trail between leaves, and `ea` runs the (1+1) evolutionary
//! search over candidate variable sets.

use bitfield::bitfield;
use log::{debug, info, trace};

pub mod dimacs;
pub mod ea;

mod cubes;
pub use cubes::HardCubes;

// ------
// Variables and literals
// ------

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(pub i32);

pub const VAR_UNDEF: Var = Var(-1);

impl Var {
    pub fn idx(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A literal; `2*var + sign`, so that a literal and its negation are
/// adjacent and usable as array indices.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lit(pub i32);

pub const LIT_UNDEF: Lit = Lit(-2);

impl Lit {
    pub fn new(Var(var): Var, negated: bool) -> Lit {
        Lit(2 * var + negated as i32)
    }

    pub fn positive(var: Var) -> Lit {
        Lit::new(var, false)
    }

    pub fn sign(&self) -> bool {
        (self.0 & 1) != 0
    }

    pub fn var(&self) -> Var {
        Var(self.0 >> 1)
    }

    pub fn inverse(&self) -> Lit {
        Lit(self.0 ^ 1)
    }

    fn code(&self) -> usize {
        self.0 as usize
    }
}

// ------
// Lifted booleans
// ------

/// Three-valued assignment value. The two representations of "undefined"
/// (2 and 3) compare equal; defined values compare by identity.
#[derive(Debug, Copy, Clone)]
pub struct LBool(u8);

pub const LBOOL_TRUE: LBool = LBool(0);
pub const LBOOL_FALSE: LBool = LBool(1);
pub const LBOOL_UNDEF: LBool = LBool(2);

impl PartialEq for LBool {
    fn eq(&self, rhs: &LBool) -> bool {
        ((rhs.0 & 2) & (self.0 & 2)) != 0 || (((rhs.0 & 2) == 0) && rhs.0 == self.0)
    }
}

impl LBool {
    fn xor(&self, b: bool) -> LBool {
        LBool(self.0 ^ (b as u8))
    }

    fn from_bool(b: bool) -> LBool {
        LBool(b as u8)
    }

    pub fn as_bool(&self) -> Option<bool> {
        if *self == LBOOL_TRUE {
            Some(true)
        } else if *self == LBOOL_FALSE {
            Some(false)
        } else {
            None
        }
    }
}

impl Default for LBool {
    fn default() -> Self {
        LBOOL_UNDEF
    }
}

// ------
// Clause arena
// ------

bitfield! {
    struct ClauseHeader(u32);
    impl Debug;
    u32;
    get_mark, set_mark: 1, 0;
    get_learnt, set_learnt: 2;
    get_has_extra, set_has_extra: 3;
    get_reloced, set_reloced: 4;
    get_size, set_size: 31, 5;
}

/// Word offset of a clause in the arena. Stable across everything except
/// garbage collection, which rewrites every held reference through
/// `relocate_clause`.
pub type ClauseRef = i32;
pub const CLAUSE_NONE: ClauseRef = -1;

/// Contiguous storage for all clauses: for each clause one header word,
/// `size` literal words, and one extra word holding the floating activity
/// (learnt clauses) or the variable-abstraction bitmask (problem clauses).
struct ClauseDatabase {
    words: Vec<u32>,
    wasted: u32,
}

impl ClauseDatabase {
    fn new() -> Self {
        ClauseDatabase {
            words: Vec::new(),
            wasted: 0,
        }
    }

    fn header(&self, cref: ClauseRef) -> ClauseHeader {
        ClauseHeader(self.words[cref as usize])
    }

    fn set_header(&mut self, cref: ClauseRef, header: ClauseHeader) {
        self.words[cref as usize] = header.0;
    }

    fn size(&self, cref: ClauseRef) -> usize {
        self.header(cref).get_size() as usize
    }

    fn lit(&self, cref: ClauseRef, i: usize) -> Lit {
        debug_assert!(i < self.size(cref));
        Lit(self.words[cref as usize + 1 + i] as i32)
    }

    fn set_lit(&mut self, cref: ClauseRef, i: usize, l: Lit) {
        debug_assert!(i < self.size(cref));
        self.words[cref as usize + 1 + i] = l.0 as u32;
    }

    fn swap_lits(&mut self, cref: ClauseRef, i: usize, j: usize) {
        self.words
            .swap(cref as usize + 1 + i, cref as usize + 1 + j);
    }

    fn extra_addr(&self, cref: ClauseRef) -> usize {
        cref as usize + 1 + self.size(cref)
    }

    fn activity(&self, cref: ClauseRef) -> f32 {
        debug_assert!(self.header(cref).get_learnt());
        f32::from_bits(self.words[self.extra_addr(cref)])
    }

    fn set_activity(&mut self, cref: ClauseRef, act: f32) {
        debug_assert!(self.header(cref).get_learnt());
        let addr = self.extra_addr(cref);
        self.words[addr] = act.to_bits();
    }

    #[allow(dead_code)] // kept for subsumption-style fast rejects; exercised in tests
    fn abstraction(&self, cref: ClauseRef) -> u32 {
        debug_assert!(!self.header(cref).get_learnt());
        self.words[self.extra_addr(cref)]
    }

    fn alloc(&mut self, lits: &[Lit], learnt: bool) -> ClauseRef {
        let mut header = ClauseHeader(0);
        header.set_size(lits.len() as u32);
        header.set_learnt(learnt);
        header.set_has_extra(true);

        let cref = self.words.len() as ClauseRef;
        self.words.push(header.0);
        for l in lits {
            self.words.push(l.0 as u32);
        }
        if learnt {
            self.words.push(0f32.to_bits());
        } else {
            let mut abstraction = 0u32;
            for l in lits {
                abstraction |= 1 << (l.var().0 & 31);
            }
            self.words.push(abstraction);
        }
        cref
    }

    fn free(&mut self, cref: ClauseRef) {
        let header = self.header(cref);
        self.wasted += 1 + header.get_size() + header.get_has_extra() as u32;
    }

    /// Shrink a clause in place; the extra word moves down to the new end.
    fn update_size(&mut self, cref: ClauseRef, new_size: usize) {
        let old_size = self.size(cref);
        debug_assert!(new_size >= 2 && new_size <= old_size);
        let mut header = self.header(cref);
        if header.get_has_extra() {
            self.words[cref as usize + 1 + new_size] = self.words[cref as usize + 1 + old_size];
        }
        header.set_size(new_size as u32);
        self.set_header(cref, header);
        self.wasted += (old_size - new_size) as u32;
    }

    /// Copy the clause into `new_words` once; later calls read the
    /// forwarding offset stored where the first literal used to be.
    fn relocate_clause(&mut self, cref: ClauseRef, new_words: &mut Vec<u32>) -> ClauseRef {
        let header = self.header(cref);
        if header.get_reloced() {
            return self.words[cref as usize + 1] as ClauseRef;
        }

        let len = 1 + header.get_size() as usize + header.get_has_extra() as usize;
        let new_cref = new_words.len() as ClauseRef;
        new_words.extend_from_slice(&self.words[cref as usize..cref as usize + len]);

        let mut old_header = header;
        old_header.set_reloced(true);
        self.set_header(cref, old_header);
        self.words[cref as usize + 1] = new_cref as u32;

        new_cref
    }
}

// ------
// Watches
// ------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Watcher {
    cref: ClauseRef,
    blocker: Lit,
}

// ------
// Decision order
// ------

/// Max-heap over decision variables keyed by activity, with an index map
/// for O(log n) increase-key. Equal activities order by variable index.
struct OrderHeap {
    heap: Vec<Var>,
    indices: Vec<i32>,
}

fn heap_before(x: Var, y: Var, act: &[f64]) -> bool {
    act[x.idx()] > act[y.idx()] || (act[x.idx()] == act[y.idx()] && x.0 < y.0)
}

impl OrderHeap {
    fn new() -> Self {
        OrderHeap {
            heap: Vec::new(),
            indices: Vec::new(),
        }
    }

    fn build(&mut self, vars: &[Var], act: &[f64]) {
        for i in 0..self.heap.len() {
            self.indices[self.heap[i].idx()] = -1;
        }
        self.heap.clear();

        for (i, v) in vars.iter().enumerate() {
            self.indices[v.idx()] = i as i32;
            self.heap.push(*v);
        }

        if self.heap.len() > 1 {
            let mut i = (self.heap.len() / 2 - 1) as i32;
            while i >= 0 {
                self.percolate_down(i, act);
                i -= 1;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn left(i: i32) -> i32 {
        i * 2 + 1
    }
    fn right(i: i32) -> i32 {
        (i + 1) * 2
    }
    fn parent(i: i32) -> i32 {
        (i - 1) >> 1
    }

    fn percolate_up(&mut self, mut i: i32, act: &[f64]) {
        let var = self.heap[i as usize];
        let mut p = Self::parent(i);
        while i != 0 && heap_before(var, self.heap[p as usize], act) {
            self.heap[i as usize] = self.heap[p as usize];
            self.indices[self.heap[p as usize].idx()] = i;
            i = p;
            p = Self::parent(p);
        }
        self.heap[i as usize] = var;
        self.indices[var.idx()] = i;
    }

    fn percolate_down(&mut self, mut i: i32, act: &[f64]) {
        let var = self.heap[i as usize];
        while (Self::left(i) as usize) < self.heap.len() {
            let child = if (Self::right(i) as usize) < self.heap.len()
                && heap_before(
                    self.heap[Self::right(i) as usize],
                    self.heap[Self::left(i) as usize],
                    act,
                ) {
                Self::right(i)
            } else {
                Self::left(i)
            };

            if !heap_before(self.heap[child as usize], var, act) {
                break;
            }

            self.heap[i as usize] = self.heap[child as usize];
            self.indices[self.heap[i as usize].idx()] = i;
            i = child;
        }
        self.heap[i as usize] = var;
        self.indices[var.idx()] = i;
    }

    fn contains(&self, var: Var) -> bool {
        var.idx() < self.indices.len() && self.indices[var.idx()] >= 0
    }

    fn decrease(&mut self, key: Var, act: &[f64]) {
        debug_assert!(self.contains(key));
        self.percolate_up(self.indices[key.idx()], act);
    }

    fn insert(&mut self, key: Var, act: &[f64]) {
        self.indices
            .resize((key.idx() + 1).max(self.indices.len()), -1);
        debug_assert!(!self.contains(key));
        self.indices[key.idx()] = self.heap.len() as i32;
        self.heap.push(key);
        self.percolate_up(self.indices[key.idx()], act);
    }

    fn remove_min(&mut self, act: &[f64]) -> Var {
        let var = self.heap[0];
        let last = self.heap[self.heap.len() - 1];
        self.heap[0] = last;
        self.indices[last.idx()] = 0;
        self.indices[var.idx()] = -1;
        self.heap.pop();
        if self.heap.len() > 1 {
            self.percolate_down(0, act);
        }
        var
    }
}

// ------
// Solver
// ------

#[derive(Copy, Clone)]
struct VariableData {
    reason: ClauseRef,
    level: i32,
}

impl Default for VariableData {
    fn default() -> Self {
        VariableData {
            reason: CLAUSE_NONE,
            level: 0,
        }
    }
}

pub struct SolverParams {
    pub var_decay: f64,
    pub clause_decay: f64,
    pub random_var_freq: f64,
    pub random_seed: f64,
    pub luby_restart: bool,
    pub ccmin_mode: i32,
    pub phase_saving: i32,
    pub rnd_pol: bool,
    pub rnd_init_act: bool,
    pub garbage_frac: f64,
    pub min_learnts_lim: u32,
    pub restart_first: u32,
    pub restart_inc: f64,
    pub learntsize_factor: f64,
    pub learntsize_inc: f64,
    pub learntsize_adjust_start_confl: i32,
    pub learntsize_adjust_inc: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            var_decay: 0.95,
            clause_decay: 0.999,
            random_var_freq: 0.0,
            random_seed: 91648253.0,
            luby_restart: true,
            ccmin_mode: 2,
            phase_saving: 2,
            rnd_pol: false,
            rnd_init_act: false,
            garbage_frac: 0.20,
            min_learnts_lim: 0,
            restart_first: 100,
            restart_inc: 2.0,
            learntsize_factor: 1.0 / 3.0,
            learntsize_inc: 1.1,
            learntsize_adjust_start_confl: 100,
            learntsize_adjust_inc: 1.5,
        }
    }
}

#[derive(Default)]
pub struct SolverStatistics {
    pub solves: usize,
    pub starts: usize,
    pub decisions: usize,
    pub rnd_decisions: usize,
    pub propagations: usize,
    pub conflicts: usize,
    pub dec_vars: usize,
    pub num_clauses: usize,
    pub num_learnts: usize,
    pub clauses_literals: usize,
    pub learnts_literals: usize,
    pub max_literals: usize,
    pub tot_literals: usize,
}

pub struct Solver {
    pub verbosity: u32,
    // Extra results (read-only for consumers)
    pub model: Vec<LBool>,
    pub conflict: Vec<Lit>,

    pub params: SolverParams,
    pub stats: SolverStatistics,

    clause_database: ClauseDatabase,
    clauses: Vec<ClauseRef>,
    learnts: Vec<ClauseRef>,

    pub(crate) trail: Vec<Lit>,
    pub(crate) trail_lim: Vec<i32>,
    pub(crate) assumptions: Vec<Lit>,

    activity: Vec<f64>,
    assigns: Vec<LBool>,
    polarity: Vec<i8>,
    user_pol: Vec<LBool>,
    decision: Vec<i8>,
    vardata: Vec<VariableData>,

    watch_occs: Vec<Vec<Watcher>>,
    watch_dirty: Vec<i8>,
    watch_dirties: Vec<Lit>,

    order_heap: OrderHeap,

    pub(crate) ok: bool,
    cla_inc: f64,
    var_inc: f64,
    qhead: usize,

    simp_db_assigns: i32,
    simp_db_props: i64,
    remove_satisfied: bool,
    next_var: i32,

    seen: Vec<i8>,
    analyze_stack: Vec<Lit>,
    analyze_toclear: Vec<Lit>,
    add_tmp: Vec<Lit>,

    max_learnts: f64,
    learntsize_adjust_confl: f64,
    learntsize_adjust_cnt: i32,

    conflict_budget: i64,
    propagation_budget: i64,
    asynch_interrupt: bool,
}

impl Default for Solver {
    fn default() -> Self {
        Solver::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Solver::with_params(SolverParams::default())
    }

    pub fn with_params(params: SolverParams) -> Self {
        Solver {
            verbosity: 1,
            model: Vec::new(),
            conflict: Vec::new(),
            params,
            stats: Default::default(),

            clause_database: ClauseDatabase::new(),
            clauses: Vec::new(),
            learnts: Vec::new(),

            trail: Vec::new(),
            trail_lim: Vec::new(),
            assumptions: Vec::new(),

            activity: Vec::new(),
            assigns: Vec::new(),
            polarity: Vec::new(),
            user_pol: Vec::new(),
            decision: Vec::new(),
            vardata: Vec::new(),

            watch_occs: Vec::new(),
            watch_dirty: Vec::new(),
            watch_dirties: Vec::new(),

            order_heap: OrderHeap::new(),

            ok: true,
            cla_inc: 1.0,
            var_inc: 1.0,
            qhead: 0,

            simp_db_assigns: -1,
            simp_db_props: 0,
            remove_satisfied: true,
            next_var: 0,

            seen: Vec::new(),
            analyze_stack: Vec::new(),
            analyze_toclear: Vec::new(),
            add_tmp: Vec::new(),

            max_learnts: 0.0,
            learntsize_adjust_confl: 0.0,
            learntsize_adjust_cnt: 0,

            conflict_budget: -1,
            propagation_budget: -1,
            asynch_interrupt: false,
        }
    }

    pub fn num_vars(&self) -> usize {
        self.next_var as usize
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn num_learnts(&self) -> usize {
        self.learnts.len()
    }

    pub fn num_assigns(&self) -> usize {
        self.trail.len()
    }

    pub fn new_var(&mut self, user_pol: LBool, decision_var: bool) -> Lit {
        let var = Var(self.next_var);
        self.next_var += 1;

        self.watch_occs.push(Vec::new());
        self.watch_occs.push(Vec::new());
        self.watch_dirty.push(0);
        self.watch_dirty.push(0);

        self.assigns.push(LBOOL_UNDEF);
        self.vardata.push(VariableData::default());
        self.activity.push(if self.params.rnd_init_act {
            drand(&mut self.params.random_seed) * 0.00001
        } else {
            0.0
        });
        self.seen.push(0);
        self.polarity.push(1);
        self.user_pol.push(user_pol);
        self.decision.push(0);
        self.set_decision_var(var, decision_var);

        Lit::new(var, false)
    }

    fn set_decision_var(&mut self, var: Var, b: bool) {
        if b && self.decision[var.idx()] == 0 {
            self.stats.dec_vars += 1;
        }
        if !b && self.decision[var.idx()] != 0 {
            self.stats.dec_vars -= 1;
        }
        self.decision[var.idx()] = b as i8;
        self.insert_var_order(var);
    }

    fn insert_var_order(&mut self, var: Var) {
        if !self.order_heap.contains(var) && self.decision[var.idx()] == 1 {
            self.order_heap.insert(var, &self.activity);
        }
    }

    // ------
    // Activity bookkeeping
    // ------

    fn var_decay_activity(&mut self) {
        self.var_inc *= 1.0 / self.params.var_decay;
    }

    fn var_bump_activity(&mut self, var: Var) {
        self.activity[var.idx()] += self.var_inc;
        if self.activity[var.idx()] > 1e100 {
            for act in self.activity.iter_mut() {
                *act *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }
        if self.order_heap.contains(var) {
            self.order_heap.decrease(var, &self.activity);
        }
    }

    fn clause_decay_activity(&mut self) {
        self.cla_inc *= 1.0 / self.params.clause_decay;
    }

    fn clause_bump_activity(&mut self, cref: ClauseRef) {
        let act = self.clause_database.activity(cref) + self.cla_inc as f32;
        self.clause_database.set_activity(cref, act);
        if act > 1e20 {
            for i in 0..self.learnts.len() {
                let c = self.learnts[i];
                let a = self.clause_database.activity(c);
                self.clause_database.set_activity(c, a * 1e-20);
            }
            self.cla_inc *= 1e-20;
        }
    }

    // ------
    // Assignment access
    // ------

    pub fn value(&self, var: Var) -> LBool {
        self.assigns[var.idx()]
    }

    pub fn lit_value(&self, lit: Lit) -> LBool {
        Self::assigns_lit_value(&self.assigns, lit)
    }

    fn assigns_lit_value(assigns: &[LBool], lit: Lit) -> LBool {
        assigns[lit.var().idx()].xor(lit.sign())
    }

    pub fn level(&self, var: Var) -> i32 {
        self.vardata[var.idx()].level
    }

    pub fn reason(&self, var: Var) -> ClauseRef {
        self.vardata[var.idx()].reason
    }

    pub(crate) fn decision_level(&self) -> i32 {
        self.trail_lim.len() as i32
    }

    pub(crate) fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len() as i32);
    }

    /// Variables that occur in at least one problem clause. Variables absent
    /// from every clause ("holes") are excluded from backdoor pools.
    pub fn occurring_vars(&self) -> Vec<bool> {
        let mut occurs = vec![false; self.num_vars()];
        for &cref in &self.clauses {
            for k in 0..self.clause_database.size(cref) {
                occurs[self.clause_database.lit(cref, k).var().idx()] = true;
            }
        }
        occurs
    }

    // ------
    // Clause management
    // ------

    /// Add a problem clause at decision level 0. Returns false iff the
    /// formula has become permanently unsatisfiable.
    pub fn add_clause(&mut self, lits: impl IntoIterator<Item = Lit>) -> bool {
        debug_assert!(self.decision_level() == 0);
        if !self.ok {
            return false;
        }

        self.add_tmp.clear();
        self.add_tmp.extend(lits);
        // Size 1 is trivially sorted and size 2 is good enough for the
        // dedup scan below; everything larger gets a real sort.
        if self.add_tmp.len() > 2 {
            self.add_tmp.sort();
        }

        let mut prev = LIT_UNDEF;
        let mut j = 0;
        for i in 0..self.add_tmp.len() {
            let l = self.add_tmp[i];
            let v = Self::assigns_lit_value(&self.assigns, l);
            if v == LBOOL_TRUE || l == prev.inverse() {
                return true;
            }
            if v != LBOOL_FALSE && l != prev {
                prev = l;
                self.add_tmp[j] = l;
                j += 1;
            }
        }
        self.add_tmp.truncate(j);

        match self.add_tmp.len() {
            0 => {
                self.ok = false;
                false
            }
            1 => {
                let unit = self.add_tmp[0];
                self.unchecked_enqueue(unit, CLAUSE_NONE);
                self.ok = self.propagate() == CLAUSE_NONE;
                self.ok
            }
            _ => {
                let cref = self.clause_database.alloc(&self.add_tmp, false);
                self.clauses.push(cref);
                self.attach_clause(cref);
                true
            }
        }
    }

    fn attach_clause(&mut self, cref: ClauseRef) {
        let size = self.clause_database.size(cref);
        debug_assert!(size > 1);
        let c0 = self.clause_database.lit(cref, 0);
        let c1 = self.clause_database.lit(cref, 1);

        self.watch_occs[c0.inverse().code()].push(Watcher { cref, blocker: c1 });
        self.watch_occs[c1.inverse().code()].push(Watcher { cref, blocker: c0 });

        if self.clause_database.header(cref).get_learnt() {
            self.stats.num_learnts += 1;
            self.stats.learnts_literals += size;
        } else {
            self.stats.num_clauses += 1;
            self.stats.clauses_literals += size;
        }
    }

    fn detach_clause(&mut self, cref: ClauseRef, strict: bool) {
        let size = self.clause_database.size(cref);
        debug_assert!(size > 1);
        let c0 = self.clause_database.lit(cref, 0);
        let c1 = self.clause_database.lit(cref, 1);

        if strict {
            self.watch_occs[c0.inverse().code()].retain(|w| w.cref != cref);
            self.watch_occs[c1.inverse().code()].retain(|w| w.cref != cref);
        } else {
            // Lazy detach; the lists are compacted on the next propagation
            // over them, or by clean_all_watches before relocation.
            self.smudge_watch(c0.inverse());
            self.smudge_watch(c1.inverse());
        }

        if self.clause_database.header(cref).get_learnt() {
            self.stats.num_learnts -= 1;
            self.stats.learnts_literals -= size;
        } else {
            self.stats.num_clauses -= 1;
            self.stats.clauses_literals -= size;
        }
    }

    fn smudge_watch(&mut self, lit: Lit) {
        if self.watch_dirty[lit.code()] == 0 {
            self.watch_dirty[lit.code()] = 1;
            self.watch_dirties.push(lit);
        }
    }

    fn remove_clause(&mut self, cref: ClauseRef) {
        self.detach_clause(cref, false);
        if self.is_clause_locked(cref) {
            self.vardata[self.clause_database.lit(cref, 0).var().idx()].reason = CLAUSE_NONE;
        }
        let mut header = self.clause_database.header(cref);
        header.set_mark(1);
        self.clause_database.set_header(cref, header);
        self.clause_database.free(cref);
    }

    fn is_clause_locked(&self, cref: ClauseRef) -> bool {
        let first = self.clause_database.lit(cref, 0);
        self.lit_value(first) == LBOOL_TRUE && self.vardata[first.var().idx()].reason == cref
    }

    fn assigns_satisfied(&self, cref: ClauseRef) -> bool {
        (0..self.clause_database.size(cref))
            .any(|k| self.lit_value(self.clause_database.lit(cref, k)) == LBOOL_TRUE)
    }

    // ------
    // Trail
    // ------

    pub(crate) fn unchecked_enqueue(&mut self, lit: Lit, reason: ClauseRef) {
        debug_assert!(self.lit_value(lit) == LBOOL_UNDEF);
        self.assigns[lit.var().idx()] = LBool::from_bool(lit.sign());
        self.vardata[lit.var().idx()] = VariableData {
            reason,
            level: self.decision_level(),
        };
        self.trail.push(lit);
    }

    /// Rewind to `level`, keeping assignments at `level` but nothing beyond.
    pub(crate) fn cancel_until(&mut self, level: i32) {
        if self.decision_level() <= level {
            return;
        }
        trace!("cancel to level {}", level);
        let keep = self.trail_lim[level as usize] as usize;
        let mut c = self.trail.len();
        while c > keep {
            c -= 1;
            let x = self.trail[c];
            self.assigns[x.var().idx()] = LBOOL_UNDEF;
            if self.params.phase_saving > 1
                || (self.params.phase_saving == 1 && c as i32 > *self.trail_lim.last().unwrap())
            {
                self.polarity[x.var().idx()] = x.sign() as i8;
            }
            self.insert_var_order(x.var());
        }
        self.qhead = keep;
        self.trail.truncate(keep);
        self.trail_lim.truncate(level as usize);
    }

    // ------
    // Propagation
    // ------

    /// Propagate all enqueued facts. Returns the conflicting clause, or
    /// CLAUSE_NONE. The propagation queue is empty afterwards either way.
    pub(crate) fn propagate(&mut self) -> ClauseRef {
        let mut confl = CLAUSE_NONE;
        let mut num_props = 0usize;

        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            self.clean_watch(p);
            num_props += 1;

            let p_code = p.code();
            let false_lit = p.inverse();
            let (mut i, mut j) = (0, 0);
            'watchers: while i < self.watch_occs[p_code].len() {
                let Watcher { cref, blocker } = self.watch_occs[p_code][i];

                // Try to avoid inspecting the clause.
                if Self::assigns_lit_value(&self.assigns, blocker) == LBOOL_TRUE {
                    self.watch_occs[p_code][j] = Watcher { cref, blocker };
                    i += 1;
                    j += 1;
                    continue;
                }

                // Make sure the false literal is at slot 1.
                if self.clause_database.lit(cref, 0) == false_lit {
                    self.clause_database.swap_lits(cref, 0, 1);
                }
                debug_assert!(self.clause_database.lit(cref, 1) == false_lit);
                i += 1;

                // If the 0th watch is true, the clause is already satisfied.
                let first = self.clause_database.lit(cref, 0);
                let w = Watcher {
                    cref,
                    blocker: first,
                };
                if first != blocker && Self::assigns_lit_value(&self.assigns, first) == LBOOL_TRUE
                {
                    self.watch_occs[p_code][j] = w;
                    j += 1;
                    continue;
                }

                // Look for a new literal to watch.
                let size = self.clause_database.size(cref);
                for k in 2..size {
                    let lk = self.clause_database.lit(cref, k);
                    if Self::assigns_lit_value(&self.assigns, lk) != LBOOL_FALSE {
                        self.clause_database.set_lit(cref, 1, lk);
                        self.clause_database.set_lit(cref, k, false_lit);
                        self.watch_occs[lk.inverse().code()].push(w);
                        continue 'watchers;
                    }
                }

                // No new watch found; the clause is unit under assignment.
                self.watch_occs[p_code][j] = w;
                j += 1;
                if Self::assigns_lit_value(&self.assigns, first) == LBOOL_FALSE {
                    trace!("conflict in clause {}", cref);
                    confl = cref;
                    self.qhead = self.trail.len();
                    // Copy the remaining watches so the list stays intact.
                    while i < self.watch_occs[p_code].len() {
                        let rest = self.watch_occs[p_code][i];
                        self.watch_occs[p_code][j] = rest;
                        i += 1;
                        j += 1;
                    }
                } else {
                    self.unchecked_enqueue(first, cref);
                }
            }
            self.watch_occs[p_code].truncate(j);
        }

        self.stats.propagations += num_props;
        self.simp_db_props -= num_props as i64;
        confl
    }

    fn clean_all_watches(&mut self) {
        let dirties = std::mem::take(&mut self.watch_dirties);
        for l in dirties {
            self.clean_watch(l);
        }
    }

    fn clean_watch(&mut self, lit: Lit) {
        if self.watch_dirty[lit.code()] == 0 {
            return;
        }
        let db = &self.clause_database;
        self.watch_occs[lit.code()].retain(|w| db.header(w.cref).get_mark() != 1);
        self.watch_dirty[lit.code()] = 0;
    }

    // ------
    // Conflict analysis
    // ------

    /// Analyze a conflict and produce a learnt clause.
    ///
    /// Pre: `out_learnt` is empty and the decision level is above 0.
    /// Post: `out_learnt[0]` is the asserting literal at the returned
    /// backtrack level; if there is more than one literal, `out_learnt[1]`
    /// has the greatest decision level of the rest.
    fn analyze(&mut self, mut confl: ClauseRef, out_learnt: &mut Vec<Lit>) -> i32 {
        let mut path_c = 0;
        let mut p = LIT_UNDEF;
        out_learnt.push(LIT_UNDEF); // leave room for the asserting literal
        let mut index = self.trail.len();

        loop {
            debug_assert!(confl != CLAUSE_NONE); // otherwise p should be the UIP
            if self.clause_database.header(confl).get_learnt() {
                self.clause_bump_activity(confl);
            }

            let start = if p == LIT_UNDEF { 0 } else { 1 };
            for k in start..self.clause_database.size(confl) {
                let q = self.clause_database.lit(confl, k);
                let v = q.var();
                if self.seen[v.idx()] == 0 && self.vardata[v.idx()].level > 0 {
                    self.var_bump_activity(v);
                    self.seen[v.idx()] = 1;
                    if self.vardata[v.idx()].level >= self.decision_level() {
                        path_c += 1;
                    } else {
                        out_learnt.push(q);
                    }
                }
            }

            // Select the next marked literal on the trail.
            loop {
                index -= 1;
                if self.seen[self.trail[index].var().idx()] != 0 {
                    break;
                }
            }
            p = self.trail[index];
            confl = self.vardata[p.var().idx()].reason;
            self.seen[p.var().idx()] = 0;
            path_c -= 1;

            if path_c <= 0 {
                break;
            }
        }
        out_learnt[0] = p.inverse();

        // Minimize the learnt clause.
        self.analyze_toclear.clear();
        self.analyze_toclear.extend_from_slice(out_learnt);
        self.stats.max_literals += out_learnt.len();

        match self.params.ccmin_mode {
            2 => {
                let mut abstract_levels = 0u32;
                for l in out_learnt.iter().skip(1) {
                    abstract_levels |= self.abstract_level(l.var());
                }

                let mut j = 1;
                for i in 1..out_learnt.len() {
                    let l = out_learnt[i];
                    if self.vardata[l.var().idx()].reason == CLAUSE_NONE
                        || !self.lit_redundant(l, abstract_levels)
                    {
                        out_learnt[j] = l;
                        j += 1;
                    }
                }
                out_learnt.truncate(j);
            }
            1 => {
                let mut j = 1;
                for i in 1..out_learnt.len() {
                    let l = out_learnt[i];
                    let reason = self.vardata[l.var().idx()].reason;
                    let keep = if reason == CLAUSE_NONE {
                        true
                    } else {
                        (1..self.clause_database.size(reason)).any(|k| {
                            let q = self.clause_database.lit(reason, k);
                            self.seen[q.var().idx()] == 0 && self.vardata[q.var().idx()].level > 0
                        })
                    };
                    if keep {
                        out_learnt[j] = l;
                        j += 1;
                    }
                }
                out_learnt.truncate(j);
            }
            _ => {}
        }
        self.stats.tot_literals += out_learnt.len();

        // Find the correct backtrack level.
        let out_level = if out_learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            for i in 2..out_learnt.len() {
                if self.vardata[out_learnt[i].var().idx()].level
                    > self.vardata[out_learnt[max_i].var().idx()].level
                {
                    max_i = i;
                }
            }
            out_learnt.swap(1, max_i);
            self.vardata[out_learnt[1].var().idx()].level
        };

        for i in 0..self.analyze_toclear.len() {
            let v = self.analyze_toclear[i].var();
            self.seen[v.idx()] = 0;
        }

        trace!("learnt {:?} -> level {}", out_learnt, out_level);
        out_level
    }

    fn abstract_level(&self, var: Var) -> u32 {
        1 << (self.vardata[var.idx()].level & 31)
    }

    /// Check whether `p` is implied by literals already in the learnt
    /// clause. `abstract_levels` aborts the walk early when it reaches a
    /// decision level the learnt clause does not touch.
    fn lit_redundant(&mut self, p: Lit, abstract_levels: u32) -> bool {
        self.analyze_stack.clear();
        self.analyze_stack.push(p);
        let top = self.analyze_toclear.len();

        while let Some(q) = self.analyze_stack.pop() {
            let reason = self.vardata[q.var().idx()].reason;
            debug_assert!(reason != CLAUSE_NONE);

            for k in 1..self.clause_database.size(reason) {
                let l = self.clause_database.lit(reason, k);
                if self.seen[l.var().idx()] != 0 || self.vardata[l.var().idx()].level == 0 {
                    continue;
                }
                if self.vardata[l.var().idx()].reason != CLAUSE_NONE
                    && (self.abstract_level(l.var()) & abstract_levels) != 0
                {
                    self.seen[l.var().idx()] = 1;
                    self.analyze_stack.push(l);
                    self.analyze_toclear.push(l);
                } else {
                    for t in top..self.analyze_toclear.len() {
                        let v = self.analyze_toclear[t].var();
                        self.seen[v.idx()] = 0;
                    }
                    self.analyze_toclear.truncate(top);
                    return false;
                }
            }
        }
        true
    }

    /// Express the final conflict in terms of assumptions: collect the
    /// (possibly empty) set of assumptions that forced `p`.
    fn analyze_final(&mut self, p: Lit) {
        self.conflict.clear();
        self.conflict.push(p);

        if self.decision_level() == 0 {
            return;
        }

        self.seen[p.var().idx()] = 1;

        let mut i = self.trail.len();
        while i > self.trail_lim[0] as usize {
            i -= 1;
            let x = self.trail[i].var();
            if self.seen[x.idx()] == 0 {
                continue;
            }
            let reason = self.vardata[x.idx()].reason;
            if reason == CLAUSE_NONE {
                debug_assert!(self.vardata[x.idx()].level > 0);
                self.conflict.push(self.trail[i].inverse());
            } else {
                for k in 1..self.clause_database.size(reason) {
                    let q = self.clause_database.lit(reason, k);
                    if self.vardata[q.var().idx()].level > 0 {
                        self.seen[q.var().idx()] = 1;
                    }
                }
            }
            self.seen[x.idx()] = 0;
        }

        self.seen[p.var().idx()] = 0;
    }

    // ------
    // Branching
    // ------

    fn pick_branch_lit(&mut self) -> Lit {
        let mut next = VAR_UNDEF;

        // Random decision.
        if drand(&mut self.params.random_seed) < self.params.random_var_freq
            && !self.order_heap.is_empty()
        {
            let i = irand(&mut self.params.random_seed, self.order_heap.len() as i32);
            next = self.order_heap.heap[i as usize];
            if self.value(next) == LBOOL_UNDEF && self.decision[next.idx()] == 1 {
                self.stats.rnd_decisions += 1;
            }
        }

        // Activity-based decision.
        while next == VAR_UNDEF || self.value(next) != LBOOL_UNDEF || self.decision[next.idx()] == 0
        {
            if self.order_heap.is_empty() {
                next = VAR_UNDEF;
                break;
            }
            next = self.order_heap.remove_min(&self.activity);
        }

        // Polarity.
        if next == VAR_UNDEF {
            LIT_UNDEF
        } else if self.user_pol[next.idx()] != LBOOL_UNDEF {
            Lit::new(next, self.user_pol[next.idx()] == LBOOL_TRUE)
        } else if self.params.rnd_pol {
            Lit::new(next, drand(&mut self.params.random_seed) < 0.5)
        } else {
            Lit::new(next, self.polarity[next.idx()] == 1)
        }
    }

    // ------
    // Learnt database maintenance
    // ------

    /// Remove roughly half of the learnt clauses. Binary clauses and
    /// clauses locked as reasons survive.
    fn reduce_db(&mut self) {
        let extra_lim = self.cla_inc / self.learnts.len() as f64;

        {
            // Binary clauses sort last (they are never removed), the rest
            // ascending by activity so the least useful come first.
            let db = &self.clause_database;
            self.learnts.sort_by(|&x, &y| {
                let x_binary = db.size(x) == 2;
                let y_binary = db.size(y) == 2;
                x_binary.cmp(&y_binary).then(
                    db.activity(x)
                        .partial_cmp(&db.activity(y))
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
            });
        }

        let (mut i, mut j) = (0, 0);
        while i < self.learnts.len() {
            let cref = self.learnts[i];
            if self.clause_database.size(cref) > 2
                && !self.is_clause_locked(cref)
                && (i < self.learnts.len() / 2
                    || (self.clause_database.activity(cref) as f64) < extra_lim)
            {
                self.remove_clause(cref);
            } else {
                self.learnts[j] = cref;
                j += 1;
            }
            i += 1;
        }
        self.learnts.truncate(j);
        debug!("reduce_db kept {} learnt clauses", self.learnts.len());
        self.check_garbage();
    }

    fn remove_satisfied(&mut self, cs: &mut Vec<ClauseRef>) {
        let (mut i, mut j) = (0, 0);
        while i < cs.len() {
            let cref = cs[i];
            if self.assigns_satisfied(cref) {
                self.remove_clause(cref);
            } else {
                // Trim literals that are already false at level 0.
                debug_assert!(
                    self.lit_value(self.clause_database.lit(cref, 0)) == LBOOL_UNDEF
                        && self.lit_value(self.clause_database.lit(cref, 1)) == LBOOL_UNDEF
                );
                let mut k = 2;
                let mut new_size = self.clause_database.size(cref);
                while k < new_size {
                    if self.lit_value(self.clause_database.lit(cref, k)) == LBOOL_FALSE {
                        new_size -= 1;
                        let last = self.clause_database.lit(cref, new_size);
                        self.clause_database.set_lit(cref, k, last);
                    } else {
                        k += 1;
                    }
                }
                if new_size < self.clause_database.size(cref) {
                    self.clause_database.update_size(cref, new_size);
                }
                cs[j] = cref;
                j += 1;
            }
            i += 1;
        }
        cs.truncate(j);
    }

    fn rebuild_order_heap(&mut self) {
        let mut vs = Vec::new();
        for v in 0..self.num_vars() {
            if self.decision[v] == 1 && self.value(Var(v as i32)) == LBOOL_UNDEF {
                vs.push(Var(v as i32));
            }
        }
        self.order_heap.build(&vs, &self.activity);
    }

    /// Simplify the clause database with respect to the level-0 assignment.
    /// Returns false iff the formula is unsatisfiable.
    pub fn simplify(&mut self) -> bool {
        debug_assert!(self.decision_level() == 0);

        if !self.ok || self.propagate() != CLAUSE_NONE {
            self.ok = false;
            return false;
        }

        if self.trail.len() as i32 == self.simp_db_assigns || self.simp_db_props > 0 {
            return true;
        }

        debug!(
            "simplify at {} level-0 assignments, {} learnt clauses",
            self.trail.len(),
            self.learnts.len()
        );

        let mut learnts = std::mem::take(&mut self.learnts);
        self.remove_satisfied(&mut learnts);
        self.learnts = learnts;
        if self.remove_satisfied {
            let mut clauses = std::mem::take(&mut self.clauses);
            self.remove_satisfied(&mut clauses);
            self.clauses = clauses;
        }
        self.check_garbage();
        self.rebuild_order_heap();

        self.simp_db_assigns = self.trail.len() as i32;
        self.simp_db_props =
            self.stats.clauses_literals as i64 + self.stats.learnts_literals as i64;

        true
    }

    // ------
    // Garbage collection
    // ------

    fn check_garbage(&mut self) {
        if (self.clause_database.wasted as f64)
            > (self.clause_database.words.len() as f64) * self.params.garbage_frac
        {
            self.garbage_collect();
        }
    }

    fn garbage_collect(&mut self) {
        let mut new_words = Vec::with_capacity(
            self.clause_database.words.len() - self.clause_database.wasted as usize,
        );
        self.reloc_all(&mut new_words);
        debug!(
            "garbage collect: {} -> {} words",
            self.clause_database.words.len(),
            new_words.len()
        );
        std::mem::swap(&mut self.clause_database.words, &mut new_words);
        self.clause_database.wasted = 0;
    }

    fn reloc_all(&mut self, new_words: &mut Vec<u32>) {
        self.clean_all_watches();

        // Watchers.
        for code in 0..self.watch_occs.len() {
            for wi in 0..self.watch_occs[code].len() {
                let cref = self.watch_occs[code][wi].cref;
                let moved = self.clause_database.relocate_clause(cref, new_words);
                self.watch_occs[code][wi].cref = moved;
            }
        }

        // Reasons. A reason already relocated must not be dereferenced
        // again, hence the reloced check before the locked check.
        for t in 0..self.trail.len() {
            let v = self.trail[t].var();
            let reason = self.vardata[v.idx()].reason;
            if reason == CLAUSE_NONE {
                continue;
            }
            if self.clause_database.header(reason).get_reloced() || self.is_clause_locked(reason) {
                debug_assert!(self.clause_database.header(reason).get_mark() != 1);
                let moved = self.clause_database.relocate_clause(reason, new_words);
                self.vardata[v.idx()].reason = moved;
            }
        }

        // Learnt clauses.
        let (mut i, mut j) = (0, 0);
        while i < self.learnts.len() {
            if self.clause_database.header(self.learnts[i]).get_mark() != 1 {
                let moved = self
                    .clause_database
                    .relocate_clause(self.learnts[i], new_words);
                self.learnts[j] = moved;
                j += 1;
            }
            i += 1;
        }
        self.learnts.truncate(j);

        // Problem clauses.
        let (mut i, mut j) = (0, 0);
        while i < self.clauses.len() {
            if self.clause_database.header(self.clauses[i]).get_mark() != 1 {
                let moved = self
                    .clause_database
                    .relocate_clause(self.clauses[i], new_words);
                self.clauses[j] = moved;
                j += 1;
            }
            i += 1;
        }
        self.clauses.truncate(j);
    }

    // ------
    // Search
    // ------

    /// Search until a model or a top-level conflict is found, or until
    /// `nof_conflicts` conflicts have happened (negative means no limit).
    fn search(&mut self, nof_conflicts: i32) -> LBool {
        debug_assert!(self.ok);
        let mut conflict_c = 0;
        let mut learnt_clause: Vec<Lit> = Vec::new();
        self.stats.starts += 1;

        loop {
            let confl = self.propagate();
            if confl != CLAUSE_NONE {
                // CONFLICT
                self.stats.conflicts += 1;
                conflict_c += 1;
                if self.decision_level() == 0 {
                    return LBOOL_FALSE;
                }

                learnt_clause.clear();
                let backtrack_level = self.analyze(confl, &mut learnt_clause);
                self.cancel_until(backtrack_level);

                if learnt_clause.len() == 1 {
                    self.unchecked_enqueue(learnt_clause[0], CLAUSE_NONE);
                } else {
                    let cref = self.clause_database.alloc(&learnt_clause, true);
                    self.learnts.push(cref);
                    self.attach_clause(cref);
                    self.clause_bump_activity(cref);
                    self.unchecked_enqueue(learnt_clause[0], cref);
                }

                self.var_decay_activity();
                self.clause_decay_activity();

                self.learntsize_adjust_cnt -= 1;
                if self.learntsize_adjust_cnt == 0 {
                    self.learntsize_adjust_confl *= self.params.learntsize_adjust_inc;
                    self.learntsize_adjust_cnt = self.learntsize_adjust_confl as i32;
                    self.max_learnts *= self.params.learntsize_inc;

                    if self.verbosity >= 1 {
                        info!(
                            "| conflicts {:>9} | vars {:>6} clauses {:>7} literals {:>8} | limit {:>7} learnts {:>7} lit/cl {:>5} |",
                            self.stats.conflicts,
                            self.stats.dec_vars as isize
                                - if self.trail_lim.is_empty() {
                                    self.trail.len() as isize
                                } else {
                                    self.trail_lim[0] as isize
                                },
                            self.clauses.len(),
                            self.stats.clauses_literals,
                            self.max_learnts as isize,
                            self.learnts.len(),
                            (self.stats.learnts_literals as f64
                                / self.learnts.len().max(1) as f64)
                                as isize,
                        );
                    }
                }
            } else {
                // NO CONFLICT
                if (nof_conflicts >= 0 && conflict_c >= nof_conflicts) || !self.within_budget() {
                    self.cancel_until(0);
                    return LBOOL_UNDEF;
                }

                // Simplify the set of problem clauses.
                if self.decision_level() == 0 && !self.simplify() {
                    return LBOOL_FALSE;
                }

                if self.learnts.len() as f64 - self.trail.len() as f64 >= self.max_learnts {
                    self.reduce_db();
                }

                let mut next = LIT_UNDEF;
                while (self.decision_level() as usize) < self.assumptions.len() {
                    // Perform a user provided assumption.
                    let p = self.assumptions[self.decision_level() as usize];
                    if self.lit_value(p) == LBOOL_TRUE {
                        // Dummy decision level.
                        self.new_decision_level();
                    } else if self.lit_value(p) == LBOOL_FALSE {
                        self.analyze_final(p.inverse());
                        return LBOOL_FALSE;
                    } else {
                        next = p;
                        break;
                    }
                }

                if next == LIT_UNDEF {
                    self.stats.decisions += 1;
                    next = self.pick_branch_lit();
                    if next == LIT_UNDEF {
                        // Model found.
                        return LBOOL_TRUE;
                    }
                }

                trace!("decision {:?}", next);
                self.new_decision_level();
                self.unchecked_enqueue(next, CLAUSE_NONE);
            }
        }
    }

    fn within_budget(&self) -> bool {
        !self.asynch_interrupt
            && (self.conflict_budget < 0 || (self.stats.conflicts as i64) < self.conflict_budget)
            && (self.propagation_budget < 0
                || (self.stats.propagations as i64) < self.propagation_budget)
    }

    fn luby(y: f64, mut x: i32) -> f64 {
        // Find the finite subsequence containing index x and its size.
        let mut size = 1;
        let mut seq = 0;
        while size < x + 1 {
            seq += 1;
            size = 2 * size + 1;
        }

        while size - 1 != x {
            size = (size - 1) >> 1;
            seq -= 1;
            x %= size;
        }

        y.powi(seq)
    }

    pub fn solve(&mut self) -> LBool {
        self.solve_internal()
    }

    pub fn solve_with_assumptions(&mut self, assumps: &[Lit]) -> LBool {
        self.assumptions.clear();
        self.assumptions.extend_from_slice(assumps);
        let status = self.solve_internal();
        self.assumptions.clear();
        status
    }

    fn solve_internal(&mut self) -> LBool {
        self.model.clear();
        self.conflict.clear();
        if !self.ok {
            return LBOOL_FALSE;
        }

        self.stats.solves += 1;

        self.max_learnts = ((self.clauses.len() as f64) * self.params.learntsize_factor)
            .max(self.params.min_learnts_lim as f64);
        self.learntsize_adjust_confl = self.params.learntsize_adjust_start_confl as f64;
        self.learntsize_adjust_cnt = self.learntsize_adjust_confl as i32;
        let mut status = LBOOL_UNDEF;

        let mut curr_restarts = 0;
        while status == LBOOL_UNDEF {
            let rest_base = if self.params.luby_restart {
                Self::luby(self.params.restart_inc, curr_restarts)
            } else {
                self.params.restart_inc.powi(curr_restarts)
            };
            status = self.search((rest_base * self.params.restart_first as f64) as i32);
            if !self.within_budget() {
                break;
            }
            curr_restarts += 1;
        }

        if status == LBOOL_TRUE {
            self.model.resize(self.num_vars(), LBOOL_UNDEF);
            for v in 0..self.num_vars() {
                self.model[v] = self.value(Var(v as i32));
            }
        } else if status == LBOOL_FALSE && self.conflict.is_empty() {
            self.ok = false;
        }

        self.cancel_until(0);
        status
    }

    // ------
    // Budgets and interruption
    // ------

    pub fn set_conflict_budget(&mut self, budget: i64) {
        self.conflict_budget = budget;
    }

    pub fn set_propagation_budget(&mut self, budget: i64) {
        self.propagation_budget = budget;
    }

    /// Cooperative cancellation; polled between restarts by the search loop
    /// and between iterations by the evolutionary loop.
    pub fn interrupt(&mut self) {
        self.asynch_interrupt = true;
    }

    pub fn clear_interrupt(&mut self) {
        self.asynch_interrupt = false;
    }

    pub fn interrupted(&self) -> bool {
        self.asynch_interrupt
    }

    pub fn stats_info(&self, solve_start: cpu_time::ProcessTime) {
        let duration = cpu_time::ProcessTime::now()
            .duration_since(solve_start)
            .as_millis() as f64
            / 1000.0;
        info!("restarts: {}", self.stats.starts);
        info!(
            "conflicts: {} ({:.0} /sec)",
            self.stats.conflicts,
            self.stats.conflicts as f64 / duration
        );
        info!(
            "decisions: {} ({:.2}% random) ({:.0} /sec)",
            self.stats.decisions,
            self.stats.rnd_decisions as f64 * 100.0 / self.stats.decisions.max(1) as f64,
            self.stats.decisions as f64 / duration
        );
        info!(
            "propagations: {} ({:.0} /sec)",
            self.stats.propagations,
            self.stats.propagations as f64 / duration
        );
        info!(
            "conflict literals: {} ({:.2}% deleted)",
            self.stats.tot_literals,
            (self.stats.max_literals as f64 - self.stats.tot_literals as f64) * 100.0
                / self.stats.max_literals.max(1) as f64
        );
        info!("cpu time: {:.2}s", duration);
    }
}

// MiniSat's double-based PRNG; kept for branching randomization so that
// solver runs reproduce from `random_seed` alone.
fn drand(seed: &mut f64) -> f64 {
    let n: f64 = 2147483647.0;
    *seed *= 1389796.0;
    let q = (*seed / n) as i32;
    *seed -= q as f64 * n;
    *seed / n
}

fn irand(seed: &mut f64, size: i32) -> i32 {
    (drand(seed) * size as f64) as i32
}

#[cfg(test)]
impl Solver {
    /// Every live attached clause must appear exactly once in each of the
    /// watch lists of its first two literals' inverses, and nowhere else
    /// (tombstoned entries in still-dirty lists excepted).
    pub(crate) fn check_watch_integrity(&self) {
        let live: Vec<ClauseRef> = self
            .clauses
            .iter()
            .chain(self.learnts.iter())
            .copied()
            .filter(|&c| self.clause_database.header(c).get_mark() != 1)
            .collect();

        for &cref in &live {
            let c0 = self.clause_database.lit(cref, 0);
            let c1 = self.clause_database.lit(cref, 1);
            for code in 0..self.watch_occs.len() {
                let n = self.watch_occs[code]
                    .iter()
                    .filter(|w| w.cref == cref)
                    .count();
                let expected =
                    if code == c0.inverse().code() || code == c1.inverse().code() {
                        1
                    } else {
                        0
                    };
                assert_eq!(
                    n, expected,
                    "clause {} watched {} times under literal code {}",
                    cref, n, code
                );
            }
        }
    }

    /// The trail must agree with `assigns` and with per-variable levels.
    pub(crate) fn check_trail_consistency(&self) {
        for (pos, &l) in self.trail.iter().enumerate() {
            assert!(self.lit_value(l) == LBOOL_TRUE);
            let lvl = self.vardata[l.var().idx()].level;
            assert!(lvl >= 0 && lvl <= self.decision_level());
            if lvl > 0 {
                assert!(pos as i32 >= self.trail_lim[(lvl - 1) as usize]);
            }
        }
    }

    /// A reason clause must be asserting: its first literal is the assigned
    /// one, everything else false at a level no higher.
    pub(crate) fn check_reason_consistency(&self) {
        for &l in &self.trail {
            let v = l.var();
            let reason = self.vardata[v.idx()].reason;
            if reason == CLAUSE_NONE {
                continue;
            }
            assert!(self.clause_database.lit(reason, 0) == l);
            for k in 1..self.clause_database.size(reason) {
                let q = self.clause_database.lit(reason, k);
                assert!(self.lit_value(q) == LBOOL_FALSE);
                assert!(self.vardata[q.var().idx()].level <= self.vardata[v.idx()].level);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(solver: &mut Solver, n: usize) -> Vec<Lit> {
        (0..n).map(|_| solver.new_var(LBOOL_UNDEF, true)).collect()
    }

    #[test]
    fn empty_formula_is_sat() {
        let mut solver = Solver::new();
        assert_eq!(solver.solve().as_bool(), Some(true));
        assert_eq!(solver.model.len(), 0);
    }

    #[test]
    fn unit_clauses_propagate_at_level_zero() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 2);
        assert!(solver.add_clause([xs[0]].iter().cloned()));
        assert!(solver.add_clause([xs[0].inverse(), xs[1]].iter().cloned()));
        assert!(solver.lit_value(xs[0]) == LBOOL_TRUE);
        assert!(solver.lit_value(xs[1]) == LBOOL_TRUE);
        assert_eq!(solver.solve().as_bool(), Some(true));
    }

    #[test]
    fn contradictory_units_make_the_solver_permanently_unsat() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 1);
        assert!(solver.add_clause([xs[0]].iter().cloned()));
        assert!(!solver.add_clause([xs[0].inverse()].iter().cloned()));
        // ok=false is sticky.
        assert!(!solver.add_clause([xs[0]].iter().cloned()));
        assert!(!solver.simplify());
        assert_eq!(solver.solve().as_bool(), Some(false));
    }

    #[test]
    fn empty_clause_makes_the_solver_unsat() {
        let mut solver = Solver::new();
        let _ = vars(&mut solver, 1);
        assert!(!solver.add_clause(std::iter::empty()));
        assert_eq!(solver.solve().as_bool(), Some(false));
    }

    #[test]
    fn tautologies_and_duplicates_are_dropped() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 2);
        // x0 | ~x0 is a tautology, no clause should be added.
        assert!(solver.add_clause([xs[0], xs[0].inverse()].iter().cloned()));
        assert_eq!(solver.num_clauses(), 0);
        // Duplicates collapse, leaving a binary clause.
        assert!(solver.add_clause([xs[0], xs[0], xs[1]].iter().cloned()));
        assert_eq!(solver.num_clauses(), 1);
    }

    #[test]
    fn two_pigeons_one_hole_is_unsat() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 2);
        assert!(solver.add_clause([xs[0]].iter().cloned()));
        assert!(solver.add_clause([xs[1]].iter().cloned()));
        assert!(!solver.add_clause([xs[0].inverse(), xs[1].inverse()].iter().cloned()));
    }

    #[test]
    fn solve_finds_model_satisfying_all_clauses() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 4);
        let clauses: Vec<Vec<Lit>> = vec![
            vec![xs[0], xs[1]],
            vec![xs[0].inverse(), xs[2]],
            vec![xs[1].inverse(), xs[3]],
            vec![xs[2].inverse(), xs[3].inverse()],
        ];
        for c in &clauses {
            assert!(solver.add_clause(c.iter().cloned()));
        }
        assert_eq!(solver.solve().as_bool(), Some(true));
        for c in &clauses {
            assert!(
                c.iter().any(|l| {
                    let v = solver.model[l.var().idx()];
                    v.xor(l.sign()) == LBOOL_TRUE
                }),
                "model does not satisfy {:?}",
                c
            );
        }
    }

    #[test]
    fn watches_and_trail_stay_consistent_during_search() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 6);
        for i in 0..4 {
            let c = vec![xs[i], xs[i + 1].inverse(), xs[i + 2]];
            assert!(solver.add_clause(c.iter().cloned()));
        }
        assert!(solver.add_clause([xs[0].inverse(), xs[5]].iter().cloned()));
        solver.check_watch_integrity();

        assert_eq!(solver.solve().as_bool(), Some(true));
        solver.check_watch_integrity();
        solver.check_trail_consistency();
        solver.check_reason_consistency();
    }

    #[test]
    fn simplify_is_idempotent() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 3);
        assert!(solver.add_clause([xs[0]].iter().cloned()));
        assert!(solver.add_clause([xs[0], xs[1]].iter().cloned()));
        assert!(solver.add_clause([xs[1].inverse(), xs[2], xs[0].inverse()].iter().cloned()));

        assert!(solver.simplify());
        let clauses_after_first = solver.num_clauses();
        let props_after_first = solver.stats.propagations;
        assert!(solver.simplify());
        assert_eq!(solver.num_clauses(), clauses_after_first);
        assert_eq!(solver.stats.propagations, props_after_first);
    }

    #[test]
    fn assumption_conflict_is_reported_in_terms_of_assumptions() {
        let mut solver = Solver::new();
        let xs = vars(&mut solver, 2);
        assert!(solver.add_clause([xs[0].inverse(), xs[1]].iter().cloned()));
        let status = solver.solve_with_assumptions(&[xs[0], xs[1].inverse()]);
        assert_eq!(status.as_bool(), Some(false));
        assert!(!solver.conflict.is_empty());
        // The solver is not permanently unsat, only under these assumptions.
        assert_eq!(solver.solve().as_bool(), Some(true));
    }

    #[test]
    fn clause_arena_layout_round_trips() {
        let mut db = ClauseDatabase::new();
        let lits = [Lit(0), Lit(3), Lit(5)];
        let orig = db.alloc(&lits, false);
        let learnt = db.alloc(&lits, true);

        assert_eq!(db.size(orig), 3);
        for (i, &l) in lits.iter().enumerate() {
            assert_eq!(db.lit(orig, i), l);
        }
        // vars 0, 1, 2 -> bits 0..2 of the abstraction mask
        assert_eq!(db.abstraction(orig), 0b111);

        assert!(db.header(learnt).get_learnt());
        assert_eq!(db.activity(learnt), 0.0);
        db.set_activity(learnt, 2.5);
        assert_eq!(db.activity(learnt), 2.5);

        // Relocation preserves content and forwards repeated calls.
        let mut new_words = Vec::new();
        let moved = db.relocate_clause(learnt, &mut new_words);
        assert_eq!(db.relocate_clause(learnt, &mut new_words), moved);
        let db2 = ClauseDatabase {
            words: new_words,
            wasted: 0,
        };
        assert_eq!(db2.size(moved), 3);
        assert_eq!(db2.lit(moved, 1), Lit(3));
        assert_eq!(db2.activity(moved), 2.5);
    }

    #[test]
    fn garbage_collection_survives_search() {
        let mut params = SolverParams::default();
        params.garbage_frac = 0.01; // collect aggressively
        let mut solver = Solver::with_params(params);
        let xs = vars(&mut solver, 12);
        // A ring of implications with a few contradicting chords makes the
        // solver learn (and later discard) clauses.
        for i in 0..12 {
            let c = vec![xs[i].inverse(), xs[(i + 1) % 12]];
            assert!(solver.add_clause(c.iter().cloned()));
        }
        for i in 0..6 {
            let c = vec![xs[i], xs[(i + 3) % 12], xs[(i + 6) % 12]];
            assert!(solver.add_clause(c.iter().cloned()));
        }
        assert_eq!(solver.solve().as_bool(), Some(true));
        solver.check_watch_integrity();
    }

    #[test]
    fn luby_sequence_prefix() {
        let got: Vec<f64> = (0..15).map(|i| Solver::luby(2.0, i)).collect();
        let want = [
            1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 4.0, 1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 4.0, 8.0,
        ];
        assert_eq!(got, want);
    }

    #[test]
    fn lbool_equality_is_modulo_undef() {
        assert!(LBOOL_UNDEF == LBool(3));
        assert!(LBOOL_UNDEF != LBOOL_TRUE);
        assert!(LBOOL_UNDEF != LBOOL_FALSE);
        assert!(LBOOL_TRUE != LBOOL_FALSE);
        assert_eq!(LBOOL_TRUE.xor(true), LBOOL_FALSE);
        assert_eq!(LBOOL_UNDEF.xor(true), LBOOL_UNDEF);
    }
}
