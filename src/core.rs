//! The core CDCL search loop

use crate::budget::{Budget, Interrupt};
use crate::data::*;
use crate::heuristic::Heuristic;
use crate::luby::LubySeries;
use crate::vec_map::VecMap;
use std::mem;
use tinyvec::TinyVec;

/// How a solve call ended
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome {
    Sat,
    Unsat,
    /// The budget ran out first; the problem is still open
    Interrupted(Interrupt),
}

/// Running totals, for progress reports
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub decisions: u64,
    pub propagations: u64,
    pub conflicts: u64,
    pub restarts: u64,
    pub learned: u64,
}

const DEFAULT_RESTART_INTERVAL: u64 = 256;

/// The main state for the solver
#[derive(Debug, Clone)]
pub struct Solver {
    clauses: VecMap<ClauseId, Clause>,
    pub assignment: VecMap<VarId, Value>,
    watched_clauses: VecMap<Literal, Vec<ClauseId>>,

    heuristic: Heuristic,

    /// Trail for backtracking variable choices
    trail: Vec<Literal>,

    /// Indices into the trail marking decision points
    levels: Vec<usize>,

    /// Set of literals yet to process for unit prop, and the clauses they're
    /// unit in
    pending: Vec<(Literal, ClauseId)>,

    reasons: VecMap<VarId, ClauseId>,

    /// The input contained an empty clause
    root_conflict: bool,

    luby: LubySeries,
    restart_interval: u64,
    conflicts_until_restart: u64,
    next_budget_check: u64,

    pub stats: Stats,
}

impl Solver {
    pub fn new(
        var_count: u32,
        active_vars: &[VarId],
        clauses: Vec<Clause>,
        counts: VecMap<Literal, u32>,
    ) -> Self {
        assert!(clauses.len() < u32::MAX as usize);

        let assignment = VecMap::filled(Unknown, var_count as usize);
        let mut watched_clauses = VecMap::filled(Vec::new(), var_count as usize * 2);
        let mut pending = Vec::new();
        let mut root_conflict = false;

        // Populate watched clauses
        for (i, clause) in clauses.iter().enumerate() {
            let cid = ClauseId::new(i as u32);
            match clause.len() {
                0 => root_conflict = true,
                1 => pending.push((clause[0], cid)),
                _ => {
                    watched_clauses[clause[0]].push(cid);
                    watched_clauses[clause[1]].push(cid);
                }
            }
        }

        let mut luby = LubySeries::default();
        let conflicts_until_restart = luby.next_step() * DEFAULT_RESTART_INTERVAL;

        Self {
            clauses: VecMap::new(clauses),
            assignment,
            watched_clauses,
            heuristic: Heuristic::new(active_vars, counts),
            trail: Vec::new(),
            levels: Vec::new(),
            pending,
            reasons: VecMap::filled(ClauseId::NONE, var_count as usize),
            root_conflict,
            luby,
            restart_interval: DEFAULT_RESTART_INTERVAL,
            conflicts_until_restart,
            next_budget_check: 0,
            stats: Stats::default(),
        }
    }

    /// Build a solver straight from parsed clauses, skipping preprocessing
    pub fn from_clauses(var_count: u32, clauses: Vec<Clause>) -> Self {
        let mut counts = VecMap::filled(0, var_count as usize * 2);
        for clause in &clauses {
            for &lit in &clause[..] {
                counts[lit] += 1;
            }
        }
        let vars: Vec<VarId> = (0..var_count).map(VarId::new).collect();
        Self::new(var_count, &vars, clauses, counts)
    }

    /// Luby restart pacing unit, in conflicts
    pub fn set_restart_interval(&mut self, interval: u64) {
        self.restart_interval = interval.max(1);
        self.luby.reset();
        self.conflicts_until_restart = self.luby.next_step() * self.restart_interval;
    }
}

impl Solver {
    /// Solve with no limits
    pub fn solve(&mut self) -> Outcome {
        self.solve_limited(&Budget::unlimited())
    }

    /// Solve the SAT problem!
    ///
    /// The budget is polled as the search goes; when it runs out the call
    /// returns `Outcome::Interrupted` and the instance stays open.
    pub fn solve_limited(&mut self, budget: &Budget) -> Outcome {
        if self.root_conflict {
            return Outcome::Unsat;
        }

        // In case it started out with any unit clauses
        if self.propagate().is_err() {
            return Outcome::Unsat;
        }

        loop {
            let progress = self.stats.decisions + self.stats.conflicts;
            if progress >= self.next_budget_check {
                self.next_budget_check = progress + 1024;
                let conflicts = self.stats.conflicts;
                if let Some(why) = budget.exhausted(conflicts, || self.memory_estimate()) {
                    log::info!("giving up: {}", why);
                    return Outcome::Interrupted(why);
                }
            }

            if self.conflicts_until_restart == 0 {
                self.restart();
            }

            let next_lit = match self.heuristic.pop() {
                Some(lit) => lit,
                // Nothing left to guess -- we're done
                None => return Outcome::Sat,
            };
            self.stats.decisions += 1;
            self.tick();

            let mut conflict = self.decide(next_lit).err();
            while let Some(cid) = conflict {
                self.stats.conflicts += 1;
                self.conflicts_until_restart = self.conflicts_until_restart.saturating_sub(1);

                match self.learn_from(cid) {
                    Err(Unsat) => return Outcome::Unsat,
                    Ok((lit, learned_cid)) => {
                        conflict = self.assert_learned(lit, learned_cid).err();
                    }
                }
            }
        }
    }

    /// Rough allocation size of the clause arena and watcher lists, for the
    /// memory budget
    pub fn memory_estimate(&self) -> usize {
        let clauses: usize = self
            .clauses
            .inner
            .iter()
            .map(|c| c.capacity() * mem::size_of::<Literal>() + mem::size_of::<Clause>())
            .sum();
        let watchers: usize = self
            .watched_clauses
            .inner
            .iter()
            .map(|w| w.capacity() * mem::size_of::<ClauseId>() + mem::size_of::<Vec<ClauseId>>())
            .sum();
        clauses + watchers
    }

    /// Maybe log a progress line
    fn tick(&self) {
        if self.stats.decisions % 100_000 == 0 {
            log::info!(
                "{} decisions, {} conflicts, {} learned clauses, {} vars open",
                self.stats.decisions,
                self.stats.conflicts,
                self.stats.learned,
                self.heuristic.len(),
            );
        }
    }

    /// Add this literal to the trail
    fn push_trail(&mut self, lit: Literal) {
        // If there's no decision yet, this assignment is known for certain,
        // and there's no need to ever backtrack it
        if !self.levels.is_empty() {
            self.trail.push(lit);
        }
    }

    /// Guess this lit is true, but it should be possible to backtrack
    fn decide(&mut self, lit: Literal) -> Result<(), ClauseId> {
        debug_assert!(self.pending.is_empty());

        // this is the next level
        self.levels.push(self.trail.len());
        self.trail.push(lit);

        self.reasons[lit.var_id()] = ClauseId::NONE;
        self.assign_true(lit)?;
        self.propagate()
    }

    /// After a conflict: the learned clause forces `lit` at the current level
    fn assert_learned(&mut self, lit: Literal, reason: ClauseId) -> Result<(), ClauseId> {
        debug_assert!(self.pending.is_empty());

        self.push_trail(lit);
        self.reasons[lit.var_id()] = reason;
        self.assign_true(lit)?;
        self.propagate()
    }

    fn propagate(&mut self) -> Result<(), ClauseId> {
        while let Some((lit, cid)) = self.pending.pop() {
            let bad_state = if lit.is_negated() { True } else { False };

            if self.assignment[lit.var_id()] == bad_state {
                // was already the other thing, fail
                self.pending.clear();
                return Err(cid);
            }
            if self.assignment[lit.var_id()] != Unknown {
                // was already the right thing, don't need to update it
                continue;
            }

            self.stats.propagations += 1;
            self.push_trail(lit);
            self.reasons[lit.var_id()] = cid;
            self.assign_true(lit)?;
        }

        Ok(())
    }

    fn clause_value(assignment: &VecMap<VarId, Value>, clause: &[Literal]) -> Value {
        let mut result = False;
        for &lit in clause {
            match lit.eval(assignment) {
                False => (),
                True => return True,
                Unknown => result = Unknown,
            }
        }
        result
    }

    /// Assign this literal to be true.
    fn assign_true(&mut self, lit: Literal) -> Result<(), ClauseId> {
        // set the variable to its new value
        debug_assert_eq!(self.assignment[lit.var_id()], Unknown);
        self.assignment[lit.var_id()] = if lit.is_negated() { False } else { True };

        // Remove the variable from the queue
        self.heuristic.remove(lit.var_id());

        // loop thru the falsified literal's watched clauses
        // (backwards, to make removing things easier)
        for wi in (0..self.watched_clauses[!lit].len()).rev() {
            let clause_id = self.watched_clauses[!lit][wi];
            let clause = &mut self.clauses[clause_id][..];

            match Self::clause_value(&self.assignment, clause) {
                False => {
                    self.pending.clear();
                    return Err(clause_id);
                }
                True => (), // nothing to learn
                Unknown => {
                    // Either unit prop or update watched literals

                    let mut first_unknown = None;
                    for i in 0..clause.len() {
                        if clause[i].eval(&self.assignment) != Unknown {
                            continue;
                        }

                        if let Some(first) = first_unknown {
                            // There are two unknowns -- set them as the
                            // watched vars
                            // The first unknown should already be a
                            // watched var, so we just have to update the
                            // second

                            // Remove this clause from this literal's
                            // watched clauses
                            let this_wcs = &mut self.watched_clauses[!lit];
                            this_wcs.swap_remove(wi);

                            // add it to clause[i]'s watched clauses
                            let new_wcs = &mut self.watched_clauses[clause[i]];
                            new_wcs.push(clause_id);

                            // the watched clauses should always appear
                            // first
                            clause.swap(0, first);
                            clause.swap(1, i);

                            first_unknown = None;
                            break;
                        } else {
                            first_unknown = Some(i);
                        }
                    }

                    if let Some(only_unknown) = first_unknown {
                        // Unit prop time
                        self.pending.push((clause[only_unknown], clause_id));
                    }
                }
            }
        }

        Ok(())
    }

    /// firstUIP conflict analysis
    ///
    /// Returns the clause to learn, with the asserting literal from the
    /// latest decision level at the front
    fn analyze(&self, bad_cid: ClauseId) -> Result<Clause, Unsat> {
        // Resolve the conflict clause against reason clauses until it only has
        // one variable from the latest decision level

        // if there's no decision, the conflict is unconditional and the
        // whole thing is unsat
        let latest_lits = &self.trail[*self.levels.last().ok_or(Unsat)?..];

        // The new clause is represented as two vectors for convenience
        let mut new_clause = TinyVec::new();
        let mut latest_in_clause = Vec::new();

        for &lit in &self.clauses[bad_cid] {
            debug_assert!(!latest_lits.contains(&lit));
            if latest_lits.contains(&!lit) {
                latest_in_clause.push(lit);
            } else {
                new_clause.push(lit);
            }
        }

        assert!(!latest_in_clause.is_empty());
        while latest_in_clause.len() > 1 {
            let mut lit = latest_in_clause.pop().unwrap();
            if lit == !latest_lits[0] {
                // never resolve on the decision literal itself
                mem::swap(&mut lit, &mut latest_in_clause[0]);
            }
            // Resolve with the reason clause
            for &l in &self.clauses[self.reasons[lit.var_id()]] {
                debug_assert!(!new_clause.contains(&!l));
                debug_assert!(!latest_in_clause.contains(&!l));
                if l == !lit {
                    continue;
                } else if latest_lits.contains(&!l) {
                    if !latest_in_clause.contains(&l) {
                        latest_in_clause.push(l);
                    }
                } else if !new_clause.contains(&l) {
                    new_clause.push(l);
                }
            }
        }

        new_clause.push(latest_in_clause[0]);
        let last_ind = new_clause.len() - 1;
        new_clause.swap(0, last_ind);

        Ok(new_clause)
    }

    /// Dealing with a conflict involves three things:
    ///  * Conflict analysis
    ///  * Clause learning
    ///  * Backjumping
    ///
    /// Returns the literal to assert, and the clause id of the learned clause
    fn learn_from(&mut self, bad_cid: ClauseId) -> Result<(Literal, ClauseId), Unsat> {
        let mut learned = self.analyze(bad_cid)?;
        let learned_cid = ClauseId::new(self.clauses.len() as u32);
        self.stats.learned += 1;

        // Conflict-driven bumps: these are the variables that matter lately
        for &l in &learned[..] {
            self.heuristic.bump(l, 1);
        }

        let asserted = learned[0];

        if learned.len() == 1 {
            // The clause says so unconditionally: assert at the root
            self.clauses.inner.push(learned);
            self.backtrack_to(0);
            return Ok((asserted, learned_cid));
        }

        // Find the deepest level at which the learned clause is still unit
        let current_level_start = *self.levels.last().unwrap();
        let trail = &self.trail;
        let jump_ind = match (0..current_level_start).rfind(|&i| learned.contains(&!trail[i])) {
            Some(i) => i,
            None => {
                // Every other literal is a root assignment, so this clause
                // also asserts at the root
                self.watched_clauses[learned[0]].push(learned_cid);
                self.watched_clauses[learned[1]].push(learned_cid);
                self.clauses.inner.push(learned);
                self.backtrack_to(0);
                return Ok((asserted, learned_cid));
            }
        };

        let levels = &self.levels;
        let keep = (1..levels.len())
            .rfind(|&i| levels[i - 1] <= jump_ind)
            .unwrap();
        self.backtrack_to(keep);

        // Set up watched literals for the new clause: slot 0 is the asserting
        // literal, slot 1 the one falsified most recently among the rest
        let watched_lit = !self.trail[jump_ind];
        let wi = learned[..].iter().position(|&l| l == watched_lit).unwrap();
        learned.swap(1, wi);
        self.watched_clauses[learned[0]].push(learned_cid);
        self.watched_clauses[learned[1]].push(learned_cid);
        self.clauses.inner.push(learned);

        Ok((asserted, learned_cid))
    }

    /// Undo everything past the first `level` decision levels
    fn backtrack_to(&mut self, level: usize) {
        if self.levels.len() <= level {
            return;
        }
        let new_len = self.levels[level];
        self.levels.truncate(level);
        for lit in self.trail.drain(new_len..) {
            self.assignment[lit.var_id()] = Unknown;
            self.heuristic.re_add(lit.var_id());
        }
    }

    /// Toss all decisions, keeping learned clauses and root assignments
    fn restart(&mut self) {
        self.stats.restarts += 1;
        self.backtrack_to(0);
        self.conflicts_until_restart = self.luby.next_step().saturating_mul(self.restart_interval);
        log::debug!(
            "restart #{} after {} conflicts, next in {}",
            self.stats.restarts,
            self.stats.conflicts,
            self.conflicts_until_restart,
        );
    }

    /// Check the assignment satisfies every clause in the arena
    pub fn verify(&self) -> Result<(), Unsat> {
        'outer: for clause in &self.clauses.inner {
            for &lit in &clause[..] {
                if lit.eval(&self.assignment) == True {
                    continue 'outer;
                }
            }
            log::error!("Not satisfied: {:?}", clause);
            return Err(Unsat);
        }
        Ok(())
    }
}
