//! # Simplification / preprocessing
//!
//! The first step in SAT solving is to try to simplify the input as much as
//! possible before handing it to the search engine.
//!
//! There are a bunch of simplification operations, which are done to a
//! fixpoint:
//!
//!  - Unit propagation: if there is a clause with just one literal, it must
//!    be true.
//!
//!  - Pure literals: if the problem contains a literal but not its negation,
//!    it can be assumed to be true.
//!
//!  - Subsumed clauses: if a clause is a superset of another clause, it can
//!    be removed.
//!
//!    Example: `(x + y) and (x + y + z)` becomes `(x + y)`.
//!
//!  - Self-subsumption: if a clause is *almost* a superset of another clause,
//!    but one contains `-x` and the other `x`, then `x` can be deleted from
//!    the bigger clause.
//!
//!    Example: `(x + y) and (-x + y + z)` becomes `(x + y) and (y + z)`
//!
//!  - Bounded variable elimination: a variable with few occurrences is
//!    resolved away, turning every pair `(x + A) and (-x + B)` into
//!    `(A + B)` -- as long as that doesn't grow the clause count too much.
//!
//! Elimination changes the set of models, so every eliminated variable's
//! pivot-side clauses are recorded; [`Postprocessor::extend`] replays them to
//! turn a model of the reduced problem back into a model of the original.

use crate::core::Solver;
use crate::data;
use crate::data::*;
use crate::vec_map::VecMap;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::mem;
use tinyvec::TinyVec;

const SIG_BITS: u32 = 64;

/// Clause signatures -- a quick bitset to make checking subset and almost
/// subset faster
///
/// Just map each literal to `var_id % SIG_BITS` then make a bit set
fn signature(cl: &[Literal]) -> u64 {
    cl.iter()
        .map(|&x| 1 << (x.var_id().0 % SIG_BITS))
        .fold(0, |x, y| x | y)
}

#[inline]
fn might_contain(sig: u64, lit: Literal) -> bool {
    sig & (1 << (lit.var_id().0 % SIG_BITS)) != 0
}

#[inline]
fn might_be_subset(a: u64, b: u64) -> bool {
    (a & !b) == 0
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    clause: data::Clause,
    sig: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Subset {
    Nope,
    Yep,
    /// Only the sign of one literal differs between them
    /// This is the index of it in the bigger clause
    Almost(usize),
}

impl Clause {
    /// Both slices must be sorted, with one literal per variable
    fn definitely_subset(a: &[Literal], b: &[Literal]) -> Subset {
        debug_assert!(a.len() <= b.len());
        let mut almost = None;
        let mut ai = 0;
        let mut bi = 0;
        while ai < a.len() && bi < b.len() {
            match a[ai].var_id().cmp(&b[bi].var_id()) {
                // a has a variable that b skipped past
                Ordering::Less => return Subset::Nope,
                Ordering::Greater => bi += 1,
                Ordering::Equal => {
                    if a[ai] == b[bi] {
                        // Right sign, all is well
                        ai += 1;
                        bi += 1;
                    } else if almost.is_none() {
                        // Wrong sign, but it's ok
                        almost = Some(bi);
                        ai += 1;
                        bi += 1;
                    } else {
                        // Wrong sign, and it's not ok
                        return Subset::Nope;
                    }
                }
            }
        }

        if ai < a.len() {
            Subset::Nope
        } else if let Some(ind) = almost {
            Subset::Almost(ind)
        } else {
            Subset::Yep
        }
    }

    fn is_subset_of(&self, other: &Self) -> Subset {
        if might_be_subset(self.sig, other.sig) {
            Self::definitely_subset(&self.clause[..], &other.clause[..])
        } else {
            Subset::Nope
        }
    }

    fn contains(&self, lit: Literal) -> bool {
        might_contain(self.sig, lit) && self.clause.contains(&lit)
    }

    fn remove(&mut self, ind: usize) -> Result<(), Unsat> {
        self.clause.swap_remove(ind);
        if self.clause.is_empty() {
            Err(Unsat)
        } else {
            self.sig = signature(&self.clause[..]);
            Ok(())
        }
    }

    fn add_lit(&mut self, lit: Literal) {
        debug_assert!(!self.contains(lit) && !self.contains(!lit));

        self.clause.push(lit);
        self.sig |= 1 << (lit.var_id().0 % SIG_BITS);
    }
}

/// How a variable got solved during preprocessing
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Soln {
    True,
    False,
    /// Resolved away; its value comes out of the elimination records
    Eliminated,
}

/// Bounds on variable elimination
#[derive(Debug, Copy, Clone)]
pub struct ElimLimits {
    /// Only eliminate a variable if one of its polarities occurs at most this
    /// often
    pub occ_limit: u32,
    /// How many extra clauses an elimination is allowed to add
    pub grow: usize,
}

impl Default for ElimLimits {
    fn default() -> Self {
        Self {
            occ_limit: 10,
            grow: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    clauses: Vec<Clause>,
    counts: VecMap<Literal, u32>,
    solutions: IndexMap<VarId, Soln>,
    /// Pivot literal and its clauses, in elimination order
    eliminated: Vec<(Literal, Vec<data::Clause>)>,
    limits: ElimLimits,
    at_fixpoint: bool,
}

impl Preprocessor {
    pub fn new(var_count: u32, clauses: Vec<data::Clause>, limits: ElimLimits) -> Self {
        let clauses: Vec<_> = clauses
            .into_iter()
            .map(|c| Clause {
                sig: signature(&c),
                clause: c,
            })
            .collect();
        let mut counts = VecMap::filled(0, var_count as usize * 2);
        for clause in &clauses {
            for &lit in &clause.clause[..] {
                counts[lit] += 1;
            }
        }
        Self {
            clauses,
            counts,
            solutions: IndexMap::new(),
            eliminated: Vec::new(),
            limits,
            at_fixpoint: false,
        }
    }

    pub fn simplify(&mut self) -> Result<(), Unsat> {
        let nclauses = self.clauses.len();
        log::info!(
            "Simplifying problem with {} vars and {} clauses",
            self.num_vars(),
            nclauses,
        );

        self.fixpoint(|this| {
            this.fixpoint(Self::unit_clauses)?;
            this.fixpoint(Self::pure_lits)?;
            this.fixpoint(Self::eliminate_vars)?;
            this.fixpoint(Self::redundant_clauses)?;
            Ok(())
        })?;

        log::info!(
            "Preprocessing eliminated {} vars and {} clauses",
            self.solutions.len(),
            nclauses.saturating_sub(self.clauses.len())
        );
        Ok(())
    }

    /// Hand the reduced problem to the search engine.  The returned
    /// `Postprocessor` turns its models back into models of the original
    /// problem.
    pub fn finish(self) -> (Solver, Postprocessor) {
        let var_count = self.num_vars() as u32;
        let active: Vec<VarId> = (0..var_count)
            .map(VarId::new)
            .filter(|v| !self.solutions.contains_key(v))
            .collect();
        let clauses: Vec<data::Clause> = self.clauses.into_iter().map(|c| c.clause).collect();

        let solver = Solver::new(var_count, &active, clauses, self.counts);
        let post = Postprocessor {
            solutions: self.solutions,
            eliminated: self.eliminated,
        };
        (solver, post)
    }
}

/// Helper utilities
impl Preprocessor {
    fn num_vars(&self) -> usize {
        self.counts.len() / 2
    }

    /// An iterator through literals corresponding to the positive vars
    fn vars(&self) -> impl Iterator<Item = Literal> {
        (0..self.num_vars() as u32).map(|i| Literal::new(VarId(i)))
    }

    fn remove_clause(&mut self, index: usize) {
        let deleted = self.clauses.swap_remove(index);
        for lit in deleted.clause {
            self.counts[lit] -= 1;
        }
    }

    fn assign(&mut self, var: VarId, soln: Soln) -> Result<(), Unsat> {
        log::debug!("Solved {:?}: {:?}", var, soln);
        if let Some(old_value) = self.solutions.insert(var, soln) {
            match old_value {
                Soln::Eliminated => unreachable!(),
                _ if old_value != soln => {
                    log::debug!("{:?} is both {:?} and {:?}", var, old_value, soln);
                    return Err(Unsat);
                }
                _ => (),
            }
        }
        Ok(())
    }

    fn assign_lit(&mut self, lit: Literal) -> Result<(), Unsat> {
        self.assign(
            lit.var_id(),
            if lit.is_negated() {
                Soln::False
            } else {
                Soln::True
            },
        )
    }

    fn fixpoint(&mut self, mut f: impl FnMut(&mut Self) -> Result<(), Unsat>) -> Result<(), Unsat> {
        let old_at_fixpoint = self.at_fixpoint;
        self.at_fixpoint = false;
        while !self.at_fixpoint {
            self.at_fixpoint = true;
            f(self)?;
        }
        self.at_fixpoint &= old_at_fixpoint;
        Ok(())
    }
}

/// Unit clauses
impl Preprocessor {
    /// Process all unit clauses
    fn unit_clauses(&mut self) -> Result<(), Unsat> {
        let mut worklist = Vec::new();

        // iterate backwards for easy removal
        for i in (0..self.clauses.len()).rev() {
            match self.clauses[i].clause.len() {
                0 => return Err(Unsat),
                1 => {
                    self.at_fixpoint = false;
                    worklist.push(self.clauses[i].clause[0]);
                    self.remove_clause(i);
                }
                _ => (),
            }
        }

        while let Some(lit) = worklist.pop() {
            log::debug!("Processing unit clause {:?}", lit);
            self.one_unit(lit, &mut worklist)?;
        }

        Ok(())
    }

    fn one_unit(&mut self, lit: Literal, worklist: &mut Vec<Literal>) -> Result<(), Unsat> {
        self.assign_lit(lit)?;

        // iterate backwards for easy removal
        for clause_ind in (0..self.clauses.len()).rev() {
            // If the clause contains lit, remove the clause
            // Else if the clause contains !lit, remove !lit from the clause
            // and unit prop as necessary

            if !might_contain(self.clauses[clause_ind].sig, lit) {
                continue;
            }
            let mut satisfied = false;
            let mut lit_ind = None;
            for (i, &l) in self.clauses[clause_ind].clause.iter().enumerate() {
                if l == lit {
                    satisfied = true;
                    break;
                } else if l == !lit {
                    lit_ind = Some(i);
                    break;
                }
            }
            if satisfied {
                // The clause contains lit so it's trivially true
                self.remove_clause(clause_ind);
                continue;
            }
            let lit_ind = match lit_ind {
                Some(i) => i,
                None => continue,
            };

            // Remove !lit from the clause, updating the literal counts
            self.clauses[clause_ind].remove(lit_ind)?;
            self.counts[!lit] -= 1;

            if self.clauses[clause_ind].clause.len() == 1 {
                // It might create another unit clause
                worklist.push(self.clauses[clause_ind].clause[0]);
                self.remove_clause(clause_ind);
            }
        }

        Ok(())
    }
}

/// Subsumed clauses and self-subsumption
impl Preprocessor {
    fn redundant_clauses(&mut self) -> Result<(), Unsat> {
        self.clauses.sort_by_key(|c| c.clause.len());
        for c in &mut self.clauses {
            c.clause.sort();
        }

        for i in 0..self.clauses.len() {
            let mut j = i + 1;
            while j < self.clauses.len() {
                // swap_remove breaks the by-length ordering; the next
                // fixpoint round re-sorts and catches anything missed here
                if self.clauses[i].clause.len() > self.clauses[j].clause.len() {
                    j += 1;
                    continue;
                }
                match self.clauses[i].is_subset_of(&self.clauses[j]) {
                    Subset::Nope => j += 1,
                    Subset::Yep => {
                        self.at_fixpoint = false;
                        self.remove_clause(j);
                        // re-examine whatever got swapped into slot j
                    }
                    Subset::Almost(index) => {
                        self.at_fixpoint = false;
                        let removed = self.clauses[j].clause[index];
                        self.clauses[j].remove(index)?;
                        self.counts[removed] -= 1;
                        j += 1;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Pure literals
impl Preprocessor {
    /// Process all pure literals
    fn pure_lits(&mut self) -> Result<(), Unsat> {
        for var in self.vars() {
            if self.solutions.contains_key(&var.var_id()) {
                continue;
            }

            let pure_lit;
            if self.counts[var] == 0 {
                pure_lit = !var;
            } else if self.counts[!var] == 0 {
                pure_lit = var;
            } else {
                continue;
            };

            log::debug!("Processing pure {:?}", pure_lit);
            self.at_fixpoint = false;

            self.one_pure_lit(pure_lit)?;
        }

        Ok(())
    }

    fn one_pure_lit(&mut self, lit: Literal) -> Result<(), Unsat> {
        self.assign_lit(lit)?;

        // iterate backwards for easy removal
        for i in (0..self.clauses.len()).rev() {
            if self.clauses[i].contains(lit) {
                self.remove_clause(i);
            }
        }

        Ok(())
    }
}

/// Bounded variable elimination
impl Preprocessor {
    /// Try to resolve away every variable that's cheap enough
    fn eliminate_vars(&mut self) -> Result<(), Unsat> {
        for v in self.vars() {
            if self.solutions.contains_key(&v.var_id()) {
                continue;
            }
            if self.counts[v] > self.limits.occ_limit && self.counts[!v] > self.limits.occ_limit {
                continue;
            }

            log::debug!("Trying to eliminate {:?}", v);
            self.try_eliminate(v)?;
        }

        Ok(())
    }

    fn try_eliminate(&mut self, pivot: Literal) -> Result<(), Unsat> {
        let mut positive_clauses = Vec::new();
        let mut negative_clauses = Vec::new();
        for (i, c) in self.clauses.iter().enumerate() {
            if c.contains(pivot) {
                positive_clauses.push(i);
            } else if c.contains(!pivot) {
                negative_clauses.push(i);
            }
        }

        let old_len = positive_clauses.len() + negative_clauses.len();

        let mut new_clauses = Vec::new();
        for &p in &positive_clauses {
            for &n in &negative_clauses {
                new_clauses.extend(Self::resolve_two(
                    pivot,
                    &self.clauses[p].clause[..],
                    &self.clauses[n].clause[..],
                ));

                // Make sure not to generate too many more clauses than we
                // started with
                if new_clauses.len() > old_len + self.limits.grow {
                    log::debug!("{:?} wasn't cheap enough to eliminate", pivot);
                    return Ok(());
                }
            }
        }

        log::debug!(
            "Eliminating {:?}: replacing {} old clauses with {} new clauses",
            pivot,
            old_len,
            new_clauses.len()
        );
        self.at_fixpoint = false;

        // Record the pivot side before the clause set changes; extend() needs
        // these to reconstruct the variable's value
        let saved: Vec<data::Clause> = positive_clauses
            .iter()
            .map(|&i| self.clauses[i].clause.clone())
            .collect();
        self.eliminated.push((pivot, saved));
        self.assign(pivot.var_id(), Soln::Eliminated)?;

        // Replace the positive_clauses and negative_clauses with new_clauses
        let mut slots = positive_clauses.into_iter().chain(negative_clauses);
        for new_clause in new_clauses {
            for &l in &new_clause.clause[..] {
                self.counts[l] += 1;
            }
            match slots.next() {
                Some(i) => {
                    let old_clause = mem::replace(&mut self.clauses[i], new_clause);
                    for l in old_clause.clause {
                        self.counts[l] -= 1;
                    }
                }
                None => self.clauses.push(new_clause),
            }
        }
        // If there's more old clauses than new clauses, remove them -- in
        // descending index order, since remove_clause swaps from the back
        let mut rest: Vec<usize> = slots.collect();
        rest.sort_unstable();
        for i in rest.into_iter().rev() {
            self.remove_clause(i);
        }

        Ok(())
    }

    /// Goal: make a new clause `(c1 - lit) ++ (c2 - !lit)`
    ///
    /// If that clause contains `x` and `!x` for some literal `x`, that's bad --
    /// return `None`
    fn resolve_two(lit: Literal, c1: &[Literal], c2: &[Literal]) -> Option<Clause> {
        let mut result = {
            let clause: TinyVec<_> = c1.iter().copied().filter(|&l| l != lit).collect();
            Clause {
                sig: signature(&clause),
                clause,
            }
        };
        for l in c2.iter().copied().filter(|&l| l != !lit) {
            if result.contains(!l) {
                return None;
            } else if result.contains(l) {
                // don't want duplicates
                continue;
            } else {
                result.add_lit(l);
            }
        }

        Some(result)
    }
}

/// Turns models of the reduced problem into models of the original problem
#[derive(Debug, Clone)]
pub struct Postprocessor {
    solutions: IndexMap<VarId, Soln>,
    eliminated: Vec<(Literal, Vec<data::Clause>)>,
}

impl Postprocessor {
    /// For when there was no preprocessing
    pub fn empty() -> Self {
        Self {
            solutions: IndexMap::new(),
            eliminated: Vec::new(),
        }
    }

    /// Fill in every variable preprocessing got rid of.
    ///
    /// Eliminated variables are replayed newest-first: by then all the other
    /// variables of their recorded clauses have values, and the pivot is set
    /// to true exactly when one of those clauses needs it.
    pub fn extend(&self, assignment: &mut VecMap<VarId, Value>) {
        for (&var, &soln) in self.solutions.iter() {
            match soln {
                Soln::True => assignment[var] = True,
                Soln::False => assignment[var] = False,
                Soln::Eliminated => (),
            }
        }

        for (pivot, saved) in self.eliminated.iter().rev() {
            let pivot = *pivot;
            let forced = saved.iter().any(|clause| {
                clause
                    .iter()
                    .all(|&l| l == pivot || l.eval(assignment) != True)
            });
            assignment[pivot.var_id()] = if forced != pivot.is_negated() {
                True
            } else {
                False
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cl(lits: &[i32]) -> data::Clause {
        lits.iter().map(|&n| Literal::from_dimacs(n)).collect()
    }

    #[test]
    fn subsumed_clause_is_removed() {
        let mut pre = Preprocessor::new(3, vec![cl(&[1, 2]), cl(&[1, 2, 3])], ElimLimits::default());
        pre.redundant_clauses().unwrap();
        assert_eq!(pre.clauses.len(), 1);
        assert_eq!(pre.clauses[0].clause.len(), 2);
    }

    #[test]
    fn self_subsumption_strengthens() {
        let mut pre =
            Preprocessor::new(3, vec![cl(&[1, 2]), cl(&[-1, 2, 3])], ElimLimits::default());
        pre.redundant_clauses().unwrap();
        assert_eq!(pre.clauses.len(), 2);
        let strengthened = pre
            .clauses
            .iter()
            .find(|c| c.contains(Literal::from_dimacs(3)))
            .unwrap();
        assert_eq!(strengthened.clause.len(), 2);
        assert!(!strengthened.contains(Literal::from_dimacs(-1)));
    }

    #[test]
    fn contradictory_units_are_unsat() {
        let mut pre = Preprocessor::new(1, vec![cl(&[1]), cl(&[-1])], ElimLimits::default());
        assert!(pre.simplify().is_err());
    }

    #[test]
    fn empty_clause_is_unsat() {
        let mut pre = Preprocessor::new(1, vec![cl(&[])], ElimLimits::default());
        assert!(pre.simplify().is_err());
    }

    #[test]
    fn resolving_to_a_tautology_is_skipped() {
        let a = cl(&[1, 2]);
        let b = cl(&[-1, -2]);
        assert!(Preprocessor::resolve_two(Literal::from_dimacs(1), &a, &b).is_none());
    }

    #[test]
    fn extend_reconstructs_eliminated_vars() {
        let original = vec![cl(&[1, 2]), cl(&[-1, -2])];
        let mut pre = Preprocessor::new(2, original.clone(), ElimLimits::default());
        pre.simplify().unwrap();
        assert!(pre.clauses.is_empty());

        let (_solver, post) = pre.finish();
        let mut assignment = VecMap::filled(Unknown, 2);
        post.extend(&mut assignment);

        for clause in &original {
            assert!(
                clause.iter().any(|&l| l.eval(&assignment) == True),
                "unsatisfied: {:?} under {:?}",
                clause,
                assignment.inner
            );
        }
    }
}
