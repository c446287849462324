//! The heuristic for picking a literal to guess first
//!
//! Internally, it uses a priority queue supporting random-access updates to the
//! priority of elements, implemented with a binary heap.  Scores start out as
//! occurrence counts and get bumped whenever a variable shows up in a learned
//! clause, so variables involved in recent conflicts float to the top.

use crate::data::*;
use crate::vec_map::VecMap;
use std::cmp;
use std::mem;

/// Bumps past this trigger a rescale so scores never saturate
const RESCALE_AT: u32 = u32::MAX / 2;

#[derive(Debug, Copy, Clone)]
struct Entry {
    lit: Literal,
    priority: u32,
}

#[derive(Debug, Clone)]
pub struct Heuristic {
    heap: Vec<Entry>,
    inds: VecMap<VarId, u32>,
    priorities: VecMap<Literal, u32>,
}

#[inline]
fn parent(index: usize) -> usize {
    (index - 1) / 2
}
#[inline]
fn left(index: usize) -> usize {
    2 * index + 1
}
#[inline]
fn right(index: usize) -> usize {
    2 * index + 2
}

impl Heuristic {
    /// The number of elements left in the heap
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Make a new priority queue over `vars`, with per-literal priorities.
    /// Each entry carries the polarity that scores higher.
    pub fn new(vars: &[VarId], priorities: VecMap<Literal, u32>) -> Self {
        let nvars = priorities.len() / 2;
        let mut inds = VecMap::filled(u32::MAX, nvars);
        for (i, &k) in vars.iter().enumerate() {
            inds[k] = i as u32;
        }

        let mut this = Self {
            heap: vars
                .iter()
                .map(|&var| {
                    let mut lit = Literal::new(var);
                    if priorities[!lit] > priorities[lit] {
                        lit = !lit;
                    }
                    Entry {
                        lit,
                        priority: priorities[lit],
                    }
                })
                .collect(),
            inds,
            priorities,
        };

        // heapify
        if vars.len() >= 2 {
            for i in (0..=parent(vars.len() - 1)).rev() {
                this.bubble_down(i);
            }
        }

        this
    }

    /// Remove and return the literal with the highest priority
    pub fn pop(&mut self) -> Option<Literal> {
        if self.is_empty() {
            return None;
        }

        let lit = self.heap.swap_remove(0).lit;
        self.inds[lit.var_id()] = u32::MAX;

        if !self.is_empty() {
            self.bubble_down(0);
        }

        Some(lit)
    }

    /// Remove the given variable
    pub fn remove(&mut self, var: VarId) {
        let ind = mem::replace(&mut self.inds[var], u32::MAX);
        if ind == u32::MAX {
            return;
        }
        self.heap.swap_remove(ind as usize);

        // the element swapped in from the tail can be out of place in
        // either direction
        if (ind as usize) < self.len() {
            self.bubble_up(ind as usize);
            self.bubble_down(ind as usize);
        }
    }

    /// Re-add a variable, picking whichever polarity scores higher now
    pub fn re_add(&mut self, var: VarId) {
        debug_assert!(self.inds[var] == u32::MAX);
        let mut lit = Literal::new(var);
        if self.priorities[!lit] > self.priorities[lit] {
            lit = !lit;
        }
        self.heap.push(Entry {
            lit,
            priority: self.priorities[lit],
        });

        self.bubble_up(self.len() - 1);
    }

    /// Raise a literal's priority by `amount`
    pub fn bump(&mut self, lit: Literal, amount: u32) {
        let new = self.priorities[lit].saturating_add(amount);
        self.priorities[lit] = new;

        let ind = self.inds[lit.var_id()];
        if ind != u32::MAX {
            let i = ind as usize;
            self.heap[i].priority = cmp::max(new, self.priorities[!lit]);
            self.bubble_up(i);
        }

        if new >= RESCALE_AT {
            self.rescale();
        }
    }

    /// Halve every score.  Halving is monotone, so the heap order survives.
    fn rescale(&mut self) {
        for p in self.priorities.inner.iter_mut() {
            *p >>= 1;
        }
        for entry in self.heap.iter_mut() {
            entry.priority >>= 1;
        }
    }

    /// restore heap properties at index `i` by moving it down the heap
    fn bubble_down(&mut self, mut i: usize) {
        let len = self.len();

        loop {
            let mut largest = i;
            if left(i) < len && self.heap[largest].priority < self.heap[left(i)].priority {
                largest = left(i);
            }
            if right(i) < len && self.heap[largest].priority < self.heap[right(i)].priority {
                largest = right(i);
            }
            if largest == i {
                break;
            }
            self.heap.swap(i, largest);
            self.inds[self.heap[i].lit.var_id()] = i as u32;
            i = largest;
        }

        self.inds[self.heap[i].lit.var_id()] = i as u32;
    }

    /// restore heap properties at index `i` by moving it up the heap
    fn bubble_up(&mut self, mut i: usize) {
        while i > 0 {
            if self.heap[parent(i)].priority < self.heap[i].priority {
                self.heap.swap(parent(i), i);
                self.inds[self.heap[i].lit.var_id()] = i as u32;
                i = parent(i);
            } else {
                break;
            }
        }

        self.inds[self.heap[i].lit.var_id()] = i as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(priorities: Vec<u32>) -> Heuristic {
        let nvars = priorities.len() / 2;
        let vars: Vec<VarId> = (0..nvars as u32).map(VarId::new).collect();
        Heuristic::new(&vars, VecMap::new(priorities))
    }

    #[test]
    fn pops_highest_with_polarity() {
        // var 0: 3 positive, 1 negative; var 1: 2 positive, 5 negative
        let mut h = queue(vec![3, 1, 2, 5]);
        let first = h.pop().unwrap();
        assert_eq!(first.var_id(), VarId(1));
        assert!(first.is_negated());
        let second = h.pop().unwrap();
        assert_eq!(second.var_id(), VarId(0));
        assert!(!second.is_negated());
        assert!(h.pop().is_none());
    }

    #[test]
    fn bump_reorders() {
        let mut h = queue(vec![1, 0, 2, 0, 3, 0]);
        h.bump(Literal::new(VarId(0)), 10);
        assert_eq!(h.pop().unwrap().var_id(), VarId(0));
    }

    #[test]
    fn remove_and_re_add() {
        let mut h = queue(vec![1, 0, 2, 0, 3, 0]);
        h.remove(VarId(2));
        assert_eq!(h.pop().unwrap().var_id(), VarId(1));
        h.re_add(VarId(2));
        assert_eq!(h.pop().unwrap().var_id(), VarId(2));
    }
}
