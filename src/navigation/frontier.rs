//! Layered candidate queue with backtracking.
//!
//! The frontier is a stack of plateaus. Every sensing event or target change
//! opens a new plateau, so the freshest candidates are always tried first.
//! Once a plateau has nothing viable left it is dropped and the one beneath it
//! becomes the fallback, which gives bounded backtracking without keeping any
//! search graph around.

use crate::common::Point2D;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::trace;

type CoordKey = (OrderedFloat<f64>, OrderedFloat<f64>);

fn coord_key(p: &Point2D) -> CoordKey {
    (OrderedFloat(p.x), OrderedFloat(p.y))
}

/// A point the planner may choose as its next target
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    coordinate: Point2D,
    base_cost: f64,
    override_cost: Option<f64>,
}

impl Candidate {
    pub fn new(coordinate: Point2D, base_cost: f64) -> Self {
        Candidate {
            coordinate,
            base_cost,
            override_cost: None,
        }
    }

    /// Candidate costed by its distance to `target`
    pub fn scored(coordinate: Point2D, target: &Point2D) -> Self {
        Candidate::new(coordinate, coordinate.distance(target))
    }

    pub fn coordinate(&self) -> Point2D {
        self.coordinate
    }

    pub fn base_cost(&self) -> f64 {
        self.base_cost
    }

    pub fn override_cost(&self) -> Option<f64> {
        self.override_cost
    }

    /// Override if present, base cost otherwise
    pub fn effective_cost(&self) -> f64 {
        self.override_cost.unwrap_or(self.base_cost)
    }

    pub fn is_impossible(&self) -> bool {
        self.effective_cost() == f64::INFINITY
    }

    pub fn set_override(&mut self, cost: f64) {
        self.override_cost = Some(cost);
    }

    pub fn clear_override(&mut self) {
        self.override_cost = None;
    }

    pub fn mark_impossible(&mut self) {
        self.set_override(f64::INFINITY);
    }

    /// Ascending effective cost, ties broken by coordinate
    pub fn priority_cmp(&self, other: &Candidate) -> Ordering {
        self.effective_cost()
            .total_cmp(&other.effective_cost())
            .then_with(|| self.coordinate.total_cmp(&other.coordinate))
    }
}

/// One generation of candidates
#[derive(Debug, Clone, Default)]
pub struct Plateau {
    candidates: HashMap<CoordKey, Candidate>,
}

impl Plateau {
    pub fn new() -> Self {
        Plateau::default()
    }

    /// Insert unless a candidate already sits at the same coordinate
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        let key = coord_key(&candidate.coordinate);
        if self.candidates.contains_key(&key) {
            return false;
        }
        self.candidates.insert(key, candidate);
        true
    }

    pub fn get_mut(&mut self, coordinate: &Point2D) -> Option<&mut Candidate> {
        self.candidates.get_mut(&coord_key(coordinate))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.values()
    }

    /// Remove and return the cheapest candidate that is not impossible
    fn take_best(&mut self) -> Option<Candidate> {
        let key = self
            .candidates
            .iter()
            .filter(|(_, c)| !c.is_impossible())
            .min_by(|(_, a), (_, b)| a.priority_cmp(b))
            .map(|(k, _)| *k)?;
        self.candidates.remove(&key)
    }

    fn rescale(&mut self, target: &Point2D) {
        for candidate in self.candidates.values_mut() {
            *candidate = Candidate::scored(candidate.coordinate, target);
        }
    }
}

/// Stack of plateaus, newest on top
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    plateaus: Vec<Plateau>,
}

impl Frontier {
    pub fn new() -> Self {
        Frontier::default()
    }

    /// Open a new, empty generation on top of the stack
    pub fn push_plateau(&mut self) {
        self.plateaus.push(Plateau::new());
        trace!("Frontier: opened plateau {}", self.plateaus.len());
    }

    /// Add a candidate to the top plateau. Returns false if its coordinate
    /// is already present there.
    pub fn add(&mut self, candidate: Candidate) -> bool {
        if self.plateaus.is_empty() {
            self.push_plateau();
        }
        match self.plateaus.last_mut() {
            Some(top) => top.insert(candidate),
            None => false,
        }
    }

    /// Take the best viable candidate, abandoning exhausted plateaus on the way
    pub fn pop(&mut self) -> Option<Candidate> {
        while let Some(top) = self.plateaus.last_mut() {
            if let Some(candidate) = top.take_best() {
                trace!(
                    "Frontier: popped {} at cost {:.3}",
                    candidate.coordinate,
                    candidate.effective_cost()
                );
                return Some(candidate);
            }
            self.plateaus.pop();
            trace!(
                "Frontier: abandoned exhausted plateau, {} remaining",
                self.plateaus.len()
            );
        }
        None
    }

    /// Set the candidate's cost to infinity wherever it lives. A candidate
    /// that was already popped goes back into the top plateau so it stays
    /// traceable.
    pub fn mark_impossible(&mut self, candidate: Candidate) {
        let coordinate = candidate.coordinate;
        for plateau in self.plateaus.iter_mut().rev() {
            if let Some(existing) = plateau.get_mut(&coordinate) {
                existing.mark_impossible();
                return;
            }
        }
        let mut candidate = candidate;
        candidate.mark_impossible();
        self.add(candidate);
    }

    /// Recost every candidate against a new target, clearing overrides
    pub fn rescale(&mut self, target: &Point2D) {
        for plateau in &mut self.plateaus {
            plateau.rescale(target);
        }
    }

    /// Number of plateaus on the stack
    pub fn depth(&self) -> usize {
        self.plateaus.len()
    }

    /// Number of candidates across all plateaus
    pub fn len(&self) -> usize {
        self.plateaus.iter().map(Plateau::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.plateaus.iter().all(Plateau::is_empty)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.plateaus.iter().flat_map(Plateau::iter)
    }

    pub fn clear(&mut self) {
        self.plateaus.clear();
    }
}
