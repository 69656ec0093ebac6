//! Disjoint-set forest over record indices
//!
//! Grouping, duplicate detection and colocation all reduce to "which items are
//! transitively related". Components are reported in order of their smallest
//! member so results do not depend on the order edges were added.

use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct DisjointSet {
    roots: Vec<usize>,
    ranks: Vec<u8>,
}

impl DisjointSet {
    /// `n` singleton sets `{0}, {1}, ..., {n-1}`
    pub fn new(n: usize) -> Self {
        Self {
            roots: (0..n).collect(),
            ranks: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Representative of `x`'s set, halving paths along the way
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.roots[x] != x {
            self.roots[x] = self.roots[self.roots[x]];
            x = self.roots[x];
        }
        x
    }

    /// Merge the sets containing `x` and `y`. Returns false if already joined.
    pub fn union(&mut self, x: usize, y: usize) -> bool {
        let x = self.find(x);
        let y = self.find(y);
        if x == y {
            return false;
        }
        match self.ranks[x].cmp(&self.ranks[y]) {
            Ordering::Less => self.roots[x] = y,
            Ordering::Greater => self.roots[y] = x,
            Ordering::Equal => {
                self.roots[y] = x;
                self.ranks[x] = self.ranks[x].saturating_add(1);
            }
        }
        true
    }

    /// Every set as a sorted member list, ordered by first member
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root: Vec<Option<usize>> = vec![None; self.len()];
        let mut components: Vec<Vec<usize>> = Vec::new();
        for i in 0..self.len() {
            let root = self.find(i);
            match slot_of_root[root] {
                Some(slot) => components[slot].push(i),
                None => {
                    slot_of_root[root] = Some(components.len());
                    components.push(vec![i]);
                }
            }
        }
        components
    }
}
