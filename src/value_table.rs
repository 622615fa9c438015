//! The value table: a dense `k`-dimensional tensor of
//! equivalence classes, built up one *generation* at a time (one generation
//! per rule) and then compacted once into a minimal class numbering.
//!
//! Two cells end up with the same class after [`ValueTable::compact`] iff
//! they were touched by exactly the same set of generations. Class `0` is
//! reserved for cells no generation ever touched ("matches no rule").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// A `K`-dimensional dense value table over classes `0..=max_class`.
#[derive(Serialize, Deserialize)]
pub struct ValueTable<const K: usize> {
    dims: [usize; K],
    /// Per-cell signature: the sorted, deduplicated list of generation ids
    /// that touched it. Cleared once [`compact`](Self::compact) runs.
    signatures: Vec<Vec<u32>>,
    /// Last generation that touched each cell, so a repeated `touch` within
    /// the same generation is a no-op (idempotence, P5).
    last_touch: Vec<Option<u32>>,
    next_gen: u32,
    classes: Option<Vec<u32>>,
    max_class: u32,
}

impl<const K: usize> ValueTable<K> {
    /// `attribute` is used only for error messages.
    pub fn new(attribute: &'static str, dims: [usize; K]) -> Result<Self, CompileError> {
        let total = dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
        let total = match total {
            Some(t) if t <= (1 << 30) => t,
            _ => {
                return Err(CompileError::AttributeOverflow {
                    attribute,
                    max_classes: 1 << 30,
                    produced: u64::MAX,
                })
            }
        };
        Ok(Self {
            dims,
            signatures: vec![Vec::new(); total],
            last_touch: vec![None; total],
            next_gen: 0,
            classes: None,
            max_class: 0,
        })
    }

    fn flatten(&self, idx: [usize; K]) -> usize {
        let mut flat = 0usize;
        for i in 0..K {
            debug_assert!(idx[i] < self.dims[i], "index {} out of bounds for dim {}", idx[i], i);
            flat = flat * self.dims[i] + idx[i];
        }
        flat
    }

    /// Open a new generation. Does not itself touch any cell or consume a
    /// class number; classes are assigned only by [`compact`](Self::compact).
    pub fn new_gen(&mut self) -> u32 {
        assert!(self.classes.is_none(), "new_gen after compact");
        let g = self.next_gen;
        self.next_gen += 1;
        g
    }

    /// Mark `idx` as belonging to generation `gen`. Idempotent within one
    /// generation (P5).
    pub fn touch(&mut self, idx: [usize; K], gen: u32) {
        assert!(self.classes.is_none(), "touch after compact");
        let flat = self.flatten(idx);
        if self.last_touch[flat] == Some(gen) {
            return;
        }
        self.last_touch[flat] = Some(gen);
        self.signatures[flat].push(gen);
    }

    /// The raw pre-compaction signature of a cell: the sorted list of
    /// generations that touched it. Exposed for the driver's internal use
    /// only — ordinary callers should wait for [`compact`](Self::compact)
    /// and use [`get`](Self::get).
    pub fn signature_of(&self, idx: [usize; K]) -> &[u32] {
        assert!(self.classes.is_none(), "signature_of after compact");
        &self.signatures[self.flatten(idx)]
    }

    /// Assign every cell the smallest class number such that two cells get
    /// the same number iff they share a generation-signature. After this
    /// call, `touch`/`new_gen` are no longer permitted.
    pub fn compact(&mut self) {
        assert!(self.classes.is_none(), "compact called twice");
        let mut interned: HashMap<Vec<u32>, u32> = HashMap::new();
        let mut next_class = 1u32;
        let mut classes = Vec::with_capacity(self.signatures.len());
        for sig in &self.signatures {
            if sig.is_empty() {
                classes.push(0);
                continue;
            }
            let class = *interned.entry(sig.clone()).or_insert_with(|| {
                let c = next_class;
                next_class += 1;
                c
            });
            classes.push(class);
        }
        self.max_class = next_class - 1;
        self.classes = Some(classes);
        self.signatures = Vec::new();
        self.last_touch = Vec::new();
    }

    /// The compacted class at `idx`. Panics if called before `compact`.
    pub fn get(&self, idx: [usize; K]) -> u32 {
        let flat = self.flatten(idx);
        self.classes.as_ref().expect("get before compact")[flat]
    }

    pub fn max_class(&self) -> u32 {
        self.max_class
    }

    pub fn dims(&self) -> [usize; K] {
        self.dims
    }

    pub fn is_compacted(&self) -> bool {
        self.classes.is_some()
    }
}
