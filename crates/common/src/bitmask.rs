//! The keep/delete bit vector driving the variant search.

use crate::graph::DependencyGraph;
use std::fmt;

/// Per-unit keep (1) / delete (0) vector, indexed by traversal order
/// number. The primary search state; short-lived and cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BitMask {
    bits: Vec<bool>,
}

impl BitMask {
    /// An all-zeroes mask of the given length.
    pub fn zeroes(len: usize) -> Self {
        Self { bits: vec![false; len] }
    }

    /// An all-ones mask of the given length.
    pub fn ones(len: usize) -> Self {
        Self { bits: vec![true; len] }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Whether unit `index` is kept.
    pub fn get(&self, index: usize) -> bool {
        self.bits[index]
    }

    pub fn set(&mut self, index: usize, keep: bool) {
        self.bits[index] = keep;
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }

    /// Indices of all kept units, ascending.
    pub fn ones_indices(&self) -> Vec<usize> {
        (0..self.bits.len()).filter(|&index| self.bits[index]).collect()
    }

    /// True iff every bit is set.
    pub fn is_full(&self) -> bool {
        self.bits.iter().all(|&bit| bit)
    }

    /// Adds one, treating the mask as a big-endian binary integer. Overflow
    /// wraps around to all zeroes silently.
    pub fn increment(&mut self) {
        for bit in self.bits.iter_mut().rev() {
            let carry = *bit;
            *bit = !*bit;
            if !carry {
                break;
            }
        }
    }
}

impl fmt::Display for BitMask {
    /// Renders '0'/'1' characters from most- to least-significant.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.bits {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// How strictly [`validate`] enforces the dependency graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationMode {
    /// A zero bit requires every statement- and variable-descendant bit to
    /// be zero as well.
    Strict,
    /// Descendants are ignored; the printing pass is responsible for not
    /// double-deleting overlapping ranges.
    Lax,
}

/// Outcome of validating a mask against a graph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Validity {
    pub valid: bool,
    /// Fraction of the graph's corrected characters that survive the
    /// deletions. Zero for invalid masks.
    pub ratio: f64,
}

impl Validity {
    fn invalid() -> Self {
        Self { valid: false, ratio: 0.0 }
    }
}

/// Determines whether a bitmask produces a valid source file variant.
///
/// Criterion units must be kept in both modes. In [`ValidationMode::Strict`]
/// a deleted unit additionally forces all of its dependents out.
pub fn validate(mask: &BitMask, graph: &DependencyGraph, mode: ValidationMode) -> Validity {
    let total = graph.total_character_count();
    let mut remaining = total;

    for index in 0..mask.len() {
        if mask.get(index) {
            continue;
        }

        remaining -= graph.character_count(index);

        if graph.is_criterion(index) {
            // Criterion units must be present.
            return Validity::invalid();
        }

        if mode == ValidationMode::Strict {
            for dependent in graph.dependents_of(index) {
                // The parent will be removed; keeping its children would
                // double-delete or orphan them.
                if mask.get(dependent) {
                    return Validity::invalid();
                }
            }
        }
    }

    let ratio = if total == 0 { 0.0 } else { remaining as f64 / total as f64 };
    Validity { valid: true, ratio }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_of(bits: &str) -> BitMask {
        let mut mask = BitMask::zeroes(bits.len());
        for (index, bit) in bits.bytes().enumerate() {
            mask.set(index, bit == b'1');
        }
        mask
    }

    fn sample_graph() -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        graph.insert_unit_data(0, 10, "{ f(); }".to_owned(), "compound_statement", "darkorchid");
        graph.insert_unit_data(1, 11, "f()".to_owned(), "call_expression", "goldenrod");
        graph.insert_unit_data(2, 12, "int x = 0;".to_owned(), "declaration", "darkorchid");
        graph.insert_statement_edge(0, 1);
        graph.add_criterion(2);
        graph.finalize();
        graph
    }

    #[test]
    fn increment_counts_in_binary() {
        let mut mask = mask_of("000");
        mask.increment();
        assert_eq!(mask.to_string(), "001");
        mask.increment();
        assert_eq!(mask.to_string(), "010");
        mask.increment();
        assert_eq!(mask.to_string(), "011");
        mask.increment();
        assert_eq!(mask.to_string(), "100");
    }

    #[test]
    fn increment_wraps_at_all_ones() {
        let mut mask = mask_of("111");
        mask.increment();
        assert_eq!(mask.to_string(), "000");
    }

    #[test]
    fn fullness() {
        assert!(mask_of("111").is_full());
        assert!(!mask_of("110").is_full());
    }

    #[test]
    fn cleared_criterion_bit_invalidates_in_both_modes() {
        let graph = sample_graph();
        let mask = mask_of("110");

        for mode in [ValidationMode::Strict, ValidationMode::Lax] {
            let validity = validate(&mask, &graph, mode);
            assert!(!validity.valid);
            assert_eq!(validity.ratio, 0.0);
        }
    }

    #[test]
    fn strict_mode_rejects_kept_children_of_deleted_parents() {
        let graph = sample_graph();
        let mask = mask_of("011");

        assert!(!validate(&mask, &graph, ValidationMode::Strict).valid);
        assert!(validate(&mask, &graph, ValidationMode::Lax).valid);
    }

    #[test]
    fn ratio_reflects_surviving_characters() {
        let graph = sample_graph();
        // Total = corrected "{ f(); }" (8 - 3) + "f()" (3) + "int x = 0;" (10).
        assert_eq!(graph.total_character_count(), 18);

        let validity = validate(&mask_of("001"), &graph, ValidationMode::Strict);
        assert!(validity.valid);
        assert!((validity.ratio - 10.0 / 18.0).abs() < 1e-9);

        let full = validate(&mask_of("111"), &graph, ValidationMode::Strict);
        assert!(full.valid);
        assert_eq!(full.ratio, 1.0);
    }

    #[test]
    fn validation_is_idempotent() {
        let graph = sample_graph();
        let mask = mask_of("101");
        let first = validate(&mask, &graph, ValidationMode::Strict);
        let second = validate(&mask, &graph, ValidationMode::Strict);
        assert_eq!(first, second);
    }

    #[test]
    fn strict_validity_is_monotone_on_deletions() {
        let graph = sample_graph();
        // M' keeps a superset of M; both agree on the criterion bit.
        let larger = mask_of("111");
        let smaller = mask_of("001");

        assert!(validate(&larger, &graph, ValidationMode::Strict).valid);
        assert!(validate(&smaller, &graph, ValidationMode::Strict).valid);
    }
}
