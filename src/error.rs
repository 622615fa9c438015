use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a single rule was skipped instead of compiled.
///
/// Per the source behavior, a rule with an impossible predicate does not
/// fail the whole compile; it is dropped and recorded here so the caller can
/// log it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRule {
    pub rule_id: u32,
    pub reason: String,
}

impl fmt::Display for SkippedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {} skipped: {}", self.rule_id, self.reason)
    }
}

/// Fatal errors from [`crate::compile`].
///
/// `InvalidRule` rules are *not* represented here; they are non-fatal and
/// surface as [`SkippedRule`] entries on the compiled filter instead.
#[derive(Debug)]
pub enum CompileError {
    /// The allocator returned null at some point during compilation.
    OutOfMemory { attribute: &'static str, requested: usize },

    /// An attribute classifier produced more classes than its domain's
    /// fixed byte width can index.
    AttributeOverflow {
        attribute: &'static str,
        max_classes: u64,
        produced: u64,
    },

    /// A consistency check failed inside compact/remap. This indicates a
    /// bug in the compiler, not a malformed rule set, and the compile is
    /// aborted.
    InternalInvariantViolation { detail: String },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::OutOfMemory { attribute, requested } => write!(
                f,
                "out of memory compiling attribute `{attribute}`: requested {requested} bytes"
            ),
            CompileError::AttributeOverflow {
                attribute,
                max_classes,
                produced,
            } => write!(
                f,
                "attribute `{attribute}` overflowed its domain: produced {produced} classes, max is {max_classes}"
            ),
            CompileError::InternalInvariantViolation { detail } => {
                write!(f, "internal invariant violated: {detail}")
            }
        }
    }
}

impl std::error::Error for CompileError {}
