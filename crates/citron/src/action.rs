//! Parser actions and their ordering.

use crate::grammar::{Grammar, RuleId, SymbolId};
use crate::lr0::StateId;
use std::cmp::Ordering;

/// What a state does on a given lookahead. The declaration order of the
/// variants is load-bearing: the action sort uses the ordinal as its
/// secondary key, and the conflict resolver relies on Shift sorting before
/// Reduce for equal lookaheads.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Shift(StateId),
    Accept,
    Reduce(RuleId),
    Error,
    /// A shift/shift conflict.
    SsConflict(StateId),
    /// Was a reduce, but part of an unresolved shift/reduce conflict.
    SrConflict(RuleId),
    /// Was a reduce, but part of an unresolved reduce/reduce conflict.
    RrConflict(RuleId),
    /// Was a shift; precedence resolved the conflict against it.
    ShResolved(StateId),
    /// Was a reduce; precedence resolved the conflict against it.
    RdResolved(RuleId),
    /// Deleted by table compression.
    NotUsed,
    /// Shift first, then reduce: the fused action produced by compression.
    ShiftReduce(RuleId),
}

impl ActionKind {
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Shift(..) => 0,
            Self::Accept => 1,
            Self::Reduce(..) => 2,
            Self::Error => 3,
            Self::SsConflict(..) => 4,
            Self::SrConflict(..) => 5,
            Self::RrConflict(..) => 6,
            Self::ShResolved(..) => 7,
            Self::RdResolved(..) => 8,
            Self::NotUsed => 9,
            Self::ShiftReduce(..) => 10,
        }
    }

    pub fn rule(&self) -> Option<RuleId> {
        match *self {
            Self::Reduce(rp)
            | Self::ShiftReduce(rp)
            | Self::SrConflict(rp)
            | Self::RrConflict(rp)
            | Self::RdResolved(rp) => Some(rp),
            _ => None,
        }
    }
}

/// One action of one state.
#[derive(Debug, Clone)]
pub struct Action {
    /// The lookahead symbol.
    pub sp: SymbolId,
    pub kind: ActionKind,
    /// For a fused shift-reduce rewritten by unit-rule inlining, the
    /// symbol whose action was copied; kept for report fidelity.
    pub sp_opt: Option<SymbolId>,
    /// Creation sequence number, the final sort tiebreak.
    pub index: u32,
}

/// Sort key: lookahead index, then kind ordinal (so Shift precedes Reduce),
/// then rule parse-index for reduce-like kinds, and finally the reversed
/// creation index.
pub fn action_cmp(g: &Grammar, a: &Action, b: &Action) -> Ordering {
    g.sym(a.sp)
        .index
        .cmp(&g.sym(b.sp).index)
        .then_with(|| a.kind.ordinal().cmp(&b.kind.ordinal()))
        .then_with(|| match (a.kind.rule(), b.kind.rule()) {
            (Some(ra), Some(rb))
                if matches!(
                    a.kind,
                    ActionKind::Reduce(..) | ActionKind::ShiftReduce(..)
                ) =>
            {
                g.rule(ra).index.cmp(&g.rule(rb).index)
            }
            _ => Ordering::Equal,
        })
        .then_with(|| b.index.cmp(&a.index))
}

/// Factory handing out creation indices, shared by every state.
#[derive(Debug, Default)]
pub struct ActionAlloc {
    next_index: u32,
}

impl ActionAlloc {
    pub fn new_action(&mut self, sp: SymbolId, kind: ActionKind) -> Action {
        self.next_index += 1;
        Action {
            sp,
            kind,
            sp_opt: None,
            index: self.next_index,
        }
    }
}
