//! Action-table compression and state reordering.

use crate::action::ActionKind;
use crate::grammar::{Grammar, RuleId, SymbolKind, DEFAULT_SYMBOL};
use crate::lr0::{Automaton, NO_OFFSET};
use crate::types::Map;
use std::cmp::Reverse;

/// Shrink the tables by making the most frequent reduce of each state its
/// default action, then fuse shifts into auto-reduce states, then copy
/// the follow-up action into single-symbol shift-reduces.
pub fn compress_tables(g: &mut Grammar, a: &mut Automaton) {
    let default_sym = g.find(DEFAULT_SYMBOL).expect("registry finalized");

    for si in 0..a.states.len() {
        let mut uses_wildcard = false;
        let mut counts: Map<RuleId, u32> = Map::default();
        for ap in &a.states[si].actions {
            if let ActionKind::Shift(..) = ap.kind {
                if Some(ap.sp) == g.wildcard {
                    uses_wildcard = true;
                }
            }
            if let ActionKind::Reduce(rp) = ap.kind {
                if !g.rule(rp).lhs_start {
                    *counts.entry(rp).or_insert(0) += 1;
                }
            }
        }
        let mut nbest = 0;
        let mut rbest = None;
        for (&rp, &n) in &counts {
            if n > nbest {
                nbest = n;
                rbest = Some(rp);
            }
        }

        // Do not make a default if there is nothing to fold or if the
        // wildcard token is a possible lookahead.
        let Some(rbest) = rbest else { continue };
        if nbest < 1 || uses_wildcard {
            continue;
        }

        // Combine the matching reduce actions into a single default.
        let mut first = true;
        for ap in &mut a.states[si].actions {
            if ap.kind == ActionKind::Reduce(rbest) {
                if first {
                    ap.sp = default_sym;
                    first = false;
                } else {
                    ap.kind = ActionKind::NotUsed;
                }
            }
        }
        a.states[si]
            .actions
            .sort_by(|x, y| crate::action::action_cmp(g, x, y));

        let blocked = a.states[si].actions.iter().any(|ap| match ap.kind {
            ActionKind::Shift(..) => true,
            ActionKind::Reduce(rp) => rp != rbest,
            _ => false,
        });
        if !blocked {
            a.states[si].auto_reduce = true;
            a.states[si].dflt_reduce = Some(rbest);
        }
    }

    // Second pass: every shift into an auto-reduce state becomes a fused
    // shift-reduce on that state's default rule.
    for si in 0..a.states.len() {
        for ai in 0..a.states[si].actions.len() {
            let ActionKind::Shift(next) = a.states[si].actions[ai].kind else {
                continue;
            };
            let next = next.raw() as usize;
            if a.states[next].auto_reduce {
                if let Some(rp) = a.states[next].dflt_reduce {
                    a.states[si].actions[ai].kind = ActionKind::ShiftReduce(rp);
                }
            }
        }
    }

    // Third pass: a shift-reduce over a single-symbol rule with no action
    // code lands back where it started, so it can take on whatever action
    // its left-hand side has in this state. Nonterminal lookaheads only;
    // doing it for terminals would grow the terminal tables.
    for si in 0..a.states.len() {
        let mut ai = 0;
        while ai < a.states[si].actions.len() {
            let ap = &a.states[si].actions[ai];
            let ActionKind::ShiftReduce(rp) = ap.kind else {
                ai += 1;
                continue;
            };
            let rule = g.rule(rp);
            if rule.code.is_some()
                || rule.rhs.len() != 1
                || g.sym(ap.sp).index < g.nterminal
            {
                ai += 1;
                continue;
            }
            let lhs = rule.lhs;
            let found = a.states[si]
                .actions
                .iter()
                .enumerate()
                .find(|&(j, a2)| j != ai && a2.sp == lhs)
                .map(|(j, _)| j);
            let Some(j) = found else {
                ai += 1;
                continue;
            };
            let (sp_opt, kind) = (a.states[si].actions[j].sp, a.states[si].actions[j].kind);
            let ap = &mut a.states[si].actions[ai];
            ap.sp_opt = Some(sp_opt);
            ap.kind = kind;
            // Re-examine the rewritten action; the copied action may make
            // it eligible again.
        }
    }
}

/// Recount every state's terminal/nonterminal actions and default reduce,
/// then (unless `reorder` is off) renumber and reorder the states so that
/// states with the fewest choices come last, and strip the trailing
/// auto-reduce states from the effective state count. State 0 stays first.
pub fn resort_states(g: &Grammar, a: &mut Automaton, reorder: bool) {
    for st in &mut a.states {
        st.n_tkn_act = 0;
        st.n_nt_act = 0;
        st.i_dflt_reduce = -1; // "syntax error" until a default is seen
        st.i_tkn_ofst = NO_OFFSET;
        st.i_nt_ofst = NO_OFFSET;
        for ap in &st.actions {
            let encodes = matches!(
                ap.kind,
                ActionKind::Shift(..)
                    | ActionKind::ShiftReduce(..)
                    | ActionKind::Reduce(..)
                    | ActionKind::Error
                    | ActionKind::Accept
            );
            if !encodes {
                continue;
            }
            let index = g.sym(ap.sp).index;
            if index < g.nterminal {
                st.n_tkn_act += 1;
            } else if index < g.nsymbol {
                st.n_nt_act += 1;
            } else if g.sym(ap.sp).kind != SymbolKind::Multiterminal {
                // The {default} lookahead carries the state's default
                // reduce.
                debug_assert!(!st.auto_reduce || st.dflt_reduce == ap.kind.rule());
                if let ActionKind::Reduce(rp) = ap.kind {
                    st.i_dflt_reduce = g.rule(rp).irule;
                }
            }
        }
    }

    if reorder {
        let states = &a.states;
        a.sorted[1..].sort_by_key(|&id| {
            let st = &states[id.raw() as usize];
            (
                Reverse(st.n_nt_act),
                Reverse(st.n_tkn_act),
                Reverse(st.statenum),
            )
        });
        for (i, &id) in a.sorted.iter().enumerate() {
            a.states[id.raw() as usize].statenum = i as u32;
        }
    }
    let mut nxstate = a.sorted.len() as u32;
    while nxstate > 1 && a.states[a.sorted[nxstate as usize - 1].raw() as usize].auto_reduce {
        nxstate -= 1;
    }
    a.nxstate = nxstate;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::first_sets::find_first_sets;
    use crate::grammar::Grammar;
    use crate::lr0::find_states;
    use crate::table::find_actions;

    fn pipeline(f: impl FnOnce(&mut Grammar)) -> (Grammar, Automaton) {
        let mut g = Grammar::new("test.y");
        f(&mut g);
        g.finalize().unwrap();
        g.assign_rule_precedences();
        find_first_sets(&mut g);
        let mut a = find_states(&mut g).unwrap();
        crate::lalr::find_links(&mut a);
        crate::lalr::find_follow_sets(&mut a);
        find_actions(&mut g, &mut a).unwrap();
        compress_tables(&mut g, &mut a);
        resort_states(&g, &mut a, true);
        (g, a)
    }

    #[test]
    fn most_frequent_reduce_becomes_default() {
        let (g, a) = pipeline(|g| {
            let x = g.intern("X");
            let y = g.intern("Y");
            let z = g.intern("Z");
            let s = g.intern("s");
            let t = g.intern("t");
            g.add_rule(s, vec![t, x], 1);
            g.add_rule(s, vec![t, y], 2);
            g.add_rule(s, vec![t, z], 3);
            g.add_rule(t, vec![x], 4);
        });
        let default_sym = g.find(DEFAULT_SYMBOL).unwrap();
        // The state reached on the first X reduces `t ::= X` on X, Y and Z;
        // compression folds those into one default.
        let folded = a.states.iter().any(|st| {
            st.actions
                .iter()
                .any(|ap| ap.sp == default_sym && matches!(ap.kind, ActionKind::Reduce(..)))
        });
        assert!(folded);
    }

    #[test]
    fn shifts_into_autoreduce_states_are_fused() {
        let (_g, a) = pipeline(|g| {
            let a_ = g.intern("A");
            let b = g.intern("B");
            let s = g.intern("s");
            g.add_rule(s, vec![a_, b], 1);
        });
        // The state holding `s ::= A B *` only reduces; the shift on B
        // must have been rewritten into a fused shift-reduce.
        let fused = a.states.iter().any(|st| {
            st.actions
                .iter()
                .any(|ap| matches!(ap.kind, ActionKind::ShiftReduce(..)))
        });
        assert!(fused);
        // And the auto-reduce tail is excluded from the emitted states.
        assert!(a.nxstate < a.nstate());
    }

    #[test]
    fn resort_pins_state_zero_and_orders_by_choice_count() {
        let (_g, a) = pipeline(|g| {
            let a_ = g.intern("A");
            let b = g.intern("B");
            let c = g.intern("C");
            let s = g.intern("s");
            let t = g.intern("t");
            let u = g.intern("u");
            g.add_rule(s, vec![t, a_], 1);
            g.add_rule(s, vec![u, b], 2);
            g.add_rule(t, vec![c], 3);
            g.add_rule(u, vec![c, c], 4);
        });
        assert_eq!(a.states[a.sorted[0].raw() as usize].statenum, 0);
        let counts: Vec<(i32, i32)> = a
            .sorted
            .iter()
            .skip(1)
            .map(|&id| {
                let st = &a.states[id.raw() as usize];
                (st.n_nt_act, st.n_tkn_act)
            })
            .collect();
        for pair in counts.windows(2) {
            assert!(pair[0] >= pair[1], "states must be in decreasing order");
        }
    }

    #[test]
    fn default_reduce_rule_number_is_recorded() {
        let (g, a) = pipeline(|g| {
            let x = g.intern("X");
            let s = g.intern("s");
            let t = g.intern("t");
            g.add_rule(s, vec![t, x], 1);
            g.add_rule(t, vec![x], 2);
        });
        for st in &a.states {
            if let Some(rp) = st.dflt_reduce {
                if st.auto_reduce {
                    assert_eq!(st.i_dflt_reduce, g.rule(rp).irule);
                }
            }
        }
    }
}
