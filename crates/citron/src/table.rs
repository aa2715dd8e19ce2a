//! Action synthesis and conflict resolution.

use crate::action::{action_cmp, Action, ActionKind};
use crate::grammar::{Assoc, Grammar, RuleId};
use crate::lr0::Automaton;

/// Add the reduce and accept actions, sort every state's action list and
/// resolve the conflicts between actions sharing a lookahead. Unresolved
/// conflicts are counted on the grammar record; rules that no state ever
/// reduces are reported.
pub fn find_actions(g: &mut Grammar, a: &mut Automaton) -> Result<(), crate::Error> {
    // A reduce action is added for each terminal in the follow set of every
    // configuration with its dot at the extreme right.
    for si in 0..a.states.len() {
        for ci in 0..a.states[si].configs.len() {
            let cfp = a.states[si].configs[ci];
            let (rule, at_end) = {
                let c = a.config(cfp);
                let len = g.rule(c.rule).rhs.len() as u32;
                (c.rule, c.dot == len)
            };
            if !at_end {
                continue;
            }
            for j in 0..g.nterminal {
                if a.config(cfp).fws.contains(j) {
                    let sp = g.symbol_at(j);
                    let action = a.alloc.new_action(sp, ActionKind::Reduce(rule));
                    a.states[si].actions.push(action);
                }
            }
        }
    }

    // The first state accepts when the lookahead is the start nonterminal.
    let start = g.resolve_start_symbol()?;
    let accept = a.alloc.new_action(start, ActionKind::Accept);
    a.states[a.sorted[0].raw() as usize].actions.push(accept);

    // Sort and walk each run of equal lookaheads; the sort puts Shift
    // before Reduce, which the resolver depends on.
    for st in &mut a.states {
        st.actions.sort_by(|x, y| action_cmp(g, x, y));
        let n = st.actions.len();
        for i in 0..n {
            for j in i + 1..n {
                if st.actions[j].sp != st.actions[i].sp {
                    break;
                }
                let unresolved = resolve_conflict(g, &mut st.actions, i, j);
                g.conflict_count += unresolved;
            }
        }
    }

    // Report an error for each rule that can never be reduced.
    for ri in 0..g.nrule() {
        g.rule_mut(RuleId::from_raw(ri)).can_reduce = false;
    }
    for st in &a.states {
        for ap in &st.actions {
            if let ActionKind::Reduce(rp) = ap.kind {
                g.rule_mut(rp).can_reduce = true;
            }
        }
    }
    for ri in 0..g.nrule() {
        let rp = g.rule(RuleId::from_raw(ri));
        if rp.can_reduce {
            continue;
        }
        let line = rp.line;
        g.error(line, "This rule can not be reduced.");
    }
    Ok(())
}

/// Resolve a conflict between two actions on the same lookahead. Returns 1
/// if the conflict could not be resolved and was only marked. `x` precedes
/// `y` in sort order, so a Shift is always at `x`.
fn resolve_conflict(g: &Grammar, actions: &mut [Action], x: usize, y: usize) -> usize {
    debug_assert_eq!(actions[x].sp, actions[y].sp);
    let mut errcnt = 0;
    match (actions[x].kind, actions[y].kind) {
        (ActionKind::Shift(..), ActionKind::Shift(st)) => {
            actions[y].kind = ActionKind::SsConflict(st);
            errcnt += 1;
        }
        (ActionKind::Shift(stx), ActionKind::Reduce(rpy)) => {
            let spx = g.sym(actions[x].sp);
            let precy = g
                .rule(rpy)
                .precsym
                .map(|sp| (g.sym(sp).prec, g.sym(sp).assoc));
            match precy {
                None => {
                    // Not enough precedence information.
                    actions[y].kind = ActionKind::SrConflict(rpy);
                    errcnt += 1;
                }
                Some((py, _)) if spx.prec < 0 || py < 0 => {
                    actions[y].kind = ActionKind::SrConflict(rpy);
                    errcnt += 1;
                }
                Some((py, _)) if spx.prec > py => {
                    // Higher precedence wins.
                    actions[y].kind = ActionKind::RdResolved(rpy);
                }
                Some((py, _)) if spx.prec < py => {
                    actions[x].kind = ActionKind::ShResolved(stx);
                }
                Some(..) if spx.assoc == Assoc::Right => {
                    // Equal precedence: associativity breaks the tie.
                    actions[y].kind = ActionKind::RdResolved(rpy);
                }
                Some(..) if spx.assoc == Assoc::Left => {
                    actions[x].kind = ActionKind::ShResolved(stx);
                }
                Some(..) => {
                    debug_assert_eq!(spx.assoc, Assoc::Nonassoc);
                    actions[x].kind = ActionKind::Error;
                }
            }
        }
        (ActionKind::Reduce(rpx), ActionKind::Reduce(rpy)) => {
            let precx = g.rule(rpx).precsym.map(|sp| g.sym(sp).prec);
            let precy = g.rule(rpy).precsym.map(|sp| g.sym(sp).prec);
            match (precx, precy) {
                (Some(px), Some(py)) if px >= 0 && py >= 0 && px != py => {
                    if px > py {
                        actions[y].kind = ActionKind::RdResolved(rpy);
                    } else {
                        actions[x].kind = ActionKind::RdResolved(rpx);
                    }
                }
                _ => {
                    actions[y].kind = ActionKind::RrConflict(rpy);
                    errcnt += 1;
                }
            }
        }
        _ => {
            // The Reduce/Shift case cannot happen because Shift sorts
            // first; reaching here means one side was already resolved, or
            // the accept action collided with a start symbol that occurs
            // on a right-hand side (already diagnosed).
            debug_assert!(
                matches!(
                    actions[x].kind,
                    ActionKind::ShResolved(..)
                        | ActionKind::RdResolved(..)
                        | ActionKind::SsConflict(..)
                        | ActionKind::SrConflict(..)
                        | ActionKind::RrConflict(..)
                        | ActionKind::Error
                ) || matches!(
                    actions[y].kind,
                    ActionKind::ShResolved(..)
                        | ActionKind::RdResolved(..)
                        | ActionKind::SsConflict(..)
                        | ActionKind::SrConflict(..)
                        | ActionKind::RrConflict(..)
                        | ActionKind::Accept
                ),
            );
        }
    }
    errcnt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionAlloc;
    use crate::grammar::{Grammar, SymbolId};
    use crate::lr0::StateId;

    struct Fixture {
        g: Grammar,
        tok: SymbolId,
        rule: RuleId,
    }

    /// A one-token grammar whose precedences can be rewritten per case.
    fn fixture() -> Fixture {
        let mut g = Grammar::new("test.y");
        let tok = g.intern("T");
        let prec_tok = g.intern("P");
        let lhs = g.intern("a");
        let rule = g.add_rule(lhs, vec![tok], 1);
        g.rule_mut(rule).precsym = Some(prec_tok);
        g.finalize().unwrap();
        Fixture { g, tok, rule }
    }

    fn run_case(
        shift_prec: i32,
        shift_assoc: Assoc,
        reduce_prec: i32,
    ) -> (ActionKind, ActionKind, usize) {
        let mut f = fixture();
        {
            let tok = f.tok;
            let sp = f.g.sym_mut(tok);
            sp.prec = shift_prec;
            sp.assoc = shift_assoc;
        }
        {
            let psym = f.g.find("P").unwrap();
            f.g.sym_mut(psym).prec = reduce_prec;
            f.g.sym_mut(psym).assoc = shift_assoc;
        }
        let mut alloc = ActionAlloc::default();
        let mut actions = vec![
            alloc.new_action(f.tok, ActionKind::Shift(StateId::from_raw(7))),
            alloc.new_action(f.tok, ActionKind::Reduce(f.rule)),
        ];
        let n = resolve_conflict(&f.g, &mut actions, 0, 1);
        (actions[0].kind, actions[1].kind, n)
    }

    #[test]
    fn shift_reduce_truth_table() {
        // Missing precedence on either side: unresolved conflict.
        let (x, y, n) = run_case(-1, Assoc::Unknown, 5);
        assert!(matches!(x, ActionKind::Shift(..)));
        assert!(matches!(y, ActionKind::SrConflict(..)));
        assert_eq!(n, 1);

        let (_, y, n) = run_case(5, Assoc::Left, -1);
        assert!(matches!(y, ActionKind::SrConflict(..)));
        assert_eq!(n, 1);

        // Shift precedence higher: drop the reduce.
        let (x, y, n) = run_case(6, Assoc::Left, 5);
        assert!(matches!(x, ActionKind::Shift(..)));
        assert!(matches!(y, ActionKind::RdResolved(..)));
        assert_eq!(n, 0);

        // Reduce precedence higher: drop the shift.
        let (x, y, n) = run_case(4, Assoc::Left, 5);
        assert!(matches!(x, ActionKind::ShResolved(..)));
        assert!(matches!(y, ActionKind::Reduce(..)));
        assert_eq!(n, 0);

        // Equal precedence: associativity decides.
        let (x, y, n) = run_case(5, Assoc::Right, 5);
        assert!(matches!(x, ActionKind::Shift(..)));
        assert!(matches!(y, ActionKind::RdResolved(..)));
        assert_eq!(n, 0);

        let (x, y, n) = run_case(5, Assoc::Left, 5);
        assert!(matches!(x, ActionKind::ShResolved(..)));
        assert!(matches!(y, ActionKind::Reduce(..)));
        assert_eq!(n, 0);

        // Nonassoc rejects the sequence outright.
        let (x, y, n) = run_case(5, Assoc::Nonassoc, 5);
        assert!(matches!(x, ActionKind::Error));
        assert!(matches!(y, ActionKind::Reduce(..)));
        assert_eq!(n, 0);
    }

    #[test]
    fn reduce_reduce_resolution() {
        let mut f = fixture();
        let lhs2 = f.g.intern("b");
        let tok2 = f.g.intern("Q");
        let rule2 = f.g.add_rule(lhs2, vec![f.tok], 2);
        f.g.rule_mut(rule2).precsym = Some(tok2);

        // Shared or missing precedence: conflict.
        let mut alloc = ActionAlloc::default();
        let mut actions = vec![
            alloc.new_action(f.tok, ActionKind::Reduce(f.rule)),
            alloc.new_action(f.tok, ActionKind::Reduce(rule2)),
        ];
        let n = resolve_conflict(&f.g, &mut actions, 0, 1);
        assert!(matches!(actions[1].kind, ActionKind::RrConflict(..)));
        assert_eq!(n, 1);

        // Distinct precedence: the higher rule wins.
        let p = f.g.find("P").unwrap();
        let q = f.g.find("Q").unwrap();
        f.g.sym_mut(p).prec = 9;
        f.g.sym_mut(q).prec = 3;
        let mut actions = vec![
            alloc.new_action(f.tok, ActionKind::Reduce(f.rule)),
            alloc.new_action(f.tok, ActionKind::Reduce(rule2)),
        ];
        let n = resolve_conflict(&f.g, &mut actions, 0, 1);
        assert!(matches!(actions[0].kind, ActionKind::Reduce(..)));
        assert!(matches!(actions[1].kind, ActionKind::RdResolved(..)));
        assert_eq!(n, 0);
    }
}
