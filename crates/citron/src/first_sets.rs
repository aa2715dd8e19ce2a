//! Lambda and FIRST set computation.

use crate::grammar::{Grammar, SymbolKind};

/// Find all nonterminals that can generate the empty string, then compute
/// the set of terminals that can begin a string generated by each
/// nonterminal. Both are fixed points driven to completion by "progress"
/// passes over the rule list.
pub fn find_first_sets(g: &mut Grammar) {
    // Lambda closure: a nonterminal is lambda iff some rule's right-hand
    // side consists entirely of lambda nonterminals.
    loop {
        let mut progress = false;
        for ri in 0..g.nrule() {
            let rp = g.rule(crate::grammar::RuleId::from_raw(ri));
            if g.sym(rp.lhs).lambda {
                continue;
            }
            let all_lambda = rp.rhs.iter().all(|&sp| g.sym(sp).lambda);
            if all_lambda {
                let lhs = rp.lhs;
                g.sym_mut(lhs).lambda = true;
                progress = true;
            }
        }
        if !progress {
            break;
        }
    }

    // FIRST sets: walk each right-hand side left to right, adding
    // contributions and stopping at the first non-lambda symbol.
    loop {
        let mut progress = false;
        for ri in 0..g.nrule() {
            let rp = g.rule(crate::grammar::RuleId::from_raw(ri));
            let lhs = rp.lhs;
            let rhs = rp.rhs.clone();
            for sp in rhs {
                let (kind, lambda, index) = {
                    let s2 = g.sym(sp);
                    (s2.kind, s2.lambda, s2.index)
                };
                match kind {
                    SymbolKind::Terminal => {
                        progress |= g.sym_mut(lhs).first.insert(index);
                        break;
                    }
                    SymbolKind::Multiterminal => {
                        let subs: Vec<u32> = g
                            .sym(sp)
                            .constituents
                            .iter()
                            .map(|&sub| g.sym(sub).index)
                            .collect();
                        for ix in subs {
                            progress |= g.sym_mut(lhs).first.insert(ix);
                        }
                        break;
                    }
                    SymbolKind::Nonterminal if sp == lhs => {
                        // A left-recursive reference contributes nothing
                        // new; continue past it only if it is lambda.
                        if !lambda {
                            break;
                        }
                    }
                    SymbolKind::Nonterminal => {
                        let added = g.sym(sp).first.clone();
                        progress |= g.sym_mut(lhs).first.union_with(&added);
                        if !lambda {
                            break;
                        }
                    }
                }
            }
        }
        if !progress {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::TerminalSet;

    fn first_of(g: &Grammar, name: &str) -> TerminalSet {
        g.sym(g.find(name).unwrap()).first.clone()
    }

    fn index_of(g: &Grammar, name: &str) -> u32 {
        g.sym(g.find(name).unwrap()).index
    }

    #[test]
    fn lambda_closure() {
        // a ::= b c.  b ::= .  c ::= b.  d ::= X.
        let mut g = Grammar::new("test.y");
        let x = g.intern("X");
        let a = g.intern("a");
        let b = g.intern("b");
        let c = g.intern("c");
        let d = g.intern("d");
        g.add_rule(a, vec![b, c], 1);
        g.add_rule(b, vec![], 2);
        g.add_rule(c, vec![b], 3);
        g.add_rule(d, vec![x], 4);
        g.finalize().unwrap();
        find_first_sets(&mut g);

        assert!(g.sym(a).lambda);
        assert!(g.sym(b).lambda);
        assert!(g.sym(c).lambda);
        assert!(!g.sym(d).lambda);
        assert!(!g.sym(x).lambda);
    }

    #[test]
    fn first_sets_skip_lambda_prefixes() {
        // s ::= opt X.  opt ::= .  opt ::= Y.
        let mut g = Grammar::new("test.y");
        let x = g.intern("X");
        let y = g.intern("Y");
        let s = g.intern("s");
        let opt = g.intern("opt");
        g.add_rule(s, vec![opt, x], 1);
        g.add_rule(opt, vec![], 2);
        g.add_rule(opt, vec![y], 3);
        g.finalize().unwrap();
        find_first_sets(&mut g);

        let first_s = first_of(&g, "s");
        assert!(first_s.contains(index_of(&g, "X")));
        assert!(first_s.contains(index_of(&g, "Y")));
        assert!(!first_s.contains(0), "end-of-input never enters FIRST");
    }

    #[test]
    fn first_sets_stop_at_non_lambda() {
        // s ::= a Z.  a ::= A.
        let mut g = Grammar::new("test.y");
        let a_tok = g.intern("A");
        let z = g.intern("Z");
        let s = g.intern("s");
        let a = g.intern("a");
        g.add_rule(s, vec![a, z], 1);
        g.add_rule(a, vec![a_tok], 2);
        g.finalize().unwrap();
        find_first_sets(&mut g);

        let first_s = first_of(&g, "s");
        assert!(first_s.contains(index_of(&g, "A")));
        assert!(!first_s.contains(index_of(&g, "Z")));
    }

    #[test]
    fn multiterminal_contributes_every_constituent() {
        let mut g = Grammar::new("test.y");
        let int_ = g.intern("INTEGER");
        let float_ = g.intern("FLOAT");
        let num = g.token_class("num", &[int_, float_]);
        let expr = g.intern("expr");
        g.add_rule(expr, vec![num], 1);
        g.finalize().unwrap();
        find_first_sets(&mut g);

        let first = first_of(&g, "expr");
        assert!(first.contains(index_of(&g, "INTEGER")));
        assert!(first.contains(index_of(&g, "FLOAT")));
    }
}
