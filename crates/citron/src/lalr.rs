//! Follow-set propagation.
//!
//! State construction leaves every configuration with a list of backward
//! links ("my follow set should receive whatever flows into that
//! configuration"). Here the backward links are turned around into forward
//! links and the follow sets are driven to their least fixed point.

use crate::lr0::Automaton;

/// Convert every backward propagation link into a forward link. Only the
/// forward links are used by the fixed-point loop.
pub fn find_links(a: &mut Automaton) {
    for c in 0..a.configs.len() {
        for i in 0..a.configs[c].bplp.len() {
            let other = a.configs[c].bplp[i];
            a.configs[other.raw() as usize]
                .fplp
                .push(crate::lr0::ConfigId::from_raw(c as u32));
        }
    }
}

/// Union every configuration's follow set into its forward targets until a
/// full pass makes no progress. A target that grows is re-marked
/// incomplete so its own contributions are replayed.
pub fn find_follow_sets(a: &mut Automaton) {
    for cfp in &mut a.configs {
        cfp.complete = false;
    }

    let mut progress = true;
    while progress {
        progress = false;
        for c in 0..a.configs.len() {
            if a.configs[c].complete {
                continue;
            }
            let fws = a.configs[c].fws.clone();
            for i in 0..a.configs[c].fplp.len() {
                let target = a.configs[c].fplp[i].raw() as usize;
                if target == c {
                    continue;
                }
                if a.configs[target].fws.union_with(&fws) {
                    a.configs[target].complete = false;
                    progress = true;
                }
            }
            a.configs[c].complete = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::first_sets::find_first_sets;
    use crate::grammar::Grammar;
    use crate::lr0::find_states;

    /// Follow sets of completed items must contain exactly the terminals
    /// that can follow the reduced nonterminal in some sentential form.
    #[test]
    fn follow_reaches_completed_items() {
        // s ::= a X. a ::= Y.
        let mut g = Grammar::new("test.y");
        let x = g.intern("X");
        let y = g.intern("Y");
        let s = g.intern("s");
        let a_nt = g.intern("a");
        g.add_rule(s, vec![a_nt, x], 1);
        let a_rule = g.add_rule(a_nt, vec![y], 2);
        g.finalize().unwrap();
        find_first_sets(&mut g);
        let mut a = find_states(&mut g).unwrap();
        super::find_links(&mut a);
        super::find_follow_sets(&mut a);

        let x_index = g.sym(x).index;
        let completed = a
            .configs
            .iter()
            .find(|c| c.rule == a_rule && c.dot == 1)
            .expect("item `a ::= Y *` must exist");
        assert!(completed.fws.contains(x_index));
        assert!(!completed.fws.contains(0));
    }

    /// A lambda tail makes the inner item inherit the outer follow set,
    /// transitively across states.
    #[test]
    fn lambda_tails_propagate_outer_follow() {
        // s ::= a opt X. opt ::= . a ::= Y opt.
        let mut g = Grammar::new("test.y");
        let x = g.intern("X");
        let y = g.intern("Y");
        let s = g.intern("s");
        let a_nt = g.intern("a");
        let opt = g.intern("opt");
        g.add_rule(s, vec![a_nt, opt, x], 1);
        let opt_rule = g.add_rule(opt, vec![], 2);
        g.add_rule(a_nt, vec![y, opt], 3);
        g.finalize().unwrap();
        find_first_sets(&mut g);
        let mut a = find_states(&mut g).unwrap();
        super::find_links(&mut a);
        super::find_follow_sets(&mut a);

        let x_index = g.sym(x).index;
        // The empty opt rule is completed in more than one state; the one
        // reached after `a` must be followed by X.
        let hits: Vec<_> = a
            .configs
            .iter()
            .filter(|c| c.rule == opt_rule && c.dot == 0)
            .collect();
        assert!(!hits.is_empty());
        assert!(
            hits.iter().any(|c| c.fws.contains(x_index)),
            "X must reach some completed opt item"
        );
    }
}
