//! LR(0) state construction.
//!
//! States are sets of configurations (rule + dot position) identified by
//! their sorted basis. While states are built, backward propagation links
//! are recorded between configurations so the LALR(1) follow sets can be
//! computed afterwards by [`crate::lalr`].

use crate::action::{Action, ActionAlloc, ActionKind};
use crate::grammar::{Grammar, RuleId, SymbolId, SymbolKind, TerminalSet};
use crate::types::Map;
use crate::util::display_fn;
use std::fmt;

/// Sentinel meaning "this state has no row on this axis of the packed
/// action table".
pub const NO_OFFSET: i32 = -2147483647;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl StateId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "St#{:03}", self.0)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConfigId(u32);

impl ConfigId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C#{:03}", self.0)
    }
}

/// A rule with a dot, plus the follow set accumulated for it and the
/// propagation links that feed that follow set.
#[derive(Debug)]
pub struct Config {
    pub rule: RuleId,
    pub dot: u32,
    /// Follow set for this configuration only.
    pub fws: TerminalSet,
    /// Forward propagation links: whenever this follow set grows, union it
    /// into these configurations.
    pub fplp: Vec<ConfigId>,
    /// Backward propagation links, converted to forward links later.
    pub bplp: Vec<ConfigId>,
    /// The state containing this configuration.
    pub state: Option<StateId>,
    /// Work flag used by the successor and follow-set loops.
    pub complete: bool,
}

impl Config {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let rp = g.rule(self.rule);
            write!(f, "{} ::=", g.sym(rp.lhs).name)?;
            for (i, &sp) in rp.rhs.iter().enumerate() {
                if i as u32 == self.dot {
                    write!(f, " *")?;
                }
                write!(f, " {}", g.sym(sp).name)?;
            }
            if self.dot as usize == rp.rhs.len() {
                write!(f, " *")?;
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct State {
    /// Basis configurations, sorted by (rule parse-index, dot). Two states
    /// are the same state iff their bases are element-wise equal.
    pub basis: Vec<ConfigId>,
    /// The closure: basis plus all expansion items, in the same sort order.
    pub configs: Vec<ConfigId>,
    /// Current sequence number; rewritten when the states are resorted.
    pub statenum: u32,
    pub actions: Vec<Action>,
    pub n_tkn_act: i32,
    pub n_nt_act: i32,
    pub i_tkn_ofst: i32,
    pub i_nt_ofst: i32,
    /// Table number of the default reduce rule, or -1 for "syntax error".
    pub i_dflt_reduce: i32,
    /// The default reduce rule picked by table compression.
    pub dflt_reduce: Option<RuleId>,
    /// True if the only possible action is the single default reduce.
    pub auto_reduce: bool,
}

/// The LR(0) automaton: a configuration arena plus the state arena and the
/// presentation order of states.
#[derive(Debug)]
pub struct Automaton {
    pub configs: Vec<Config>,
    pub states: Vec<State>,
    /// States in `statenum` order; the resort permutes this, not the arena.
    pub sorted: Vec<StateId>,
    /// Effective state count after trailing auto-reduce states are trimmed.
    pub nxstate: u32,
    /// Creation-index source shared by all action factories.
    pub(crate) alloc: ActionAlloc,
}

impl Automaton {
    pub fn config(&self, id: ConfigId) -> &Config {
        &self.configs[id.0 as usize]
    }

    pub fn config_mut(&mut self, id: ConfigId) -> &mut Config {
        &mut self.configs[id.0 as usize]
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0 as usize]
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id.0 as usize]
    }

    pub fn nstate(&self) -> u32 {
        self.states.len() as u32
    }
}

/// Compute all LR(0) states for the grammar, recording follow-set
/// propagation links along the way.
pub fn find_states(g: &mut Grammar) -> Result<Automaton, crate::Error> {
    let start = g.resolve_start_symbol()?;

    // The start symbol may not occur on the right-hand side of any rule;
    // yacc would invent a fresh start symbol, we report and carry on.
    for ri in 0..g.nrule() {
        let rp = g.rule(RuleId::from_raw(ri));
        if rp.rhs.contains(&start) {
            let name = g.sym(start).name.clone();
            let line = g.rule(RuleId::from_raw(ri)).line;
            g.error(
                line,
                &format!(
                    "The start symbol \"{name}\" occurs on the right-hand side of a rule. \
                     This will result in a parser which does not work properly."
                ),
            );
        }
    }

    let mut builder = Builder {
        g,
        configs: Vec::new(),
        states: Vec::new(),
        current: Vec::new(),
        basis: Vec::new(),
        intern: Map::default(),
        states_by_basis: Map::default(),
        alloc: ActionAlloc::default(),
    };

    // The basis of the first state is every rule of the start symbol with
    // the dot at the left end and end-of-input in the follow set.
    let start_rules = builder.g.sym(start).rules.clone();
    for rp in start_rules {
        builder.g.rule_mut(rp).lhs_start = true;
        let cfp = builder.add_basis(rp, 0);
        builder.configs[cfp.0 as usize].fws.insert(0);
    }
    builder.get_state();

    let sorted: Vec<StateId> = (0..builder.states.len() as u32).map(StateId).collect();
    let nxstate = builder.states.len() as u32;
    Ok(Automaton {
        configs: builder.configs,
        states: builder.states,
        sorted,
        nxstate,
        alloc: builder.alloc,
    })
}

struct Builder<'g> {
    g: &'g mut Grammar,
    configs: Vec<Config>,
    states: Vec<State>,
    /// The configuration list under construction.
    current: Vec<ConfigId>,
    /// The basis sublist of `current`.
    basis: Vec<ConfigId>,
    /// Per-state intern table for configurations, cleared at every state
    /// boundary so that (rule, dot) identity is local to one state.
    intern: Map<(RuleId, u32), ConfigId>,
    /// Persistent state intern table keyed by the sorted basis.
    states_by_basis: Map<Vec<(u32, u32)>, StateId>,
    alloc: ActionAlloc,
}

impl Builder<'_> {
    fn new_config(&mut self, rule: RuleId, dot: u32) -> ConfigId {
        let id = ConfigId(self.configs.len() as u32);
        self.configs.push(Config {
            rule,
            dot,
            fws: TerminalSet::default(),
            fplp: Vec::new(),
            bplp: Vec::new(),
            state: None,
            complete: false,
        });
        id
    }

    /// Add a configuration to the list under construction, interning by
    /// (rule, dot).
    fn add_config(&mut self, rule: RuleId, dot: u32) -> ConfigId {
        if let Some(&id) = self.intern.get(&(rule, dot)) {
            return id;
        }
        let id = self.new_config(rule, dot);
        self.intern.insert((rule, dot), id);
        self.current.push(id);
        id
    }

    /// Add a basis configuration to the list under construction.
    fn add_basis(&mut self, rule: RuleId, dot: u32) -> ConfigId {
        if let Some(&id) = self.intern.get(&(rule, dot)) {
            return id;
        }
        let id = self.new_config(rule, dot);
        self.intern.insert((rule, dot), id);
        self.current.push(id);
        self.basis.push(id);
        id
    }

    /// Reset the configuration-list builder for the next successor.
    fn reset_lists(&mut self) {
        self.current.clear();
        self.basis.clear();
        self.intern.clear();
    }

    fn sort_key(&self, id: ConfigId) -> (u32, u32) {
        let cfp = &self.configs[id.0 as usize];
        (self.g.rule(cfp.rule).index, cfp.dot)
    }

    /// Return the state described by the basis built up in `self.basis`,
    /// constructing it (and, recursively, its successors) if it is new.
    fn get_state(&mut self) -> StateId {
        let mut basis = std::mem::take(&mut self.basis);
        basis.sort_by_key(|&id| self.sort_key(id));
        let key: Vec<(u32, u32)> = basis.iter().map(|&id| self.sort_key(id)).collect();

        if let Some(&existing) = self.states_by_basis.get(&key) {
            // A state with the same basis already exists. Merge the new
            // backward links into it and discard the configurations just
            // built; the follow sets will reach the old state through the
            // merged links.
            let old_basis = self.states[existing.0 as usize].basis.clone();
            for (&fresh, &old) in basis.iter().zip(old_basis.iter()) {
                let links = std::mem::take(&mut self.configs[fresh.0 as usize].bplp);
                self.configs[old.0 as usize].bplp.extend(links);
                self.configs[fresh.0 as usize].fplp.clear();
            }
            self.current.clear();
            return existing;
        }

        self.closure();
        let mut configs = std::mem::take(&mut self.current);
        configs.sort_by_key(|&id| self.sort_key(id));

        let id = StateId(self.states.len() as u32);
        self.states.push(State {
            basis: basis.clone(),
            configs: configs.clone(),
            statenum: id.0,
            actions: Vec::new(),
            n_tkn_act: 0,
            n_nt_act: 0,
            i_tkn_ofst: NO_OFFSET,
            i_nt_ofst: NO_OFFSET,
            i_dflt_reduce: -1,
            dflt_reduce: None,
            auto_reduce: false,
        });
        self.states_by_basis.insert(key, id);
        for &cfp in &configs {
            self.configs[cfp.0 as usize].state = Some(id);
        }
        self.build_shifts(id);
        id
    }

    /// Compute the closure of the configuration list: for every item with
    /// the dot before a nonterminal, add that nonterminal's rules at dot 0
    /// and seed their follow sets from the tail of the expanding rule. If
    /// the whole tail can derive the empty string, the inner item inherits
    /// the outer item's follow set through a propagation link.
    fn closure(&mut self) {
        let mut i = 0;
        while i < self.current.len() {
            let cfp = self.current[i];
            i += 1;
            let (rule, dot) = {
                let c = &self.configs[cfp.0 as usize];
                (c.rule, c.dot)
            };
            let rhs = self.g.rule(rule).rhs.clone();
            let Some(&sp) = rhs.get(dot as usize) else {
                continue;
            };
            if self.g.sym(sp).kind != SymbolKind::Nonterminal {
                continue;
            }
            if self.g.sym(sp).rules.is_empty() && Some(sp) != self.g.error_symbol {
                let name = self.g.sym(sp).name.clone();
                let line = self.g.rule(rule).line;
                self.g
                    .error(line, &format!("Nonterminal \"{name}\" has no rules."));
            }
            for newrp in self.g.sym(sp).rules.clone() {
                let newcfp = self.add_config(newrp, 0);
                let mut tail_lambda = true;
                for &xsp in &rhs[dot as usize + 1..] {
                    let (kind, lambda, index) = {
                        let x = self.g.sym(xsp);
                        (x.kind, x.lambda, x.index)
                    };
                    match kind {
                        SymbolKind::Terminal => {
                            self.configs[newcfp.0 as usize].fws.insert(index);
                            tail_lambda = false;
                            break;
                        }
                        SymbolKind::Multiterminal => {
                            let subs: Vec<u32> = self
                                .g
                                .sym(xsp)
                                .constituents
                                .iter()
                                .map(|&sub| self.g.sym(sub).index)
                                .collect();
                            for ix in subs {
                                self.configs[newcfp.0 as usize].fws.insert(ix);
                            }
                            tail_lambda = false;
                            break;
                        }
                        SymbolKind::Nonterminal => {
                            let first = self.g.sym(xsp).first.clone();
                            self.configs[newcfp.0 as usize].fws.union_with(&first);
                            if !lambda {
                                tail_lambda = false;
                                break;
                            }
                        }
                    }
                }
                if tail_lambda {
                    self.configs[cfp.0 as usize].fplp.push(newcfp);
                }
            }
        }
    }

    /// Construct all successor states of `stp` and emit a shift action for
    /// each transition symbol.
    fn build_shifts(&mut self, stp: StateId) {
        let closure = self.states[stp.0 as usize].configs.clone();
        for &cfp in &closure {
            self.configs[cfp.0 as usize].complete = false;
        }

        for (pos, &cfp) in closure.iter().enumerate() {
            if self.configs[cfp.0 as usize].complete {
                continue;
            }
            let (rule, dot) = {
                let c = &self.configs[cfp.0 as usize];
                (c.rule, c.dot)
            };
            let Some(&sp) = self.g.rule(rule).rhs.get(dot as usize) else {
                continue;
            };
            self.reset_lists();

            // Group every configuration of the state with the same symbol
            // after its dot into the basis of one successor, shifting the
            // dot right by one.
            for &bcfp in &closure[pos..] {
                if self.configs[bcfp.0 as usize].complete {
                    continue;
                }
                let (brule, bdot) = {
                    let c = &self.configs[bcfp.0 as usize];
                    (c.rule, c.dot)
                };
                let Some(&bsp) = self.g.rule(brule).rhs.get(bdot as usize) else {
                    continue;
                };
                if !self.same_symbol(bsp, sp) {
                    continue;
                }
                self.configs[bcfp.0 as usize].complete = true;
                let newcfg = self.add_basis(brule, bdot + 1);
                self.configs[newcfg.0 as usize].bplp.push(bcfp);
            }

            let newstp = self.get_state();

            if self.g.sym(sp).kind == SymbolKind::Multiterminal {
                for sub in self.g.sym(sp).constituents.clone() {
                    let action = self.alloc.new_action(sub, ActionKind::Shift(newstp));
                    self.states[stp.0 as usize].actions.push(action);
                }
            } else {
                let action = self.alloc.new_action(sp, ActionKind::Shift(newstp));
                self.states[stp.0 as usize].actions.push(action);
            }
        }
    }

    /// Two RHS slots shift together iff they hold the same symbol; two
    /// multiterminals count as the same symbol iff their constituent lists
    /// are element-wise identical.
    fn same_symbol(&self, a: SymbolId, b: SymbolId) -> bool {
        if a == b {
            return true;
        }
        let (sa, sb) = (self.g.sym(a), self.g.sym(b));
        sa.kind == SymbolKind::Multiterminal
            && sb.kind == SymbolKind::Multiterminal
            && sa.constituents == sb.constituents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::first_sets::find_first_sets;
    use crate::grammar::Grammar;

    fn automaton(f: impl FnOnce(&mut Grammar)) -> (Grammar, Automaton) {
        let mut g = Grammar::new("test.y");
        f(&mut g);
        g.finalize().unwrap();
        g.assign_rule_precedences();
        find_first_sets(&mut g);
        let a = find_states(&mut g).unwrap();
        (g, a)
    }

    #[test]
    fn straight_line_grammar_has_one_state_per_prefix() {
        let (_g, a) = automaton(|g| {
            let a_ = g.intern("A");
            let b = g.intern("B");
            let s = g.intern("s");
            g.add_rule(s, vec![a_, b], 1);
        });
        // s ::= * A B ; s ::= A * B ; s ::= A B *
        assert_eq!(a.nstate(), 3);
    }

    #[test]
    fn bases_dedup_shared_suffixes() {
        let (_g, a) = automaton(|g| {
            let x = g.intern("X");
            let y = g.intern("Y");
            let s = g.intern("s");
            let t = g.intern("t");
            g.add_rule(s, vec![t, x], 1);
            g.add_rule(t, vec![y], 2);
            g.add_rule(t, vec![y], 3); // distinct rule, same shape
        });
        // The two t-rules stay distinct configurations, but each dot
        // position still yields exactly one state.
        let mut seen = std::collections::HashSet::new();
        for st in &a.states {
            let key: Vec<_> = st
                .basis
                .iter()
                .map(|&c| (a.config(c).rule, a.config(c).dot))
                .collect();
            assert!(seen.insert(key), "duplicate basis");
        }
    }

    #[test]
    fn isomorphic_grammars_build_isomorphic_automata() {
        let shape = |names: [&'static str; 5]| {
            move |g: &mut Grammar| {
                let plus = g.intern(names[0]);
                let star = g.intern(names[1]);
                let id = g.intern(names[2]);
                let e = g.intern(names[3]);
                let t = g.intern(names[4]);
                g.add_rule(e, vec![e, plus, t], 1);
                g.add_rule(e, vec![t], 2);
                g.add_rule(t, vec![t, star, id], 3);
                g.add_rule(t, vec![id], 4);
            }
        };
        let (_g1, a1) = automaton(shape(["PLUS", "STAR", "ID", "e", "t"]));
        let (_g2, a2) = automaton(shape(["ADD", "MUL", "NAME", "expr", "term"]));

        assert_eq!(a1.nstate(), a2.nstate());
        for (s1, s2) in a1.states.iter().zip(a2.states.iter()) {
            let b1: Vec<_> = s1
                .basis
                .iter()
                .map(|&c| (a1.config(c).rule, a1.config(c).dot))
                .collect();
            let b2: Vec<_> = s2
                .basis
                .iter()
                .map(|&c| (a2.config(c).rule, a2.config(c).dot))
                .collect();
            assert_eq!(b1, b2);
        }
    }

    #[test]
    fn shift_actions_cover_every_outgoing_symbol() {
        let (g, a) = automaton(|g| {
            let a_ = g.intern("A");
            let b = g.intern("B");
            let s = g.intern("s");
            g.add_rule(s, vec![a_, b], 1);
            g.add_rule(s, vec![b], 2);
        });
        let state0 = &a.states[0];
        let shifted: Vec<&str> = state0
            .actions
            .iter()
            .filter(|ap| matches!(ap.kind, ActionKind::Shift(..)))
            .map(|ap| g.sym(ap.sp).name.as_str())
            .collect();
        assert!(shifted.contains(&"A"));
        assert!(shifted.contains(&"B"));
    }

    #[test]
    fn token_class_shifts_every_constituent_to_one_state() {
        let (g, a) = automaton(|g| {
            let int_ = g.intern("INTEGER");
            let float_ = g.intern("FLOAT");
            let num = g.token_class("num", &[int_, float_]);
            let expr = g.intern("expr");
            g.add_rule(expr, vec![num], 1);
        });
        let state0 = &a.states[0];
        let mut targets = Vec::new();
        for ap in &state0.actions {
            if let ActionKind::Shift(next) = ap.kind {
                let name = g.sym(ap.sp).name.as_str();
                if name == "INTEGER" || name == "FLOAT" {
                    targets.push(next);
                }
            }
        }
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0], targets[1]);
    }
}
