//! Packed-table assembly and the generated-source writer.
//!
//! [`build_tables`] runs stage I: it fixes the numeric action encoding,
//! lays every state's terminal and nonterminal rows into the shared action
//! array and assembles everything the emitted parser needs. [`Codegen`]
//! renders the result as a Rust module for `citron_runtime`.

use crate::action::ActionKind;
use crate::acttab::ActTab;
use crate::grammar::{Grammar, SymbolKind};
use crate::lr0::{Automaton, NO_OFFSET};
use crate::util::display_fn;
use std::cmp::Reverse;
use std::fmt;

/// Everything the emitter exposes to the consumer of one grammar: the
/// packed tables, their offsets, and the count summary.
#[derive(Debug)]
pub struct ParserTables {
    pub action: Vec<u32>,
    pub lookahead: Vec<u16>,
    pub shift_ofst: Vec<i32>,
    pub reduce_ofst: Vec<i32>,
    pub default_action: Vec<u32>,
    /// Empty unless the grammar used `%fallback`.
    pub fallback: Vec<u16>,
    pub rule_lhs: Vec<u16>,
    pub rule_nrhs: Vec<u16>,
    pub symbol_names: Vec<String>,
    pub rule_text: Vec<String>,

    pub nstate: u32,
    pub nxstate: u32,
    pub nrule: u32,
    pub nrule_with_action: u32,
    pub nsymbol: u32,
    pub nterminal: u32,

    pub min_shiftreduce: u32,
    pub max_shiftreduce: u32,
    pub err_action: u32,
    pub acc_action: u32,
    pub no_action: u32,
    pub min_reduce: u32,
    pub max_action: u32,

    pub shift_min: i32,
    pub shift_max: i32,
    pub reduce_min: i32,
    pub reduce_max: i32,
    pub n_action_tab: u32,
    pub n_lookahead_tab: u32,

    pub wildcard_index: u16,
    pub error_index: u16,
    /// Estimated total size of the emitted tables in bytes, assuming the
    /// narrowest integer type that fits each one.
    pub table_size: usize,
}

impl ParserTables {
    /// View the tables through the runtime engine's definition.
    pub fn runtime(&self) -> citron_runtime::Tables<'_> {
        citron_runtime::Tables {
            action: &self.action,
            lookahead: &self.lookahead,
            shift_ofst: &self.shift_ofst,
            reduce_ofst: &self.reduce_ofst,
            default_action: &self.default_action,
            fallback: &self.fallback,
            rule_lhs: &self.rule_lhs,
            rule_nrhs: &self.rule_nrhs,
            nterminal: self.nterminal as u16,
            nsymbol: self.nsymbol as u16,
            max_shift: self.nxstate - 1,
            min_shiftreduce: self.min_shiftreduce,
            max_shiftreduce: self.max_shiftreduce,
            error_action: self.err_action,
            accept_action: self.acc_action,
            no_action: self.no_action,
            min_reduce: self.min_reduce,
            max_reduce: self.max_action - 1,
            wildcard: self.wildcard_index,
            error_symbol: self.error_index,
        }
    }
}

/// The numeric value of one action, or -1 if the action does not appear in
/// the emitted tables.
fn compute_action(g: &Grammar, a: &Automaton, t: &Boundaries, ap: &crate::action::Action) -> i32 {
    match ap.kind {
        ActionKind::Shift(st) => a.state(st).statenum as i32,
        ActionKind::ShiftReduce(rp) => {
            // A shift is inherent after a prior reduce, so a shift-reduce
            // whose lookahead is a nonterminal (other than the error
            // symbol) collapses to a plain reduce.
            let index = g.sym(ap.sp).index;
            let is_err = g.error_symbol.map(|e| g.sym(e).index) == Some(index);
            if index >= g.nterminal && !is_err {
                (t.min_reduce + g.rule(rp).irule as u32) as i32
            } else {
                (t.min_shiftreduce + g.rule(rp).irule as u32) as i32
            }
        }
        ActionKind::Reduce(rp) => (t.min_reduce + g.rule(rp).irule as u32) as i32,
        ActionKind::Error => t.err_action as i32,
        ActionKind::Accept => t.acc_action as i32,
        _ => -1,
    }
}

struct Boundaries {
    min_shiftreduce: u32,
    err_action: u32,
    acc_action: u32,
    no_action: u32,
    min_reduce: u32,
    max_action: u32,
}

/// The narrowest unsigned integer width (in bytes) that holds every value
/// in `lwr..=upr`; used only for the table-size statistic.
fn min_size_bytes(lwr: i64, upr: i64) -> usize {
    if lwr >= 0 {
        if upr <= u8::MAX as i64 {
            1
        } else if upr <= u16::MAX as i64 {
            2
        } else {
            4
        }
    } else if lwr >= i8::MIN as i64 && upr <= i8::MAX as i64 {
        1
    } else if lwr >= i16::MIN as i64 && upr <= i16::MAX as i64 {
        2
    } else {
        4
    }
}

/// Stage I: pack the per-state action rows into the shared action table
/// and assemble the full emitted surface.
pub fn build_tables(g: &mut Grammar, a: &mut Automaton) -> ParserTables {
    let nxstate = a.nxstate;
    let nrule = g.nrule();
    let bounds = {
        let min_shiftreduce = nxstate;
        let err_action = min_shiftreduce + nrule;
        let acc_action = err_action + 1;
        let no_action = acc_action + 1;
        let min_reduce = no_action + 1;
        Boundaries {
            min_shiftreduce,
            err_action,
            acc_action,
            no_action,
            min_reduce,
            max_action: min_reduce + nrule,
        }
    };

    // Two sparse rows per state, largest action count first; the heuristic
    // keeps the final table small.
    struct AxSet {
        state: crate::lr0::StateId,
        is_tkn: bool,
        n_action: i32,
    }
    let mut ax = Vec::with_capacity(nxstate as usize * 2);
    for i in 0..nxstate as usize {
        let id = a.sorted[i];
        let st = a.state(id);
        ax.push(AxSet {
            state: id,
            is_tkn: true,
            n_action: st.n_tkn_act,
        });
        ax.push(AxSet {
            state: id,
            is_tkn: false,
            n_action: st.n_nt_act,
        });
    }
    let order: Vec<usize> = {
        let mut order: Vec<usize> = (0..ax.len()).collect();
        order.sort_by_key(|&i| (Reverse(ax[i].n_action), i));
        order
    };

    let mut acttab = ActTab::new(g.nsymbol, g.nterminal);
    let (mut mn_tkn_ofst, mut mx_tkn_ofst) = (0i32, 0i32);
    let (mut mn_nt_ofst, mut mx_nt_ofst) = (0i32, 0i32);
    for &i in &order {
        if ax[i].n_action <= 0 {
            break;
        }
        let sid = ax[i].state;
        if ax[i].is_tkn {
            for ai in 0..a.state(sid).actions.len() {
                let ap = &a.state(sid).actions[ai];
                if g.sym(ap.sp).index >= g.nterminal {
                    continue;
                }
                let action = compute_action(g, a, &bounds, ap);
                if action < 0 {
                    continue;
                }
                let index = g.sym(ap.sp).index;
                acttab.add_action(index as i32, action);
            }
            let ofst = acttab.insert(true);
            a.state_mut(sid).i_tkn_ofst = ofst;
            mn_tkn_ofst = mn_tkn_ofst.min(ofst);
            mx_tkn_ofst = mx_tkn_ofst.max(ofst);
        } else {
            for ai in 0..a.state(sid).actions.len() {
                let ap = &a.state(sid).actions[ai];
                let index = g.sym(ap.sp).index;
                if index < g.nterminal || index == g.nsymbol {
                    continue;
                }
                if g.sym(ap.sp).kind == SymbolKind::Multiterminal {
                    continue;
                }
                let action = compute_action(g, a, &bounds, ap);
                if action < 0 {
                    continue;
                }
                acttab.add_action(index as i32, action);
            }
            let ofst = acttab.insert(false);
            a.state_mut(sid).i_nt_ofst = ofst;
            mn_nt_ofst = mn_nt_ofst.min(ofst);
            mx_nt_ofst = mx_nt_ofst.max(ofst);
        }
    }

    // Mark the rules that still reduce after all the optimizations.
    for ri in 0..nrule {
        g.rule_mut(crate::grammar::RuleId::from_raw(ri)).does_reduce = false;
    }
    for i in 0..nxstate as usize {
        let id = a.sorted[i];
        for ap in &a.state(id).actions {
            if let ActionKind::Reduce(rp) | ActionKind::ShiftReduce(rp) = ap.kind {
                g.rule_mut(rp).does_reduce = true;
            }
        }
    }

    let mut table_size = 0usize;
    let sz_action = min_size_bytes(0, bounds.max_action as i64);
    let sz_code = min_size_bytes(0, g.nsymbol as i64 + 1);

    // yy_action, with empty slots encoded as the no-op action.
    let n_action_tab = acttab.action_size();
    let action: Vec<u32> = (0..n_action_tab)
        .map(|i| {
            let v = acttab.action(i);
            if v < 0 {
                bounds.no_action
            } else {
                v as u32
            }
        })
        .collect();
    table_size += n_action_tab * sz_action;

    // yy_lookahead, padded so that any shift offset plus any token index
    // stays inside the array. Empty slots read as nsymbol and the padding
    // as nterminal, neither of which matches a real terminal.
    let n_lookahead_tab = acttab.lookahead_size();
    let mut lookahead: Vec<u16> = (0..n_lookahead_tab)
        .map(|i| {
            let v = acttab.lookahead(i);
            if v < 0 {
                g.nsymbol as u16
            } else {
                v as u16
            }
        })
        .collect();
    while lookahead.len() < g.nterminal as usize + n_action_tab {
        lookahead.push(g.nterminal as u16);
    }
    table_size += lookahead.len() * sz_code;

    // yy_shift_ofst, trailing rowless states trimmed.
    let mut n = nxstate as usize;
    while n > 0 && a.state(a.sorted[n - 1]).i_tkn_ofst == NO_OFFSET {
        n -= 1;
    }
    let shift_ofst: Vec<i32> = (0..n)
        .map(|i| {
            let ofst = a.state(a.sorted[i]).i_tkn_ofst;
            if ofst == NO_OFFSET {
                n_action_tab as i32
            } else {
                ofst
            }
        })
        .collect();
    table_size += n * min_size_bytes(mn_tkn_ofst as i64, (g.nterminal as usize + n_action_tab) as i64);

    // yy_reduce_ofst, same trimming.
    let mut n = nxstate as usize;
    while n > 0 && a.state(a.sorted[n - 1]).i_nt_ofst == NO_OFFSET {
        n -= 1;
    }
    let reduce_ofst: Vec<i32> = (0..n)
        .map(|i| {
            let ofst = a.state(a.sorted[i]).i_nt_ofst;
            if ofst == NO_OFFSET {
                mn_nt_ofst - 1
            } else {
                ofst
            }
        })
        .collect();
    table_size += n * min_size_bytes(mn_nt_ofst as i64 - 1, mx_nt_ofst as i64);

    // yy_default.
    let default_action: Vec<u32> = (0..nxstate as usize)
        .map(|i| {
            let st = a.state(a.sorted[i]);
            if st.i_dflt_reduce < 0 {
                bounds.err_action
            } else {
                bounds.min_reduce + st.i_dflt_reduce as u32
            }
        })
        .collect();
    table_size += nxstate as usize * sz_action;

    // Fallback tokens, one entry per terminal so the engine never needs a
    // range check.
    let mut fallback = Vec::new();
    if g.has_fallback {
        for ix in 0..g.nterminal {
            let id = g.symbol_at(ix);
            fallback.push(match g.sym(id).fallback {
                Some(fb) => g.sym(fb).index as u16,
                None => 0,
            });
        }
        table_size += fallback.len() * sz_code;
    }

    let symbol_names: Vec<String> = (0..g.nsymbol)
        .map(|ix| g.sym(g.symbol_at(ix)).name.clone())
        .collect();

    let irule_order = g.rules_in_irule_order();
    let rule_lhs: Vec<u16> = irule_order
        .iter()
        .map(|&rp| g.sym(g.rule(rp).lhs).index as u16)
        .collect();
    let rule_nrhs: Vec<u16> = irule_order
        .iter()
        .map(|&rp| g.rule(rp).rhs.len() as u16)
        .collect();
    let rule_text: Vec<String> = irule_order
        .iter()
        .map(|&rp| g.rule(rp).display(g).to_string())
        .collect();

    ParserTables {
        action,
        lookahead,
        shift_ofst,
        reduce_ofst,
        default_action,
        fallback,
        rule_lhs,
        rule_nrhs,
        symbol_names,
        rule_text,
        nstate: a.nstate(),
        nxstate,
        nrule,
        nrule_with_action: g.nrule_with_action,
        nsymbol: g.nsymbol,
        nterminal: g.nterminal,
        min_shiftreduce: bounds.min_shiftreduce,
        max_shiftreduce: bounds.min_shiftreduce + nrule - 1,
        err_action: bounds.err_action,
        acc_action: bounds.acc_action,
        no_action: bounds.no_action,
        min_reduce: bounds.min_reduce,
        max_action: bounds.max_action,
        shift_min: mn_tkn_ofst,
        shift_max: mx_tkn_ofst,
        reduce_min: mn_nt_ofst,
        reduce_max: mx_nt_ofst,
        n_action_tab: n_action_tab as u32,
        n_lookahead_tab: n_lookahead_tab as u32,
        wildcard_index: g.wildcard.map_or(0, |w| g.sym(w).index as u16),
        error_index: g.error_symbol.map_or(0, |e| g.sym(e).index as u16),
        table_size,
    }
}

/// The fixed scaffolding of a generated file. A user template (`-T`)
/// replaces it; the single `%%` line separates the preamble from the
/// postamble, with the machine-written tables in between.
const DEFAULT_TEMPLATE: &str = "\
// Parser tables generated by citron. Editing this file is futile: it is
// overwritten on every regeneration.
#![cfg_attr(rustfmt, rustfmt::skip)]
#![allow(clippy::all)]

use citron_runtime::Tables;

%%
";

/// Renders one grammar's tables as a Rust source file.
pub struct Codegen<'a> {
    g: &'a Grammar,
    t: &'a ParserTables,
    template: &'a str,
    line_comments: bool,
}

impl<'a> Codegen<'a> {
    pub fn new(g: &'a Grammar, t: &'a ParserTables) -> Self {
        Self {
            g,
            t,
            template: DEFAULT_TEMPLATE,
            line_comments: true,
        }
    }

    /// Replace the default file scaffolding.
    pub fn with_template(mut self, template: &'a str) -> Self {
        self.template = template;
        self
    }

    /// Suppress the `/* index */` comments inside emitted tables.
    pub fn without_line_comments(mut self) -> Self {
        self.line_comments = false;
        self
    }

    fn write_table<T: fmt::Display>(
        &self,
        f: &mut fmt::Formatter<'_>,
        name: &str,
        ty: &str,
        values: &[T],
    ) -> fmt::Result {
        writeln!(f, "pub static {}: [{}; {}] = [", name, ty, values.len())?;
        for (i, chunk) in values.chunks(10).enumerate() {
            write!(f, "    ")?;
            if self.line_comments {
                write!(f, "/* {:5} */ ", i * 10)?;
            }
            for v in chunk {
                write!(f, "{}, ", v)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "];")
    }
}

impl fmt::Display for Codegen<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.t;
        let (preamble, postamble) = match self.template.split_once("\n%%") {
            Some((pre, post)) => (pre, post.strip_prefix('\n').unwrap_or(post)),
            None => (self.template, ""),
        };
        writeln!(f, "// Grammar: {}", self.g.filename)?;
        if let Some(name) = &self.g.name {
            writeln!(f, "// Parser name: {}", name)?;
        }
        f.write_str(preamble)?;
        writeln!(f)?;

        // Token code constants, honoring %token_prefix.
        let prefix = self.g.token_prefix.as_deref().unwrap_or("");
        for ix in 1..t.nterminal {
            let name = &t.symbol_names[ix as usize];
            writeln!(f, "pub const {}{}: u16 = {};", prefix, name, ix)?;
        }
        writeln!(f)?;

        writeln!(f, "pub const YYNSTATE: usize = {};", t.nxstate)?;
        writeln!(f, "pub const YYNRULE: usize = {};", t.nrule)?;
        writeln!(
            f,
            "pub const YYNRULE_WITH_ACTION: usize = {};",
            t.nrule_with_action
        )?;
        writeln!(f, "pub const YYNTOKEN: usize = {};", t.nterminal)?;
        writeln!(f, "pub const YY_MAX_SHIFT: u32 = {};", t.nxstate - 1)?;
        writeln!(f, "pub const YY_MIN_SHIFTREDUCE: u32 = {};", t.min_shiftreduce)?;
        writeln!(f, "pub const YY_MAX_SHIFTREDUCE: u32 = {};", t.max_shiftreduce)?;
        writeln!(f, "pub const YY_ERROR_ACTION: u32 = {};", t.err_action)?;
        writeln!(f, "pub const YY_ACCEPT_ACTION: u32 = {};", t.acc_action)?;
        writeln!(f, "pub const YY_NO_ACTION: u32 = {};", t.no_action)?;
        writeln!(f, "pub const YY_MIN_REDUCE: u32 = {};", t.min_reduce)?;
        writeln!(f, "pub const YY_MAX_REDUCE: u32 = {};", t.max_action - 1)?;
        writeln!(f, "pub const YY_ACTTAB_COUNT: usize = {};", t.n_action_tab)?;
        writeln!(f, "pub const YY_SHIFT_COUNT: i32 = {};", t.shift_ofst.len() as i32 - 1)?;
        writeln!(f, "pub const YY_SHIFT_MIN: i32 = {};", t.shift_min)?;
        writeln!(f, "pub const YY_SHIFT_MAX: i32 = {};", t.shift_max)?;
        writeln!(f, "pub const YY_REDUCE_COUNT: i32 = {};", t.reduce_ofst.len() as i32 - 1)?;
        writeln!(f, "pub const YY_REDUCE_MIN: i32 = {};", t.reduce_min)?;
        writeln!(f, "pub const YY_REDUCE_MAX: i32 = {};", t.reduce_max)?;
        writeln!(f)?;

        self.write_table(f, "YY_ACTION", "u32", &t.action)?;
        self.write_table(f, "YY_LOOKAHEAD", "u16", &t.lookahead)?;
        self.write_table(f, "YY_SHIFT_OFST", "i32", &t.shift_ofst)?;
        self.write_table(f, "YY_REDUCE_OFST", "i32", &t.reduce_ofst)?;
        self.write_table(f, "YY_DEFAULT", "u32", &t.default_action)?;
        if !t.fallback.is_empty() {
            self.write_table(f, "YY_FALLBACK", "u16", &t.fallback)?;
        }
        self.write_table(f, "YY_RULE_LHS", "u16", &t.rule_lhs)?;
        self.write_table(f, "YY_RULE_NRHS", "u16", &t.rule_nrhs)?;

        let quoted: Vec<String> = t.symbol_names.iter().map(|s| format!("{:?}", s)).collect();
        self.write_table(f, "YY_SYMBOL_NAMES", "&str", &quoted)?;
        let quoted: Vec<String> = t.rule_text.iter().map(|s| format!("{:?}", s)).collect();
        self.write_table(f, "YY_RULE_TEXT", "&str", &quoted)?;
        writeln!(f)?;

        writeln!(f, "pub static TABLES: Tables<'static> = Tables {{")?;
        writeln!(f, "    action: &YY_ACTION,")?;
        writeln!(f, "    lookahead: &YY_LOOKAHEAD,")?;
        writeln!(f, "    shift_ofst: &YY_SHIFT_OFST,")?;
        writeln!(f, "    reduce_ofst: &YY_REDUCE_OFST,")?;
        writeln!(f, "    default_action: &YY_DEFAULT,")?;
        if t.fallback.is_empty() {
            writeln!(f, "    fallback: &[],")?;
        } else {
            writeln!(f, "    fallback: &YY_FALLBACK,")?;
        }
        writeln!(f, "    rule_lhs: &YY_RULE_LHS,")?;
        writeln!(f, "    rule_nrhs: &YY_RULE_NRHS,")?;
        writeln!(f, "    nterminal: {},", t.nterminal)?;
        writeln!(f, "    nsymbol: {},", t.nsymbol)?;
        writeln!(f, "    max_shift: YY_MAX_SHIFT,")?;
        writeln!(f, "    min_shiftreduce: YY_MIN_SHIFTREDUCE,")?;
        writeln!(f, "    max_shiftreduce: YY_MAX_SHIFTREDUCE,")?;
        writeln!(f, "    error_action: YY_ERROR_ACTION,")?;
        writeln!(f, "    accept_action: YY_ACCEPT_ACTION,")?;
        writeln!(f, "    no_action: YY_NO_ACTION,")?;
        writeln!(f, "    min_reduce: YY_MIN_REDUCE,")?;
        writeln!(f, "    max_reduce: YY_MAX_REDUCE,")?;
        writeln!(f, "    wildcard: {},", t.wildcard_index)?;
        writeln!(f, "    error_symbol: {},", t.error_index)?;
        writeln!(f, "}};")?;

        f.write_str(postamble)?;
        Ok(())
    }
}

/// A short human-readable summary of the emitted tables.
pub fn stats<'a>(g: &'a Grammar, t: &'a ParserTables) -> impl fmt::Display + 'a {
    display_fn(move |f| {
        let line = |f: &mut fmt::Formatter<'_>, label: &str, value: usize| {
            writeln!(f, "  {:<30} {:5}", label, value)
        };
        writeln!(f, "Parser statistics:")?;
        line(f, "terminal symbols", g.nterminal as usize)?;
        line(f, "non-terminal symbols", (g.nsymbol - g.nterminal) as usize)?;
        line(f, "total symbols", g.nsymbol as usize)?;
        line(f, "rules", t.nrule as usize)?;
        line(f, "states", t.nxstate as usize)?;
        line(f, "conflicts", g.conflict_count)?;
        line(f, "action table entries", t.n_action_tab as usize)?;
        line(f, "lookahead table entries", t.n_lookahead_tab as usize)?;
        line(f, "total table size (bytes)", t.table_size)?;
        Ok(())
    })
}
