//! Grammar types and the symbol/rule registry.

use crate::types::Map;
use crate::util::display_fn;
use std::fmt;

/// Identifier of an interned symbol. Ids are assigned in first-mention
/// order and never change; the dense table index of a symbol lives in
/// [`SymbolData::index`] and is assigned by [`Grammar::finalize`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}

/// Identifier of a rule, equal to its position in parse order.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u32);

impl RuleId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R#{:03}", self.0)
    }
}

/// Name of the synthetic lookahead used for defaulted reduce actions.
pub const DEFAULT_SYMBOL: &str = "{default}";

/// Name of the end-of-input terminal, always dense index 0.
pub const EOI_SYMBOL: &str = "$";

/// A set of dense terminal indices.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, index: u32) -> bool {
        self.inner.contains(index as usize)
    }

    /// Insert one index, reporting whether the set grew.
    pub fn insert(&mut self, index: u32) -> bool {
        self.inner.insert(index as usize)
    }

    /// Union `other` into `self`, reporting whether the set grew.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let before = self.inner.len();
        self.inner.union_with(&other.inner);
        self.inner.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.inner.iter().map(|raw| raw as u32)
    }
}

impl FromIterator<u32> for TerminalSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = Self::default();
        for ix in iter {
            set.insert(ix);
        }
        set
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Terminal,
    Nonterminal,
    /// A named alternation of terminals, created by `%token_class` or an
    /// inline `A|B` group on a rule's right-hand side.
    Multiterminal,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
    Unknown,
}

#[derive(Debug)]
pub struct SymbolData {
    pub name: String,
    /// Dense table index, assigned by [`Grammar::finalize`].
    pub index: u32,
    pub kind: SymbolKind,
    /// Precedence if defined, `-1` otherwise.
    pub prec: i32,
    pub assoc: Assoc,
    /// True if a nonterminal that can derive the empty string.
    pub lambda: bool,
    /// FIRST set over dense terminal indices.
    pub first: TerminalSet,
    /// Fallback token tried when this token does not parse.
    pub fallback: Option<SymbolId>,
    /// Constituent terminals, multiterminals only.
    pub constituents: Vec<SymbolId>,
    /// Rules with this symbol as left-hand side, in parse order.
    pub rules: Vec<RuleId>,
    pub use_count: u32,
    /// `%type` declaration, kept for the report.
    pub datatype: Option<String>,
    /// `%destructor` code and the line it starts on.
    pub destructor: Option<(String, u32)>,
}

#[derive(Debug)]
pub struct Rule {
    pub lhs: SymbolId,
    pub lhs_alias: Option<String>,
    /// True if the left-hand side is the start symbol.
    pub lhs_start: bool,
    /// Line number of the rule in the grammar file.
    pub line: u32,
    pub rhs: Vec<SymbolId>,
    pub rhs_alias: Vec<Option<String>>,
    /// User action code, if any.
    pub code: Option<String>,
    /// Precedence symbol, explicit (`[SYM]`) or inherited.
    pub precsym: Option<SymbolId>,
    /// Parse-order index.
    pub index: u32,
    /// Rule number as used in the generated tables; rules with action code
    /// are numbered first.
    pub irule: i32,
    /// Reduce is possible but suppressed by `{NEVER-REDUCE}`.
    pub never_reduce: bool,
    /// True if some state reduces by this rule.
    pub can_reduce: bool,
    /// True if reduce actions survive table compression.
    pub does_reduce: bool,
}

impl Rule {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "{} ::=", g.sym(self.lhs).name)?;
            for &sp in &self.rhs {
                let sp = g.sym(sp);
                if sp.kind != SymbolKind::Multiterminal {
                    write!(f, " {}", sp.name)?;
                } else {
                    write!(f, " {}", g.sym(sp.constituents[0]).name)?;
                    for &sub in &sp.constituents[1..] {
                        write!(f, "|{}", g.sym(sub).name)?;
                    }
                }
            }
            Ok(())
        })
    }
}

/// The whole grammar record threaded through the pipeline.
#[derive(Debug)]
pub struct Grammar {
    symbols: Vec<SymbolData>,
    intern: Map<String, SymbolId>,
    rules: Vec<Rule>,

    /// Dense-index order of symbols, valid after [`finalize`](Self::finalize).
    sorted: Vec<SymbolId>,
    /// Count of terminal plus nonterminal symbols (excludes `{default}`
    /// and multiterminals).
    pub nsymbol: u32,
    /// Count of terminal symbols; terminals are dense indices
    /// `0..nterminal`.
    pub nterminal: u32,
    /// Count of rules carrying user action code; those rules get the
    /// smallest rule numbers so the consumer's dispatch table stays small.
    pub nrule_with_action: u32,

    /// Name requested by `%start_symbol`, if any.
    pub start: Option<String>,
    /// Resolved start symbol, cached by [`resolve_start_symbol`](Self::resolve_start_symbol).
    start_symbol: Option<SymbolId>,
    /// The rule whose left-hand side is the start symbol.
    pub start_rule: Option<RuleId>,
    /// The `error` nonterminal, if the grammar mentions one.
    pub error_symbol: Option<SymbolId>,
    /// The `%wildcard` token, if any.
    pub wildcard: Option<SymbolId>,
    pub has_fallback: bool,

    pub filename: String,
    pub error_count: usize,
    pub conflict_count: usize,

    pub(crate) prec_counter: i32,

    // Declaration slots filled by the frontend, consumed by the emitter
    // and the report.
    pub name: Option<String>,
    pub include: Option<String>,
    pub extra_code: Option<String>,
    pub token_type: Option<String>,
    pub default_type: Option<String>,
    pub token_prefix: Option<String>,
    pub extra_argument: Option<String>,
    pub extra_context: Option<String>,
    pub syntax_error_code: Option<String>,
    pub parse_accept_code: Option<String>,
    pub parse_failure_code: Option<String>,
    pub stack_overflow_code: Option<String>,
    pub stack_size: Option<String>,
    pub token_destructor: Option<String>,
    pub default_destructor: Option<String>,
}

impl Grammar {
    pub fn new(filename: impl Into<String>) -> Self {
        let mut g = Self {
            symbols: Vec::new(),
            intern: Map::default(),
            rules: Vec::new(),
            sorted: Vec::new(),
            nsymbol: 0,
            nterminal: 0,
            nrule_with_action: 0,
            start: None,
            start_symbol: None,
            start_rule: None,
            error_symbol: None,
            wildcard: None,
            has_fallback: false,
            filename: filename.into(),
            error_count: 0,
            conflict_count: 0,
            prec_counter: 0,
            name: None,
            include: None,
            extra_code: None,
            token_type: None,
            default_type: None,
            token_prefix: None,
            extra_argument: None,
            extra_context: None,
            syntax_error_code: None,
            parse_accept_code: None,
            parse_failure_code: None,
            stack_overflow_code: None,
            stack_size: None,
            token_destructor: None,
            default_destructor: None,
        };
        g.intern(EOI_SYMBOL);
        g
    }

    /// Intern a symbol by name, creating it on first mention. The kind is
    /// inferred from the first character: upper case means terminal,
    /// anything else nonterminal. Multiterminals are re-tagged explicitly
    /// by the frontend.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.intern.get(name) {
            self.symbols[id.0 as usize].use_count += 1;
            return id;
        }
        let kind = if name.chars().next().is_some_and(|c| c.is_uppercase()) {
            SymbolKind::Terminal
        } else {
            SymbolKind::Nonterminal
        };
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolData {
            name: name.to_owned(),
            index: id.0,
            kind,
            prec: -1,
            assoc: Assoc::Unknown,
            lambda: false,
            first: TerminalSet::default(),
            fallback: None,
            constituents: Vec::new(),
            rules: Vec::new(),
            use_count: 1,
            datatype: None,
            destructor: None,
        });
        self.intern.insert(name.to_owned(), id);
        id
    }

    pub fn find(&self, name: &str) -> Option<SymbolId> {
        self.intern.get(name).copied()
    }

    pub fn sym(&self, id: SymbolId) -> &SymbolData {
        &self.symbols[id.0 as usize]
    }

    pub fn sym_mut(&mut self, id: SymbolId) -> &mut SymbolData {
        &mut self.symbols[id.0 as usize]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0 as usize]
    }

    pub fn rule_mut(&mut self, id: RuleId) -> &mut Rule {
        &mut self.rules[id.0 as usize]
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> + '_ {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, r)| (RuleId(i as u32), r))
    }

    pub fn nrule(&self) -> u32 {
        self.rules.len() as u32
    }

    /// All symbols in dense-index order. Valid after `finalize`.
    pub fn symbols_by_index(&self) -> impl Iterator<Item = (SymbolId, &SymbolData)> + '_ {
        self.sorted.iter().map(move |&id| (id, self.sym(id)))
    }

    /// The symbol at a given dense index. Valid after `finalize`.
    pub fn symbol_at(&self, index: u32) -> SymbolId {
        self.sorted[index as usize]
    }

    /// Append a production rule. The caller fills in code, aliases and the
    /// explicit precedence symbol afterwards via [`rule_mut`](Self::rule_mut).
    pub fn add_rule(&mut self, lhs: SymbolId, rhs: Vec<SymbolId>, line: u32) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        let rhs_alias = vec![None; rhs.len()];
        self.rules.push(Rule {
            lhs,
            lhs_alias: None,
            lhs_start: false,
            line,
            rhs,
            rhs_alias,
            code: None,
            precsym: None,
            index: id.0,
            irule: -1,
            never_reduce: false,
            can_reduce: false,
            does_reduce: false,
        });
        self.symbols[lhs.0 as usize].rules.push(id);
        id
    }

    /// Declare one `%left`/`%right`/`%nonassoc` band. Every terminal in the
    /// band receives the same (new) precedence value and the given
    /// associativity.
    pub fn precedence(&mut self, assoc: Assoc, tokens: &[SymbolId]) {
        self.prec_counter += 1;
        for &id in tokens {
            let prec = self.prec_counter;
            let sp = self.sym_mut(id);
            if sp.prec >= 0 {
                let name = sp.name.clone();
                self.error(0, &format!("Symbol \"{name}\" has already be given a precedence."));
            } else {
                sp.prec = prec;
                sp.assoc = assoc;
            }
        }
    }

    /// Create the unnamed multiterminal backing an inline `A|B` group on a
    /// rule's right-hand side. It takes the first constituent's name but is
    /// not interned: two occurrences of the same group are distinct symbols
    /// that compare equal constituent-wise.
    pub(crate) fn anonymous_class(&mut self, first: SymbolId) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolData {
            name: self.sym(first).name.clone(),
            index: id.0,
            kind: SymbolKind::Multiterminal,
            prec: -1,
            assoc: Assoc::Unknown,
            lambda: false,
            first: TerminalSet::default(),
            fallback: None,
            constituents: vec![first],
            rules: Vec::new(),
            use_count: 1,
            datatype: None,
            destructor: None,
        });
        id
    }

    /// Create a `%token_class` multiterminal.
    pub fn token_class(&mut self, name: &str, members: &[SymbolId]) -> SymbolId {
        let id = self.intern(name);
        let sp = self.sym_mut(id);
        sp.kind = SymbolKind::Multiterminal;
        sp.constituents.extend_from_slice(members);
        id
    }

    /// Report a non-fatal diagnostic and bump the error count.
    pub fn error(&mut self, line: u32, msg: &str) {
        eprintln!("{}:{}: {}", self.filename, line, msg);
        self.error_count += 1;
    }

    /// Finish the registry once the whole grammar has been parsed: intern
    /// the `{default}` lookahead, sort the symbols, assign dense indices
    /// and number the rules.
    ///
    /// The sort groups terminals first, then nonterminals, then
    /// multiterminals, preserving first-mention order within each group.
    /// `{default}` is created last, so it ends up with the largest
    /// non-multiterminal index. Both counts are then derived positionally:
    /// `nsymbol` stops just short of `{default}` and `nterminal` is the
    /// index of the first symbol whose name does not start upper case.
    pub fn finalize(&mut self) -> Result<(), crate::Error> {
        if self.rules.is_empty() {
            return Err(crate::Error::EmptyGrammar);
        }
        self.error_symbol = self.find("error");
        self.intern(DEFAULT_SYMBOL);

        let mut sorted: Vec<SymbolId> = (0..self.symbols.len() as u32).map(SymbolId).collect();
        // The byte comparison against b'Z' mirrors the original sort key;
        // identifiers are assumed ASCII.
        let class = |sp: &SymbolData| -> u8 {
            if sp.kind == SymbolKind::Multiterminal {
                3
            } else if sp.name.as_bytes().first().is_some_and(|&b| b > b'Z') {
                2
            } else {
                1
            }
        };
        sorted.sort_by_key(|&id| (class(self.sym(id)), id.0));
        for (ix, &id) in sorted.iter().enumerate() {
            self.symbols[id.0 as usize].index = ix as u32;
        }

        let mut i = sorted.len();
        while self.sym(sorted[i - 1]).kind == SymbolKind::Multiterminal {
            i -= 1;
        }
        debug_assert_eq!(self.sym(sorted[i - 1]).name, DEFAULT_SYMBOL);
        self.nsymbol = (i - 1) as u32;

        let mut i = 1;
        while self
            .sym(sorted[i])
            .name
            .chars()
            .next()
            .is_some_and(|c| c.is_uppercase())
        {
            i += 1;
        }
        self.nterminal = i as u32;
        self.sorted = sorted;

        // Number the rules in two waves: rules with user action code come
        // first so the consumer's reduce dispatch stays dense.
        let mut next = 0;
        for rp in &mut self.rules {
            rp.irule = if rp.code.is_some() {
                next += 1;
                next - 1
            } else {
                -1
            };
        }
        self.nrule_with_action = next as u32;
        for rp in &mut self.rules {
            if rp.irule < 0 {
                rp.irule = next;
                next += 1;
            }
        }
        Ok(())
    }

    /// Rule ids ordered by their table number.
    pub fn rules_in_irule_order(&self) -> Vec<RuleId> {
        let mut order: Vec<RuleId> = (0..self.rules.len() as u32).map(RuleId).collect();
        order.sort_by_key(|&id| self.rule(id).irule);
        order
    }

    /// Find a precedence symbol for every rule that has none (stage B):
    /// scan the right-hand side left to right and inherit from the first
    /// symbol with a defined precedence; for a multiterminal, from its
    /// first constituent with one.
    pub fn assign_rule_precedences(&mut self) {
        for ri in 0..self.rules.len() {
            if self.rules[ri].precsym.is_some() {
                continue;
            }
            let mut found = None;
            'rhs: for &sp in &self.rules[ri].rhs {
                let sym = &self.symbols[sp.0 as usize];
                if sym.kind == SymbolKind::Multiterminal {
                    for &sub in &sym.constituents {
                        if self.symbols[sub.0 as usize].prec >= 0 {
                            found = Some(sub);
                            break 'rhs;
                        }
                    }
                } else if sym.prec >= 0 {
                    found = Some(sp);
                    break 'rhs;
                }
            }
            self.rules[ri].precsym = found;
        }
    }

    /// The start symbol: the one named by `%start_symbol` when it resolves
    /// to a known symbol, otherwise the left-hand side of the first rule.
    /// An unknown `%start_symbol` name is a non-fatal diagnostic, reported
    /// on the first resolution only.
    pub fn resolve_start_symbol(&mut self) -> Result<SymbolId, crate::Error> {
        if let Some(sp) = self.start_symbol {
            return Ok(sp);
        }
        let first_lhs = self
            .rules
            .first()
            .map(|rp| rp.lhs)
            .ok_or(crate::Error::EmptyGrammar)?;
        let sp = match self.start.clone() {
            Some(name) => match self.find(&name) {
                Some(sp) => sp,
                None => {
                    let fallback = self.sym(first_lhs).name.clone();
                    self.error(
                        0,
                        &format!(
                            "The specified start symbol \"{name}\" is not in a nonterminal \
                             of the grammar.  \"{fallback}\" will be used as the start \
                             symbol instead."
                        ),
                    );
                    first_lhs
                }
            },
            None => first_lhs,
        };
        self.start_symbol = Some(sp);
        self.start_rule = Some(RuleId(0));
        Ok(sp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grammar {
        let mut g = Grammar::new("test.y");
        let plus = g.intern("PLUS");
        let star = g.intern("STAR");
        let num = g.intern("NUM");
        let expr = g.intern("expr");
        g.add_rule(expr, vec![expr, plus, expr], 1);
        g.add_rule(expr, vec![expr, star, expr], 2);
        g.add_rule(expr, vec![num], 3);
        g
    }

    #[test]
    fn terminals_sort_before_nonterminals() {
        let mut g = sample();
        g.finalize().unwrap();

        assert_eq!(g.nterminal, 4); // $ PLUS STAR NUM
        assert_eq!(g.nsymbol, 5); // ... expr
        for ix in 0..g.nterminal {
            let id = g.symbol_at(ix);
            assert!(
                g.sym(id)
                    .name
                    .chars()
                    .next()
                    .is_some_and(|c| !c.is_lowercase()),
                "index {} should be a terminal",
                ix
            );
        }
        assert_eq!(g.sym(g.symbol_at(0)).name, EOI_SYMBOL);
        assert_eq!(g.sym(g.symbol_at(g.nsymbol)).name, DEFAULT_SYMBOL);
    }

    #[test]
    fn token_class_sorts_last() {
        let mut g = sample();
        let int_ = g.intern("INTEGER");
        let float_ = g.intern("FLOAT");
        g.token_class("num_class", &[int_, float_]);
        g.finalize().unwrap();

        let last = g.symbol_at(g.symbols.len() as u32 - 1);
        assert_eq!(g.sym(last).kind, SymbolKind::Multiterminal);
        // The class is excluded from both counts.
        assert!(g.sym(last).index >= g.nsymbol + 1);
        for &sub in &g.sym(last).constituents {
            assert!(g.sym(sub).index < g.nterminal);
        }
    }

    #[test]
    fn rules_with_code_number_first() {
        let mut g = sample();
        g.rule_mut(RuleId::from_raw(1)).code = Some("acc *= 2;".into());
        g.finalize().unwrap();

        assert_eq!(g.nrule_with_action, 1);
        assert_eq!(g.rule(RuleId::from_raw(1)).irule, 0);
        assert_eq!(g.rule(RuleId::from_raw(0)).irule, 1);
        assert_eq!(g.rule(RuleId::from_raw(2)).irule, 2);

        let order = g.rules_in_irule_order();
        assert_eq!(order[0], RuleId::from_raw(1));
    }

    #[test]
    fn rule_precedence_inherits_from_first_rhs_terminal() {
        let mut g = sample();
        let plus = g.find("PLUS").unwrap();
        let star = g.find("STAR").unwrap();
        g.precedence(Assoc::Left, &[plus]);
        g.precedence(Assoc::Left, &[star]);
        g.finalize().unwrap();
        g.assign_rule_precedences();

        assert_eq!(g.rule(RuleId::from_raw(0)).precsym, Some(plus));
        assert_eq!(g.rule(RuleId::from_raw(1)).precsym, Some(star));
        assert_eq!(g.rule(RuleId::from_raw(2)).precsym, None);
        assert!(g.sym(plus).prec < g.sym(star).prec);
    }

    #[test]
    fn explicit_precedence_is_kept() {
        let mut g = sample();
        let plus = g.find("PLUS").unwrap();
        let star = g.find("STAR").unwrap();
        g.precedence(Assoc::Left, &[plus, star]);
        g.rule_mut(RuleId::from_raw(0)).precsym = Some(star);
        g.finalize().unwrap();
        g.assign_rule_precedences();

        assert_eq!(g.rule(RuleId::from_raw(0)).precsym, Some(star));
    }
}
