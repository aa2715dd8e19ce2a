//! The human-readable `.out` report.

use crate::action::{Action, ActionKind};
use crate::grammar::{Grammar, SymbolKind};
use crate::lr0::Automaton;
use crate::util::display_fn;
use std::fmt;

/// Rendering options for the report, mirroring the CLI flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Print only the basis configurations of each state.
    pub basis_only: bool,
    /// Also show actions that precedence resolution dropped.
    pub show_precedence_conflicts: bool,
}

pub struct Report<'a> {
    g: &'a Grammar,
    a: &'a Automaton,
    opts: ReportOptions,
}

impl<'a> Report<'a> {
    pub fn new(g: &'a Grammar, a: &'a Automaton, opts: ReportOptions) -> Self {
        Self { g, a, opts }
    }

    fn print_action(
        &self,
        f: &mut fmt::Formatter<'_>,
        ap: &Action,
        indent: usize,
    ) -> Result<bool, fmt::Error> {
        let g = self.g;
        let name = &g.sym(ap.sp).name;
        let printed = match ap.kind {
            ActionKind::Shift(st) => {
                write!(
                    f,
                    "{:>indent$} shift        {:<7}",
                    name,
                    self.a.state(st).statenum
                )?;
                true
            }
            ActionKind::Reduce(rp) => {
                write!(f, "{:>indent$} reduce       {:<7}", name, g.rule(rp).irule)?;
                write!(f, "{}", g.rule(rp).display(g))?;
                true
            }
            ActionKind::ShiftReduce(rp) => {
                write!(f, "{:>indent$} shift-reduce {:<7}", name, g.rule(rp).irule)?;
                write!(f, "{}", g.rule(rp).display(g))?;
                true
            }
            ActionKind::Accept => {
                write!(f, "{:>indent$} accept", name)?;
                true
            }
            ActionKind::Error => {
                write!(f, "{:>indent$} error", name)?;
                true
            }
            ActionKind::SrConflict(rp) | ActionKind::RrConflict(rp) => {
                write!(
                    f,
                    "{:>indent$} reduce       {:<7} ** Parsing conflict **",
                    name,
                    g.rule(rp).irule
                )?;
                true
            }
            ActionKind::SsConflict(st) => {
                write!(
                    f,
                    "{:>indent$} shift        {:<7} ** Parsing conflict **",
                    name,
                    self.a.state(st).statenum
                )?;
                true
            }
            ActionKind::ShResolved(st) if self.opts.show_precedence_conflicts => {
                write!(
                    f,
                    "{:>indent$} shift        {:<7} -- dropped by precedence",
                    name,
                    self.a.state(st).statenum
                )?;
                true
            }
            ActionKind::RdResolved(rp) if self.opts.show_precedence_conflicts => {
                write!(
                    f,
                    "{:>indent$} reduce {:<7} -- dropped by precedence",
                    name,
                    g.rule(rp).irule
                )?;
                true
            }
            _ => false,
        };
        if printed {
            if let Some(sp_opt) = ap.sp_opt {
                write!(f, "  /* because {}=={} */", name, g.sym(sp_opt).name)?;
            }
        }
        Ok(printed)
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (g, a) = (self.g, self.a);
        for i in 0..a.nxstate as usize {
            let st = a.state(a.sorted[i]);
            writeln!(f, "State {}:", st.statenum)?;
            let configs = if self.opts.basis_only {
                &st.basis
            } else {
                &st.configs
            };
            for &cfp in configs {
                let cfp = a.config(cfp);
                let rp = g.rule(cfp.rule);
                if cfp.dot as usize == rp.rhs.len() {
                    write!(f, "    {:>5} ", format!("({})", rp.irule))?;
                } else {
                    write!(f, "          ")?;
                }
                writeln!(f, "{}", cfp.display(g))?;
            }
            writeln!(f)?;
            for ap in &st.actions {
                if self.print_action(f, ap, 30)? {
                    writeln!(f)?;
                }
            }
            writeln!(f)?;
        }

        writeln!(f, "----------------------------------------------------")?;
        writeln!(f, "Symbols:")?;
        writeln!(f, "The first-set of non-terminals is shown after the name.")?;
        writeln!(f)?;
        for ix in 0..g.nsymbol {
            let sp = g.sym(g.symbol_at(ix));
            write!(f, "  {:3}: {}", ix, sp.name)?;
            if sp.kind == SymbolKind::Nonterminal {
                write!(f, ":")?;
                if sp.lambda {
                    write!(f, " <lambda>")?;
                }
                for j in 0..g.nterminal {
                    if sp.first.contains(j) {
                        write!(f, " {}", g.sym(g.symbol_at(j)).name)?;
                    }
                }
            }
            if sp.prec >= 0 {
                write!(f, " (precedence={})", sp.prec)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "----------------------------------------------------")?;
        writeln!(f, "Rules:")?;
        for &rid in &g.rules_in_irule_order() {
            let rp = g.rule(rid);
            write!(f, "{:4}: {}.", rp.irule, rp.display(g))?;
            if let Some(precsym) = rp.precsym {
                write!(
                    f,
                    " [{} precedence={}]",
                    g.sym(precsym).name,
                    g.sym(precsym).prec
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Reprint of the grammar without actions (`-g`).
pub fn reprint(g: &Grammar) -> impl fmt::Display + '_ {
    display_fn(move |f| {
        writeln!(f, "// Reprint of input file \"{}\".", g.filename)?;
        writeln!(f, "// Symbols:")?;
        for ix in 0..g.nsymbol {
            write!(f, "// {:3}: {}", ix, g.sym(g.symbol_at(ix)).name)?;
            writeln!(f)?;
        }
        for (_, rp) in g.rules() {
            write!(f, "{}.", rp.display(g))?;
            if let Some(precsym) = rp.precsym {
                write!(f, " [{}]", g.sym(precsym).name)?;
            }
            writeln!(f)?;
        }
        Ok(())
    })
}

/// The `-S` companion dump: the grammar as a small SQL database.
pub fn sql_dump(g: &Grammar) -> impl fmt::Display + '_ {
    display_fn(move |f| {
        writeln!(f, "BEGIN;")?;
        writeln!(
            f,
            "CREATE TABLE symbol(\n  id INTEGER PRIMARY KEY,\n  name TEXT NOT NULL,\n  isTerminal BOOLEAN NOT NULL,\n  fallback INTEGER REFERENCES symbol\n);"
        )?;
        for ix in 0..g.nsymbol {
            let sp = g.sym(g.symbol_at(ix));
            let fallback = match sp.fallback {
                Some(fb) => g.sym(fb).index.to_string(),
                None => "NULL".to_owned(),
            };
            writeln!(
                f,
                "INSERT INTO symbol(id,name,isTerminal,fallback) VALUES({},'{}',{},{});",
                ix,
                sp.name,
                if ix < g.nterminal { "TRUE" } else { "FALSE" },
                fallback
            )?;
        }
        writeln!(
            f,
            "CREATE TABLE rule(\n  ruleid INTEGER PRIMARY KEY,\n  lhs INTEGER REFERENCES symbol(id),\n  txt TEXT\n);"
        )?;
        writeln!(
            f,
            "CREATE TABLE rulerhs(\n  ruleid INTEGER REFERENCES rule(ruleid),\n  pos INTEGER,\n  sym INTEGER REFERENCES symbol(id)\n);"
        )?;
        for (n, &rid) in g.rules_in_irule_order().iter().enumerate() {
            let rp = g.rule(rid);
            writeln!(
                f,
                "INSERT INTO rule(ruleid,lhs,txt) VALUES({},{},'{}');",
                n,
                g.sym(rp.lhs).index,
                rp.display(g)
            )?;
            for (pos, &sp) in rp.rhs.iter().enumerate() {
                writeln!(
                    f,
                    "INSERT INTO rulerhs(ruleid,pos,sym) VALUES({},{},{});",
                    n,
                    pos,
                    g.sym(sp).index
                )?;
            }
        }
        writeln!(f, "COMMIT;")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn pipeline(f: impl FnOnce(&mut Grammar)) -> (Grammar, Automaton) {
        let mut g = Grammar::new("test.y");
        f(&mut g);
        let (a, _tables) = crate::compute(&mut g, crate::Options::default()).unwrap();
        (g, a)
    }

    #[test]
    fn report_mentions_every_emitted_state_and_rule() {
        let (g, a) = pipeline(|g| {
            let x = g.intern("X");
            let s = g.intern("s");
            g.add_rule(s, vec![x], 1);
        });
        let text = Report::new(&g, &a, ReportOptions::default()).to_string();
        assert!(text.contains("State 0:"));
        assert!(text.contains("s ::= X"));
        assert!(text.contains("Symbols:"));
        assert!(text.contains("Rules:"));
    }

    #[test]
    fn basis_only_report_is_shorter() {
        let (g, a) = pipeline(|g| {
            let x = g.intern("X");
            let y = g.intern("Y");
            let s = g.intern("s");
            let t = g.intern("t");
            g.add_rule(s, vec![t, x], 1);
            g.add_rule(t, vec![y], 2);
        });
        let full = Report::new(&g, &a, ReportOptions::default()).to_string();
        let basis = Report::new(
            &g,
            &a,
            ReportOptions {
                basis_only: true,
                ..Default::default()
            },
        )
        .to_string();
        assert!(basis.len() < full.len());
    }
}
