//! citron — a LEMON-style LALR(1) parser generator.
//!
//! The pipeline turns a grammar record into packed action/lookahead tables:
//! symbol registry → precedence inheritance → first/lambda analysis →
//! LR(0) states → follow-set propagation → action synthesis → table
//! compression → state resort → offset packing. [`codegen::Codegen`] then
//! renders the packed tables as a Rust module for [`citron_runtime`].

pub mod action;
pub mod acttab;
pub mod build;
pub mod codegen;
pub mod compress;
pub mod first_sets;
pub mod grammar;
pub mod lalr;
pub mod lr0;
pub mod preprocess;
pub mod report;
pub mod syntax;
pub mod table;

mod types;
mod util;

pub(crate) use crate::types::Set;

/// Fatal build errors; everything else is accumulated on
/// [`Grammar::error_count`](grammar::Grammar) and reported.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("empty grammar")]
    EmptyGrammar,

    #[error("unterminated %ifdef starting on line {0}")]
    UnterminatedConditional(u32),

    #[error("%if syntax error on line {0}")]
    ConditionalSyntax(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Pipeline switches, mirroring the `-c` and `-r` command-line flags.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Run the default-action compressor (stage G).
    pub compress: bool,
    /// Reorder and renumber the states (stage H).
    pub resort: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compress: true,
            resort: true,
        }
    }
}

/// Run the whole grammar-to-tables pipeline over a parsed grammar record.
pub fn compute(
    g: &mut grammar::Grammar,
    options: Options,
) -> Result<(lr0::Automaton, codegen::ParserTables), Error> {
    let span = tracing::debug_span!("compute", grammar = %g.filename);
    let _entered = span.enter();

    g.finalize()?;
    g.assign_rule_precedences();
    first_sets::find_first_sets(g);
    tracing::debug!(
        nsymbol = g.nsymbol,
        nterminal = g.nterminal,
        nrule = g.nrule(),
        "registry finalized"
    );

    let mut automaton = lr0::find_states(g)?;
    tracing::debug!(nstate = automaton.nstate(), "LR(0) construction done");

    lalr::find_links(&mut automaton);
    lalr::find_follow_sets(&mut automaton);
    table::find_actions(g, &mut automaton)?;
    tracing::debug!(conflicts = g.conflict_count, "actions synthesized");

    if options.compress {
        compress::compress_tables(g, &mut automaton);
    }
    compress::resort_states(g, &mut automaton, options.resort);

    let tables = codegen::build_tables(g, &mut automaton);
    tracing::debug!(
        nxstate = tables.nxstate,
        action_tab = tables.n_action_tab,
        "tables packed"
    );
    Ok((automaton, tables))
}
