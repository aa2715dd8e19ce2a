//! Grammar corpus and helpers for the integration tests.

pub mod grammars;

use citron::codegen::ParserTables;
use citron::grammar::Grammar;
use citron::lr0::Automaton;
use citron::Options;

pub struct Compiled {
    pub grammar: Grammar,
    pub automaton: Automaton,
    pub tables: ParserTables,
}

impl Compiled {
    /// Dense index of a terminal, for feeding the runtime engine.
    pub fn token(&self, name: &str) -> u16 {
        let id = self.grammar.find(name).expect("unknown terminal");
        self.grammar.sym(id).index as u16
    }

    /// Table number of the rule with the given parse-order position.
    pub fn irule(&self, parse_index: u32) -> u16 {
        self.grammar
            .rule(citron::grammar::RuleId::from_raw(parse_index))
            .irule as u16
    }
}

/// Compile a grammar text through the full pipeline with default options.
pub fn compile(src: &str) -> Compiled {
    compile_with(src, Options::default())
}

pub fn compile_with(src: &str, options: Options) -> Compiled {
    let mut grammar = Grammar::new("test.y");
    citron::syntax::parse(&mut grammar, src);
    assert_eq!(grammar.error_count, 0, "grammar must tokenize and parse");
    let (automaton, tables) = citron::compute(&mut grammar, options).expect("pipeline");
    Compiled {
        grammar,
        automaton,
        tables,
    }
}

/// Run one token string to completion; returns (accepted, syntax_errors).
pub fn run(compiled: &Compiled, tokens: &[u16]) -> (bool, usize) {
    let tables = compiled.tables.runtime();
    let mut parser = citron_runtime::Parser::new(&tables);
    for &t in tokens {
        if parser.feed(t).is_err() {
            return (false, parser.syntax_errors().max(1));
        }
        if parser.has_accepted() {
            return (true, parser.syntax_errors());
        }
    }
    let accepted = parser.finish().is_ok() && parser.has_accepted();
    (accepted, parser.syntax_errors())
}
