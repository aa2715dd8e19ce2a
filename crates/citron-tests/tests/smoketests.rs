//! Compile every corpus grammar end to end and spot-check the artifacts.

use citron::codegen::Codegen;
use citron::report::{Report, ReportOptions};
use citron_tests::{compile, grammars};

fn smoketest(src: &str) {
    let c = compile(src);
    eprintln!("grammar:\n{src}");
    let report = Report::new(&c.grammar, &c.automaton, ReportOptions::default());
    eprintln!("report:\n---\n{report}");
    assert!(c.tables.nxstate > 0);
    assert_eq!(c.tables.default_action.len(), c.tables.nxstate as usize);
}

#[test]
fn smoketest_error_recovery() {
    smoketest(grammars::ERROR_RECOVERY);
}

#[test]
fn smoketest_dangling_else_prec() {
    smoketest(grammars::DANGLING_ELSE_PREC);
}

#[test]
fn smoketest_expr() {
    smoketest(grammars::EXPR);
}

#[test]
fn smoketest_token_class() {
    smoketest(grammars::TOKEN_CLASS);
}

#[test]
fn smoketest_fallback() {
    smoketest(grammars::FALLBACK);
}

#[test]
fn smoketest_wildcard() {
    smoketest(grammars::WILDCARD);
}

#[test]
fn smoketest_calc() {
    smoketest(grammars::CALC);
}

#[test]
fn calc_rules_with_code_are_numbered_first() {
    let c = compile(grammars::CALC);
    assert_eq!(c.grammar.nrule_with_action, 8);
    for (_, rp) in c.grammar.rules() {
        if rp.code.is_some() {
            assert!(rp.irule < 8);
        }
    }
}

#[test]
fn generated_source_carries_the_emitted_surface() {
    let c = compile(grammars::CALC);
    let source = Codegen::new(&c.grammar, &c.tables).to_string();
    assert!(source.contains("pub static YY_ACTION"));
    assert!(source.contains("pub static YY_LOOKAHEAD"));
    assert!(source.contains("pub static YY_SHIFT_OFST"));
    assert!(source.contains("pub static YY_REDUCE_OFST"));
    assert!(source.contains("pub static YY_DEFAULT"));
    assert!(source.contains("pub static TABLES: Tables<'static>"));
    assert!(source.contains(&format!("pub const YYNSTATE: usize = {};", c.tables.nxstate)));
    // %token_prefix is honored by the token constants.
    assert!(source.contains("pub const TK_PLUS: u16"));
    assert!(source.contains("pub const TK_NUM: u16"));
}

#[test]
fn fallback_table_is_only_emitted_when_used() {
    let with = compile(grammars::FALLBACK);
    let without = compile(grammars::EXPR);
    let with_src = Codegen::new(&with.grammar, &with.tables).to_string();
    let without_src = Codegen::new(&without.grammar, &without.tables).to_string();
    assert!(with_src.contains("YY_FALLBACK"));
    assert!(!without_src.contains("YY_FALLBACK"));
}

#[test]
fn user_template_replaces_the_scaffolding() {
    let c = compile(grammars::EXPR);
    let template = "// custom preamble\n%%\n// custom postamble\n";
    let source = Codegen::new(&c.grammar, &c.tables)
        .with_template(template)
        .to_string();
    assert!(source.contains("// custom preamble"));
    assert!(source.contains("// custom postamble"));
    assert!(source.contains("pub static YY_ACTION"));
}

#[test]
fn sql_dump_lists_symbols_and_rules() {
    let c = compile(grammars::EXPR);
    let sql = citron::report::sql_dump(&c.grammar).to_string();
    assert!(sql.contains("CREATE TABLE symbol"));
    assert!(sql.contains("CREATE TABLE rule"));
    assert!(sql.contains("'PLUS'"));
    assert!(sql.contains("INSERT INTO rulerhs"));
}
