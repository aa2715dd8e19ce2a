//! Grammar definitions shared by the integration tests.
//!
//! Every grammar wraps its real content under a start symbol that never
//! occurs on a right-hand side; the generator diagnoses anything else.

/// Minimal grammar with an error-recovery rule.
pub const ERROR_RECOVERY: &str = "\
all ::= A B.
all ::= error B.
";

/// The dangling-else ambiguity, without precedence declarations.
pub const DANGLING_ELSE: &str = "\
prog ::= stmt.
stmt ::= IF expr stmt.
stmt ::= IF expr stmt ELSE stmt.
stmt ::= OTHER.
expr ::= EX.
";

/// The dangling-else grammar with `IF`/`ELSE` in one right-associative
/// band, so the shift wins by associativity instead of by conflict.
pub const DANGLING_ELSE_PREC: &str = "\
%right IF ELSE.
prog ::= stmt.
stmt ::= IF expr stmt.
stmt ::= IF expr stmt ELSE stmt.
stmt ::= OTHER.
expr ::= EX.
";

/// Left-associative `+` and `*` with `*` binding tighter.
pub const EXPR: &str = "\
%left PLUS.
%left TIMES.
program ::= expr.
expr ::= expr PLUS expr.
expr ::= expr TIMES expr.
expr ::= ID.
";

/// `b` is never referenced from the start symbol, so its rule can never
/// be reduced.
pub const UNREDUCIBLE: &str = "\
a ::= B.
a ::= C.
b ::= D.
";

/// A `%token_class` used as a right-hand-side slot.
pub const TOKEN_CLASS: &str = "\
%token_class num INTEGER|FLOAT.
expr ::= num.
";

/// Keyword fallback onto a generic identifier.
pub const FALLBACK: &str = "\
%fallback ID BEGIN END.
prog ::= stmts.
stmts ::= stmts stmt.
stmts ::= stmt.
stmt ::= ID SEMI.
stmt ::= BEGIN stmts END.
";

/// Wildcard token matching anything not otherwise actionable. EXTRA is
/// declared but appears in no rule, so only the wildcard can absorb it.
pub const WILDCARD: &str = "\
%wildcard ANY.
%token EXTRA.
prog ::= items.
items ::= items item.
items ::= item.
item ::= KEY.
item ::= ANY.
";

/// A calculator-shaped grammar exercising most directives at once.
pub const CALC: &str = "\
%name calc
%token_prefix TK_
%left PLUS MINUS.
%left TIMES SLASH.
%right POW.
%start_symbol program

program ::= expr(E). { println!(\"{}\", E); }
expr(A) ::= expr(B) PLUS expr(C). { A = B + C; }
expr(A) ::= expr(B) MINUS expr(C). { A = B - C; }
expr(A) ::= expr(B) TIMES expr(C). { A = B * C; }
expr(A) ::= expr(B) SLASH expr(C). { A = B / C; }
expr(A) ::= expr(B) POW expr(C). { A = B.pow(C); }
expr(A) ::= LPAREN expr(B) RPAREN. { A = B; }
expr(A) ::= NUM(N). { A = N; }
";

/// A wide statement grammar that produces several dozen states with
/// mostly-singleton terminal rows plus one dense row in the start state.
pub fn wide_statements(n_keywords: usize) -> String {
    let mut src = String::from("prog ::= stmts.\nstmts ::= stmts stmt.\nstmts ::= stmt.\n");
    for i in 0..n_keywords {
        src.push_str(&format!("stmt ::= K{i} V{i} SEMI.\n"));
    }
    src
}
