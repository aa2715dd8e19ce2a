//! The grammar-file frontend.
//!
//! Tokens from [`lexer`] drive a state machine that expresses each
//! declaration and rule as mutations of the [`Grammar`] record, in source
//! order. Parse errors are reported with file and line and the machine
//! resynchronizes, so a single run surfaces as many diagnostics as it can.

pub mod lexer;

use self::lexer::Token;
use crate::grammar::{Assoc, Grammar, RuleId, SymbolId, SymbolKind};
use logos::Logos;

/// The longest right-hand side a rule may have.
const MAX_RHS: usize = 1000;

/// Where the next declaration argument should be stored.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DeclSlot {
    Name,
    Include,
    ExtraCode,
    TokenDestructor,
    DefaultDestructor,
    TokenPrefix,
    SyntaxError,
    ParseAccept,
    ParseFailure,
    StackOverflow,
    ExtraArgument,
    ExtraContext,
    TokenType,
    DefaultType,
    StackSize,
    StartSymbol,
    Destructor(SymbolId),
    Datatype(SymbolId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    WaitingForDeclOrRule,
    WaitingForDeclArg(DeclSlot),
    WaitingForPrecedenceSymbol(Assoc),
    WaitingForArrow,
    LhsAlias1,
    LhsAlias2,
    LhsAlias3,
    InRhs,
    /// After `|` or `/` inside a right-hand side.
    RhsPipe,
    RhsAlias1,
    RhsAlias2,
    PrecedenceMark1,
    PrecedenceMark2,
    ResyncAfterRuleError,
    ResyncAfterDeclError,
    WaitingForDestructorSymbol,
    WaitingForDatatypeSymbol,
    WaitingForFallbackId,
    WaitingForTokenName,
    WaitingForWildcardId,
    WaitingForClassId,
    WaitingForClassToken,
}

struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> u32 {
        self.starts.partition_point(|&s| s <= offset) as u32
    }
}

fn first_is_upper(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_uppercase())
}

fn first_is_lower(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_lowercase())
}

struct Frontend {
    state: State,
    lhs: Option<SymbolId>,
    lhs_alias: Option<String>,
    rhs: Vec<SymbolId>,
    alias: Vec<Option<String>>,
    prev_rule: Option<RuleId>,
    /// Target of the current `%fallback` run.
    fallback: Option<SymbolId>,
    /// The `%token_class` under construction.
    tkclass: Option<SymbolId>,
}

/// Parse one preprocessed grammar source into the registry. Diagnostics
/// accumulate on the grammar's error count.
pub fn parse(g: &mut Grammar, source: &str) {
    let lines = LineIndex::new(source);
    let mut fe = Frontend {
        state: State::WaitingForDeclOrRule,
        lhs: None,
        lhs_alias: None,
        rhs: Vec::new(),
        alias: Vec::new(),
        prev_rule: None,
        fallback: None,
        tkclass: None,
    };
    for (tok, span) in Token::lexer(source).spanned() {
        let line = lines.line_of(span.start);
        match tok {
            Ok(tok) => fe.token(g, tok, line),
            Err(()) => {
                let what = source[span.clone()].chars().next().unwrap_or('?');
                g.error(line, &format!("Illegal character \"{what}\"."));
            }
        }
    }
    if fe.state != State::WaitingForDeclOrRule {
        let line = lines.line_of(source.len().saturating_sub(1));
        g.error(line, "Input ends in the middle of a rule or declaration.");
    }
}

impl Frontend {
    fn token(&mut self, g: &mut Grammar, tok: Token<'_>, line: u32) {
        use State::*;
        match self.state {
            WaitingForDeclOrRule => match tok {
                Token::Directive(kw) => self.decl_keyword(g, kw, line),
                Token::Ident(x) if first_is_lower(x) => {
                    self.lhs = Some(g.intern(x));
                    self.rhs.clear();
                    self.alias.clear();
                    self.lhs_alias = None;
                    self.state = WaitingForArrow;
                }
                Token::CodeBlock(code) => match self.prev_rule {
                    None => {
                        g.error(
                            line,
                            "There is no prior rule upon which to attach the code fragment \
                             which begins on this line.",
                        );
                    }
                    Some(rp) if g.rule(rp).code.is_some() => {
                        g.error(
                            line,
                            "Code fragment beginning on this line is not the first to follow \
                             the previous rule.",
                        );
                    }
                    Some(rp) if code == "NEVER-REDUCE" => {
                        g.rule_mut(rp).never_reduce = true;
                    }
                    Some(rp) => {
                        g.rule_mut(rp).code = Some(code.to_owned());
                        g.rule_mut(rp).line = line;
                    }
                },
                Token::LBracket => self.state = PrecedenceMark1,
                other => {
                    g.error(
                        line,
                        &format!(
                            "Token {other:?} should be either a declaration or a nonterminal name."
                        ),
                    );
                }
            },

            PrecedenceMark1 => {
                match tok {
                    Token::Ident(x) if first_is_upper(x) => match self.prev_rule {
                        None => {
                            g.error(
                                line,
                                &format!("There is no prior rule to assign precedence \"[{x}]\"."),
                            );
                        }
                        Some(rp) if g.rule(rp).precsym.is_some() => {
                            g.error(
                                line,
                                "Precedence mark on this line is not the first to follow the \
                                 previous rule.",
                            );
                        }
                        Some(rp) => {
                            let sp = g.intern(x);
                            g.rule_mut(rp).precsym = Some(sp);
                        }
                    },
                    _ => {
                        g.error(line, "The precedence symbol must be a terminal.");
                    }
                }
                self.state = PrecedenceMark2;
            }

            PrecedenceMark2 => {
                if tok != Token::RBracket {
                    g.error(line, "Missing \"]\" on precedence mark.");
                }
                self.state = WaitingForDeclOrRule;
            }

            WaitingForArrow => match tok {
                Token::Assign => self.state = InRhs,
                Token::LParen => self.state = LhsAlias1,
                _ => {
                    let lhs = self.lhs.map(|id| g.sym(id).name.clone()).unwrap_or_default();
                    g.error(
                        line,
                        &format!("Expected to see a \"::=\" following the LHS symbol \"{lhs}\"."),
                    );
                    self.state = ResyncAfterRuleError;
                }
            },

            LhsAlias1 => match tok {
                Token::Ident(x) => {
                    self.lhs_alias = Some(x.to_owned());
                    self.state = LhsAlias2;
                }
                _ => {
                    g.error(line, "Expected an alias for the LHS symbol.");
                    self.state = ResyncAfterRuleError;
                }
            },

            LhsAlias2 => match tok {
                Token::RParen => self.state = LhsAlias3,
                _ => {
                    g.error(line, "Missing \")\" following LHS alias name.");
                    self.state = ResyncAfterRuleError;
                }
            },

            LhsAlias3 => match tok {
                Token::Assign => self.state = InRhs,
                _ => {
                    g.error(line, "Missing \"::=\" following the LHS alias.");
                    self.state = ResyncAfterRuleError;
                }
            },

            InRhs => match tok {
                Token::Dot => {
                    let lhs = self.lhs.expect("LHS set before entering a RHS");
                    let rp = g.add_rule(lhs, std::mem::take(&mut self.rhs), line);
                    g.rule_mut(rp).lhs_alias = self.lhs_alias.take();
                    g.rule_mut(rp).rhs_alias = std::mem::take(&mut self.alias);
                    self.prev_rule = Some(rp);
                    self.state = WaitingForDeclOrRule;
                }
                Token::Ident(x) => {
                    if self.rhs.len() >= MAX_RHS {
                        g.error(
                            line,
                            &format!("Too many symbols on RHS of rule beginning at \"{x}\"."),
                        );
                        self.state = ResyncAfterRuleError;
                    } else {
                        self.rhs.push(g.intern(x));
                        self.alias.push(None);
                    }
                }
                Token::Pipe | Token::Slash if !self.rhs.is_empty() => {
                    self.state = RhsPipe;
                }
                Token::LParen if !self.rhs.is_empty() => self.state = RhsAlias1,
                other => {
                    g.error(line, &format!("Illegal character on RHS of rule: {other:?}."));
                    self.state = ResyncAfterRuleError;
                }
            },

            RhsPipe => match tok {
                Token::Ident(x) if first_is_upper(x) => {
                    let last = *self.rhs.last().expect("RhsPipe requires a prior symbol");
                    let msp = if g.sym(last).kind == SymbolKind::Multiterminal {
                        last
                    } else {
                        let msp = g.anonymous_class(last);
                        *self.rhs.last_mut().unwrap() = msp;
                        msp
                    };
                    if first_is_lower(&g.sym(g.sym(msp).constituents[0]).name) {
                        g.error(line, "Cannot form a compound containing a non-terminal");
                    }
                    let sub = g.intern(x);
                    g.sym_mut(msp).constituents.push(sub);
                    self.state = InRhs;
                }
                _ => {
                    g.error(line, "Cannot form a compound containing a non-terminal");
                    self.state = ResyncAfterRuleError;
                }
            },

            RhsAlias1 => match tok {
                Token::Ident(x) => {
                    *self.alias.last_mut().expect("alias slot exists") = Some(x.to_owned());
                    self.state = RhsAlias2;
                }
                _ => {
                    let sym = self
                        .rhs
                        .last()
                        .map(|&id| g.sym(id).name.clone())
                        .unwrap_or_default();
                    g.error(
                        line,
                        &format!("Expected a valid alias for the RHS symbol \"{sym}\"."),
                    );
                    self.state = ResyncAfterRuleError;
                }
            },

            RhsAlias2 => match tok {
                Token::RParen => self.state = InRhs,
                _ => {
                    g.error(line, "Missing \")\" following RHS alias name.");
                    self.state = ResyncAfterRuleError;
                }
            },

            WaitingForPrecedenceSymbol(assoc) => match tok {
                Token::Dot => self.state = WaitingForDeclOrRule,
                Token::Ident(x) if first_is_upper(x) => {
                    let prec = g.prec_counter;
                    let id = g.intern(x);
                    let sp = g.sym_mut(id);
                    if sp.prec >= 0 {
                        g.error(
                            line,
                            &format!("Symbol \"{x}\" has already be given a precedence."),
                        );
                    } else {
                        sp.prec = prec;
                        sp.assoc = assoc;
                    }
                }
                _ => {
                    g.error(line, &format!("Can't assign a precedence to {tok:?}."));
                }
            },

            WaitingForDeclArg(slot) => match tok {
                Token::CodeBlock(v) | Token::Str(v) | Token::Ident(v) | Token::Number(v) => {
                    self.store_decl_arg(g, slot, v, line);
                    self.state = WaitingForDeclOrRule;
                }
                other => {
                    g.error(line, &format!("Illegal argument to declaration: {other:?}"));
                    self.state = ResyncAfterDeclError;
                }
            },

            WaitingForDestructorSymbol => match tok {
                Token::Ident(x) => {
                    let sp = g.intern(x);
                    self.state = WaitingForDeclArg(DeclSlot::Destructor(sp));
                }
                _ => {
                    g.error(line, "Symbol name missing after %destructor keyword");
                    self.state = ResyncAfterDeclError;
                }
            },

            WaitingForDatatypeSymbol => match tok {
                Token::Ident(x) => {
                    if g.find(x).is_some_and(|id| g.sym(id).datatype.is_some()) {
                        g.error(line, &format!("Symbol %type \"{x}\" already defined"));
                        self.state = ResyncAfterDeclError;
                    } else {
                        let sp = g.intern(x);
                        self.state = WaitingForDeclArg(DeclSlot::Datatype(sp));
                    }
                }
                _ => {
                    g.error(line, "Symbol name missing after %type keyword");
                    self.state = ResyncAfterDeclError;
                }
            },

            WaitingForFallbackId => match tok {
                Token::Dot => self.state = WaitingForDeclOrRule,
                Token::Ident(x) if first_is_upper(x) => {
                    let sp = g.intern(x);
                    match self.fallback {
                        None => self.fallback = Some(sp),
                        Some(fb) => {
                            if g.sym(sp).fallback.is_some() {
                                g.error(
                                    line,
                                    &format!("More than one fallback assigned to token {x}"),
                                );
                            } else {
                                g.sym_mut(sp).fallback = Some(fb);
                                g.has_fallback = true;
                            }
                        }
                    }
                }
                other => {
                    g.error(
                        line,
                        &format!("%fallback argument {other:?} should be a token"),
                    );
                }
            },

            WaitingForTokenName => match tok {
                Token::Dot => self.state = WaitingForDeclOrRule,
                Token::Ident(x) if first_is_upper(x) => {
                    // Tokens need no declaration, but %token pins their
                    // numbering by forcing first mention.
                    let _ = g.intern(x);
                }
                other => {
                    g.error(line, &format!("%token argument {other:?} should be a token"));
                }
            },

            WaitingForWildcardId => match tok {
                Token::Dot => self.state = WaitingForDeclOrRule,
                Token::Ident(x) if first_is_upper(x) => {
                    let sp = g.intern(x);
                    if g.wildcard.is_none() {
                        g.wildcard = Some(sp);
                    } else {
                        g.error(line, &format!("Extra wildcard to token: {x}"));
                    }
                }
                other => {
                    g.error(
                        line,
                        &format!("%wildcard argument {other:?} should be a token"),
                    );
                }
            },

            WaitingForClassId => match tok {
                Token::Ident(x) if first_is_lower(x) => {
                    if g.find(x).is_some() {
                        g.error(line, &format!("Symbol \"{x}\" already used"));
                        self.state = ResyncAfterDeclError;
                    } else {
                        self.tkclass = Some(g.token_class(x, &[]));
                        self.state = WaitingForClassToken;
                    }
                }
                _ => {
                    g.error(
                        line,
                        &format!("%token_class must be followed by an identifier: {tok:?}"),
                    );
                    self.state = ResyncAfterDeclError;
                }
            },

            WaitingForClassToken => match tok {
                Token::Dot => self.state = WaitingForDeclOrRule,
                Token::Pipe | Token::Slash => {}
                Token::Ident(x) if first_is_upper(x) => {
                    let msp = self.tkclass.expect("class id precedes class tokens");
                    let sub = g.intern(x);
                    g.sym_mut(msp).constituents.push(sub);
                }
                other => {
                    g.error(
                        line,
                        &format!("%token_class argument {other:?} should be a token"),
                    );
                    self.state = ResyncAfterDeclError;
                }
            },

            ResyncAfterRuleError | ResyncAfterDeclError => match tok {
                Token::Dot => self.state = WaitingForDeclOrRule,
                Token::Directive(kw) => self.decl_keyword(g, kw, line),
                _ => {}
            },
        }
    }

    fn decl_keyword(&mut self, g: &mut Grammar, kw: &str, line: u32) {
        use DeclSlot::*;
        let slot = match kw {
            "name" => Some(Name),
            "include" => Some(Include),
            "code" => Some(ExtraCode),
            "token_destructor" => Some(TokenDestructor),
            "default_destructor" => Some(DefaultDestructor),
            "token_prefix" => Some(TokenPrefix),
            "syntax_error" => Some(SyntaxError),
            "parse_accept" => Some(ParseAccept),
            "parse_failure" => Some(ParseFailure),
            "stack_overflow" => Some(StackOverflow),
            "extra_argument" => Some(ExtraArgument),
            "extra_context" => Some(ExtraContext),
            "token_type" => Some(TokenType),
            "default_type" => Some(DefaultType),
            "stack_size" => Some(StackSize),
            "start_symbol" => Some(StartSymbol),
            _ => None,
        };
        if let Some(slot) = slot {
            self.state = State::WaitingForDeclArg(slot);
            return;
        }
        match kw {
            "left" => {
                g.prec_counter += 1;
                self.state = State::WaitingForPrecedenceSymbol(Assoc::Left);
            }
            "right" => {
                g.prec_counter += 1;
                self.state = State::WaitingForPrecedenceSymbol(Assoc::Right);
            }
            "nonassoc" => {
                g.prec_counter += 1;
                self.state = State::WaitingForPrecedenceSymbol(Assoc::Nonassoc);
            }
            "destructor" => self.state = State::WaitingForDestructorSymbol,
            "type" => self.state = State::WaitingForDatatypeSymbol,
            "fallback" => {
                self.fallback = None;
                self.state = State::WaitingForFallbackId;
            }
            "token" => self.state = State::WaitingForTokenName,
            "wildcard" => self.state = State::WaitingForWildcardId,
            "token_class" => self.state = State::WaitingForClassId,
            _ => {
                g.error(line, &format!("Unknown declaration keyword: \"%{kw}\"."));
                self.state = State::ResyncAfterDeclError;
            }
        }
    }

    fn store_decl_arg(&mut self, g: &mut Grammar, slot: DeclSlot, value: &str, line: u32) {
        fn append(slot: &mut Option<String>, value: &str) {
            match slot {
                Some(s) => {
                    if !s.ends_with('\n') {
                        s.push('\n');
                    }
                    s.push_str(value);
                }
                None => *slot = Some(value.to_owned()),
            }
        }
        match slot {
            DeclSlot::Name => append(&mut g.name, value),
            DeclSlot::Include => append(&mut g.include, value),
            DeclSlot::ExtraCode => append(&mut g.extra_code, value),
            DeclSlot::TokenDestructor => append(&mut g.token_destructor, value),
            DeclSlot::DefaultDestructor => append(&mut g.default_destructor, value),
            DeclSlot::TokenPrefix => append(&mut g.token_prefix, value),
            DeclSlot::SyntaxError => append(&mut g.syntax_error_code, value),
            DeclSlot::ParseAccept => append(&mut g.parse_accept_code, value),
            DeclSlot::ParseFailure => append(&mut g.parse_failure_code, value),
            DeclSlot::StackOverflow => append(&mut g.stack_overflow_code, value),
            DeclSlot::ExtraArgument => append(&mut g.extra_argument, value),
            DeclSlot::ExtraContext => append(&mut g.extra_context, value),
            DeclSlot::TokenType => append(&mut g.token_type, value),
            DeclSlot::DefaultType => append(&mut g.default_type, value),
            DeclSlot::StackSize => append(&mut g.stack_size, value),
            DeclSlot::StartSymbol => g.start = Some(value.to_owned()),
            DeclSlot::Destructor(sp) => match &mut g.sym_mut(sp).destructor {
                Some((code, _)) => {
                    code.push('\n');
                    code.push_str(value);
                }
                none => *none = Some((value.to_owned(), line)),
            },
            DeclSlot::Datatype(sp) => g.sym_mut(sp).datatype = Some(value.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::DEFAULT_SYMBOL;

    fn parsed(src: &str) -> Grammar {
        let mut g = Grammar::new("test.y");
        parse(&mut g, src);
        g
    }

    #[test]
    fn rules_and_aliases() {
        let g = parsed(
            "expr(A) ::= expr(B) PLUS expr(C). { A = B + C; }\n\
             expr ::= NUM.\n",
        );
        assert_eq!(g.error_count, 0);
        assert_eq!(g.nrule(), 2);
        let r0 = g.rule(RuleId::from_raw(0));
        assert_eq!(r0.lhs_alias.as_deref(), Some("A"));
        assert_eq!(r0.rhs.len(), 3);
        assert_eq!(r0.rhs_alias[0].as_deref(), Some("B"));
        assert_eq!(r0.rhs_alias[1], None);
        assert_eq!(r0.code.as_deref(), Some(" A = B + C; "));
        assert!(g.rule(RuleId::from_raw(1)).code.is_none());
    }

    #[test]
    fn precedence_bands_count_up() {
        let g = parsed("%left PLUS MINUS.\n%left STAR SLASH.\n%right POW.\n");
        assert_eq!(g.error_count, 0);
        let prec = |name: &str| g.sym(g.find(name).unwrap()).prec;
        assert_eq!(prec("PLUS"), prec("MINUS"));
        assert!(prec("STAR") > prec("PLUS"));
        assert!(prec("POW") > prec("STAR"));
        assert_eq!(g.sym(g.find("POW").unwrap()).assoc, Assoc::Right);
    }

    #[test]
    fn directives_fill_their_slots() {
        let g = parsed(
            "%name calc\n\
             %token_prefix TK_\n\
             %start_symbol program\n\
             %stack_size 400\n\
             %include { use std::fmt; }\n\
             program ::= .\n",
        );
        assert_eq!(g.error_count, 0);
        assert_eq!(g.name.as_deref(), Some("calc"));
        assert_eq!(g.token_prefix.as_deref(), Some("TK_"));
        assert_eq!(g.start.as_deref(), Some("program"));
        assert_eq!(g.stack_size.as_deref(), Some("400"));
        assert!(g.include.as_deref().unwrap().contains("use std::fmt;"));
    }

    #[test]
    fn fallback_wildcard_and_token_class() {
        let mut g = parsed(
            "%fallback ID BEGIN END.\n\
             %wildcard ANY.\n\
             %token_class number INTEGER|FLOAT.\n\
             expr ::= number.\n",
        );
        assert_eq!(g.error_count, 0);
        assert!(g.has_fallback);
        let id = g.find("ID").unwrap();
        assert_eq!(g.sym(g.find("BEGIN").unwrap()).fallback, Some(id));
        assert_eq!(g.sym(g.find("END").unwrap()).fallback, Some(id));
        assert_eq!(g.sym(id).fallback, None);
        assert!(g.wildcard.is_some());

        let class = g.find("number").unwrap();
        assert_eq!(g.sym(class).kind, SymbolKind::Multiterminal);
        assert_eq!(g.sym(class).constituents.len(), 2);

        g.finalize().unwrap();
        assert_eq!(g.sym(g.symbol_at(g.nsymbol)).name, DEFAULT_SYMBOL);
    }

    #[test]
    fn inline_multiterminal_groups() {
        let g = parsed("expr ::= expr COMMA|SEMI expr.\n");
        assert_eq!(g.error_count, 0);
        let rp = g.rule(RuleId::from_raw(0));
        assert_eq!(rp.rhs.len(), 3);
        let msp = g.sym(rp.rhs[1]);
        assert_eq!(msp.kind, SymbolKind::Multiterminal);
        assert_eq!(msp.constituents.len(), 2);
        // The group is anonymous: COMMA itself is still a plain terminal.
        assert_eq!(g.sym(g.find("COMMA").unwrap()).kind, SymbolKind::Terminal);
    }

    #[test]
    fn never_reduce_marker() {
        let g = parsed("a ::= B. {NEVER-REDUCE}\n");
        assert_eq!(g.error_count, 0);
        let rp = g.rule(RuleId::from_raw(0));
        assert!(rp.never_reduce);
        assert!(rp.code.is_none());
    }

    #[test]
    fn explicit_rule_precedence() {
        let g = parsed("%left PLUS.\n%left UMINUS.\nexpr ::= MINUS expr. [UMINUS]\n");
        assert_eq!(g.error_count, 0);
        let rp = g.rule(RuleId::from_raw(0));
        assert_eq!(rp.precsym, g.find("UMINUS"));
    }

    #[test]
    fn errors_accumulate_and_resync() {
        let g = parsed(
            "%bogus_keyword FOO.\n\
             expr ::= NUM.\n\
             %left lowercase.\n",
        );
        assert!(g.error_count >= 2);
        // The good rule in between still parsed.
        assert_eq!(g.nrule(), 1);
    }

    #[test]
    fn destructor_and_type_attach_to_symbols() {
        let g = parsed(
            "%type expr { i64 }\n\
             %destructor expr { drop($$); }\n\
             expr ::= NUM.\n",
        );
        assert_eq!(g.error_count, 0);
        let sp = g.sym(g.find("expr").unwrap());
        assert_eq!(sp.datatype.as_deref(), Some(" i64 "));
        assert!(sp.destructor.as_ref().unwrap().0.contains("drop"));
    }
}
