//! Tokenizer for the grammar specification language.

use logos::{Lexer, Logos};

/// Capture a balanced `{ ... }` block, honoring string and character
/// literals and both comment styles inside it. Returns the text between
/// the braces.
fn code_block<'s>(lex: &mut Lexer<'s, Token<'s>>) -> Option<&'s str> {
    let rem = lex.remainder();
    let bytes = rem.as_bytes();
    let mut depth = 1u32;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    lex.bump(i + 1);
                    return Some(&rem[..i]);
                }
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn strip_quotes<'s>(lex: &mut Lexer<'s, Token<'s>>) -> &'s str {
    let s = lex.slice();
    &s[1..s.len() - 1]
}

fn strip_percent<'s>(lex: &mut Lexer<'s, Token<'s>>) -> &'s str {
    &lex.slice()[1..]
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
pub enum Token<'s> {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'s str),

    #[regex(r"[0-9]+")]
    Number(&'s str),

    #[regex(r"%[a-z_]+", strip_percent)]
    Directive(&'s str),

    #[token("{", code_block)]
    CodeBlock(&'s str),

    #[regex(r#""[^"]*""#, strip_quotes)]
    Str(&'s str),

    #[token("::=")]
    Assign,

    #[token(".")]
    Dot,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("|")]
    Pipe,

    #[token("/")]
    Slash,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token<'_>> {
        Token::lexer(src).collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn smoketest() {
        use Token::*;
        let tokens = lex("\
%left PLUS MINUS. // a band
expr(A) ::= expr(B) PLUS expr(C). { A = B + C; }
%fallback ID BEGIN|END.
");
        assert_eq!(
            tokens,
            vec![
                Directive("left"),
                Ident("PLUS"),
                Ident("MINUS"),
                Dot,
                Ident("expr"),
                LParen,
                Ident("A"),
                RParen,
                Assign,
                Ident("expr"),
                LParen,
                Ident("B"),
                RParen,
                Ident("PLUS"),
                Ident("expr"),
                LParen,
                Ident("C"),
                RParen,
                Dot,
                CodeBlock(" A = B + C; "),
                Directive("fallback"),
                Ident("ID"),
                Ident("BEGIN"),
                Pipe,
                Ident("END"),
                Dot,
            ]
        );
    }

    #[test]
    fn code_blocks_balance_nested_braces_and_literals() {
        let tokens = lex(r#"{ if a { b("}"); } /* } */ // }
        c = '}'; }"#);
        assert_eq!(tokens.len(), 1);
        let Token::CodeBlock(body) = tokens[0] else {
            panic!("expected a code block")
        };
        assert!(body.contains("b(\"}\")"));
        assert!(body.contains("c = '}'"));
    }

    #[test]
    fn block_comments_do_not_swallow_tokens() {
        let tokens = lex("A /* comment ** with stars */ B");
        assert_eq!(tokens, vec![Token::Ident("A"), Token::Ident("B")]);
    }
}
