//! The `%if`/`%ifdef` text preprocessor.
//!
//! Suppressed regions are overwritten with spaces rather than removed, so
//! the preprocessed text has the same length and the same newline
//! positions as the input and every downstream line number stays valid.

use crate::Set;

/// The set of names given with `-D`, tested by `%ifdef` and friends.
pub type Defines = Set<String>;

fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace()
}

/// Evaluate a `%if` boolean expression over defined names: `!`, `&&`,
/// `||` and parentheses. Returns the error offset on a malformed
/// expression.
fn eval_boolean(z: &[u8], defines: &Defines) -> Result<bool, usize> {
    let mut neg = false;
    let mut res = false;
    let mut ok_term = true;
    let mut i = 0usize;
    while i < z.len() {
        let zi = z[i];
        if is_space(zi) {
            i += 1;
            continue;
        }
        if zi == b'!' {
            if !ok_term {
                return Err(i);
            }
            neg = !neg;
            i += 1;
            continue;
        }
        if zi == b'|' && z.get(i + 1) == Some(&b'|') {
            if ok_term {
                return Err(i);
            }
            if res {
                return Ok(true);
            }
            i += 2;
            ok_term = true;
            continue;
        }
        if zi == b'&' && z.get(i + 1) == Some(&b'&') {
            if ok_term {
                return Err(i);
            }
            if !res {
                return Ok(false);
            }
            i += 2;
            ok_term = true;
            continue;
        }
        if zi == b'(' {
            if !ok_term {
                return Err(i);
            }
            let mut depth = 1;
            let mut k = i + 1;
            while k < z.len() {
                match z[k] {
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    b'(' => depth += 1,
                    _ => {}
                }
                k += 1;
            }
            if k >= z.len() {
                return Err(k);
            }
            res = eval_boolean(&z[i + 1..k], defines).map_err(|e| i + 1 + e)?;
            i = k + 1;
            if neg {
                res = !res;
                neg = false;
            }
            ok_term = false;
            continue;
        }
        if zi.is_ascii_alphabetic() {
            if !ok_term {
                return Err(i);
            }
            let mut k = i + 1;
            while k < z.len() && (z[k].is_ascii_alphanumeric() || z[k] == b'_') {
                k += 1;
            }
            let name = std::str::from_utf8(&z[i..k]).map_err(|_| i)?;
            res = defines.contains(name);
            i = k;
            if neg {
                res = !res;
                neg = false;
            }
            ok_term = false;
            continue;
        }
        return Err(i);
    }
    Ok(res)
}

/// Comment out `%ifdef`/`%ifndef`/`%if`/`%else`/`%endif` lines and the
/// text regions they exclude. The directives are only recognized at the
/// start of a line.
pub fn preprocess(text: &str, defines: &Defines) -> Result<String, crate::Error> {
    let mut z: Vec<u8> = text.as_bytes().to_vec();
    let mut exclude = 0u32;
    let mut start = 0usize;
    let mut lineno = 1u32;
    let mut start_lineno = 1u32;

    let blank_line = |z: &mut Vec<u8>, mut j: usize| {
        while j < z.len() && z[j] != b'\n' {
            z[j] = b' ';
            j += 1;
        }
    };

    let mut i = 0usize;
    while i < z.len() {
        if z[i] == b'\n' {
            lineno += 1;
        }
        if z[i] != b'%' || (i > 0 && z[i - 1] != b'\n') {
            i += 1;
            continue;
        }
        if z.len() >= i + 6
            && &z[i..i + 6] == b"%endif"
            && (z.len() == i + 6 || is_space(z[i + 6]))
        {
            if exclude > 0 {
                exclude -= 1;
                if exclude == 0 {
                    for j in start..i {
                        if z[j] != b'\n' {
                            z[j] = b' ';
                        }
                    }
                }
            }
            blank_line(&mut z, i);
        } else if z.len() >= i + 6 && &z[i..i + 5] == b"%else" && is_space(z[i + 5]) {
            // The window is six bytes but only five are compared; the
            // sixth must merely be whitespace, which tolerates both
            // "%else\n" and trailing blanks.
            if exclude == 1 {
                exclude = 0;
                for j in start..i {
                    if z[j] != b'\n' {
                        z[j] = b' ';
                    }
                }
            } else if exclude == 0 {
                exclude = 1;
                start = i;
                start_lineno = lineno;
            }
            blank_line(&mut z, i);
        } else if (z.len() >= i + 7 && &z[i..i + 7] == b"%ifdef ")
            || (z.len() >= i + 4 && &z[i..i + 4] == b"%if ")
            || (z.len() >= i + 8 && &z[i..i + 8] == b"%ifndef ")
        {
            if exclude > 0 {
                exclude += 1;
            } else {
                let mut j = i;
                while j < z.len() && !is_space(z[j]) {
                    j += 1;
                }
                let expr_start = j;
                let is_not = j == i + 7;
                while j < z.len() && z[j] != b'\n' {
                    j += 1;
                }
                let truth = eval_boolean(&z[expr_start..j], defines)
                    .map_err(|_| crate::Error::ConditionalSyntax(lineno))?;
                let excluded = if is_not { truth } else { !truth };
                if excluded {
                    exclude = 1;
                    start = i;
                    start_lineno = lineno;
                }
            }
            blank_line(&mut z, i);
        }
        i += 1;
    }
    if exclude > 0 {
        return Err(crate::Error::UnterminatedConditional(start_lineno));
    }
    Ok(String::from_utf8(z).expect("only ASCII bytes are rewritten"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defines(names: &[&str]) -> Defines {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn excluded_regions_become_spaces_and_length_is_preserved() {
        let input = "alpha\n%ifdef FOO\nhidden stuff\n%endif\nomega\n";
        let out = preprocess(input, &defines(&[])).unwrap();
        assert_eq!(out.len(), input.len());
        assert_eq!(
            out.match_indices('\n').collect::<Vec<_>>(),
            input.match_indices('\n').collect::<Vec<_>>(),
        );
        assert!(out.contains("alpha"));
        assert!(out.contains("omega"));
        assert!(!out.contains("hidden"));
        assert!(!out.contains("%ifdef"));
    }

    #[test]
    fn defined_names_keep_their_region() {
        let input = "%ifdef FOO\nkept\n%endif\n";
        let out = preprocess(input, &defines(&["FOO"])).unwrap();
        assert!(out.contains("kept"));
        assert!(!out.contains("%ifdef"));
    }

    #[test]
    fn ifndef_inverts() {
        let input = "%ifndef FOO\nkept\n%endif\n";
        let out = preprocess(input, &defines(&[])).unwrap();
        assert!(out.contains("kept"));
        let out = preprocess(input, &defines(&["FOO"])).unwrap();
        assert!(!out.contains("kept"));
    }

    #[test]
    fn else_flips_the_excluded_half() {
        let input = "%ifdef FOO\nyes\n%else\nno\n%endif\n";
        let out = preprocess(input, &defines(&["FOO"])).unwrap();
        assert!(out.contains("yes") && !out.contains("no\n%endif") && !out.contains("\nno"));
        let out = preprocess(input, &defines(&[])).unwrap();
        assert!(!out.contains("yes") && out.contains("no"));
    }

    #[test]
    fn nested_conditionals_unwind_correctly() {
        let input = "%ifdef A\nouter\n%ifdef B\ninner\n%endif\ntail\n%endif\n";
        let out = preprocess(input, &defines(&["A"])).unwrap();
        assert!(out.contains("outer") && out.contains("tail") && !out.contains("inner"));
        let out = preprocess(input, &defines(&["A", "B"])).unwrap();
        assert!(out.contains("inner"));
        let out = preprocess(input, &defines(&[])).unwrap();
        assert!(!out.contains("outer") && !out.contains("inner") && !out.contains("tail"));
    }

    #[test]
    fn boolean_expressions() {
        let input = "%if FOO && !BAR\nkept\n%endif\n";
        assert!(preprocess(input, &defines(&["FOO"])).unwrap().contains("kept"));
        assert!(!preprocess(input, &defines(&["FOO", "BAR"]))
            .unwrap()
            .contains("kept"));
        let input = "%if (FOO || BAR) && BAZ\nkept\n%endif\n";
        assert!(preprocess(input, &defines(&["BAR", "BAZ"]))
            .unwrap()
            .contains("kept"));
        assert!(!preprocess(input, &defines(&["BAR"])).unwrap().contains("kept"));
    }

    #[test]
    fn unterminated_conditional_is_fatal() {
        let input = "one\n%ifdef FOO\ntwo\n";
        assert!(matches!(
            preprocess(input, &defines(&[])),
            Err(crate::Error::UnterminatedConditional(2))
        ));
    }

    #[test]
    fn else_at_end_of_file_without_trailing_byte_is_not_recognized() {
        // The %else recognizer reads a six-byte window; a bare "%else"
        // as the very last five bytes does not qualify.
        let input = "%ifdef FOO\nx\n%else";
        assert!(matches!(
            preprocess(input, &defines(&[])),
            Err(crate::Error::UnterminatedConditional(_))
        ));
    }
}
