//! The table-driven shift/reduce engine.

use crate::definition::{Tables, NO_SYMBOL};

/// One entry of the parse stack.
///
/// After the "shift" half of a fused shift-reduce action the `state` field
/// holds the pending reduce code rather than a state number; the pending
/// reduce fires on the next turn of the main loop.
#[derive(Debug, Copy, Clone)]
struct StackEntry {
    state: u32,
    major: u16,
}

/// What [`Parser::feed`] did with the offered token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The token was shifted (possibly after some reductions).
    Shifted,
    /// The parse is complete. Only returned while feeding end-of-input.
    Accepted,
    /// A syntax error occurred and the engine recovered by shifting the
    /// `error` symbol; the offending token may have been discarded.
    Recovered,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// A syntax error in a grammar without an `error` rule, or one from
    /// which no enclosing `error` rule could recover.
    #[error("syntax error")]
    Syntax,
    /// The parse stack overflowed the configured limit.
    #[error("parser stack overflow")]
    StackOverflow,
}

/// A push-based parser over a set of generated [`Tables`].
///
/// Feed it terminal indices with [`feed`](Self::feed) and finish with
/// [`finish`](Self::finish). The engine records every reduction it performs
/// so callers can inspect the derivation order.
#[derive(Debug)]
pub struct Parser<'t> {
    tables: &'t Tables<'t>,
    stack: Vec<StackEntry>,
    max_stack: usize,
    reduced: Vec<u16>,
    syntax_errors: usize,
    accepted: bool,
}

impl<'t> Parser<'t> {
    pub fn new(tables: &'t Tables<'t>) -> Self {
        Self {
            tables,
            stack: vec![StackEntry { state: 0, major: 0 }],
            max_stack: 10_000,
            reduced: Vec::new(),
            syntax_errors: 0,
            accepted: false,
        }
    }

    /// Override the stack-depth limit.
    pub fn with_stack_limit(mut self, limit: usize) -> Self {
        self.max_stack = limit;
        self
    }

    /// Rule numbers of every reduction performed so far, in order.
    pub fn reduced(&self) -> &[u16] {
        &self.reduced
    }

    pub fn syntax_errors(&self) -> usize {
        self.syntax_errors
    }

    pub fn has_accepted(&self) -> bool {
        self.accepted
    }

    /// Offer the next input token.
    pub fn feed(&mut self, token: u16) -> Result<Step, ParseError> {
        debug_assert!(token != 0, "end-of-input is fed by finish()");
        self.drive(token)
    }

    /// Signal end of input and run the parser to acceptance.
    pub fn finish(&mut self) -> Result<Step, ParseError> {
        self.drive(0)
    }

    fn drive(&mut self, major: u16) -> Result<Step, ParseError> {
        let t = self.tables;
        let is_eoi = major == 0;
        let mut recovered = false;

        let mut action = self.stack.last().unwrap().state;
        loop {
            debug_assert_eq!(action, self.stack.last().unwrap().state);
            action = t.shift_action(action, major);
            if action <= t.max_shiftreduce {
                debug_assert!(!is_eoi, "the end-of-input token cannot be shifted");
                self.shift(action, major)?;
                break;
            } else if action >= t.min_reduce {
                action = self.reduce(action - t.min_reduce)?;
            } else if action == t.accept_action {
                self.stack.pop();
                self.accepted = true;
                return Ok(Step::Accepted);
            } else {
                debug_assert_eq!(action, t.error_action);
                if t.error_symbol != NO_SYMBOL {
                    // Error recovery: pop the stack until the error symbol
                    // can be shifted, shift it, then resume with the same
                    // lookahead. A token that still fails while the error
                    // symbol sits on top of the stack is discarded.
                    if self.stack.last().unwrap().major == t.error_symbol || recovered {
                        return Ok(Step::Recovered);
                    }
                    self.syntax_errors += 1;
                    recovered = true;
                    let mut found = false;
                    loop {
                        action = t.reduce_action(
                            self.stack.last().unwrap().state,
                            t.error_symbol,
                        );
                        if action <= t.max_shiftreduce {
                            found = true;
                            break;
                        }
                        if self.stack.len() == 1 {
                            break;
                        }
                        self.stack.pop();
                    }
                    if found && !is_eoi {
                        self.shift(action, t.error_symbol)?;
                        action = self.stack.last().unwrap().state;
                        continue;
                    }
                }
                if !recovered {
                    self.syntax_errors += 1;
                }
                self.stack.truncate(1);
                self.stack[0] = StackEntry { state: 0, major: 0 };
                return Err(ParseError::Syntax);
            }
        }
        Ok(if recovered { Step::Recovered } else { Step::Shifted })
    }

    fn shift(&mut self, mut state: u32, major: u16) -> Result<(), ParseError> {
        let t = self.tables;
        if state > t.max_shift {
            // Fused shift-reduce: store the pending reduce code instead of
            // a state number.
            state += t.min_reduce - t.min_shiftreduce;
        }
        if self.stack.len() >= self.max_stack {
            self.stack.truncate(1);
            return Err(ParseError::StackOverflow);
        }
        self.stack.push(StackEntry { state, major });
        Ok(())
    }

    /// Reduce by `rule`, then perform the shift that follows every reduce.
    /// Returns the next action, which may itself be a pending reduce.
    fn reduce(&mut self, rule: u32) -> Result<u32, ParseError> {
        let t = self.tables;
        self.reduced.push(rule as u16);

        let nrhs = t.rule_nrhs[rule as usize] as usize;
        let lhs = t.rule_lhs[rule as usize];
        self.stack.truncate(self.stack.len() - nrhs);

        let action = t.reduce_action(self.stack.last().unwrap().state, lhs);
        // The generator collapses shift-reduce actions on nonterminals into
        // plain reduces, and a reduce can never be followed by an error.
        debug_assert!(!(action > t.max_shift && action <= t.max_shiftreduce));
        debug_assert_ne!(action, t.error_action);

        if self.stack.len() >= self.max_stack {
            self.stack.truncate(1);
            return Err(ParseError::StackOverflow);
        }
        // The pushed entry may carry a pending reduce code or the accept
        // action; the main loop deals with either on its next turn.
        self.stack.push(StackEntry {
            state: action,
            major: lhs,
        });
        Ok(action)
    }
}
