//! The packed parse-table definition.

/// Sentinel stored in [`Tables::fallback`] and the wildcard/error slots to
/// mean "absent". Symbol index 0 is always the end-of-input terminal, so it
/// can never be a fallback target, a wildcard, or the error symbol.
pub const NO_SYMBOL: u16 = 0;

/// The parse tables of one generated parser.
///
/// The action table maps the pair `(state, lookahead)` to an action code.
/// For a state `s` and lookahead `t`, the candidate slot is
/// `action[shift_ofst[s] + t]` (terminal lookahead) or
/// `action[reduce_ofst[s] + t]` (nonterminal lookahead); the slot is valid
/// only if `lookahead[same index] == t`, otherwise `default_action[s]`
/// applies.
///
/// An action code `n` decodes as:
///
/// * `n <= max_shift` — shift and go to state `n`;
/// * `min_shiftreduce <= n <= max_shiftreduce` — shift, then immediately
///   reduce by rule `n - min_shiftreduce`;
/// * `n == error_action` — syntax error;
/// * `n == accept_action` — parse complete;
/// * `n == no_action` — unused slot (behaves like the default action);
/// * `min_reduce <= n <= max_reduce` — reduce by rule `n - min_reduce`.
#[derive(Debug, Clone)]
pub struct Tables<'a> {
    /// `yy_action`: the shared action array, trailing empty slots trimmed.
    pub action: &'a [u32],
    /// `yy_lookahead`: one entry per `action` slot plus `nterminal` entries
    /// of tail padding, so that `shift_ofst[s] + t` never indexes out of
    /// bounds for any terminal `t`.
    pub lookahead: &'a [u16],
    /// `yy_shift_ofst`: terminal-row offset per state, trailing rowless
    /// states trimmed. A state beyond the end of this slice has no terminal
    /// row and always takes its default action.
    pub shift_ofst: &'a [i32],
    /// `yy_reduce_ofst`: nonterminal-row offset per state, same trimming.
    pub reduce_ofst: &'a [i32],
    /// `yy_default`: per-state default action (a reduce, or `error_action`).
    pub default_action: &'a [u32],
    /// Per-terminal fallback token, or empty when the grammar used none.
    pub fallback: &'a [u16],
    /// Dense index of each rule's left-hand side, in rule-number order.
    pub rule_lhs: &'a [u16],
    /// Right-hand side length of each rule, in rule-number order.
    pub rule_nrhs: &'a [u16],

    /// Number of terminal symbols. Terminals occupy indices `0..nterminal`.
    pub nterminal: u16,
    /// Total number of terminal and nonterminal symbols.
    pub nsymbol: u16,
    /// Largest action code that is a plain shift (`nxstate - 1`).
    pub max_shift: u32,
    pub min_shiftreduce: u32,
    pub max_shiftreduce: u32,
    pub error_action: u32,
    pub accept_action: u32,
    pub no_action: u32,
    pub min_reduce: u32,
    pub max_reduce: u32,
    /// The wildcard terminal, or [`NO_SYMBOL`].
    pub wildcard: u16,
    /// Dense index of the `error` nonterminal, or [`NO_SYMBOL`].
    pub error_symbol: u16,
}

impl Tables<'_> {
    /// Look up the action for a terminal lookahead, applying fallback and
    /// wildcard substitution before falling back to the state default.
    pub fn shift_action(&self, state: u32, mut lookahead: u16) -> u32 {
        if state > self.max_shift {
            return state;
        }
        debug_assert!(lookahead < self.nterminal);
        let Some(&ofst) = self.shift_ofst.get(state as usize) else {
            return self.default_action[state as usize];
        };
        loop {
            let i = ofst as i64 + lookahead as i64;
            debug_assert!(i >= 0 && (i as usize) < self.lookahead.len());
            if self.lookahead[i as usize] == lookahead {
                return self.action[i as usize];
            }
            if let Some(&fb) = self.fallback.get(lookahead as usize) {
                if fb != NO_SYMBOL {
                    debug_assert_eq!(
                        self.fallback[fb as usize],
                        NO_SYMBOL,
                        "fallback loop must terminate"
                    );
                    lookahead = fb;
                    continue;
                }
            }
            if self.wildcard != NO_SYMBOL && lookahead > 0 {
                let j = ofst as i64 + self.wildcard as i64;
                if j >= 0
                    && (j as usize) < self.action.len()
                    && self.lookahead[j as usize] == self.wildcard
                {
                    return self.action[j as usize];
                }
            }
            return self.default_action[state as usize];
        }
    }

    /// Look up the action for a nonterminal lookahead (the goto taken after
    /// a reduce).
    pub fn reduce_action(&self, state: u32, lookahead: u16) -> u32 {
        let Some(&ofst) = self.reduce_ofst.get(state as usize) else {
            return self.default_action[state as usize];
        };
        let i = ofst as i64 + lookahead as i64;
        if i < 0 || i as usize >= self.action.len() || self.lookahead[i as usize] != lookahead {
            return self.default_action[state as usize];
        }
        self.action[i as usize]
    }
}
