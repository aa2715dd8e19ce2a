//! The action-table offset packer.
//!
//! Every state contributes two sparse rows, one over terminals and one over
//! nonterminals. All rows are laid into a single linear array of
//! `(lookahead, action)` pairs: a state stores only an offset, and a lookup
//! at `offset + lookahead` is valid when the slot's recorded lookahead
//! matches. Rows are inserted largest-first and may overlap or fully reuse
//! earlier rows, which is what makes the final table small.

/// One slot of the table under construction; `(-1, -1)` marks an empty slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LookaheadAction {
    pub lookahead: i32,
    pub action: i32,
}

const EMPTY: LookaheadAction = LookaheadAction {
    lookahead: -1,
    action: -1,
};

#[derive(Debug)]
pub struct ActTab {
    /// Used slots in `a_action` (high-water mark, not trailing-trimmed).
    n_action: usize,
    a_action: Vec<LookaheadAction>,
    /// The transaction set for the row currently being added.
    a_lookahead: Vec<LookaheadAction>,
    mn_lookahead: i32,
    mn_action: i32,
    mx_lookahead: i32,
    nsymbol: u32,
    nterminal: u32,
}

impl ActTab {
    pub fn new(nsymbol: u32, nterminal: u32) -> Self {
        Self {
            n_action: 0,
            a_action: Vec::new(),
            a_lookahead: Vec::new(),
            mn_lookahead: 0,
            mn_action: 0,
            mx_lookahead: 0,
            nsymbol,
            nterminal,
        }
    }

    /// Number of entries in the lookahead table (untrimmed).
    pub fn lookahead_size(&self) -> usize {
        self.n_action
    }

    /// The size of the action table without the trailing empty entries.
    pub fn action_size(&self) -> usize {
        let mut n = self.n_action;
        while n > 0 && self.a_action[n - 1].lookahead < 0 {
            n -= 1;
        }
        n
    }

    pub fn action(&self, n: usize) -> i32 {
        self.a_action[n].action
    }

    pub fn lookahead(&self, n: usize) -> i32 {
        self.a_action[n].lookahead
    }

    /// Add one entry to the current transaction set. Called once per
    /// lookahead of one state row.
    pub fn add_action(&mut self, lookahead: i32, action: i32) {
        if self.a_lookahead.is_empty() {
            self.mx_lookahead = lookahead;
            self.mn_lookahead = lookahead;
            self.mn_action = action;
        } else {
            if self.mx_lookahead < lookahead {
                self.mx_lookahead = lookahead;
            }
            if self.mn_lookahead > lookahead {
                self.mn_lookahead = lookahead;
                self.mn_action = action;
            }
        }
        self.a_lookahead.push(LookaheadAction { lookahead, action });
    }

    /// Fold the current transaction set into the action table and return
    /// the offset its state must record. Resets the transaction set.
    ///
    /// With `make_it_safe`, the chosen offset never lets a terminal
    /// lookahead index below the row start, and the fill is extended past
    /// the row so a malformed token index still lands on an empty or owned
    /// slot rather than a neighbor's entry. Terminal rows need this because
    /// tokens come from untrusted input; nonterminal lookaheads are
    /// generated by the parser itself.
    pub fn insert(&mut self, make_it_safe: bool) -> i32 {
        assert!(!self.a_lookahead.is_empty());
        let n_lookahead = self.a_lookahead.len();
        let mn = self.mn_lookahead as i64;
        let mx = self.mx_lookahead as i64;

        // Worst case the transaction is appended to the current table.
        let n = self.nsymbol as usize + 1;
        if self.n_action + n >= self.a_action.len() {
            let new_alloc = self.n_action + n + self.a_action.len() + 20;
            self.a_action.resize(new_alloc, EMPTY);
        }

        // Scan for an existing offset that exactly duplicates the current
        // transaction: every row entry must match, and no stray entry
        // outside the row may alias one of the row's slots.
        let end: i64 = if make_it_safe { mn } else { 0 };
        let mut i: i64 = self.n_action as i64 - 1;
        'dedup: while i >= end {
            if self.a_action[i as usize].lookahead == self.mn_lookahead {
                if self.a_action[i as usize].action != self.mn_action {
                    i -= 1;
                    continue;
                }
                for la in &self.a_lookahead {
                    let k = la.lookahead as i64 - mn + i;
                    if k < 0 || k >= self.n_action as i64 {
                        i -= 1;
                        continue 'dedup;
                    }
                    if la.lookahead != self.a_action[k as usize].lookahead
                        || la.action != self.a_action[k as usize].action
                    {
                        i -= 1;
                        continue 'dedup;
                    }
                }
                let mut hits = 0usize;
                for j in 0..self.n_action as i64 {
                    if self.a_action[j as usize].lookahead < 0 {
                        continue;
                    }
                    if self.a_action[j as usize].lookahead as i64 == j + mn - i {
                        hits += 1;
                    }
                }
                if hits == n_lookahead {
                    break; // An exact match is found at offset i.
                }
            }
            i -= 1;
        }

        // Otherwise find a hole the transaction fits into. If no hole is
        // found the scan settles past the fill and the row is appended.
        if i < end {
            i = if make_it_safe { mn } else { 0 };
            'hole: while i < self.a_action.len() as i64 - mx {
                if self.a_action[i as usize].lookahead < 0 {
                    for la in &self.a_lookahead {
                        let k = la.lookahead as i64 - mn + i;
                        if k < 0 || self.a_action[k as usize].lookahead >= 0 {
                            i += 1;
                            continue 'hole;
                        }
                    }
                    for j in 0..self.n_action as i64 {
                        if self.a_action[j as usize].lookahead as i64 == j + mn - i {
                            i += 1;
                            continue 'hole;
                        }
                    }
                    break; // Fits in empty slots.
                }
                i += 1;
            }
        }

        // Install the transaction at offset i.
        for la in &self.a_lookahead {
            let k = (la.lookahead as i64 - mn + i) as usize;
            self.a_action[k] = *la;
            if k >= self.n_action {
                self.n_action = k + 1;
            }
        }
        if make_it_safe && i as usize + self.nterminal as usize >= self.n_action {
            self.n_action = i as usize + self.nterminal as usize + 1;
        }
        self.a_lookahead.clear();

        (i - mn) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_row(tab: &mut ActTab, row: &[(i32, i32)], safe: bool) -> i32 {
        for &(la, action) in row {
            tab.add_action(la, action);
        }
        tab.insert(safe)
    }

    fn check_row(tab: &ActTab, ofst: i32, row: &[(i32, i32)]) {
        for &(la, action) in row {
            let at = (ofst + la) as usize;
            assert_eq!(tab.lookahead(at), la, "lookahead at {at}");
            assert_eq!(tab.action(at), action, "action at {at}");
        }
    }

    #[test]
    fn rows_are_recoverable_through_their_offsets() {
        let mut tab = ActTab::new(10, 6);
        let rows: Vec<Vec<(i32, i32)>> = vec![
            vec![(0, 5), (1, 6), (2, 7), (3, 8)],
            vec![(1, 9), (4, 10)],
            vec![(2, 11)],
            vec![(0, 12), (5, 13)],
        ];
        let ofsts: Vec<i32> = rows
            .iter()
            .map(|row| insert_row(&mut tab, row, true))
            .collect();
        for (row, &ofst) in rows.iter().zip(&ofsts) {
            check_row(&tab, ofst, row);
        }
    }

    #[test]
    fn identical_rows_share_an_offset() {
        let mut tab = ActTab::new(10, 6);
        let row = [(0, 5), (2, 6), (4, 7)];
        let first = insert_row(&mut tab, &row, false);
        let size_after_first = tab.action_size();
        let second = insert_row(&mut tab, &row, false);
        assert_eq!(first, second);
        assert_eq!(tab.action_size(), size_after_first);
    }

    #[test]
    fn a_superset_row_is_not_deduplicated_into_a_subset() {
        let mut tab = ActTab::new(10, 6);
        let small = insert_row(&mut tab, &[(1, 5)], false);
        let big = insert_row(&mut tab, &[(1, 5), (2, 6)], false);
        check_row(&tab, small, &[(1, 5)]);
        check_row(&tab, big, &[(1, 5), (2, 6)]);
        // The subset row must not see the superset's extra entry at its own
        // offset unless the entry really is shared.
        if small == big {
            // Sharing is allowed only when every slot agrees; verified by
            // check_row above.
            return;
        }
    }

    #[test]
    fn stray_entries_do_not_alias_a_reused_row() {
        // Build a table with an entry that would sit inside a later row's
        // span; the packer must refuse to overlay the row on top of it.
        let mut tab = ActTab::new(10, 6);
        let first = insert_row(&mut tab, &[(0, 1), (3, 2)], false);
        let second = insert_row(&mut tab, &[(0, 1)], false);
        // Row two matches row one at its minimum entry, but offset reuse is
        // only legal if no other slot aliases: aAction[first + 3] holds an
        // entry with lookahead 3, which would alias lookahead 3 of row two.
        check_row(&tab, second, &[(0, 1)]);
        assert_ne!(
            first, second,
            "a row with fewer entries must not adopt an offset whose span \
             contains foreign entries"
        );
    }

    #[test]
    fn safe_rows_never_get_negative_offsets_and_pad_the_fill() {
        let mut tab = ActTab::new(10, 6);
        let ofst = insert_row(&mut tab, &[(4, 9)], true);
        assert!(ofst >= 0);
        // The fill must cover a full terminal span past the row start.
        assert!(tab.lookahead_size() >= ofst as usize + 4 + 1);
    }

    #[test]
    fn packed_size_beats_concatenation() {
        let mut tab = ActTab::new(30, 20);
        let mut total = 0usize;
        // One dense row and many repeated singletons, as stage I sees them:
        // largest first. States sharing a row must share its offset.
        let dense: Vec<(i32, i32)> = (0..16).map(|t| (t, 100 + t)).collect();
        total += dense.len();
        insert_row(&mut tab, &dense, false);
        let first = insert_row(&mut tab, &[(1, 77)], false);
        total += 1;
        for _ in 0..10 {
            let again = insert_row(&mut tab, &[(1, 77)], false);
            assert_eq!(first, again);
            total += 1;
        }
        assert!(
            tab.action_size() < total,
            "dedup must make the packed table smaller than the row sum"
        );
    }

    /// Shared offsets imply identical rows: an offset owned by one row can
    /// never be handed to a different row, because the owner's entries sit
    /// on that offset's diagonal and fail the stray check.
    #[test]
    fn distinct_rows_never_share_an_offset() {
        let mut tab = ActTab::new(12, 8);
        let rows: Vec<Vec<(i32, i32)>> = vec![
            vec![(0, 1), (2, 2), (5, 3)],
            vec![(0, 1), (2, 2)],
            vec![(1, 4)],
            vec![(1, 4), (3, 5)],
            vec![(0, 9)],
        ];
        let ofsts: Vec<i32> = rows
            .iter()
            .map(|row| insert_row(&mut tab, row, false))
            .collect();
        for (ri, row) in rows.iter().enumerate() {
            check_row(&tab, ofsts[ri], row);
            for (rj, other) in rows.iter().enumerate() {
                if ri != rj && ofsts[ri] == ofsts[rj] {
                    assert_eq!(row, other);
                }
            }
        }
    }
}
