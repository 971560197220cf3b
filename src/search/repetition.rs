//! Fifty-move-aware repetition stack.
//!
//! One entry per position on the current search path. Entries pushed after an
//! irreversible move carry a barrier flag: the backward scan stops there,
//! since no earlier position can recur past a capture, pawn move or castling.
//! A single prior occurrence inside the path counts as a draw, which is
//! deliberately stricter than threefold; the full rule only matters at the
//! game level.

#[derive(Clone, Copy)]
struct RepEntry {
    sig: u64,
    irreversible: bool,
}

#[derive(Clone)]
pub struct RepStack {
    entries: Vec<RepEntry>,
}

impl RepStack {
    #[must_use]
    pub fn new() -> Self {
        RepStack {
            entries: Vec::with_capacity(512),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn push(&mut self, sig: u64, irreversible: bool) {
        self.entries.push(RepEntry { sig, irreversible });
    }

    #[inline]
    pub fn pop(&mut self) {
        debug_assert!(!self.entries.is_empty());
        self.entries.pop();
    }

    /// Does `sig` (the position on top of the stack) repeat an earlier entry
    /// between here and the nearest irreversibility barrier?
    #[must_use]
    pub fn is_repetition(&self, sig: u64) -> bool {
        let n = self.entries.len();
        if n < 2 {
            return false;
        }
        // An irreversible top entry cannot repeat anything before itself.
        if self.entries[n - 1].irreversible {
            return false;
        }
        for e in self.entries[..n - 1].iter().rev() {
            if e.sig == sig {
                return true;
            }
            if e.irreversible {
                break;
            }
        }
        false
    }

    /// Replace the contents with another stack's (SMP worker sync).
    pub fn copy_from(&mut self, other: &RepStack) {
        self.entries.clear();
        self.entries.extend_from_slice(&other.entries);
    }
}

impl Default for RepStack {
    fn default() -> Self {
        RepStack::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_single_recurrence() {
        let mut rep = RepStack::new();
        rep.push(111, false);
        rep.push(222, false);
        rep.push(111, false);
        assert!(rep.is_repetition(111));
        assert!(!rep.is_repetition(222));
    }

    #[test]
    fn barrier_blocks_older_entries() {
        let mut rep = RepStack::new();
        rep.push(111, false);
        rep.push(222, true); // capture happened here
        rep.push(111, false);
        assert!(!rep.is_repetition(111), "barrier must hide the old entry");
        // The barrier entry itself is still reachable from above.
        rep.push(222, false);
        assert!(rep.is_repetition(222));
    }

    #[test]
    fn irreversible_top_never_repeats() {
        let mut rep = RepStack::new();
        rep.push(333, false);
        rep.push(333, true);
        assert!(!rep.is_repetition(333));
    }

    #[test]
    fn pop_unwinds() {
        let mut rep = RepStack::new();
        rep.push(1, false);
        rep.push(2, false);
        rep.push(1, false);
        assert!(rep.is_repetition(1));
        rep.pop();
        rep.push(7, false);
        assert!(!rep.is_repetition(7));
    }
}
