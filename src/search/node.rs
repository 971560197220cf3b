//! Alpha-beta and quiescence nodes.
//!
//! Fail-soft PVS with the usual machinery: mate-distance pruning, TT
//! cutoffs that feed killers/history, tablebase WDL probes, beta razoring,
//! razoring, verified null move, IIR, singular extensions, futility and SEE
//! pruning, and fractional-ply LMR. Budget exhaustion unwinds with
//! `SC_INVALID`, which no caller ever stores.

use crate::board::{
    msb_index, GenMode, GenPhase, Move, MoveGen, UndoInfo, MAX_MOVES, MOVE_NONE, MOVE_NULL,
};

use super::score::{self, mate_in, mated_in, Score, SC_DRAW, SC_INFINITY, SC_INVALID};
use super::tb::{Tablebases, Wdl};
use super::tt::{Bound, TransTable};
use super::{Search, FRAC_ONE_PLY, FRAC_SHIFT, MAX_DEPTH, MAX_PLY, SF_NO_NULL, SF_NO_TABLEBASE};

// Pruning margins by remaining depth.
const BETA_MARGINS: [Score; 7] = [0, 100, 150, 250, 400, 600, 800];
const FUT_MARGINS: [Score; 7] = [0, 100, 150, 250, 400, 600, 800];
const RAZOR_MARGINS: [Score; 4] = [0, 150, 200, 250];
const SINGULAR_MARGIN: Score = 26;
const LATE_MOVE_FUTILITY: Score = 22;

impl Search {
    /// LMR amount in fractional plies: `msb(depth)·msb(count)/3`, rounded to
    /// a whole ply, capped at five plies and never the entire remaining depth.
    fn lmr_formula(depth: i32, lmr_count: usize) -> i32 {
        debug_assert!(depth > 0 && lmr_count > 0);
        let a = msb_index(depth as u64) as i32;
        let b = msb_index(lmr_count as u64) as i32;
        let mut res = a * b * FRAC_ONE_PLY / 3;
        res = (res + FRAC_ONE_PLY / 2) & !(FRAC_ONE_PLY - 1);
        res = res.min(5 * FRAC_ONE_PLY);
        if depth * FRAC_ONE_PLY > res {
            res
        } else {
            0
        }
    }

    /// Main alpha-beta node. `fdepth` is in fractional plies; `exclude`
    /// carries the excluded move of a singular-extension scout.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn search(
        &mut self,
        ply: u32,
        mut fdepth: i32,
        mut alpha: Score,
        mut beta: Score,
        pv: bool,
        donull: bool,
        exclude: Move,
    ) -> Score {
        debug_assert!(alpha >= -SC_INFINITY && beta <= SC_INFINITY && alpha < beta);

        if self.unwinding() {
            return SC_INVALID;
        }

        let mut depth = fdepth >> FRAC_SHIFT;
        if depth <= 0 {
            return self.qsearch(ply, 0, alpha, beta, pv);
        }

        let pv_index = self.init_ply(ply, pv);
        if ply + 1 > self.sel_depth {
            self.sel_depth = ply + 1;
        }

        // Mate-distance pruning.
        alpha = alpha.max(mated_in(ply));
        beta = beta.min(mate_in(ply));
        if alpha >= beta {
            return alpha;
        }

        self.nodes += 1;
        if self.timeout() {
            self.aborting.store(true, std::sync::atomic::Ordering::Relaxed);
            return SC_INVALID;
        }

        if self.is_draw() {
            return SC_DRAW;
        }
        if ply as usize >= MAX_PLY {
            return SC_DRAW;
        }

        let in_check = self.board.in_check();
        let sig = self.board.sig();
        let excluding = exclude != MOVE_NONE;

        // TT probe; the hash move is kept even when the score cannot cut.
        let (tt_score, tte) = self.tt.probe(sig, ply, depth, alpha, beta);
        self.stack[ply as usize].killers.hash_move = tte.mv;
        if !pv && !excluding && tt_score != SC_INVALID {
            debug_assert!(score::is_valid(tt_score));
            if tt_score >= beta {
                // Learn from the cutoff as if the hash move had been searched.
                let ttmove = tte.mv;
                if ttmove != MOVE_NONE && self.board.is_legal_move(ttmove) {
                    if ply > 0 {
                        let prev = self.stack[ply as usize - 1].current;
                        if prev != MOVE_NULL && prev != MOVE_NONE {
                            self.history.add_counter(&self.board, prev, ttmove);
                        }
                    }
                    if !ttmove.is_special() {
                        self.stack[ply as usize].killers.add_killer(ttmove);
                        self.history.add(&self.board, ttmove, depth);
                    }
                }
            }
            return tt_score;
        }

        // Tablebase WDL probe.
        if self.search_flags & SF_NO_TABLEBASE == 0
            && self.board.fifty() == 0
            && !self.board.can_castle_any()
        {
            let men = self.board.occupied().count_ones();
            if men <= self.tb.max_pieces() {
                if let Some(wdl) = self.tb.probe_wdl(&self.board) {
                    self.tb_hits += 1;
                    let tb_score = Tablebases::wdl_score(wdl);
                    self.tt.store(sig, self.age, MOVE_NONE, tb_score, Bound::Exact, depth, ply);
                    // On the PV keep searching unless it is a dead draw, so a
                    // real line is still produced.
                    if !pv || wdl == Wdl::Draw {
                        return tb_score;
                    }
                }
            }
        }

        // Static eval, tightened by the TT entry when its bound allows.
        let mut fscore = SC_INVALID;
        if !pv && !in_check {
            fscore = self.eval.eval(&self.board);
            let better = TransTable::probe_eval(ply, fscore, &tte);
            if better != SC_INVALID {
                fscore = better;
            }
            // Beta razoring: hopeless to fall back below alpha from here.
            if donull && !excluding && depth <= 6 {
                let raz = fscore - BETA_MARGINS[depth as usize];
                if raz > alpha && !score::is_mate(raz) {
                    return raz;
                }
            }
        }

        // Razoring: eval far below alpha near the leaves, verified by a
        // quiescence scout.
        if !pv
            && !in_check
            && !excluding
            && depth <= 3
            && tte.mv == MOVE_NONE
            && !score::is_mate(alpha)
        {
            let margin = RAZOR_MARGINS[depth as usize];
            if fscore + margin < alpha {
                let scout = alpha - margin;
                let s = self.qsearch(ply, 0, scout - 1, scout, false);
                if s == SC_INVALID {
                    return SC_INVALID;
                }
                if s < scout {
                    return s;
                }
            }
        }

        // Null move with verification at higher depths.
        if self.search_flags & SF_NO_NULL == 0
            && !pv
            && !in_check
            && donull
            && depth > 1
            && self.board.can_do_null()
            && fscore > alpha
        {
            let r = 2 + depth / 4;
            let mut undo = UndoInfo::new();
            self.board.make_null(&mut undo);
            self.stack[ply as usize].current = MOVE_NULL;
            self.rep.push(self.board.sig(), true);
            let s = -self.search(
                ply + 1,
                (depth - r - 1) * FRAC_ONE_PLY,
                -beta,
                1 - beta,
                false,
                false,
                MOVE_NONE,
            );
            self.rep.pop();
            self.board.unmake_null(&undo);
            if self.unwinding() {
                return SC_INVALID;
            }
            if s >= beta {
                let capped = if score::is_mate(s) { beta } else { s };
                if depth < 6 {
                    return capped;
                }
                // Verification search at reduced depth before trusting it.
                let vdepth = (depth - 5).min(depth * 2 / 3);
                let v = self.search(ply, vdepth * FRAC_ONE_PLY, alpha, beta, false, false, MOVE_NONE);
                if v == SC_INVALID {
                    return SC_INVALID;
                }
                if v >= beta {
                    return capped;
                }
            }
        }

        // Internal iterative reduction: no hash move at depth, invest less.
        if (pv || donull) && !excluding && ply > 0 && tte.mv == MOVE_NONE && depth > 4 {
            fdepth -= FRAC_ONE_PLY / 2;
            depth = fdepth >> FRAC_SHIFT;
        }

        // Singular extension scout: is the hash move alone above the rest?
        let hashmove = self.stack[ply as usize].killers.hash_move;
        let mut do_singular = false;
        if hashmove != MOVE_NONE
            && !excluding
            && depth > 6
            && depth + 1 < MAX_DEPTH
            && tte.hit
            && tte.depth > depth / 2
            && matches!(tte.bound, Bound::Lower | Bound::Exact)
        {
            let tt_val = score::unpack_tt(tte.score, ply);
            let singular_alpha = alpha.min(tt_val) - SINGULAR_MARGIN - 1;
            if !score::is_mate(singular_alpha)
                && !score::is_win(tt_val)
                && self.board.is_legal_move(hashmove)
            {
                let s = self.search(
                    ply,
                    fdepth / 3,
                    singular_alpha,
                    singular_alpha + 1,
                    false,
                    false,
                    hashmove,
                );
                if s == SC_INVALID {
                    return SC_INVALID;
                }
                do_singular = s <= singular_alpha;
            }
        }

        let oalpha = alpha;
        let mut best = -SC_INFINITY;
        let mut best_move = MOVE_NONE;
        let mut count = 0usize;
        let mut fail_hist = [MOVE_NONE; MAX_MOVES];
        let mut fail_hist_count = 0usize;

        let prev = if ply > 0 {
            self.stack[ply as usize - 1].current
        } else {
            MOVE_NONE
        };
        let counter = self.history.counter(&self.board, prev);
        let killers = self.stack[ply as usize].killers;
        let mut mg = MoveGen::new(
            &self.board,
            killers.hash_move,
            [killers.k1, killers.k2],
            counter,
            GenMode::Normal,
        );

        loop {
            let m = mg.next(&self.board, &self.history);
            if m == MOVE_NONE {
                break;
            }
            self.stack[ply as usize].current = m;
            count += 1;
            let lmr_count = count;

            if m == exclude {
                continue;
            }
            if !m.is_special() {
                fail_hist[fail_hist_count] = m;
                fail_hist_count += 1;
            }

            let ischeck = self.board.is_check(m, mg.discovered());

            // Extensions: checks one ply, singular hash move one ply, single
            // evasion three half-plies.
            let mut extension = if ischeck { FRAC_ONE_PLY } else { 0 };
            if do_singular && count == 1 {
                extension = FRAC_ONE_PLY;
            }
            if in_check
                && count == 1
                && depth > 8
                && depth < MAX_DEPTH - 2
                && mg.peek(&self.board, &self.history) == MOVE_NONE
            {
                extension = FRAC_ONE_PLY * 3 / 2;
            }
            let new_depth = fdepth - FRAC_ONE_PLY + extension;

            // Futility and SEE pruning in the quiet tail of the move list.
            if !pv
                && !in_check
                && mg.phase() >= GenPhase::QuietBuffer
                && extension == 0
                && depth <= 6
                && (!m.is_special() || m.is_underpromotion())
                && !score::is_mate(fscore)
                && self.board.can_prune(m.from())
            {
                let fut = fscore + FUT_MARGINS[depth as usize]
                    - LATE_MOVE_FUTILITY * lmr_count as Score;
                if fut <= alpha {
                    continue;
                }
                if !m.is_special() && self.board.see_sign(m) < 0 {
                    continue;
                }
            }

            let hist = if in_check {
                0
            } else {
                i32::from(self.history.score(&self.board, m))
            };

            let mut undo = UndoInfo::new();
            self.board.make_move(m, &mut undo, ischeck);
            self.rep.push(self.board.sig(), self.board.fifty() == 0);

            let mut s = alpha + 1;
            let reducible = !in_check
                && mg.phase() >= GenPhase::QuietBuffer
                && !ischeck
                && depth > 2
                && extension == 0;

            if pv && count > 1 {
                if reducible && (!m.is_special() || m.is_underpromotion()) {
                    let mut reduction = Self::lmr_formula(depth, lmr_count);
                    if hist > 0 || !self.board.can_reduce(m.to()) {
                        reduction -= FRAC_ONE_PLY;
                    }
                    if reduction > 0 {
                        s = -self.search(
                            ply + 1,
                            new_depth - reduction,
                            -alpha - 1,
                            -alpha,
                            false,
                            true,
                            MOVE_NONE,
                        );
                    }
                }
                if s > alpha {
                    s = -self.search(ply + 1, new_depth, -alpha - 1, -alpha, false, true, MOVE_NONE);
                }
            }
            if !pv && reducible {
                // Reduces losing captures as well.
                let mut reduction = Self::lmr_formula(depth, lmr_count);
                if hist > 0 || !self.board.can_reduce(m.to()) {
                    reduction -= FRAC_ONE_PLY;
                }
                if reduction > 0 {
                    s = -self.search(
                        ply + 1,
                        new_depth - reduction,
                        -alpha - 1,
                        -alpha,
                        false,
                        true,
                        MOVE_NONE,
                    );
                }
            }
            if s > alpha {
                s = -self.search(ply + 1, new_depth, -beta, -alpha, pv, !pv, MOVE_NONE);
            }

            self.rep.pop();
            self.board.unmake_move(&undo);

            if self.unwinding() {
                return SC_INVALID;
            }

            if s > best {
                best = s;
                if s > alpha {
                    best_move = m;
                    alpha = s;
                    if pv {
                        self.tri_pv[pv_index] = m;
                        self.copy_pv(ply);
                    }
                    if s >= beta {
                        if excluding {
                            return s;
                        }
                        if ply > 0 {
                            let prevm = self.stack[ply as usize - 1].current;
                            if prevm != MOVE_NULL && prevm != MOVE_NONE {
                                self.history.add_counter(&self.board, prevm, m);
                            }
                        }
                        if !m.is_special() {
                            self.stack[ply as usize].killers.add_killer(m);
                            self.history.add(&self.board, m, depth);
                            // The cutoff move itself sits at the end of the
                            // fail list.
                            fail_hist_count -= 1;
                        }
                        for fh in &fail_hist[..fail_hist_count] {
                            self.history.add(&self.board, *fh, -depth);
                        }
                        self.tt.store(sig, self.age, m, s, Bound::Lower, depth, ply);
                        return s;
                    }
                }
            }
        }

        if count == 0 {
            return if in_check { mated_in(ply) } else { SC_DRAW };
        }

        // Every move may have been pruned; never let -infinity reach the TT
        // as a fake mate score.
        if best == -SC_INFINITY {
            best = alpha;
        }

        if !excluding {
            let bound = if pv && best > oalpha {
                Bound::Exact
            } else {
                Bound::Upper
            };
            self.tt.store(sig, self.age, best_move, best, bound, depth, ply);
        }
        best
    }

    /// Quiescence: stand pat, then captures and queen promotions; checking
    /// quiets on the first quiescence ply. Depth counts down from zero and is
    /// floored by the explosion guard.
    pub(crate) fn qsearch(
        &mut self,
        ply: u32,
        qdepth: i32,
        mut alpha: Score,
        mut beta: Score,
        pv: bool,
    ) -> Score {
        debug_assert!(alpha >= -SC_INFINITY && beta <= SC_INFINITY && alpha < beta);

        if self.unwinding() {
            return SC_INVALID;
        }

        let pv_index = self.init_ply(ply, pv);
        if ply + 1 > self.sel_depth {
            self.sel_depth = ply + 1;
        }

        alpha = alpha.max(mated_in(ply));
        beta = beta.min(mate_in(ply));
        if alpha >= beta {
            return alpha;
        }

        self.nodes += 1;
        if self.timeout() {
            self.aborting.store(true, std::sync::atomic::Ordering::Relaxed);
            return SC_INVALID;
        }

        if self.is_draw() {
            return SC_DRAW;
        }
        if ply as usize >= MAX_PLY {
            return SC_DRAW;
        }

        let in_check = self.board.in_check();
        let sig = self.board.sig();
        let qchecks = !in_check && qdepth == 0;
        let tt_depth = if qchecks { 0 } else { -1 };

        let (tt_score, tte) = self.tt.probe(sig, ply, tt_depth, alpha, beta);
        self.stack[ply as usize].killers.hash_move = tte.mv;
        if !pv && tt_score != SC_INVALID {
            debug_assert!(score::is_valid(tt_score));
            return tt_score;
        }

        let oalpha = alpha;
        let mut positional_bias = 0;
        let mut ev = 0;
        let mut best;
        if in_check {
            best = -SC_INFINITY;
        } else {
            ev = self.eval.eval(&self.board);
            debug_assert!(!score::is_mate(ev));
            let better = TransTable::probe_eval(ply, ev, &tte);
            if better != SC_INVALID {
                ev = better;
            }
            best = ev;
            if best >= beta {
                return best; // stand pat
            }
            if best > alpha {
                alpha = best;
            }
            positional_bias = (self.eval.fast_eval(&self.board) - ev).abs();
        }

        // Explosion guard.
        if !in_check && qdepth < self.min_qs_depth {
            return best;
        }

        let killers = self.stack[ply as usize].killers;
        let mode = if qchecks {
            GenMode::QCapsChecks
        } else {
            GenMode::QCaps
        };
        let mut mg = MoveGen::new(
            &self.board,
            killers.hash_move,
            [killers.k1, killers.k2],
            MOVE_NONE,
            mode,
        );

        let mut best_move = MOVE_NONE;
        let mut count = 0usize;

        loop {
            let m = mg.next(&self.board, &self.history);
            if m == MOVE_NONE {
                break;
            }
            self.stack[ply as usize].current = m;
            count += 1;

            let ischeck = self.board.is_check(m, mg.discovered());

            // Delta pruning; skipped in low-material endings where lone
            // pawns decide games.
            if !pv
                && !in_check
                && !ischeck
                && self.board.can_prune(m.from())
                && self.board.non_pawn_mat() > 10
            {
                let fscore = ev + self.board.move_gain(m);
                if fscore + positional_bias + 100 <= alpha {
                    continue;
                }
            }

            let mut undo = UndoInfo::new();
            self.board.make_move(m, &mut undo, ischeck);
            self.rep.push(self.board.sig(), self.board.fifty() == 0);
            let s = -self.qsearch(ply + 1, qdepth - 1, -beta, -alpha, pv);
            self.rep.pop();
            self.board.unmake_move(&undo);

            if self.unwinding() {
                return SC_INVALID;
            }

            if s > best {
                best = s;
                if s > alpha {
                    best_move = m;
                    alpha = s;
                    if pv {
                        self.tri_pv[pv_index] = m;
                        self.copy_pv(ply);
                    }
                    if s >= beta {
                        // No history at depth <= 0, killers still learn.
                        if !m.is_special() {
                            self.stack[ply as usize].killers.add_killer(m);
                        }
                        self.tt.store(sig, self.age, m, s, Bound::Lower, tt_depth, ply);
                        return s;
                    }
                }
            }
        }

        if in_check && count == 0 {
            return mated_in(ply);
        }

        debug_assert!(best > -SC_INFINITY);

        let bound = if pv && best > oalpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.tt.store(sig, self.age, best_move, best, bound, tt_depth, ply);
        best
    }
}
