//! Root driver: iterative deepening, aspiration windows, multi-PV, PV
//! extraction and the best/ponder move hand-off.

use std::sync::atomic::Ordering;

use crate::board::{Bitboard, GenMode, Move, MoveGen, UndoInfo, MOVE_NONE};

use super::score::{self, Score, SC_DRAW, SC_INFINITY, SC_INVALID};
use super::tb::TbRootMove;
use super::tt::Bound;
use super::{
    CurMove, PvInfo, Search, SearchInfo, SearchMode, FRAC_ONE_PLY, FRAC_SHIFT, MAX_DEPTH, MAX_PLY,
    SF_NO_TABLEBASE, SF_NO_TIMEOUT,
};

/// Triangular PV table size: row `ply` holds up to `MAX_PLY - ply` moves.
pub(crate) const TRI_PV_SIZE: usize = MAX_PLY * (MAX_PLY + 1) / 2 + 1;

#[inline]
fn tri_index(ply: u32) -> usize {
    let p = ply as usize;
    p * (2 * MAX_PLY + 1 - p) / 2
}

/// Aspiration half-window for the first attempt, in centipawns.
const ASPIRATION_WINDOW: Score = 15;
/// Score swings at least this large arm the blunder check.
const BLUNDER_MARGIN: Score = 30;

/// A root move with its running score, subtree size and principal variation.
#[derive(Clone)]
pub struct RootMove {
    pub mv: Move,
    pub score: Score,
    pub nodes: u64,
    pub pv: Vec<Move>,
}

/// Root move list plus a stable sort order; the order survives between
/// iterations except that the best move is promoted to the front.
#[derive(Clone)]
pub struct RootMoves {
    moves: Vec<RootMove>,
    order: Vec<usize>,
    pub best_move: Move,
    pub best_score: Score,
    pub discovered: Bitboard,
}

impl RootMoves {
    #[must_use]
    pub fn new() -> Self {
        RootMoves {
            moves: Vec::new(),
            order: Vec::new(),
            best_move: MOVE_NONE,
            best_score: SC_INVALID,
            discovered: 0,
        }
    }

    pub(crate) fn reset(&mut self, discovered: Bitboard) {
        self.moves.clear();
        self.order.clear();
        self.best_move = MOVE_NONE;
        self.best_score = SC_INVALID;
        self.discovered = discovered;
    }

    pub(crate) fn add(&mut self, mv: Move) {
        self.order.push(self.moves.len());
        self.moves.push(RootMove {
            mv,
            score: -SC_INFINITY,
            nodes: 0,
            pv: Vec::new(),
        });
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.moves.len()
    }

    #[must_use]
    pub fn sorted(&self, i: usize) -> &RootMove {
        &self.moves[self.order[i]]
    }

    pub(crate) fn sorted_mut(&mut self, i: usize) -> &mut RootMove {
        &mut self.moves[self.order[i]]
    }

    /// Stable sort by score, descending; equal scores keep their order.
    pub(crate) fn sort(&mut self) {
        let moves = &self.moves;
        self.order.sort_by(|&a, &b| moves[b].score.cmp(&moves[a].score));
    }

    /// Move the entry at sorted position `i` to the front, shifting the rest.
    pub(crate) fn promote(&mut self, i: usize) {
        let idx = self.order.remove(i);
        self.order.insert(0, idx);
    }
}

impl Default for RootMoves {
    fn default() -> Self {
        RootMoves::new()
    }
}

impl Search {
    #[inline]
    pub(crate) fn init_ply(&mut self, ply: u32, pv: bool) -> usize {
        let idx = tri_index(ply);
        if pv {
            self.tri_pv[idx] = MOVE_NONE;
        }
        idx
    }

    /// Graft the child row's PV under the move just written at this ply.
    pub(crate) fn copy_pv(&mut self, ply: u32) {
        let mut dst = tri_index(ply) + 1;
        let mut src = tri_index(ply + 1);
        loop {
            let m = self.tri_pv[src];
            self.tri_pv[dst] = m;
            if m == MOVE_NONE {
                break;
            }
            dst += 1;
            src += 1;
        }
    }

    /// Rebuild `rm.pv` from the triangular table, validating each move on a
    /// scratch board; an illegal entry ends the line.
    fn extract_pv(&self, rm: &mut RootMove) {
        rm.pv.clear();
        let mut scratch = self.board.clone();
        for i in 0.. {
            let m = self.tri_pv[i];
            if m == MOVE_NONE {
                break;
            }
            if !scratch.is_legal_move(m) {
                debug_assert!(false, "illegal move in PV");
                break;
            }
            let gives_check = scratch.is_check(m, scratch.discovered());
            let mut undo = UndoInfo::new();
            scratch.make_move(m, &mut undo, gives_check);
            rm.pv.push(m);
        }
    }

    /// When the PV got truncated by a late fail, seed the ponder move from
    /// the hash table instead.
    pub(crate) fn extract_ponder_from_hash(&mut self, best: Move) -> Move {
        if best == MOVE_NONE || !self.board.is_legal_move(best) {
            return MOVE_NONE;
        }
        let gives_check = self.board.is_check(best, self.board.discovered());
        let mut undo = UndoInfo::new();
        self.board.make_move(best, &mut undo, gives_check);
        let (_, tte) = self.tt.probe(self.board.sig(), 0, 0, SC_DRAW, SC_DRAW);
        let ponder = if tte.mv != MOVE_NONE && self.board.is_legal_move(tte.mv) {
            tte.mv
        } else {
            MOVE_NONE
        };
        self.board.unmake_move(&undo);
        ponder
    }

    fn send_pv(&self, rm: &RootMove, depth: i32, score: Score, alpha: Score, beta: Score, index: u32) {
        let elapsed = self.elapsed_ms();
        let nodes = self.smp_nodes();
        let bound = if score >= beta {
            Bound::Lower
        } else if score <= alpha {
            Bound::Upper
        } else {
            Bound::Exact
        };
        let mut info = SearchInfo {
            depth: Some(depth),
            sel_depth: Some(self.sel_depth.max(self.smp_sel_depth())),
            time_ms: Some(elapsed),
            nodes: Some(nodes),
            nps: Some(if elapsed > 0 { nodes * 1000 / elapsed } else { 0 }),
            pv: Some(PvInfo {
                score,
                bound,
                index,
                moves: rm.pv.clone(),
            }),
            ..SearchInfo::default()
        };
        let tb_hits = self.smp_tb_hits();
        if tb_hits > 0 {
            info.tb_hits = Some(tb_hits);
        }
        self.send_info(&info);
    }

    fn override_tb_score(rm: &mut RootMove, tb_moves: &[TbRootMove]) {
        // A proven mate beats any tablebase verdict.
        if rm.score != -SC_INFINITY && score::is_mate(rm.score) {
            return;
        }
        if let Some(t) = tb_moves.iter().find(|t| t.mv == rm.mv) {
            rm.score = super::tb::Tablebases::root_score(t);
        }
    }

    /// One full-width root search at `depth` within `(alpha, beta)`.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn root(&mut self, depth: i32, mut alpha: Score, mut beta: Score) -> Score {
        // Quiescence explosion guard scales with the iteration depth.
        self.min_qs_depth = -(MAX_DEPTH.min(depth * 3));

        self.root_moves.best_move = MOVE_NONE;
        self.root_moves.best_score = SC_INVALID;
        self.init_ply(0, true);

        let mut oalpha = alpha;
        let fd = depth << FRAC_SHIFT;
        let mut best = -SC_INFINITY;
        let mut bestm = MOVE_NONE;

        // Tablebase root probe; verdicts override searched scores.
        let mut tb_moves: Vec<TbRootMove> = Vec::new();
        if self.search_flags & SF_NO_TABLEBASE == 0
            && !self.board.can_castle_any()
            && self.board.occupied().count_ones() <= self.tb.max_pieces()
        {
            if let Some(list) = self.tb.probe_root(&self.board) {
                self.tb_hits += 1;
                tb_moves = list;
                if depth == 1 {
                    for i in 0..self.root_moves.count() {
                        Self::override_tb_score(self.root_moves.sorted_mut(i), &tb_moves);
                    }
                }
            }
        }
        if !tb_moves.is_empty() {
            // Aspiration windows make no sense on tablebase scores.
            alpha = -SC_INFINITY;
            beta = SC_INFINITY;
            oalpha = alpha;
        }

        self.root_moves.sort();
        let multi_pv = self.mode.multi_pv as usize;
        for i in 0..self.root_moves.count() {
            if i >= multi_pv {
                self.root_moves.sorted_mut(i).score = -SC_INFINITY;
            }
        }

        let total = self.root_moves.count();
        let mut count = 0usize;

        for i in 0..total {
            count += 1;
            let m = self.root_moves.sorted(i).mv;
            self.stack[0].current = m;

            if self.reporting_curmove() {
                self.send_info(&SearchInfo {
                    cur_move: Some(CurMove {
                        mv: m,
                        index: i,
                        count: total,
                    }),
                    ..SearchInfo::default()
                });
            }

            let onodes = self.nodes;
            let ischeck = self.board.is_check(m, self.root_moves.discovered);

            // Check extension, plus the forced single reply.
            let mut extension = if ischeck { FRAC_ONE_PLY } else { 0 };
            if self.board.in_check() && total == 1 {
                extension = FRAC_ONE_PLY;
            }
            let new_depth = fd - FRAC_ONE_PLY + extension;

            let mut undo = UndoInfo::new();
            self.board.make_move(m, &mut undo, ischeck);
            self.rep.push(self.board.sig(), self.board.fifty() == 0);

            let mut s = alpha + 1;
            if count > multi_pv {
                s = -self.search(1, new_depth, -alpha - 1, -alpha, false, true, MOVE_NONE);
            }
            if s > alpha {
                s = -self.search(1, new_depth, -beta, -alpha, true, false, MOVE_NONE);
            }

            self.rep.pop();
            self.board.unmake_move(&undo);

            if self.aborting.load(Ordering::Relaxed) {
                return SC_INVALID;
            }
            if self.aborting_smp.load(Ordering::Relaxed) {
                break;
            }

            {
                let rm = self.root_moves.sorted_mut(i);
                rm.nodes = self.nodes - onodes;
            }
            if !tb_moves.is_empty() {
                // The verdict overrides the searched score unless we found a
                // real mate.
                let mut probe = RootMove {
                    mv: m,
                    score: s,
                    nodes: 0,
                    pv: Vec::new(),
                };
                Self::override_tb_score(&mut probe, &tb_moves);
                s = probe.score;
            }

            if count == 1 && s <= alpha {
                // Root fail low: bail out early so aspiration can widen.
                self.root_moves.best_move = m;
                self.tri_pv[0] = m;
                self.tri_pv[1] = MOVE_NONE;
                let mut rm = self.root_moves.sorted(0).clone();
                self.extract_pv(&mut rm);
                if self.worker_shared.is_some() {
                    rm.score = s;
                    self.aborting_smp.store(true, Ordering::Relaxed);
                }
                *self.root_moves.sorted_mut(0) = rm.clone();
                self.send_pv(&rm, depth, s, oalpha, beta, 0);
                return s;
            }

            if s > best {
                best = s;
                bestm = m;
            }
            if s > alpha {
                self.tri_pv[0] = m;
                self.copy_pv(0);
                alpha = s;
                {
                    let mut rm = self.root_moves.sorted(i).clone();
                    rm.score = s;
                    self.extract_pv(&mut rm);
                    *self.root_moves.sorted_mut(i) = rm;
                }

                if multi_pv <= 1 {
                    let rm = self.root_moves.sorted(i).clone();
                    self.send_pv(&rm, depth, s, oalpha, beta, 0);
                    self.root_moves.promote(i);
                } else {
                    self.multi_pv_update(depth, count, s, &mut alpha);
                }

                for j in multi_pv..self.root_moves.count() {
                    self.root_moves.sorted_mut(j).score = -SC_INFINITY;
                }

                if s >= beta {
                    self.root_moves.best_move = bestm;
                    self.root_moves.best_score = best;
                    // Never pollute the TT while searching a move subset.
                    if self.mode.moves.is_empty() {
                        self.tt.store(self.board.sig(), self.age, bestm, best, Bound::Lower, depth, 0);
                    }
                    if self.worker_shared.is_some() {
                        self.aborting_smp.store(true, Ordering::Relaxed);
                    }
                    return best;
                }
            }
        }

        // A helper finished this iteration first: adopt its result.
        if self.aborting_smp.load(Ordering::Relaxed) && !self.workers.is_empty() {
            if let Some(adopted) = self.smp_adopt() {
                for j in 0..(self.mode.multi_pv as usize).min(self.root_moves.count()) {
                    let rm = self.root_moves.sorted(j).clone();
                    self.send_pv(&rm, depth, rm.score, oalpha, beta, j as u32);
                }
                return adopted;
            }
        }

        self.root_moves.best_move = bestm;
        self.root_moves.best_score = best;

        if bestm != MOVE_NONE && self.mode.moves.is_empty() {
            let bound = if best > oalpha { Bound::Exact } else { Bound::Upper };
            self.tt.store(self.board.sig(), self.age, bestm, best, bound, depth, 0);
        }

        if self.worker_shared.is_some() {
            self.aborting_smp.store(true, Ordering::Relaxed);
        }
        best
    }

    /// Multi-PV bookkeeping after a root move improved alpha.
    fn multi_pv_update(&mut self, depth: i32, count: usize, score: Score, alpha: &mut Score) {
        let multi_pv = self.mode.multi_pv as usize;
        let mut mpv = count.min(multi_pv);
        let mut pv_count = 0;
        let mut ok = false;
        for j in 0..mpv {
            let ms = self.root_moves.sorted(j).score;
            if ms != -SC_INFINITY {
                pv_count += 1;
            }
            if score >= ms {
                ok = true;
            }
        }
        mpv = mpv.min(pv_count);
        if !ok {
            return;
        }
        self.root_moves.sort();
        if mpv >= multi_pv {
            for j in 0..mpv {
                let rm = self.root_moves.sorted(j).clone();
                self.send_pv(&rm, depth, rm.score, -SC_INFINITY, SC_INFINITY, j as u32);
            }
            // Only moves beating the worst shown line are interesting now.
            let mut new_alpha = SC_INFINITY;
            for j in 0..mpv {
                new_alpha = new_alpha.min(self.root_moves.sorted(j).score);
            }
            *alpha = new_alpha;
        } else {
            *alpha = -SC_INFINITY;
        }
    }

    /// Iterative deepening driver. Seeds the root move list, runs deepening
    /// with aspiration windows and lazy-SMP helpers, and reports everything
    /// through the callback. Returns the score of the last finished search.
    pub fn iterate(&mut self, board: &crate::board::Board, mode: &SearchMode) -> Score {
        self.mode = mode.clone();
        self.mode.multi_pv = self.mode.multi_pv.max(1);
        self.board = board.clone();

        let contempt = self.effective_contempt();
        self.eval.set_contempt(contempt);

        self.init_iteration();
        self.rep.push(self.board.sig(), false);

        // Seed the hash move for root ordering.
        let (_, tte) = self.tt.probe(self.board.sig(), 0, 0, SC_DRAW, SC_DRAW);

        // Root move list, honoring a "searchmoves" restriction.
        let mut mg = MoveGen::new(
            &self.board,
            tte.mv,
            [MOVE_NONE; 2],
            MOVE_NONE,
            GenMode::Normal,
        );
        self.root_moves.reset(mg.discovered());
        loop {
            let m = mg.next(&self.board, &self.history);
            if m == MOVE_NONE {
                break;
            }
            if !self.mode.moves.is_empty() && !self.mode.moves.contains(&m) {
                continue;
            }
            self.root_moves.add(m);
        }

        let mut depth_limit = MAX_DEPTH;
        if self.mode.max_time_ms != 0
            && self.root_moves.count() == 1
            && self.mode.moves.is_empty()
        {
            // Play the only move fast, depth 2 leaves something to ponder on.
            depth_limit = 2;
        }
        if self.mode.max_depth > 0 {
            depth_limit = depth_limit.min(self.mode.max_depth);
        }
        self.mode.multi_pv = (self.mode.multi_pv).min(self.root_moves.count().max(1) as u32);

        let mut res = SC_INVALID;
        let mut last_iteration = SC_DRAW;
        let mut last_iter_start = 0u64;

        let mut d = 1;
        while d <= depth_limit && self.root_moves.count() > 0 {
            let iter_start = self.elapsed_ms();
            let last_delta = iter_start - last_iter_start;
            last_iter_start = iter_start;

            if d > 1
                && (!self.mode.ponder || self.ponder_hit.load(Ordering::Relaxed))
                && self.mode.max_time_ms != 0
                && !self.mode.fixed_time
            {
                // The next iteration costs at least as much as the last one;
                // stop rather than start something unfinishable.
                if iter_start + last_delta > self.mode.max_time_ms {
                    break;
                }
            }

            self.send_info(&SearchInfo {
                depth: Some(d),
                sel_depth: Some(self.sel_depth),
                time_ms: Some(iter_start),
                ..SearchInfo::default()
            });
            self.sel_depth = 0;

            if d == 1 {
                // Depth 1 always completes: no timeout, full window.
                self.aborting_smp.store(false, Ordering::Relaxed);
                let saved = self.search_flags;
                self.search_flags |= SF_NO_TIMEOUT;
                let score = self.root(1, -SC_INFINITY, SC_INFINITY);
                self.search_flags = saved;
                if score != SC_INVALID {
                    res = score;
                    last_iteration = score;
                }
                self.can_stop = true;
                if self.unwinding() {
                    break;
                }
            } else if self.mode.multi_pv > 1 {
                self.smp_start(d, -SC_INFINITY, SC_INFINITY);
                let score = self.root(d, -SC_INFINITY, SC_INFINITY);
                self.smp_stop();
                if score != SC_INVALID {
                    res = score;
                    last_iteration = score;
                }
            } else if let Some(score) = self.aspiration(d, last_iteration) {
                res = score;
                last_iteration = score;
            }

            self.elo_limit_sleep(iter_start);

            if self.mode.mate_search > 0 && score::is_valid(res) && score::is_mate(res) {
                if score::mate_moves(res) == self.mode.mate_search as i32 {
                    break;
                }
            }
            if self.aborting.load(Ordering::Relaxed) {
                break;
            }
            d += 1;
        }

        // In ponder mode hold the result until a stop or ponderhit arrives.
        if self.mode.ponder {
            while !self.aborting.load(Ordering::Relaxed)
                && !self.ponder_hit.load(Ordering::Relaxed)
                && !self.stop_request.load(Ordering::Relaxed)
            {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }

        // Final totals frame.
        let elapsed = self.elapsed_ms();
        let nodes = self.smp_nodes();
        let mut info = SearchInfo {
            time_ms: Some(elapsed),
            nodes: Some(nodes),
            nps: Some(if elapsed > 0 { nodes * 1000 / elapsed } else { 0 }),
            ..SearchInfo::default()
        };
        let tb_hits = self.smp_tb_hits();
        if tb_hits > 0 {
            info.tb_hits = Some(tb_hits);
        }
        self.send_info(&info);

        self.rep.pop();

        // Best and ponder moves.
        if self.root_moves.count() > 0 {
            let rm = self.root_moves.sorted(0).clone();
            self.iter_best = rm.mv;
            self.iter_ponder = if rm.pv.len() > 1 { rm.pv[1] } else { MOVE_NONE };
            if self.iter_ponder == MOVE_NONE && self.iter_best != MOVE_NONE {
                // A late fail truncated the PV; pull the reply from the hash.
                self.iter_ponder = self.extract_ponder_from_hash(self.iter_best);
            }
        }
        let mut best_info = SearchInfo {
            best_move: Some(self.iter_best),
            ..SearchInfo::default()
        };
        if self.iter_ponder != MOVE_NONE {
            best_info.ponder_move = Some(self.iter_ponder);
        }
        self.send_info(&best_info);

        if score::is_valid(res) {
            res
        } else {
            last_iteration
        }
    }

    /// Aspiration-window loop around one iteration. Returns the settled score
    /// or None when the iteration aborted.
    fn aspiration(&mut self, depth: i32, last_iteration: Score) -> Option<Score> {
        let prev_score = last_iteration;
        let mut window = ASPIRATION_WINDOW;
        let mut alpha = last_iteration - window;
        let mut beta = last_iteration + window;

        let saved_max_time = self.mode.max_time_ms;
        let mut blunder_check = false;
        let mut fail_high = false;
        let mut res = None;
        let mut max_sel_depth = 0;

        loop {
            alpha = alpha.max(-SC_INFINITY);
            beta = beta.min(SC_INFINITY);
            debug_assert!(alpha < beta);

            self.smp_start(depth, alpha, beta);
            let score = self.root(depth, alpha, beta);
            max_sel_depth = max_sel_depth.max(self.sel_depth);
            self.sel_depth = max_sel_depth;
            self.smp_stop();

            if self.aborting.load(Ordering::Relaxed) || score == SC_INVALID {
                break;
            }
            res = Some(score);

            if score > alpha && score < beta {
                break;
            }

            window *= 2;
            if score <= alpha {
                // Fail low: widen mostly downward.
                while alpha - window < -SC_INFINITY {
                    window /= 2;
                }
                alpha -= window;
                beta -= window / 3;
                // A fail low following a fail high smells like a blunder in
                // the making; buy time up to the hard limit to resolve it.
                if fail_high || (score - prev_score).abs() >= BLUNDER_MARGIN {
                    blunder_check = true;
                    self.mode.max_time_ms = self.mode.abs_limit_ms;
                }
            } else {
                fail_high = true;
                while beta + window > SC_INFINITY {
                    window /= 2;
                }
                beta += window;
                alpha += window / 3;
            }
        }
        if blunder_check {
            self.mode.max_time_ms = saved_max_time;
        }
        res
    }
}
