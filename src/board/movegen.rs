//! Staged pseudo-legal move production.
//!
//! Phase order out of check: hash move, winning/equal captures + queen
//! promotions (MVV/LVA), killers, counter move, history-ordered quiet buffer,
//! then losing captures and underpromotions. In check only evasions are
//! produced. Quiescence runs the generator in `QCaps` (captures + queen
//! promotions) or `QCapsChecks` (additionally quiet checking moves) mode.
//!
//! Every emitted move is fully legal: specials are validated at generation,
//! everything else passes the pin-aware `pseudo_is_legal` filter on the way
//! out. Buffers are fixed-size and sorted once per phase; the ordering score
//! lives in the upper bits of each entry so sorting is deterministic.

use once_cell::sync::Lazy;

use super::attack_tables::{between, KING_ATTACKS, KNIGHT_ATTACKS, PAWN_ATTACKS};
use super::magics::{bishop_attacks, queen_attacks, rook_attacks};
use super::state::Board;
use super::types::{
    lsb, Bitboard, Color, Move, MoveList, PieceType, ScoredMoveList, Square, Squares, MOVE_NONE,
    RANK_1, RANK_2, RANK_7, RANK_8,
};
use crate::search::history::History;

/// Generator mode: full search, quiescence captures, or quiescence captures
/// plus quiet checks (first quiescence ply only).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GenMode {
    Normal,
    QCaps,
    QCapsChecks,
}

/// Externally visible generation phases, ordered. The search keys pruning and
/// reduction decisions off `phase() >= GenPhase::QuietBuffer`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum GenPhase {
    HashMove,
    GoodCaptures,
    Killer1,
    Killer2,
    Counter,
    QuietBuffer,
    BadCaptures,
    QuietChecks,
    Evasions,
    Done,
}

/// Internal state machine steps (generation steps interleave the phases).
#[derive(Clone, Copy, PartialEq, Eq)]
enum Step {
    Hash,
    InitCaptures,
    GoodCaptures,
    Killer1,
    Killer2,
    Counter,
    InitQuiets,
    QuietBuffer,
    BadCaptures,
    InitChecks,
    QuietChecks,
    InitEvasions,
    Evasions,
    Done,
}

static EMPTY_HISTORY: Lazy<History> = Lazy::new(History::new);

const VALUE: [i16; 6] = [100, 325, 325, 500, 975, 0];

pub struct MoveGen {
    mode: GenMode,
    step: Step,
    in_check: bool,
    pins: Bitboard,
    discovered: Bitboard,
    hash_move: Move,
    killer1: Move,
    killer2: Move,
    counter: Move,
    good: ScoredMoveList,
    bad: ScoredMoveList,
    quiets: ScoredMoveList,
    idx_good: usize,
    idx_bad: usize,
    idx_quiet: usize,
    pending: Move,
    pending_phase: GenPhase,
    current_phase: GenPhase,
}

impl MoveGen {
    /// `hash_move`, `killers` and `counter` may be stale or `MOVE_NONE`; they
    /// are validated against the position before being emitted.
    #[must_use]
    pub fn new(
        board: &Board,
        hash_move: Move,
        killers: [Move; 2],
        counter: Move,
        mode: GenMode,
    ) -> Self {
        MoveGen {
            mode,
            step: Step::Hash,
            in_check: board.in_check(),
            pins: board.pins(),
            discovered: board.discovered(),
            hash_move,
            killer1: killers[0],
            killer2: killers[1],
            counter,
            good: ScoredMoveList::new(),
            bad: ScoredMoveList::new(),
            quiets: ScoredMoveList::new(),
            idx_good: 0,
            idx_bad: 0,
            idx_quiet: 0,
            pending: MOVE_NONE,
            pending_phase: GenPhase::Done,
            current_phase: GenPhase::HashMove,
        }
    }

    /// Discoverer mask cached at construction, shared with check detection.
    #[inline]
    #[must_use]
    pub fn discovered(&self) -> Bitboard {
        self.discovered
    }

    /// Phase the most recently returned move was produced in.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> GenPhase {
        self.current_phase
    }

    /// Next move, `MOVE_NONE` when exhausted. The board must be in the same
    /// position the generator was created for.
    pub fn next(&mut self, board: &Board, history: &History) -> Move {
        if self.pending != MOVE_NONE {
            let m = self.pending;
            self.pending = MOVE_NONE;
            self.current_phase = self.pending_phase;
            return m;
        }
        self.advance(board, history)
    }

    /// Look at the next move without consuming it; used to detect single
    /// replies. Returns `MOVE_NONE` when no further move exists.
    pub fn peek(&mut self, board: &Board, history: &History) -> Move {
        if self.pending == MOVE_NONE {
            let phase_before = self.current_phase;
            self.pending = self.advance(board, history);
            self.pending_phase = self.current_phase;
            self.current_phase = phase_before;
        }
        self.pending
    }

    fn advance(&mut self, board: &Board, history: &History) -> Move {
        loop {
            match self.step {
                Step::Hash => {
                    self.step = if self.in_check {
                        Step::InitEvasions
                    } else {
                        Step::InitCaptures
                    };
                    let hm = self.hash_move;
                    if hm != MOVE_NONE
                        && self.hash_move_fits_mode(board, hm)
                        && board.is_legal_move(hm)
                    {
                        self.current_phase = GenPhase::HashMove;
                        return hm;
                    }
                }
                Step::InitCaptures => {
                    board.gen_captures(&mut self.good, &mut self.bad);
                    self.good.sort_desc();
                    self.bad.sort_desc();
                    self.step = Step::GoodCaptures;
                }
                Step::GoodCaptures => {
                    while self.idx_good < self.good.len() {
                        let m = self.good.get(self.idx_good).mv();
                        self.idx_good += 1;
                        if m == self.hash_move {
                            continue;
                        }
                        if board.pseudo_is_legal(m, self.pins) {
                            self.current_phase = GenPhase::GoodCaptures;
                            return m;
                        }
                    }
                    self.step = match self.mode {
                        GenMode::Normal => Step::Killer1,
                        GenMode::QCaps => Step::Done,
                        GenMode::QCapsChecks => Step::InitChecks,
                    };
                }
                Step::Killer1 => {
                    self.step = Step::Killer2;
                    let k = self.killer1;
                    if self.killer_ok(board, k) {
                        self.current_phase = GenPhase::Killer1;
                        return k;
                    }
                }
                Step::Killer2 => {
                    self.step = Step::Counter;
                    let k = self.killer2;
                    if k != self.killer1 && self.killer_ok(board, k) {
                        self.current_phase = GenPhase::Killer2;
                        return k;
                    }
                }
                Step::Counter => {
                    self.step = Step::InitQuiets;
                    let cm = self.counter;
                    if cm != self.killer1 && cm != self.killer2 && self.killer_ok(board, cm) {
                        self.current_phase = GenPhase::Counter;
                        return cm;
                    }
                }
                Step::InitQuiets => {
                    board.gen_quiets(&mut self.quiets, history);
                    self.quiets.sort_desc();
                    self.step = Step::QuietBuffer;
                }
                Step::QuietBuffer => {
                    while self.idx_quiet < self.quiets.len() {
                        let m = self.quiets.get(self.idx_quiet).mv();
                        self.idx_quiet += 1;
                        if m == self.hash_move
                            || m == self.killer1
                            || m == self.killer2
                            || m == self.counter
                        {
                            continue;
                        }
                        if m.is_castling() || board.pseudo_is_legal(m, self.pins) {
                            self.current_phase = GenPhase::QuietBuffer;
                            return m;
                        }
                    }
                    self.step = Step::BadCaptures;
                }
                Step::BadCaptures => {
                    while self.idx_bad < self.bad.len() {
                        let m = self.bad.get(self.idx_bad).mv();
                        self.idx_bad += 1;
                        if m == self.hash_move {
                            continue;
                        }
                        if board.pseudo_is_legal(m, self.pins) {
                            self.current_phase = GenPhase::BadCaptures;
                            return m;
                        }
                    }
                    self.step = Step::Done;
                }
                Step::InitChecks => {
                    board.gen_quiet_checks(&mut self.quiets, history, self.discovered);
                    self.quiets.sort_desc();
                    self.step = Step::QuietChecks;
                }
                Step::QuietChecks => {
                    while self.idx_quiet < self.quiets.len() {
                        let m = self.quiets.get(self.idx_quiet).mv();
                        self.idx_quiet += 1;
                        if m == self.hash_move {
                            continue;
                        }
                        if m.is_castling() || board.pseudo_is_legal(m, self.pins) {
                            self.current_phase = GenPhase::QuietChecks;
                            return m;
                        }
                    }
                    self.step = Step::Done;
                }
                Step::InitEvasions => {
                    board.gen_evasions(&mut self.good, history);
                    self.good.sort_desc();
                    self.step = Step::Evasions;
                }
                Step::Evasions => {
                    while self.idx_good < self.good.len() {
                        let m = self.good.get(self.idx_good).mv();
                        self.idx_good += 1;
                        if m == self.hash_move {
                            continue;
                        }
                        if board.pseudo_is_legal(m, self.pins) {
                            self.current_phase = GenPhase::Evasions;
                            return m;
                        }
                    }
                    self.step = Step::Done;
                }
                Step::Done => {
                    self.current_phase = GenPhase::Done;
                    return MOVE_NONE;
                }
            }
        }
    }

    /// Quiescence emits the hash move only when it fits the mode: tactical
    /// for `QCaps`, tactical-or-checking for `QCapsChecks`.
    fn hash_move_fits_mode(&self, board: &Board, m: Move) -> bool {
        if self.in_check {
            return true;
        }
        match self.mode {
            GenMode::Normal => true,
            GenMode::QCaps => m.is_capture() || m.is_promotion(),
            GenMode::QCapsChecks => {
                m.is_capture() || m.is_promotion() || board.is_check(m, self.discovered)
            }
        }
    }

    fn killer_ok(&self, board: &Board, k: Move) -> bool {
        k != MOVE_NONE && k != self.hash_move && !k.is_special() && board.is_legal_move(k)
    }
}

impl Board {
    /// All pseudo-legal captures and promotions, split into winning/equal
    /// (SEE >= 0, plus queen promotions) and losing (SEE < 0, plus
    /// underpromotions), MVV/LVA-scored.
    pub(crate) fn gen_captures(&self, good: &mut ScoredMoveList, bad: &mut ScoredMoveList) {
        good.clear();
        bad.clear();
        let c = self.turn();
        let opp = c.flip();
        let occ = self.occupied();
        let targets = self.occupied_by(opp);
        let last_rank = if c == Color::White { RANK_8 } else { RANK_1 };

        let mut push = |board: &Board, m: Move, score: i16| {
            if m.is_underpromotion() {
                bad.push(m, score);
            } else if m.promotion_piece() == Some(PieceType::Queen) || board.see_sign(m) >= 0 {
                good.push(m, score);
            } else {
                bad.push(m, score - 8192);
            }
        };

        // Pawn captures, en passant and promotions.
        let pawns = self.pieces(c, PieceType::Pawn);
        for from in Squares(pawns) {
            let caps = PAWN_ATTACKS[c.index()][from.index()] & targets;
            for to in Squares(caps) {
                let victim = self.victim_value(to);
                if to.bb() & last_rank != 0 {
                    for pt in [
                        PieceType::Queen,
                        PieceType::Knight,
                        PieceType::Rook,
                        PieceType::Bishop,
                    ] {
                        let m = Move::promotion(from, to, pt, true);
                        push(self, m, victim * 8 + VALUE[PieceType::Queen.index()] / 8);
                    }
                } else {
                    push(self, Move::capture(from, to), victim * 8 - 1);
                }
            }
            // Non-capture promotions ride with the tactical phase.
            if from.bb() & (if c == Color::White { RANK_7 } else { RANK_2 }) != 0 {
                if let Some(to) = from.offset(0, c.forward()) {
                    if occ & to.bb() == 0 {
                        for pt in [
                            PieceType::Queen,
                            PieceType::Knight,
                            PieceType::Rook,
                            PieceType::Bishop,
                        ] {
                            let m = Move::promotion(from, to, pt, false);
                            push(self, m, VALUE[PieceType::Queen.index()] / 8);
                        }
                    }
                }
            }
        }
        if let Some(ep) = self.ep_square() {
            let capturers = PAWN_ATTACKS[opp.index()][ep.index()] & pawns;
            for from in Squares(capturers) {
                push(self, Move::en_passant(from, ep), VALUE[PieceType::Pawn.index()] * 8);
            }
        }

        // Piece captures.
        for pt in [
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Rook,
            PieceType::Queen,
        ] {
            for from in Squares(self.pieces(c, pt)) {
                let att = match pt {
                    PieceType::Knight => KNIGHT_ATTACKS[from.index()],
                    PieceType::Bishop => bishop_attacks(from, occ),
                    PieceType::Rook => rook_attacks(from, occ),
                    _ => queen_attacks(from, occ),
                };
                let attacker_penalty = pt.index() as i16;
                for to in Squares(att & targets) {
                    push(
                        self,
                        Move::capture(from, to),
                        self.victim_value(to) * 8 - attacker_penalty,
                    );
                }
            }
        }

        // King captures.
        let kp = self.king(c);
        for to in Squares(KING_ATTACKS[kp.index()] & targets) {
            push(self, Move::capture(kp, to), self.victim_value(to) * 8 - 5);
        }
    }

    #[inline]
    fn victim_value(&self, sq: Square) -> i16 {
        match self.piece_at(sq) {
            Some((_, pt)) => VALUE[pt.index()],
            None => 0,
        }
    }

    /// Quiet moves (castling and double pushes included), history-scored.
    pub(crate) fn gen_quiets(&self, list: &mut ScoredMoveList, history: &History) {
        list.clear();
        let c = self.turn();
        let occ = self.occupied();
        let empty = !occ;
        let promo_from = if c == Color::White { RANK_7 } else { RANK_2 };

        // Pawn pushes, promotions excluded (they are tactical).
        let pawns = self.pieces(c, PieceType::Pawn) & !promo_from;
        for from in Squares(pawns) {
            let Some(one) = from.offset(0, c.forward()) else {
                continue;
            };
            if empty & one.bb() == 0 {
                continue;
            }
            let m = Move::quiet(from, one);
            list.push(m, history.score(self, m));
            let start_rank = if c == Color::White { 1 } else { 6 };
            if from.rank() == start_rank {
                if let Some(two) = one.offset(0, c.forward()) {
                    if empty & two.bb() != 0 {
                        let m = Move::double_pawn_push(from, two);
                        list.push(m, history.score(self, m));
                    }
                }
            }
        }

        for pt in [
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Rook,
            PieceType::Queen,
        ] {
            for from in Squares(self.pieces(c, pt)) {
                let att = match pt {
                    PieceType::Knight => KNIGHT_ATTACKS[from.index()],
                    PieceType::Bishop => bishop_attacks(from, occ),
                    PieceType::Rook => rook_attacks(from, occ),
                    _ => queen_attacks(from, occ),
                };
                for to in Squares(att & empty) {
                    let m = Move::quiet(from, to);
                    list.push(m, history.score(self, m));
                }
            }
        }

        let kp = self.king(c);
        for to in Squares(KING_ATTACKS[kp.index()] & empty) {
            let m = Move::quiet(kp, to);
            list.push(m, history.score(self, m));
        }

        // Castling, emitted fully legal.
        let rights = self.cast_rights(c);
        for (file, kingside) in [(rights.kingside(), true), (rights.queenside(), false)] {
            let Some(file) = file else { continue };
            let m = Move::castle(kp, Square::new(file, kp.rank()), kingside);
            if self.castle_is_legal(m) {
                list.push(m, 0);
            }
        }
    }

    /// Quiet moves that give check, for the first quiescence ply.
    pub(crate) fn gen_quiet_checks(
        &self,
        list: &mut ScoredMoveList,
        history: &History,
        discovered: Bitboard,
    ) {
        let mut quiets = ScoredMoveList::new();
        self.gen_quiets(&mut quiets, history);
        list.clear();
        for i in 0..quiets.len() {
            let sm = quiets.get(i);
            if self.is_check(sm.mv(), discovered) {
                list.push(sm.mv(), sm.score());
            }
        }
    }

    /// Check evasions: king retreats, captures of a single checker (en
    /// passant included) and interpositions. Captures order ahead of quiets.
    pub(crate) fn gen_evasions(&self, list: &mut ScoredMoveList, history: &History) {
        list.clear();
        debug_assert!(self.in_check());
        let c = self.turn();
        let occ = self.occupied();
        let kp = self.king(c);
        let checkers = self.checkers();
        let last_rank = if c == Color::White { RANK_8 } else { RANK_1 };

        // King moves, captures first by victim value.
        for to in Squares(KING_ATTACKS[kp.index()] & !self.occupied_by(c)) {
            if self.occupied_by(c.flip()) & to.bb() != 0 {
                list.push(Move::capture(kp, to), 2000 + self.victim_value(to));
            } else {
                list.push(Move::quiet(kp, to), history.score(self, Move::quiet(kp, to)));
            }
        }

        if checkers.count_ones() != 1 {
            return;
        }
        let checker = lsb(checkers);

        // Non-king captures of the checker.
        let capturers = self.attackers_to(checker, occ) & self.occupied_by(c) & !kp.bb();
        for from in Squares(capturers) {
            let is_pawn = self.piece_at(from).map(|(_, pt)| pt) == Some(PieceType::Pawn);
            if is_pawn && checker.bb() & last_rank != 0 {
                for pt in [
                    PieceType::Queen,
                    PieceType::Knight,
                    PieceType::Rook,
                    PieceType::Bishop,
                ] {
                    list.push(
                        Move::promotion(from, checker, pt, true),
                        3000 + VALUE[pt.index()] / 8,
                    );
                }
            } else {
                list.push(
                    Move::capture(from, checker),
                    2500 + self.victim_value(checker),
                );
            }
        }

        // En passant capture of a double-pushed checking pawn.
        if let Some(ep) = self.ep_square() {
            let cap_rank = if c == Color::White { 4 } else { 3 };
            if checker == Square::new(ep.file(), cap_rank) {
                let pawns = self.pieces(c, PieceType::Pawn);
                let capturers = PAWN_ATTACKS[c.flip().index()][ep.index()] & pawns;
                for from in Squares(capturers) {
                    list.push(Move::en_passant(from, ep), 2600);
                }
            }
        }

        // Interpositions on the line between king and a sliding checker.
        let blocks = between(kp, checker);
        for to in Squares(blocks) {
            // Knights and sliders that reach the blocking square.
            let mut blockers = KNIGHT_ATTACKS[to.index()] & self.pieces(c, PieceType::Knight);
            blockers |= bishop_attacks(to, occ) & self.diag_sliders(c);
            blockers |= rook_attacks(to, occ) & self.ortho_sliders(c);
            for from in Squares(blockers) {
                list.push(Move::quiet(from, to), history.score(self, Move::quiet(from, to)));
            }
            // Pawn pushes onto the blocking square.
            let back = to.offset(0, -c.forward());
            if let Some(one) = back {
                if self.piece_at(one) == Some((c, PieceType::Pawn)) {
                    if to.bb() & last_rank != 0 {
                        for pt in [
                            PieceType::Queen,
                            PieceType::Knight,
                            PieceType::Rook,
                            PieceType::Bishop,
                        ] {
                            list.push(Move::promotion(one, to, pt, false), 1000);
                        }
                    } else {
                        list.push(
                            Move::quiet(one, to),
                            history.score(self, Move::quiet(one, to)),
                        );
                    }
                } else if occ & one.bb() == 0 {
                    // Double push through an empty square.
                    if let Some(two) = one.offset(0, -c.forward()) {
                        let start_rank = if c == Color::White { 1 } else { 6 };
                        if two.rank() == start_rank
                            && self.piece_at(two) == Some((c, PieceType::Pawn))
                        {
                            list.push(
                                Move::double_pawn_push(two, to),
                                history.score(self, Move::double_pawn_push(two, to)),
                            );
                        }
                    }
                }
            }
        }
    }

    /// All legal moves of the position, in generation order. Convenience for
    /// the textual boundary, perft and tests; the search drives the staged
    /// generator directly.
    #[must_use]
    pub fn legal_moves(&self) -> MoveList {
        let mut mg = MoveGen::new(self, MOVE_NONE, [MOVE_NONE; 2], MOVE_NONE, GenMode::Normal);
        let mut list = MoveList::new();
        loop {
            let m = mg.next(self, &EMPTY_HISTORY);
            if m == MOVE_NONE {
                break;
            }
            list.push(m);
        }
        list
    }
}
