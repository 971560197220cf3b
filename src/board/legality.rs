//! Attack queries, pin masks and move legality.
//!
//! Everything here works without making the move: check detection uses a
//! precomputed discovered-piece mask, and hashmove/killer validation rejects
//! stale moves from other positions without touching board state.

use super::attack_tables::{
    between, line, DIAG_RAYS, KING_ATTACKS, KNIGHT_ATTACKS, ORTHO_RAYS, PAWN_ATTACKS,
};
use super::magics::{bishop_attacks, queen_attacks, rook_attacks};
use super::state::Board;
use super::types::{lsb, Bitboard, Color, Move, PieceType, Square, RANK_1, RANK_8};

impl Board {
    /// Is `sq` attacked by any piece of `by` under the given occupancy?
    /// Captured pieces must be masked out of `occ` by the caller; the piece
    /// sets themselves are read as-is.
    #[must_use]
    pub fn attacked_by(&self, by: Color, sq: Square, occ: Bitboard) -> bool {
        if PAWN_ATTACKS[by.flip().index()][sq.index()] & self.pieces(by, PieceType::Pawn) != 0 {
            return true;
        }
        if KNIGHT_ATTACKS[sq.index()] & self.pieces(by, PieceType::Knight) != 0 {
            return true;
        }
        if KING_ATTACKS[sq.index()] & self.king_bb(by) != 0 {
            return true;
        }
        // Full-board ray pre-test before touching the magic tables.
        let diag = self.diag_sliders(by);
        if DIAG_RAYS[sq.index()] & diag != 0 && bishop_attacks(sq, occ) & diag != 0 {
            return true;
        }
        let ortho = self.ortho_sliders(by);
        ORTHO_RAYS[sq.index()] & ortho != 0 && rook_attacks(sq, occ) & ortho != 0
    }

    /// All attackers of both colors to `sq` under `occ`; the SEE driver.
    #[must_use]
    pub fn attackers_to(&self, sq: Square, occ: Bitboard) -> Bitboard {
        let knights =
            self.pieces(Color::White, PieceType::Knight) | self.pieces(Color::Black, PieceType::Knight);
        let mut mask = KNIGHT_ATTACKS[sq.index()] & knights;
        mask |= PAWN_ATTACKS[Color::Black.index()][sq.index()]
            & self.pieces(Color::White, PieceType::Pawn);
        mask |= PAWN_ATTACKS[Color::White.index()][sq.index()]
            & self.pieces(Color::Black, PieceType::Pawn);
        mask |= bishop_attacks(sq, occ) & self.all_diag_sliders();
        mask |= rook_attacks(sq, occ) & self.all_ortho_sliders();
        mask |= KING_ATTACKS[sq.index()]
            & (self.king_bb(Color::White) | self.king_bb(Color::Black));
        mask & occ
    }

    /// Opponent pieces currently checking the side to move's king.
    #[must_use]
    pub fn checkers(&self) -> Bitboard {
        let c = self.turn();
        let kp = self.king(c);
        let opp = c.flip();
        let occ = self.occupied();
        let mut res = PAWN_ATTACKS[c.index()][kp.index()] & self.pieces(opp, PieceType::Pawn);
        res |= KNIGHT_ATTACKS[kp.index()] & self.pieces(opp, PieceType::Knight);
        res |= bishop_attacks(kp, occ) & self.diag_sliders(opp);
        res |= rook_attacks(kp, occ) & self.ortho_sliders(opp);
        res
    }

    /// Pieces of `pin_color` that stand between `target` and a slider of
    /// `attack_color` which would hit `target` were they removed. With
    /// `no_queens` the pinned candidates exclude queens (used for discovered
    /// checkers, where a queen never uncovers a useful line of its own side).
    pub(crate) fn pin_mask(
        &self,
        pin_color: Color,
        attack_color: Color,
        target: Square,
        no_queens: bool,
    ) -> Bitboard {
        let occ = self.occupied();
        let mut candidates = self.occupied_by(pin_color);
        if no_queens {
            candidates &= !self.pieces(attack_color, PieceType::Queen);
        }
        let mut res = 0;

        for (diagonal, sliders) in [
            (true, self.diag_sliders(attack_color)),
            (false, self.ortho_sliders(attack_color)),
        ] {
            let rays = if diagonal {
                DIAG_RAYS[target.index()]
            } else {
                ORTHO_RAYS[target.index()]
            };
            if sliders & rays == 0 {
                continue;
            }
            let direct = if diagonal {
                bishop_attacks(target, occ)
            } else {
                rook_attacks(target, occ)
            };
            let blockers = direct & candidates;
            if blockers == 0 {
                continue;
            }
            let through = if diagonal {
                bishop_attacks(target, occ & !blockers)
            } else {
                rook_attacks(target, occ & !blockers)
            };
            let mut pinners = through & sliders & !direct;
            while pinners != 0 {
                let p = super::types::pop_lsb(&mut pinners);
                res |= between(target, p) & blockers;
            }
        }
        res
    }

    /// Own pieces pinned against the own king.
    #[must_use]
    pub fn pins(&self) -> Bitboard {
        let c = self.turn();
        self.pin_mask(c, c.flip(), self.king(c), false)
    }

    /// Own pieces whose move would uncover check on the opponent king.
    #[must_use]
    pub fn discovered(&self) -> Bitboard {
        let c = self.turn();
        self.pin_mask(c, c, self.king(c.flip()), true)
    }

    /// Do any sliders of `c` attack `sq` under the given occupancy?
    #[inline]
    fn slider_checks(&self, c: Color, sq: Square, occ: Bitboard) -> bool {
        let diag = self.diag_sliders(c);
        if DIAG_RAYS[sq.index()] & diag != 0 && bishop_attacks(sq, occ) & diag != 0 {
            return true;
        }
        let ortho = self.ortho_sliders(c);
        ORTHO_RAYS[sq.index()] & ortho != 0 && rook_attacks(sq, occ) & ortho != 0
    }

    /// Would this move give check, decided without making it? `discovered` is
    /// the precomputed discoverer mask for the side to move.
    #[must_use]
    pub fn is_check(&self, m: Move, discovered: Bitboard) -> bool {
        let c = self.turn();
        let okp = self.king(c.flip());
        let from = m.from();
        let to = m.to();
        let occ = self.occupied();

        if m.is_castling() {
            let (kt, rt) = self.castle_targets(m);
            let occ2 = (occ & !from.bb() & !to.bb()) | kt.bb() | rt.bb();
            if rook_attacks(rt, occ2) & okp.bb() != 0 {
                return true;
            }
            // A slider uncovered by the king or the castling rook.
            let ortho = self.ortho_sliders(c) & !to.bb();
            if ortho != 0 && rook_attacks(okp, occ2) & ortho != 0 {
                return true;
            }
            let diag = self.diag_sliders(c);
            return diag != 0 && bishop_attacks(okp, occ2) & diag != 0;
        }

        if m.is_en_passant() {
            let cap = Square::new(to.file(), from.rank());
            let occ2 = (occ & !from.bb() & !cap.bb()) | to.bb();
            if PAWN_ATTACKS[c.index()][to.index()] & okp.bb() != 0 {
                return true;
            }
            // Removing either pawn can uncover a slider.
            return self.slider_checks(c, okp, occ2);
        }

        let occ2 = (occ & !from.bb()) | to.bb();
        let moved = m
            .promotion_piece()
            .or_else(|| self.piece_on(from).piece_type());
        let direct = match moved {
            Some(PieceType::Pawn) => PAWN_ATTACKS[c.index()][to.index()] & okp.bb() != 0,
            Some(PieceType::Knight) => KNIGHT_ATTACKS[to.index()] & okp.bb() != 0,
            Some(PieceType::Bishop) => bishop_attacks(to, occ2) & okp.bb() != 0,
            Some(PieceType::Rook) => rook_attacks(to, occ2) & okp.bb() != 0,
            Some(PieceType::Queen) => queen_attacks(to, occ2) & okp.bb() != 0,
            _ => false,
        };
        if direct {
            return true;
        }
        // Discovered check: the mover leaves the line toward the enemy king.
        discovered & from.bb() != 0 && line(from, okp) & to.bb() == 0
    }

    /// Is a generated pseudo-legal non-castling move actually legal?
    /// Castling moves are emitted fully legal by the generator and must not
    /// be passed here.
    pub(crate) fn pseudo_is_legal(&self, m: Move, pins: Bitboard) -> bool {
        debug_assert!(!m.is_castling());
        let c = self.turn();
        let kp = self.king(c);
        let from = m.from();
        let to = m.to();
        let occ = self.occupied();

        if m.is_en_passant() {
            // Both pawns leave their squares; simulate exactly.
            let cap = Square::new(to.file(), from.rank());
            let occ2 = (occ & !from.bb() & !cap.bb()) | to.bb();
            let opp = c.flip();
            if PAWN_ATTACKS[c.index()][kp.index()]
                & self.pieces(opp, PieceType::Pawn)
                & !cap.bb()
                != 0
            {
                return false;
            }
            if KNIGHT_ATTACKS[kp.index()] & self.pieces(opp, PieceType::Knight) != 0 {
                return false;
            }
            return !self.slider_checks(opp, kp, occ2);
        }

        if from == kp {
            // King move: destination must be safe with the king itself lifted
            // and the captured piece (if any) out of the way.
            let occ2 = occ & !from.bb();
            return !self.attacked_by_after_capture(c.flip(), to, occ2, m.is_capture());
        }

        if pins & from.bb() != 0 && line(kp, from) & to.bb() == 0 {
            return false;
        }

        if self.in_check() {
            // Non-king moves must block or capture the single checker.
            return self.evasion_mask() & to.bb() != 0;
        }
        true
    }

    /// Like `attacked_by`, with an optional captured piece on `sq` excluded
    /// from the attacker sets.
    fn attacked_by_after_capture(
        &self,
        by: Color,
        sq: Square,
        occ: Bitboard,
        capture: bool,
    ) -> bool {
        let strip = if capture { sq.bb() } else { 0 };
        if PAWN_ATTACKS[by.flip().index()][sq.index()]
            & self.pieces(by, PieceType::Pawn)
            & !strip
            != 0
        {
            return true;
        }
        if KNIGHT_ATTACKS[sq.index()] & self.pieces(by, PieceType::Knight) & !strip != 0 {
            return true;
        }
        if KING_ATTACKS[sq.index()] & self.king_bb(by) != 0 {
            return true;
        }
        let diag = self.diag_sliders(by) & !strip;
        if diag != 0 && bishop_attacks(sq, occ) & diag != 0 {
            return true;
        }
        let ortho = self.ortho_sliders(by) & !strip;
        ortho != 0 && rook_attacks(sq, occ) & ortho != 0
    }

    /// Castling destination squares (king, rook) for a castle move.
    pub(crate) fn castle_targets(&self, m: Move) -> (Square, Square) {
        let rank = m.from().rank();
        if m.is_kingside_castle() {
            (Square::new(6, rank), Square::new(5, rank))
        } else {
            (Square::new(2, rank), Square::new(3, rank))
        }
    }

    /// Full castling legality: rights, occupancy of both paths (skipping the
    /// king and the castling rook themselves, which matters in FRC), and no
    /// attacked square anywhere on the king's path including both ends.
    pub(crate) fn castle_is_legal(&self, m: Move) -> bool {
        let c = self.turn();
        if self.in_check() {
            return false;
        }
        let rights = self.cast_rights(c);
        let rook_file = if m.is_kingside_castle() {
            rights.kingside()
        } else {
            rights.queenside()
        };
        let Some(rook_file) = rook_file else {
            return false;
        };
        let kf = self.king(c);
        let rf = Square::new(rook_file, kf.rank());
        if m.from() != kf || m.to() != rf {
            return false;
        }
        if self.piece_at(rf) != Some((c, PieceType::Rook)) {
            return false;
        }
        let (kt, rt) = self.castle_targets(m);
        let movers = kf.bb() | rf.bb();
        let occ = self.occupied() & !movers;
        // Both paths must be empty apart from the two movers.
        let king_path = between(kf, kt) | kt.bb();
        let rook_path = between(rf, rt) | rt.bb();
        if (king_path | rook_path) & occ != 0 {
            return false;
        }
        // The king may not pass through or land on an attacked square.
        let opp = c.flip();
        let occ_no_king = self.occupied() & !kf.bb();
        let mut path = king_path;
        while path != 0 {
            let sq = super::types::pop_lsb(&mut path);
            if self.attacked_by(opp, sq, occ_no_king) {
                return false;
            }
        }
        true
    }

    /// Validate a move that may come from the TT, the killer slots or an
    /// old PV: it must be fully legal in the current position. Never makes
    /// the move and never panics on garbage encodings.
    #[must_use]
    pub fn is_legal_move(&self, m: Move) -> bool {
        use super::types::{MOVE_NONE, RANK_4, RANK_5};

        if m == MOVE_NONE || m.is_null() {
            return false;
        }
        let c = self.turn();
        let from = m.from();
        let to = m.to();
        let Some((pc, pt)) = self.piece_at(from) else {
            return false;
        };
        if pc != c {
            return false;
        }

        if m.is_castling() {
            return pt == PieceType::King && self.castle_is_legal(m);
        }

        let occ = self.occupied();
        let target = self.piece_at(to);
        if m.is_capture() && !m.is_en_passant() {
            match target {
                Some((tc, tt)) if tc != c && tt != PieceType::King => {}
                _ => return false,
            }
        } else if !m.is_en_passant() && target.is_some() {
            return false;
        }

        // Geometry per piece type and move kind.
        let geometry_ok = match pt {
            PieceType::Pawn => {
                let fwd = c.forward();
                let last_rank = if c == Color::White { RANK_8 } else { RANK_1 };
                if m.is_promotion() != (to.bb() & last_rank != 0) {
                    return false;
                }
                if m.is_en_passant() {
                    self.ep_square() == Some(to)
                        && PAWN_ATTACKS[c.index()][from.index()] & to.bb() != 0
                } else if m.is_capture() {
                    PAWN_ATTACKS[c.index()][from.index()] & to.bb() != 0
                } else if m.is_double_pawn_push() {
                    let mid = from.offset(0, fwd);
                    let start_ok = to.bb() & (if c == Color::White { RANK_4 } else { RANK_5 }) != 0;
                    match mid {
                        Some(mid) => {
                            start_ok
                                && mid.offset(0, fwd) == Some(to)
                                && occ & (mid.bb() | to.bb()) == 0
                        }
                        None => false,
                    }
                } else {
                    from.offset(0, fwd) == Some(to)
                }
            }
            PieceType::Knight => {
                !m.is_promotion()
                    && !m.is_double_pawn_push()
                    && KNIGHT_ATTACKS[from.index()] & to.bb() != 0
            }
            PieceType::Bishop => !m.is_promotion() && bishop_attacks(from, occ) & to.bb() != 0,
            PieceType::Rook => !m.is_promotion() && rook_attacks(from, occ) & to.bb() != 0,
            PieceType::Queen => !m.is_promotion() && queen_attacks(from, occ) & to.bb() != 0,
            PieceType::King => {
                !m.is_promotion()
                    && !m.is_double_pawn_push()
                    && KING_ATTACKS[from.index()] & to.bb() != 0
            }
        };
        if !geometry_ok {
            return false;
        }
        if pt != PieceType::Pawn && (m.is_en_passant() || m.is_double_pawn_push()) {
            return false;
        }

        // Evasion-aware king safety through the same path movegen uses.
        if self.in_check() {
            let checkers = self.checkers();
            if from != self.king(c) {
                // Double check admits king moves only; single check needs a
                // block or capture of the checker.
                if checkers.count_ones() > 1 {
                    return false;
                }
                let ok = if m.is_en_passant() {
                    let cap = Square::new(to.file(), from.rank());
                    checkers == cap.bb() || self.evasion_mask_for(checkers) & to.bb() != 0
                } else {
                    self.evasion_mask_for(checkers) & to.bb() != 0
                };
                if !ok {
                    return false;
                }
            }
        }
        self.pseudo_is_legal(m, self.pins())
    }

    /// Evasion targets for a given checker set (block squares plus the
    /// checker itself); used when the cached mask cannot be trusted.
    fn evasion_mask_for(&self, checkers: Bitboard) -> Bitboard {
        if checkers == 0 || checkers.count_ones() > 1 {
            return 0;
        }
        let checker = lsb(checkers);
        checkers | between(self.king(self.turn()), checker)
    }
}
