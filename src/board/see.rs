//! Static exchange evaluation.
//!
//! Standard swap-off on the destination square: repeatedly pick the least
//! valuable attacker of the side to move, flip sides, and refresh slider
//! attacks through the shrinking occupancy so batteries x-ray correctly.
//! The gain array collapses with negamax min at the end.

use super::magics::{bishop_attacks, rook_attacks};
use super::state::Board;
use super::types::{lsb, Bitboard, Color, Move, PieceType, Square};

const SEE_VALUE: [i32; 6] = [100, 325, 325, 500, 975, 20000];

impl Board {
    /// Full exchange value of a move on its destination square, from the
    /// mover's perspective. Quiet moves evaluate the cost of landing on a
    /// defended square (0 when safe, negative when the piece hangs).
    #[must_use]
    pub fn see(&self, m: Move) -> i32 {
        let from = m.from();
        let to = m.to();
        let Some((c, attacker)) = self.piece_at(from) else {
            return 0;
        };

        let mut occ = self.occupied();
        let mut gain = [0i32; 34];
        gain[0] = if m.is_en_passant() {
            let cap = Square::new(to.file(), from.rank());
            occ &= !cap.bb();
            SEE_VALUE[PieceType::Pawn.index()]
        } else if let Some((_, victim)) = self.piece_at(to) {
            SEE_VALUE[victim.index()]
        } else {
            0
        };

        occ &= !from.bb();
        let mut attackers = self.attackers_to(to, occ);
        let mut side = c.flip();
        let mut on_square = SEE_VALUE[attacker.index()];
        let mut depth = 0usize;

        loop {
            let my_attackers = attackers & self.occupied_by(side) & occ;
            if my_attackers == 0 {
                break;
            }
            let (next_sq, next_pt) = self.least_valuable(my_attackers, side);
            depth += 1;
            gain[depth] = on_square - gain[depth - 1];
            on_square = SEE_VALUE[next_pt.index()];
            occ &= !next_sq.bb();
            // X-rays: removing the attacker can expose a battery behind it.
            attackers |= bishop_attacks(to, occ) & self.all_diag_sliders();
            attackers |= rook_attacks(to, occ) & self.all_ortho_sliders();
            attackers &= occ;
            side = side.flip();
        }

        while depth > 0 {
            gain[depth - 1] = -((-gain[depth - 1]).max(gain[depth]));
            depth -= 1;
        }
        gain[0]
    }

    /// Sign-only variant with the cheap shortcut: capturing a piece at least
    /// as valuable as the attacker can never lose the exchange.
    #[must_use]
    pub fn see_sign(&self, m: Move) -> i32 {
        if m.is_capture() && !m.is_en_passant() {
            if let (Some((_, attacker)), Some((_, victim))) =
                (self.piece_at(m.from()), self.piece_at(m.to()))
            {
                if SEE_VALUE[victim.index()] >= SEE_VALUE[attacker.index()] {
                    return 1;
                }
            }
        }
        self.see(m).signum()
    }

    /// Least valuable piece of `side` within `set`.
    fn least_valuable(&self, set: Bitboard, side: Color) -> (Square, PieceType) {
        for pt in PieceType::ALL {
            let sub = set & self.pieces(side, pt);
            if sub != 0 {
                return (lsb(sub), pt);
            }
        }
        unreachable!("least_valuable called with an empty attacker set");
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::Board;
    use super::super::types::{lsb, Bitboard, Color, Move, PieceType, Square};
    use super::SEE_VALUE;

    fn sq(s: &str) -> Square {
        Square::parse(s).unwrap()
    }

    /// Independent reference: the classic recursive max(0, gain) swap-off,
    /// structurally different from the gain-array loop above.
    fn swap_ref(board: &Board, to: Square, occ: Bitboard, side: Color, on_square: i32) -> i32 {
        let attackers = board.attackers_to(to, occ) & board.occupied_by(side) & occ;
        if attackers == 0 {
            return 0;
        }
        let (from, pt) = PieceType::ALL
            .iter()
            .find_map(|&pt| {
                let set = attackers & board.pieces(side, pt);
                (set != 0).then(|| (lsb(set), pt))
            })
            .unwrap();
        let gain = on_square
            - swap_ref(
                board,
                to,
                occ & !from.bb(),
                side.flip(),
                SEE_VALUE[pt.index()],
            );
        gain.max(0)
    }

    #[test]
    fn see_sign_matches_recursive_swap_off() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        ];
        for fen in fens {
            let board = Board::from_fen(fen).unwrap();
            for m in board.legal_moves().iter() {
                if !m.is_capture() || m.is_en_passant() || m.is_promotion() {
                    continue;
                }
                let (_, attacker) = board.piece_at(m.from()).unwrap();
                let (_, victim) = board.piece_at(m.to()).unwrap();
                let reference = SEE_VALUE[victim.index()]
                    - swap_ref(
                        &board,
                        m.to(),
                        board.occupied() & !m.from().bb(),
                        board.turn().flip(),
                        SEE_VALUE[attacker.index()],
                    );
                let got = board.see(*m);
                assert_eq!(
                    got.signum(),
                    reference.signum(),
                    "SEE sign mismatch for {m:?} in {fen}: {got} vs {reference}"
                );
            }
        }
    }

    #[test]
    fn winning_capture_is_positive() {
        // Pawn takes an undefended knight.
        let b = Board::from_fen("4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let m = Move::capture(sq("e4"), sq("d5"));
        assert!(b.see(m) > 0);
        assert!(b.see_sign(m) > 0);
    }

    #[test]
    fn losing_capture_is_negative() {
        // Rook takes a pawn defended by a pawn.
        let b = Board::from_fen("4k3/2p5/3p4/8/3R4/8/8/4K3 w - - 0 1").unwrap();
        let m = Move::capture(sq("d4"), sq("d6"));
        assert!(b.see(m) < 0);
        assert!(b.see_sign(m) < 0);
    }

    #[test]
    fn equal_exchange_is_zero() {
        // Rook takes rook, recaptured by rook.
        let b = Board::from_fen("3rk3/8/8/3r4/8/8/3R4/3RK3 w - - 0 1").unwrap();
        let m = Move::capture(sq("d2"), sq("d5"));
        assert_eq!(b.see(m), 0);
    }

    #[test]
    fn xray_battery_counts() {
        // Qxd5 defended once, but the white rook behind the queen recaptures:
        // queen takes pawn, pawn takes queen, rook takes pawn.
        let b = Board::from_fen("4k3/2p5/8/3p4/8/8/3Q4/3RK3 w - - 0 1").unwrap();
        let m = Move::capture(sq("d2"), sq("d5"));
        // Queen for two pawns is still losing.
        assert!(b.see(m) < 0);
    }

    #[test]
    fn quiet_move_to_defended_square_is_negative() {
        let b = Board::from_fen("4k3/8/8/1p6/8/8/3N4/4K3 w - - 0 1").unwrap();
        // Nd2-c4?? walks into b5xc4.
        let m = Move::quiet(sq("d2"), sq("c4"));
        assert!(b.see(m) < 0);
    }
}
