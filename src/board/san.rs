//! Standard algebraic notation.

use super::error::SanError;
use super::state::Board;
use super::types::{Move, PieceType, Square, MOVE_NONE};

impl Board {
    /// Move to SAN, with `+`/`#` suffix. The move must be legal.
    #[must_use]
    pub fn to_san(&self, m: Move) -> String {
        let mut out = String::new();

        if m.is_castling() {
            out.push_str(if m.is_kingside_castle() { "O-O" } else { "O-O-O" });
        } else {
            let (_, pt) = self
                .piece_at(m.from())
                .expect("SAN of a move with no mover");
            if pt == PieceType::Pawn {
                if m.is_capture() {
                    out.push((b'a' + m.from().file()) as char);
                }
            } else {
                out.push(pt.to_char().to_ascii_uppercase());
                out.push_str(&self.san_disambiguation(m, pt));
            }
            if m.is_capture() {
                out.push('x');
            }
            out.push_str(&m.to().to_string());
            if let Some(promo) = m.promotion_piece() {
                out.push('=');
                out.push(promo.to_char().to_ascii_uppercase());
            }
        }

        // Check or mate suffix, probed on a scratch copy.
        let mut scratch = self.clone();
        let mut undo = super::make_unmake::UndoInfo::new();
        let gives_check = scratch.is_check(m, scratch.discovered());
        scratch.make_move(m, &mut undo, gives_check);
        if gives_check {
            out.push(if scratch.legal_moves().is_empty() {
                '#'
            } else {
                '+'
            });
        }
        out
    }

    fn san_disambiguation(&self, m: Move, pt: PieceType) -> String {
        let mut same_file = false;
        let mut same_rank = false;
        let mut any = false;
        for other in self.legal_moves().iter() {
            if *other == m || other.to() != m.to() || other.is_castling() {
                continue;
            }
            if self.piece_at(other.from()).map(|(_, p)| p) != Some(pt) {
                continue;
            }
            any = true;
            if other.from().file() == m.from().file() {
                same_file = true;
            }
            if other.from().rank() == m.from().rank() {
                same_rank = true;
            }
        }
        if !any {
            return String::new();
        }
        let mut out = String::new();
        if !same_file {
            out.push((b'a' + m.from().file()) as char);
        } else if !same_rank {
            out.push((b'1' + m.from().rank()) as char);
        } else {
            out.push_str(&m.from().to_string());
        }
        out
    }

    /// Parse a SAN move against the current position; legality is implied.
    pub fn from_san(&self, s: &str) -> Result<Move, SanError> {
        let body: String = s
            .chars()
            .filter(|c| !matches!(c, '+' | '#' | '!' | '?'))
            .collect();
        if body.is_empty() {
            return Err(SanError::BadFormat);
        }

        if body == "O-O" || body == "0-0" {
            return self.find_castle(true);
        }
        if body == "O-O-O" || body == "0-0-0" {
            return self.find_castle(false);
        }

        let bytes = body.as_bytes();
        let mut i = 0;
        let piece = match bytes[0] {
            b'N' | b'B' | b'R' | b'Q' | b'K' => {
                i += 1;
                PieceType::from_char(bytes[0] as char).ok_or(SanError::BadFormat)?
            }
            _ => PieceType::Pawn,
        };

        // Optional promotion suffix, parsed from the right.
        let mut end = bytes.len();
        let mut promo = None;
        if end >= 2 && bytes[end - 2] == b'=' {
            promo = Some(PieceType::from_char(bytes[end - 1] as char).ok_or(SanError::BadFormat)?);
            end -= 2;
        }

        if end < i + 2 {
            return Err(SanError::BadFormat);
        }
        let dest = Square::parse(
            std::str::from_utf8(&bytes[end - 2..end]).map_err(|_| SanError::BadFormat)?,
        )
        .ok_or(SanError::BadFormat)?;
        end -= 2;

        let mut from_file = None;
        let mut from_rank = None;
        let mut capture = false;
        for &b in &bytes[i..end] {
            match b {
                b'x' => capture = true,
                b'a'..=b'h' => from_file = Some(b - b'a'),
                b'1'..=b'8' => from_rank = Some(b - b'1'),
                _ => return Err(SanError::BadFormat),
            }
        }

        let mut found = MOVE_NONE;
        for m in self.legal_moves().iter() {
            if m.is_castling() || m.to() != dest {
                continue;
            }
            if self.piece_at(m.from()).map(|(_, p)| p) != Some(piece) {
                continue;
            }
            if m.promotion_piece() != promo {
                continue;
            }
            if capture && !m.is_capture() {
                continue;
            }
            if let Some(f) = from_file {
                if m.from().file() != f {
                    continue;
                }
            }
            if let Some(r) = from_rank {
                if m.from().rank() != r {
                    continue;
                }
            }
            if found != MOVE_NONE {
                return Err(SanError::Ambiguous);
            }
            found = *m;
        }
        if found == MOVE_NONE {
            return Err(SanError::Illegal);
        }
        Ok(found)
    }

    fn find_castle(&self, kingside: bool) -> Result<Move, SanError> {
        for m in self.legal_moves().iter() {
            if m.is_castling() && m.is_kingside_castle() == kingside {
                return Ok(*m);
            }
        }
        Err(SanError::Illegal)
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::Board;

    #[test]
    fn san_round_trips_common_moves() {
        let board = Board::new();
        for san in ["e4", "Nf3", "d3", "h4"] {
            let m = board.from_san(san).unwrap();
            assert_eq!(board.to_san(m), san, "round trip of {san}");
        }
    }

    #[test]
    fn san_disambiguates_knights() {
        // Two knights can reach d2.
        let board = Board::from_fen("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1").unwrap();
        let m = board.from_san("Nbd2").unwrap();
        assert_eq!(board.to_san(m), "Nbd2");
        assert!(board.from_san("Nd2").is_err());
    }

    #[test]
    fn san_castling_and_mate_suffix() {
        let board =
            Board::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let oo = board.from_san("O-O").unwrap();
        assert!(oo.is_castling() && oo.is_kingside_castle());
        // Back-rank mate gets the '#' suffix.
        let mate = Board::from_fen("6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let m = mate.from_san("Ra8").unwrap();
        assert_eq!(mate.to_san(m), "Ra8#");
    }

    #[test]
    fn san_promotion() {
        let board = Board::from_fen("8/P6k/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let m = board.from_san("a8=Q").unwrap();
        assert!(m.promotion_piece().is_some());
        assert_eq!(board.to_san(m), "a8=Q");
        let check = Board::from_fen("7k/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let m = check.from_san("a8=Q").unwrap();
        assert_eq!(check.to_san(m), "a8=Q+");
    }
}
