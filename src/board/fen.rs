//! FEN parsing and emission, FRC start positions, UCI move notation.
//!
//! The castling field accepts both conventional `KQkq` letters and
//! Shredder-FEN rook files (`HAha`). The en passant field is emitted only
//! when a pseudo-legal en passant capture actually exists, which is also the
//! only state the board ever stores.

use super::error::{FenError, MoveParseError};
use super::state::Board;
use super::types::{Color, Move, PieceType, Square};

impl Board {
    /// Parse a six-field FEN. Missing counters default to 0/1, which covers
    /// the four-field EPD-style strings test suites like to use.
    pub fn from_fen(fen: &str) -> Result<Board, FenError> {
        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or(FenError::MissingField("piece placement"))?;
        let stm = fields.next().ok_or(FenError::MissingField("side to move"))?;
        let castling = fields.next().unwrap_or("-");
        let ep = fields.next().unwrap_or("-");
        let halfmove = fields.next().unwrap_or("0");
        let fullmove = fields.next().unwrap_or("1");

        let mut board = Board::empty();
        let mut king_count = [0u8; 2];

        let mut rank: i8 = 7;
        let mut file: i8 = 0;
        for ch in placement.chars() {
            match ch {
                '/' => {
                    if file != 8 || rank == 0 {
                        return Err(FenError::BadPiecePlacement);
                    }
                    rank -= 1;
                    file = 0;
                }
                '1'..='8' => {
                    file += ch as i8 - b'0' as i8;
                    if file > 8 {
                        return Err(FenError::BadPiecePlacement);
                    }
                }
                _ => {
                    let pt = PieceType::from_char(ch).ok_or(FenError::BadPiecePlacement)?;
                    if file >= 8 {
                        return Err(FenError::BadPiecePlacement);
                    }
                    let c = if ch.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    if pt == PieceType::King {
                        king_count[c.index()] += 1;
                        if king_count[c.index()] > 1 {
                            return Err(FenError::TooManyKings);
                        }
                    }
                    board.put_piece(c, pt, Square::new(file as u8, rank as u8));
                    file += 1;
                }
            }
        }
        if rank != 0 || file != 8 {
            return Err(FenError::BadPiecePlacement);
        }
        if king_count != [1, 1] {
            return Err(FenError::MissingKing);
        }

        board.turn = match stm {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(FenError::BadSideToMove),
        };

        if castling != "-" {
            for ch in castling.chars() {
                board.apply_castling_char(ch)?;
            }
        }

        if ep != "-" {
            let sq = Square::parse(ep).ok_or(FenError::BadEnPassant)?;
            let expected_rank = if board.turn == Color::White { 5 } else { 2 };
            if sq.rank() != expected_rank {
                return Err(FenError::BadEnPassant);
            }
            board.ep = sq;
        }

        board.fifty = halfmove.parse().map_err(|_| FenError::BadCounter)?;
        board.move_no = fullmove.parse().map_err(|_| FenError::BadCounter)?;
        if board.move_no == 0 {
            board.move_no = 1;
        }

        board.validate_ep();
        board.finalize_setup();
        debug_assert!(board.is_valid());
        Ok(board)
    }

    fn apply_castling_char(&mut self, ch: char) -> Result<(), FenError> {
        let (c, upper) = if ch.is_ascii_uppercase() {
            (Color::White, ch)
        } else {
            (Color::Black, ch.to_ascii_uppercase())
        };
        let home_rank = if c == Color::White { 0u8 } else { 7 };
        let king_file = self.king(c).file();
        if self.king(c).rank() != home_rank {
            return Err(FenError::BadCastling);
        }
        match upper {
            'K' => {
                // Conventional letter: the outermost rook on the king's right.
                let file = (king_file + 1..8)
                    .rev()
                    .find(|&f| self.rook_on(c, home_rank, f))
                    .ok_or(FenError::BadCastling)?;
                self.cast_rights[c.index()].set_kingside(Some(file));
            }
            'Q' => {
                let file = (0..king_file)
                    .find(|&f| self.rook_on(c, home_rank, f))
                    .ok_or(FenError::BadCastling)?;
                self.cast_rights[c.index()].set_queenside(Some(file));
            }
            'A'..='H' => {
                // Shredder-FEN rook file.
                let file = upper as u8 - b'A';
                if !self.rook_on(c, home_rank, file) {
                    return Err(FenError::BadCastling);
                }
                if file > king_file {
                    self.cast_rights[c.index()].set_kingside(Some(file));
                } else {
                    self.cast_rights[c.index()].set_queenside(Some(file));
                }
                self.frc = true;
            }
            _ => return Err(FenError::BadCastling),
        }
        Ok(())
    }

    fn rook_on(&self, c: Color, rank: u8, file: u8) -> bool {
        self.piece_at(Square::new(file, rank)) == Some((c, PieceType::Rook))
    }

    /// Emit the position as a six-field FEN.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut out = String::with_capacity(90);
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                match self.piece_at(Square::new(file, rank)) {
                    None => empty += 1,
                    Some((c, pt)) => {
                        if empty > 0 {
                            out.push((b'0' + empty) as char);
                            empty = 0;
                        }
                        let ch = pt.to_char();
                        out.push(if c == Color::White {
                            ch.to_ascii_uppercase()
                        } else {
                            ch
                        });
                    }
                }
            }
            if empty > 0 {
                out.push((b'0' + empty) as char);
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(if self.turn == Color::White { 'w' } else { 'b' });
        out.push(' ');

        let mut any_rights = false;
        for c in [Color::White, Color::Black] {
            let cr = self.cast_rights(c);
            for (file, kingside) in [(cr.kingside(), true), (cr.queenside(), false)] {
                let Some(file) = file else { continue };
                any_rights = true;
                let ch = if self.frc {
                    (b'A' + file) as char
                } else if kingside {
                    'K'
                } else {
                    'Q'
                };
                out.push(if c == Color::White {
                    ch
                } else {
                    ch.to_ascii_lowercase()
                });
            }
        }
        if !any_rights {
            out.push('-');
        }

        out.push(' ');
        match self.ep_square() {
            Some(sq) => out.push_str(&sq.to_string()),
            None => out.push('-'),
        }
        out.push_str(&format!(" {} {}", self.fifty, self.move_no));
        out
    }

    /// Set up one of the 960 Fischer-Random start positions (Scharnagl
    /// numbering; index 518 is the standard array).
    pub fn reset_frc(&mut self, index: usize) {
        debug_assert!(index < 960);
        let mut n = index % 960;

        let mut files: [Option<PieceType>; 8] = [None; 8];
        // Light-squared bishop (b, d, f, h), then dark-squared (a, c, e, g).
        files[1 + 2 * (n % 4)] = Some(PieceType::Bishop);
        n /= 4;
        files[2 * (n % 4)] = Some(PieceType::Bishop);
        n /= 4;

        fn free_files(files: &[Option<PieceType>; 8]) -> Vec<usize> {
            files
                .iter()
                .enumerate()
                .filter_map(|(f, slot)| slot.is_none().then_some(f))
                .collect()
        }

        let queen_spot = free_files(&files)[n % 6];
        files[queen_spot] = Some(PieceType::Queen);
        n /= 6;

        // The ten knight placements over the five remaining squares.
        const N5N: [(usize, usize); 10] = [
            (0, 1),
            (0, 2),
            (0, 3),
            (0, 4),
            (1, 2),
            (1, 3),
            (1, 4),
            (2, 3),
            (2, 4),
            (3, 4),
        ];
        let spots = free_files(&files);
        let (i, j) = N5N[n % 10];
        files[spots[i]] = Some(PieceType::Knight);
        files[spots[j]] = Some(PieceType::Knight);

        // Remaining three squares, left to right: rook, king, rook.
        let rest = free_files(&files);
        files[rest[0]] = Some(PieceType::Rook);
        files[rest[1]] = Some(PieceType::King);
        files[rest[2]] = Some(PieceType::Rook);

        *self = Board::empty();
        self.frc = true;
        for (file, slot) in files.iter().enumerate() {
            let pt = slot.expect("every back-rank file is filled");
            self.put_piece(Color::White, pt, Square::new(file as u8, 0));
            self.put_piece(Color::Black, pt, Square::new(file as u8, 7));
            self.put_piece(Color::White, PieceType::Pawn, Square::new(file as u8, 1));
            self.put_piece(Color::Black, PieceType::Pawn, Square::new(file as u8, 6));
        }
        let rook_files = [rest[0] as u8, rest[2] as u8];
        for c in [Color::White, Color::Black] {
            self.cast_rights[c.index()].set_queenside(Some(rook_files[0]));
            self.cast_rights[c.index()].set_kingside(Some(rook_files[1]));
        }
        self.finalize_setup();
        debug_assert!(self.is_valid());
    }

    /// Move to UCI notation. FRC castling prints king-takes-rook; standard
    /// chess prints the conventional king-to-g1/c1 form.
    #[must_use]
    pub fn to_uci(&self, m: Move) -> String {
        if m.is_castling() && !self.frc {
            let (kt, _) = self.castle_targets(m);
            return format!("{}{}", m.from(), kt);
        }
        let mut s = format!("{}{}", m.from(), m.to());
        if let Some(pt) = m.promotion_piece() {
            s.push(pt.to_char());
        }
        s
    }

    /// Parse a UCI move against the current position. Accepts both castling
    /// notations regardless of the FRC flag.
    pub fn from_uci(&self, s: &str) -> Result<Move, MoveParseError> {
        let bytes = s.as_bytes();
        if bytes.len() < 4 || bytes.len() > 5 {
            return Err(MoveParseError::BadFormat);
        }
        let from = Square::parse(&s[0..2]).ok_or(MoveParseError::BadFormat)?;
        let to = Square::parse(&s[2..4]).ok_or(MoveParseError::BadFormat)?;
        let promo = if bytes.len() == 5 {
            let pt = PieceType::from_char(bytes[4] as char).ok_or(MoveParseError::BadFormat)?;
            if pt == PieceType::King || pt == PieceType::Pawn {
                return Err(MoveParseError::BadFormat);
            }
            Some(pt)
        } else {
            None
        };

        for m in self.legal_moves().iter() {
            if m.promotion_piece() != promo {
                continue;
            }
            if m.is_castling() {
                let (kt, _) = self.castle_targets(*m);
                if m.from() == from && (m.to() == to || (kt == to && !self.frc)) {
                    return Ok(*m);
                }
            } else if m.from() == from && m.to() == to {
                return Ok(*m);
            }
        }
        Err(MoveParseError::Illegal)
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::{Board, START_FEN};
    use super::super::types::Color;

    #[test]
    fn start_fen_round_trips() {
        let board = Board::new();
        assert_eq!(board.to_fen(), START_FEN);
    }

    #[test]
    fn kiwipete_round_trips() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let board = Board::from_fen(fen).unwrap();
        assert_eq!(board.to_fen(), fen);
    }

    #[test]
    fn rejects_malformed_fens() {
        assert!(Board::from_fen("").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8/9 w - - 0 1").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());
    }

    #[test]
    fn ep_square_dropped_when_no_capturer() {
        // Black just played e7e5 but no white pawn can take en passant.
        let board =
            Board::from_fen("rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq e6 0 2").unwrap();
        assert_eq!(board.ep_square(), None);
        // With a white pawn on d5 the ep square stays.
        let board =
            Board::from_fen("rnbqkbnr/pppp1ppp/8/3Pp3/8/8/PPP1PPPP/RNBQKBNR w KQkq e6 0 3").unwrap();
        assert!(board.ep_square().is_some());
    }

    #[test]
    fn shredder_castling_files() {
        let board =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w HAha - 0 1").unwrap();
        assert_eq!(board.cast_rights(Color::White).kingside(), Some(7));
        assert_eq!(board.cast_rights(Color::White).queenside(), Some(0));
        assert!(board.fischer_random());
    }

    #[test]
    fn frc_518_is_standard_array() {
        let mut board = Board::new();
        board.reset_frc(518);
        let fen = board.to_fen();
        assert!(
            fen.starts_with("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w"),
            "frc 518 gave {fen}"
        );
    }

    #[test]
    fn frc_positions_are_valid_and_distinct() {
        let mut seen = std::collections::HashSet::new();
        for idx in 0..960 {
            let mut board = Board::new();
            board.reset_frc(idx);
            assert!(board.is_valid(), "frc index {idx}");
            let placement = board.to_fen().split(' ').next().unwrap().to_string();
            seen.insert(placement);
        }
        assert_eq!(seen.len(), 960);
    }
}
