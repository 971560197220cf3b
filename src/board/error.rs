//! Parser error types for the textual boundary.

use std::error::Error;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FenError {
    MissingField(&'static str),
    BadPiecePlacement,
    BadSideToMove,
    BadCastling,
    BadEnPassant,
    BadCounter,
    MissingKing,
    TooManyKings,
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::MissingField(name) => write!(f, "FEN is missing the {name} field"),
            FenError::BadPiecePlacement => write!(f, "invalid piece placement field"),
            FenError::BadSideToMove => write!(f, "side to move must be 'w' or 'b'"),
            FenError::BadCastling => write!(f, "invalid castling field"),
            FenError::BadEnPassant => write!(f, "invalid en passant field"),
            FenError::BadCounter => write!(f, "invalid halfmove or fullmove counter"),
            FenError::MissingKing => write!(f, "each side needs exactly one king"),
            FenError::TooManyKings => write!(f, "each side needs exactly one king"),
        }
    }
}

impl Error for FenError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveParseError {
    BadFormat,
    Illegal,
}

impl fmt::Display for MoveParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveParseError::BadFormat => write!(f, "malformed move string"),
            MoveParseError::Illegal => write!(f, "move is not legal in this position"),
        }
    }
}

impl Error for MoveParseError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SanError {
    BadFormat,
    Illegal,
    Ambiguous,
}

impl fmt::Display for SanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanError::BadFormat => write!(f, "malformed SAN string"),
            SanError::Illegal => write!(f, "SAN move is not legal in this position"),
            SanError::Ambiguous => write!(f, "SAN move is ambiguous"),
        }
    }
}

impl Error for SanError {}
