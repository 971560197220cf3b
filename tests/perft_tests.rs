//! Perft counts against the published reference values.

use sable::board::Board;
use sable::perft::perft;

#[test]
fn startpos_shallow() {
    let mut board = Board::new();
    assert_eq!(perft(&mut board, 1), 20);
    assert_eq!(perft(&mut board, 2), 400);
    assert_eq!(perft(&mut board, 3), 8_902);
    assert_eq!(perft(&mut board, 4), 197_281);
}

#[test]
fn startpos_depth_five() {
    let mut board = Board::new();
    assert_eq!(perft(&mut board, 5), 4_865_609);
}

#[test]
#[ignore = "runs for a while; depth 6 is 119M nodes"]
fn startpos_depth_six() {
    let mut board = Board::new();
    assert_eq!(perft(&mut board, 6), 119_060_324);
}

#[test]
fn kiwipete() {
    let mut board =
        Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    assert_eq!(perft(&mut board, 1), 48);
    assert_eq!(perft(&mut board, 2), 2_039);
    assert_eq!(perft(&mut board, 3), 97_862);
    assert_eq!(perft(&mut board, 4), 4_085_603);
}

#[test]
fn endgame_pins_and_ep() {
    // Position 3 of the classic suite.
    let mut board = Board::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
    assert_eq!(perft(&mut board, 1), 14);
    assert_eq!(perft(&mut board, 2), 191);
    assert_eq!(perft(&mut board, 3), 2_812);
    assert_eq!(perft(&mut board, 4), 43_238);
    assert_eq!(perft(&mut board, 5), 674_624);
}

#[test]
fn promotion_heavy() {
    // Position 5 of the classic suite.
    let mut board =
        Board::from_fen("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8").unwrap();
    assert_eq!(perft(&mut board, 1), 44);
    assert_eq!(perft(&mut board, 2), 1_486);
    assert_eq!(perft(&mut board, 3), 62_379);
}

#[test]
fn mirrored_tactical() {
    // Position 4 of the classic suite.
    let mut board =
        Board::from_fen("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1")
            .unwrap();
    assert_eq!(perft(&mut board, 1), 6);
    assert_eq!(perft(&mut board, 2), 264);
    assert_eq!(perft(&mut board, 3), 9_467);
    assert_eq!(perft(&mut board, 4), 422_333);
}
