//! Criterion benchmarks: perft, move generation and fixed-depth search.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sable::board::Board;
use sable::perft::perft;
use sable::search::tb::Tablebases;
use sable::search::tt::TransTable;
use sable::search::{Search, SearchMode};

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn bench_perft(c: &mut Criterion) {
    let mut group = c.benchmark_group("perft");

    let mut startpos = Board::new();
    for depth in 1..=4u32 {
        group.bench_with_input(BenchmarkId::new("startpos", depth), &depth, |b, &depth| {
            b.iter(|| perft(&mut startpos, black_box(depth)))
        });
    }

    let mut kiwipete = Board::from_fen(KIWIPETE).unwrap();
    for depth in 1..=3u32 {
        group.bench_with_input(BenchmarkId::new("kiwipete", depth), &depth, |b, &depth| {
            b.iter(|| perft(&mut kiwipete, black_box(depth)))
        });
    }

    group.finish();
}

fn bench_movegen(c: &mut Criterion) {
    let mut group = c.benchmark_group("movegen");

    let startpos = Board::new();
    group.bench_function("startpos", |b| b.iter(|| black_box(startpos.legal_moves())));

    let kiwipete = Board::from_fen(KIWIPETE).unwrap();
    group.bench_function("kiwipete", |b| b.iter(|| black_box(kiwipete.legal_moves())));

    let endgame = Board::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
    group.bench_function("endgame", |b| b.iter(|| black_box(endgame.legal_moves())));

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    let board = Board::new();
    for depth in [4, 6] {
        group.bench_with_input(
            BenchmarkId::new("startpos", depth),
            &depth,
            |b, &depth| {
                b.iter(|| {
                    let mut search = Search::new(
                        Arc::new(TransTable::new(16)),
                        Arc::new(Tablebases::none()),
                    );
                    black_box(search.iterate(&board, &SearchMode::depth(depth)))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_perft, bench_movegen, bench_search);
criterion_main!(benches);
