//! Lazy-SMP helper threads.
//!
//! Workers are long-lived: each owns a complete `Search` sharing only the
//! transposition table and the tablebase adapter with the master. At every
//! iteration the master publishes (depth, window, root moves, tables) through
//! a command slot and an event; workers search at staggered depths with
//! timeouts disabled, publish their node counters at their poll points, and
//! raise the shared `aborting_smp` flag when they finish so siblings unwind.
//! When the master gets beaten to the finish it adopts the worker's root
//! move list as the iteration result.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::board::{Board, MOVE_NONE};

use super::history::History;
use super::repetition::RepStack;
use super::root::RootMoves;
use super::score::Score;
use super::tb::Tablebases;
use super::tt::TransTable;
use super::{Search, SearchMode, SF_NO_TIMEOUT};

/// Deep recursion plus per-frame buffers want room to breathe.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

/// Manual-reset-then-consume event on a mutex/condvar pair.
pub(crate) struct Event {
    state: Mutex<bool>,
    cv: Condvar,
}

impl Event {
    fn new() -> Self {
        Event {
            state: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn signal(&self) {
        let mut s = self.state.lock();
        *s = true;
        self.cv.notify_one();
    }

    /// Block until signaled, consuming the signal.
    fn wait(&self) {
        let mut s = self.state.lock();
        while !*s {
            self.cv.wait(&mut s);
        }
        *s = false;
    }
}

/// Everything a worker needs for one iteration.
struct Command {
    depth: i32,
    alpha: Score,
    beta: Score,
    multi_pv: u32,
    age: u8,
    contempt: Score,
    board: Board,
    rep: RepStack,
    history: History,
    root_moves: RootMoves,
}

struct CommandSlot {
    cmd: Mutex<Option<Command>>,
    quit: AtomicBool,
    ev: Event,
}

/// Counters and the result slot a worker shares with the master. Counter
/// reads are racy by design; the values only feed progress frames.
pub(crate) struct WorkerShared {
    nodes: AtomicU64,
    tb_hits: AtomicU64,
    sel_depth: AtomicU32,
    result: Mutex<Option<RootMoves>>,
}

impl WorkerShared {
    fn new() -> Self {
        WorkerShared {
            nodes: AtomicU64::new(0),
            tb_hits: AtomicU64::new(0),
            sel_depth: AtomicU32::new(0),
            result: Mutex::new(None),
        }
    }

    fn reset(&self) {
        self.nodes.store(0, Ordering::Relaxed);
        self.tb_hits.store(0, Ordering::Relaxed);
        self.sel_depth.store(0, Ordering::Relaxed);
    }

    pub(crate) fn publish(&self, nodes: u64, tb_hits: u64, sel_depth: u32) {
        self.nodes.store(nodes, Ordering::Relaxed);
        self.tb_hits.store(tb_hits, Ordering::Relaxed);
        self.sel_depth.store(sel_depth, Ordering::Relaxed);
    }
}

pub(crate) struct LazySmpWorker {
    thread: Option<JoinHandle<()>>,
    slot: Arc<CommandSlot>,
    shared: Arc<WorkerShared>,
    aborting: Arc<AtomicBool>,
    started: Arc<Event>,
    done: Arc<Event>,
    in_flight: bool,
}

impl LazySmpWorker {
    fn spawn(
        id: usize,
        tt: Arc<TransTable>,
        tb: Arc<Tablebases>,
        aborting_smp: Arc<AtomicBool>,
    ) -> Self {
        let slot = Arc::new(CommandSlot {
            cmd: Mutex::new(None),
            quit: AtomicBool::new(false),
            ev: Event::new(),
        });
        let shared = Arc::new(WorkerShared::new());
        let aborting = Arc::new(AtomicBool::new(false));
        let started = Arc::new(Event::new());
        let done = Arc::new(Event::new());

        let t_slot = Arc::clone(&slot);
        let t_shared = Arc::clone(&shared);
        let t_aborting = Arc::clone(&aborting);
        let t_started = Arc::clone(&started);
        let t_done = Arc::clone(&done);

        let thread = std::thread::Builder::new()
            .name(format!("smp-{id}"))
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                worker_main(tt, tb, aborting_smp, t_slot, t_shared, t_aborting, t_started, t_done);
            })
            .expect("failed to spawn smp worker");

        log::debug!("smp worker {id} spawned");

        LazySmpWorker {
            thread: Some(thread),
            slot,
            shared,
            aborting,
            started,
            done,
            in_flight: false,
        }
    }

    /// Publish a command and wait until the worker picked it up.
    fn start(&mut self, cmd: Command) {
        self.aborting.store(false, Ordering::Relaxed);
        *self.slot.cmd.lock() = Some(cmd);
        self.slot.ev.signal();
        self.started.wait();
        self.in_flight = true;
    }

    /// Ask the worker to unwind and wait for its iteration to finish.
    fn abort(&mut self) {
        if self.in_flight {
            self.aborting.store(true, Ordering::Relaxed);
            self.done.wait();
            self.in_flight = false;
        }
    }

    fn destroy(&mut self) {
        self.abort();
        self.slot.quit.store(true, Ordering::Relaxed);
        self.slot.ev.signal();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_main(
    tt: Arc<TransTable>,
    tb: Arc<Tablebases>,
    aborting_smp: Arc<AtomicBool>,
    slot: Arc<CommandSlot>,
    shared: Arc<WorkerShared>,
    aborting: Arc<AtomicBool>,
    started: Arc<Event>,
    done: Arc<Event>,
) {
    let mut s = Search::new(tt, tb);
    s.aborting = aborting;
    s.aborting_smp = Arc::clone(&aborting_smp);
    s.worker_shared = Some(Arc::clone(&shared));
    s.search_flags |= SF_NO_TIMEOUT;

    loop {
        slot.ev.wait();
        if slot.quit.load(Ordering::Relaxed) {
            break;
        }
        let Some(cmd) = slot.cmd.lock().take() else {
            continue;
        };

        s.board = cmd.board;
        s.rep.copy_from(&cmd.rep);
        s.history.copy_from(&cmd.history);
        s.root_moves = cmd.root_moves;
        s.root_moves.best_move = MOVE_NONE;
        s.mode = SearchMode::infinite();
        s.mode.multi_pv = cmd.multi_pv;
        s.age = cmd.age;
        s.eval.set_contempt(cmd.contempt);
        s.nodes = 0;
        s.tb_hits = 0;
        s.sel_depth = 0;
        shared.reset();
        *shared.result.lock() = None;

        started.signal();

        let _ = s.root(cmd.depth, cmd.alpha, cmd.beta);

        s.flush_worker_counters();
        if s.root_moves.best_move != MOVE_NONE {
            *shared.result.lock() = Some(s.root_moves.clone());
        }
        aborting_smp.store(true, Ordering::Relaxed);
        done.signal();
    }
}

impl Search {
    /// Spawn or shrink the pool of long-lived helper threads. Only callable
    /// between searches.
    pub fn set_threads(&mut self, helpers: usize) {
        if self.workers.len() == helpers {
            return;
        }
        self.shutdown_workers();
        for i in 0..helpers {
            self.workers.push(LazySmpWorker::spawn(
                i,
                Arc::clone(&self.tt),
                Arc::clone(&self.tb),
                Arc::clone(&self.aborting_smp),
            ));
        }
    }

    pub(crate) fn shutdown_workers(&mut self) {
        for w in &mut self.workers {
            w.destroy();
        }
        self.workers.clear();
    }

    /// Kick off all helpers on this iteration; helpers at even indexes go
    /// one ply deeper than the master.
    pub(crate) fn smp_start(&mut self, depth: i32, alpha: Score, beta: Score) {
        self.aborting_smp.store(false, Ordering::Relaxed);
        if self.workers.is_empty() {
            return;
        }
        for i in 0..self.workers.len() {
            let cmd = Command {
                depth: depth + (((i as i32) & 1) ^ 1),
                alpha,
                beta,
                multi_pv: self.mode.multi_pv,
                age: self.age,
                contempt: self.eval.contempt(),
                board: self.board.clone(),
                rep: self.rep.clone(),
                history: (*self.history).clone(),
                root_moves: self.root_moves.clone(),
            };
            self.workers[i].start(cmd);
        }
    }

    /// Stop all helpers and wait for them to unwind.
    pub(crate) fn smp_stop(&mut self) {
        for w in &mut self.workers {
            w.abort();
        }
    }

    /// Total nodes across the master and all helpers.
    pub(crate) fn smp_nodes(&self) -> u64 {
        self.nodes
            + self
                .workers
                .iter()
                .map(|w| w.shared.nodes.load(Ordering::Relaxed))
                .sum::<u64>()
    }

    pub(crate) fn smp_tb_hits(&self) -> u64 {
        self.tb_hits
            + self
                .workers
                .iter()
                .map(|w| w.shared.tb_hits.load(Ordering::Relaxed))
                .sum::<u64>()
    }

    pub(crate) fn smp_sel_depth(&self) -> u32 {
        self.workers
            .iter()
            .map(|w| w.shared.sel_depth.load(Ordering::Relaxed))
            .max()
            .unwrap_or(0)
    }

    /// Adopt the root-move list of a helper that completed this iteration.
    pub(crate) fn smp_adopt(&mut self) -> Option<Score> {
        for w in &self.workers {
            let taken = w.shared.result.lock().take();
            if let Some(rm) = taken {
                if rm.best_move != MOVE_NONE {
                    let score = rm.best_score;
                    self.root_moves = rm;
                    log::debug!("adopted helper result at score {score}");
                    return Some(score);
                }
            }
        }
        None
    }
}
