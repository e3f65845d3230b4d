// Scheduler integration tests (sched/) against the simulated accelerator.
//
// Each test builds its own Scheduler + SimAccel pair — there is no
// process-wide scheduler state.
//
// Coverage:
//   - end-to-end completion of an exact-multiple job (5 × 8192)
//   - remainder flow: PartComplete then the explicit trailing tile
//   - zero-full-tile stream (trailing segment only)
//   - admission bound: ≤ 16 tiles in flight across a 64-tile job
//   - completion exactly-once (second waiter fails)
//   - state-machine and parameter rejections
//   - handle exhaustion through create_job
//   - shutdown resolves in-flight jobs as Cancelled
//   - one start edge per job activation

use std::sync::Arc;
use std::time::Duration;

use dcsched::hw::regs::{IrqLine, RegBus};
use dcsched::hw::{CmdQueue, SimAccel};
use dcsched::sched::{Scheduler, SessionGroup, SubmitStatus};
use dcsched::{Error, JobResult, SchedConfig, CMDQ_DEPTH, HANDLE_CAPACITY};

const TILE: u32 = 8_192;
const OUT_ADDR: u64 = 0x9000_0000;
const SRC_ADDR: u64 = 0x1000_0000;
const WAIT: Duration = Duration::from_secs(10);

fn harness(latency: Duration) -> (Arc<SimAccel>, Scheduler) {
    let sim = SimAccel::new(latency);
    let bus: Arc<dyn RegBus> = sim.clone();
    let irq: Arc<dyn IrqLine> = sim.clone();
    let sched = Scheduler::new(CmdQueue::new(bus, irq), SchedConfig::fast());
    (sim, sched)
}

// ─────────────────────────────────────────────────────────────────────────────
// Happy paths
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn exact_multiple_job_runs_to_completion() {
    let (sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();
    let free_before = sched.pool().available();

    let handle = sched.create_job(&group).unwrap();
    let (tiles, last) = sched
        .configure(handle, 40_960, TILE, OUT_ADDR, 1 << 20, 4)
        .unwrap();
    assert_eq!((tiles, last), (5, 0));

    let (consumed, status) = sched.tiles_run(handle, SRC_ADDR, 40_960).unwrap();
    assert_eq!(consumed, 40_960);
    assert_eq!(status, SubmitStatus::Complete);

    assert_eq!(sched.wait_finish(handle, WAIT).unwrap(), JobResult::Ok);

    // The hardware saw one config (5 tiles) and 5 data tiles, the 5th
    // flagged final, addresses advancing by one tile each.
    let configs = sim.configs();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].tile_count, 5);
    assert_eq!(configs[0].out_addr, OUT_ADDR);

    let log = sim.data_log();
    assert_eq!(log.len(), 5);
    for (i, tile) in log.iter().enumerate() {
        assert_eq!(tile.addr, SRC_ADDR + i as u64 * TILE as u64);
        assert_eq!(tile.len, TILE);
        assert_eq!(tile.last, i == 4, "only the 5th tile is final");
    }

    sched.destroy(handle).unwrap();
    assert_eq!(sched.pool().available(), free_before);
}

#[test]
fn remainder_flow_needs_the_explicit_trailing_tile() {
    let (sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();

    let handle = sched.create_job(&group).unwrap();
    // 20000 → one full tile + folded 11808-byte trailing segment.
    let (tiles, last) = sched
        .configure(handle, 20_000, TILE, OUT_ADDR, 1 << 20, 2)
        .unwrap();
    assert_eq!((tiles, last), (1, 11_808));

    let (consumed, status) = sched.tiles_run(handle, SRC_ADDR, 20_000).unwrap();
    assert_eq!(consumed, TILE as u64, "only the full tile is consumed");
    assert_eq!(status, SubmitStatus::PartComplete);

    sched
        .last_tile_run(handle, SRC_ADDR + TILE as u64, 11_808)
        .unwrap();
    assert_eq!(sched.wait_finish(handle, WAIT).unwrap(), JobResult::Ok);

    let log = sim.data_log();
    assert_eq!(log.len(), 2);
    assert!(!log[0].last);
    assert!(log[1].last);
    assert_eq!(log[1].len, 11_808);
    // Config advertises both data tiles.
    assert_eq!(sim.configs()[0].tile_count, 2);
}

#[test]
fn trailing_only_stream_has_zero_full_tiles() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();

    let handle = sched.create_job(&group).unwrap();
    let (tiles, last) = sched
        .configure(handle, 5_000, TILE, OUT_ADDR, 1 << 20, 1)
        .unwrap();
    assert_eq!((tiles, last), (0, 5_000));

    let (consumed, status) = sched.tiles_run(handle, SRC_ADDR, 5_000).unwrap();
    assert_eq!(consumed, 0);
    assert_eq!(status, SubmitStatus::PartComplete);

    sched.last_tile_run(handle, SRC_ADDR, 5_000).unwrap();
    assert_eq!(sched.wait_finish(handle, WAIT).unwrap(), JobResult::Ok);
}

#[test]
fn two_jobs_complete_independently() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    let group_a = SessionGroup::new();
    let group_b = SessionGroup::new();

    let a = sched.create_job(&group_a).unwrap();
    let b = sched.create_job(&group_b).unwrap();
    sched.configure(a, 16_384, TILE, OUT_ADDR, 1 << 20, 1).unwrap();
    sched.configure(b, 24_576, TILE, OUT_ADDR + (1 << 20), 1 << 20, 1).unwrap();
    sched.tiles_run(a, SRC_ADDR, 16_384).unwrap();
    sched.tiles_run(b, SRC_ADDR + (1 << 20), 24_576).unwrap();

    assert_eq!(sched.wait_finish(a, WAIT).unwrap(), JobResult::Ok);
    assert_eq!(sched.wait_finish(b, WAIT).unwrap(), JobResult::Ok);

    // Records landed in their own groups only.
    assert_eq!(group_a.pending(), 0);
    assert_eq!(group_b.pending(), 0);
    assert_eq!(group_a.take(b), None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Admission bound
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn in_flight_tiles_never_exceed_cmdq_depth() {
    // 64 full tiles with a slow (1 ms/tile) retirement path forces the
    // dispatcher into the backoff loop.
    let (sim, sched) = harness(Duration::from_millis(1));
    let group = SessionGroup::new();
    let len = 64 * TILE as u64;

    let handle = sched.create_job(&group).unwrap();
    sched.configure(handle, len, TILE, OUT_ADDR, 1 << 20, 8).unwrap();
    let (consumed, status) = sched.tiles_run(handle, SRC_ADDR, len).unwrap();
    assert_eq!(consumed, len);
    assert_eq!(status, SubmitStatus::Complete);

    assert_eq!(sched.wait_finish(handle, WAIT).unwrap(), JobResult::Ok);
    assert!(
        sim.max_outstanding() <= CMDQ_DEPTH,
        "admission bound violated: {} tiles in flight",
        sim.max_outstanding()
    );
    assert_eq!(sim.retired(), 64);
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion delivery
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn completion_is_consumed_exactly_once() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();

    let handle = sched.create_job(&group).unwrap();
    sched.configure(handle, 16_384, TILE, OUT_ADDR, 1 << 20, 1).unwrap();
    sched.tiles_run(handle, SRC_ADDR, 16_384).unwrap();

    assert_eq!(sched.wait_finish(handle, WAIT).unwrap(), JobResult::Ok);
    assert_eq!(group.pending(), 0);
    // The record is gone; a second wait cannot produce another one.
    assert_eq!(sched.wait_finish(handle, WAIT), Err(Error::HandleNotFound));
}

#[test]
fn one_start_edge_per_job_activation() {
    let (sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();

    for i in 0..2u64 {
        let handle = sched.create_job(&group).unwrap();
        sched
            .configure(handle, 24_576, TILE, OUT_ADDR + i * (1 << 20), 1 << 20, 1)
            .unwrap();
        sched.tiles_run(handle, SRC_ADDR, 24_576).unwrap();
        assert_eq!(sched.wait_finish(handle, WAIT).unwrap(), JobResult::Ok);
        sched.destroy(handle).unwrap();
    }
    assert_eq!(sim.start_edges(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Rejections
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unknown_handle_is_rejected_everywhere() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    assert_eq!(
        sched.configure(55, 16_384, TILE, OUT_ADDR, 1 << 20, 1),
        Err(Error::HandleNotFound)
    );
    assert_eq!(sched.tiles_run(55, SRC_ADDR, 16_384), Err(Error::HandleNotFound));
    assert_eq!(sched.last_tile_run(55, SRC_ADDR, 100), Err(Error::HandleNotFound));
    assert_eq!(sched.destroy(55), Err(Error::HandleNotFound));
    assert_eq!(sched.wait_finish(55, WAIT), Err(Error::HandleNotFound));
}

#[test]
fn configure_rejections_leave_no_partial_state() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();
    let handle = sched.create_job(&group).unwrap();

    // Unaligned tile size, zero destination, zero block count.
    assert_eq!(
        sched.configure(handle, 16_384, TILE + 1, OUT_ADDR, 1 << 20, 1),
        Err(Error::InvalidParameter)
    );
    assert_eq!(
        sched.configure(handle, 16_384, TILE, 0, 1 << 20, 1),
        Err(Error::InvalidParameter)
    );
    assert_eq!(
        sched.configure(handle, 16_384, TILE, OUT_ADDR, 1 << 20, 0),
        Err(Error::InvalidParameter)
    );

    // The job is still Idle: a good configure succeeds, and a second one
    // is rejected.
    assert!(sched.configure(handle, 16_384, TILE, OUT_ADDR, 1 << 20, 1).is_ok());
    assert_eq!(
        sched.configure(handle, 16_384, TILE, OUT_ADDR, 1 << 20, 1),
        Err(Error::InvalidParameter)
    );
}

#[test]
fn submission_before_configure_is_rejected() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();
    let handle = sched.create_job(&group).unwrap();

    assert_eq!(
        sched.tiles_run(handle, SRC_ADDR, 16_384),
        Err(Error::InvalidParameter)
    );
    assert_eq!(
        sched.last_tile_run(handle, SRC_ADDR, 100),
        Err(Error::InvalidParameter)
    );
}

#[test]
fn last_tile_rejections() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();
    let handle = sched.create_job(&group).unwrap();

    // Exact multiple: no trailing remainder exists.
    sched.configure(handle, 16_384, TILE, OUT_ADDR, 1 << 20, 1).unwrap();
    assert_eq!(
        sched.last_tile_run(handle, SRC_ADDR, 100),
        Err(Error::InvalidParameter)
    );

    let with_rem = sched.create_job(&group).unwrap();
    sched.configure(with_rem, 20_000, TILE, OUT_ADDR, 1 << 20, 1).unwrap();
    // Zero length is invalid even when a remainder is due.
    assert_eq!(
        sched.last_tile_run(with_rem, SRC_ADDR, 0),
        Err(Error::InvalidParameter)
    );
    // Trailing tile before the full tiles is out of order.
    assert_eq!(
        sched.last_tile_run(with_rem, SRC_ADDR, 11_808),
        Err(Error::InvalidParameter)
    );
}

#[test]
fn destroying_a_running_job_is_refused() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();
    let handle = sched.create_job(&group).unwrap();

    // Idle job destroys fine.
    sched.destroy(handle).unwrap();

    let running = sched.create_job(&group).unwrap();
    sched.configure(running, 20_000, TILE, OUT_ADDR, 1 << 20, 1).unwrap();
    assert_eq!(sched.destroy(running), Err(Error::Busy));

    // Completing it unblocks destruction.
    sched.tiles_run(running, SRC_ADDR, 20_000).unwrap();
    sched.last_tile_run(running, SRC_ADDR + TILE as u64, 11_808).unwrap();
    sched.wait_finish(running, WAIT).unwrap();
    sched.destroy(running).unwrap();
}

#[test]
fn handle_pool_exhaustion_through_create_job() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();

    let handles: Vec<_> = (0..HANDLE_CAPACITY)
        .map(|_| sched.create_job(&group).unwrap())
        .collect();
    assert_eq!(sched.create_job(&group), Err(Error::ResourceExhausted));

    sched.destroy(handles[17]).unwrap();
    assert_eq!(sched.create_job(&group).unwrap(), handles[17]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Shutdown
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn shutdown_resolves_in_flight_jobs_as_cancelled() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    let group = SessionGroup::new();

    // Remainder job with only its full tile submitted: it can never
    // finish on its own.
    let handle = sched.create_job(&group).unwrap();
    sched.configure(handle, 20_000, TILE, OUT_ADDR, 1 << 20, 1).unwrap();
    sched.tiles_run(handle, SRC_ADDR, 20_000).unwrap();

    sched.shutdown();
    assert!(sched.is_shut_down());

    // The drain published an explicit Cancelled record.
    assert_eq!(sched.wait_finish(handle, WAIT).unwrap(), JobResult::Cancelled);
    // State was reset: the job can be destroyed and its slot recycled.
    sched.destroy(handle).unwrap();

    // New work is refused after shutdown.
    assert_eq!(sched.create_job(&group), Err(Error::Cancelled));
}

#[test]
fn shutdown_is_idempotent() {
    let (_sim, sched) = harness(Duration::from_micros(200));
    sched.shutdown();
    sched.shutdown();
    assert!(sched.is_shut_down());
}
