// End-to-end scenario through the full control surface:
//
//   dev_init → open_session → CREATE_HANDLE → CONFIG → TILES_RUN →
//   WAIT_FINISH → DESTROY_HANDLE → close_session → dev_deinit
//
// Uses the simulated accelerator; the device drives it through the same
// register contract real hardware would see.

use std::sync::Arc;
use std::time::Duration;

use dcsched::header::{write_header, HeaderInfo};
use dcsched::hw::regs::{IrqLine, RegBus};
use dcsched::hw::SimAccel;
use dcsched::sched::SubmitStatus;
use dcsched::{Device, Error, JobResult, SchedConfig};

const TILE: u32 = 8_192;
const OUT_ADDR: u64 = 0x9000_0000;
const SRC_ADDR: u64 = 0x1000_0000;

fn device_over(sim: &Arc<SimAccel>) -> Device {
    let bus: Arc<dyn RegBus> = sim.clone();
    let irq: Arc<dyn IrqLine> = sim.clone();
    Device::new(bus, irq, SchedConfig::fast())
}

#[test]
fn five_tile_stream_end_to_end() {
    let sim = SimAccel::new(Duration::from_micros(200));
    let dev = device_over(&sim);

    dev.dev_init().unwrap();
    let session = dev.open_session();

    // 40960-byte stream, exact multiple of the tile size.
    let header = write_header(&HeaderInfo {
        block_count: 4,
        out_size: 1 << 20,
        in_size: 40_960,
    });
    let (handle, info) = dev.create_handle(session, &header).unwrap();
    assert_eq!(info.in_size, 40_960);

    let (tiles, last) = dev.config(handle, TILE, OUT_ADDR, 1 << 20, &info).unwrap();
    assert_eq!((tiles, last), (5, 0));

    let (consumed, status) = dev.tiles_run(handle, SRC_ADDR, 40_960).unwrap();
    assert_eq!(consumed, 40_960);
    assert_eq!(status, SubmitStatus::Complete);

    assert_eq!(dev.wait_finish(handle).unwrap(), JobResult::Ok);

    // All 5 tiles reached the hardware, the 5th flagged final.
    let log = sim.data_log();
    assert_eq!(log.len(), 5);
    assert!(log[4].last);
    assert_eq!(sim.configs()[0].block_count, 4);

    dev.destroy_handle(handle).unwrap();
    dev.close_session(session).unwrap();
    dev.dev_deinit().unwrap();
}

#[test]
fn session_close_defers_until_records_are_consumed() {
    let sim = SimAccel::new(Duration::from_micros(200));
    let dev = device_over(&sim);

    dev.dev_init().unwrap();
    let session = dev.open_session();

    let header = write_header(&HeaderInfo {
        block_count: 1,
        out_size: 1 << 16,
        in_size: 16_384,
    });
    let (handle, info) = dev.create_handle(session, &header).unwrap();
    dev.config(handle, TILE, OUT_ADDR, 1 << 16, &info).unwrap();
    dev.tiles_run(handle, SRC_ADDR, 16_384).unwrap();

    // Give the completion record ample time to land, then try to close
    // while it is still unconsumed: teardown must be deferred.
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(dev.close_session(session), Err(Error::Busy));

    assert_eq!(dev.wait_finish(handle).unwrap(), JobResult::Ok);
    dev.destroy_handle(handle).unwrap();
    dev.close_session(session).unwrap();
    dev.dev_deinit().unwrap();
}

#[test]
fn refcounted_init_deinit() {
    let sim = SimAccel::new(Duration::from_micros(200));
    let dev = device_over(&sim);

    dev.dev_init().unwrap();
    dev.dev_init().unwrap(); // second session

    let session = dev.open_session();
    let header = write_header(&HeaderInfo {
        block_count: 1,
        out_size: 1 << 16,
        in_size: 16_384,
    });

    // First deinit leaves the device running.
    dev.dev_deinit().unwrap();
    let (handle, info) = dev.create_handle(session, &header).unwrap();
    dev.config(handle, TILE, OUT_ADDR, 1 << 16, &info).unwrap();
    dev.tiles_run(handle, SRC_ADDR, 16_384).unwrap();
    assert_eq!(dev.wait_finish(handle).unwrap(), JobResult::Ok);
    dev.destroy_handle(handle).unwrap();

    // Last deinit stops it; further ops are refused.
    dev.dev_deinit().unwrap();
    assert_eq!(
        dev.create_handle(session, &header).unwrap_err(),
        Error::NotInitialized
    );
    assert_eq!(dev.dev_deinit(), Err(Error::NotInitialized));
}

#[test]
fn malformed_headers_are_rejected_without_consuming_a_handle() {
    let sim = SimAccel::new(Duration::from_micros(200));
    let dev = device_over(&sim);
    dev.dev_init().unwrap();
    let session = dev.open_session();

    let mut bad = write_header(&HeaderInfo {
        block_count: 1,
        out_size: 1 << 16,
        in_size: 16_384,
    });
    bad[0] = b'X';
    assert_eq!(
        dev.create_handle(session, &bad).unwrap_err(),
        Error::InvalidParameter
    );

    // Undersized output buffer is caught at CONFIG.
    let good = write_header(&HeaderInfo {
        block_count: 1,
        out_size: 1 << 16,
        in_size: 16_384,
    });
    let (handle, info) = dev.create_handle(session, &good).unwrap();
    assert_eq!(
        dev.config(handle, TILE, OUT_ADDR, 512, &info).unwrap_err(),
        Error::InvalidParameter
    );

    dev.destroy_handle(handle).unwrap();
    dev.close_session(session).unwrap();
    dev.dev_deinit().unwrap();
}
