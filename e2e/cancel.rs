// Cancellation scenario: tearing the device down while jobs are in
// flight must release every blocked waiter with an explicit Cancelled
// outcome — never leave it hanging, never drop the job silently.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dcsched::header::{write_header, HeaderInfo};
use dcsched::hw::regs::{IrqLine, RegBus};
use dcsched::hw::SimAccel;
use dcsched::{Device, Error, SchedConfig};

const TILE: u32 = 8_192;

fn device_over(sim: &Arc<SimAccel>) -> Arc<Device> {
    let bus: Arc<dyn RegBus> = sim.clone();
    let irq: Arc<dyn IrqLine> = sim.clone();
    Arc::new(Device::new(bus, irq, SchedConfig::fast()))
}

#[test]
fn teardown_mid_run_releases_the_waiter_with_cancelled() {
    let sim = SimAccel::new(Duration::from_micros(200));
    let dev = device_over(&sim);

    dev.dev_init().unwrap();
    let session = dev.open_session();

    // Remainder stream with only its full tile submitted: the job cannot
    // finish until the trailing tile arrives — which it never will.
    let header = write_header(&HeaderInfo {
        block_count: 1,
        out_size: 1 << 16,
        in_size: 20_000,
    });
    let (handle, info) = dev.create_handle(session, &header).unwrap();
    let (tiles, last) = dev.config(handle, TILE, 0x9000_0000, 1 << 16, &info).unwrap();
    assert_eq!((tiles, last), (1, 11_808));
    dev.tiles_run(handle, 0x1000_0000, 20_000).unwrap();

    // Waiter blocks before the teardown is requested.
    let waiter = {
        let dev = Arc::clone(&dev);
        thread::spawn(move || dev.wait_finish(handle))
    };
    thread::sleep(Duration::from_millis(50));

    dev.dev_deinit().unwrap();

    let outcome = waiter.join().unwrap();
    assert_eq!(outcome, Err(Error::Cancelled), "waiter must not hang");
}

#[test]
fn teardown_with_idle_job_only() {
    // A created-but-never-submitted job is also resolved at teardown.
    let sim = SimAccel::new(Duration::from_micros(200));
    let dev = device_over(&sim);

    dev.dev_init().unwrap();
    let session = dev.open_session();
    let header = write_header(&HeaderInfo {
        block_count: 1,
        out_size: 1 << 16,
        in_size: 16_384,
    });
    let (_handle, _info) = dev.create_handle(session, &header).unwrap();

    // Deinit must not block on the idle job.
    dev.dev_deinit().unwrap();
}
