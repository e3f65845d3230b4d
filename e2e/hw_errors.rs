// Hardware integrity errors: CRC/size/AXI bits in the interrupt status
// must not fail the dispatching call — they arrive encoded in the
// completion result delivered to the original submitter.

use std::sync::Arc;
use std::time::Duration;

use dcsched::header::{write_header, HeaderInfo};
use dcsched::hw::regs;
use dcsched::hw::regs::{IrqLine, RegBus};
use dcsched::hw::SimAccel;
use dcsched::{Device, JobResult, SchedConfig};

const TILE: u32 = 8_192;

fn run_with_injected(bits: u32) -> JobResult {
    let sim = SimAccel::new(Duration::from_micros(200));
    let bus: Arc<dyn RegBus> = sim.clone();
    let irq: Arc<dyn IrqLine> = sim.clone();
    let dev = Device::new(bus, irq, SchedConfig::fast());

    dev.dev_init().unwrap();
    let session = dev.open_session();
    let header = write_header(&HeaderInfo {
        block_count: 1,
        out_size: 1 << 16,
        in_size: 16_384,
    });
    let (handle, info) = dev.create_handle(session, &header).unwrap();

    sim.inject_irq_errors(bits);
    dev.config(handle, TILE, 0x9000_0000, 1 << 16, &info).unwrap();
    dev.tiles_run(handle, 0x1000_0000, 16_384).unwrap();

    // WAIT_FINISH itself succeeds; the failure is in the result value.
    let result = dev.wait_finish(handle).expect("call must not fail");

    dev.destroy_handle(handle).unwrap();
    dev.close_session(session).unwrap();
    dev.dev_deinit().unwrap();
    result
}

#[test]
fn crc_error_is_encoded_in_the_result() {
    assert_eq!(run_with_injected(regs::INT_ERR_CRC), JobResult::CrcError);
}

#[test]
fn size_error_is_encoded_in_the_result() {
    assert_eq!(run_with_injected(regs::INT_ERR_SIZE), JobResult::SizeError);
}

#[test]
fn axi_errors_are_encoded_in_the_result() {
    assert_eq!(run_with_injected(regs::INT_ERR_AXI), JobResult::AxiError);
    // AXI response error bits (bits 5+) map the same way.
    assert_eq!(run_with_injected(1 << 5), JobResult::AxiError);
}

#[test]
fn clean_completion_still_reports_ok() {
    assert_eq!(run_with_injected(0), JobResult::Ok);
}
