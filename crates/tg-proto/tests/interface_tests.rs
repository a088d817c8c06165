use tg_core::canonical_machine::CombinedState;
use tg_proto::realtime::{scan, RealtimeCommand, ScanResult};
use tg_proto::status::combined_state_code;

#[test]
fn reset_and_queue_flush_are_pulled_out_of_a_mixed_line() {
    let input = b"G1 X10 Y20%\x18F500\n";
    let mut scratch = [0u8; 64];
    let result: ScanResult<4> = scan(input, &mut scratch);
    assert_eq!(result.line_bytes, b"G1 X10 Y20F500\n");
    assert_eq!(
        result.commands.as_slice(),
        &[RealtimeCommand::QueueFlush, RealtimeCommand::Reset]
    );
}

#[test]
fn run_state_code_is_stable_for_ui_contracts() {
    assert_eq!(combined_state_code(CombinedState::Run), 5);
    assert_eq!(combined_state_code(CombinedState::Hold), 6);
}
