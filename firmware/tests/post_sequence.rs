mod common;

use common::{Gate, Rig, TINY_MAP_KIB, UiCall, boot, keys};
use khal::cpu::DescriptorTablePointer;
use khal::pic;
use khal::sim::{Drive, Event};
use pretty_assertions::assert_eq;
use seapig_firmware::BootAction;
use seapig_firmware::boot::LIVENESS_TICKS;
use seapig_firmware::checkpoint::Checkpoint;
use seapig_firmware::nvram::{
    CHECKSUM_OFFSET, Checksum, LOCK_COMMAND, LOCK_INDEX, SETTINGS_BASE, SETTINGS_LEN, SettingsFlags,
};

fn out(port: u16, value: u8) -> Event {
    Event::Out { port, value }
}

fn post_code(checkpoint: Checkpoint) -> Event {
    out(0x80, checkpoint.code())
}

#[test]
fn normal_boot_reports_every_checkpoint_in_order() {
    let rig = Rig::new();
    let run = boot(&rig, &[]);

    assert_eq!(rig.board.post_codes(), (0x10..=0x1A).collect::<Vec<u8>>());
    assert_eq!(run.report.action, BootAction::Normal);
    assert_eq!(run.report.checksum, Checksum::Valid);
    assert!(!run.report.nvram_locked);
    assert!(run.ui_calls.is_empty());

    let facts = run.report.facts;
    assert_eq!(facts.memory_kib, TINY_MAP_KIB);
    assert!(facts.fpu_present);
    assert_eq!(facts.cpu.to_string(), "Intel/AMD 486DX2");
    assert_eq!(facts.drive.map(|d| d.to_string()).as_deref(), Some("QEMU HARDDISK"));
}

#[test]
fn handoff_restores_the_legacy_interrupt_layout() {
    let rig = Rig::new();
    boot(&rig, &[]);

    assert_eq!(rig.board.pic_vector_base(), pic::LEGACY_VECTOR_BASE);
    assert_eq!(rig.board.pic_mask(), pic::ALL_MASKED);
    assert!(!rig.board.interrupts_enabled());

    let last_table = rig.board.events().iter().rev().find_map(|event| match event {
        Event::LoadIdt(table) => Some(*table),
        _ => None,
    });
    assert_eq!(last_table, Some(DescriptorTablePointer::REAL_MODE_IVT));

    let events = rig.board.events();
    let handoff = rig.board.position(post_code(Checkpoint::Handoff));
    let last_cli = events.iter().rposition(|e| *e == Event::DisableInterrupts);
    assert!(last_cli < handoff);
    assert_eq!(rig.cells.row_text(7).as_str(), "");
}

#[test]
fn interrupts_prove_alive_before_the_checks_start() {
    let rig = Rig::new();
    let run = boot(&rig, &[]);

    assert_eq!(run.ticks_before_alive, LIVENESS_TICKS as usize + 1);
    let sti = rig.board.position(Event::EnableInterrupts);
    let alive = rig.board.position(post_code(Checkpoint::InterruptsAlive));
    let cleared = rig.board.position(post_code(Checkpoint::KeyboardCleared));
    assert!(cleared < sti && sti < alive);
}

#[test]
fn f1_during_the_memory_test_opens_settings() {
    let rig = Rig::new();
    let run = boot(&rig, &[(Gate::Tick(5), keys::F1), (Gate::Tick(5), keys::F1_RELEASE)]);

    assert_eq!(run.report.action, BootAction::OpenSettings);
    assert_eq!(run.ui_calls.len(), 1);
    assert_eq!(run.ui_calls[0].0, UiCall::Settings);
    assert_eq!(run.unread_script, 0);
}

#[test]
fn only_the_first_choice_counts() {
    let rig = Rig::new();
    let run = boot(&rig, &[(Gate::Tick(5), keys::F3), (Gate::Tick(5), keys::F1)]);

    assert_eq!(run.report.action, BootAction::ShowInfo);
    assert_eq!(run.ui_calls.iter().map(|c| c.0).collect::<Vec<_>>(), [UiCall::Info]);
}

#[test]
fn escape_stops_the_memory_test_after_the_current_block() {
    let rig = Rig::new();
    let run = boot(&rig, &[(Gate::Tick(5), keys::ESC)]);

    assert_eq!(run.report.action, BootAction::Normal);
    assert_eq!(run.report.facts.memory_kib, 128);
    assert!(rig.ram.highest_write().is_some_and(|addr| addr < 0x0010_0000));
}

#[test]
fn stuck_drive_forces_the_settings_screen() {
    let rig = Rig::new();
    rig.board.attach_drive(Drive::StuckBusy);
    let run = boot(&rig, &[]);

    assert_eq!(run.report.action, BootAction::OpenSettings);
    assert_eq!(run.report.facts.drive, None);
    assert_eq!(rig.board.identify_commands(), 0);
    assert_eq!(run.ui_calls.len(), 1);
}

#[test]
fn silent_drive_forces_settings_even_over_f3() {
    let rig = Rig::new();
    rig.board.attach_drive(Drive::NeverReady);
    let run = boot(&rig, &[(Gate::Tick(5), keys::F3)]);

    assert_eq!(rig.board.identify_commands(), 1);
    assert_eq!(run.report.action, BootAction::OpenSettings);
    assert_eq!(run.ui_calls[0].0, UiCall::Settings);
}

#[test]
fn lock_flag_locks_cmos_after_the_action() {
    let rig = Rig::new().with_flags(SettingsFlags::LOCK_NVRAM);
    let run = boot(&rig, &[]);

    assert!(run.report.nvram_locked);
    assert_eq!(rig.board.cmos_writes(), [(LOCK_INDEX, LOCK_COMMAND)]);

    let dispatched = rig.board.position(post_code(Checkpoint::ActionDispatched));
    let lock = rig.board.position(out(0x71, LOCK_COMMAND));
    let handoff = rig.board.position(post_code(Checkpoint::Handoff));
    assert!(dispatched < lock && lock < handoff);
}

#[test]
fn corrupt_settings_are_cleared_before_use() {
    let rig = Rig::new();
    rig.board.load_cmos(SETTINGS_BASE, &[SettingsFlags::LOCK_NVRAM.bits(), 0x42]);
    let run = boot(&rig, &[]);

    assert_eq!(run.report.checksum, Checksum::Repaired);
    assert!(!run.report.nvram_locked);
    let writes = rig.board.cmos_writes();
    assert_eq!(writes.len(), SETTINGS_LEN);
    assert!(writes.iter().all(|&(_, value)| value == 0));
    assert_eq!(writes[CHECKSUM_OFFSET].0, SETTINGS_BASE + CHECKSUM_OFFSET as u8);
}

#[test]
fn quick_test_touches_one_word_in_32() {
    let full = Rig::new();
    boot(&full, &[]);
    let quick = Rig::new().with_flags(SettingsFlags::QUICK_MEMTEST);
    boot(&quick, &[]);

    let blocks_times_patterns = 2 * 2;
    assert_eq!(full.ram.writes(), blocks_times_patterns * 16384);
    assert_eq!(quick.ram.writes(), blocks_times_patterns * 512);
}

#[test]
fn processor_facts_come_from_the_probes() {
    let rig = Rig::new();
    rig.board.set_cpu(0x0480, true, false);
    let run = boot(&rig, &[]);

    assert_eq!(run.report.facts.cpu.to_string(), "Cyrix 486DX2");
    assert!(!run.report.facts.fpu_present);
}

#[test]
#[should_panic(expected = "machine halted")]
fn memory_fault_halts_the_machine() {
    let rig = Rig::new();
    rig.ram.stick_low(0x0010_0040, 0x0000_0001);
    boot(&rig, &[]);
}
