//! End-to-end runs through the public API.

use comet2::{Cpu, CpuError, DecodeError, Instruction, Operand, RunConfig, RunExit};

/// Counts the set bits of GR1 into GR0, preserving GR1 and GR2.
const BIT_COUNT: [u16; 19] = [
    0x7001, 0x0000, // PUSH 0,GR1
    0x7002, 0x0000, // PUSH 0,GR2
    0x2522,         // SUBA GR2,GR2
    0x3411,         // AND  GR1,GR1
    0x6300, 0x000f, // JZE  done
    0x1222, 0x0001, // loop: LAD GR2,1,GR2
    0x1201, 0xffff, // LAD  GR0,-1,GR1
    0x3410,         // AND  GR1,GR0
    0x6200, 0x0008, // JNZ  loop
    0x1402,         // done: LD GR0,GR2
    0x7120,         // POP  GR2
    0x7110,         // POP  GR1
    0x8100,         // RET
];

#[test]
fn bit_count_by_hand() {
    let mut cpu = Cpu::new();
    cpu.load_image(0, &BIT_COUNT);
    cpu.set_sp(0xffff);
    cpu.set_pc(0xffff);
    cpu.set_register(1, 0xcab7);
    cpu.set_register(2, 0x5555);

    cpu.call_into(0x0000);
    let mut steps = 0;
    while cpu.pc() != 0xffff {
        cpu.step().unwrap();
        steps += 1;
        assert!(steps < 1000, "runaway program");
    }

    assert_eq!(cpu.register(0), 10);
    assert_eq!(cpu.register(1), 0xcab7);
    assert_eq!(cpu.register(2), 0x5555);
    assert_eq!(cpu.sp(), 0xffff);
}

#[test]
fn bit_count_of_zero_takes_the_early_exit() {
    let run = RunConfig {
        image: BIT_COUNT.to_vec(),
        registers: [(1, 0)].into_iter().collect(),
        ..RunConfig::default()
    };

    let mut cpu = run.build().unwrap();
    let exit = cpu.run_until(run.sentinel, run.max_steps).unwrap();

    // two pushes, SUBA, AND, JZE, LD, two pops, RET
    assert_eq!(exit, RunExit::Returned { steps: 9 });
    assert_eq!(cpu.register(0), 0);
}

#[test]
fn bit_count_from_json_config() {
    let words: Vec<String> = BIT_COUNT.iter().map(|w| w.to_string()).collect();
    let json = format!(
        r#"{{ "origin": 256, "entry": 256, "image": [{}], "registers": {{ "1": 65535 }} }}"#,
        words.join(",")
    );
    let mut run = RunConfig::from_json(&json).unwrap();
    // the loop target is absolute, so patch it for the new origin
    run.image[7] = 0x010f;
    run.image[14] = 0x0108;

    let mut cpu = run.build().unwrap();
    let exit = cpu.run_until(run.sentinel, run.max_steps).unwrap();

    assert!(matches!(exit, RunExit::Returned { .. }));
    assert_eq!(cpu.register(0), 16);
}

#[test]
fn nested_calls_and_traps() {
    // main:    CALL sub; SVC 7; RET
    // sub:     LAD GR1,1; RET
    // handler: ADDA GR1,GR1; RET
    let mut cpu = Cpu::new();
    cpu.load_image(0x0000, &[
        Instruction::Call { x: 0 }.word(), 0x0020,
        Instruction::Svc { x: 0 }.word(), 0x0007,
        Instruction::Ret.word(),
    ]);
    cpu.load_image(0x0020, &[Instruction::Lad { r: 1, x: 0 }.word(), 0x0001, Instruction::Ret.word()]);
    cpu.load_image(0x0040, &[
        Instruction::Adda(Operand::Register { r1: 1, r2: 1 }).word(),
        Instruction::Ret.word(),
    ]);
    cpu.set_trap(7, 0x0040);
    cpu.set_sp(0x1000);
    cpu.set_pc(0xffff);
    cpu.call_into(0);

    let exit = cpu.run_until(0xffff, 100).unwrap();
    assert_eq!(exit, RunExit::Returned { steps: 7 });
    assert_eq!(cpu.register(1), 2);
    assert_eq!(cpu.sp(), 0x1000);
}

#[test]
fn missing_trap_halts_the_run() {
    let mut cpu = Cpu::new();
    cpu.load_image(0, &[0x0000, 0xf000, 0x0005, 0x8100]);
    cpu.set_sp(0x8000);
    cpu.set_pc(0xffff);
    cpu.call_into(0);

    let err = cpu.run_until(0xffff, 100).unwrap_err();
    assert_eq!(err, CpuError::TrapMiss { addr: 1, trap: 5 });
    assert_eq!(cpu.pc(), 1);
    assert_eq!(cpu.sp(), 0x7fff);
    assert_eq!(err.to_string(), "trap halt at 0x0001: no vector for SVC 0x0005");

    // Installing the vector lets the same step go through
    cpu.load_image(0x0100, &[0x8100]);
    cpu.set_trap(5, 0x0100);
    assert!(matches!(cpu.run_until(0xffff, 100), Ok(RunExit::Returned { .. })));
}

#[test]
fn illegal_instruction_is_distinct_from_trap_miss() {
    let mut cpu = Cpu::new();
    cpu.write(0x0200, 0x9900);
    cpu.set_pc(0x0200);

    let err = cpu.step().unwrap_err();
    assert_eq!(
        err,
        CpuError::IllegalInstruction { addr: 0x0200, source: DecodeError::InvalidOpcode(0x99) }
    );
    assert_eq!(err.to_string(), "illegal instruction at 0x0200: invalid opcode: 0x99");
    assert_eq!(cpu.pc(), 0x0200);
}
