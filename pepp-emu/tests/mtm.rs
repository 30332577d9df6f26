use std::sync::Arc;

use parking_lot::Mutex;

use pepp_emu::mtm::{Mtm0, Mtm1, Mtm2, Register};
use pepp_emu::sim::{Clock, Clocked, Delay, Initiator, TickError, TickResult};
use pepp_state::{
    DenseMemory, Device, DevicePod, IdGenerator, Operation, SharedTarget, SimpleBus, Target,
    Traceable,
};
use pepp_trace::{
    CommitStrategy, SharedTraceBuffer, TickedTrace, Trace, TraceBuffer, TraceBufferConfig,
    TraceRecorder,
};

fn init() {
    env_logger::builder().is_test(true).try_init().ok();
}

fn traced(ids: &IdGenerator, config: TraceBufferConfig) -> SharedTraceBuffer {
    let trace_buffer = pepp_trace::shared(TraceBuffer::with_config(config));
    {
        let mut buffer = trace_buffer.lock();
        for id in 0..ids.peek() {
            buffer.trace_device(id, true);
        }
    }
    trace_buffer
}

fn mtm1_with_target(ids: &mut IdGenerator) -> anyhow::Result<Mtm1> {
    let pod = DevicePod::new("mtm", "/mtm", ids.next_id(), "mtm");
    let mut mtm = Mtm1::new(pod, "cpu", ids)?;

    let pod = DevicePod::new("ram", "/ram", ids.next_id(), "memory");
    let mut ram = DenseMemory::new(pod, 0, 3, 0)?;
    assert!(ram.write(0, &[1, 2, 3, 4], Operation::application()).completed);

    let target: SharedTarget = Arc::new(Mutex::new(ram));
    mtm.set_target(target);
    Ok(mtm)
}

fn mtm0(ids: &mut IdGenerator) -> anyhow::Result<Mtm0> {
    let pod = DevicePod::new("mtm", "/mtm", ids.next_id(), "mtm");
    Ok(Mtm0::new(pod, "cpu", ids)?)
}

#[test]
fn mtm0_increments_pc() -> anyhow::Result<()> {
    init();

    let mut ids = IdGenerator::new();
    let mut mtm = mtm0(&mut ids)?;

    let result = mtm.tick(1);
    assert_eq!(
        result,
        TickResult {
            pause: false,
            sync: false,
            delay: Delay::Clock { period: 1 },
            error: TickError::Success,
        }
    );
    assert_eq!(mtm.registers().storage()[..2], [0x00, 0x01]);
    assert_eq!(mtm.instruction_count(), 1);
    Ok(())
}

#[test]
fn mtm1_stages_one_group_per_tick() -> anyhow::Result<()> {
    init();

    let mut ids = IdGenerator::new();
    let mut mtm = mtm1_with_target(&mut ids)?;
    let trace_buffer = traced(&ids, TraceBufferConfig::default());
    mtm.set_trace_buffer(trace_buffer.clone());

    let cpu = mtm.device_id();
    let registers = mtm.registers().device_id();

    for tick in 1..=2 {
        trace_buffer.lock().tick(tick)?;
        assert_eq!(mtm.tick(tick).error, TickError::Success);
        assert!(trace_buffer.lock().pending().is_empty());
    }

    let expected = vec![
        TickedTrace { tick: 1, trace: Trace::increment_cycle(cpu) },
        TickedTrace { tick: 1, trace: Trace::memory(registers, 0, &[0, 0], &[0, 1]) },
        TickedTrace { tick: 1, trace: Trace::memory(registers, 2, &[0, 0], &[2, 3]) },
        TickedTrace { tick: 2, trace: Trace::increment_cycle(cpu) },
        TickedTrace { tick: 2, trace: Trace::memory(registers, 0, &[0, 1], &[0, 2]) },
        TickedTrace { tick: 2, trace: Trace::memory(registers, 2, &[2, 3], &[3, 4]) },
    ];

    let buffer = trace_buffer.lock();
    assert_eq!(buffer.staged(), &expected[..]);
    assert_eq!(buffer.groups().len(), 2);
    Ok(())
}

#[test]
fn mtm1_undo_to_start() -> anyhow::Result<()> {
    init();

    let mut ids = IdGenerator::new();
    let mut mtm = mtm1_with_target(&mut ids)?;
    let trace_buffer = traced(&ids, TraceBufferConfig::default());
    mtm.set_trace_buffer(trace_buffer.clone());

    for tick in 1..=3 {
        trace_buffer.lock().tick(tick)?;
        mtm.tick(tick);
    }
    assert_eq!(mtm.instruction_count(), 3);

    let traces = trace_buffer.lock().discard(Some(0)).collect::<Vec<_>>();
    assert_eq!(traces.len(), 9);
    for trace in traces.iter().rev() {
        assert!(mtm.undo(trace));
    }

    assert_eq!(mtm.instruction_count(), 0);
    assert_eq!(mtm.register(Register::Pc), 0);
    assert_eq!(mtm.register(Register::A), 0);
    assert!(trace_buffer.lock().staged().is_empty());
    Ok(())
}

#[test]
fn mtm1_reset() -> anyhow::Result<()> {
    init();

    let mut ids = IdGenerator::new();
    let mut mtm = mtm1_with_target(&mut ids)?;
    mtm.tick(1);
    mtm.tick(2);
    assert_ne!(mtm.register(Register::A), 0);

    mtm.reset();
    assert_eq!(mtm.register(Register::Pc), 0);
    assert_eq!(mtm.register(Register::A), 0);
    assert_eq!(mtm.cycle_count(), 0);
    Ok(())
}

#[test]
fn mtm1_requires_a_target() -> anyhow::Result<()> {
    let mut ids = IdGenerator::new();
    let pod = DevicePod::new("mtm", "/mtm", ids.next_id(), "mtm");
    let mut mtm = Mtm1::new(pod, "cpu", &mut ids)?;
    let trace_buffer = traced(&ids, TraceBufferConfig::default());
    mtm.set_trace_buffer(trace_buffer.clone());

    let result = mtm.tick(1);
    assert_eq!(result.error, TickError::NoTarget);
    assert!(result.pause);
    assert!(trace_buffer.lock().pending().is_empty());
    assert!(trace_buffer.lock().staged().is_empty());
    Ok(())
}

#[test]
fn full_trace_buffer_refuses_the_tick() -> anyhow::Result<()> {
    init();

    let mut ids = IdGenerator::new();
    let mut mtm = mtm1_with_target(&mut ids)?;
    let trace_buffer = traced(
        &ids,
        TraceBufferConfig {
            max_length: 4,
            hard_limit: Some(4),
        },
    );
    mtm.set_trace_buffer(trace_buffer.clone());

    // first tick fills three of four slots; the second is cut off after
    // the cycle trace
    trace_buffer.lock().tick(1)?;
    assert_eq!(mtm.tick(1).error, TickError::Success);

    trace_buffer.lock().tick(2)?;
    let result = mtm.tick(2);
    assert_eq!(result.error, TickError::TraceOverflowAfterCommit);
    assert!(result.sync);
    assert_eq!(mtm.register(Register::Pc), 1);

    // drop the partial tick, make room and retry
    let traces = trace_buffer.lock().discard(None).collect::<Vec<_>>();
    for trace in traces.iter().rev() {
        assert!(mtm.undo(trace));
    }
    assert_eq!(mtm.instruction_count(), 1);

    let recorder = TraceRecorder::new();
    {
        let mut buffer = trace_buffer.lock();
        buffer.register_commit_hook(recorder.clone());
        buffer.commit(CommitStrategy::All);
    }
    assert_eq!(recorder.len(), 3);

    trace_buffer.lock().tick(2)?;
    assert_eq!(mtm.tick(2).error, TickError::Success);
    assert_eq!(mtm.register(Register::Pc), 2);
    Ok(())
}

#[test]
fn refused_cycle_trace_changes_nothing() -> anyhow::Result<()> {
    let mut ids = IdGenerator::new();
    let mut mtm = mtm1_with_target(&mut ids)?;
    let trace_buffer = traced(
        &ids,
        TraceBufferConfig {
            max_length: 1,
            hard_limit: Some(0),
        },
    );
    mtm.set_trace_buffer(trace_buffer.clone());

    trace_buffer.lock().tick(1)?;
    let result = mtm.tick(1);
    assert_eq!(result, TickResult::trace_overflow());
    assert!(!result.pause);
    assert_eq!(mtm.register(Register::Pc), 0);
    assert_eq!(mtm.instruction_count(), 0);
    assert!(trace_buffer.lock().pending().is_empty());
    Ok(())
}

#[test]
fn mtm2_echoes_input() -> anyhow::Result<()> {
    init();

    let mut ids = IdGenerator::new();
    let pod = DevicePod::new("mtm", "/mtm", ids.next_id(), "mtm");
    let mut mtm = Mtm2::new(pod, "cpu", &mut ids)?;
    let pod = DevicePod::new("ram", "/ram", ids.next_id(), "memory");
    let ram = DenseMemory::new(pod, 0, 0xffff, 0)?;
    let target: SharedTarget = Arc::new(Mutex::new(ram));
    mtm.set_target(target);

    assert_eq!(mtm.tick(1).error, TickError::NoMmInput);

    assert!(mtm.cin_mut().push_all(0, b"hi"));
    assert_eq!(mtm.tick(2).error, TickError::Success);
    assert_eq!(mtm.tick(3).error, TickError::Success);
    assert_eq!(mtm.tick(4).error, TickError::NoMmInput);

    let output = mtm
        .cout()
        .bytes(0)
        .map(|bytes| bytes.collect::<Vec<u8>>())
        .unwrap_or_default();
    assert_eq!(output, b"hi".to_vec());
    Ok(())
}

#[test]
fn clocks_can_be_replaced() -> anyhow::Result<()> {
    let mut ids = IdGenerator::new();
    let mut mtm = mtm0(&mut ids)?;
    assert_eq!(mtm.clock_name(), "cpu");
    assert!(!mtm.clock().is_enabled());

    mtm.set_clock(Clock::new("fast", 2)?);
    assert_eq!(mtm.clock_name(), "fast");
    assert_eq!(mtm.clock().interval(), 2);
    Ok(())
}

#[test]
fn unmapped_fetch_terminates() -> anyhow::Result<()> {
    init();

    let mut ids = IdGenerator::new();
    let mut mtm = mtm1_with_target(&mut ids)?;
    let ram = mtm.target().cloned();

    let pod = DevicePod::new("bus", "/bus", ids.next_id(), "bus");
    let mut bus = SimpleBus::new(pod, 0, 0xff)?;
    if let Some(ram) = ram {
        bus.push_region(0, 3, ram)?;
    }
    let bus: SharedTarget = Arc::new(Mutex::new(bus));
    mtm.set_target(bus);

    let trace_buffer = traced(&ids, TraceBufferConfig::default());
    mtm.set_trace_buffer(trace_buffer.clone());

    for tick in 1..=2 {
        trace_buffer.lock().tick(tick)?;
        assert_eq!(mtm.tick(tick).error, TickError::Success);
    }
    assert_eq!(mtm.register(Register::A), 0x0304);

    // the word at PC 3 runs off the end of the ram into the hole
    trace_buffer.lock().tick(3)?;
    let result = mtm.tick(3);
    assert_eq!(result.error, TickError::Terminate);
    assert!(result.pause);
    assert_eq!(mtm.register(Register::Pc), 3);
    assert_eq!(mtm.register(Register::A), 0x0304);

    // the aborted tick is staged as a unit and can be discarded
    let traces = trace_buffer.lock().discard(Some(3)).collect::<Vec<_>>();
    assert_eq!(traces.len(), 2);
    for trace in traces.iter().rev() {
        assert!(mtm.undo(trace));
    }
    assert_eq!(mtm.register(Register::Pc), 2);
    Ok(())
}

#[test]
fn shrunk_register_bank_reads_zero() -> anyhow::Result<()> {
    let mut ids = IdGenerator::new();
    let mut mtm = mtm0(&mut ids)?;
    mtm.set_register(Register::A, 0xbeef);
    assert_eq!(mtm.register(Register::A), 0xbeef);

    mtm.registers_mut().resize(1, None)?;
    assert_eq!(mtm.register(Register::A), 0);
    assert_eq!(mtm.tick(1).error, TickError::Success);
    assert_eq!(mtm.register(Register::Pc), 1);
    Ok(())
}
