use pepp_state::{DevicePod, IdGenerator, Mmi, Mmo, Operation, Target, Traceable};
use pepp_trace::{SharedTraceBuffer, Trace};

use super::{impl_mtm_common, MtmCore, Outcome};
use crate::sim::TickResult;
use crate::Error;

/// increments PC, then copies one byte from `cin` to `cout`
///
/// both ports are owned by the machine and share its trace buffer. the
/// machine still requires a target before it will tick.
pub struct Mtm2 {
    core: MtmCore,
    cin: Mmi,
    cout: Mmo,
}

impl Mtm2 {
    pub fn new(
        pod: DevicePod,
        clock_name: impl Into<String>,
        ids: &mut IdGenerator,
    ) -> Result<Self, Error> {
        let core = MtmCore::new(pod, clock_name.into(), ids)?;
        let cin = Mmi::new(core.pod.child("cin", ids.next_id(), "mmi"), 0, 0, 0)?;
        let cout = Mmo::new(core.pod.child("cout", ids.next_id(), "mmo"), 0, 0, 0)?;
        Ok(Self { core, cin, cout })
    }

    pub fn cin(&self) -> &Mmi {
        &self.cin
    }

    pub fn cin_mut(&mut self) -> &mut Mmi {
        &mut self.cin
    }

    pub fn cout(&self) -> &Mmo {
        &self.cout
    }

    pub fn cout_mut(&mut self) -> &mut Mmo {
        &mut self.cout
    }

    fn step(&mut self) -> Result<Outcome, TickResult> {
        let mut outcome = Outcome::new(self.core.begin(true)?);
        self.core.increment_pc(&mut outcome)?;

        let result = self.cin.read(0, 1, Operation::standard());
        let data = self.core.accept(&mut outcome, result)?;

        let status = self.cout.write(0, &data, Operation::standard());
        self.core.stage();
        self.core.complete(&mut outcome, status)?;

        Ok(outcome)
    }

    fn set_trace_buffer_all(&mut self, trace_buffer: SharedTraceBuffer) {
        self.cin.set_trace_buffer(trace_buffer.clone());
        self.cout.set_trace_buffer(trace_buffer.clone());
        self.core.set_trace_buffer(trace_buffer);
    }

    fn replay(&mut self, trace: &Trace, forward: bool) -> bool {
        if forward {
            self.core.replay(trace, true) || self.cin.redo(trace) || self.cout.redo(trace)
        } else {
            self.core.replay(trace, false) || self.cin.undo(trace) || self.cout.undo(trace)
        }
    }

    fn reset_all(&mut self) {
        self.core.reset();
    }
}

impl_mtm_common!(Mtm2);

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use pepp_state::{DenseMemory, Device, SharedTarget};
    use pepp_trace::TraceBuffer;

    use super::*;
    use crate::mtm::Register;
    use crate::sim::{Clocked, Initiator, TickError};

    fn machine() -> Mtm2 {
        let mut ids = IdGenerator::new();
        let pod = DevicePod::new("cpu", "/cpu", ids.next_id(), "mtm");
        let mut mtm = Mtm2::new(pod, "cpu", &mut ids).unwrap();

        let pod = DevicePod::new("ram", "/ram", ids.next_id(), "memory");
        let ram = DenseMemory::new(pod, 0, 0xff, 0).unwrap();
        let target: SharedTarget = Arc::new(Mutex::new(ram));
        mtm.set_target(target);
        mtm
    }

    fn output(mtm: &Mtm2) -> Vec<u8> {
        mtm.cout().bytes(0).map(|bytes| bytes.collect()).unwrap_or_default()
    }

    #[test]
    fn child_names() {
        let mtm = machine();
        assert_eq!(mtm.registers().full_name(), "/cpu.regbank");
        assert_eq!(mtm.cin().full_name(), "/cpu.cin");
        assert_eq!(mtm.cout().full_name(), "/cpu.cout");
        assert_eq!(mtm.cout().device_id(), 3);
    }

    #[test]
    fn copies_input_to_output() {
        let mut mtm = machine();
        assert!(mtm.cin_mut().push_all(0, &[0x41, 0x42]));

        assert_eq!(mtm.tick(1).error, TickError::Success);
        assert_eq!(mtm.tick(2).error, TickError::Success);
        assert_eq!(output(&mtm), vec![0x41, 0x42]);
        assert_eq!(mtm.register(Register::Pc), 2);
    }

    #[test]
    fn retries_after_input_arrives() {
        let mut mtm = machine();
        let trace_buffer = pepp_trace::shared(TraceBuffer::new());
        {
            let mut buffer = trace_buffer.lock();
            for id in 0..4 {
                buffer.trace_device(id, true);
            }
        }
        mtm.set_trace_buffer(trace_buffer.clone());

        trace_buffer.lock().tick(1).unwrap();
        let result = mtm.tick(1);
        assert_eq!(result.error, TickError::NoMmInput);
        assert!(result.pause);

        // roll back the partial tick, then supply input and try again
        let traces = trace_buffer.lock().discard(None).collect::<Vec<_>>();
        for trace in traces.iter().rev() {
            assert!(mtm.undo(trace));
        }
        assert_eq!(mtm.register(Register::Pc), 0);
        assert_eq!(mtm.instruction_count(), 0);

        assert!(mtm.cin_mut().push(0, 0x7f));
        assert_eq!(mtm.tick(1).error, TickError::Success);
        assert_eq!(output(&mtm), vec![0x7f]);
        assert_eq!(mtm.register(Register::Pc), 1);
    }

    #[test]
    fn undo_restores_ports() {
        let mut mtm = machine();
        let trace_buffer = pepp_trace::shared(TraceBuffer::new());
        {
            let mut buffer = trace_buffer.lock();
            for id in 0..4 {
                buffer.trace_device(id, true);
            }
        }
        mtm.set_trace_buffer(trace_buffer.clone());
        assert!(mtm.cin_mut().push_all(0, &[1, 2]));

        trace_buffer.lock().tick(1).unwrap();
        mtm.tick(1);
        trace_buffer.lock().tick(2).unwrap();
        mtm.tick(2);
        assert_eq!(output(&mtm), vec![1, 2]);

        let traces = trace_buffer.lock().discard(Some(2)).collect::<Vec<_>>();
        for trace in traces.iter().rev() {
            assert!(mtm.undo(trace));
        }
        assert_eq!(output(&mtm), vec![1]);
        assert_eq!(mtm.cin().remaining(0), 1);
        assert_eq!(mtm.instruction_count(), 1);
    }
}
