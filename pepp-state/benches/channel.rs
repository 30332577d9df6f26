use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pepp_state::{Channel, DenseMemory, DevicePod, Mmi, Operation, Target, Traceable};
use pepp_trace::TraceBuffer;

fn criterion_channel_append_next(c: &mut Criterion) {
    c.bench_function("Channel::append + Endpoint::next (1024)", |b| {
        b.iter(|| {
            let mut channel = Channel::new(0);
            let mut writer = channel.endpoint();
            let mut reader = channel.endpoint();
            for value in 0..1024u32 {
                writer.append(&mut channel, value as u8);
            }
            while let Some(event) = reader.next(&channel) {
                black_box(event.value());
            }
        })
    });
}

fn criterion_channel_unwrite(c: &mut Criterion) {
    c.bench_function("Endpoint::unwrite (256)", |b| {
        b.iter(|| {
            let mut channel = Channel::new(0);
            let mut writer = channel.endpoint();
            for value in 0..256u32 {
                writer.append(&mut channel, value as u8);
            }
            while writer.unwrite(&mut channel).is_some() {}
            black_box(channel.current_value());
        })
    });
}

fn criterion_mmi_read(c: &mut Criterion) {
    c.bench_function("Mmi::read traced (1024)", |b| {
        b.iter(|| -> Result<(), pepp_state::Error> {
            let mut mmi = Mmi::new(DevicePod::new("cin", "/cin", 0, "memory"), 0, 0, 0)?;
            let tb = pepp_trace::shared(TraceBuffer::new());
            tb.lock().trace_device(0, true);
            mmi.set_trace_buffer(tb.clone());

            mmi.push_all(0, &[0x55; 1024]);
            for _ in 0..1024 {
                black_box(mmi.read(0, 1, Operation::standard()));
            }
            tb.lock().commit(pepp_trace::CommitStrategy::All);
            Ok(())
        })
    });
}

fn criterion_dense_write(c: &mut Criterion) {
    c.bench_function("DenseMemory::write traced (1024)", |b| {
        b.iter(|| -> Result<(), pepp_state::Error> {
            let pod = DevicePod::new("ram", "/ram", 0, "memory");
            let mut ram = DenseMemory::new(pod, 0, 0xffff, 0)?;
            let tb = pepp_trace::shared(TraceBuffer::new());
            tb.lock().trace_device(0, true);
            ram.set_trace_buffer(tb.clone());

            for address in 0..1024u64 {
                black_box(ram.write(address * 2, &[0x12, 0x34], Operation::standard()));
            }
            Ok(())
        })
    });
}

criterion_group!(
    benches,
    criterion_channel_append_next,
    criterion_channel_unwrite,
    criterion_mmi_read,
    criterion_dense_write
);
criterion_main!(benches);
