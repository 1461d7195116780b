use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use syncbell::service::Opcode;
use syncbell::wire::{Marshal, Parcel, ParcelReader};
use syncbell::{
    ChangeNotice, ChangeOp, ChangedData, EventLoop, ObserverRegistry, Origin, ScalarValue,
    SubscribeMode, INTERFACE_TOKEN,
};

fn sample_changes() -> (Vec<ChangedData>, Origin) {
    // 8 inserted and 8 updated keys across one table, a typical batch.
    let mut data = ChangedData::new("orders");
    for i in 0..8 {
        data.push_key(ChangeOp::Insert, vec![ScalarValue::Int64(i)]);
        data.push_key(
            ChangeOp::Update,
            vec![ScalarValue::Text(format!("key-{i}"))],
        );
    }
    (
        vec![data],
        Origin::Remote {
            device: "bench-device".to_string(),
        },
    )
}

fn encode_details(changes: &[ChangedData], origin: &Origin) -> Parcel {
    let mut parcel = Parcel::new();
    parcel.write_string("orders");
    parcel.write_u32(changes.len() as u32);
    for change in changes {
        change.marshal(&mut parcel);
    }
    origin.marshal(&mut parcel);
    parcel
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));

    group.bench_function("encode_detailed_change", |b| {
        let (changes, origin) = sample_changes();
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                black_box(encode_details(&changes, &origin).into_bytes());
            }
            start.elapsed()
        })
    });

    group.bench_function("decode_detailed_change", |b| {
        let (changes, origin) = sample_changes();
        let bytes = encode_details(&changes, &origin).into_bytes();
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let mut reader = ParcelReader::new(&bytes);
                let store = String::unmarshal(&mut reader).unwrap();
                let changes = Vec::<ChangedData>::unmarshal(&mut reader).unwrap();
                let origin = Origin::unmarshal(&mut reader).unwrap();
                black_box((store, changes, origin));
            }
            start.elapsed()
        })
    });

    group.finish();
}

fn bench_stub_to_consumer(c: &mut Criterion) {
    let mut group = c.benchmark_group("delivery");
    group.throughput(Throughput::Elements(1));

    group.bench_function("stub_to_consumer", |b| {
        b.iter_custom(|iters| {
            // Fresh host per sample so queue state does not leak between samples.
            let registry = Arc::new(ObserverRegistry::new());
            let event_loop = EventLoop::new();
            let delivered = Arc::new(AtomicUsize::new(0));
            let sink = Arc::clone(&delivered);
            let _handle = registry
                .subscribe(
                    "orders",
                    SubscribeMode::Remote,
                    Arc::new(move |_: ChangeNotice| {
                        sink.fetch_add(1, Ordering::Relaxed);
                    }),
                    &event_loop.handle(),
                )
                .unwrap();
            let stub = registry.stub();

            let (changes, origin) = sample_changes();
            let mut parcel = Parcel::new();
            parcel.write_string(INTERFACE_TOKEN);
            parcel.write_string("orders");
            parcel.write_u32(changes.len() as u32);
            for change in &changes {
                change.marshal(&mut parcel);
            }
            origin.marshal(&mut parcel);
            let request = parcel.into_bytes();

            let start = Instant::now();
            for _ in 0..iters {
                let _ = stub.on_request(Opcode::DataDetails.code(), &request);
                event_loop.run_until_idle();
            }
            let elapsed = start.elapsed();

            assert_eq!(delivered.load(Ordering::Relaxed) as u64, iters);
            elapsed
        })
    });

    group.finish();
}

criterion_group!(delivery, bench_codec, bench_stub_to_consumer);
criterion_main!(delivery);
