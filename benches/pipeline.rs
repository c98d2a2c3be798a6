//! Hot-path benchmarks: still encoding, queue churn under pressure, and
//! rate-controller bookkeeping.

use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use pageveil::capture::{GeometrySampler, Priority, Sample, SampleImage};
use pageveil::control::RateController;
use pageveil::profile::RateBand;
use pageveil::queue::ProcessingQueue;
use pageveil::surface::{ElementId, ElementKind, MockPage, RectPx};

fn tiny_sample(sequence: u64, priority: Priority) -> Sample {
    Sample::new(
        sequence,
        ElementId::new(sequence % 16),
        ElementKind::Image,
        priority,
        SampleImage {
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 1,
            height: 1,
        },
        Instant::now(),
    )
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_sample");

    let page = MockPage::new("bench.example");
    let small = page.add_image(RectPx::new(0.0, 0.0, 320.0, 240.0), "https://cdn/small.jpg");
    let large = page.add_image(RectPx::new(0.0, 0.0, 640.0, 480.0), "https://cdn/large.jpg");
    page.set_natural_size(large, 1920, 1440);

    let mut sampler = GeometrySampler::new(640, 80);

    group.bench_function("within_bounds", |b| {
        b.iter(|| {
            sampler
                .sample(
                    &page,
                    black_box(small),
                    ElementKind::Image,
                    Priority::Normal,
                    Instant::now(),
                )
                .unwrap()
        })
    });

    group.bench_function("resized_to_bounds", |b| {
        b.iter(|| {
            sampler
                .sample(
                    &page,
                    black_box(large),
                    ElementKind::Image,
                    Priority::Normal,
                    Instant::now(),
                )
                .unwrap()
        })
    });

    group.finish();
}

fn bench_queue(c: &mut Criterion) {
    c.bench_function("queue_churn_at_capacity", |b| {
        b.iter_batched(
            || {
                let mut queue = ProcessingQueue::new(10);
                for seq in 0..10 {
                    queue.enqueue(tiny_sample(seq, Priority::Normal));
                }
                queue
            },
            |mut queue| {
                for seq in 10..42 {
                    let priority = if seq % 4 == 0 {
                        Priority::High
                    } else {
                        Priority::Normal
                    };
                    black_box(queue.enqueue(tiny_sample(seq, priority)));
                }
                while let Some(sample) = queue.dequeue() {
                    black_box(sample);
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_rate(c: &mut Criterion) {
    c.bench_function("rate_record_latency", |b| {
        let mut controller = RateController::new(RateBand {
            min_fps: 0.2,
            max_fps: 4.0,
            initial_fps: 1.0,
        });
        let mut now = Instant::now();
        b.iter(|| {
            now += Duration::from_millis(200);
            controller.record_latency(black_box(Duration::from_millis(350)), now);
            black_box(controller.current_interval())
        })
    });
}

criterion_group!(benches, bench_encode, bench_queue, bench_rate);
criterion_main!(benches);
