use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tether_core::buffer::TextBuffer;
use tether_core::position::{offset_to_position, position_to_offset, Position};

fn sample_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("line {i}: the quick brown fox jumps over the lazy dog"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Position Translation");
    group.throughput(Throughput::Elements(1));

    let text = sample_text(1_000);
    let mid_offset = text.chars().count() / 2;
    let mid_pos = offset_to_position(&text, mid_offset).unwrap();

    group.bench_function("offset_to_position_1k_lines", |b| {
        b.iter(|| {
            black_box(offset_to_position(black_box(&text), black_box(mid_offset)).unwrap());
        })
    });

    group.bench_function("position_to_offset_1k_lines", |b| {
        b.iter(|| {
            black_box(position_to_offset(black_box(&text), black_box(mid_pos)).unwrap());
        })
    });

    group.finish();
}

fn bench_buffer_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("Buffer Edits");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert_at_line_start", |b| {
        let buffer = TextBuffer::with_value(&sample_text(100));
        b.iter(|| {
            buffer
                .insert_at(black_box(Position::new(50, 0)), black_box("x"))
                .unwrap();
        })
    });

    group.bench_function("delete_single_char", |b| {
        let buffer = TextBuffer::with_value(&sample_text(100));
        b.iter(|| {
            // Insert then delete so the buffer does not drain.
            buffer.insert_at(Position::new(50, 0), "x").unwrap();
            buffer
                .delete_range(black_box(Position::new(50, 0)), black_box(Position::new(50, 1)))
                .unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_translation, bench_buffer_edits);
criterion_main!(benches);
