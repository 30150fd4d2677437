//! Benchmarks for the edit patterns a text view produces
//!
//! - Typing one char at a time at a fixed spot
//! - Replacing a word with many spans attached
//! - Span range queries as a renderer would issue them

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use spannable_buffer::{Span, SpanFilter, SpanFlags, SpanRef, SpannableBuffer};

#[derive(Debug)]
struct Style;
impl Span for Style {}

/// A buffer of `len` chars with a span every 10 chars.
fn styled_buffer(len: usize) -> SpannableBuffer {
    let mut buf = SpannableBuffer::from_text(&"lorem ipsum ".repeat(len / 12 + 1)[..len]);
    for start in (0..len.saturating_sub(5)).step_by(10) {
        // Offsets are in range by construction.
        let _ = buf.set_span(SpanRef::new(Style), start, start + 5, SpanFlags::EXCLUSIVE_EXCLUSIVE);
    }
    buf
}

fn bench_typing(c: &mut Criterion) {
    let mut group = c.benchmark_group("typing");

    for size in [1_000, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || styled_buffer(size),
                |mut buf| {
                    let mid = size / 2;
                    for i in 0..100 {
                        let _ = buf.insert(mid + i, "x");
                    }
                    std::hint::black_box(buf.len());
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_replace_word(c: &mut Criterion) {
    let mut group = c.benchmark_group("replace_word");

    for size in [1_000, 10_000].iter() {
        let mut buf = styled_buffer(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let at = size / 3;
                let _ = buf.replace(at, at + 5, "dolor");
                std::hint::black_box(buf.span_count());
            });
        });
    }
    group.finish();
}

fn bench_span_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("span_queries");

    for size in [1_000, 10_000, 100_000].iter() {
        let buf = styled_buffer(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                // One screenful of text.
                let at = size / 2;
                let end = at + 2_000usize.min(size - at);
                std::hint::black_box(buf.get_spans(at, end, &SpanFilter::All));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_typing, bench_replace_word, bench_span_queries);
criterion_main!(benches);
