//! JPEG encoding benchmarks
//!
//! Run with: cargo bench --bench encode

use bytes::Bytes;
use camera_relay::capture::{Frame, LatestFrameBuffer, PixelFormat};
use camera_relay::encoding::StreamEncoder;
use camera_relay::stream::multipart_part;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn gradient(width: u32, height: u32, format: PixelFormat) -> Frame {
    let channels = format.channels();
    let mut pixels = Vec::with_capacity(width as usize * height as usize * channels);
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                pixels.push(((x + y * 3 + c as u32 * 40) % 256) as u8);
            }
        }
    }
    Frame::new(Bytes::from(pixels), width, height, format, 1)
}

/// Benchmark: encode at common camera resolutions
fn bench_encode_resolution(c: &mut Criterion) {
    let encoder = StreamEncoder::new();
    let mut group = c.benchmark_group("encode_rgb");

    for (width, height) in [(320, 240), (640, 480), (1280, 720)] {
        let frame = gradient(width, height, PixelFormat::Rgb8);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &frame,
            |b, frame| b.iter(|| black_box(encoder.encode(frame, 85).unwrap())),
        );
    }
    group.finish();
}

/// Benchmark: encode quality sweep at 640x480
fn bench_encode_quality(c: &mut Criterion) {
    let encoder = StreamEncoder::new();
    let frame = gradient(640, 480, PixelFormat::Rgb8);
    let mut group = c.benchmark_group("encode_quality");

    for quality in [50u8, 85, 95] {
        group.bench_with_input(BenchmarkId::from_parameter(quality), &quality, |b, &q| {
            b.iter(|| black_box(encoder.encode(&frame, q).unwrap()))
        });
    }
    group.finish();
}

/// Benchmark: grayscale vs color
fn bench_encode_gray(c: &mut Criterion) {
    let encoder = StreamEncoder::new();
    let frame = gradient(640, 480, PixelFormat::Gray8);

    c.bench_function("encode_gray_640x480", |b| {
        b.iter(|| black_box(encoder.encode(&frame, 85).unwrap()))
    });
}

/// Benchmark: buffer read plus multipart framing per viewer tick
fn bench_viewer_tick(c: &mut Criterion) {
    let encoder = StreamEncoder::new();
    let buffer = LatestFrameBuffer::new();
    buffer.write(gradient(640, 480, PixelFormat::Rgb8));

    c.bench_function("viewer_tick_640x480", |b| {
        b.iter(|| {
            let frame = buffer.read_latest().unwrap();
            let chunk = encoder.encode(&frame, 85).unwrap();
            black_box(multipart_part(&chunk))
        })
    });
}

criterion_group!(
    benches,
    bench_encode_resolution,
    bench_encode_quality,
    bench_encode_gray,
    bench_viewer_tick
);
criterion_main!(benches);
