use criterion::{criterion_group, criterion_main, Criterion};
use edgefirst_sensor::{
    format::PixFormat,
    image::Rect,
    resolution::FrameSize,
    sizing::{auto_crop, check_fits},
};
use std::hint::black_box;

pub fn benchmark_auto_crop(c: &mut Criterion) {
    let fmts = [PixFormat::Grayscale, PixFormat::Rgb565, PixFormat::Jpeg];
    let sizes = [FrameSize::Qvga, FrameSize::Vga, FrameSize::Hd, FrameSize::Uxga];
    let budget = 614_400;

    for fmt in fmts.iter() {
        let mut group = c.benchmark_group(format!("auto_crop/{}", fmt));
        for size in sizes.iter() {
            let window = Rect::full(size.width(), size.height());
            group.bench_with_input(size.name(), &window, |b, window| {
                b.iter(|| auto_crop(*fmt, *size, black_box(*window), budget, 4))
            });
        }
    }
}

pub fn benchmark_check_fits(c: &mut Criterion) {
    let window = Rect::full(1600, 1200);
    c.bench_function("check_fits/UXGA", |b| {
        b.iter(|| check_fits(PixFormat::Rgb565, FrameSize::Uxga, black_box(&window), 614_400))
    });
}

criterion_group!(benches, benchmark_auto_crop, benchmark_check_fits);
criterion_main!(benches);
