// Run with: cargo bench --bench fill_surface

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use sgdma_framebuffer::geometry::{DisplayConfig, Geometry};
use sgdma_framebuffer::surface::Surface;
use sgdma_framebuffer::Color;
use std::hint::black_box;
use std::time::Duration;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(100)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3))
        .confidence_level(0.95)
        .significance_level(0.05)
}

fn fill_surface(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_surface");
    group.throughput(Throughput::Elements(u64::from(WIDTH * HEIGHT)));

    for bpp in [16u32, 32] {
        let geometry = Geometry::resolve(&DisplayConfig::new(WIDTH, HEIGHT, bpp)).unwrap();
        let mut buf = vec![0u8; geometry.pixel_len()];

        group.bench_function(format!("full_screen_{bpp}bpp"), |b| {
            let mut surface = unsafe { Surface::from_raw(buf.as_mut_ptr(), geometry) };
            b.iter(|| {
                Rectangle::new(Point::zero(), Size::new(WIDTH, HEIGHT))
                    .into_styled(PrimitiveStyle::with_fill(black_box(Color::new(
                        128, 64, 192,
                    ))))
                    .draw(black_box(&mut surface))
                    .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(name = benches; config = configure_criterion(); targets = fill_surface);
criterion_main!(benches);
