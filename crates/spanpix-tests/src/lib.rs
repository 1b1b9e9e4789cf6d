//! Integration tests for spanpix crates.
//!
//! End-to-end checks that run fills through the public API: format
//! conversion, exact copies, sampling, partitioned dispatch and backend
//! substitution.

#[cfg(test)]
mod tests {
    use spanpix_core::{
        Channel, Color, FormatRegistry, PixelFormat, PrecisionTier, RasterConfig, Span, Surface,
        TextureView,
    };
    use spanpix_math::Transform;
    use spanpix_ops::backend::{Backend, CpuCaps};
    use spanpix_ops::dispatch::{InlinePool, WorkerPool};
    use spanpix_ops::gradient::{GradientSampler, GradientTable};
    use spanpix_ops::{CompositionMode, Compositor, Gradient, Paint, Spread, Texture, WrapMode};

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Valid premultiplied pixels: color never exceeds alpha.
    fn canonical_pixels<C: Channel>(n: usize, seed: usize) -> Vec<[C; 4]> {
        (0..n)
            .map(|i| {
                let k = i * 7 + seed;
                let a = ((k * 37) % 256) as u8;
                let c = |m: usize| (((k * m) % 256) as u8).min(a);
                [C::from_u8(c(91)), C::from_u8(c(53)), C::from_u8(c(13)), C::from_u8(a)]
            })
            .collect()
    }

    fn store_rows<C: Channel>(
        format: PixelFormat,
        bytes: &mut [u8],
        width: usize,
        height: usize,
        seed: usize,
    ) {
        let stride = format.bit_width().row_bytes(width);
        let d = FormatRegistry::scalar().descriptor(format);
        for y in 0..height {
            let px = canonical_pixels::<C>(width, seed + y * 1000);
            d.store(&mut bytes[y * stride..(y + 1) * stride], 0, &px);
        }
    }

    /// A buffer of `format` holding only values its store routine produces.
    fn format_buffer(format: PixelFormat, width: usize, height: usize, seed: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; format.bit_width().row_bytes(width) * height];
        match format.lossless_tier() {
            PrecisionTier::U8 => store_rows::<u8>(format, &mut bytes, width, height, seed),
            PrecisionTier::U16 => store_rows::<u16>(format, &mut bytes, width, height, seed),
            PrecisionTier::F32 => store_rows::<f32>(format, &mut bytes, width, height, seed),
        }
        bytes
    }

    fn round_trip_at<C: Channel>(format: PixelFormat, bytes: &[u8], width: usize) -> Vec<u8> {
        let stride = format.bit_width().row_bytes(width);
        let d = FormatRegistry::scalar().descriptor(format);
        let mut out = vec![0u8; bytes.len()];
        let mut px = vec![[C::ZERO; 4]; width];
        for (src, dst) in bytes.chunks_exact(stride).zip(out.chunks_exact_mut(stride)) {
            d.fetch(src, 0, &mut px);
            d.store(dst, 0, &px);
        }
        out
    }

    fn round_trip(format: PixelFormat, bytes: &[u8], width: usize) -> Vec<u8> {
        match format.lossless_tier() {
            PrecisionTier::U8 => round_trip_at::<u8>(format, bytes, width),
            PrecisionTier::U16 => round_trip_at::<u16>(format, bytes, width),
            PrecisionTier::F32 => round_trip_at::<f32>(format, bytes, width),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_with(
        compositor: &Compositor<'_>,
        bytes: &mut [u8],
        format: PixelFormat,
        width: u32,
        height: u32,
        spans: &[Span],
        paint: &Paint<'_>,
        transform: &Transform,
        mode: CompositionMode,
    ) {
        let stride = format.bit_width().row_bytes(width as usize);
        let mut surface = Surface::new(bytes, width, height, stride, format).unwrap();
        compositor.try_fill(&mut surface, spans, paint, transform, mode).unwrap();
    }

    fn full_rows(width: u32, height: u32) -> Vec<Span> {
        (0..height as i32).map(|y| Span::full(0, y, width)).collect()
    }

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// 8x8 opaque checkerboard with a translucent corner, `Argb32Premultiplied`.
    fn checker() -> Vec<u8> {
        let mut bytes = Vec::new();
        for y in 0..8u32 {
            for x in 0..8u32 {
                let argb: u32 = match (x < 2 && y < 2, (x / 2 + y / 2) % 2 == 0) {
                    (true, _) => 0x8040_2010,
                    (_, true) => 0xff10_2030,
                    _ => 0xffd0_b090,
                };
                bytes.extend_from_slice(&argb.to_ne_bytes());
            }
        }
        bytes
    }

    fn checker_view(bytes: &[u8]) -> TextureView<'_> {
        TextureView::new(bytes, 8, 8, 32, PixelFormat::Argb32Premultiplied).unwrap()
    }

    /// Row-sorted spans of varied position, length and coverage.
    fn ragged_spans(height: i32) -> Vec<Span> {
        let mut spans = Vec::new();
        for y in 0..height {
            let x = (y * 5) % 13 - 4;
            let len = 20 + (y % 17) as u32;
            spans.push(Span::new(x, y, len, ((y * 23) % 256) as u8));
            spans.push(Span::new(x + len as i32 + 3, y, 9, 255));
        }
        spans
    }

    // ========================================================================
    // Formats
    // ========================================================================

    #[test]
    fn test_every_format_round_trips_at_lossless_tier() {
        for &format in PixelFormat::ALL {
            let bytes = format_buffer(format, 37, 3, 0);
            let back = round_trip(format, &bytes, 37);
            if format == PixelFormat::Rgba32F {
                for (a, b) in words(&bytes).iter().zip(words(&back).iter()) {
                    let (a, b) = (f32::from_bits(*a), f32::from_bits(*b));
                    approx::assert_relative_eq!(a, b, max_relative = 1e-5);
                }
            } else {
                assert_eq!(back, bytes, "{format}");
            }
        }
    }

    #[test]
    fn test_source_full_coverage_copies_exactly() {
        let c = Compositor::new();
        for &format in PixelFormat::ALL {
            let texture = format_buffer(format, 37, 3, 1);
            let mut dest = format_buffer(format, 37, 3, 2);
            let stride = format.bit_width().row_bytes(37);
            let view = TextureView::new(&texture, 37, 3, stride, format).unwrap();
            fill_with(
                &c,
                &mut dest,
                format,
                37,
                3,
                &full_rows(37, 3),
                &Paint::Texture(Texture::new(view)),
                &Transform::IDENTITY,
                CompositionMode::Source,
            );
            assert_eq!(dest, texture, "{format}");
        }
    }

    /// `initial` with every row overwritten by the solid or gradient
    /// `paint` stored at tier `C`.
    fn replaced_at<C: Channel>(
        format: PixelFormat,
        initial: &[u8],
        width: usize,
        paint: &Paint<'_>,
    ) -> Vec<u8> {
        let stride = format.bit_width().row_bytes(width);
        let d = FormatRegistry::scalar().descriptor(format);
        let gradient = match paint {
            Paint::Gradient(g) => {
                let inverse = Transform::IDENTITY.inverse().unwrap();
                Some(GradientSampler::new(g, inverse).unwrap())
            }
            _ => None,
        };
        let mut out = initial.to_vec();
        let mut px = vec![[C::ZERO; 4]; width];
        for (y, row) in out.chunks_exact_mut(stride).enumerate() {
            match (paint, &gradient) {
                (Paint::Solid(color), _) => px.fill(color.premultiplied()),
                (_, Some(s)) => s.fetch(0, y as i32, &mut px),
                _ => unreachable!("only solid and gradient paints"),
            }
            d.store(row, 0, &px);
        }
        out
    }

    /// What a replacing fill of `paint` must leave in a `format` buffer.
    fn replaced(format: PixelFormat, initial: &[u8], width: usize, paint: &Paint<'_>) -> Vec<u8> {
        match format.native_tier().max(paint.precision(format)) {
            PrecisionTier::U8 => replaced_at::<u8>(format, initial, width, paint),
            PrecisionTier::U16 => replaced_at::<u16>(format, initial, width, paint),
            PrecisionTier::F32 => replaced_at::<f32>(format, initial, width, paint),
        }
    }

    #[test]
    fn test_source_full_coverage_replaces_with_paint() {
        let scalar = Backend::scalar();
        let c = Compositor::new().with_backend(&scalar);
        let (width, height) = (24u32, 3u32);
        let paints = [
            Paint::Solid(Color::from_rgba8(200, 100, 50, 180)),
            Paint::Solid(Color::from_rgba16(50000, 20000, 1000, 40000)),
            Paint::Solid(Color::from_rgba_f32(0.9, 0.3, 0.6, 0.7)),
            Paint::Gradient(
                Gradient::linear((0.0, 0.0), (24.0, 3.0))
                    .with_stop(0.0, Color::from_rgba8(255, 0, 0, 255))
                    .with_stop(1.0, Color::from_rgba8(0, 80, 255, 96)),
            ),
            Paint::Gradient(
                Gradient::radial((12.0, 1.5), 10.0)
                    .with_stop(0.0, Color::from_rgba16(65535, 65535, 0, 65535))
                    .with_stop(1.0, Color::from_rgba16(0, 4000, 30000, 30000))
                    .with_spread(Spread::Reflect),
            ),
        ];
        for &format in PixelFormat::ALL {
            let initial = format_buffer(format, width as usize, height as usize, 5);
            for paint in &paints {
                let mut dest = initial.clone();
                fill_with(
                    &c,
                    &mut dest,
                    format,
                    width,
                    height,
                    &full_rows(width, height),
                    paint,
                    &Transform::IDENTITY,
                    CompositionMode::Source,
                );
                let expected = replaced(format, &initial, width as usize, paint);
                assert_eq!(dest, expected, "{format} {}", paint.kind());
            }
        }
    }

    #[test]
    fn test_zero_coverage_leaves_destination() {
        let c = Compositor::new();
        let spans = [Span::new(0, 0, 9, 0), Span::new(2, 1, 5, 0)];
        let paint = Paint::Solid(Color::from_rgba8(200, 40, 90, 170));
        for &format in PixelFormat::ALL {
            let before = format_buffer(format, 9, 2, 3);
            for &mode in CompositionMode::ALL {
                let mut dest = before.clone();
                fill_with(&c, &mut dest, format, 9, 2, &spans, &paint, &Transform::IDENTITY, mode);
                assert_eq!(dest, before, "{format} {mode}");
            }
        }
    }

    // ========================================================================
    // Sampling
    // ========================================================================

    #[test]
    fn test_bilinear_on_texel_centers_equals_nearest() {
        let c = Compositor::new();
        let tex = checker();
        // Device pixel centers land on texel centers 2x + 0.5.
        let t = Transform::translate(0.5, 0.5).then(&Transform::scale(0.5, 0.5));
        let format = PixelFormat::Argb32Premultiplied;
        for wrap in [WrapMode::Clamp, WrapMode::Tile] {
            let mut out = Vec::new();
            for smooth in [false, true] {
                let texture = Texture::new(checker_view(&tex)).with_wrap(wrap).with_smooth(smooth);
                let paint = Paint::Texture(texture);
                let mut dest = vec![0u8; 12 * 12 * 4];
                let spans: Vec<Span> = (0..12).map(|y| Span::full(-3, y, 18)).collect();
                let mode = CompositionMode::Source;
                fill_with(&c, &mut dest, format, 12, 12, &spans, &paint, &t, mode);
                out.push(dest);
            }
            assert_eq!(out[0], out[1], "{wrap:?}");
        }
    }

    #[test]
    fn test_tiled_texture_is_periodic() {
        let c = Compositor::new();
        let tex = checker();
        let format = PixelFormat::Argb32Premultiplied;
        for (t, period) in [
            (Transform::translate(3.0, -5.0), 8usize),
            (Transform::scale(2.0, 2.0), 16),
        ] {
            let paint = Paint::Texture(Texture::new(checker_view(&tex)).with_wrap(WrapMode::Tile));
            let size = period as u32 * 2;
            let mut dest = vec![0u8; (size * size * 4) as usize];
            fill_with(
                &c,
                &mut dest,
                format,
                size,
                size,
                &full_rows(size, size),
                &paint,
                &t,
                CompositionMode::Source,
            );
            let px = words(&dest);
            let at = |x: usize, y: usize| px[y * size as usize + x];
            for y in 0..period {
                for x in 0..period {
                    assert_eq!(at(x, y), at(x + period, y));
                    assert_eq!(at(x, y), at(x, y + period));
                }
            }
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    #[test]
    fn test_parallel_matches_sequential() {
        let tex = checker();
        let config = RasterConfig::default().with_parallel_threshold(1);
        let format = PixelFormat::Argb32Premultiplied;
        let spans = ragged_spans(64);
        let rotated = Transform::rotate(0.5).then(&Transform::scale(3.0, 3.0));
        let paints = [
            Paint::Gradient(
                Gradient::radial((32.0, 32.0), 20.0)
                    .with_stop(0.0, Color::from_rgba8(255, 0, 0, 255))
                    .with_stop(1.0, Color::from_rgba8(0, 0, 255, 100))
                    .with_spread(Spread::Reflect),
            ),
            Paint::Texture(
                Texture::new(checker_view(&tex))
                    .with_wrap(WrapMode::Tile)
                    .with_smooth(true),
            ),
        ];

        for paint in &paints {
            let sequential = Compositor::new().with_config(&config).with_pool(&InlinePool);
            let mut expected = vec![7u8; 64 * 64 * 4];
            let over = CompositionMode::SourceOver;
            fill_with(&sequential, &mut expected, format, 64, 64, &spans, paint, &rotated, over);

            for workers in [1, 2, 8] {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build().unwrap();
                assert_eq!(pool.max_workers(), workers);
                let parallel = Compositor::new().with_config(&config).with_pool(&pool);
                let mut got = vec![7u8; 64 * 64 * 4];
                fill_with(&parallel, &mut got, format, 64, 64, &spans, paint, &rotated, over);
                assert_eq!(got, expected, "{} with {workers} workers", paint.kind());
            }
        }
    }

    // ========================================================================
    // Scenarios
    // ========================================================================

    #[test]
    fn test_red_over_blue_half_coverage() {
        let c = Compositor::new();
        let format = PixelFormat::Argb32Premultiplied;
        let red = Paint::Solid(Color::from_argb32(0xffff_0000));
        let blue = Paint::Solid(Color::from_argb32(0xff00_00ff));
        let spans = full_rows(4, 4);

        let mut dest = vec![0u8; 4 * 4 * 4];
        let id = Transform::IDENTITY;
        let (source, over) = (CompositionMode::Source, CompositionMode::SourceOver);
        fill_with(&c, &mut dest, format, 4, 4, &spans, &red, &id, source);
        assert!(words(&dest).iter().all(|&w| w == 0xffff_0000));

        fill_with(&c, &mut dest, format, 4, 4, &spans, &blue, &id, source);
        let half: Vec<Span> = (0..4).map(|y| Span::new(0, y, 4, 128)).collect();
        fill_with(&c, &mut dest, format, 4, 4, &half, &red, &id, over);
        // red 255 * 128 / 255 = 128, blue 255 * 127 / 255 = 127
        assert!(words(&dest).iter().all(|&w| w == 0xff80_007f), "{:08x?}", words(&dest));
    }

    #[test]
    fn test_gradient_midpoint_ignores_spread() {
        let base = Gradient::linear((0.0, 0.0), (9.0, 0.0))
            .with_stop(0.0, Color::WHITE)
            .with_stop(1.0, Color::BLACK);
        let table = GradientTable::build(&base.stops).unwrap();
        let mid = table.entry::<u8>(GradientTable::index(0.5, Spread::Pad));
        assert!(mid[..3].iter().all(|&v| (127..=128).contains(&v)), "{mid:?}");
        assert_eq!(mid[3], 255);

        for spread in [Spread::Pad, Spread::Repeat, Spread::Reflect] {
            assert_eq!(GradientTable::index(0.5, spread), GradientTable::index(0.5, Spread::Pad));
            let g = base.clone().with_spread(spread);
            let sampler = GradientSampler::new(&g, Transform::IDENTITY).unwrap();
            // Pixel 4 has its center at x = 4.5, halfway along the axis.
            let mut out = [[0u8; 4]; 1];
            sampler.fetch(4, 0, &mut out);
            assert_eq!(out[0], mid, "{spread:?}");
        }
    }

    // ========================================================================
    // Backend
    // ========================================================================

    #[test]
    fn test_vector_backend_matches_scalar() {
        let scalar = Backend::scalar();
        let vector = Backend::build(CpuCaps {
            sse2: true,
            avx2: true,
            ..CpuCaps::NONE
        });
        assert!(!vector.substituted().is_empty());

        let config = RasterConfig::default();
        let tex = checker();
        let spans = ragged_spans(24);
        let skew = Transform::shear(0.3, 0.1).then(&Transform::translate(0.25, 0.75));
        let paints = [
            Paint::Solid(Color::from_rgba8(30, 200, 120, 140)),
            Paint::Solid(Color::from_rgba_f32(0.2, 0.4, 0.9, 0.6)),
            Paint::Texture(Texture::new(checker_view(&tex)).with_smooth(true)),
        ];
        let formats = [
            PixelFormat::Argb32Premultiplied,
            PixelFormat::Rgb32,
            PixelFormat::Rgba8888Premultiplied,
            PixelFormat::Rgba32FPremultiplied,
        ];
        for format in formats {
            let stride = format.bit_width().row_bytes(40);
            let start = format_buffer(format, 40, 24, 5);
            assert_eq!(start.len(), stride * 24);
            for paint in &paints {
                for mode in [CompositionMode::SourceOver, CompositionMode::Source] {
                    let mut outputs = Vec::new();
                    for backend in [&scalar, &vector] {
                        let c = Compositor::new()
                            .with_backend(backend)
                            .with_config(&config)
                            .with_pool(&InlinePool);
                        let mut dest = start.clone();
                        fill_with(&c, &mut dest, format, 40, 24, &spans, paint, &skew, mode);
                        outputs.push(dest);
                    }
                    assert_eq!(outputs[0], outputs[1], "{format} {} {mode}", paint.kind());
                }
            }
        }
    }
}
