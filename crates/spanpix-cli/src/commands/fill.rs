//! Fill command.
//!
//! Draws a synthetic scene: an inset rectangle of spans filled with the
//! chosen paint, transformed about the surface center. Reports the time per
//! fill and a checksum of the resulting pixels.

use std::time::Instant;

use crate::{FillArgs, PaintKind, SpreadArg};
use anyhow::{bail, Context, Result};
use spanpix_core::{Color, PixelFormat, RasterConfig, Span, Surface, TextureView};
use spanpix_math::Transform;
use spanpix_ops::backend::{self, Backend};
use spanpix_ops::{CompositionMode, Compositor, Gradient, Paint, Spread, Texture, WrapMode};
use tracing::{debug, info};

/// Side of the generated checkerboard texture.
const CHECKER_SIZE: u32 = 64;
/// Side of one checker cell.
const CHECKER_CELL: u32 = 8;

/// Runs the fill command.
pub fn run(args: FillArgs, verbose: u8) -> Result<()> {
    let format: PixelFormat = args.format.parse().context("Invalid --format")?;
    let mode: CompositionMode = args.mode.parse().context("Invalid --mode")?;
    let (width, height) = super::parse_size(&args.size)?;
    if width == 0 || height == 0 {
        bail!("Surface size must be non-zero, got {width}x{height}");
    }
    if args.repeat == 0 {
        bail!("--repeat must be at least 1");
    }

    let stride = format.bit_width().row_bytes(width as usize);
    let mut pixels = vec![0u8; stride * height as usize];
    let spans = inset_spans(width, height, args.coverage);
    let transform = paint_transform(&args, width, height);

    let checker = checkerboard();
    let texture = TextureView::new(
        &checker,
        CHECKER_SIZE,
        CHECKER_SIZE,
        CHECKER_SIZE as usize * 4,
        PixelFormat::Argb32Premultiplied,
    )?;
    let paint = build_paint(&args, width, height, texture)?;

    let scalar;
    let backend = if args.scalar {
        scalar = Backend::scalar();
        &scalar
    } else {
        backend::backend()
    };
    let config = RasterConfig::global();
    let compositor = Compositor::new().with_backend(backend).with_config(config);
    debug!(?compositor, "compositor");

    if verbose > 0 {
        println!(
            "Filling {width}x{height} {format} with {} ({mode}), {} spans",
            paint.kind(),
            spans.len()
        );
    }

    let start = Instant::now();
    for _ in 0..args.repeat {
        let mut surface = Surface::new(&mut pixels, width, height, stride, format)?;
        compositor
            .try_fill(&mut surface, &spans, &paint, &transform, mode)
            .context("Fill failed")?;
    }
    let elapsed = start.elapsed();
    let per_fill = elapsed / args.repeat;
    let pixels_touched = spanpix_core::span::pixel_count(&spans);
    info!(?elapsed, repeat = args.repeat, "fill done");

    println!("time:     {per_fill:?} per fill ({} fills)", args.repeat);
    println!(
        "rate:     {:.1} Mpx/s",
        pixels_touched as f64 / per_fill.as_secs_f64().max(1e-9) / 1e6
    );
    println!("checksum: {:016x}", super::fnv1a(&pixels));
    Ok(())
}

/// One span per row covering the middle three quarters of the surface.
fn inset_spans(width: u32, height: u32, coverage: u8) -> Vec<Span> {
    let x0 = width / 8;
    let len = width - 2 * x0;
    (height / 8..height - height / 8)
        .map(|y| Span::new(x0 as i32, y as i32, len, coverage))
        .collect()
}

/// Scale, rotation and perspective about the surface center.
fn paint_transform(args: &FillArgs, width: u32, height: u32) -> Transform {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let mut t = Transform::translate(-cx, -cy)
        .then(&Transform::scale(args.scale, args.scale))
        .then(&Transform::rotate(args.rotate.to_radians()));
    if args.perspective != 0.0 {
        let p = args.perspective / width as f64;
        t = t.then(&Transform::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [p, 0.0, 1.0]]));
    }
    t.then(&Transform::translate(cx, cy))
}

fn build_paint<'a>(
    args: &FillArgs,
    width: u32,
    height: u32,
    texture: TextureView<'a>,
) -> Result<Paint<'a>> {
    let (w, h) = (width as f64, height as f64);
    let spread = match args.spread {
        SpreadArg::Pad => Spread::Pad,
        SpreadArg::Repeat => Spread::Repeat,
        SpreadArg::Reflect => Spread::Reflect,
    };
    let ramp = |g: Gradient| {
        g.with_stop(0.0, Color::from_argb32(0xffff_0000))
            .with_stop(0.5, Color::from_argb32(0x8000_ff00))
            .with_stop(1.0, Color::from_argb32(0xff00_00ff))
            .with_spread(spread)
    };
    Ok(match args.paint {
        PaintKind::Solid => Paint::Solid(Color::from_argb32(super::parse_argb(&args.color)?)),
        PaintKind::Linear => {
            Paint::Gradient(ramp(Gradient::linear((0.0, 0.0), (w / 2.0, h / 2.0))))
        }
        PaintKind::Radial => {
            Paint::Gradient(ramp(Gradient::radial((w / 2.0, h / 2.0), w.min(h) / 4.0)))
        }
        PaintKind::Conical => Paint::Gradient(ramp(Gradient::conical((w / 2.0, h / 2.0), 0.0))),
        PaintKind::Texture => {
            let wrap = if args.tile { WrapMode::Tile } else { WrapMode::Clamp };
            Paint::Texture(Texture::new(texture).with_wrap(wrap).with_smooth(args.smooth))
        }
    })
}

/// Opaque two-tone checkerboard in `Argb32Premultiplied`.
fn checkerboard() -> Vec<u8> {
    let mut bytes = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let dark = ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0;
            let argb: u32 = if dark { 0xff20_2020 } else { 0xffe0_c080 };
            bytes.extend_from_slice(&argb.to_ne_bytes());
        }
    }
    bytes
}
