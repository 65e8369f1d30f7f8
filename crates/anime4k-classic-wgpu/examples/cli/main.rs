//! Classic Anime4K CLI Image Upscaler
//!
//! A command-line tool for running the edge-directed upscaling pipeline over
//! a single image. The image is fed through the frame-source interface, one
//! pipeline tick is rendered, and the presentation surface is read back and
//! saved. Useful for eyeballing `--scale`, `--bold`, and `--blur` choices
//! without a live frame stream.
//!
//! # Usage
//! ```bash
//! cargo run --example cli -- input.png output.png --scale 2.0
//! ```

use anime4k_classic_wgpu::{
    Upscaler,
    frame_source::{BufferSource, Bytes, FrameSource},
};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the image upscaler
#[derive(Parser)]
#[command(version, about = "Upscale an image with the classic Anime4K pipeline")]
struct Args {
    /// Input image file path
    input: PathBuf,

    /// Output image file path
    output: PathBuf,

    /// Output size multiplier (e.g., 2.0 for 2x upscaling)
    #[arg(long, short, default_value = "2.0")]
    scale: f32,

    /// Line-weight divisor; lower pushes lines harder
    #[arg(long, default_value = "6.0")]
    bold: f32,

    /// Edge-softness divisor; lower blends edges harder
    #[arg(long, default_value = "2.0")]
    blur: f32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let image = image::open(&args.input)?.to_rgba8();
    let (width, height) = image.dimensions();
    println!("Input: {width}x{height}, scale {}", args.scale);

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))?;

    let mut upscaler = pollster::block_on(Upscaler::new(device.clone(), queue.clone()))?;
    upscaler.set_bold(args.bold);
    upscaler.set_blur(args.blur);

    let source = BufferSource::new(width, height, Bytes::from(image.into_raw()))?;
    let mut handout = Some(Box::new(source) as Box<dyn FrameSource>);
    upscaler.configure(move || handout.take())?;
    upscaler.resize(args.scale);
    upscaler.render_tick();

    let presentation = upscaler.presentation().ok_or("presentation surface was not allocated")?;
    let output = read_texture_rgba8(&device, &queue, presentation)?;
    output.save(&args.output)?;
    println!("Saved {}x{} image to {}", output.width(), output.height(), args.output.display());

    Ok(())
}

/// Copies a texture back to the CPU as an RGBA8 image
fn read_texture_rgba8(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<image::RgbaImage, Box<dyn std::error::Error>> {
    let width = texture.width();
    let height = texture.height();
    let unpadded_bytes_per_row = width * 4;
    let padded_bytes_per_row = unpadded_bytes_per_row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback buffer"),
        size: (padded_bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback encoder") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = buffer.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| sender.send(result).unwrap());

    device.poll(wgpu::PollType::Wait)?;
    pollster::block_on(receiver.receive()).ok_or("failed to map readback buffer")??;

    let data = buffer_slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for row in data.chunks(padded_bytes_per_row as usize) {
        pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
    }
    drop(data);

    image::RgbaImage::from_raw(width, height, pixels).ok_or_else(|| "failed to assemble output image".into())
}
