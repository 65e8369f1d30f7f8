//! GPU texture lifecycle for the pass chain
//!
//! The bank holds the `scaled` buffer and the three working buffers. All four
//! share the output dimensions and are reallocated together whenever those
//! change; their color-vs-signal roles rotate between pipeline stages.

/// Pixel format shared by every buffer in the chain, 8 bits per channel
pub(crate) const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Usage flags for pass targets: sampled by later passes, written as storage,
/// readable by the host
pub(crate) const TEXTURE_USAGE_TARGET: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING.union(wgpu::TextureUsages::STORAGE_BINDING).union(wgpu::TextureUsages::COPY_SRC);

/// Usage flags for the native-resolution input texture, refreshed in place every tick
pub(crate) const TEXTURE_USAGE_INPUT: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING.union(wgpu::TextureUsages::COPY_DST);

/// A texture together with its default view
#[derive(Debug)]
pub(crate) struct PassTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl PassTexture {
    /// Creates a 2D texture of the shared format at the given size
    pub fn new(device: &wgpu::Device, label: &str, dimensions: (u32, u32), usage: wgpu::TextureUsages) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: dimensions.0,
                height: dimensions.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { texture, view }
    }
}

/// Computes output dimensions for a native size and scale factor
///
/// Rounded to the nearest texel and clamped to at least one so a degenerate
/// scale cannot produce an unallocatable zero-size texture.
pub(crate) fn output_dimensions(native: (u32, u32), scale: f32) -> (u32, u32) {
    (
        ((native.0 as f64 * scale as f64).round() as u32).max(1),
        ((native.1 as f64 * scale as f64).round() as u32).max(1),
    )
}

/// The reusable intermediate buffers of the pass chain
#[derive(Debug)]
pub(crate) struct TextureBank {
    pub scaled: PassTexture,
    pub work_a: PassTexture,
    pub work_b: PassTexture,
    pub work_c: PassTexture,
    /// Shared dimensions of every buffer in the bank
    pub dimensions: (u32, u32),
}

impl TextureBank {
    /// Allocates all four buffers at the given output dimensions
    pub fn new(device: &wgpu::Device, dimensions: (u32, u32)) -> Self {
        Self {
            scaled: PassTexture::new(device, "Scaled", dimensions, TEXTURE_USAGE_TARGET),
            work_a: PassTexture::new(device, "Working buffer A", dimensions, TEXTURE_USAGE_TARGET),
            work_b: PassTexture::new(device, "Working buffer B", dimensions, TEXTURE_USAGE_TARGET),
            work_c: PassTexture::new(device, "Working buffer C", dimensions, TEXTURE_USAGE_TARGET),
            dimensions,
        }
    }
}
