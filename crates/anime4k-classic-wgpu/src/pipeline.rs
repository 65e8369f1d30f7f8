//! The pipeline controller
//!
//! [`Upscaler`] owns the texture bank, the presentation surface, and all six
//! compiled passes. It sequences the passes every tick, exposes the runtime
//! parameters, and applies the source recovery policy so an unattended render
//! loop is never interrupted by a single bad frame.

use crate::{
    frame_source::{Frame, FrameProvider, FrameSource},
    kernels,
    pass::{Pass, PassConstructionError},
    texture_bank::{PassTexture, TextureBank, TEXTURE_USAGE_INPUT, TEXTURE_USAGE_TARGET, output_dimensions},
};

/// Runtime-tunable pipeline parameters
///
/// All three are externally supplied scalars observed on the next tick.
/// Values are not validated; a non-positive divisor reaches the strength
/// formula exactly as supplied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineParams {
    /// Output size multiplier; changes go through [`Upscaler::resize`]
    pub scale: f32,
    /// Line-weight divisor for the sharpen pass; lower is more aggressive
    pub bold: f32,
    /// Edge-softness divisor for the refine pass; lower is more aggressive
    pub blur: f32,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            bold: 6.0,
            blur: 2.0,
        }
    }
}

/// Blend strength for a directional pass: `min(scale / divisor, 1)`
pub(crate) fn blend_strength(scale: f32, divisor: f32) -> f32 {
    (scale / divisor).min(1.0)
}

/// Uniform block consumed by the directional passes
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
struct BlendUniforms {
    strength: f32,
    padding: [f32; 3],
}

impl BlendUniforms {
    fn new(strength: f32) -> Self {
        Self {
            strength,
            padding: [0.0; 3],
        }
    }
}

/// Fatal errors surfaced to the caller
///
/// Per-tick failures are never reported through this type; they are absorbed
/// by [`Upscaler::render_tick`] and logged instead.
#[derive(Debug, thiserror::Error)]
pub enum UpscalerError {
    /// A kernel program failed to compile or validate
    #[error(transparent)]
    Construction(#[from] PassConstructionError),
    /// The frame provider had no source to hand out
    #[error("no frame source available")]
    NoSource,
    /// The frame source has not produced its metadata yet
    #[error("frame source metadata not ready")]
    SourceNotReady,
    /// The frame source reported an empty native size
    #[error("frame source reported zero dimensions")]
    EmptySourceDimensions,
}

/// The six compiled kernel programs
#[derive(Debug)]
struct Passes {
    upscale: Pass,
    luminance: Pass,
    sharpen: Pass,
    gradient: Pass,
    refine: Pass,
    composite: Pass,
}

/// Bind groups wiring the passes to the current textures
///
/// Rebuilt whenever the bank or the input texture is reallocated. The
/// luminance pass appears twice with different wiring.
struct BoundPasses {
    upscale: wgpu::BindGroup,
    luminance_scaled: wgpu::BindGroup,
    sharpen: wgpu::BindGroup,
    luminance_sharpened: wgpu::BindGroup,
    gradient: wgpu::BindGroup,
    refine: wgpu::BindGroup,
    composite: wgpu::BindGroup,
}

/// Edge-directed upscaling pipeline controller
///
/// Exclusively owns every texture, program, and the presentation surface;
/// nothing outside the controller mutates them. Scheduling is left to the
/// caller: exactly one [`Upscaler::render_tick`] is expected in flight at a
/// time, typically driven by the host's display refresh callback.
pub struct Upscaler {
    device: wgpu::Device,
    queue: wgpu::Queue,

    params: PipelineParams,
    /// Set by the first `resize`; `render_tick` is a no-op before that
    resized: bool,

    passes: Passes,
    sampler: wgpu::Sampler,
    sharpen_uniforms: wgpu::Buffer,
    refine_uniforms: wgpu::Buffer,

    provider: Option<Box<dyn FrameProvider>>,
    source: Option<Box<dyn FrameSource>>,
    native_dimensions: (u32, u32),
    input: Option<PassTexture>,

    bank: Option<TextureBank>,
    presentation: Option<PassTexture>,
    bound: Option<BoundPasses>,
}

impl Upscaler {
    /// Compiles the six kernel programs and prepares shared GPU resources
    ///
    /// Construction failures are fatal; the error carries the compiler or
    /// validator diagnostic and the controller must not be used afterwards.
    pub async fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, UpscalerError> {
        let passes = Passes {
            upscale: Pass::compile(&device, kernels::UPSCALE).await?,
            luminance: Pass::compile(&device, kernels::LUMINANCE).await?,
            sharpen: Pass::compile(&device, kernels::SHARPEN).await?,
            gradient: Pass::compile(&device, kernels::GRADIENT).await?,
            refine: Pass::compile(&device, kernels::REFINE).await?,
            composite: Pass::compile(&device, kernels::COMPOSITE).await?,
        };

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let make_uniform_buffer = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<BlendUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let sharpen_uniforms = make_uniform_buffer("Sharpen strength");
        let refine_uniforms = make_uniform_buffer("Refine strength");

        Ok(Self {
            device,
            queue,
            params: PipelineParams::default(),
            resized: false,
            passes,
            sampler,
            sharpen_uniforms,
            refine_uniforms,
            provider: None,
            source: None,
            native_dimensions: (0, 0),
            input: None,
            bank: None,
            presentation: None,
            bound: None,
        })
    }

    /// Binds a frame-source provider and allocates the input texture at the
    /// source's native size
    ///
    /// # Errors
    /// Fails if the provider has no source, if the source's metadata is not
    /// available yet, or if it reports zero dimensions.
    pub fn configure(&mut self, provider: impl FrameProvider + 'static) -> Result<(), UpscalerError> {
        let mut provider: Box<dyn FrameProvider> = Box::new(provider);
        let source = provider.acquire().ok_or(UpscalerError::NoSource)?;
        let (width, height) = source.dimensions().ok_or(UpscalerError::SourceNotReady)?;
        if width == 0 || height == 0 {
            return Err(UpscalerError::EmptySourceDimensions);
        }

        tracing::debug!("configuring pipeline for a {width}x{height} source");

        self.native_dimensions = (width, height);
        self.input = Some(PassTexture::new(&self.device, "Input frame", (width, height), TEXTURE_USAGE_INPUT));
        self.provider = Some(provider);
        self.source = Some(source);

        if self.resized {
            self.rebuild_bank();
        } else {
            self.rebind();
        }
        Ok(())
    }

    /// Applies a new scale factor
    ///
    /// (Re)allocates the scaled buffer, the three working buffers, and the
    /// presentation surface at `round(native * scale)`. Must be called at
    /// least once before `render_tick` produces output.
    pub fn resize(&mut self, scale: f32) {
        self.params.scale = scale;
        self.resized = true;
        if self.input.is_some() {
            self.rebuild_bank();
        } else {
            tracing::debug!("resize({scale}) recorded before a source was configured");
        }
    }

    /// Sets the sharpen-pass line-weight divisor, observed on the next tick
    pub fn set_bold(&mut self, bold: f32) {
        self.params.bold = bold;
    }

    /// Sets the refine-pass edge-softness divisor, observed on the next tick
    pub fn set_blur(&mut self, blur: f32) {
        self.params.blur = blur;
    }

    /// Current parameter values
    pub fn params(&self) -> PipelineParams {
        self.params
    }

    /// Output dimensions of the presentation surface, once resized
    pub fn output_dimensions(&self) -> Option<(u32, u32)> {
        self.bank.as_ref().map(|bank| bank.dimensions)
    }

    /// The presentation surface the composed image is written into
    ///
    /// Consumers read this texture directly; there is no per-frame callback.
    /// `None` until the first `resize` with a configured source.
    pub fn presentation(&self) -> Option<&wgpu::Texture> {
        self.presentation.as_ref().map(|surface| &surface.texture)
    }

    /// Runs one full pipeline tick
    ///
    /// Uploads the source's current frame, encodes the six passes in their
    /// fixed order, and submits the work; the composed image lands in the
    /// presentation surface. Never returns an error: a tick before
    /// configuration or resize is silently skipped, and source failures are
    /// absorbed by the recovery policy.
    pub fn render_tick(&mut self) {
        if self.input.is_none() || self.bank.is_none() {
            tracing::trace!("render tick skipped: pipeline not configured and resized yet");
            return;
        }

        // Probe the source before recording any GPU work; a broken handle is
        // discarded and replaced here.
        let Some(frame) = self.acquire_frame() else {
            return;
        };

        let (width, height) = self.native_dimensions;
        let (Some(input), Some(bank), Some(bound)) = (&self.input, &self.bank, &self.bound) else {
            return;
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &input.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            frame.data.as_ref(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        // The strengths follow the realized output/native ratio rather than
        // the requested factor, so a recovered source with a different native
        // size keeps producing sensible blends.
        let effective_scale = bank.dimensions.0 as f32 / width as f32;
        self.queue.write_buffer(&self.sharpen_uniforms, 0, bytemuck::cast_slice(&[BlendUniforms::new(blend_strength(effective_scale, self.params.bold))]));
        self.queue.write_buffer(&self.refine_uniforms, 0, bytemuck::cast_slice(&[BlendUniforms::new(blend_strength(effective_scale, self.params.blur))]));

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Pipeline tick") });

        let dimensions = bank.dimensions;
        self.passes.upscale.encode(&mut encoder, &bound.upscale, dimensions);
        self.passes.luminance.encode(&mut encoder, &bound.luminance_scaled, dimensions);
        self.passes.sharpen.encode(&mut encoder, &bound.sharpen, dimensions);
        self.passes.luminance.encode(&mut encoder, &bound.luminance_sharpened, dimensions);
        self.passes.gradient.encode(&mut encoder, &bound.gradient, dimensions);
        self.passes.refine.encode(&mut encoder, &bound.refine, dimensions);
        self.passes.composite.encode(&mut encoder, &bound.composite, dimensions);

        self.queue.submit(Some(encoder.finish()));
    }

    /// Samples the current frame, applying the recovery policy on failure
    ///
    /// Returns `None` when the tick should be skipped because no healthy
    /// source is available; the next tick retries, with no backoff.
    fn acquire_frame(&mut self) -> Option<Frame> {
        if let Some(mut source) = self.source.take() {
            match source.current_frame() {
                Ok(frame) if frame_matches(&frame, self.native_dimensions) => {
                    self.source = Some(source);
                    return Some(frame);
                }
                Ok(frame) => {
                    tracing::warn!(
                        "frame source produced {}x{} with {} bytes, expected {}x{}; discarding source",
                        frame.width,
                        frame.height,
                        frame.data.len(),
                        self.native_dimensions.0,
                        self.native_dimensions.1
                    );
                }
                Err(error) => {
                    tracing::warn!("frame source failed ({error}); discarding source");
                }
            }
        }

        self.recover_source()?;

        let mut source = self.source.take()?;
        match source.current_frame() {
            Ok(frame) if frame_matches(&frame, self.native_dimensions) => {
                self.source = Some(source);
                Some(frame)
            }
            Ok(_) | Err(_) => {
                tracing::warn!("re-acquired frame source failed immediately; retrying next tick");
                None
            }
        }
    }

    /// Asks the provider for a replacement source and adopts it if usable
    ///
    /// Adoption tears down and recreates the input texture at the fresh
    /// source's native size; the working buffers keep their dimensions until
    /// the next resize.
    fn recover_source(&mut self) -> Option<()> {
        let provider = self.provider.as_mut()?;
        let Some(fresh) = provider.acquire() else {
            tracing::warn!("no replacement frame source available; retrying next tick");
            return None;
        };
        let Some((width, height)) = fresh.dimensions() else {
            tracing::warn!("replacement frame source has no metadata yet; retrying next tick");
            return None;
        };
        if width == 0 || height == 0 {
            tracing::warn!("replacement frame source reported zero dimensions; retrying next tick");
            return None;
        }

        if (width, height) != self.native_dimensions {
            tracing::debug!("recovered source is {width}x{height} (was {}x{})", self.native_dimensions.0, self.native_dimensions.1);
        }
        self.native_dimensions = (width, height);
        self.input = Some(PassTexture::new(&self.device, "Input frame", (width, height), TEXTURE_USAGE_INPUT));
        self.source = Some(fresh);
        self.rebind();
        Some(())
    }

    /// Reallocates the bank and presentation surface at the current scale
    fn rebuild_bank(&mut self) {
        let dimensions = output_dimensions(self.native_dimensions, self.params.scale);
        tracing::debug!(
            "allocating texture bank at {}x{} (native {}x{}, scale {})",
            dimensions.0,
            dimensions.1,
            self.native_dimensions.0,
            self.native_dimensions.1,
            self.params.scale
        );
        self.bank = Some(TextureBank::new(&self.device, dimensions));
        self.presentation = Some(PassTexture::new(&self.device, "Presentation surface", dimensions, TEXTURE_USAGE_TARGET));
        self.rebind();
    }

    /// Rebuilds every bind group against the current textures
    fn rebind(&mut self) {
        let (Some(input), Some(bank), Some(presentation)) = (&self.input, &self.bank, &self.presentation) else {
            self.bound = None;
            return;
        };

        // Physical wiring of the chain; the color and signal roles rotate
        // through the working buffers so no pass reads its own output.
        let bound = BoundPasses {
            upscale: self.passes.upscale.bind(&self.device, &[&input.view], &bank.scaled.view, None, None),
            luminance_scaled: self.passes.luminance.bind(&self.device, &[&bank.scaled.view], &bank.work_a.view, None, None),
            sharpen: self.passes.sharpen.bind(&self.device, &[&bank.scaled.view, &bank.work_a.view], &bank.work_b.view, None, Some(&self.sharpen_uniforms)),
            luminance_sharpened: self.passes.luminance.bind(&self.device, &[&bank.work_b.view], &bank.work_a.view, None, None),
            gradient: self.passes.gradient.bind(&self.device, &[&bank.work_b.view, &bank.work_a.view], &bank.work_c.view, None, None),
            refine: self.passes.refine.bind(&self.device, &[&bank.work_b.view, &bank.work_c.view], &bank.work_a.view, None, Some(&self.refine_uniforms)),
            composite: self.passes.composite.bind(&self.device, &[&bank.work_a.view, &input.view], &presentation.view, Some(&self.sampler), None),
        };
        self.bound = Some(bound);
    }
}

/// A frame is usable when it matches the input texture exactly
fn frame_matches(frame: &Frame, native: (u32, u32)) -> bool {
    (frame.width, frame.height) == native && frame.data.len() == native.0 as usize * native.1 as usize * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_strength_never_exceeds_one() {
        assert_eq!(blend_strength(100.0, 6.0), 1.0);
        assert_eq!(blend_strength(2.0, 2.0), 1.0);
        assert_eq!(blend_strength(1e9, 0.5), 1.0);
    }

    #[test]
    fn test_blend_strength_below_cap() {
        assert!((blend_strength(1.0, 6.0) - 1.0 / 6.0).abs() < 1e-6);
        assert!((blend_strength(2.0, 6.0) - 1.0 / 3.0).abs() < 1e-6);
        assert!((blend_strength(1.0, 2.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_default_params() {
        let params = PipelineParams::default();
        assert_eq!(params.scale, 1.0);
        assert_eq!(params.bold, 6.0);
        assert_eq!(params.blur, 2.0);
    }

    #[test]
    fn test_frame_matches_requires_exact_payload() {
        let frame = Frame {
            width: 2,
            height: 2,
            data: crate::frame_source::Bytes::from(vec![0u8; 16]),
        };
        assert!(frame_matches(&frame, (2, 2)));
        assert!(!frame_matches(&frame, (2, 3)));

        let short = Frame {
            width: 2,
            height: 2,
            data: crate::frame_source::Bytes::from(vec![0u8; 12]),
        };
        assert!(!frame_matches(&short, (2, 2)));
    }
}
