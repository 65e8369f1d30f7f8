//! Generic compute pass abstraction
//!
//! A [`Pass`] is a compiled kernel program plus an explicit, statically
//! declared binding table, immutable after construction. The table is the
//! single source of truth for the pass's interface; there is no reflection
//! over the compiled program. Every kernel exposes a bounds-checked `main`
//! entry point and a `main_unchecked` variant used when the dispatch covers
//! the output exactly.

/// Compute shader workgroup size in X dimension
pub(crate) const COMPUTE_WORKGROUP_SIZE_X: u32 = 8;
/// Compute shader workgroup size in Y dimension
pub(crate) const COMPUTE_WORKGROUP_SIZE_Y: u32 = 8;

/// Binding slot for a sampled input texture
#[derive(Debug, Clone, Copy)]
pub(crate) struct InputTextureBinding {
    /// Shader binding point index
    pub binding: u32,
}

/// Binding slot for the pass's write-only storage output
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutputTextureBinding {
    /// Shader binding point index
    pub binding: u32,
}

/// Binding slot for a filtering sampler
#[derive(Debug, Clone, Copy)]
pub(crate) struct SamplerBinding {
    /// Shader binding point index
    pub binding: u32,
}

/// Binding slot for a uniform buffer
#[derive(Debug, Clone, Copy)]
pub(crate) struct UniformBinding {
    /// Shader binding point index
    pub binding: u32,
}

/// Statically declared shape of a pass: kernel source plus every binding it uses
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassDescriptor {
    /// Human-readable name, used for labels and diagnostics
    pub name: &'static str,
    /// WGSL kernel source code
    pub shader: &'static str,
    /// Sampled input texture slots, in wiring order
    pub inputs: &'static [InputTextureBinding],
    /// The single storage output slot
    pub output: OutputTextureBinding,
    /// Optional sampler slot
    pub sampler: Option<SamplerBinding>,
    /// Optional uniform buffer slot
    pub uniform: Option<UniformBinding>,
}

/// Error raised when a kernel program fails to compile or validate
///
/// Construction failures are fatal; the message carries the compiler or
/// validator diagnostic verbatim.
#[derive(Debug, Clone, thiserror::Error)]
#[error("pass '{pass}' failed to build: {message}")]
pub struct PassConstructionError {
    /// Name of the failing pass
    pub pass: &'static str,
    /// Diagnostic reported by the shader compiler or validator
    pub message: String,
}

/// A compiled kernel program with its explicit bind group layout
#[derive(Debug)]
pub(crate) struct Pass {
    name: &'static str,
    descriptor: PassDescriptor,
    bind_group_layout: wgpu::BindGroupLayout,
    /// Pipeline entered at the bounds-checked `main`
    pipeline: wgpu::ComputePipeline,
    /// Pipeline entered at `main_unchecked`, for dispatches with no partial workgroups
    pipeline_unchecked: wgpu::ComputePipeline,
}

impl Pass {
    /// Compiles the kernel and builds both pipeline variants
    ///
    /// The descriptor's binding table is turned into an explicit bind group
    /// layout; pipeline creation then validates the compiled program against
    /// it. Any validation failure is captured through the device error scope
    /// and returned with its diagnostic.
    pub async fn compile(device: &wgpu::Device, descriptor: PassDescriptor) -> Result<Self, PassConstructionError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(descriptor.name),
            source: wgpu::ShaderSource::Wgsl(descriptor.shader.into()),
        });

        let mut layout_entries = Vec::new();

        for input in descriptor.inputs {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: input.binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        layout_entries.push(wgpu::BindGroupLayoutEntry {
            binding: descriptor.output.binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: crate::texture_bank::TEXTURE_FORMAT,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });

        if let Some(sampler) = descriptor.sampler {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler.binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        if let Some(uniform) = descriptor.uniform {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: uniform.binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        layout_entries.sort_by_key(|entry| entry.binding);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(descriptor.name),
            entries: &layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(descriptor.name),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline = |entry_point: &'static str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(descriptor.name),
                layout: Some(&pipeline_layout),
                module: &shader_module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let pipeline = make_pipeline("main");
        let pipeline_unchecked = make_pipeline("main_unchecked");

        if let Some(error) = device.pop_error_scope().await {
            return Err(PassConstructionError {
                pass: descriptor.name,
                message: error.to_string(),
            });
        }

        Ok(Self {
            name: descriptor.name,
            descriptor,
            bind_group_layout,
            pipeline,
            pipeline_unchecked,
        })
    }

    /// Assembles a bind group wiring concrete resources into the declared slots
    ///
    /// `inputs` must match the descriptor's input table in order and count,
    /// and the sampler/uniform arguments must match the declared slots.
    pub fn bind(&self, device: &wgpu::Device, inputs: &[&wgpu::TextureView], output: &wgpu::TextureView, sampler: Option<&wgpu::Sampler>, uniform: Option<&wgpu::Buffer>) -> wgpu::BindGroup {
        assert_eq!(inputs.len(), self.descriptor.inputs.len(), "input count mismatch for pass '{}'", self.name);
        assert_eq!(sampler.is_some(), self.descriptor.sampler.is_some(), "sampler mismatch for pass '{}'", self.name);
        assert_eq!(uniform.is_some(), self.descriptor.uniform.is_some(), "uniform mismatch for pass '{}'", self.name);

        let mut entries = Vec::new();

        for (slot, view) in self.descriptor.inputs.iter().zip(inputs) {
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        entries.push(wgpu::BindGroupEntry {
            binding: self.descriptor.output.binding,
            resource: wgpu::BindingResource::TextureView(output),
        });

        if let (Some(slot), Some(sampler)) = (self.descriptor.sampler, sampler) {
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        if let (Some(slot), Some(buffer)) = (self.descriptor.uniform, uniform) {
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: None,
                }),
            });
        }

        entries.sort_by_key(|entry| entry.binding);

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.name),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }

    /// Records this pass into the encoder, one thread per output pixel
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, dimensions: (u32, u32)) {
        let (width, height) = dimensions;
        let skip_bounds_check = width % COMPUTE_WORKGROUP_SIZE_X == 0 && height % COMPUTE_WORKGROUP_SIZE_Y == 0;

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.name),
            timestamp_writes: None,
        });

        compute_pass.set_pipeline(if skip_bounds_check { &self.pipeline_unchecked } else { &self.pipeline });
        compute_pass.set_bind_group(0, bind_group, &[]);
        compute_pass.dispatch_workgroups(width.div_ceil(COMPUTE_WORKGROUP_SIZE_X), height.div_ceil(COMPUTE_WORKGROUP_SIZE_Y), 1);
    }
}
