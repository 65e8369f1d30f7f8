//! The six kernel programs of the pass chain
//!
//! Each descriptor statically declares the kernel source and every binding it
//! uses; the controller compiles and validates them once at construction.
//! Slot order is sampled inputs first, then the storage output, then sampler
//! and uniform slots.

use crate::pass::{InputTextureBinding, OutputTextureBinding, PassDescriptor, SamplerBinding, UniformBinding};

/// Four-tap bilinear upscale from the native-size input into the scaled buffer
pub(crate) const UPSCALE: PassDescriptor = PassDescriptor {
    name: "Upscale",
    shader: include_str!("shaders/upscale.wgsl"),
    inputs: &[InputTextureBinding { binding: 0 }],
    output: OutputTextureBinding { binding: 1 },
    sampler: None,
    uniform: None,
};

/// Luminance extraction, replicated across all four output channels
pub(crate) const LUMINANCE: PassDescriptor = PassDescriptor {
    name: "Luminance Extract",
    shader: include_str!("shaders/luminance.wgsl"),
    inputs: &[InputTextureBinding { binding: 0 }],
    output: OutputTextureBinding { binding: 1 },
    sampler: None,
    uniform: None,
};

/// Edge-directed "push" sharpening over an RGBL neighborhood
pub(crate) const SHARPEN: PassDescriptor = PassDescriptor {
    name: "Directional Sharpen",
    shader: include_str!("shaders/sharpen.wgsl"),
    inputs: &[InputTextureBinding { binding: 0 }, InputTextureBinding { binding: 1 }],
    output: OutputTextureBinding { binding: 2 },
    sampler: None,
    uniform: Some(UniformBinding { binding: 3 }),
};

/// Inverted Sobel gradient magnitude over the luminance channel
pub(crate) const GRADIENT: PassDescriptor = PassDescriptor {
    name: "Gradient Magnitude",
    shader: include_str!("shaders/gradient.wgsl"),
    inputs: &[InputTextureBinding { binding: 0 }, InputTextureBinding { binding: 1 }],
    output: OutputTextureBinding { binding: 2 },
    sampler: None,
    uniform: None,
};

/// Priority-ordered edge refinement driven by the gradient map
pub(crate) const REFINE: PassDescriptor = PassDescriptor {
    name: "Directional Refine",
    shader: include_str!("shaders/refine.wgsl"),
    inputs: &[InputTextureBinding { binding: 0 }, InputTextureBinding { binding: 1 }],
    output: OutputTextureBinding { binding: 2 },
    sampler: None,
    uniform: Some(UniformBinding { binding: 3 }),
};

/// Recombines refined color with the original frame's alpha channel
pub(crate) const COMPOSITE: PassDescriptor = PassDescriptor {
    name: "Composite",
    shader: include_str!("shaders/composite.wgsl"),
    inputs: &[InputTextureBinding { binding: 0 }, InputTextureBinding { binding: 1 }],
    output: OutputTextureBinding { binding: 3 },
    sampler: Some(SamplerBinding { binding: 2 }),
    uniform: None,
};

/// All six pass descriptors in execution order
pub(crate) const ALL: [PassDescriptor; 6] = [UPSCALE, LUMINANCE, SHARPEN, GRADIENT, REFINE, COMPOSITE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_slots_are_unique() {
        for descriptor in ALL {
            let mut slots: Vec<u32> = descriptor.inputs.iter().map(|input| input.binding).collect();
            slots.push(descriptor.output.binding);
            slots.extend(descriptor.sampler.map(|sampler| sampler.binding));
            slots.extend(descriptor.uniform.map(|uniform| uniform.binding));

            let mut deduped = slots.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(slots.len(), deduped.len(), "duplicate binding slot in pass '{}'", descriptor.name);
        }
    }

    #[test]
    fn test_binding_slots_are_dense() {
        // Slots must cover 0..n without gaps so the layouts stay minimal.
        for descriptor in ALL {
            let mut slots: Vec<u32> = descriptor.inputs.iter().map(|input| input.binding).collect();
            slots.push(descriptor.output.binding);
            slots.extend(descriptor.sampler.map(|sampler| sampler.binding));
            slots.extend(descriptor.uniform.map(|uniform| uniform.binding));
            slots.sort();

            for (index, slot) in slots.iter().enumerate() {
                assert_eq!(*slot, index as u32, "gap in binding slots of pass '{}'", descriptor.name);
            }
        }
    }

    #[test]
    fn test_every_kernel_has_both_entry_points() {
        for descriptor in ALL {
            assert!(descriptor.shader.contains("fn main("), "pass '{}' is missing the checked entry point", descriptor.name);
            assert!(descriptor.shader.contains("fn main_unchecked("), "pass '{}' is missing the unchecked entry point", descriptor.name);
        }
    }

    #[test]
    fn test_uniform_passes_are_the_directional_ones() {
        assert!(SHARPEN.uniform.is_some());
        assert!(REFINE.uniform.is_some());
        assert!(UPSCALE.uniform.is_none());
        assert!(LUMINANCE.uniform.is_none());
        assert!(GRADIENT.uniform.is_none());
        assert!(COMPOSITE.uniform.is_none());
    }
}
