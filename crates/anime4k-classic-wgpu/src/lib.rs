//! Classic Anime4K edge-directed upscaling for wgpu
//!
//! This crate implements the original (pre-CNN) Anime4K filter as a fixed
//! chain of six compute passes over a live RGBA frame stream: a manual
//! bilinear upscale, two luminance extractions feeding the RGBL packing, an
//! edge-directed "push" sharpen, an inverted Sobel gradient map, a
//! priority-ordered edge refinement, and an alpha-restoring composite into
//! the presentation surface. The [`Upscaler`] controller owns every GPU
//! resource and exposes the runtime-tunable `scale`, `bold`, and `blur`
//! parameters; frames arrive through the [`frame_source`] interface.

mod kernels;
mod pass;
mod pipeline;
mod texture_bank;

pub mod frame_source;

pub use pass::PassConstructionError;
pub use pipeline::{PipelineParams, Upscaler, UpscalerError};
