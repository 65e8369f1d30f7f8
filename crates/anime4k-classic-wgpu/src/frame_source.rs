//! Frame acquisition interface for the pipeline
//!
//! The controller never touches the host's video machinery directly; it pulls
//! RGBA frames through the [`FrameSource`] trait and asks a [`FrameProvider`]
//! for a replacement whenever the current source fails mid-stream.

pub use bytes::Bytes;

/// A single RGBA frame, 8 bits per channel, tightly packed rows
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data, `width * height * 4` bytes in row-major RGBA order
    pub data: Bytes,
}

/// Error signal from a frame source that cannot produce frames
#[derive(Debug, Clone, thiserror::Error)]
#[error("frame source error: {0}")]
pub struct SourceError(String);

impl SourceError {
    /// Creates a new source error with the given reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A live producer of RGBA frames at a fixed native resolution
///
/// `dimensions` returns `None` until the source's metadata is available (the
/// "ready" signal). An `Err` from `current_frame` is the "error" signal: the
/// controller discards the handle and re-acquires through its provider.
pub trait FrameSource {
    /// Native frame dimensions, or `None` while metadata is still pending
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Samples the source's current frame on demand
    fn current_frame(&mut self) -> Result<Frame, SourceError>;
}

/// Hands out frame sources, including replacements for broken ones
pub trait FrameProvider {
    /// Attempts to acquire a fresh frame source; `None` if unavailable right now
    fn acquire(&mut self) -> Option<Box<dyn FrameSource>>;
}

impl<F> FrameProvider for F
where
    F: FnMut() -> Option<Box<dyn FrameSource>>,
{
    fn acquire(&mut self) -> Option<Box<dyn FrameSource>> {
        self()
    }
}

/// Frame source backed by a caller-updated pixel buffer
///
/// Dimensions are fixed for the source's lifetime; the payload can be swapped
/// every tick with [`BufferSource::update`], mirroring a live stream whose
/// current frame is re-sampled on demand.
#[derive(Debug, Clone)]
pub struct BufferSource {
    width: u32,
    height: u32,
    data: Bytes,
}

impl BufferSource {
    /// Creates a buffer source from fixed dimensions and RGBA8 pixel data
    ///
    /// # Errors
    /// Fails if `data` is not exactly `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, data: Bytes) -> Result<Self, SourceError> {
        Self::check_payload(width, height, &data)?;
        Ok(Self { width, height, data })
    }

    /// Replaces the current frame payload
    ///
    /// # Errors
    /// Fails if the new payload does not match the fixed dimensions; the
    /// previous frame stays current in that case.
    pub fn update(&mut self, data: Bytes) -> Result<(), SourceError> {
        Self::check_payload(self.width, self.height, &data)?;
        self.data = data;
        Ok(())
    }

    fn check_payload(width: u32, height: u32, data: &Bytes) -> Result<(), SourceError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(SourceError::new(format!("payload is {} bytes, expected {expected} for {width}x{height}", data.len())));
        }
        Ok(())
    }
}

impl FrameSource for BufferSource {
    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn current_frame(&mut self) -> Result<Frame, SourceError> {
        Ok(Frame {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        })
    }
}
