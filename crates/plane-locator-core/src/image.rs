use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Errors raised while interpreting a caller-supplied pixel buffer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("pixel buffer is empty")]
    EmptyBuffer,
    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(i64),
    #[error("pixel buffer too small (expected {expected} bytes, got {got})")]
    BufferTooSmall { expected: usize, got: usize },
}

/// Interleaved 8-bit pixel layouts accepted at the API boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Gray,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn from_channels(channels: i64) -> Result<Self, ImageError> {
        match channels {
            1 => Ok(Self::Gray),
            3 => Ok(Self::Rgb),
            4 => Ok(Self::Rgba),
            other => Err(ImageError::UnsupportedChannels(other)),
        }
    }

    #[inline]
    pub fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Raw, undecoded pixel data as handed over by a camera or decoder.
///
/// Dimensions are signed so that malformed caller input can be reported
/// instead of silently wrapping.
#[derive(Clone, Copy, Debug)]
pub struct PixelBuffer<'a> {
    pub width: i64,
    pub height: i64,
    pub channels: i64,
    pub data: &'a [u8],
}

impl<'a> PixelBuffer<'a> {
    pub fn new(width: i64, height: i64, channels: i64, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// Validate the buffer description and convert it to grayscale.
    ///
    /// Color buffers use the BT.601 luma weights in 14-bit fixed point
    /// (`0.299 R + 0.587 G + 0.114 B`). The alpha channel is ignored.
    pub fn to_gray(&self) -> Result<GrayImage, ImageError> {
        if self.data.is_empty() {
            return Err(ImageError::EmptyBuffer);
        }
        if self.width <= 0 || self.height <= 0 {
            return Err(ImageError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let format = PixelFormat::from_channels(self.channels)?;
        let w = usize::try_from(self.width).map_err(|_| self.invalid_dims())?;
        let h = usize::try_from(self.height).map_err(|_| self.invalid_dims())?;
        let pixels = w.checked_mul(h).ok_or_else(|| self.invalid_dims())?;
        let expected = pixels
            .checked_mul(format.channels())
            .ok_or_else(|| self.invalid_dims())?;
        if self.data.len() < expected {
            return Err(ImageError::BufferTooSmall {
                expected,
                got: self.data.len(),
            });
        }

        let data = match format {
            PixelFormat::Gray => self.data[..pixels].to_vec(),
            PixelFormat::Rgb | PixelFormat::Rgba => self.data[..expected]
                .chunks_exact(format.channels())
                .map(|px| luma_bt601(px[0], px[1], px[2]))
                .collect(),
        };

        Ok(GrayImage {
            width: w,
            height: h,
            data,
        })
    }

    fn invalid_dims(&self) -> ImageError {
        ImageError::InvalidDimensions {
            width: self.width,
            height: self.height,
        }
    }
}

#[inline]
fn luma_bt601(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    ((r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14) as u8
}
