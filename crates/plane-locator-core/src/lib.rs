//! Shared vocabulary of the plane-locator crates.
//!
//! A located plane is described by a [`Homography`] from reference
//! coordinates into the scene and the [`Quad`] it sweeps out there. This
//! crate holds those two types, the solvers that produce a homography from
//! [`Correspondence`]s, the convexity / aspect / distortion checks applied to
//! every candidate quad, the grayscale buffers both pipelines read from, and
//! the [`Status`] codes reported at the API boundary.
//!
//! Feature extraction, edge and contour search, and image decoding live in
//! the sibling crates; nothing here touches pixels beyond the raw-buffer to
//! grayscale conversion in [`PixelBuffer::to_gray`].

mod correspondence;
mod homography;
mod image;
mod logger;
mod quad;
mod status;
mod tracked;

pub use correspondence::{correspondences_from_arrays, Correspondence};
pub use homography::{estimate_homography_dlt, homography_from_4pt, Homography};
pub use image::{GrayImage, GrayImageView, ImageError, PixelBuffer, PixelFormat};
pub use quad::{
    order_points_clockwise, AspectConstraint, DistortionBounds, Quad, QuadRejection,
};
pub use status::Status;
pub use tracked::TrackedDetection;

#[cfg(feature = "tracing")]
pub use logger::{init_tracing, TraceFormat};

pub use logger::init_with_level;
