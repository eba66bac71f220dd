//! Stereocorr is an out-of-core, multi-resolution stereo-correlation
//! engine.
//!
//! Two co-registered grayscale images go in as lazy, tile-addressable
//! views; a dense disparity map (per-pixel horizontal/vertical offset plus
//! validity) comes out the same way, so neither the inputs nor the output
//! ever need to be materialized in full. Matching runs coarse-to-fine over
//! image pyramids with a left-right consistency check and optional
//! subpixel refinement. Optional parallelism via the `rayon` feature;
//! SIMD kernels via the `simd` feature.

pub mod correlator;
pub mod geom;
pub mod image;
pub mod kernel;
pub mod prefilter;
pub mod raster;
pub mod util;
pub mod view;

mod disparity;
mod trace;

pub use correlator::{
    CorrelatorConfig, CorrelatorView, DiagnosticSink, PyramidCorrelator,
};
pub use disparity::{Disparity, DisparityMap};
pub use geom::Region;
pub use image::pyramid::ImagePyramid;
pub use image::{ImageView, OwnedImage};
pub use kernel::Metric;
pub use prefilter::{BlurPreFilter, LogPreFilter, NullPreFilter, PreFilter};
pub use raster::{
    convert, BufferView, BufferViewMut, ChannelType, ImageFormat, PixelBuffer, PixelLayout,
    ScalarPixel,
};
pub use util::{StereoError, StereoResult};
pub use view::{crop, edge_extend, CropView, EdgeExtendView, EdgePolicy, LazyView, RasterView};

#[cfg(feature = "image-io")]
pub use correlator::FileDiagnosticSink;
