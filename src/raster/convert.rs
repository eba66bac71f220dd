//! Pixel format conversion.
//!
//! [`convert`] is the single primitive every higher-level read, write and
//! materialization routes through. It copies pixels between two runtime
//! buffer views, adapting channel layout and channel numeric type. Channel
//! adaptation decomposes a pixel into intensity channels plus optional
//! alpha: gray broadcasts to color, color reduces to gray by averaging,
//! alpha is dropped or synthesized as fully opaque.

use crate::raster::{BufferView, BufferViewMut, ChannelType, PixelLayout};
use crate::util::{StereoError, StereoResult};

/// Copies `src` pixels into `dst`, converting channel numeric type and
/// pixel layout as needed.
///
/// With `rescale == false` samples are converted by direct cast, clamped to
/// the destination's representable range; with `rescale == true` they are
/// linearly mapped between the natural ranges of the two channel types
/// (`U8` [0,255], `U16` [0,65535], `I16` [-32768,32767], `F32` [0,1]).
///
/// Fails with [`StereoError::ConversionSizeMismatch`] when the buffers
/// differ in spatial size, and with [`StereoError::IncompatibleFormat`]
/// when a multi-plane, multi-channel source would have to collapse into a
/// single-channel destination (no defined reduction exists across planes).
pub fn convert(dst: &mut BufferViewMut<'_>, src: &BufferView<'_>, rescale: bool) -> StereoResult<()> {
    let sf = *src.format();
    let df = *dst.format();

    if !sf.same_size(&df) {
        return Err(StereoError::ConversionSizeMismatch {
            dst_cols: df.cols,
            dst_rows: df.rows,
            dst_planes: df.planes,
            src_cols: sf.cols,
            src_rows: sf.rows,
            src_planes: sf.planes,
        });
    }
    if sf.planes > 1 && sf.channels() > 1 && df.channels() == 1 {
        return Err(StereoError::IncompatibleFormat(
            "multi-plane, multi-channel source cannot reduce to a single-channel destination",
        ));
    }

    let src_opaque = sf.channel_type.natural_range().1;

    for p in 0..sf.planes as usize {
        for j in 0..sf.rows as usize {
            for i in 0..sf.cols as usize {
                let mut channels = [0.0f64; 4];
                for (c, slot) in channels[..sf.channels()].iter_mut().enumerate() {
                    *slot = src.read_channel(i, j, p, c);
                }
                let mapped = map_pixel(&channels, sf.pixel_layout, df.pixel_layout, src_opaque);
                for (c, value) in mapped[..df.channels()].iter().enumerate() {
                    let out = convert_value(*value, sf.channel_type, df.channel_type, rescale);
                    dst.write_channel(i, j, p, c, out);
                }
            }
        }
    }

    Ok(())
}

/// Adapts one pixel's channels from `src` layout to `dst` layout. Values
/// stay in the source channel type's domain; `opaque` is the source
/// domain's fully-opaque alpha.
fn map_pixel(channels: &[f64; 4], src: PixelLayout, dst: PixelLayout, opaque: f64) -> [f64; 4] {
    let src_colors = src.color_channels();
    let alpha = if src.has_alpha() {
        channels[src_colors]
    } else {
        opaque
    };

    let mut out = [0.0f64; 4];
    let dst_colors = dst.color_channels();
    if src_colors == dst_colors {
        out[..dst_colors].copy_from_slice(&channels[..dst_colors]);
    } else if src_colors == 1 {
        for slot in out[..dst_colors].iter_mut() {
            *slot = channels[0];
        }
    } else {
        let sum: f64 = channels[..src_colors].iter().sum();
        out[0] = sum / src_colors as f64;
    }
    if dst.has_alpha() {
        out[dst_colors] = alpha;
    }
    out
}

fn convert_value(value: f64, from: ChannelType, to: ChannelType, rescale: bool) -> f64 {
    if !rescale || from == to {
        return value;
    }
    let (fmin, fmax) = from.natural_range();
    let (tmin, tmax) = to.natural_range();
    let scaled = (value - fmin) / (fmax - fmin) * (tmax - tmin) + tmin;
    // Integer destinations round to nearest so rescaled round trips through
    // wider types reproduce the source exactly.
    match to {
        ChannelType::F32 => scaled,
        _ => scaled.round(),
    }
}
