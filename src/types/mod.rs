//! Value types for light control parameters.

mod hsl;
mod mask;
mod mired;
mod power;
mod rgb;
mod white;

pub use hsl::Hsl;
pub use mask::{ChannelMask, OperatingMode};
pub use mired::Mired;
pub use power::PowerMode;
pub use rgb::Rgb;
pub use white::WhiteValues;

/// Converts a floating point channel level to a wire byte.
///
/// NaN maps to zero; everything else is rounded and clamped to 0-255.
pub(crate) fn channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}
