//! Conversions between the hue/saturation/brightness model and the native
//! RGB + warm/cold white channels of the controllers.
//!
//! Every function here is pure. Thresholds are passed in explicitly.
//!
//! Brightness is the HSB value: a color at 100% brightness has its strongest
//! channel at 255. With that choice the color-only path is exactly invertible
//! over the whole RGB cube, and the white-curve path over every pair of white
//! levels. Thresholding is lossy by nature; many hue/saturation pairs below
//! the white threshold collapse onto the same white output.

use serde::{Deserialize, Serialize};

use crate::config::ColorThresholds;
use crate::types::{ChannelMask, Hsl, Mired, OperatingMode, Rgb, WhiteValues, channel};

/// Device-native color: what a set-color frame carries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeColor {
    pub rgb: Rgb,
    pub white: WhiteValues,
    pub mask: ChannelMask,
}

impl NativeColor {
    fn color(rgb: Rgb) -> Self {
        NativeColor {
            rgb,
            white: WhiteValues::default(),
            mask: ChannelMask::COLOR,
        }
    }

    fn white(white: WhiteValues) -> Self {
        NativeColor {
            rgb: Rgb::default(),
            white,
            mask: ChannelMask::WHITE,
        }
    }
}

/// The presentation-layer view of a native color.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsbReading {
    pub hsl: Hsl,
    pub brightness: f64,
    pub color_temperature: Option<Mired>,
}

/// Map hue/saturation/brightness onto native channels.
///
/// `temperature` is only consulted in [`OperatingMode::TemperatureMode`]; when it
/// is absent there, the white balance is estimated from the hue.
///
/// # Examples
///
/// ```
/// use magichome_lights_rs::{ChannelMask, ColorThresholds, Hsl, OperatingMode, Rgb};
/// use magichome_lights_rs::color::hsb_to_native;
///
/// let thresholds = ColorThresholds::default();
/// let red = Hsl::create(0.0, 100.0).unwrap();
///
/// let native = hsb_to_native(&red, 100.0, None, OperatingMode::RgbMode, &thresholds);
/// assert_eq!(native.rgb, Rgb::new(255, 0, 0));
/// assert_eq!(native.mask, ChannelMask::COLOR);
///
/// let warm = Hsl::create(31.0, 33.0).unwrap();
/// let native = hsb_to_native(&warm, 100.0, None, OperatingMode::Unknown, &thresholds);
/// assert!(native.rgb.is_zero());
/// assert_eq!(native.white.warm_white(), 255);
/// assert_eq!(native.mask, ChannelMask::WHITE);
/// ```
pub fn hsb_to_native(
    hsl: &Hsl,
    brightness: f64,
    temperature: Option<Mired>,
    mode: OperatingMode,
    thresholds: &ColorThresholds,
) -> NativeColor {
    let brightness = clamp_percent(brightness);

    if mode == OperatingMode::TemperatureMode {
        let white = match temperature {
            Some(temperature) => temperature_to_white(temperature, brightness),
            None => scale_white(hue_to_white_temperature(hsl.hue), brightness),
        };
        return NativeColor::white(white);
    }

    let rgb = hsv_to_rgb(hsl.hue, hsl.saturation, brightness);
    if mode == OperatingMode::RgbMode {
        return NativeColor::color(rgb);
    }

    if let Some(white) = marker_white(hsl, brightness) {
        return NativeColor::white(white);
    }

    let saturation = clamp_percent(hsl.saturation);
    let estimate = hue_to_white_temperature(hsl.hue);

    if mode == OperatingMode::Simultaneous {
        if saturation < thresholds.color_off_threshold_simultaneous {
            return NativeColor::white(scale_white(estimate, brightness));
        }
        let blend_below = thresholds.color_white_threshold_simultaneous;
        if thresholds.simultaneous_color_white && saturation < blend_below {
            let share = 1.0 - saturation / blend_below;
            return NativeColor {
                rgb,
                white: scale_white(estimate, brightness * share),
                mask: ChannelMask::BOTH,
            };
        }
        return NativeColor::color(rgb);
    }

    if saturation < thresholds.color_white_threshold {
        return NativeColor::white(scale_white(estimate, brightness));
    }
    NativeColor::color(rgb)
}

/// Map native channels back onto hue/saturation/brightness.
///
/// # Examples
///
/// ```
/// use magichome_lights_rs::{OperatingMode, Rgb, WhiteValues};
/// use magichome_lights_rs::color::native_to_hsb;
///
/// let reading = native_to_hsb(Rgb::new(0, 0, 255), WhiteValues::default(), OperatingMode::RgbMode);
/// assert_eq!(reading.hsl.hue(), 240.0);
/// assert_eq!(reading.hsl.saturation(), 100.0);
/// assert_eq!(reading.brightness, 100.0);
///
/// let reading = native_to_hsb(Rgb::default(), WhiteValues::new(0, 255), OperatingMode::Unknown);
/// assert_eq!((reading.hsl.hue(), reading.hsl.saturation()), (208.0, 17.0));
/// ```
pub fn native_to_hsb(rgb: Rgb, white: WhiteValues, mode: OperatingMode) -> HsbReading {
    if mode == OperatingMode::TemperatureMode {
        let (temperature, brightness) = white_to_temperature(white);
        return HsbReading {
            hsl: temperature_display_point(temperature),
            brightness,
            color_temperature: Some(temperature),
        };
    }

    if rgb.is_zero() && !white.is_zero() {
        let marker = match white.warm_white.cmp(&white.cold_white) {
            std::cmp::Ordering::Greater => Hsl::WARM_WHITE,
            std::cmp::Ordering::Less => Hsl::COLD_WHITE,
            std::cmp::Ordering::Equal => Hsl::NEUTRAL_WHITE,
        };
        let total = f64::from(white.warm_white) + f64::from(white.cold_white);
        return HsbReading {
            hsl: Hsl::from_pair(marker),
            brightness: clamp_percent(total / 255.0 * 100.0),
            color_temperature: None,
        };
    }

    let (hue, saturation, value) = rgb_to_hsv(rgb);
    let luminance = (f64::from(rgb.max()) + f64::from(rgb.min())) / 2.0 / 255.0 * 100.0;
    HsbReading {
        hsl: Hsl::from_parts(hue, saturation, luminance),
        brightness: value,
        color_temperature: None,
    }
}

/// White balance estimated from the hue alone.
///
/// The hue circle is split in four 90° bands. In each band one white group
/// stays at full power while the other ramps linearly, so that red/orange
/// hues read as warm and cyan/blue hues as cold white.
///
/// ```
/// use magichome_lights_rs::WhiteValues;
/// use magichome_lights_rs::color::hue_to_white_temperature;
///
/// assert_eq!(hue_to_white_temperature(0.0), WhiteValues::new(255, 0));
/// assert_eq!(hue_to_white_temperature(90.0), WhiteValues::new(255, 255));
/// assert_eq!(hue_to_white_temperature(180.0), WhiteValues::new(0, 255));
/// ```
pub fn hue_to_white_temperature(hue: f64) -> WhiteValues {
    let hue = if hue.is_nan() { 0.0 } else { hue.clamp(0.0, 360.0) };
    let (warm, cold) = if hue <= 90.0 {
        (255.0, 255.0 * hue / 90.0)
    } else if hue <= 180.0 {
        (255.0 * (1.0 - (hue - 90.0) / 90.0), 255.0)
    } else if hue <= 270.0 {
        (255.0 * (hue - 180.0) / 90.0, 255.0)
    } else {
        (255.0, 255.0 * (1.0 - (hue - 270.0) / 90.0))
    };
    WhiteValues::new(channel(warm), channel(cold))
}

/// White levels for a color temperature at the given brightness.
///
/// The dominant group runs at the brightness level; the other one is scaled
/// down towards the ends of the range. 320 mired lights both at full level.
pub fn temperature_to_white(temperature: Mired, brightness: f64) -> WhiteValues {
    let level = clamp_percent(brightness) / 100.0 * 255.0;
    let ratio = temperature.cold_ratio();
    if ratio <= 0.5 {
        WhiteValues::new(channel(level), channel(level * 2.0 * ratio))
    } else {
        WhiteValues::new(channel(level * 2.0 * (1.0 - ratio)), channel(level))
    }
}

/// Inverse of [`temperature_to_white`]: color temperature and brightness.
///
/// ```
/// use magichome_lights_rs::WhiteValues;
/// use magichome_lights_rs::color::white_to_temperature;
///
/// let (temperature, brightness) = white_to_temperature(WhiteValues::new(255, 0));
/// assert_eq!(temperature.value(), 500.0);
/// assert_eq!(brightness, 100.0);
/// ```
pub fn white_to_temperature(white: WhiteValues) -> (Mired, f64) {
    let warm = f64::from(white.warm_white);
    let cold = f64::from(white.cold_white);
    let level = warm.max(cold);
    if level == 0.0 {
        return (Mired::from_cold_ratio(0.5), 0.0);
    }

    let ratio = if warm >= cold {
        cold / (2.0 * warm)
    } else {
        1.0 - warm / (2.0 * cold)
    };
    (Mired::from_cold_ratio(ratio), level / 255.0 * 100.0)
}

/// Cold share of a temperature in percent, as carried by the CCT frame.
pub fn temperature_percent(temperature: Mired) -> u8 {
    channel(temperature.cold_ratio() * 100.0).min(100)
}

/// Hue/saturation shown for a white-only color temperature.
pub(crate) fn temperature_display_point(temperature: Mired) -> Hsl {
    let ratio = temperature.cold_ratio();
    let (warm_hue, warm_saturation) = Hsl::WARM_WHITE;
    let (cold_hue, cold_saturation) = Hsl::COLD_WHITE;
    if ratio <= 0.5 {
        Hsl::from_pair((warm_hue, warm_saturation * (1.0 - 2.0 * ratio)))
    } else {
        Hsl::from_pair((cold_hue, cold_saturation * (2.0 * ratio - 1.0)))
    }
}

fn marker_white(hsl: &Hsl, brightness: f64) -> Option<WhiteValues> {
    let level = brightness / 100.0 * 255.0;
    if hsl.is_marker(Hsl::WARM_WHITE) {
        Some(WhiteValues::new(channel(level), 0))
    } else if hsl.is_marker(Hsl::COLD_WHITE) {
        Some(WhiteValues::new(0, channel(level)))
    } else if hsl.is_marker(Hsl::NEUTRAL_WHITE) {
        let half = channel(level / 2.0);
        Some(WhiteValues::new(half, half))
    } else {
        None
    }
}

fn scale_white(white: WhiteValues, brightness: f64) -> WhiteValues {
    let factor = clamp_percent(brightness) / 100.0;
    WhiteValues::new(
        channel(f64::from(white.warm_white) * factor),
        channel(f64::from(white.cold_white) * factor),
    )
}

fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let v = clamp_percent(value) / 100.0 * 255.0;
    let c = v * clamp_percent(saturation) / 100.0;
    let h = normalize_hue(hue) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h.floor() as u8 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Rgb::new(channel(r + m), channel(g + m), channel(b + m))
}

fn rgb_to_hsv(rgb: Rgb) -> (f64, f64, f64) {
    let (r, g, b) = (
        f64::from(rgb.red),
        f64::from(rgb.green),
        f64::from(rgb.blue),
    );
    let max = f64::from(rgb.max());
    let delta = max - f64::from(rgb.min());

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max * 100.0 };

    (hue, saturation, max / 255.0 * 100.0)
}

fn normalize_hue(hue: f64) -> f64 {
    if hue.is_nan() {
        0.0
    } else {
        hue.rem_euclid(360.0)
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ColorThresholds {
        ColorThresholds::default()
    }

    fn hue_distance(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test]
    fn test_rgb_round_trip_full_cube() {
        for red in 0..=255u8 {
            for green in 0..=255u8 {
                for blue in 0..=255u8 {
                    let rgb = Rgb::new(red, green, blue);
                    let reading = native_to_hsb(rgb, WhiteValues::default(), OperatingMode::RgbMode);
                    let native = hsb_to_native(
                        &reading.hsl,
                        reading.brightness,
                        None,
                        OperatingMode::RgbMode,
                        &thresholds(),
                    );
                    assert_eq!(native.rgb, rgb);
                    assert!(native.white.is_zero());
                    assert_eq!(native.mask, ChannelMask::COLOR);
                }
            }
        }
    }

    #[test]
    fn test_white_round_trip_full_square() {
        for warm in 0..=255u8 {
            for cold in 0..=255u8 {
                let white = WhiteValues::new(warm, cold);
                let reading = native_to_hsb(
                    Rgb::default(),
                    white,
                    OperatingMode::TemperatureMode,
                );
                let native = hsb_to_native(
                    &reading.hsl,
                    reading.brightness,
                    reading.color_temperature,
                    OperatingMode::TemperatureMode,
                    &thresholds(),
                );
                assert_eq!(native.white, white, "warm {warm} cold {cold}");
                assert!(native.rgb.is_zero());
                assert_eq!(native.mask, ChannelMask::WHITE);
            }
        }
    }

    #[test]
    fn test_hsb_round_trip_outside_threshold_bands() {
        let lowest = thresholds().color_white_threshold.ceil() as u8;
        for hue in 0..360u16 {
            for saturation in lowest..=100u8 {
                let pair = (f64::from(hue), f64::from(saturation));
                if pair == Hsl::WARM_WHITE || pair == Hsl::COLD_WHITE {
                    continue;
                }
                let hsl = Hsl::create(pair.0, pair.1).unwrap();
                for brightness in 1..=100u8 {
                    let native = hsb_to_native(
                        &hsl,
                        f64::from(brightness),
                        None,
                        OperatingMode::Unknown,
                        &thresholds(),
                    );
                    assert_eq!(native.mask, ChannelMask::COLOR);

                    let reading = native_to_hsb(native.rgb, native.white, OperatingMode::Unknown);
                    assert_eq!(reading.brightness.round() as u8, brightness);

                    // Every channel is rounded by at most half a step, so the
                    // error shrinks as the 8-bit value and chroma grow.
                    let max = f64::from(native.rgb.max());
                    let chroma = max - f64::from(native.rgb.min());
                    let saturation_error = (reading.hsl.saturation() - pair.1).abs();
                    assert!(
                        saturation_error <= 150.0 / max + 1e-6,
                        "hue {hue} saturation {saturation} brightness {brightness}"
                    );
                    if chroma >= 2.0 {
                        assert!(
                            hue_distance(reading.hsl.hue(), pair.0) <= 90.0 / (chroma - 1.0) + 1e-6,
                            "hue {hue} saturation {saturation} brightness {brightness}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_hsb_round_trip_is_tight_at_full_brightness() {
        for hue in (0..360u16).step_by(5) {
            for saturation in 50..=100u8 {
                let hsl = Hsl::create(f64::from(hue), f64::from(saturation)).unwrap();
                let native = hsb_to_native(&hsl, 100.0, None, OperatingMode::Unknown, &thresholds());
                let reading = native_to_hsb(native.rgb, native.white, OperatingMode::Unknown);
                assert!(hue_distance(reading.hsl.hue(), f64::from(hue)) < 1.5);
                assert!((reading.hsl.saturation() - f64::from(saturation)).abs() < 1.0);
            }
        }
    }

    #[test]
    fn test_marker_round_trip() {
        for marker in [Hsl::WARM_WHITE, Hsl::COLD_WHITE, Hsl::NEUTRAL_WHITE] {
            for mode in [OperatingMode::Unknown, OperatingMode::Simultaneous] {
                for brightness in 1..=100u8 {
                    let native = hsb_to_native(
                        &Hsl::from_pair(marker),
                        f64::from(brightness),
                        None,
                        mode,
                        &thresholds(),
                    );
                    assert!(native.rgb.is_zero());
                    assert_eq!(native.mask, ChannelMask::WHITE);

                    let reading = native_to_hsb(native.rgb, native.white, mode);
                    assert_eq!((reading.hsl.hue(), reading.hsl.saturation()), marker);
                    assert_eq!(reading.brightness.round() as u8, brightness);
                }
            }
        }
    }

    #[test]
    fn test_low_saturation_switches_to_white() {
        let hsl = Hsl::create(0.0, 5.0).unwrap();
        let native = hsb_to_native(&hsl, 100.0, None, OperatingMode::Unknown, &thresholds());
        assert!(native.rgb.is_zero());
        assert_eq!(native.white, WhiteValues::new(255, 0));
        assert_eq!(native.mask, ChannelMask::WHITE);

        let native = hsb_to_native(&hsl, 50.0, None, OperatingMode::Unknown, &thresholds());
        assert_eq!(native.white, WhiteValues::new(128, 0));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let hsl = Hsl::create(120.0, 15.0).unwrap();
        let native = hsb_to_native(&hsl, 100.0, None, OperatingMode::Unknown, &thresholds());
        assert_eq!(native.mask, ChannelMask::COLOR);

        let strict = ColorThresholds {
            color_white_threshold: 20.0,
            ..ColorThresholds::default()
        };
        let native = hsb_to_native(&hsl, 100.0, None, OperatingMode::Unknown, &strict);
        assert_eq!(native.mask, ChannelMask::WHITE);
    }

    #[test]
    fn test_rgb_mode_never_switches_to_white() {
        for hsl in [
            Hsl::from_pair(Hsl::NEUTRAL_WHITE),
            Hsl::from_pair(Hsl::WARM_WHITE),
            Hsl::create(200.0, 1.0).unwrap(),
        ] {
            let native = hsb_to_native(&hsl, 100.0, None, OperatingMode::RgbMode, &thresholds());
            assert_eq!(native.mask, ChannelMask::COLOR);
            assert!(native.white.is_zero());
        }
        let gray = hsb_to_native(
            &Hsl::from_pair(Hsl::NEUTRAL_WHITE),
            100.0,
            None,
            OperatingMode::RgbMode,
            &thresholds(),
        );
        assert_eq!(gray.rgb, Rgb::new(255, 255, 255));
    }

    #[test]
    fn test_simultaneous_bands() {
        let off = hsb_to_native(
            &Hsl::create(90.0, 2.0).unwrap(),
            100.0,
            None,
            OperatingMode::Simultaneous,
            &thresholds(),
        );
        assert!(off.rgb.is_zero());
        assert_eq!(off.white, WhiteValues::new(255, 255));
        assert_eq!(off.mask, ChannelMask::WHITE);

        let hsl = Hsl::create(90.0, 30.0).unwrap();
        let blended = hsb_to_native(&hsl, 100.0, None, OperatingMode::Simultaneous, &thresholds());
        assert_eq!(blended.rgb, hsv_to_rgb(90.0, 30.0, 100.0));
        assert_eq!(blended.white, WhiteValues::new(102, 102));
        assert_eq!(blended.mask, ChannelMask::BOTH);

        let no_blend = ColorThresholds {
            simultaneous_color_white: false,
            ..ColorThresholds::default()
        };
        let plain = hsb_to_native(&hsl, 100.0, None, OperatingMode::Simultaneous, &no_blend);
        assert_eq!(plain.mask, ChannelMask::COLOR);
        assert!(plain.white.is_zero());
    }

    #[test]
    fn test_hue_estimate_bands() {
        assert_eq!(hue_to_white_temperature(135.0), WhiteValues::new(128, 255));
        assert_eq!(hue_to_white_temperature(270.0), WhiteValues::new(255, 255));
        assert_eq!(hue_to_white_temperature(315.0), WhiteValues::new(255, 128));
        assert_eq!(hue_to_white_temperature(360.0), WhiteValues::new(255, 0));
        assert_eq!(hue_to_white_temperature(f64::NAN), WhiteValues::new(255, 0));
    }

    #[test]
    fn test_temperature_curve_ends() {
        let warmest = Mired::create(Mired::MAX).unwrap();
        let coldest = Mired::create(Mired::MIN).unwrap();
        let middle = Mired::create(320.0).unwrap();
        assert_eq!(temperature_to_white(warmest, 100.0), WhiteValues::new(255, 0));
        assert_eq!(temperature_to_white(coldest, 100.0), WhiteValues::new(0, 255));
        assert_eq!(temperature_to_white(middle, 100.0), WhiteValues::new(255, 255));
        assert_eq!(temperature_to_white(middle, 0.0), WhiteValues::new(0, 0));
        assert_eq!(temperature_percent(warmest), 0);
        assert_eq!(temperature_percent(coldest), 100);
    }

    #[test]
    fn test_temperature_mode_without_temperature_uses_hue() {
        let hsl = Hsl::create(180.0, 40.0).unwrap();
        let native = hsb_to_native(&hsl, 100.0, None, OperatingMode::TemperatureMode, &thresholds());
        assert_eq!(native.white, WhiteValues::new(0, 255));
        assert!(native.rgb.is_zero());
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        let hsl = Hsl::from_parts(f64::NAN, 250.0, 50.0);
        let native = hsb_to_native(&hsl, 400.0, None, OperatingMode::RgbMode, &thresholds());
        assert_eq!(native.rgb, Rgb::new(255, 0, 0));

        let native = hsb_to_native(&hsl, -3.0, None, OperatingMode::RgbMode, &thresholds());
        assert!(native.rgb.is_zero());
    }

    #[test]
    fn test_temperature_reading_display_point() {
        let reading = native_to_hsb(
            Rgb::default(),
            WhiteValues::new(255, 0),
            OperatingMode::TemperatureMode,
        );
        assert_eq!((reading.hsl.hue(), reading.hsl.saturation()), Hsl::WARM_WHITE);
        assert_eq!(reading.color_temperature, Mired::create(500.0));

        let reading = native_to_hsb(
            Rgb::default(),
            WhiteValues::new(0, 0),
            OperatingMode::TemperatureMode,
        );
        assert_eq!(reading.brightness, 0.0);
    }
}
