//! Frame layout of the MagicHome TCP protocol.
//!
//! Every set command is a fixed sequence of bytes followed by a checksum, the
//! sum of all preceding bytes modulo 256. The status query is sent raw.
//!
//! A status response is at least 14 bytes:
//!
//! ```text
//! pos  0  1  2  3  4  5  6  7  8  9 10 11 12 13
//!     81 25 23 61 21 06 38 05 06 f9 01 00 0f 9d
//!      |  |  |  |  |  |  |  |  |  |  |  |  |  checksum (not verified)
//!      |  |  |  |  |  |  |  |  |  |  |  |  channel mask
//!      |  |  |  |  |  |  |  |  |  |  |  cold white
//!      |  |  |  |  |  |  |  |  |  |  firmware version
//!      |  |  |  |  |  |  |  |  |  warm white
//!      |  |  |  |  |  |  red, green, blue
//!      |  |  |  |  |  speed
//!      |  |  |  |  mode
//!      |  |  |  preset pattern
//!      |  |  on (23) / off
//!      |  hardware version
//!      head
//! ```

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::errors::Error;
use crate::types::{ChannelMask, Rgb, WhiteValues};

type Result<T> = std::result::Result<T, Error>;

/// TCP port the controllers listen on.
pub const PORT: u16 = 5577;

const POWER_ON: u8 = 0x23;
const POWER_OFF: u8 = 0x24;
const TERMINATOR: u8 = 0x0F;

/// Leading byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Opcode {
    #[strum(serialize = "setColor")]
    SetColor = 0x31,
    #[strum(serialize = "setCct")]
    SetCct = 0x35,
    #[strum(serialize = "power")]
    Power = 0x71,
    #[strum(serialize = "queryState")]
    Query = 0x81,
}

impl Opcode {
    /// Look up the opcode a frame starts with.
    pub fn create(value: u8) -> Option<Self> {
        Opcode::iter().find(|opcode| *opcode as u8 == value)
    }

    pub fn byte(&self) -> u8 {
        *self as u8
    }
}

/// Layout of the color frame, negotiated once per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireVariant {
    /// `[0x31, r, g, b, ww, mask, 0x0F]`, 8 bytes with the checksum.
    Compact,
    /// `[0x31, r, g, b, ww, cw, mask, 0x0F]`, 9 bytes with the checksum.
    Extended,
}

/// Sum of all bytes modulo 256.
///
/// # Examples
///
/// ```
/// use magichome_lights_rs::codec::checksum;
///
/// assert_eq!(checksum(&[0x71, 0x23, 0x0F]), 0xA3);
/// assert_eq!(checksum(&[0x31, 255, 0, 0, 0, 0xF0, 0x0F]), 0x2F);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Append the checksum to a frame.
pub fn with_checksum(frame: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frame.len() + 1);
    bytes.extend_from_slice(frame);
    bytes.push(checksum(frame));
    bytes
}

/// A command understood by the controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Power(bool),
    Query,
    SetColor {
        rgb: Rgb,
        white: WhiteValues,
        mask: ChannelMask,
        variant: WireVariant,
    },
    /// Dedicated CCT strips: cold share and brightness, both in percent.
    SetCct { temperature: u8, brightness: u8 },
}

impl Command {
    /// The frame without its checksum.
    ///
    /// ```
    /// use magichome_lights_rs::codec::Command;
    ///
    /// assert_eq!(Command::Power(true).frame(), vec![0x71, 0x23, 0x0F]);
    /// assert_eq!(Command::Query.frame(), vec![0x81, 0x8A, 0x8B]);
    /// ```
    pub fn frame(&self) -> Vec<u8> {
        match self {
            Command::Power(on) => vec![
                Opcode::Power.byte(),
                if *on { POWER_ON } else { POWER_OFF },
                TERMINATOR,
            ],
            Command::Query => vec![Opcode::Query.byte(), 0x8A, 0x8B],
            Command::SetColor {
                rgb,
                white,
                mask,
                variant: WireVariant::Compact,
            } => vec![
                Opcode::SetColor.byte(),
                rgb.red,
                rgb.green,
                rgb.blue,
                white.warm_white,
                mask.byte(),
                TERMINATOR,
            ],
            Command::SetColor {
                rgb,
                white,
                mask,
                variant: WireVariant::Extended,
            } => vec![
                Opcode::SetColor.byte(),
                rgb.red,
                rgb.green,
                rgb.blue,
                white.warm_white,
                white.cold_white,
                mask.byte(),
                TERMINATOR,
            ],
            Command::SetCct {
                temperature,
                brightness,
            } => vec![
                Opcode::SetCct.byte(),
                0xB1,
                (*temperature).min(100),
                (*brightness).min(100),
                0x00,
                0x00,
                0x00,
                0x03,
            ],
        }
    }

    /// Set commands carry a checksum, the status query does not.
    pub fn uses_checksum(&self) -> bool {
        !matches!(self, Command::Query)
    }

    /// The bytes as written to the socket.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.uses_checksum() {
            with_checksum(&self.frame())
        } else {
            self.frame()
        }
    }
}

/// Status reported by a controller in reply to [`Command::Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub hardware_version: u8,
    pub is_on: bool,
    pub pattern: u8,
    pub mode: u8,
    pub speed: u8,
    pub rgb: Rgb,
    pub white: WhiteValues,
    pub firmware_version: u8,
    pub mask: ChannelMask,
}

impl DeviceResponse {
    /// Minimum length of a status response.
    pub const LEN: usize = 14;

    /// Parse a status response.
    ///
    /// Fields are read at fixed offsets; the head byte and the trailing
    /// checksum are not verified.
    ///
    /// ```
    /// use magichome_lights_rs::codec::DeviceResponse;
    ///
    /// let bytes = [0x81, 0x25, 0x23, 0x61, 0x21, 0x06, 0x38, 0x05, 0x06, 0xF9, 0x01, 0x00, 0x0F, 0x9D];
    /// let status = DeviceResponse::parse(&bytes).unwrap();
    /// assert!(status.is_on);
    /// assert_eq!(status.rgb.red(), 0x38);
    /// assert_eq!(status.white.warm_white(), 0xF9);
    ///
    /// assert!(DeviceResponse::parse(&bytes[..13]).is_err());
    /// ```
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::LEN {
            return Err(Error::Parse(format!(
                "expected at least {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }

        Ok(DeviceResponse {
            hardware_version: bytes[1],
            is_on: bytes[2] == POWER_ON,
            pattern: bytes[3],
            mode: bytes[4],
            speed: bytes[5],
            rgb: Rgb::new(bytes[6], bytes[7], bytes[8]),
            white: WhiteValues::new(bytes[9], bytes[11]),
            firmware_version: bytes[10],
            mask: ChannelMask::new(bytes[12]),
        })
    }
}
