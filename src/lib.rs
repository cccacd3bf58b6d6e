//! # magichome_lights_rs
//!
//! An async Rust library for controlling MagicHome LED controllers over TCP.
//!
//! The crate keeps a per-device model of the light and reconciles it with the
//! hardware. Rapid changes from a user interface (hue, then saturation, then
//! brightness) are coalesced into a single write, the write is checked by
//! reading the device back, and colors are translated between the
//! hue/saturation/brightness model and the controller's native RGB plus
//! warm/cold white channels.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::net::Ipv4Addr;
//! use magichome_lights_rs::{ControllerConfig, DeviceController, DeviceIdentity, Intent};
//!
//! async fn control_light() -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = DeviceIdentity::new("600194A1B2C3", Ipv4Addr::new(192, 168, 1, 40), "AK001-ZJ2145");
//!     let light = DeviceController::new(identity, None, ControllerConfig::default());
//!
//!     // Green at 80%, sent as one frame after the debounce window
//!     let mut intent = Intent::new();
//!     intent.power(true);
//!     intent.hue(120.0);
//!     intent.saturation(100.0);
//!     intent.brightness(80.0);
//!     light.set_intent(&intent)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Runtime Agnostic**: Works with tokio, async-std, or smol async runtimes
//! - **Command Coalescing**: Debounced writes with a read-back consistency check, see [`CommandScheduler`]
//! - **Color Conversion**: HSB to RGB/warm/cold white and back, see [`color`]
//! - **LED Layouts**: RGB, RGBW, RGBWW, simultaneous RGBWW and CCT strips via [`LedProfile`]
//! - **Device Registry**: Track controllers by unique ID across IP changes with [`DeviceRegistry`]
//! - **Diagnostics**: Per-device frame history with [`MessageHistory`]
//!
//! ## Communication
//!
//! Controllers listen on TCP port 5577. Every operation opens a short-lived
//! connection; operations for one device are strictly serialized. See
//! [`codec`] for the frame layout.
//!
//! ## Runtime Selection
//!
//! Select the async runtime with feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! magichome-lights-rs = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! magichome-lights-rs = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! async-std = { version = "1.12", features = ["attributes"] }
//! ```
//!
//! ### Using smol
//!
//! ```toml
//! [dependencies]
//! magichome-lights-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! smol = "2"
//! ```
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime

pub mod codec;
pub mod color;
mod config;
mod controller;
mod errors;
mod history;
mod identity;
mod registry;
pub mod runtime;
mod scheduler;
mod state;
mod transition;
mod transport;
mod types;

// Re-export public API
pub use config::{ColorThresholds, ControllerConfig, LedProfile, SchedulerTiming};
pub use controller::{Availability, DeviceController};
pub use errors::Error;
pub use history::{HistoryEntry, HistorySummary, MessageHistory, MessageType};
pub use identity::DeviceIdentity;
pub use registry::DeviceRegistry;
pub use scheduler::{CommandScheduler, CommitTarget, Phase};
pub use state::{Intent, LightState};
pub use transition::{Transition, classify};
pub use transport::{Reply, Transport};
pub use types::{ChannelMask, Hsl, Mired, OperatingMode, PowerMode, Rgb, WhiteValues};
