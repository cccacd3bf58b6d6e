//! Per-device controller.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::codec::{Command, DeviceResponse, WireVariant};
use crate::color::{self, NativeColor};
use crate::config::{ControllerConfig, LedProfile};
use crate::errors::Error;
use crate::history::MessageHistory;
use crate::identity::DeviceIdentity;
use crate::runtime;
use crate::scheduler::{CommandScheduler, CommitTarget, Phase};
use crate::state::{Intent, LightState};
use crate::transition::{Transition, classify};
use crate::transport::{Reply, Transport};
use crate::types::OperatingMode;

type Result<T> = std::result::Result<T, Error>;

/// Whether a controller currently answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    /// Not contacted yet.
    Unknown,
    Online,
    /// Queries kept failing; a background re-probe is running.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Negotiation {
    Unprobed,
    Pinned(WireVariant),
}

#[derive(Debug, Default)]
struct Slots {
    desired: LightState,
    last_written: Option<LightState>,
    last_read: Option<LightState>,
    /// Set once `desired` is based on a state read from the device.
    based: bool,
    /// Intents merged while `based` is false, replayed onto the first read.
    pending: Intent,
}

/// Controls one MagicHome device.
///
/// The controller owns three snapshots of the light: the `desired` state
/// built from intents, the state `last_written` to the device and the state
/// `last_read` back from it. Intents are coalesced and written in the
/// background; see [`CommandScheduler`].
///
/// Cloning yields another handle onto the same device.
///
/// # Example
///
/// ```no_run
/// use std::net::Ipv4Addr;
/// use magichome_lights_rs::{ControllerConfig, DeviceController, DeviceIdentity, Intent};
///
/// # async fn run() -> Result<(), magichome_lights_rs::Error> {
/// let identity = DeviceIdentity::new("600194A1B2C3", Ipv4Addr::new(192, 168, 1, 40), "AK001-ZJ2145");
/// let controller = DeviceController::new(identity, None, ControllerConfig::default());
///
/// let mut intent = Intent::new();
/// intent.power(true);
/// intent.hue(120.0);
/// controller.set_intent(&intent)?;
///
/// let state = controller.refresh().await?;
/// println!("{:?}", state);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeviceController {
    inner: Arc<ControllerInner>,
}

#[derive(Debug)]
struct ControllerInner {
    me: Weak<ControllerInner>,
    identity: RwLock<DeviceIdentity>,
    profile: RwLock<Option<LedProfile>>,
    config: ControllerConfig,
    transport: Transport,
    scheduler: CommandScheduler,
    slots: Mutex<Slots>,
    availability: Mutex<Availability>,
    negotiation: Mutex<Negotiation>,
    reprobing: AtomicBool,
}

impl DeviceController {
    /// Create a controller.
    ///
    /// Without a `profile` the LED layout is inferred from the first status
    /// response.
    pub fn new(identity: DeviceIdentity, profile: Option<LedProfile>, config: ControllerConfig) -> Self {
        let addr = SocketAddr::new(identity.ip_address().into(), config.port);
        let inner = Arc::new_cyclic(|me| ControllerInner {
            me: me.clone(),
            transport: Transport::new(addr, config.connect_timeout()),
            scheduler: CommandScheduler::new(config.timing),
            identity: RwLock::new(identity),
            profile: RwLock::new(profile),
            slots: Mutex::new(Slots::default()),
            availability: Mutex::new(Availability::Unknown),
            negotiation: Mutex::new(Negotiation::Unprobed),
            reprobing: AtomicBool::new(false),
            config,
        });
        DeviceController { inner }
    }

    /// Seed the desired state, e.g. from a persisted cache.
    ///
    /// The seed only stands in until the device is first read; intents set
    /// before that are then replayed onto the read state.
    pub fn with_cached_state(self, state: LightState) -> Self {
        lock(&self.inner.slots).desired = state;
        self
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.inner.identity()
    }

    pub fn unique_id(&self) -> String {
        self.inner.unique_id()
    }

    /// LED layout, once known.
    pub fn profile(&self) -> Option<LedProfile> {
        *self.inner.profile.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn availability(&self) -> Availability {
        *lock(&self.inner.availability)
    }

    pub fn phase(&self) -> Phase {
        self.inner.scheduler.phase()
    }

    /// The desired state, without touching the network.
    pub fn cached_state(&self) -> LightState {
        lock(&self.inner.slots).desired
    }

    pub fn last_written(&self) -> Option<LightState> {
        lock(&self.inner.slots).last_written
    }

    pub fn last_read(&self) -> Option<LightState> {
        lock(&self.inner.slots).last_read
    }

    /// Merge an intent into the desired state and schedule a write.
    ///
    /// Returns before anything is sent. Must be called from within the async
    /// runtime, since the debounce timer runs as a background task.
    pub fn set_intent(&self, intent: &Intent) -> Result<()> {
        intent.validate()?;
        if intent.is_empty() {
            return Ok(());
        }

        let desired = {
            let mut slots = lock(&self.inner.slots);
            slots.desired = slots.desired.apply(intent);
            if !slots.based {
                slots.pending = slots.pending.merge(intent);
            }
            slots.desired
        };
        debug!("{}: desired {:?}", self.inner.unique_id(), desired);

        self.inner.scheduler.intent_changed(&self.inner);
        Ok(())
    }

    /// Read the device and return the resulting state.
    ///
    /// While a write is pending or running the cached state is returned
    /// instead and a poll is scheduled for when the device is idle again.
    pub async fn refresh(&self) -> Result<LightState> {
        if self.inner.scheduler.is_busy() {
            self.inner.scheduler.schedule_poll(&self.inner);
            return Ok(self.cached_state());
        }
        self.inner.sync_from_device().await
    }

    /// Read the device back now and compare it with the last write.
    pub async fn force_consistency_check(&self) {
        self.inner.scheduler.check_now(self.inner.as_ref()).await;
    }

    /// Re-point the controller at a new address, keeping all state.
    pub fn update_ip(&self, ip: Ipv4Addr) {
        let mut identity = self
            .inner
            .identity
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if identity.ip_address() == ip {
            return;
        }
        info!(
            "{} moved from {} to {}",
            identity.unique_id(),
            identity.ip_address(),
            ip
        );
        identity.set_ip_address(ip);
        self.inner.transport.set_ip(ip);
    }

    pub async fn history(&self) -> MessageHistory {
        self.inner.transport.history().await
    }

    /// Returns diagnostics including state, negotiation and history.
    pub async fn diagnostics(&self) -> Value {
        let identity = self.identity();
        let (desired, last_written, last_read) = {
            let slots = lock(&self.inner.slots);
            (slots.desired, slots.last_written, slots.last_read)
        };
        let wire_variant = match *lock(&self.inner.negotiation) {
            Negotiation::Unprobed => None,
            Negotiation::Pinned(variant) => Some(format!("{:?}", variant)),
        };

        let mut diag = json!({
            "uniqueId": identity.unique_id(),
            "ip": identity.ip_address().to_string(),
            "modelNumber": identity.model_number(),
            "profile": self.profile().map(|p| p.to_string()),
            "availability": self.availability(),
            "phase": self.phase(),
            "wireVariant": wire_variant,
            "desired": desired,
            "lastWritten": last_written,
            "lastRead": last_read,
        });

        let history = self.history().await;
        diag["history"] = serde_json::to_value(history.summary()).unwrap_or(Value::Null);
        diag
    }
}

impl ControllerInner {
    const QUERY_RETRY_DELAYS_MS: [u64; 3] = [100, 250, 500];

    fn identity(&self) -> DeviceIdentity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn unique_id(&self) -> String {
        self.identity().unique_id().to_string()
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        lock(&self.slots)
    }

    fn resolved_profile(&self) -> LedProfile {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(LedProfile::Rgbww)
    }

    fn learn_profile(&self, response: &DeviceResponse) {
        let mut profile = self.profile.write().unwrap_or_else(PoisonError::into_inner);
        if profile.is_none() {
            let learned = LedProfile::from_hardware_version(response.hardware_version);
            debug!(
                "hardware version {:#04x} treated as {}",
                response.hardware_version, learned
            );
            *profile = Some(learned);
        }
    }

    /// Query once if the LED layout is still unknown.
    async fn ensure_profile(&self) -> LedProfile {
        let known = self
            .profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if !known {
            if let Err(e) = self.query().await {
                debug!("{}: profile probe failed: {}", self.unique_id(), e);
            }
        }
        self.resolved_profile()
    }

    fn set_availability(&self, availability: Availability) {
        let previous = std::mem::replace(&mut *lock(&self.availability), availability);
        if previous != availability {
            info!("{} is now {:?}", self.unique_id(), availability);
        }
    }

    async fn send(&self, command: &Command, timeout: Duration) -> Result<Reply> {
        self.transport
            .send(&command.frame(), command.uses_checksum(), timeout)
            .await
    }

    async fn query_once(&self) -> Result<LightState> {
        let reply = self.send(&Command::Query, self.config.query_timeout()).await?;
        let Reply::Data(bytes) = reply else {
            return Err(Error::NoResponse(self.transport.addr()));
        };
        let response = DeviceResponse::parse(&bytes)?;
        self.learn_profile(&response);

        let mode = match response.mask.operating_mode() {
            OperatingMode::Unknown => self.resolved_profile().color_mode(),
            mode => mode,
        };
        Ok(LightState::from_response(&response, mode))
    }

    /// Query with retries. Updates `last_read` on success and takes the
    /// device offline when it could not be reached at all.
    async fn query(&self) -> Result<LightState> {
        let attempts = self.config.query_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.query_once().await {
                Ok(state) => {
                    self.slots().last_read = Some(state);
                    self.set_availability(Availability::Online);
                    return Ok(state);
                }
                Err(e) => {
                    if let Error::Parse(_) = e {
                        warn!("{}: discarding response: {}", self.unique_id(), e);
                    } else {
                        debug!("{}: query attempt {} failed: {}", self.unique_id(), attempt + 1, e);
                    }
                    last_error = Some(e);
                    if attempt + 1 < attempts {
                        let idx = (attempt as usize).min(Self::QUERY_RETRY_DELAYS_MS.len() - 1);
                        runtime::sleep(Duration::from_millis(Self::QUERY_RETRY_DELAYS_MS[idx])).await;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| Error::NoResponse(self.transport.addr()));
        if error.is_unreachable() {
            self.go_offline();
        }
        Err(error)
    }

    fn go_offline(&self) {
        self.set_availability(Availability::Offline);
        {
            let mut slots = self.slots();
            slots.desired = slots.desired.with_power(false);
            slots.last_read = slots.last_read.map(|read| read.with_power(false));
        }
        if !self.reprobing.swap(true, Ordering::SeqCst) {
            self.spawn_reprobe();
        }
    }

    fn spawn_reprobe(&self) {
        let me = self.me.clone();
        let interval = self.config.reprobe_interval();
        runtime::spawn(async move {
            loop {
                runtime::sleep(interval).await;
                let Some(inner) = me.upgrade() else {
                    break;
                };
                if *lock(&inner.availability) == Availability::Online {
                    inner.reprobing.store(false, Ordering::SeqCst);
                    break;
                }
                match inner.query_once().await {
                    Ok(state) => {
                        if inner.scheduler.is_busy() {
                            inner.slots().last_read = Some(state);
                        } else {
                            inner.adopt(state);
                        }
                        inner.set_availability(Availability::Online);
                        inner.reprobing.store(false, Ordering::SeqCst);
                        break;
                    }
                    Err(e) => debug!("{}: re-probe failed: {}", inner.unique_id(), e),
                }
            }
        })
        .detach();
    }

    /// Take a read state as the baseline for all three slots.
    fn adopt(&self, state: LightState) {
        let mut slots = self.slots();
        slots.desired = state;
        slots.last_written = Some(state);
        slots.last_read = Some(state);
        slots.based = true;
        slots.pending = Intent::default();
    }

    async fn sync_from_device(&self) -> Result<LightState> {
        let state = self.query().await?;
        if self.scheduler.is_busy() {
            return Ok(self.slots().desired);
        }
        self.adopt(state);
        Ok(state)
    }

    async fn commit_state(&self) -> Result<bool> {
        let profile = self.ensure_profile().await;
        let (desired, baseline) = {
            let mut slots = self.slots();
            if !slots.based {
                if let Some(read) = slots.last_read {
                    slots.desired = read.apply(&slots.pending);
                    slots.based = true;
                    slots.pending = Intent::default();
                }
            }
            (slots.desired, slots.last_written.or(slots.last_read))
        };

        // Nothing known about the device: assume it is off.
        let transition = classify(&desired, &baseline.unwrap_or_default());
        debug!("{}: {:?}", self.unique_id(), transition);

        match transition {
            Transition::KeepState => Ok(false),
            Transition::ToggleState => {
                self.send(&Command::Power(false), self.config.command_timeout())
                    .await?;
                self.slots().last_written = Some(desired);
                Ok(true)
            }
            Transition::SetColor => {
                let native = self.write_color(profile, &desired).await?;
                let written = desired.with_native(&native);
                let mut slots = self.slots();
                slots.last_written = Some(written);
                if slots.desired == desired {
                    slots.desired = written;
                }
                Ok(true)
            }
        }
    }

    async fn write_color(&self, profile: LedProfile, desired: &LightState) -> Result<NativeColor> {
        let native = color::hsb_to_native(
            desired.hsl(),
            desired.brightness(),
            desired.color_temperature(),
            conversion_mode(profile, desired),
            &self.config.thresholds,
        );

        if profile == LedProfile::Cct {
            let temperature = desired
                .color_temperature()
                .unwrap_or_else(|| color::white_to_temperature(native.white).0);
            let command = Command::SetCct {
                temperature: color::temperature_percent(temperature),
                brightness: desired.brightness().round().clamp(0.0, 100.0) as u8,
            };
            self.send(&command, self.config.command_timeout()).await?;
        } else {
            self.send_color(profile, &native).await?;
        }
        Ok(native)
    }

    /// Send a color frame, settling on the 8- or 9-byte layout on first use.
    async fn send_color(&self, profile: LedProfile, native: &NativeColor) -> Result<()> {
        let negotiation = *lock(&self.negotiation);
        let variant = match negotiation {
            Negotiation::Pinned(variant) => variant,
            Negotiation::Unprobed if profile.has_cold_white() => WireVariant::Extended,
            Negotiation::Unprobed => {
                *lock(&self.negotiation) = Negotiation::Pinned(WireVariant::Compact);
                WireVariant::Compact
            }
        };

        let command = |variant| Command::SetColor {
            rgb: native.rgb,
            white: native.white,
            mask: native.mask,
            variant,
        };
        let timeout = self.config.command_timeout();

        match self.send(&command(variant), timeout).await {
            Ok(_) => {
                if negotiation == Negotiation::Unprobed {
                    *lock(&self.negotiation) = Negotiation::Pinned(variant);
                }
                Ok(())
            }
            Err(e) if negotiation == Negotiation::Unprobed
                && variant == WireVariant::Extended
                && !e.is_unreachable() =>
            {
                warn!(
                    "{}: 9-byte color frame failed ({}), using 8-byte frames",
                    self.unique_id(),
                    e
                );
                *lock(&self.negotiation) = Negotiation::Pinned(WireVariant::Compact);
                self.send(&command(WireVariant::Compact), timeout)
                    .await
                    .map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    async fn verify_state(&self) {
        let read = match self.query().await {
            Ok(read) => read,
            Err(e) => {
                warn!("{}: consistency check failed: {}", self.unique_id(), e);
                return;
            }
        };

        let mut slots = self.slots();
        match slots.last_written {
            Some(written) if !written.matches_device(&read) => {
                warn!(
                    "{}: device diverged from last write: wrote {:?} {:?}, read {:?} {:?}",
                    self.unique_id(),
                    written.rgb(),
                    written.white(),
                    read.rgb(),
                    read.white()
                );
                slots.last_written = None;
            }
            _ => debug!("{}: device matches last write", self.unique_id()),
        }
    }
}

impl CommitTarget for ControllerInner {
    fn scheduler(&self) -> &CommandScheduler {
        &self.scheduler
    }

    async fn commit(&self) -> Result<bool> {
        self.commit_state().await
    }

    async fn verify(&self) {
        self.verify_state().await
    }

    async fn poll(&self) {
        if let Err(e) = self.sync_from_device().await {
            debug!("{}: poll failed: {}", self.unique_id(), e);
        }
    }
}

/// Color temperature intent drives white-capable devices through the
/// temperature path; everything else follows the LED layout.
fn conversion_mode(profile: LedProfile, desired: &LightState) -> OperatingMode {
    if desired.color_temperature().is_some() && profile.has_white() {
        OperatingMode::TemperatureMode
    } else {
        profile.color_mode()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
