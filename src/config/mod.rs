// src/config/mod.rs
//! Connection and session configuration with explicit merge semantics

pub mod constants;
pub mod loader;

pub use loader::{CerebusOptions, ConfigError};

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Transport options used to open the link to the NSP.
///
/// Built once by merging caller-supplied overrides over the binding's
/// defaults; immutable afterwards. Field names serialize kebab-case to match
/// the vendor parameter names (`client-addr`, `inst-port`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectionParameters {
    /// Local address the client binds; broadcast by default.
    pub client_addr: Ipv4Addr,
    /// Local UDP port the client binds.
    pub client_port: u16,
    /// Instrument address.
    pub inst_addr: Ipv4Addr,
    /// Instrument UDP port.
    pub inst_port: u16,
    /// Socket receive buffer size in bytes.
    pub receive_buffer_size: usize,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            client_addr: constants::net::DEFAULT_CLIENT_ADDR,
            client_port: constants::net::DEFAULT_CLIENT_PORT,
            inst_addr: constants::net::DEFAULT_INST_ADDR,
            inst_port: constants::net::DEFAULT_INST_PORT,
            receive_buffer_size: constants::net::DEFAULT_RECEIVE_BUFFER_SIZE,
        }
    }
}

/// Partial [`ConnectionParameters`]: only the set fields override defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConnectionParametersUpdate {
    /// Override for [`ConnectionParameters::client_addr`].
    pub client_addr: Option<Ipv4Addr>,
    /// Override for [`ConnectionParameters::client_port`].
    pub client_port: Option<u16>,
    /// Override for [`ConnectionParameters::inst_addr`].
    pub inst_addr: Option<Ipv4Addr>,
    /// Override for [`ConnectionParameters::inst_port`].
    pub inst_port: Option<u16>,
    /// Override for [`ConnectionParameters::receive_buffer_size`].
    pub receive_buffer_size: Option<usize>,
}

impl ConnectionParametersUpdate {
    /// Merge this partial over `defaults`: set fields win, unset fields fall
    /// back to the default value.
    pub fn merged_over(&self, defaults: &ConnectionParameters) -> ConnectionParameters {
        ConnectionParameters {
            client_addr: self.client_addr.unwrap_or(defaults.client_addr),
            client_port: self.client_port.unwrap_or(defaults.client_port),
            inst_addr: self.inst_addr.unwrap_or(defaults.inst_addr),
            inst_port: self.inst_port.unwrap_or(defaults.inst_port),
            receive_buffer_size: self
                .receive_buffer_size
                .unwrap_or(defaults.receive_buffer_size),
        }
    }
}

/// Trial buffering options pushed to the device. Every field is optional;
/// unset fields leave the device default in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferParameters {
    /// Deliver samples in double precision.
    pub double: Option<bool>,
    /// Absolute event timing: polling does not reset event timestamps.
    pub absolute: Option<bool>,
    /// Number of continuous samples cached per channel.
    pub continuous_length: Option<u32>,
    /// Number of events cached.
    pub event_length: Option<u32>,
    /// Number of comments cached.
    pub comment_length: Option<u32>,
    /// Number of video tracking events cached.
    pub tracking_length: Option<u32>,
}

impl BufferParameters {
    /// Field-wise merge: a `Some` in `update` wins, a `None` preserves the
    /// stored value. Siblings set by earlier updates survive.
    pub fn merge_from(&mut self, update: &BufferParameters) {
        if update.double.is_some() {
            self.double = update.double;
        }
        if update.absolute.is_some() {
            self.absolute = update.absolute;
        }
        if update.continuous_length.is_some() {
            self.continuous_length = update.continuous_length;
        }
        if update.event_length.is_some() {
            self.event_length = update.event_length;
        }
        if update.comment_length.is_some() {
            self.comment_length = update.comment_length;
        }
        if update.tracking_length.is_some() {
            self.tracking_length = update.tracking_length;
        }
    }
}

/// Channel/mask/value triples marking trial start and stop conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeParameters {
    /// Digital channel watched for the trial start condition.
    pub begin_channel: Option<u16>,
    /// Bit mask applied to the start channel's value.
    pub begin_mask: Option<u32>,
    /// Masked value that marks the trial start.
    pub begin_value: Option<u32>,
    /// Digital channel watched for the trial stop condition.
    pub end_channel: Option<u16>,
    /// Bit mask applied to the stop channel's value.
    pub end_mask: Option<u32>,
    /// Masked value that marks the trial stop.
    pub end_value: Option<u32>,
}

impl RangeParameters {
    /// Field-wise merge, same rules as [`BufferParameters::merge_from`].
    pub fn merge_from(&mut self, update: &RangeParameters) {
        if update.begin_channel.is_some() {
            self.begin_channel = update.begin_channel;
        }
        if update.begin_mask.is_some() {
            self.begin_mask = update.begin_mask;
        }
        if update.begin_value.is_some() {
            self.begin_value = update.begin_value;
        }
        if update.end_channel.is_some() {
            self.end_channel = update.end_channel;
        }
        if update.end_mask.is_some() {
            self.end_mask = update.end_mask;
        }
        if update.end_value.is_some() {
            self.end_value = update.end_value;
        }
    }
}

/// Full session configuration held by the handle and pushed to the device on
/// every [`set_config`](crate::connection::CerebusHandle::set_config).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Logical device/session id when multiple devices are addressable.
    pub instance: u16,
    /// Clear the device buffer and (re)start acquisition when applying.
    pub reset_on_apply: bool,
    /// Read the event stream.
    pub want_events: bool,
    /// Read the continuous stream.
    pub want_continuous: bool,
    /// Read the comment stream.
    pub want_comments: bool,
    /// Device-side buffer sizing.
    pub buffer: BufferParameters,
    /// Trial start/stop conditions.
    pub range: RangeParameters,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            instance: 0,
            reset_on_apply: true,
            want_events: true,
            want_continuous: true,
            want_comments: true,
            buffer: BufferParameters {
                absolute: Some(true),
                ..BufferParameters::default()
            },
            range: RangeParameters::default(),
        }
    }
}

impl SessionConfig {
    /// Merge a partial update into this configuration. Nested buffer/range
    /// parameters are merged field-wise, never replaced wholesale.
    pub fn apply_update(&mut self, update: &SessionConfigUpdate) {
        if let Some(instance) = update.instance {
            self.instance = instance;
        }
        if let Some(reset) = update.reset_on_apply {
            self.reset_on_apply = reset;
        }
        if let Some(ref buffer) = update.buffer {
            self.buffer.merge_from(buffer);
        }
        if let Some(ref range) = update.range {
            self.range.merge_from(range);
        }
        if let Some(events) = update.want_events {
            self.want_events = events;
        }
        if let Some(continuous) = update.want_continuous {
            self.want_continuous = continuous;
        }
        if let Some(comments) = update.want_comments {
            self.want_comments = comments;
        }
    }
}

/// Partial [`SessionConfig`] accepted by the handle's `set_config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfigUpdate {
    /// Override for [`SessionConfig::instance`].
    pub instance: Option<u16>,
    /// Override for [`SessionConfig::reset_on_apply`].
    pub reset_on_apply: Option<bool>,
    /// Override for [`SessionConfig::want_events`].
    pub want_events: Option<bool>,
    /// Override for [`SessionConfig::want_continuous`].
    pub want_continuous: Option<bool>,
    /// Override for [`SessionConfig::want_comments`].
    pub want_comments: Option<bool>,
    /// Buffer parameters merged field-wise into the stored configuration.
    pub buffer: Option<BufferParameters>,
    /// Range parameters merged field-wise into the stored configuration.
    pub range: Option<RangeParameters>,
}

impl SessionConfigUpdate {
    /// Update that only touches buffer parameters.
    pub fn buffer(buffer: BufferParameters) -> Self {
        Self {
            buffer: Some(buffer),
            ..Self::default()
        }
    }

    /// Update that only touches range parameters.
    pub fn range(range: RangeParameters) -> Self {
        Self {
            range: Some(range),
            ..Self::default()
        }
    }
}

/// Options for constructing a [`CerebusHandle`](crate::connection::CerebusHandle).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleOptions {
    /// Device instance id used for open/close.
    pub instance: u16,
    /// Treat a failed connection as a simulated NSP session.
    pub simulate_ok: bool,
    /// Overrides merged over the binding's default connection parameters.
    pub con_params: ConnectionParametersUpdate,
}
