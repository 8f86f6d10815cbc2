// src/connection.rs
//! The connection handle: single authoritative point of contact with the NSP
//!
//! [`CerebusHandle`] owns the merged connection parameters, the session
//! configuration, the connection state and the per-channel spike cache. All
//! data-retrieval calls check connection and per-stream enablement before
//! touching the binding.
//!
//! Every data operation comes in two forms. The `try_*` form returns a
//! structured [`CbError`] for programmatic handling. The plain form follows
//! the vendor SDK's reporting style: failures are logged and the call returns
//! absence (or a sentinel code), never an error.

use crate::config::constants::{audio, recording};
use crate::config::{
    BufferParameters, CerebusOptions, ConnectionParameters, HandleOptions, SessionConfig,
    SessionConfigUpdate,
};
use crate::error::CbError;
use crate::sdk::traits::{CerebusSdk, WaveformCursor};
use crate::sdk::types::{
    ChannelInfo, Comment, ConnectionMode, ContinuousBatch, EventBatch, FileCommand, GroupConfig,
    RecordingInfo, ResultCode, Rgba, SpikeWaveform, SystemParams, TrialRequest,
};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Connection state derived from the connected flag plus the simulate flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The interface to the NSP is open.
    Connected,
    /// Not connected, but the handle was constructed with `simulate_ok`.
    SimulatedConnected,
    /// Not connected.
    Disconnected,
}

impl ConnectionState {
    /// Human-readable label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connected => "Connected to NSP",
            Self::SimulatedConnected => "Connected to NSP simulator",
            Self::Disconnected => "Not connected",
        }
    }
}

/// Shared-ownership alias for callers that hand one handle to several
/// consumers. One handle per process is the intended pattern; construct it
/// once and inject it explicitly.
pub type SharedHandle<S> = Arc<Mutex<CerebusHandle<S>>>;

/// Handle owning the lifecycle of a single connection to an NSP (or its
/// simulator) through a [`CerebusSdk`] binding.
pub struct CerebusHandle<S: CerebusSdk> {
    sdk: S,
    /// Device instance used for open/close.
    instance: u16,
    con_params: ConnectionParameters,
    config: SessionConfig,
    connected: bool,
    simulate_ok: bool,
    spike_cache: HashMap<u16, S::Cursor>,
}

impl<S: CerebusSdk> CerebusHandle<S> {
    /// Construct a handle. Caller-supplied connection parameters are merged
    /// over the binding's defaults; unspecified keys keep the default value.
    pub fn new(sdk: S, options: HandleOptions) -> Self {
        let defaults = sdk.default_con_params();
        let con_params = options.con_params.merged_over(&defaults);
        let config = SessionConfig {
            instance: options.instance,
            ..SessionConfig::default()
        };
        Self {
            sdk,
            instance: options.instance,
            con_params,
            config,
            connected: false,
            simulate_ok: options.simulate_ok,
            spike_cache: HashMap::new(),
        }
    }

    /// Construct with all defaults.
    pub fn with_defaults(sdk: S) -> Self {
        Self::new(sdk, HandleOptions::default())
    }

    /// Construct from loaded options, including the initial session partial.
    pub fn from_options(sdk: S, options: &CerebusOptions) -> Self {
        let mut handle = Self::new(sdk, options.handle_options());
        handle.config.apply_update(&options.session);
        handle
    }

    /// Wrap the handle for shared ownership across consumers.
    pub fn into_shared(self) -> SharedHandle<S> {
        Arc::new(Mutex::new(self))
    }

    /// The merged, immutable connection parameters.
    pub fn con_params(&self) -> &ConnectionParameters {
        &self.con_params
    }

    /// The stored session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the interface is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Current [`ConnectionState`]. The simulated state only applies when not
    /// actually connected but constructed with `simulate_ok`.
    pub fn state(&self) -> ConnectionState {
        if self.connected {
            ConnectionState::Connected
        } else if self.simulate_ok {
            ConnectionState::SimulatedConnected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Label of the current connection state.
    pub fn state_label(&self) -> &'static str {
        self.state().label()
    }

    /// Open the interface to the NSP (or nPlay).
    ///
    /// Returns the vendor result code: 0 opened fresh, 1 already open,
    /// anything else is the failure code extracted from the binding error.
    /// After any successful open the default buffering (absolute event
    /// timing) is re-applied.
    pub fn connect(&mut self) -> ResultCode {
        match self
            .sdk
            .open(self.instance, ConnectionMode::Default, &self.con_params)
        {
            Ok(outcome) => {
                self.connected = outcome.code == 0 || outcome.code == 1;
                info!(
                    code = outcome.code,
                    connection = %outcome.info.connection_type,
                    instrument = %outcome.info.instrument,
                    "cbsdk open"
                );
                if let Err(err) = self.set_config(&SessionConfigUpdate::buffer(BufferParameters {
                    absolute: Some(true),
                    ..BufferParameters::default()
                })) {
                    warn!(error = %err, "could not re-apply buffering after open");
                }
                outcome.code
            }
            Err(err) => {
                self.connected = false;
                error!(code = err.code, error = %err, "cbsdk open failed");
                err.code
            }
        }
    }

    /// Close the interface unconditionally. Safe to call when already
    /// disconnected.
    pub fn disconnect(&mut self) {
        if let Err(err) = self.sdk.close(self.instance) {
            warn!(error = %err, "cbsdk close reported an error");
        }
        self.connected = false;
    }

    /// Connect for the duration of a scope. The returned guard dereferences
    /// to the handle and disconnects when dropped, on all exit paths.
    pub fn session(&mut self) -> Result<Session<'_, S>, CbError> {
        let code = self.connect();
        if self.connected {
            Ok(Session { handle: self })
        } else {
            Err(CbError::Transport {
                op: "open",
                code,
                message: "could not open the interface".to_string(),
            })
        }
    }

    /// Merge a partial session configuration into the stored one and, when
    /// connected, push the merged whole to the device. When disconnected the
    /// configuration is stored but not pushed.
    ///
    /// Nested buffer/range parameters merge field-wise; setting one key
    /// preserves previously-set siblings.
    pub fn set_config(&mut self, update: &SessionConfigUpdate) -> Result<(), CbError> {
        self.config.apply_update(update);
        if !self.connected {
            debug!("not connected; session configuration stored but not pushed");
            return Ok(());
        }
        self.push_config()
    }

    /// Untyped variant of [`set_config`](Self::set_config) for callers
    /// holding JSON-ish partials. Non-mapping values are rejected.
    pub fn try_set_config_value(&mut self, value: &serde_json::Value) -> Result<(), CbError> {
        if !value.is_object() {
            return Err(CbError::invalid_config(
                "session configuration must be a mapping",
            ));
        }
        let update: SessionConfigUpdate = serde_json::from_value(value.clone())
            .map_err(|err| CbError::invalid_config(err.to_string()))?;
        self.set_config(&update)
    }

    /// Like [`try_set_config_value`](Self::try_set_config_value) but logs and
    /// drops invalid updates instead of returning an error.
    pub fn set_config_value(&mut self, value: &serde_json::Value) {
        if let Err(err) = self.try_set_config_value(value) {
            error!(error = %err, "session configuration update dropped");
        }
    }

    fn push_config(&mut self) -> Result<(), CbError> {
        let request = TrialRequest {
            reset: self.config.reset_on_apply,
            buffer: self.config.buffer.clone(),
            range: self.config.range.clone(),
            // The binding takes inverted "suppress" flags.
            no_event: !self.config.want_events,
            no_continuous: !self.config.want_continuous,
            no_comment: !self.config.want_comments,
        };
        self.sdk
            .trial_config(self.config.instance, &request)
            .map_err(|err| {
                let err = CbError::transport("trial_config", err);
                error!(error = %err, "failed to apply trial configuration");
                err
            })
    }

    /// Spike/digital event data buffered since the last read, resetting the
    /// device-side buffer. Absence when disconnected or events not wanted.
    pub fn try_event_data(&mut self) -> Result<Option<EventBatch>, CbError> {
        if !self.connected || !self.config.want_events {
            return Ok(None);
        }
        self.sdk
            .trial_event(self.config.instance, true)
            .map(Some)
            .map_err(|err| CbError::transport("trial_event", err))
    }

    /// Log-mode form of [`try_event_data`](Self::try_event_data).
    pub fn event_data(&mut self) -> Option<EventBatch> {
        absent_on_error("trial event data", self.try_event_data())
    }

    /// Continuous samples buffered since the last read, with the batch start
    /// timestamp. Resets the device-side buffer.
    pub fn try_timed_continuous_data(&mut self) -> Result<Option<(ContinuousBatch, u64)>, CbError> {
        if !self.connected || !self.config.want_continuous {
            return Ok(None);
        }
        self.sdk
            .trial_continuous(self.config.instance, true)
            .map(Some)
            .map_err(|err| CbError::transport("trial_continuous", err))
    }

    /// Log-mode form of [`try_timed_continuous_data`](Self::try_timed_continuous_data).
    pub fn timed_continuous_data(&mut self) -> Option<(ContinuousBatch, u64)> {
        absent_on_error("trial continuous data", self.try_timed_continuous_data())
    }

    /// Continuous samples without the start timestamp.
    pub fn try_continuous_data(&mut self) -> Result<Option<ContinuousBatch>, CbError> {
        Ok(self.try_timed_continuous_data()?.map(|(batch, _)| batch))
    }

    /// Log-mode form of [`try_continuous_data`](Self::try_continuous_data).
    pub fn continuous_data(&mut self) -> Option<ContinuousBatch> {
        self.timed_continuous_data().map(|(batch, _)| batch)
    }

    /// Comment annotations buffered since the last read. Zero-wait poll; does
    /// not block waiting for new comments.
    pub fn try_comments(&mut self) -> Result<Option<Vec<Comment>>, CbError> {
        if !self.connected || !self.config.want_comments {
            return Ok(None);
        }
        self.sdk
            .trial_comment(self.config.instance, true, 0)
            .map(Some)
            .map_err(|err| CbError::transport("trial_comment", err))
    }

    /// Log-mode form of [`try_comments`](Self::try_comments).
    pub fn comments(&mut self) -> Option<Vec<Comment>> {
        absent_on_error("trial comments", self.try_comments())
    }

    /// Post comments in order, each tagged with `rgba`. Requires a live
    /// connection.
    pub fn try_set_comments<I>(&mut self, comments: I, rgba: Rgba) -> Result<(), CbError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        if !self.connected {
            return Err(CbError::NotConnected);
        }
        for comment in comments {
            self.sdk
                .set_comment(self.config.instance, comment.as_ref(), rgba)
                .map_err(|err| CbError::transport("set_comment", err))?;
        }
        Ok(())
    }

    /// Log-mode form of [`try_set_comments`](Self::try_set_comments).
    pub fn set_comments<I>(&mut self, comments: I, rgba: Rgba)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        if let Err(err) = self.try_set_comments(comments, rgba) {
            error!(error = %err, "failed to post comments");
        }
    }

    /// Post a single comment with the default color tag.
    pub fn try_set_comment(&mut self, text: &str) -> Result<(), CbError> {
        self.try_set_comments([text], Rgba::default())
    }

    /// Log-mode form of [`try_set_comment`](Self::try_set_comment).
    pub fn set_comment(&mut self, text: &str) {
        self.set_comments([text], Rgba::default());
    }

    /// Membership and rate of one sampling group.
    pub fn try_group_config(&mut self, group: u32) -> Result<Option<GroupConfig>, CbError> {
        if !self.connected {
            return Ok(None);
        }
        self.sdk
            .sample_group(self.config.instance, group)
            .map(Some)
            .map_err(|err| CbError::transport("sample_group", err))
    }

    /// Log-mode form of [`try_group_config`](Self::try_group_config).
    pub fn group_config(&mut self, group: u32) -> Option<GroupConfig> {
        absent_on_error("sample group config", self.try_group_config(group))
    }

    /// One channel's acquisition metadata.
    pub fn try_channel_info(&mut self, channel: u16) -> Result<Option<ChannelInfo>, CbError> {
        if !self.connected {
            return Ok(None);
        }
        self.sdk
            .channel_config(self.config.instance, channel)
            .map(Some)
            .map_err(|err| CbError::transport("channel_config", err))
    }

    /// Log-mode form of [`try_channel_info`](Self::try_channel_info).
    pub fn channel_info(&mut self, channel: u16) -> Option<ChannelInfo> {
        absent_on_error("channel info", self.try_channel_info(channel))
    }

    /// Update one channel's acquisition metadata. No-op when disconnected.
    pub fn try_set_channel_info(
        &mut self,
        channel: u16,
        info: &ChannelInfo,
    ) -> Result<(), CbError> {
        if !self.connected {
            return Ok(());
        }
        self.sdk
            .set_channel_config(self.config.instance, channel, info)
            .map_err(|err| CbError::transport("set_channel_config", err))
    }

    /// Log-mode form of [`try_set_channel_info`](Self::try_set_channel_info).
    pub fn set_channel_info(&mut self, channel: u16, info: &ChannelInfo) {
        if let Err(err) = self.try_set_channel_info(channel, info) {
            error!(error = %err, channel, "failed to set channel info");
        }
    }

    /// Current device sample-clock time, absence when disconnected.
    pub fn try_time(&mut self) -> Result<Option<u64>, CbError> {
        if !self.connected {
            return Ok(None);
        }
        self.sdk
            .time(self.config.instance)
            .map(Some)
            .map_err(|err| CbError::transport("time", err))
    }

    /// Log-mode form of [`try_time`](Self::try_time).
    pub fn time(&mut self) -> Option<u64> {
        absent_on_error("device time", self.try_time())
    }

    /// Route a channel's analog signal to one of the audio monitor outputs.
    /// No-op when disconnected.
    pub fn try_monitor_channel(&mut self, channel: u16, audio_output: u16) -> Result<(), CbError> {
        if !self.connected {
            return Ok(());
        }
        let output = audio::FIRST_MONITOR_OUTPUT
            .checked_add(audio_output)
            .ok_or_else(|| {
                CbError::invalid_config(format!("audio output index {audio_output} out of range"))
            })?;
        self.sdk
            .analog_out(self.config.instance, output, Some(channel), false, false)
            .map_err(|err| CbError::transport("analog_out", err))
    }

    /// Log-mode form of [`try_monitor_channel`](Self::try_monitor_channel).
    pub fn monitor_channel(&mut self, channel: u16, audio_output: u16) {
        if let Err(err) = self.try_monitor_channel(channel, audio_output) {
            error!(error = %err, channel, "failed to route channel to audio monitor");
        }
    }

    /// New spike waveforms on `channel` since the last call. The per-channel
    /// cursor is created on first use and cached for the life of the handle.
    pub fn try_waveforms(&mut self, channel: u16) -> Result<Option<Vec<SpikeWaveform>>, CbError> {
        if !self.connected {
            return Ok(None);
        }
        let cursor = match self.spike_cache.entry(channel) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let cursor = self
                    .sdk
                    .open_waveform_cursor(self.config.instance, channel)
                    .map_err(|err| CbError::transport("open_waveform_cursor", err))?;
                entry.insert(cursor)
            }
        };
        cursor
            .poll_new_waveforms()
            .map(Some)
            .map_err(|err| CbError::transport("poll_new_waveforms", err))
    }

    /// Log-mode form of [`try_waveforms`](Self::try_waveforms).
    pub fn waveforms(&mut self, channel: u16) -> Option<Vec<SpikeWaveform>> {
        absent_on_error("spike waveforms", self.try_waveforms(channel))
    }

    /// Device-wide acquisition parameters, absence when disconnected.
    pub fn try_sys_config(&mut self) -> Result<Option<SystemParams>, CbError> {
        if !self.connected {
            return Ok(None);
        }
        self.sdk
            .sys_config(self.config.instance)
            .map(Some)
            .map_err(|err| CbError::transport("sys_config", err))
    }

    /// Log-mode form of [`try_sys_config`](Self::try_sys_config).
    pub fn sys_config(&mut self) -> Option<SystemParams> {
        absent_on_error("system config", self.try_sys_config())
    }

    /// Whether the device is recording to file. False when disconnected.
    pub fn try_recording_state(&mut self) -> Result<bool, CbError> {
        if !self.connected {
            return Ok(false);
        }
        self.sdk
            .file_status(self.config.instance)
            .map(|status| status.recording)
            .map_err(|err| CbError::transport("file_status", err))
    }

    /// Log-mode form of [`try_recording_state`](Self::try_recording_state).
    pub fn recording_state(&mut self) -> bool {
        match self.try_recording_state() {
            Ok(recording) => recording,
            Err(err) => {
                error!(error = %err, "failed to query recording state");
                false
            }
        }
    }

    /// Start or stop recording to the file named in `info`.
    ///
    /// Opens the device's file-storage subsystem, waits a fixed settle delay
    /// (the device only honors record commands once the storage dialog is
    /// open), then issues the start or stop command. Requires a live
    /// connection and a non-empty filename.
    pub fn try_set_recording_state(
        &mut self,
        recording: bool,
        info: &RecordingInfo,
    ) -> Result<ResultCode, CbError> {
        if !self.connected {
            return Err(CbError::NotConnected);
        }
        if info.filename.is_empty() {
            return Err(CbError::invalid_config("recording requires a filename"));
        }
        self.sdk
            .file_config(
                self.config.instance,
                FileCommand::Open,
                &info.filename,
                &info.comment,
            )
            .map_err(|err| CbError::transport("file_config", err))?;

        std::thread::sleep(Duration::from_millis(recording::SETTLE_DELAY_MS));

        let command = if recording {
            FileCommand::Start
        } else {
            FileCommand::Stop
        };
        self.sdk
            .file_config(self.config.instance, command, &info.filename, &info.comment)
            .map_err(|err| CbError::transport("file_config", err))?;
        Ok(0)
    }

    /// Log-mode form of [`try_set_recording_state`](Self::try_set_recording_state):
    /// returns the vendor result code, or −1 when preconditions are not met.
    pub fn set_recording_state(&mut self, recording: bool, info: &RecordingInfo) -> ResultCode {
        match self.try_set_recording_state(recording, info) {
            Ok(code) => code,
            Err(err) => {
                error!(error = %err, "failed to change recording state");
                err.code()
            }
        }
    }
}

impl<S: CerebusSdk> Drop for CerebusHandle<S> {
    /// Best-effort fallback release; explicit [`disconnect`] or a scoped
    /// [`session`] is preferred.
    ///
    /// [`disconnect`]: CerebusHandle::disconnect
    /// [`session`]: CerebusHandle::session
    fn drop(&mut self) {
        if self.connected {
            self.disconnect();
        }
    }
}

/// Scoped connection guard returned by [`CerebusHandle::session`].
/// Disconnects on drop.
pub struct Session<'a, S: CerebusSdk> {
    handle: &'a mut CerebusHandle<S>,
}

impl<S: CerebusSdk> Deref for Session<'_, S> {
    type Target = CerebusHandle<S>;

    fn deref(&self) -> &Self::Target {
        self.handle
    }
}

impl<S: CerebusSdk> DerefMut for Session<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handle
    }
}

impl<S: CerebusSdk> Drop for Session<'_, S> {
    fn drop(&mut self) {
        self.handle.disconnect();
    }
}

fn absent_on_error<T>(what: &'static str, result: Result<Option<T>, CbError>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "failed to get {what}");
            None
        }
    }
}
