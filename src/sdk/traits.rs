// src/sdk/traits.rs
//! The binding seam: every call the connection layer makes on the vendor SDK

use crate::config::ConnectionParameters;
use crate::sdk::types::{
    ChannelInfo, Comment, ConnectionMode, ContinuousBatch, EventBatch, FileCommand, FileStatus,
    GroupConfig, OpenOutcome, Rgba, SdkResult, SpikeWaveform, SystemParams, TrialRequest,
};

/// Call surface of the Cerebus acquisition SDK.
///
/// Implementations wrap the vendor binding (or stand in for it, like
/// [`NspSimulator`](crate::sdk::simulator::NspSimulator)). Device discovery,
/// packet framing and buffering all live behind this trait; the connection
/// layer only translates typed requests into these calls and normalizes the
/// result codes.
pub trait CerebusSdk: Send {
    /// Per-channel waveform cursor handed out by [`open_waveform_cursor`].
    ///
    /// [`open_waveform_cursor`]: CerebusSdk::open_waveform_cursor
    type Cursor: WaveformCursor;

    /// The binding's default connection parameters.
    fn default_con_params(&self) -> ConnectionParameters;

    /// Open the transport to the instrument. A code of 1 in the outcome means
    /// the interface was already open; hard failures come back as `SdkError`
    /// carrying the vendor code.
    fn open(
        &mut self,
        instance: u16,
        mode: ConnectionMode,
        params: &ConnectionParameters,
    ) -> SdkResult<OpenOutcome>;

    /// Close the transport. Accepted when already closed.
    fn close(&mut self, instance: u16) -> SdkResult<()>;

    /// Push a trial configuration (buffering, trial range, suppress flags).
    fn trial_config(&mut self, instance: u16, request: &TrialRequest) -> SdkResult<()>;

    /// Drain buffered spike/digital events, optionally resetting the buffer.
    fn trial_event(&mut self, instance: u16, reset: bool) -> SdkResult<EventBatch>;

    /// Drain buffered continuous samples plus the batch start timestamp.
    fn trial_continuous(&mut self, instance: u16, reset: bool)
        -> SdkResult<(ContinuousBatch, u64)>;

    /// Drain buffered comments, waiting at most `wait_ms` for new ones.
    fn trial_comment(&mut self, instance: u16, reset: bool, wait_ms: u32)
        -> SdkResult<Vec<Comment>>;

    /// Post a comment annotation with a color tag.
    fn set_comment(&mut self, instance: u16, text: &str, rgba: Rgba) -> SdkResult<()>;

    /// Query a sampling group's membership and rate.
    fn sample_group(&mut self, instance: u16, group: u32) -> SdkResult<GroupConfig>;

    /// Query one channel's acquisition metadata.
    fn channel_config(&mut self, instance: u16, channel: u16) -> SdkResult<ChannelInfo>;

    /// Update one channel's acquisition metadata.
    fn set_channel_config(
        &mut self,
        instance: u16,
        channel: u16,
        info: &ChannelInfo,
    ) -> SdkResult<()>;

    /// Current sample-clock time.
    fn time(&mut self, instance: u16) -> SdkResult<u64>;

    /// Route a channel (or silence, when `channel` is `None`) to an analog
    /// output such as the audio monitors.
    fn analog_out(
        &mut self,
        instance: u16,
        output: u16,
        channel: Option<u16>,
        track_last: bool,
        spike_only: bool,
    ) -> SdkResult<()>;

    /// Open a waveform cursor that accumulates new spike waveforms on one
    /// channel between polls.
    fn open_waveform_cursor(&mut self, instance: u16, channel: u16) -> SdkResult<Self::Cursor>;

    /// Device-wide acquisition parameters.
    fn sys_config(&mut self, instance: u16) -> SdkResult<SystemParams>;

    /// Drive the file-storage subsystem.
    fn file_config(
        &mut self,
        instance: u16,
        command: FileCommand,
        filename: &str,
        comment: &str,
    ) -> SdkResult<()>;

    /// Current file-storage state (active filename, recording flag).
    fn file_status(&mut self, instance: u16) -> SdkResult<FileStatus>;
}

/// Stateful per-channel spike accumulator.
pub trait WaveformCursor: Send {
    /// Waveforms detected since the previous poll on this cursor.
    fn poll_new_waveforms(&mut self) -> SdkResult<Vec<SpikeWaveform>>;
}
