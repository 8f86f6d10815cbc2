// src/sdk/types.rs
//! Typed data model for everything crossing the binding seam

use crate::config::{BufferParameters, RangeParameters};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw result code convention of the vendor SDK: 0 = success, 1 = interface
/// already open, anything else is a vendor-defined failure.
pub type ResultCode = i32;

/// Failure reported by a binding call, carrying the vendor result code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cbsdk error {code}: {message}")]
pub struct SdkError {
    /// Vendor result code.
    pub code: ResultCode,
    /// Human-readable description.
    pub message: String,
}

impl SdkError {
    /// Build an error from a vendor code and description.
    pub fn new(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result alias for binding calls.
pub type SdkResult<T> = Result<T, SdkError>;

/// How the binding should locate the instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Try Central first, then UDP.
    #[default]
    Default,
    /// Share the running Central application's connection.
    Central,
    /// Talk UDP to the instrument directly.
    Udp,
}

/// Details of an established connection, as reported by the binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectInfo {
    /// Transport actually negotiated ("central", "udp", ...).
    pub connection_type: String,
    /// Instrument identification string.
    pub instrument: String,
}

/// Outcome of a successful `open`: code 0 means opened fresh, 1 means the
/// interface was already open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOutcome {
    /// 0 for a fresh open, 1 when the interface was already open.
    pub code: ResultCode,
    /// Negotiated connection details.
    pub info: ConnectInfo,
}

/// Full trial configuration pushed to the device. The `no_*` flags follow the
/// vendor's inverted "suppress" convention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialRequest {
    /// Clear the device buffer and (re)start acquisition.
    pub reset: bool,
    /// Device-side buffer sizing.
    pub buffer: BufferParameters,
    /// Channel and value masks limiting acquisition.
    pub range: RangeParameters,
    /// Suppress the event stream.
    pub no_event: bool,
    /// Suppress the continuous stream.
    pub no_continuous: bool,
    /// Suppress the comment stream.
    pub no_comment: bool,
}

/// Spike and digital events buffered for one channel since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelEvents {
    /// 1-based channel id.
    pub channel: u16,
    /// Spike timestamps per sort unit (index 0 = unsorted).
    pub unit_timestamps: Vec<Vec<u64>>,
    /// Digital input values, for digital channels.
    pub digital_values: Vec<u16>,
}

/// One drain of the device-side event buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    /// Per-channel event buffers, one entry per acquiring channel.
    pub channels: Vec<ChannelEvents>,
}

/// Continuous samples buffered for one channel since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSamples {
    /// 1-based channel id.
    pub channel: u16,
    /// Raw samples in device units.
    pub samples: Vec<i16>,
}

/// One drain of the device-side continuous buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuousBatch {
    /// Per-channel sample buffers, one entry per streaming channel.
    pub channels: Vec<ChannelSamples>,
}

/// RGBA color tag attached to comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red component.
    pub r: u8,
    /// Green component.
    pub g: u8,
    /// Blue component.
    pub b: u8,
    /// Alpha component.
    pub a: u8,
}

impl Rgba {
    /// Build a color tag from its four components.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Rgba {
    /// Default comment color.
    fn default() -> Self {
        let (r, g, b, a) = crate::config::constants::comment::DEFAULT_RGBA;
        Self { r, g, b, a }
    }
}

/// User comment/annotation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Comment text.
    pub text: String,
    /// Device sample-clock time the comment was recorded at.
    pub timestamp: u64,
    /// Color tag the comment was posted with.
    pub rgba: Rgba,
}

/// One member channel of a sampling group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    /// 1-based channel id.
    pub channel: u16,
    /// Channel label.
    pub label: String,
}

/// A sampling group: the channels acquired together at one rate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupConfig {
    /// Group number.
    pub group: u32,
    /// Sampling rate shared by the group's members.
    pub sample_rate_hz: u32,
    /// Channels currently assigned to the group.
    pub members: Vec<GroupMember>,
}

/// Per-channel acquisition metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// 1-based channel id.
    pub channel: u16,
    /// Channel label.
    pub label: String,
    /// Sampling group this channel streams in (0 = off).
    pub sample_group: u32,
    /// Whether spike extraction is enabled.
    pub spike_enabled: bool,
    /// Spike detection threshold in microvolts.
    pub spike_threshold_uv: i32,
}

impl Default for ChannelInfo {
    fn default() -> Self {
        Self {
            channel: 0,
            label: String::new(),
            sample_group: 0,
            spike_enabled: false,
            spike_threshold_uv: -65,
        }
    }
}

/// Device-wide acquisition parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemParams {
    /// Samples captured per spike waveform.
    pub spike_length: u32,
    /// Samples captured before the threshold crossing.
    pub pre_trigger_length: u32,
    /// Sample-clock frequency in Hz.
    pub sample_freq_hz: u32,
}

impl Default for SystemParams {
    fn default() -> Self {
        Self {
            spike_length: 48,
            pre_trigger_length: 10,
            sample_freq_hz: crate::config::constants::clock::SAMPLE_FREQUENCY_HZ,
        }
    }
}

/// One spike waveform snippet delivered by a waveform cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpikeWaveform {
    /// 1-based channel id.
    pub channel: u16,
    /// Sort unit the spike was classified into (0 = unsorted).
    pub unit: u8,
    /// Device sample-clock time of the threshold crossing.
    pub timestamp: u64,
    /// Waveform samples in device units.
    pub samples: Vec<i16>,
}

/// File-storage commands understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCommand {
    /// Open the file-storage application.
    Open,
    /// Start recording to the named file.
    Start,
    /// Stop the active recording.
    Stop,
    /// Close the file-storage application.
    Close,
}

/// Current state of the device's file-storage subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStatus {
    /// File the storage subsystem has open, empty when none.
    pub filename: String,
    /// Whether a recording is in progress.
    pub recording: bool,
}

/// File metadata supplied when starting or stopping a recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingInfo {
    /// Target filename; must be non-empty to start a recording.
    pub filename: String,
    /// Free-text comment stored in the file header.
    pub comment: String,
}

impl RecordingInfo {
    /// Recording metadata with the given filename and no comment.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            comment: String::new(),
        }
    }
}
