// src/sdk/simulator.rs
//! Software NSP implementing the binding seam
//!
//! The simulator stands in for the vendor SDK when no instrument is on the
//! network: it honors the open/close lifecycle, echoes posted comments,
//! keeps per-channel metadata, runs the file-storage state machine and
//! synthesizes spike and continuous data on a deterministic sample clock.
//! Data generation is driven by a virtual clock that advances a fixed number
//! of samples per poll, so seeded runs are reproducible in tests.

use crate::config::constants::{audio, clock};
use crate::config::ConnectionParameters;
use crate::sdk::traits::{CerebusSdk, WaveformCursor};
use crate::sdk::types::{
    ChannelEvents, ChannelInfo, ChannelSamples, Comment, ConnectInfo, ConnectionMode,
    ContinuousBatch, EventBatch, FileCommand, FileStatus, GroupConfig, GroupMember, OpenOutcome,
    Rgba, SdkError, SdkResult, SpikeWaveform, SystemParams, TrialRequest,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// Result codes the simulator reports, matching the vendor convention of
// negative failure codes.
const ERR_CLOSED: i32 = -8;
const ERR_INVALID_PARAM: i32 = -5;
const ERR_INVALID_FUNCTION: i32 = -15;

/// Simulator tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Number of front-end channels, labeled `chan1..chanN`, 1-based ids.
    pub channel_count: u16,
    /// Continuous sampling rate of the default group.
    pub continuous_rate_hz: u32,
    /// Mean spike rate per channel.
    pub spike_rate_hz: f32,
    /// Peak amplitude of the synthesized continuous noise.
    pub noise_amplitude: i16,
    /// Samples the virtual clock advances per poll.
    pub samples_per_poll: u64,
    /// Seed for reproducible runs; entropy-seeded when unset.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            channel_count: 16,
            continuous_rate_hz: 1_000,
            spike_rate_hz: 20.0,
            noise_amplitude: 200,
            samples_per_poll: 300,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    fn validate(&self) -> SdkResult<()> {
        if self.channel_count == 0 {
            return Err(SdkError::new(ERR_INVALID_PARAM, "channel_count must be > 0"));
        }
        if self.continuous_rate_hz == 0 || self.continuous_rate_hz > clock::SAMPLE_FREQUENCY_HZ {
            return Err(SdkError::new(
                ERR_INVALID_PARAM,
                "continuous_rate_hz must be within the sample clock rate",
            ));
        }
        if !(0.0..=1_000.0).contains(&self.spike_rate_hz) {
            return Err(SdkError::new(ERR_INVALID_PARAM, "spike_rate_hz out of range"));
        }
        if self.samples_per_poll == 0 {
            return Err(SdkError::new(ERR_INVALID_PARAM, "samples_per_poll must be > 0"));
        }
        Ok(())
    }
}

/// Software NSP. See the module docs.
#[derive(Debug)]
pub struct NspSimulator {
    config: SimulatorConfig,
    open: bool,
    /// Virtual sample clock, in units of the 30 kHz device clock.
    now: u64,
    /// Clock value at the last event-buffer reset.
    event_epoch: u64,
    /// Clock value at the last continuous-buffer reset.
    continuous_epoch: u64,
    trial: TrialRequest,
    channels: Vec<ChannelInfo>,
    pending_comments: Vec<Comment>,
    file: FileStatus,
    storage_open: bool,
    monitored: Option<(u16, u16)>,
    sys: SystemParams,
    rng: StdRng,
}

impl NspSimulator {
    /// Closed simulator with the given tuning; rejects out-of-range knobs.
    pub fn new(config: SimulatorConfig) -> SdkResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let channels = (1..=config.channel_count)
            .map(|id| ChannelInfo {
                channel: id,
                label: format!("chan{id}"),
                sample_group: 1,
                spike_enabled: true,
                spike_threshold_uv: -65,
            })
            .collect();
        Ok(Self {
            config,
            open: false,
            now: 0,
            event_epoch: 0,
            continuous_epoch: 0,
            trial: TrialRequest::default(),
            channels,
            pending_comments: Vec::new(),
            file: FileStatus::default(),
            storage_open: false,
            monitored: None,
            sys: SystemParams::default(),
            rng,
        })
    }

    /// Channel currently routed to an audio monitor output, if any.
    pub fn monitored_channel(&self) -> Option<(u16, u16)> {
        self.monitored
    }

    fn require_open(&self) -> SdkResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(SdkError::new(ERR_CLOSED, "interface not open"))
        }
    }

    fn tick(&mut self) {
        self.now += self.config.samples_per_poll;
    }

    fn channel_index(&self, channel: u16) -> SdkResult<usize> {
        if channel == 0 || channel > self.config.channel_count {
            return Err(SdkError::new(
                ERR_INVALID_PARAM,
                format!("channel {channel} out of range"),
            ));
        }
        Ok(usize::from(channel) - 1)
    }

    fn spikes_in_window(&mut self, from: u64, to: u64) -> Vec<u64> {
        if to <= from {
            return Vec::new();
        }
        let window_s = (to - from) as f64 / f64::from(clock::SAMPLE_FREQUENCY_HZ);
        let expected = f64::from(self.config.spike_rate_hz) * window_s;
        let mut count = expected.floor() as usize;
        if self.rng.gen::<f64>() < expected.fract() {
            count += 1;
        }
        let mut times: Vec<u64> = (0..count).map(|_| self.rng.gen_range(from..to)).collect();
        times.sort_unstable();
        times
    }

    fn group_rate(group: u32) -> Option<u32> {
        match group {
            1 => Some(500),
            2 => Some(1_000),
            3 => Some(2_000),
            4 => Some(10_000),
            5 => Some(30_000),
            _ => None,
        }
    }
}

impl CerebusSdk for NspSimulator {
    type Cursor = SimulatedCursor;

    fn default_con_params(&self) -> ConnectionParameters {
        ConnectionParameters::default()
    }

    fn open(
        &mut self,
        _instance: u16,
        _mode: ConnectionMode,
        _params: &ConnectionParameters,
    ) -> SdkResult<OpenOutcome> {
        let code = if self.open { 1 } else { 0 };
        self.open = true;
        Ok(OpenOutcome {
            code,
            info: ConnectInfo {
                connection_type: "udp".to_string(),
                instrument: "NSP simulator".to_string(),
            },
        })
    }

    fn close(&mut self, _instance: u16) -> SdkResult<()> {
        // Accepted when already closed.
        self.open = false;
        Ok(())
    }

    fn trial_config(&mut self, _instance: u16, request: &TrialRequest) -> SdkResult<()> {
        self.require_open()?;
        self.trial = request.clone();
        if request.reset {
            self.event_epoch = self.now;
            self.continuous_epoch = self.now;
        }
        Ok(())
    }

    fn trial_event(&mut self, _instance: u16, reset: bool) -> SdkResult<EventBatch> {
        self.require_open()?;
        self.tick();
        let (from, to) = (self.event_epoch, self.now);
        let mut batch = EventBatch::default();
        if self.trial.no_event {
            return Ok(batch);
        }
        for id in 1..=self.config.channel_count {
            let timestamps = self.spikes_in_window(from, to);
            batch.channels.push(ChannelEvents {
                channel: id,
                unit_timestamps: vec![timestamps],
                digital_values: Vec::new(),
            });
        }
        if reset {
            self.event_epoch = self.now;
        }
        Ok(batch)
    }

    fn trial_continuous(
        &mut self,
        _instance: u16,
        reset: bool,
    ) -> SdkResult<(ContinuousBatch, u64)> {
        self.require_open()?;
        self.tick();
        let start = self.continuous_epoch;
        let mut batch = ContinuousBatch::default();
        if !self.trial.no_continuous {
            let elapsed = self.now - start;
            let count = (elapsed * u64::from(self.config.continuous_rate_hz)
                / u64::from(clock::SAMPLE_FREQUENCY_HZ)) as usize;
            let amp = self.config.noise_amplitude;
            for id in 1..=self.config.channel_count {
                let samples = (0..count)
                    .map(|_| self.rng.gen_range(-amp..=amp))
                    .collect();
                batch.channels.push(ChannelSamples {
                    channel: id,
                    samples,
                });
            }
        }
        if reset {
            self.continuous_epoch = self.now;
        }
        Ok((batch, start))
    }

    fn trial_comment(
        &mut self,
        _instance: u16,
        reset: bool,
        _wait_ms: u32,
    ) -> SdkResult<Vec<Comment>> {
        self.require_open()?;
        self.tick();
        if self.trial.no_comment {
            return Ok(Vec::new());
        }
        if reset {
            Ok(std::mem::take(&mut self.pending_comments))
        } else {
            Ok(self.pending_comments.clone())
        }
    }

    fn set_comment(&mut self, _instance: u16, text: &str, rgba: Rgba) -> SdkResult<()> {
        self.require_open()?;
        self.tick();
        let comment = Comment {
            text: text.to_string(),
            timestamp: self.now,
            rgba,
        };
        self.pending_comments.push(comment);
        Ok(())
    }

    fn sample_group(&mut self, _instance: u16, group: u32) -> SdkResult<GroupConfig> {
        self.require_open()?;
        let rate = Self::group_rate(group).ok_or_else(|| {
            SdkError::new(ERR_INVALID_PARAM, format!("unknown sample group {group}"))
        })?;
        let members = self
            .channels
            .iter()
            .filter(|info| info.sample_group == group)
            .map(|info| GroupMember {
                channel: info.channel,
                label: info.label.clone(),
            })
            .collect();
        Ok(GroupConfig {
            group,
            sample_rate_hz: rate,
            members,
        })
    }

    fn channel_config(&mut self, _instance: u16, channel: u16) -> SdkResult<ChannelInfo> {
        self.require_open()?;
        let index = self.channel_index(channel)?;
        Ok(self.channels[index].clone())
    }

    fn set_channel_config(
        &mut self,
        _instance: u16,
        channel: u16,
        info: &ChannelInfo,
    ) -> SdkResult<()> {
        self.require_open()?;
        let index = self.channel_index(channel)?;
        self.channels[index] = ChannelInfo {
            channel,
            ..info.clone()
        };
        Ok(())
    }

    fn time(&mut self, _instance: u16) -> SdkResult<u64> {
        self.require_open()?;
        self.tick();
        Ok(self.now)
    }

    fn analog_out(
        &mut self,
        _instance: u16,
        output: u16,
        channel: Option<u16>,
        _track_last: bool,
        _spike_only: bool,
    ) -> SdkResult<()> {
        self.require_open()?;
        if !(audio::FIRST_MONITOR_OUTPUT..audio::FIRST_MONITOR_OUTPUT + 2).contains(&output) {
            return Err(SdkError::new(
                ERR_INVALID_FUNCTION,
                format!("output {output} is not an audio monitor"),
            ));
        }
        self.monitored = match channel {
            Some(chan) => {
                self.channel_index(chan)?;
                Some((output, chan))
            }
            None => None,
        };
        Ok(())
    }

    fn open_waveform_cursor(&mut self, _instance: u16, channel: u16) -> SdkResult<SimulatedCursor> {
        self.require_open()?;
        self.channel_index(channel)?;
        Ok(SimulatedCursor {
            channel,
            spike_length: self.sys.spike_length as usize,
            spike_rate_hz: self.config.spike_rate_hz,
            samples_per_poll: self.config.samples_per_poll,
            now: self.now,
            rng: StdRng::seed_from_u64(self.rng.gen()),
        })
    }

    fn sys_config(&mut self, _instance: u16) -> SdkResult<SystemParams> {
        self.require_open()?;
        Ok(self.sys.clone())
    }

    fn file_config(
        &mut self,
        _instance: u16,
        command: FileCommand,
        filename: &str,
        _comment: &str,
    ) -> SdkResult<()> {
        self.require_open()?;
        match command {
            FileCommand::Open => {
                self.storage_open = true;
                self.file.filename = filename.to_string();
            }
            FileCommand::Start => {
                if !self.storage_open {
                    return Err(SdkError::new(
                        ERR_INVALID_FUNCTION,
                        "file storage is not open",
                    ));
                }
                if !filename.is_empty() {
                    self.file.filename = filename.to_string();
                }
                if self.file.filename.is_empty() {
                    return Err(SdkError::new(ERR_INVALID_PARAM, "no filename configured"));
                }
                self.file.recording = true;
            }
            FileCommand::Stop => {
                self.file.recording = false;
            }
            FileCommand::Close => {
                self.storage_open = false;
                self.file.recording = false;
            }
        }
        Ok(())
    }

    fn file_status(&mut self, _instance: u16) -> SdkResult<FileStatus> {
        self.require_open()?;
        Ok(self.file.clone())
    }
}

/// Per-channel spike accumulator handed out by the simulator.
#[derive(Debug)]
pub struct SimulatedCursor {
    channel: u16,
    spike_length: usize,
    spike_rate_hz: f32,
    samples_per_poll: u64,
    now: u64,
    rng: StdRng,
}

impl SimulatedCursor {
    fn synth_waveform(&mut self, timestamp: u64) -> SpikeWaveform {
        // Biphasic template with a little noise on top.
        let n = self.spike_length.max(1);
        let samples = (0..n)
            .map(|i| {
                let phase = i as f32 / n as f32;
                let template = if phase < 0.25 {
                    -600.0 * (phase / 0.25)
                } else if phase < 0.5 {
                    -600.0 + 900.0 * ((phase - 0.25) / 0.25)
                } else {
                    300.0 * (1.0 - (phase - 0.5) / 0.5)
                };
                (template + self.rng.gen_range(-20.0..20.0)) as i16
            })
            .collect();
        SpikeWaveform {
            channel: self.channel,
            unit: self.rng.gen_range(0..3),
            timestamp,
            samples,
        }
    }
}

impl WaveformCursor for SimulatedCursor {
    fn poll_new_waveforms(&mut self) -> SdkResult<Vec<SpikeWaveform>> {
        let from = self.now;
        self.now += self.samples_per_poll;
        let window_s = self.samples_per_poll as f64 / f64::from(clock::SAMPLE_FREQUENCY_HZ);
        let expected = f64::from(self.spike_rate_hz) * window_s;
        let mut count = expected.floor() as usize;
        if self.rng.gen::<f64>() < expected.fract() {
            count += 1;
        }
        let mut timestamps: Vec<u64> =
            (0..count).map(|_| self.rng.gen_range(from..self.now)).collect();
        timestamps.sort_unstable();
        Ok(timestamps
            .into_iter()
            .map(|ts| self.synth_waveform(ts))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> NspSimulator {
        NspSimulator::new(SimulatorConfig {
            seed: Some(7),
            ..SimulatorConfig::default()
        })
        .unwrap()
    }

    fn open_sim() -> NspSimulator {
        let mut sim = sim();
        sim.open(0, ConnectionMode::Default, &ConnectionParameters::default())
            .unwrap();
        sim
    }

    #[test]
    fn second_open_reports_already_open() {
        let mut sim = sim();
        let params = ConnectionParameters::default();
        assert_eq!(sim.open(0, ConnectionMode::Default, &params).unwrap().code, 0);
        assert_eq!(sim.open(0, ConnectionMode::Default, &params).unwrap().code, 1);
    }

    #[test]
    fn data_calls_fail_when_closed() {
        let mut sim = sim();
        let err = sim.trial_event(0, true).unwrap_err();
        assert_eq!(err.code, ERR_CLOSED);
    }

    #[test]
    fn close_is_accepted_when_already_closed() {
        let mut sim = sim();
        assert!(sim.close(0).is_ok());
        assert!(sim.close(0).is_ok());
    }

    #[test]
    fn event_batch_covers_every_channel() {
        let mut sim = open_sim();
        let batch = sim.trial_event(0, true).unwrap();
        assert_eq!(batch.channels.len(), 16);
        assert!(batch
            .channels
            .iter()
            .all(|events| events.unit_timestamps.len() == 1));
    }

    #[test]
    fn continuous_reset_advances_the_start_timestamp() {
        let mut sim = open_sim();
        let (_, first_start) = sim.trial_continuous(0, true).unwrap();
        let (_, second_start) = sim.trial_continuous(0, true).unwrap();
        assert!(second_start > first_start);
    }

    #[test]
    fn suppressed_streams_return_empty_batches() {
        let mut sim = open_sim();
        sim.trial_config(
            0,
            &TrialRequest {
                reset: true,
                no_event: true,
                no_continuous: true,
                ..TrialRequest::default()
            },
        )
        .unwrap();
        assert!(sim.trial_event(0, true).unwrap().channels.is_empty());
        let (batch, _) = sim.trial_continuous(0, true).unwrap();
        assert!(batch.channels.is_empty());
    }

    #[test]
    fn comments_echo_in_order_and_drain_on_reset() {
        let mut sim = open_sim();
        sim.set_comment(0, "first", Rgba::default()).unwrap();
        sim.set_comment(0, "second", Rgba::default()).unwrap();
        let comments = sim.trial_comment(0, true, 0).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, "first");
        assert_eq!(comments[1].text, "second");
        assert!(sim.trial_comment(0, true, 0).unwrap().is_empty());
    }

    #[test]
    fn channel_config_round_trip() {
        let mut sim = open_sim();
        let mut info = sim.channel_config(0, 3).unwrap();
        assert_eq!(info.label, "chan3");
        info.label = "M1-03".to_string();
        info.spike_threshold_uv = -54;
        sim.set_channel_config(0, 3, &info).unwrap();
        let back = sim.channel_config(0, 3).unwrap();
        assert_eq!(back.label, "M1-03");
        assert_eq!(back.spike_threshold_uv, -54);
        assert_eq!(back.channel, 3);
    }

    #[test]
    fn out_of_range_channel_is_rejected() {
        let mut sim = open_sim();
        assert_eq!(sim.channel_config(0, 0).unwrap_err().code, ERR_INVALID_PARAM);
        assert_eq!(sim.channel_config(0, 17).unwrap_err().code, ERR_INVALID_PARAM);
    }

    #[test]
    fn time_is_monotonic() {
        let mut sim = open_sim();
        let t1 = sim.time(0).unwrap();
        let t2 = sim.time(0).unwrap();
        assert!(t2 > t1);
    }

    #[test]
    fn recording_requires_open_storage() {
        let mut sim = open_sim();
        let err = sim.file_config(0, FileCommand::Start, "session.nsx", "").unwrap_err();
        assert_eq!(err.code, ERR_INVALID_FUNCTION);

        sim.file_config(0, FileCommand::Open, "session.nsx", "").unwrap();
        sim.file_config(0, FileCommand::Start, "session.nsx", "").unwrap();
        assert!(sim.file_status(0).unwrap().recording);

        sim.file_config(0, FileCommand::Stop, "", "").unwrap();
        assert!(!sim.file_status(0).unwrap().recording);
    }

    #[test]
    fn cursor_polls_are_bounded_to_the_window() {
        let mut sim = open_sim();
        let mut cursor = sim.open_waveform_cursor(0, 1).unwrap();
        let first = cursor.poll_new_waveforms().unwrap();
        let second = cursor.poll_new_waveforms().unwrap();
        for wf in first.iter().chain(second.iter()) {
            assert_eq!(wf.channel, 1);
            assert_eq!(wf.samples.len(), 48);
        }
        if let (Some(a), Some(b)) = (first.last(), second.first()) {
            assert!(a.timestamp < b.timestamp);
        }
    }

    #[test]
    fn audio_routing_validates_the_output_code() {
        let mut sim = open_sim();
        sim.analog_out(0, audio::FIRST_MONITOR_OUTPUT, Some(5), false, false)
            .unwrap();
        assert_eq!(sim.monitored_channel(), Some((audio::FIRST_MONITOR_OUTPUT, 5)));
        let err = sim.analog_out(0, 42, Some(5), false, false).unwrap_err();
        assert_eq!(err.code, ERR_INVALID_FUNCTION);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = NspSimulator::new(SimulatorConfig {
            channel_count: 0,
            ..SimulatorConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.code, ERR_INVALID_PARAM);
    }
}
