// tests/connection_integration.rs
//! Integration tests driving the connection handle against the NSP simulator

use cerebus_core::sdk::simulator::{NspSimulator, SimulatorConfig};
use cerebus_core::{
    BufferParameters, CerebusHandle, CerebusOptions, ConnectionState, HandleOptions,
    RangeParameters, RecordingInfo, Rgba, SessionConfigUpdate,
};

fn simulator() -> NspSimulator {
    NspSimulator::new(SimulatorConfig {
        channel_count: 8,
        seed: Some(42),
        ..SimulatorConfig::default()
    })
    .expect("simulator config is valid")
}

#[test]
fn connect_poll_disconnect_lifecycle() {
    let mut handle = CerebusHandle::with_defaults(simulator());

    assert_eq!(handle.connect(), 0);
    assert_eq!(handle.state(), ConnectionState::Connected);

    // A typical caller-owned polling loop.
    for _ in 0..5 {
        let events = handle.event_data().expect("connected and events wanted");
        assert_eq!(events.channels.len(), 8);

        let (continuous, _start) = handle
            .timed_continuous_data()
            .expect("connected and continuous wanted");
        assert_eq!(continuous.channels.len(), 8);
    }

    handle.disconnect();
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(handle.event_data().is_none());

    // Safe to disconnect again.
    handle.disconnect();
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}

#[test]
fn reconnecting_reports_already_open_through_the_binding() {
    let mut handle = CerebusHandle::with_defaults(simulator());
    assert_eq!(handle.connect(), 0);
    // The simulator still holds the interface open, so a second open is the
    // "already open" case and must leave the handle connected.
    assert_eq!(handle.connect(), 1);
    assert!(handle.is_connected());
}

#[test]
fn session_scope_always_releases() {
    let mut handle = CerebusHandle::with_defaults(simulator());
    {
        let mut session = handle.session().expect("simulator accepts the open");
        assert!(session.time().is_some());
    }
    assert!(!handle.is_connected());
    assert!(handle.time().is_none());
}

#[test]
fn comment_round_trip_preserves_order_and_color() {
    let mut handle = CerebusHandle::with_defaults(simulator());
    handle.connect();

    let tag = Rgba::new(255, 0, 0, 255);
    handle.set_comments(["stim on", "stim off"], tag);
    handle.set_comment("note");

    let comments = handle.comments().expect("comments wanted");
    assert_eq!(comments.len(), 3);
    assert_eq!(comments[0].text, "stim on");
    assert_eq!(comments[1].text, "stim off");
    assert_eq!(comments[2].text, "note");
    assert_eq!(comments[0].rgba, tag);
    assert_eq!(comments[2].rgba, Rgba::default());

    // The poll drained the device buffer.
    assert!(handle.comments().expect("still wanted").is_empty());
}

#[test]
fn configuration_merges_and_suppresses_streams() {
    let mut handle = CerebusHandle::with_defaults(simulator());
    handle.connect();

    handle
        .set_config(&SessionConfigUpdate::range(RangeParameters {
            begin_channel: Some(1),
            begin_mask: Some(0x1),
            ..RangeParameters::default()
        }))
        .unwrap();
    handle
        .set_config(&SessionConfigUpdate::buffer(BufferParameters {
            continuous_length: Some(30_000),
            ..BufferParameters::default()
        }))
        .unwrap();

    // Both nested maps survived the two partial updates.
    assert_eq!(handle.config().range.begin_channel, Some(1));
    assert_eq!(handle.config().buffer.continuous_length, Some(30_000));
    assert_eq!(handle.config().buffer.absolute, Some(true));

    // Turning a stream off stops reads without touching the others.
    handle
        .set_config(&SessionConfigUpdate {
            want_events: Some(false),
            ..SessionConfigUpdate::default()
        })
        .unwrap();
    assert!(handle.event_data().is_none());
    assert!(handle.continuous_data().is_some());
}

#[test]
fn channel_metadata_round_trip() {
    let mut handle = CerebusHandle::with_defaults(simulator());
    handle.connect();

    let mut info = handle.channel_info(2).expect("channel exists");
    assert_eq!(info.label, "chan2");
    info.label = "PMd-02".to_string();
    handle.set_channel_info(2, &info);

    let back = handle.channel_info(2).expect("channel exists");
    assert_eq!(back.label, "PMd-02");

    let group = handle.group_config(1).expect("group exists");
    assert!(group.members.iter().any(|m| m.label == "PMd-02"));
}

#[test]
fn waveform_polling_reuses_the_channel_cursor() {
    let mut handle = CerebusHandle::with_defaults(simulator());
    handle.connect();

    let sys = handle.sys_config().expect("connected");
    let first = handle.waveforms(3).expect("connected");
    let second = handle.waveforms(3).expect("connected");

    for wf in first.iter().chain(second.iter()) {
        assert_eq!(wf.channel, 3);
        assert_eq!(wf.samples.len(), sys.spike_length as usize);
    }
    // Consecutive polls never rewind: the second batch starts after the first.
    if let (Some(a), Some(b)) = (first.last(), second.first()) {
        assert!(a.timestamp < b.timestamp);
    }
}

#[test]
fn recording_lifecycle_against_the_simulator() {
    let mut handle = CerebusHandle::with_defaults(simulator());
    handle.connect();
    assert!(!handle.recording_state());

    let info = RecordingInfo::new("m1_session_001.nsx");
    assert_eq!(handle.set_recording_state(true, &info), 0);
    assert!(handle.recording_state());

    assert_eq!(handle.set_recording_state(false, &info), 0);
    assert!(!handle.recording_state());

    // Missing filename is refused before the binding is involved.
    assert_eq!(handle.set_recording_state(true, &RecordingInfo::default()), -1);
}

#[test]
fn monitoring_routes_only_when_connected() {
    let mut handle = CerebusHandle::with_defaults(simulator());

    // No-op while disconnected.
    handle.monitor_channel(4, 0);

    handle.connect();
    assert!(handle.try_monitor_channel(4, 0).is_ok());
    // Out-of-range audio output surfaces the vendor failure in strict mode.
    assert!(handle.try_monitor_channel(4, 99).is_err());
    // An index too large for the output code space fails the same way
    // instead of wrapping.
    assert!(handle.try_monitor_channel(4, u16::MAX).is_err());
    handle.monitor_channel(4, u16::MAX);
}

#[test]
fn options_file_drives_the_handle() {
    let options = CerebusOptions::from_toml_str(
        r#"
        instance = 0
        simulate_ok = true

        [session]
        want_comments = false
        "#,
    )
    .unwrap();

    let mut handle = CerebusHandle::from_options(simulator(), &options);
    assert_eq!(handle.state_label(), "Connected to NSP simulator");

    handle.connect();
    assert_eq!(handle.state_label(), "Connected to NSP");
    // Comments disabled by the options file: no read happens.
    assert!(handle.comments().is_none());
}

#[test]
fn simulated_handle_options_do_not_fake_data() {
    let mut handle = CerebusHandle::new(
        simulator(),
        HandleOptions {
            simulate_ok: true,
            ..HandleOptions::default()
        },
    );
    // The simulate flag only affects the state label; without a connection
    // every getter still returns absence.
    assert_eq!(handle.state(), ConnectionState::SimulatedConnected);
    assert!(handle.event_data().is_none());
    assert!(handle.sys_config().is_none());
}
