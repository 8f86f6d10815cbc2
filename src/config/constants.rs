// src/config/constants.rs
//! Constants shared across the crate, grouped by concern

/// Transport defaults for reaching an NSP (or nPlay) over the local network.
///
/// These mirror the vendor SDK defaults: the client listens on the UDP
/// broadcast port, the instrument answers on the Central port.
pub mod net {
    use std::net::Ipv4Addr;

    /// Client-side address; broadcast unless directly wired to the NSP.
    pub const DEFAULT_CLIENT_ADDR: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

    /// Client-side UDP broadcast port.
    pub const DEFAULT_CLIENT_PORT: u16 = 51002;

    /// Instrument address on a direct link.
    pub const DEFAULT_INST_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 137, 128);

    /// Instrument UDP port.
    pub const DEFAULT_INST_PORT: u16 = 51001;

    /// Receive buffer size in bytes. Windows needs the larger buffer to keep
    /// up with full-bandwidth streaming.
    pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = if cfg!(windows) {
        8 * 1024 * 1024
    } else {
        6 * 1024 * 1024
    };
}

/// Audio-monitor routing.
pub mod audio {
    /// Analog-output code of the first audio monitor output. Subsequent
    /// outputs are addressed by adding the output index.
    pub const FIRST_MONITOR_OUTPUT: u16 = 149;
}

/// Comment annotation defaults.
pub mod comment {
    /// Default color tag attached to posted comments (r, g, b, a).
    pub const DEFAULT_RGBA: (u8, u8, u8, u8) = (0, 0, 0, 64);
}

/// File-recording control.
pub mod recording {
    /// Delay between opening the file-storage app and issuing a start/stop
    /// command. The NSP only honors record commands once the storage dialog
    /// is open.
    pub const SETTLE_DELAY_MS: u64 = 250;
}

/// Device clock properties.
pub mod clock {
    /// NSP sample-clock rate in Hz.
    pub const SAMPLE_FREQUENCY_HZ: u32 = 30_000;
}
