// Narrow trait objects separating the core from presentation: rasterization,
// audio output, and input polling are all someone else's problem. The core
// only needs to hand off command streams/samples/poll requests and get
// button state back.

/// Receives raw RDP command streams. A real implementation rasterizes them
/// (to a framebuffer, to a GPU, whatever); the core only needs to know when
/// a full sync has completed so it can clear `pipe_busy` and fire the DP
/// interrupt.
pub trait RdpBackend {
    fn enqueue_command(&mut self, command: &[u32]);
    fn full_sync(&mut self);
}

/// Receives interleaved 16-bit stereo PCM at whatever rate AI is currently
/// configured for.
pub trait AudioSink {
    fn push_samples(&mut self, samples: &[i16]);
}

/// Polled once per VI scanout for the state of a single joybus-connected
/// controller.
pub trait InputSource {
    fn poll(&mut self, channel: usize) -> ControllerState;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub buttons: u16,
    pub stick_x: i8,
    pub stick_y: i8,
}

/// No-op backend for headless/smoke-test runs: counts commands instead of
/// rendering them.
#[derive(Default)]
pub struct NullRdpBackend {
    pub commands_seen: u64,
    pub syncs_seen: u64,
}

impl RdpBackend for NullRdpBackend {
    fn enqueue_command(&mut self, _command: &[u32]) {
        self.commands_seen += 1;
    }

    fn full_sync(&mut self) {
        self.syncs_seen += 1;
    }
}

#[derive(Default)]
pub struct NullAudioSink {
    pub samples_seen: u64,
}

impl AudioSink for NullAudioSink {
    fn push_samples(&mut self, samples: &[i16]) {
        self.samples_seen += samples.len() as u64;
    }
}

/// Reports every button released, every stick centered: enough for boot
/// smoke tests that never expect player input.
#[derive(Default)]
pub struct NullInputSource;

impl InputSource for NullInputSource {
    fn poll(&mut self, _channel: usize) -> ControllerState {
        ControllerState::default()
    }
}
