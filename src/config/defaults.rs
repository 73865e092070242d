pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_MS: u64 = 32;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 250;
pub const DEFAULT_READ_BACKOFF_MS: u64 = 50;
pub const DEFAULT_READ_FAILURE_THRESHOLD: u32 = 10;
pub const DEFAULT_MAX_INIT_ATTEMPTS: u32 = 3;
pub const DEFAULT_TICK_MS: u64 = 1_000;
pub const DEFAULT_SETTINGS_POLL_SECS: u64 = 60;
pub const DEFAULT_SETTINGS_FILE: &str = "zapstreak.json";
pub const DEFAULT_DATABASE_FILE: &str = "zapstreak.db";
pub const DEFAULT_SOUNDS_DIR: &str = "sounds";

pub(super) const MIN_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_SAMPLE_RATE: u32 = 96_000;
pub(super) const MAX_INPUT_DEVICE_LEN: usize = 256;
