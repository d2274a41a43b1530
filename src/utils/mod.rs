pub mod channels;
pub mod format;

pub use channels::{Broadcaster, Subscription, SubscriptionId};
pub use format::{format_duration, is_supported_audio_file, recording_file_name};
