//! Front ends. A face owns the session with a chat platform: it resolves
//! who the bot is, keeps the channel roster, and does the actual talking.
//! The brain decides what to say.

mod slack;
pub use slack::{ChannelInfo, SlackFace};
