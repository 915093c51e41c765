//! Built-in notification channels

mod email;
mod telegram;

pub use email::EmailChannel;
pub use telegram::TelegramChannel;
