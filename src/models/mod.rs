pub mod listing;
pub mod subscription;

pub use listing::*;
pub use subscription::*;

// Emoji used in notification text
pub const EMOJI_PIN: &str = "📌";
pub const EMOJI_DATE: &str = "📅";
pub const EMOJI_PRICE: &str = "💰";
pub const EMOJI_STATS: &str = "📊";
pub const EMOJI_LINK: &str = "🔍";
pub const EMOJI_CHECK: &str = "✅";
pub const EMOJI_CROSS: &str = "❌";
pub const EMOJI_WARNING: &str = "⚠️";
pub const EMOJI_HOURGLASS: &str = "⏳";
