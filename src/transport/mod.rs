pub mod channel;

pub use channel::{Channel, ChannelState, SendOutcome};
