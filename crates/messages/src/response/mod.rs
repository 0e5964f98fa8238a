//! Unicast responses.

mod catchup;

pub use catchup::CatchupResponse;
