//! Unicast requests.

mod catchup;

pub use catchup::CatchupRequest;
