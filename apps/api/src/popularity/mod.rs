pub mod clock;
pub mod elo;
pub mod handlers;
pub mod pairing;
