pub mod sweeper;

pub use sweeper::{Sweeper, DUST_THRESHOLD_SATS};
