pub mod assignment;
pub mod classify;
pub mod dedup;
pub mod delivery;
pub mod email;
pub mod gap_filler;
pub mod menu;
pub mod metrics;
pub mod scheduler;
pub mod store;

#[cfg(test)]
pub mod testing;
