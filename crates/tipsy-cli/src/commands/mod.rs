pub mod account;
pub mod backup;
pub mod common;
pub mod entries;
pub mod tags;
