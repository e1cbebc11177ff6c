pub mod apps;
pub mod config;
pub mod group;
pub mod monitor;
pub mod run_loop;
pub mod schedule;
pub mod session;
