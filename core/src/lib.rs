//! Synthetic panel generator for cash-drag nudge campaigns.
//!
//! A seeded batch simulation: accounts and campaign waves are drawn once,
//! then every account moves through a monthly state machine of
//! eligibility, assignment, exposure and investment. The outputs are the
//! accounts, campaigns, account-month panel and DiD-ready tables.

pub mod account_subsystem;
pub mod campaign_subsystem;
pub mod clock;
pub mod config;
pub mod did_ready;
pub mod engine;
pub mod error;
pub mod event;
pub mod export;
pub mod market_subsystem;
pub mod panel_subsystem;
pub mod rng;
pub mod store;
pub mod types;
