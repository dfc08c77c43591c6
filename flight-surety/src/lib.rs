//! Flight Surety - Federated Flight Delay Insurance Engine
//!
//! Independent oracles report flight outcomes, airlines admit each other by
//! vote, and passengers holding a policy on a flight delayed by the airline
//! are credited a multiple of their premium:
//!
//! - **Oracle consensus**: responses routed by index, resolved at quorum
//! - **Airline governance**: direct admission, then majority voting
//! - **Insurance ledger**: single payout credit, debit-before-transfer withdrawals
//! - **Operating gate**: owner-controlled circuit breaker on every mutation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SuretyService                          │
//! │             (RwLock + broadcast of events)                  │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                   SuretyEngine                        │  │
//! │  │  ┌──────────┐ ┌──────────┐ ┌────────────┐            │  │
//! │  │  │ Identity │ │ Oracles  │ │ Governance │            │  │
//! │  │  └──────────┘ └────┬─────┘ └────────────┘            │  │
//! │  │              ┌─────▼───────┐   ┌───────────┐         │  │
//! │  │              │ Coordinator │──▶│ Insurance │         │  │
//! │  │              └─────────────┘   └───────────┘         │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod escrow;
pub mod events;
pub mod flight;
pub mod governance;
pub mod identity;
pub mod insurance;
pub mod oracle;
pub mod seed;
pub mod service;
pub mod snapshot;
pub mod types;

// Re-export main types
pub use config::SuretyConfig;
pub use engine::{SuretyEngine, SuretyEngineBuilder};
pub use events::{RecordedEvent, SuretyEvent};
pub use service::SuretyService;
pub use snapshot::EngineSnapshot;
pub use types::*;
