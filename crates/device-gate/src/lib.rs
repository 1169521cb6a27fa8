//! Device Gate - Mini App launch verification service.
//!
//! Sits between a Telegram Mini App and the bot it fronts to:
//! - Authenticate launch data signed with the bot token
//! - Refuse callers coming through proxies or VPNs
//! - Bind each user to the first device they verify from

pub mod api;
pub mod binding;
pub mod config;
pub mod error;
pub mod gate;
pub mod notify;
pub mod origin;

pub use binding::{open_store, BindOutcome, BindingStore, DeviceBinding};
pub use config::Config;
pub use error::{GateError, StoreError};
pub use gate::{Gate, Verified};
pub use notify::{Delivery, Notice, NotificationSink, TelegramSink};
pub use origin::{IpApiScreen, OriginScreen, OriginVerdict};
