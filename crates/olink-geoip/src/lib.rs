//! OpenLink Node Geolocation
//!
//! Resolves server node addresses to ISO country codes from local
//! IP2Location range tables, and maps server-provided country names to
//! the same codes.
//!
//! # Architecture
//!
//! ```text
//! "1.2.3.4:443" ──▶ AddressKey::V4(u32) ──┐
//! "[2001:db8::1]" ─▶ AddressKey::V6(u128) ─┤
//!                                          ▼
//!                    ┌──────────────────────────────────┐
//!                    │ RangeIndex                       │
//!                    │  RangeTable<u32>   (IPv4 CSV)    │
//!                    │  RangeTable<u128>  (IPv6 CSV)    │
//!                    │  loaded once, background thread  │
//!                    └──────────────────────────────────┘
//! ```

mod address;
mod config;
mod country;
mod index;
mod range;
mod table;

pub use address::{AddressKey, normalize};
pub use config::{GeoConfig, GeoError};
pub use country::iso_code_for_name;
pub use index::{IndexStats, RangeIndex, TableSource};
pub use range::{GeoRange, RangeTable};
pub use table::{parse_row, parse_table};
