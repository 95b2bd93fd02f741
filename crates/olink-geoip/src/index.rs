//! Range Index
//!
//! Country lookups over the IPv4 and IPv6 range tables. The tables hold
//! several hundred thousand rows, so they are parsed once on a background
//! thread; lookups issued before the load finishes wait for it, up to the
//! configured timeout, and then fan out together.
//!
//! ```text
//! lookup ──▶ parse address ──▶ tables ready? ──yes──▶ binary search
//!                                   │no
//!                                   ▼
//!                    start load (once) + wait ≤ timeout
//! ```

use crate::address::AddressKey;
use crate::config::{GeoConfig, GeoError};
use crate::range::RangeTable;
use crate::table::parse_table;
use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where a range table comes from
#[derive(Debug, Clone)]
pub enum TableSource {
    /// CSV file on disk
    File(PathBuf),
    /// CSV content already in memory
    Memory(String),
}

impl TableSource {
    fn load<K: FromStr + Ord>(&self) -> Result<RangeTable<K>, GeoError> {
        match self {
            TableSource::File(path) => {
                let io_err = |source| GeoError::Io { path: path.clone(), source };
                let file = File::open(path).map_err(io_err)?;
                parse_table(file).map_err(io_err)
            }
            TableSource::Memory(content) => parse_table(content.as_bytes()).map_err(|source| GeoError::Io {
                path: PathBuf::from("<memory>"),
                source,
            }),
        }
    }
}

/// Both loaded tables
#[derive(Debug, Default)]
struct RangeTables {
    ipv4: RangeTable<u32>,
    ipv6: RangeTable<u128>,
}

/// Index status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub loaded: bool,
    pub ipv4_ranges: usize,
    pub ipv6_ranges: usize,
}

struct Inner {
    ipv4_source: TableSource,
    ipv6_source: TableSource,
    load_timeout: Duration,
    started: AtomicBool,
    tables: OnceLock<RangeTables>,
    loaded: watch::Sender<bool>,
}

impl Inner {
    fn load(&self) {
        let start = Instant::now();
        let tables = RangeTables {
            ipv4: load_or_empty(&self.ipv4_source, "IPv4"),
            ipv6: load_or_empty(&self.ipv6_source, "IPv6"),
        };

        info!(
            "Range tables loaded: {} IPv4, {} IPv6 ranges in {:?}",
            tables.ipv4.len(),
            tables.ipv6.len(),
            start.elapsed()
        );

        let _ = self.tables.set(tables);
        self.loaded.send_replace(true);
    }
}

fn load_or_empty<K: FromStr + Ord>(source: &TableSource, family: &str) -> RangeTable<K> {
    match source.load() {
        Ok(table) => table,
        Err(e) => {
            warn!("{} range table unavailable: {}", family, e);
            RangeTable::new()
        }
    }
}

/// Country lookup over IPv4/IPv6 range tables.
///
/// Clones share the same tables and load state.
#[derive(Clone)]
pub struct RangeIndex {
    inner: Arc<Inner>,
}

impl RangeIndex {
    /// Index over the files named in `config`
    pub fn new(config: &GeoConfig) -> Self {
        Self::from_sources(
            TableSource::File(config.ipv4_table.clone()),
            TableSource::File(config.ipv6_table.clone()),
            config.load_timeout(),
        )
    }

    /// Index over arbitrary sources
    pub fn from_sources(ipv4: TableSource, ipv6: TableSource, load_timeout: Duration) -> Self {
        let (loaded, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                ipv4_source: ipv4,
                ipv6_source: ipv6,
                load_timeout,
                started: AtomicBool::new(false),
                tables: OnceLock::new(),
                loaded,
            }),
        }
    }

    /// Start loading the tables in the background; later calls do nothing
    pub fn warm_up(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("olink-geoip-load".into())
            .spawn(move || inner.load());

        if let Err(e) = spawned {
            warn!("Failed to spawn loader thread ({}), loading inline", e);
            self.inner.load();
        }
    }

    /// Whether the tables are ready
    pub fn is_loaded(&self) -> bool {
        self.inner.tables.get().is_some()
    }

    /// Start the load and wait for it, up to the load timeout
    pub async fn wait_loaded(&self) -> bool {
        self.tables().await.is_some()
    }

    /// Country code for a node address such as `1.2.3.4:443`.
    ///
    /// Returns `None` for unparseable addresses (without touching the
    /// tables), for addresses in no range, and when the load does not
    /// finish in time.
    pub async fn lookup(&self, address: &str) -> Option<String> {
        let Some(key) = AddressKey::parse(address) else {
            debug!("Not an IP address: '{}', skipping lookup", address);
            return None;
        };

        let tables = self.tables().await?;
        let code = search(tables, key);
        debug!("Lookup '{}' -> {:?}", address, code);
        code
    }

    /// Like [`lookup`](Self::lookup) but never waits; `None` while loading
    pub fn lookup_now(&self, address: &str) -> Option<String> {
        let key = AddressKey::parse(address)?;
        let tables = self.inner.tables.get();
        if tables.is_none() {
            self.warm_up();
        }
        search(tables?, key)
    }

    pub fn stats(&self) -> IndexStats {
        match self.inner.tables.get() {
            Some(tables) => IndexStats {
                loaded: true,
                ipv4_ranges: tables.ipv4.len(),
                ipv6_ranges: tables.ipv6.len(),
            },
            None => IndexStats { loaded: false, ipv4_ranges: 0, ipv6_ranges: 0 },
        }
    }

    async fn tables(&self) -> Option<&RangeTables> {
        if let Some(tables) = self.inner.tables.get() {
            return Some(tables);
        }

        self.warm_up();
        let mut rx = self.inner.loaded.subscribe();
        let waited = tokio::time::timeout(self.inner.load_timeout, rx.wait_for(|loaded| *loaded))
            .await
            .map(|ready| ready.is_ok());

        match waited {
            Ok(true) => self.inner.tables.get(),
            Ok(false) => None,
            Err(_) => {
                warn!("Range table load timed out after {:?}", self.inner.load_timeout);
                None
            }
        }
    }
}

fn search(tables: &RangeTables, key: AddressKey) -> Option<String> {
    match key {
        AddressKey::V4(v) => tables.ipv4.lookup(&v),
        AddressKey::V6(v) => tables.ipv6.lookup(&v),
    }
    .map(str::to_string)
}
