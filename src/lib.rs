//! tansu - embedded record store
//!
//! A store maps primary keys to either a raw value or a record of named
//! string columns. Stores live in memory (`*` for hash, `+` for tree) or
//! in a single file, and offer secondary indexes, conjunctive queries and
//! single-writer transactions.
//!
//! # Quick Start
//!
//! ```ignore
//! use tansu::{Operator, Direction, Query, Record, RecordOps, Store};
//!
//! let store = Store::open("casket.tct#mode=wc")?;
//! store.put("pk1", Record::from([("name", "mikio"), ("age", "30")]))?;
//!
//! let q = Query::new()
//!     .add("age", Operator::NumGe, "20")
//!     .order_by("age", Direction::NumDesc)
//!     .limit(10);
//! for row in store.query(&q)? {
//!     println!("{:?}", row?.pk());
//! }
//! ```
//!
//! # Architecture
//!
//! - `tansu-core`: values, records, config and errors
//! - `tansu-storage`: copy-on-write record tables and secondary indexes
//! - `tansu-durability`: the single-file commit log
//! - `tansu-concurrency`: optimistic transactions
//! - `tansu-query`: query planning and execution
//! - `tansu-engine`: the [`Store`] handle tying them together

pub use tansu_core::{
    parse_decimal, DurabilityMode, Error, ErrorCode, ErrorKind, IndexAction, IndexKind, LockMode,
    OpenMode, Record, RecordOps, Result, StoreConfig, StoreKind, TransactionError, Value,
    PRIMARY_KEY_ALIAS, PRIMARY_KEY_COLUMN,
};
pub use tansu_engine::{
    load_config, parse_path_spec, write_config, Records, Store, StoreLocation, Transaction,
    MEMORY_HASH, MEMORY_TREE,
};
pub use tansu_query::{Condition, Direction, Operator, Query, ResultSet, Row};
