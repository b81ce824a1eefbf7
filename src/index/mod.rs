//! Chronicle Identifier Index
//!
//! Series names are interned to compact integer ids so the scan and the
//! query pipeline can work on integers only:
//!
//! ```text
//! Query: SELECT cpu, mem
//!        ↓
//! IdTable: cpu → 3, mem → 7
//!        ↓
//! Match table: {3 → group 0, 7 → group 1}
//!        ↓
//! Scan: every sample whose id is not in the table is skipped
//! ```

mod id_table;

pub use id_table::{IdLookup, IdTable, UnknownName};
