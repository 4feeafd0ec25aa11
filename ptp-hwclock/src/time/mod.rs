//! Time definitions

mod timestamp;

pub use timestamp::{Timestamp, NS_PER_SEC};
