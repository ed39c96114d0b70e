pub mod sled_archive;
pub mod ttl_cache;

pub use sled_archive::SledArchive;
pub use ttl_cache::{DEFAULT_SWEEP_INTERVAL, TtlCache};
