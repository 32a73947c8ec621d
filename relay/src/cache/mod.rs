mod dedup;

pub use dedup::DigestDedupCache;
