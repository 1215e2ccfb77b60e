//! Metallum Scraper Core Library
//!
//! This crate provides typed, cached and rate-limited access to
//! metal-archives.com (Encyclopaedia Metallum).
//!
//! # Features
//! - Look up bands, albums and lyrics by id
//! - Advanced band, album and song searches with paginated results
//! - Attribute filters over collections of entities and search rows
//! - Disk cache with a five minute freshness window
//! - Rate-limited HTTP client with per-URL request coalescing

pub mod cache;
pub mod client;
pub mod collection;
pub mod error;
pub mod parser;
pub mod query;
pub mod scraper;
pub mod types;

// Re-export main types for convenience
pub use cache::{CacheEntry, CacheStore};
pub use client::{ClientConfig, MetallumClient, RateLimiter};
pub use collection::{Collection, Criteria, Queryable};
pub use error::{MetallumError, Result};
pub use query::{AlbumSearch, BandSearch, SearchQuery, SongSearch};
pub use scraper::MetallumScraper;
pub use types::{
    Album, AlbumEntry, AlbumRef, AlbumResult, AlbumType, Band, BandRef, BandResult, Lyrics,
    LyricsRef, SearchPage, SongResult, Track,
};
