//! Core services for delpher-relink.
//!
//! This crate parses wikitext for legacy Delpher and Internet Archive links,
//! rewrites them into persistent KB resolver links, talks to the MediaWiki
//! action API, and runs batch jobs over record sheets and wiki searches.

pub mod control;
pub mod parsers;
pub mod rewrite;
pub mod store;
pub mod wiki;
