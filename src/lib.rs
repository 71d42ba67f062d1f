// Allow dead code for public API functions that may not be used internally
// but are part of the library's exposed interface
#![allow(dead_code)]

pub mod batch;
pub mod cli;
pub mod config;
pub mod domain_utils;
pub mod driver;
pub mod fetch;
pub mod finder;
pub mod history;
pub mod logger;
pub mod normalizer;
pub mod output;
pub mod proxy;
pub mod query;
pub mod rng;
pub mod scorer;
pub mod search;
pub mod whois;

pub use batch::CompanyRecord;
pub use finder::{FindOutcome, FinderResult};
