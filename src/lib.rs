pub mod aggregate;
pub mod cli;
pub mod config;
pub mod detect;
pub mod diff;
pub mod error;
pub mod filter;
pub mod git;
pub mod github;
pub mod model;
pub mod parsers;
pub mod reporters;
pub mod run;
