//! Data models for the lear explorer

pub mod book;

pub use book::{Book, Metadata, NewBook};
