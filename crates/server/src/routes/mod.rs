//! Route handlers organized by resource

pub mod health;
pub mod hotlist;
pub mod materials;
pub mod rewrite;
pub mod tophub;
