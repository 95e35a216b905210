//! Address parsing and the network plumbing behind the default collaborators.

pub mod address;
pub mod dns;
pub mod smtp;
