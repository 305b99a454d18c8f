#[macro_use]
extern crate log;

pub mod crossvalidation;
pub mod family;
pub mod filter;
pub mod io;
pub mod model;
pub mod tree;
