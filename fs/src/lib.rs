#![no_std]

mod fileio;
mod ramfs;
pub mod tests;
#[cfg(test)]
extern crate std;

pub use fileio::*;
pub use ramfs::*;
