#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate num_derive;

pub mod buffer;
pub mod channel;
pub mod clock;
pub mod config;
pub mod defer;
pub mod error;
pub mod logger;
pub mod mixer;
pub mod packet;
pub mod poller;
pub mod protocol;
pub mod reader;
pub mod stats;
pub mod timer;
pub mod writer;
