#![allow(non_snake_case)]

pub mod classifier;
pub use classifier::*;

pub mod store;
pub use store::*;

pub mod facts;
pub use facts::*;

pub mod beepboop;
pub use beepboop::Beepboop;

pub mod faces;
pub use faces::*;
