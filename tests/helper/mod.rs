#![allow(dead_code)]

pub mod resolver;

pub use resolver::*;
