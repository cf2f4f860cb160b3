// Licensed under the Apache-2.0 license

//! Compiled-in configuration of the iTop-4412 board.

#![cfg_attr(not(test), no_std)]

pub mod flash;
