#![allow(dead_code)]

pub mod fake_device;
pub mod records;
