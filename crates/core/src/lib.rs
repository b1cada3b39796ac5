#![forbid(unsafe_code)]

pub mod city;
pub mod geo;
pub mod ids;
pub mod record;
