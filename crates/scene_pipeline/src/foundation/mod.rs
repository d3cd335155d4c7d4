//! Foundation utilities shared by every pipeline layer

pub mod math;
pub mod time;
