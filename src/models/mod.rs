// src/models/mod.rs

pub mod assessment;
pub mod assessment_type;
pub mod question;
pub mod quiz;
pub mod user;
