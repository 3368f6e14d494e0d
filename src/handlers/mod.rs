// src/handlers/mod.rs

pub mod assessment;
pub mod assessment_type;
pub mod user;
