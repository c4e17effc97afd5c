// src/lib.rs

//! examsync: exam-discussion link collector and manifest reconciler

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
