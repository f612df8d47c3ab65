//! Core library for forge: turns a natural-language requirement into a
//! generated project through planning, generation and evaluation.

pub mod agent;
pub mod config;
pub mod evaluate;
pub mod exec;
pub mod generate;
pub mod llm;
pub mod pipeline;
pub mod plan;
pub mod workspace;
