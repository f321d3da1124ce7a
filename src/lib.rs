#![recursion_limit = "256"]

//! TinyBERT-style knowledge distillation on Burn.
//!
//! A fine-tuned BERT classifier (the teacher) is compressed into a
//! smaller student by matching embeddings, attention scores, hidden
//! states and soft predictions, layer by layer.

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
