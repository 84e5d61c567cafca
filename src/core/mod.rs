//! Core parsing components
//!
//! - Scanner: memchr-accelerated delimiter search
//! - Tokenizer: pull tokenizer that tolerates input cut mid-token
//! - Entities: entity decoding and value escaping
//! - Attributes: attribute parsing

pub mod attributes;
pub mod entities;
pub mod scanner;
pub mod tokenizer;
