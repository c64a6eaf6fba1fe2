//! Flutter bridge crate for Smart To-Do.

pub mod api;
