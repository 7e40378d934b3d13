//! Protocol primitives, independent of where bytes come from.
//!
//! These types describe the wire layout of FIT documents: the document header,
//! the one-byte record header, definition messages, base types with their
//! 'invalid' marker values, and the cyclic redundancy check. They hold no
//! decoding state; see [`crate::decode`] for the decoder built on top of them.

pub mod check;
pub mod data;
pub mod definition;
pub mod header;
