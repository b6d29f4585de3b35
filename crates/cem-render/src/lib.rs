#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! cem-render
//!
//! Reference implementations of the capabilities the resolvers consume:
//! [`UrlActionEncoder`] builds query-string links and [`PlainValueFormatter`]
//! renders locale-neutral labels.

pub mod encoder;
pub mod formatter;

pub use encoder::{EncoderConfig, UrlActionEncoder};
pub use formatter::PlainValueFormatter;
