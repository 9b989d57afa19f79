//! A predictive recursive-descent parser generator.
//!
//! A grammar file is parsed by [`syntax`], analyzed by [`sets`], and turned
//! into dispatch routines by [`codegen`]:
//!
//! ```
//! use parsegen::{codegen::{Codegen, Config}, Grammar};
//!
//! let grammar = Grammar::from_str("
//!     NUM = Tok_NUM
//!     %%
//!     value := NUM
//!     %%
//! ").unwrap();
//! let codegen = Codegen::new(&grammar, &Config::new()).unwrap();
//! assert!(codegen.to_string().contains("case Tok_NUM:"));
//! ```

pub mod codegen;
pub mod grammar;
pub mod sets;
pub mod syntax;
pub mod types;
pub mod util;

pub use crate::grammar::{Error, ErrorKind, Grammar};
