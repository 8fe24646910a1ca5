// pbind — Parameter binding layer for image-processing pipelines
//
// Library root. The core binding API (`Param`, `ImageParam`,
// `OutputImageParam`, `Parameter`) sits on a small expression IR; the .pif
// frontend and driver build on the same public API.

pub mod argument;
pub mod ast;
pub mod buffer;
pub mod config;
pub mod diag;
pub mod driver;
pub mod eval;
pub mod expr;
pub mod image_param;
pub mod indexing;
pub mod interface;
pub mod lexer;
pub mod naming;
pub mod param;
pub mod parameter;
pub mod parser;
pub mod types;
pub mod var;

pub use argument::{infer_arguments, Argument, ArgumentSignature};
pub use buffer::Buffer;
pub use diag::{DiagLevel, Diagnostic, OrAbort, Origin};
pub use expr::Expr;
pub use image_param::{ImageParam, OutputImageParam};
pub use param::{user_context_param, Param};
pub use parameter::Parameter;
pub use types::{ScalarType, Type};
pub use var::{placeholder, Var};
