//! Intermediate representation: modules of functions, functions of
//! basic blocks, blocks of instructions.

use crate::declare_entity;

declare_entity!(Func, "func");
declare_entity!(Block, "block");
declare_entity!(Inst, "inst");
declare_entity!(StrConst, "str");

mod module;
pub use module::*;
mod func;
pub use func::*;
mod inst;
pub use inst::*;
mod display;
pub use display::*;
