use super::{Block, Func, StrConst};
use smallvec::SmallVec;

/// One instruction. The tracing pass only distinguishes the first
/// three kinds; everything else is `Other`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstData {
    /// Merge of values flowing in from the listed predecessors. Only
    /// valid in the phi prefix of a block.
    Phi(SmallVec<[Block; 2]>),
    Call {
        callee: Callee,
        args: Vec<Operand>,
    },
    Return,
    Other(Op),
}

impl InstData {
    pub fn is_phi(&self) -> bool {
        matches!(self, InstData::Phi(..))
    }

    pub fn call(func: Func, args: Vec<Operand>) -> InstData {
        InstData::Call {
            callee: Callee::Direct(func),
            args,
        }
    }

    /// Visit every block this instruction refers to.
    pub fn visit_blocks<F: FnMut(Block)>(&self, mut f: F) {
        match self {
            InstData::Phi(preds) => {
                for &pred in preds {
                    f(pred);
                }
            }
            InstData::Other(Op::Br(target)) => f(*target),
            InstData::Call { .. } | InstData::Return | InstData::Other(_) => {}
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Callee {
    /// A call whose target is known statically.
    Direct(Func),
    /// A call through a pointer; the target cannot be resolved.
    Indirect,
}

impl Callee {
    pub fn as_direct(&self) -> Option<Func> {
        match self {
            &Callee::Direct(func) => Some(func),
            Callee::Indirect => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Str(StrConst),
    Int(i64),
}

/// Instructions the tracing pass has no interest in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Br(Block),
    Unreachable,
    /// Any other instruction, kept as its source text.
    Opaque(String),
}
