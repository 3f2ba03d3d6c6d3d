use super::{Block, FunctionBodyDisplay, Inst, InstData, Module, Operand};
use crate::entity::EntityVec;
use anyhow::{bail, Result};

#[derive(Clone, Debug)]
pub enum FuncDecl {
    /// A function known only by name, defined outside this module.
    Import(String),
    Body(String, FunctionBody),
}

impl FuncDecl {
    pub fn name(&self) -> &str {
        match self {
            FuncDecl::Import(name) => &name[..],
            FuncDecl::Body(name, ..) => &name[..],
        }
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self, FuncDecl::Import(..))
    }

    pub fn body(&self) -> Option<&FunctionBody> {
        match self {
            FuncDecl::Body(_, body) => Some(body),
            _ => None,
        }
    }

    pub fn body_mut(&mut self) -> Option<&mut FunctionBody> {
        match self {
            FuncDecl::Body(_, body) => Some(body),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FunctionBody {
    /// Block bodies, in layout order. The first block is the entry.
    pub blocks: EntityVec<Block, BlockDef>,
    /// Instruction definitions, indexed by `Inst`. An instruction is
    /// only part of the function once some block lists it.
    pub insts: EntityVec<Inst, InstData>,
}

#[derive(Clone, Debug, Default)]
pub struct BlockDef {
    pub name: String,
    /// Instructions in this block, in execution order.
    pub insts: Vec<Inst>,
}

impl FunctionBody {
    pub fn add_block<S: Into<String>>(&mut self, name: S) -> Block {
        let id = self.blocks.push(BlockDef {
            name: name.into(),
            insts: vec![],
        });
        log::trace!("add_block: block {}", id);
        id
    }

    pub fn append_inst(&mut self, block: Block, data: InstData) -> Inst {
        let inst = self.insts.push(data);
        self.blocks[block].insts.push(inst);
        log::trace!("append_inst: {} in {}", inst, block);
        inst
    }

    /// Position of `inst` within `block`, if it is there.
    pub fn position(&self, block: Block, inst: Inst) -> Option<usize> {
        self.blocks
            .get(block)?
            .insts
            .iter()
            .position(|&other| other == inst)
    }

    /// Whether a non-phi instruction may be placed directly before
    /// `inst`: it must be in `block`, and no phi may follow it.
    pub fn can_insert_before(&self, block: Block, inst: Inst) -> bool {
        match self.position(block, inst) {
            Some(pos) => !self.blocks[block].insts[pos..]
                .iter()
                .any(|&i| self.insts[i].is_phi()),
            None => false,
        }
    }

    /// Insert a new instruction immediately before `before`. Anything
    /// inserted earlier at the same spot ends up ahead of it.
    pub fn insert_before(&mut self, block: Block, before: Inst, data: InstData) -> Result<Inst> {
        let pos = match self.position(block, before) {
            Some(pos) => pos,
            None => bail!("{} is not in {}", before, block),
        };
        if !data.is_phi() && !self.can_insert_before(block, before) {
            bail!("inserting before {} in {} would split the phi prefix", before, block);
        }
        let inst = self.insts.push(data);
        self.blocks[block].insts.insert(pos, inst);
        log::trace!("insert_before: {} before {} in {}", inst, before, block);
        Ok(inst)
    }

    /// Number of instructions placed in blocks.
    pub fn inst_count(&self) -> usize {
        self.blocks.values().map(|block| block.insts.len()).sum()
    }

    pub fn validate(&self, module: &Module) -> Result<()> {
        for (block, def) in self.blocks.entries() {
            let mut seen_non_phi = false;
            for &inst in &def.insts {
                if !self.insts.contains(inst) {
                    bail!("{} refers to undefined {}", block, inst);
                }
                let data = &self.insts[inst];
                if data.is_phi() {
                    if seen_non_phi {
                        bail!("{} in {} is a phi after a non-phi instruction", inst, block);
                    }
                } else {
                    seen_non_phi = true;
                }
                let mut bad_block = None;
                data.visit_blocks(|target| {
                    if !self.blocks.contains(target) {
                        bad_block = Some(target);
                    }
                });
                if let Some(target) = bad_block {
                    bail!("{} in {} refers to missing {}", inst, block, target);
                }
                if let InstData::Call { callee, args } = data {
                    if let Some(func) = callee.as_direct() {
                        if !module.funcs.contains(func) {
                            bail!("{} in {} calls missing {}", inst, block, func);
                        }
                    }
                    for arg in args {
                        if let &Operand::Str(s) = arg {
                            if !module.strings.contains(s) {
                                bail!("{} in {} uses missing {}", inst, block, s);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn display<'a>(&'a self, indent: &'a str, module: &'a Module) -> FunctionBodyDisplay<'a> {
        FunctionBodyDisplay(self, indent, module)
    }
}
