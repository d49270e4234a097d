//! IR textual dump (spec.md §6 "IR text form", for `-Sir`). Write-only: the
//! original has no reader for this form either (SPEC_FULL §10), so this
//! module only ever produces text, never parses it back.
//!
//! Grounded on `examples/original_source`'s `-Sir` dump shape described in
//! spec.md §6 verbatim; `Instruction`'s bare `Display` impl
//! (`ir/instr.rs`) only prints the result binding and mnemonic, so this
//! module supplies the operand list, type operand, and tag annotations the
//! full form needs, reusing the teacher's `fmt::Write`-sink idiom the
//! emitter (`emitter.rs`) already follows for AT&T/NASM text.

use std::fmt::Write;

use crate::ir::container::{Container, Linkage};
use crate::ir::instr::{Opcode, Value};
use crate::ir::value::{tag_names, Tag, TagPayload};
use crate::ir::{BlockId, InstrId};

fn operand_text(container: &Container, ty: &crate::types::CType, v: Value) -> String {
    match v {
        Value::Instr(id) => format!("{} {}", ty, id),
        Value::Literal(lit) => format!("{} {}", ty, container.literal(lit).display(ty)),
        Value::Undef => format!("{} undef", ty),
    }
}

fn block_ref(id: BlockId) -> String {
    format!("{}", id)
}

/// Renders one instruction's operand list (spec.md §6: "comma-separated
/// operands (each printed as `T %N` or `T literal`)").
fn operands_text(container: &Container, ty: &crate::types::CType, opcode: &Opcode) -> String {
    match opcode {
        Opcode::Phi(sources) => sources
            .iter()
            .map(|(b, v)| format!("{}: {}", block_ref(*b), operand_text(container, ty, *v)))
            .collect::<Vec<_>>()
            .join(", "),
        Opcode::Jmp(target) => block_ref(*target),
        Opcode::Split(cond, t, f) => {
            format!("{}, {}, {}", operand_text(container, &crate::types::CType::BOOL, *cond), block_ref(*t), block_ref(*f))
        }
        Opcode::Alloca(t) => format!("{}", t),
        Opcode::BitCast(v, t) | Opcode::Trunc(v, t) | Opcode::ZExt(v, t) | Opcode::SExt(v, t)
        | Opcode::IToF(v, t) | Opcode::FToI(v, t) | Opcode::FTrunc(v, t) | Opcode::FExt(v, t) => {
            format!("{}, {}", operand_text(container, ty, *v), t)
        }
        Opcode::DeepPtr(v, k) => format!("{}, {}", operand_text(container, ty, *v), k),
        _ => opcode
            .operands()
            .iter()
            .map(|v| operand_text(container, ty, *v))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn tag_suffix(name: &'static str, tag: &Tag) -> String {
    match &tag.payload {
        TagPayload::None => format!("#{}", name),
        TagPayload::UseCount(n) => format!("#{}({})", name, n),
        TagPayload::ValueList(ids) => {
            let rendered: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
            format!("#{}({})", name, rendered.join(", "))
        }
        TagPayload::Location(loc) => format!("#{}({})", name, loc),
    }
}

fn write_tags(out: &mut String, container: &Container, id: InstrId) {
    for name in [tag_names::USED, tag_names::ENDLIFE, tag_names::PHIABLE, tag_names::LOC, tag_names::LOCHINT] {
        if let Some(tag) = container.get_tag(id, name) {
            out.push(' ');
            out.push_str(&tag_suffix(name, tag));
        }
    }
}

/// Writes one instruction's full text line (no trailing newline, no
/// indentation): `[%N = T ]mnemonic operands[ #tag(...)]*`.
pub fn write_instruction(out: &mut String, container: &Container, id: InstrId) {
    let instr = container.instr(id);
    if instr.is_void() {
        let _ = write!(out, "{}", instr.opcode.mnemonic());
    } else {
        let _ = write!(out, "{} = {} {}", instr.id, instr.ty, instr.opcode.mnemonic());
    }
    let operand_ty = instr.ty.clone();
    let operands = operands_text(container, &operand_ty, &instr.opcode);
    if !operands.is_empty() {
        out.push(' ');
        out.push_str(&operands);
    }
    write_tags(out, container, id);
}

fn linkage_keyword(linkage: Linkage) -> &'static str {
    match linkage {
        Linkage::Global => "global",
        Linkage::Static => "static",
        Linkage::Extern => "extern",
    }
}

/// Writes one container's full text form: `global|static|extern T id { ... }`
/// (spec.md §6), each block as `%N:` followed by tab-indented instructions.
pub fn write_container(out: &mut String, container: &Container) {
    let _ = writeln!(out, "{} {} {} {{", linkage_keyword(container.linkage), container.ty, container.name);
    for block in container.lexical_order() {
        let _ = writeln!(out, "{}:", block);
        for &instr in &container.block(block).instrs {
            out.push('\t');
            write_instruction(out, container, instr);
            out.push('\n');
        }
    }
    out.push_str("}\n");
}

/// Dumps every container in a compilation unit, in iteration order.
pub fn write_program<'a>(containers: impl IntoIterator<Item = &'a Container>) -> String {
    let mut out = String::new();
    for (i, container) in containers.into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_container(&mut out, container);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{new_container, Builder};
    use crate::ir::container::Linkage;
    use crate::types::CType;

    #[test]
    fn constant_fold_dump_has_no_arithmetic() {
        let mut container = new_container("f", Linkage::Global, CType::INT);
        {
            let mut b = Builder::new(&mut container);
            let two = b.const_int(CType::INT, 2);
            let three = b.const_int(CType::INT, 3);
            let four = b.const_int(CType::INT, 4);
            let mul = b.build_mul(three, four, CType::INT).unwrap();
            let sum = b.build_add(two, mul, CType::INT).unwrap();
            b.build_ret(sum).unwrap();
        }
        let mut optimizer = crate::optimizer::Optimizer::new(crate::optimizer::OptimizationLevel::Basic);
        optimizer.optimize(&mut container);
        let text = write_program([&container]);
        assert!(!text.contains("add"));
        assert!(!text.contains("imul"));
        assert!(text.contains("ret int 14"));
    }

    #[test]
    fn dump_includes_block_labels_and_result_bindings() {
        let mut container = new_container("f", Linkage::Global, CType::INT);
        {
            let mut b = Builder::new(&mut container);
            let one = b.const_int(CType::INT, 1);
            b.build_ret(one).unwrap();
        }
        let text = write_program([&container]);
        assert!(text.starts_with("global int f {"));
        assert!(text.contains("%bb0:"));
        assert!(text.contains("ret int 1"));
    }
}
