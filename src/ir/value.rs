//! Literal constants, locations, and the side-channel tag system (spec.md
//! §3 "Literal / Undef", "Tag", "Location").

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ir::InstrId;
use crate::target::x86::RegisterMask;
use crate::types::CType;

/// An inline constant, selected by the result type it is used at (spec.md
/// §3). Stored by bit pattern rather than `f32`/`f64` directly so the type
/// can derive `Eq`/`Hash` and be interned in a container's literal pool
/// without an `ordered-float`-style wrapper dependency the teacher doesn't
/// have.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Literal {
    /// Raw bit pattern; width and signedness come from the paired `CType`
    /// at the use site, matching C's "the same bits, a different meaning"
    /// integer model.
    Int(u64),
    Float(u32),
    Double(u64),
}

impl Literal {
    pub fn from_i64(v: i64) -> Literal {
        Literal::Int(v as u64)
    }

    pub fn from_f32(v: f32) -> Literal {
        Literal::Float(v.to_bits())
    }

    pub fn from_f64(v: f64) -> Literal {
        Literal::Double(v.to_bits())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Int(bits) => Some(*bits as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Literal::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Float(bits) => Some(f32::from_bits(*bits) as f64),
            Literal::Double(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Literal::Int(0))
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Literal::Int(1))
    }

    /// Render this literal under the given type, for IR text and
    /// diagnostics (spec.md §6, "each printed as `T %N` or `T literal`").
    pub fn display(&self, ty: &CType) -> String {
        match (self, ty.unqualified()) {
            (Literal::Int(bits), t) if t.is_signed() => format!("{}", *bits as i64),
            (Literal::Int(bits), _) => format!("{}", bits),
            (Literal::Float(bits), _) => format!("{}", f32::from_bits(*bits)),
            (Literal::Double(bits), _) => format!("{}", f64::from_bits(*bits)),
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a == b,
            (Literal::Double(a), Literal::Double(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Literal {}

impl std::hash::Hash for Literal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Literal::Int(b) => b.hash(state),
            Literal::Float(b) => b.hash(state),
            Literal::Double(b) => b.hash(state),
        }
    }
}

/// A physical home for an SSA value (spec.md §3 "Location"). Register
/// identities are bitmasks so a composite value's location is the union of
/// its parts; two locations "overlap" iff their register masks intersect
/// or they denote the same memory slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Register(RegisterMask),
    /// Frame offset from the canonical local-variable base.
    LocalMemory(i32),
    /// Offset from a base value living in a register.
    PointedMemory { base: RegisterMask, offset: i32 },
    Multiple(Vec<Location>),
}

impl Location {
    pub fn register_mask(&self) -> RegisterMask {
        match self {
            Location::Register(m) => *m,
            Location::PointedMemory { base, .. } => *base,
            Location::Multiple(parts) => parts
                .iter()
                .fold(RegisterMask::empty(), |acc, p| acc | p.register_mask()),
            Location::LocalMemory(_) => RegisterMask::empty(),
        }
    }

    pub fn overlaps(&self, other: &Location) -> bool {
        match (self, other) {
            (Location::LocalMemory(a), Location::LocalMemory(b)) => a == b,
            (Location::LocalMemory(_), _) | (_, Location::LocalMemory(_)) => false,
            _ => self.register_mask().overlaps(other.register_mask()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Register(m) => {
                let names: Vec<String> = m.iter_ids().map(|id| id.to_string()).collect();
                write!(f, "{}", names.join("|"))
            }
            Location::LocalMemory(off) => write!(f, "local[{}]", off),
            Location::PointedMemory { base, offset } => {
                let names: Vec<String> = base.iter_ids().map(|id| id.to_string()).collect();
                write!(f, "[{}{:+}]", names.join("|"), offset)
            }
            Location::Multiple(parts) => {
                let rendered: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

/// Tag name constants. Tags are looked up by `(InstrId, &'static str)` on
/// the owning `Container` (DESIGN.md's Open Question resolution) rather
/// than embedded in `Instruction`, so analyses can clear and rebuild their
/// own side maps without touching instruction identity (spec.md §9).
pub mod tag_names {
    pub const USED: &str = "used";
    pub const ENDLIFE: &str = "endlife";
    pub const PHIABLE: &str = "phiable";
    pub const LOC: &str = "loc";
    pub const LOCHINT: &str = "lochint";
}

/// A tag's payload (spec.md §3 "Tag"): "none, integer (use counts),
/// value-list (lifetime end-points), user-pointer (location
/// descriptors/hints)".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPayload {
    None,
    UseCount(u32),
    ValueList(Vec<InstrId>),
    Location(Location),
}

/// A name/payload pair attached to an instruction. Adding, querying, or
/// removing a tag never alters the semantic value it annotates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: &'static str,
    pub payload: TagPayload,
}

impl Tag {
    pub fn new(name: &'static str, payload: TagPayload) -> Tag {
        Tag { name, payload }
    }
}
