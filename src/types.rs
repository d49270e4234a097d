//! Canonical C type model (C1).
//!
//! Primitives are process-wide singletons (spec.md §3 invariant); every
//! other type is built by the caller and compared structurally, which is
//! sound here because this crate never interns non-primitive types itself —
//! interning is the parser/front-end's job, and this module only needs
//! structural equality to answer compatibility and size questions.

use std::fmt;

/// A primitive, sized scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Void,
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
}

use serde::{Deserialize, Serialize};

impl PrimitiveKind {
    pub const ALL: &'static [PrimitiveKind] = &[
        PrimitiveKind::Void,
        PrimitiveKind::Bool,
        PrimitiveKind::Char,
        PrimitiveKind::SChar,
        PrimitiveKind::UChar,
        PrimitiveKind::Short,
        PrimitiveKind::UShort,
        PrimitiveKind::Int,
        PrimitiveKind::UInt,
        PrimitiveKind::Long,
        PrimitiveKind::ULong,
        PrimitiveKind::LongLong,
        PrimitiveKind::ULongLong,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::LongDouble,
    ];

    /// Size in bytes for the LP64 x86-64 System V target this crate lowers
    /// to. (A genuinely target-parameterized table lives in `target`; this
    /// is the fallback used by code that only has a bare `CType` and no
    /// `Target` in scope, e.g. display/debugging.)
    pub fn size_bytes(self) -> usize {
        use PrimitiveKind::*;
        match self {
            Void => 0,
            Bool | Char | SChar | UChar => 1,
            Short | UShort => 2,
            Int | UInt | Float => 4,
            Long | ULong | LongLong | ULongLong | Double => 8,
            LongDouble => 16,
        }
    }

    pub fn is_signed(self) -> bool {
        use PrimitiveKind::*;
        matches!(self, Char | SChar | Short | Int | Long | LongLong)
    }

    pub fn is_unsigned(self) -> bool {
        use PrimitiveKind::*;
        matches!(self, Bool | UChar | UShort | UInt | ULong | ULongLong)
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double | PrimitiveKind::LongDouble)
    }

    pub fn is_integral(self) -> bool {
        !matches!(self, PrimitiveKind::Void) && !self.is_floating()
    }

    fn name(self) -> &'static str {
        use PrimitiveKind::*;
        match self {
            Void => "void",
            Bool => "_Bool",
            Char => "char",
            SChar => "signed char",
            UChar => "unsigned char",
            Short => "short",
            UShort => "unsigned short",
            Int => "int",
            UInt => "unsigned int",
            Long => "long",
            ULong => "unsigned long",
            LongLong => "long long",
            ULongLong => "unsigned long long",
            Float => "float",
            Double => "double",
            LongDouble => "long double",
        }
    }
}

/// Qualifier bits (`const`/`volatile`/`restrict`), forwarded by
/// classification queries to the inner type per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
}

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers { is_const: false, is_volatile: false, is_restrict: false };

    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }
}

/// A named, typed field of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: CType,
}

/// A canonical C type (spec.md §3, "Type").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CType {
    Primitive(PrimitiveKind),
    Pointer(Box<CType>),
    Array { element: Box<CType>, length: usize },
    Record { name: String, fields: Vec<Field> },
    Function { return_type: Box<CType>, parameters: Vec<CType> },
    Qualified { inner: Box<CType>, qualifiers: Qualifiers },
}

/// Compatibility verdict between two types (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compatibility {
    /// Structurally identical.
    Equal,
    /// Assignable without a cast (e.g. `int` to `long`, `T*` to `void*`).
    Implicit,
    /// Assignable only with an explicit cast (e.g. `int` to `short`, unrelated pointers).
    Explicit,
    /// Never convertible (e.g. a record to an unrelated record).
    Incompatible,
}

/// Type-class bits, derivable from structure (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeClass {
    pub arithmetic: bool,
    pub integral: bool,
    pub floating: bool,
    pub pointer: bool,
    pub composite: bool,
    pub signed: bool,
    pub unsigned: bool,
}

impl CType {
    pub const VOID: CType = CType::Primitive(PrimitiveKind::Void);
    pub const BOOL: CType = CType::Primitive(PrimitiveKind::Bool);
    pub const INT: CType = CType::Primitive(PrimitiveKind::Int);
    pub const UINT: CType = CType::Primitive(PrimitiveKind::UInt);
    pub const LONG: CType = CType::Primitive(PrimitiveKind::Long);
    pub const ULONG: CType = CType::Primitive(PrimitiveKind::ULong);
    pub const DOUBLE: CType = CType::Primitive(PrimitiveKind::Double);

    pub fn pointer_to(inner: CType) -> CType {
        CType::Pointer(Box::new(inner))
    }

    pub fn array_of(inner: CType, length: usize) -> CType {
        CType::Array { element: Box::new(inner), length }
    }

    /// Strip qualifiers, recursively. Most structural queries operate on
    /// the unqualified type; qualification only affects
    /// assignability-through-a-pointer, which this crate's IR does not
    /// model (the parser enforces it before IR is built).
    pub fn unqualified(&self) -> &CType {
        match self {
            CType::Qualified { inner, .. } => inner.unqualified(),
            other => other,
        }
    }

    /// Size in bytes on the LP64 x86-64 target. See `target::Target::size_of`
    /// for the target-parameterized variant used by the code generator.
    pub fn size_bytes(&self) -> usize {
        match self {
            CType::Primitive(p) => p.size_bytes(),
            CType::Pointer(_) | CType::Function { .. } => 8,
            CType::Array { element, length } => element.size_bytes() * length,
            CType::Record { fields, .. } => {
                // Simple sequential layout, no padding: a faithful
                // field-alignment model lives in `target` and is what the
                // code generator actually uses for frame offsets.
                fields.iter().map(|f| f.ty.size_bytes()).sum()
            }
            CType::Qualified { inner, .. } => inner.size_bytes(),
        }
    }

    pub fn type_class(&self) -> TypeClass {
        match self.unqualified() {
            CType::Primitive(PrimitiveKind::Void) => TypeClass::default(),
            CType::Primitive(p) => TypeClass {
                arithmetic: true,
                integral: p.is_integral(),
                floating: p.is_floating(),
                pointer: false,
                composite: false,
                signed: p.is_signed(),
                unsigned: p.is_unsigned(),
            },
            CType::Pointer(_) => TypeClass {
                pointer: true,
                unsigned: true, // pointer arithmetic/comparison is unsigned (spec.md §4.1)
                ..TypeClass::default()
            },
            CType::Array { .. } | CType::Record { .. } | CType::Function { .. } => TypeClass {
                composite: true,
                ..TypeClass::default()
            },
            CType::Qualified { .. } => unreachable!("unqualified() strips Qualified"),
        }
    }

    pub fn is_integral(&self) -> bool {
        self.type_class().integral
    }

    pub fn is_floating(&self) -> bool {
        self.type_class().floating
    }

    pub fn is_pointer(&self) -> bool {
        self.type_class().pointer
    }

    pub fn is_arithmetic(&self) -> bool {
        self.type_class().arithmetic
    }

    pub fn is_signed(&self) -> bool {
        self.type_class().signed
    }

    /// Compatibility verdict of `self` against `other` (spec.md §3).
    pub fn compatibility(&self, other: &CType) -> Compatibility {
        let a = self.unqualified();
        let b = other.unqualified();

        if a == b {
            return Compatibility::Equal;
        }

        match (a, b) {
            (CType::Primitive(pa), CType::Primitive(pb)) => {
                if pa.is_floating() || pb.is_floating() {
                    if pa.is_arith_or_floating() && pb.is_arith_or_floating() {
                        Compatibility::Implicit
                    } else {
                        Compatibility::Explicit
                    }
                } else if pa.is_integral() && pb.is_integral() {
                    // Widening, same signedness, or unsigned-from-signed-of-
                    // smaller-or-equal-width is implicit; narrowing is explicit.
                    if pa.size_bytes() >= pb.size_bytes() {
                        Compatibility::Implicit
                    } else {
                        Compatibility::Explicit
                    }
                } else {
                    Compatibility::Explicit
                }
            }
            (CType::Pointer(pa), CType::Pointer(pb)) => {
                if matches!(**pa, CType::Primitive(PrimitiveKind::Void))
                    || matches!(**pb, CType::Primitive(PrimitiveKind::Void))
                {
                    Compatibility::Implicit
                } else if pa.compatibility(pb) == Compatibility::Equal {
                    Compatibility::Implicit
                } else {
                    Compatibility::Explicit
                }
            }
            (CType::Pointer(_), CType::Primitive(p)) | (CType::Primitive(p), CType::Pointer(_)) => {
                if p.is_integral() {
                    Compatibility::Explicit
                } else {
                    Compatibility::Incompatible
                }
            }
            (CType::Array { element: ea, .. }, CType::Array { element: eb, .. }) => {
                ea.compatibility(eb)
            }
            (
                CType::Function { return_type: ra, parameters: pa },
                CType::Function { return_type: rb, parameters: pb },
            ) => {
                if pa.len() != pb.len() {
                    return Compatibility::Incompatible;
                }
                let ret_ok = ra.compatibility(rb) != Compatibility::Incompatible;
                let params_ok = pa.iter().zip(pb.iter()).all(|(x, y)| x.compatibility(y) != Compatibility::Incompatible);
                if ret_ok && params_ok {
                    Compatibility::Implicit
                } else {
                    Compatibility::Incompatible
                }
            }
            (CType::Record { name: na, .. }, CType::Record { name: nb, .. }) => {
                if na == nb {
                    Compatibility::Equal
                } else {
                    Compatibility::Incompatible
                }
            }
            _ => Compatibility::Incompatible,
        }
    }
}

impl PrimitiveKind {
    fn is_arith_or_floating(self) -> bool {
        self.is_integral() || self.is_floating()
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CType::Primitive(p) => write!(f, "{}", p.name()),
            CType::Pointer(inner) => write!(f, "{}*", inner),
            CType::Array { element, length } => write!(f, "{}[{}]", element, length),
            CType::Record { name, .. } => write!(f, "struct {}", name),
            CType::Function { return_type, parameters } => {
                write!(f, "{}(", return_type)?;
                for (i, p) in parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")
            }
            CType::Qualified { inner, qualifiers } => {
                if qualifiers.is_const {
                    write!(f, "const ")?;
                }
                if qualifiers.is_volatile {
                    write!(f, "volatile ")?;
                }
                if qualifiers.is_restrict {
                    write!(f, "restrict ")?;
                }
                write!(f, "{}", inner)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_sizes() {
        assert_eq!(PrimitiveKind::Int.size_bytes(), 4);
        assert_eq!(PrimitiveKind::Long.size_bytes(), 8);
        assert_eq!(CType::pointer_to(CType::INT).size_bytes(), 8);
    }

    #[test]
    fn widening_is_implicit_narrowing_is_explicit() {
        assert_eq!(CType::LONG.compatibility(&CType::INT), Compatibility::Implicit);
        assert_eq!(CType::INT.compatibility(&CType::LONG), Compatibility::Explicit);
    }

    #[test]
    fn equal_types_are_equal() {
        let a = CType::pointer_to(CType::INT);
        let b = CType::pointer_to(CType::INT);
        assert_eq!(a.compatibility(&b), Compatibility::Equal);
    }

    #[test]
    fn unrelated_pointers_are_explicit() {
        let a = CType::pointer_to(CType::INT);
        let b = CType::pointer_to(CType::DOUBLE);
        assert_eq!(a.compatibility(&b), Compatibility::Explicit);
    }

    #[test]
    fn record_identity_by_name() {
        let a = CType::Record { name: "point".into(), fields: vec![] };
        let b = CType::Record { name: "point".into(), fields: vec![] };
        let c = CType::Record { name: "line".into(), fields: vec![] };
        assert_eq!(a.compatibility(&b), Compatibility::Equal);
        assert_eq!(a.compatibility(&c), Compatibility::Incompatible);
    }

    #[test]
    fn qualified_forwards_classification() {
        let qualified = CType::Qualified {
            inner: Box::new(CType::INT),
            qualifiers: Qualifiers { is_const: true, ..Qualifiers::NONE },
        };
        assert!(qualified.is_integral());
        assert!(qualified.is_arithmetic());
        assert!(!qualified.is_pointer());
    }

    #[test]
    fn pointer_comparisons_are_unsigned() {
        assert!(CType::pointer_to(CType::INT).type_class().unsigned);
    }
}
