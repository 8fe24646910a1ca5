// types.rs — Scalar type descriptors
//
// A `Type` names the scalar kind (signed/unsigned integer, float, handle) and
// bit width of a parameter, buffer element, or expression. `ScalarType` maps
// Rust scalar types onto descriptors and a 64-bit storage representation.
//
// Preconditions: none.
// Postconditions: `type_of::<T>()` is stable for every implementing type.
// Failure modes: `Type::parse` returns `None` for unknown names.
// Side effects: none.

use std::fmt;

use serde::{Serialize, Serializer};

// ── Type descriptor ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Int,
    UInt,
    Float,
    Handle,
}

/// Scalar kind plus bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    pub code: TypeCode,
    pub bits: u8,
}

impl Type {
    pub const fn int(bits: u8) -> Self {
        Type {
            code: TypeCode::Int,
            bits,
        }
    }

    pub const fn uint(bits: u8) -> Self {
        Type {
            code: TypeCode::UInt,
            bits,
        }
    }

    pub const fn float(bits: u8) -> Self {
        Type {
            code: TypeCode::Float,
            bits,
        }
    }

    pub const fn bool() -> Self {
        Type::uint(1)
    }

    /// Opaque pointer-sized value.
    pub const fn handle() -> Self {
        Type {
            code: TypeCode::Handle,
            bits: 64,
        }
    }

    pub fn is_int(&self) -> bool {
        self.code == TypeCode::Int
    }

    pub fn is_uint(&self) -> bool {
        self.code == TypeCode::UInt
    }

    pub fn is_float(&self) -> bool {
        self.code == TypeCode::Float
    }

    pub fn is_handle(&self) -> bool {
        self.code == TypeCode::Handle
    }

    /// Storage size of one element, rounded up to whole bytes.
    pub fn bytes(&self) -> usize {
        (self.bits as usize).div_ceil(8)
    }

    /// Parse a type name as printed by `Display` (`int32`, `uint8`, `float32`,
    /// `bool`, `handle`).
    pub fn parse(name: &str) -> Option<Type> {
        match name {
            "bool" => return Some(Type::bool()),
            "handle" => return Some(Type::handle()),
            _ => {}
        }
        let (code, digits) = if let Some(rest) = name.strip_prefix("uint") {
            (TypeCode::UInt, rest)
        } else if let Some(rest) = name.strip_prefix("int") {
            (TypeCode::Int, rest)
        } else if let Some(rest) = name.strip_prefix("float") {
            (TypeCode::Float, rest)
        } else {
            return None;
        };
        let bits: u8 = digits.parse().ok()?;
        let valid = match code {
            TypeCode::Float => matches!(bits, 16 | 32 | 64),
            _ => matches!(bits, 8 | 16 | 32 | 64),
        };
        valid.then_some(Type { code, bits })
    }

    /// The C spelling used when rendering entry-point prototypes.
    pub fn c_name(&self) -> &'static str {
        match (self.code, self.bits) {
            (TypeCode::UInt, 1) => "bool",
            (TypeCode::Int, 8) => "int8_t",
            (TypeCode::Int, 16) => "int16_t",
            (TypeCode::Int, 32) => "int32_t",
            (TypeCode::Int, 64) => "int64_t",
            (TypeCode::UInt, 8) => "uint8_t",
            (TypeCode::UInt, 16) => "uint16_t",
            (TypeCode::UInt, 32) => "uint32_t",
            (TypeCode::UInt, 64) => "uint64_t",
            (TypeCode::Float, 16) => "uint16_t",
            (TypeCode::Float, 32) => "float",
            (TypeCode::Float, 64) => "double",
            _ => "void *",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            TypeCode::Int => write!(f, "int{}", self.bits),
            TypeCode::UInt if self.bits == 1 => write!(f, "bool"),
            TypeCode::UInt => write!(f, "uint{}", self.bits),
            TypeCode::Float => write!(f, "float{}", self.bits),
            TypeCode::Handle => write!(f, "handle"),
        }
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Rust scalar mapping ─────────────────────────────────────────────────────

/// A Rust type that can be bound to a scalar parameter.
///
/// Values are stored as the low `type_of().bits` bits of a `u64`, which is
/// also the representation buffers use for their host bytes.
pub trait ScalarType: Copy + 'static {
    fn type_of() -> Type;
    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;
}

/// The descriptor for `T`.
pub fn type_of<T: ScalarType>() -> Type {
    T::type_of()
}

macro_rules! impl_int_scalar {
    ($($t:ty => $unsigned:ty, $ctor:ident($bits:expr);)*) => {
        $(
            impl ScalarType for $t {
                fn type_of() -> Type {
                    Type::$ctor($bits)
                }
                fn to_bits(self) -> u64 {
                    self as $unsigned as u64
                }
                fn from_bits(bits: u64) -> Self {
                    bits as $unsigned as $t
                }
            }
        )*
    };
}

impl_int_scalar! {
    i8 => u8, int(8);
    i16 => u16, int(16);
    i32 => u32, int(32);
    i64 => u64, int(64);
    u8 => u8, uint(8);
    u16 => u16, uint(16);
    u32 => u32, uint(32);
    u64 => u64, uint(64);
}

impl ScalarType for bool {
    fn type_of() -> Type {
        Type::bool()
    }
    fn to_bits(self) -> u64 {
        self as u64
    }
    fn from_bits(bits: u64) -> Self {
        bits & 1 != 0
    }
}

impl ScalarType for f32 {
    fn type_of() -> Type {
        Type::float(32)
    }
    fn to_bits(self) -> u64 {
        f32::to_bits(self) as u64
    }
    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl ScalarType for f64 {
    fn type_of() -> Type {
        Type::float(64)
    }
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl<T: 'static> ScalarType for *mut T {
    fn type_of() -> Type {
        Type::handle()
    }
    fn to_bits(self) -> u64 {
        self as usize as u64
    }
    fn from_bits(bits: u64) -> Self {
        bits as usize as *mut T
    }
}

impl<T: 'static> ScalarType for *const T {
    fn type_of() -> Type {
        Type::handle()
    }
    fn to_bits(self) -> u64 {
        self as usize as u64
    }
    fn from_bits(bits: u64) -> Self {
        bits as usize as *const T
    }
}

// ── Tests ──
