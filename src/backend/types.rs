// Type definitions shared by the compiler, the module format and the VM

use std::fmt;

/// Numeric type of an expression or function-table slot.
///
/// The byte values are stored in the `parameterTypes` bytes of the on-disk
/// function table.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    /// 64-bit signed integer
    Int = 0,
    /// 32-bit float
    Single = 1,
    /// 64-bit float
    Double = 2,
    /// Not yet inferred (forward references, external returns)
    #[default]
    Unknown = 3,
}

/// Number of type tags including `Unknown`
pub const TYPE_COUNT: usize = 4;

impl ValueType {
    /// Decode a type byte from a module file
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Int),
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Unknown),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Parse the surface-syntax type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "single" => Some(Self::Single),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Single => "single",
            Self::Double => "double",
            Self::Unknown => "unknown",
        }
    }

    #[inline]
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Single | Self::Double)
    }

    /// Numeric promotion of two operand types.
    ///
    /// An unknown side takes the other side's type. Any floating operand
    /// makes the result floating, double if either side is double. Returns
    /// `None` for a pairing with no promotion.
    pub fn promote(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Unknown, t) | (t, Self::Unknown) => Some(t),
            (Self::Int, Self::Int) => Some(Self::Int),
            (a, b) if a.is_float() || b.is_float() => {
                if a == Self::Double || b == Self::Double {
                    Some(Self::Double)
                } else {
                    Some(Self::Single)
                }
            }
            _ => None,
        }
    }

    /// Two types are compatible when equal or when either is unknown
    #[inline]
    pub fn compatible(self, other: Self) -> bool {
        self == other || !self.is_known() || !other.is_known()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A literal value as written in source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i64),
    Single(f32),
    Double(f64),
}

impl Constant {
    pub fn value_type(&self) -> ValueType {
        match self {
            Constant::Int(_) => ValueType::Int,
            Constant::Single(_) => ValueType::Single,
            Constant::Double(_) => ValueType::Double,
        }
    }

    /// Constant-pool word for this literal
    pub fn to_word(&self) -> u64 {
        match self {
            Constant::Int(v) => *v as u64,
            Constant::Single(v) => u64::from(v.to_bits()),
            Constant::Double(v) => v.to_bits(),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Single(v) => write!(f, "{}f", v),
            Constant::Double(v) => write!(f, "{:?}", v),
        }
    }
}
