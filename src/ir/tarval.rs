//! # Target Values
//!
//! A [Tarval] is the host representation of a literal value of some [Mode].
//! Integer tarvals are stored in a 64-bit word masked to the mode width, so
//! all arithmetic wraps exactly like the target would; the bits above the
//! width are always kept zero. Float tarvals store the IEEE bit pattern and
//! only fold the operations that are exact under IEEE semantics.
//!
//! Binary operations require both operands to have the same mode (with the
//! usual exception of reference arithmetic, where one side may be an
//! integer, and shifts, whose shift amount may have any integer mode).
//! Unsupported combinations return `None` so callers can keep the
//! unevaluated node instead.

use core::fmt;

use super::Mode;

/// A literal value tagged with its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tarval {
    /// The raw bits, masked to the mode width.
    bits: u64,
    mode: Mode,
}

fn mask(mode: Mode) -> u64 {
    let bits = mode.bits();
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

impl Tarval {
    /// Create a tarval from raw bits, masking to the mode width.
    ///
    /// # Panics
    ///
    /// Panics for control and memory modes.
    pub fn new(bits: u64, mode: Mode) -> Tarval {
        assert!(mode.is_data(), "tarval requires a data mode, got {}", mode);
        Tarval {
            bits: bits & mask(mode),
            mode,
        }
    }

    /// Create an integer tarval from a signed value.
    pub fn from_i64(value: i64, mode: Mode) -> Tarval { Tarval::new(value as u64, mode) }

    /// Create a float tarval from an [f32].
    pub fn from_f32(value: f32) -> Tarval {
        Tarval {
            bits: value.to_bits() as u64,
            mode: Mode::F32,
        }
    }

    /// Create a float tarval from an [f64].
    pub fn from_f64(value: f64) -> Tarval {
        Tarval {
            bits: value.to_bits(),
            mode: Mode::F64,
        }
    }

    /// The zero of the given mode, i.e. the identity of `or`/`add`.
    pub fn zero(mode: Mode) -> Tarval { Tarval::new(0, mode) }

    /// The all-ones value of the given mode, i.e. the identity of `and`.
    pub fn all_ones(mode: Mode) -> Tarval { Tarval::new(u64::MAX, mode) }

    pub fn one(mode: Mode) -> Tarval { Tarval::new(1, mode) }

    pub fn mode(self) -> Mode { self.mode }

    /// The raw bits of the value.
    pub fn as_u64(self) -> u64 { self.bits }

    /// The value sign-extended according to the mode's signedness.
    pub fn as_i64(self) -> i64 {
        let bits = self.mode.bits();
        if self.mode.is_signed() && bits < 64 {
            // shift up and back down to sign-extend
            ((self.bits << (64 - bits)) as i64) >> (64 - bits)
        } else {
            self.bits as i64
        }
    }

    pub fn is_zero(self) -> bool { self.bits == 0 }

    pub fn is_one(self) -> bool { self.bits == 1 }

    pub fn is_all_ones(self) -> bool { self.bits == mask(self.mode) }

    /// Whether the value is a power of two. Used to recognize shift-strength
    /// multiplications.
    pub fn is_power_of_two(self) -> bool { self.bits.is_power_of_two() }

    /// The result mode of a binary operation, or `None` when the operand
    /// modes cannot be combined.
    ///
    /// Reference arithmetic allows an integer on either side and yields the
    /// reference mode, mirroring pointer `add`/`sub`.
    fn binop_mode(self, other: Tarval) -> Option<Mode> {
        if self.mode == other.mode {
            Some(self.mode)
        } else if self.mode.is_reference() && other.mode.is_int() {
            Some(self.mode)
        } else if self.mode.is_int() && other.mode.is_reference() {
            Some(other.mode)
        } else {
            None
        }
    }

    pub fn add(self, other: Tarval) -> Option<Tarval> {
        if self.mode.is_float() {
            return self.float_binop(other, |a, b| a + b);
        }
        let mode = self.binop_mode(other)?;
        Some(Tarval::new(self.bits.wrapping_add(other.bits), mode))
    }

    pub fn sub(self, other: Tarval) -> Option<Tarval> {
        if self.mode.is_float() {
            return self.float_binop(other, |a, b| a - b);
        }
        let mode = self.binop_mode(other)?;
        Some(Tarval::new(self.bits.wrapping_sub(other.bits), mode))
    }

    pub fn mul(self, other: Tarval) -> Option<Tarval> {
        if self.mode.is_float() {
            return self.float_binop(other, |a, b| a * b);
        }
        if self.mode != other.mode || !self.mode.is_int() {
            return None;
        }
        Some(Tarval::new(self.bits.wrapping_mul(other.bits), self.mode))
    }

    /// Shift left. The shift amount may have any integer mode; shifting by
    /// the width or more yields zero.
    pub fn shl(self, shamt: Tarval) -> Option<Tarval> {
        if !self.mode.is_int() || !shamt.mode.is_int() {
            return None;
        }
        let amount = shamt.bits;
        if amount >= u64::from(self.mode.bits()) {
            return Some(Tarval::zero(self.mode));
        }
        Some(Tarval::new(self.bits << amount, self.mode))
    }

    pub fn and(self, other: Tarval) -> Option<Tarval> {
        if self.mode != other.mode || !self.mode.is_int() {
            return None;
        }
        Some(Tarval::new(self.bits & other.bits, self.mode))
    }

    pub fn or(self, other: Tarval) -> Option<Tarval> {
        if self.mode != other.mode || !self.mode.is_int() {
            return None;
        }
        Some(Tarval::new(self.bits | other.bits, self.mode))
    }

    /// Bitwise exclusive or.
    pub fn eor(self, other: Tarval) -> Option<Tarval> {
        if self.mode != other.mode || !self.mode.is_int() {
            return None;
        }
        Some(Tarval::new(self.bits ^ other.bits, self.mode))
    }

    pub fn not(self) -> Option<Tarval> {
        if !self.mode.is_int() {
            return None;
        }
        Some(Tarval::new(!self.bits, self.mode))
    }

    /// Convert the value to another integer mode: truncate to a narrower
    /// width, or extend to a wider one according to the *source* signedness.
    pub fn convert(self, to: Mode) -> Option<Tarval> {
        if !self.mode.is_int() || !to.is_int() {
            return None;
        }
        if to.bits() <= self.mode.bits() {
            return Some(Tarval::new(self.bits, to));
        }
        if self.mode.is_signed() {
            Some(Tarval::from_i64(self.as_i64(), to))
        } else {
            Some(Tarval::new(self.bits, to))
        }
    }

    fn float_binop(self, other: Tarval, f: fn(f64, f64) -> f64) -> Option<Tarval> {
        if self.mode != other.mode {
            return None;
        }
        match self.mode {
            Mode::Float { bits: 32 } => {
                let a = f32::from_bits(self.bits as u32);
                let b = f32::from_bits(other.bits as u32);
                Some(Tarval::from_f32(f(f64::from(a), f64::from(b)) as f32))
            }
            Mode::Float { bits: 64 } => {
                let a = f64::from_bits(self.bits);
                let b = f64::from_bits(other.bits);
                Some(Tarval::from_f64(f(a, b)))
            }
            Mode::Float { .. } | Mode::Int { .. } | Mode::Ref | Mode::Ctrl | Mode::Mem => None,
        }
    }
}

impl fmt::Display for Tarval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}:{}", self.bits, self.mode)
    }
}
