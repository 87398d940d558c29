//! The numeric tower `Int32 < Int64 < Float32 < Float64` and the
//! promotion/narrowing rules that govern arithmetic over it.

use std::cmp::Ordering;

use crate::value::Value;

/// A value drawn from [`Value`]'s numeric variants, lifted out so
/// arithmetic can be written once instead of once per `Value` variant
/// pairing.
#[derive(Debug, Clone, Copy)]
pub enum Numeric {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

/// Tower rank: higher wins promotion.
fn rank(n: &Numeric) -> u8 {
    match n {
        Numeric::Int32(_) => 0,
        Numeric::Int64(_) => 1,
        Numeric::Float32(_) => 2,
        Numeric::Float64(_) => 3,
    }
}

impl Numeric {
    pub fn to_f64(self) -> f64 {
        match self {
            Numeric::Int32(n) => n as f64,
            Numeric::Int64(n) => n as f64,
            Numeric::Float32(n) => n as f64,
            Numeric::Float64(n) => n,
        }
    }

    pub fn to_i64(self) -> i64 {
        match self {
            Numeric::Int32(n) => n as i64,
            Numeric::Int64(n) => n,
            Numeric::Float32(n) => n as i64,
            Numeric::Float64(n) => n as i64,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Numeric::Float32(_) | Numeric::Float64(_))
    }

    pub fn is_zero(self) -> bool {
        match self {
            Numeric::Int32(n) => n == 0,
            Numeric::Int64(n) => n == 0,
            Numeric::Float32(n) => n == 0.0,
            Numeric::Float64(n) => n == 0.0,
        }
    }

    pub fn eq_value(&self, other: &Numeric) -> bool {
        self.to_f64() == other.to_f64()
    }

    pub fn partial_cmp_value(&self, other: &Numeric) -> Option<Ordering> {
        self.to_f64().partial_cmp(&other.to_f64())
    }

    pub fn neg(self) -> Numeric {
        match self {
            Numeric::Int32(n) => narrow_int(-(n as i64)),
            Numeric::Int64(n) => match n.checked_neg() {
                Some(v) => narrow_int(v),
                None => narrow_float(-(n as f64)),
            },
            Numeric::Float32(n) => narrow_float((-n) as f64),
            Numeric::Float64(n) => narrow_float(-n),
        }
    }

    /// Widen both operands to the higher tower rank before the caller
    /// performs the actual op.
    pub fn promote(a: Numeric, b: Numeric) -> (Numeric, Numeric) {
        if rank(&a) >= rank(&b) {
            (a, widen_to(b, rank(&a)))
        } else {
            (widen_to(a, rank(&b)), b)
        }
    }
}

fn widen_to(n: Numeric, target_rank: u8) -> Numeric {
    match target_rank {
        1 => Numeric::Int64(n.to_i64()),
        2 => Numeric::Float32(n.to_f64() as f32),
        3 => Numeric::Float64(n.to_f64()),
        _ => n,
    }
}

/// Integral narrowing: `Int32` iff the value round-trips
/// through 32 bits, else `Int64`.
pub fn narrow_int(n: i64) -> Numeric {
    if n >= i32::MIN as i64 && n <= i32::MAX as i64 {
        Numeric::Int32(n as i32)
    } else {
        Numeric::Int64(n)
    }
}

/// Float narrowing: `Float32` iff the value round-trips
/// through single precision, else `Float64`.
pub fn narrow_float(n: f64) -> Numeric {
    if (n as f32) as f64 == n {
        Numeric::Float32(n as f32)
    } else {
        Numeric::Float64(n)
    }
}

pub fn numeric_to_value(n: Numeric) -> Value {
    match n {
        Numeric::Int32(v) => Value::Int32(v),
        Numeric::Int64(v) => Value::Int64(v),
        Numeric::Float32(v) => Value::Float32(v),
        Numeric::Float64(v) => Value::Float64(v),
    }
}

/// Add, narrowing the integer result and reapplying promotion. Integer
/// overflow during add/sub/mul widens to `Int64`/`Float64` rather than
/// wrapping, matching property 2 ("not silent truncation").
pub fn add(a: Numeric, b: Numeric) -> Numeric {
    let (a, b) = Numeric::promote(a, b);
    match (a, b) {
        (Numeric::Int32(x), Numeric::Int32(y)) => narrow_int(x as i64 + y as i64),
        (Numeric::Int64(x), Numeric::Int64(y)) => match x.checked_add(y) {
            Some(v) => narrow_int(v),
            None => narrow_float(x as f64 + y as f64),
        },
        (Numeric::Float32(x), Numeric::Float32(y)) => narrow_float((x + y) as f64),
        (Numeric::Float64(x), Numeric::Float64(y)) => narrow_float(x + y),
        _ => unreachable!("promote equalizes ranks"),
    }
}

pub fn sub(a: Numeric, b: Numeric) -> Numeric {
    add(a, b.neg())
}

pub fn mul(a: Numeric, b: Numeric) -> Numeric {
    let (a, b) = Numeric::promote(a, b);
    match (a, b) {
        (Numeric::Int32(x), Numeric::Int32(y)) => narrow_int(x as i64 * y as i64),
        (Numeric::Int64(x), Numeric::Int64(y)) => match x.checked_mul(y) {
            Some(v) => narrow_int(v),
            None => narrow_float(x as f64 * y as f64),
        },
        (Numeric::Float32(x), Numeric::Float32(y)) => narrow_float((x * y) as f64),
        (Numeric::Float64(x), Numeric::Float64(y)) => narrow_float(x * y),
        _ => unreachable!("promote equalizes ranks"),
    }
}

/// `/` always yields a float, narrowed.
pub fn div(a: Numeric, b: Numeric) -> Numeric {
    narrow_float(a.to_f64() / b.to_f64())
}

/// `%` for two numbers: Python's floored modulo, narrowed back to int when
/// both operands are integral.
pub fn modulo(a: Numeric, b: Numeric) -> Numeric {
    let (a, b) = Numeric::promote(a, b);
    if a.is_float() {
        let (x, y) = (a.to_f64(), b.to_f64());
        narrow_float(((x % y) + y) % y)
    } else {
        let (x, y) = (a.to_i64(), b.to_i64());
        narrow_int(x.rem_euclid(y))
    }
}

/// `**`: narrowed to int if the base/exponent are integral and the
/// exponent is non-negative; otherwise floating exponentiation.
pub fn pow(a: Numeric, b: Numeric) -> Numeric {
    if !a.is_float() && !b.is_float() && b.to_i64() >= 0 {
        let base = a.to_i64();
        let exp = b.to_i64() as u32;
        match base.checked_pow(exp) {
            Some(v) => narrow_int(v),
            None => narrow_float((base as f64).powf(exp as f64)),
        }
    } else {
        narrow_float(a.to_f64().powf(b.to_f64()))
    }
}
