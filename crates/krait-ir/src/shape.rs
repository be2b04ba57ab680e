//! # Shape lattice
//!
//! Per-value abstract-type facts refined monotonically during optimization.
//!
//! The lattice, ordered by increasing precision:
//!
//! ```text
//! Unknown  ⊏  Possible({T, U, ...})  ⊏  Exact(T)  ⊏  Constant(v)
//! ```
//!
//! `join` computes the least upper bound at control-flow merges; `refine`
//! computes the meet of the current fact and a newly derived fact and is the
//! only way a node's shape changes. A conflicting refinement (contradictory
//! facts) is a defect in a pass, reported as a lattice violation rather than
//! silently tolerated, since monotonicity is what bounds fixpoint iteration.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, Zero};

/// The closed set of runtime value types the lattice tracks.
///
/// `Bool` is a distinct lattice point from `Int`; the folder's operator
/// matrix promotes bool operands to int where runtime arithmetic does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Int,
    Float,
    Bool,
    Str,
    Bytes,
    None,
    List,
    Tuple,
    Dict,
    Set,
    Function,
}

impl ValueType {
    /// All lattice type points, in bit order.
    pub const ALL: [ValueType; 11] = [
        ValueType::Int,
        ValueType::Float,
        ValueType::Bool,
        ValueType::Str,
        ValueType::Bytes,
        ValueType::None,
        ValueType::List,
        ValueType::Tuple,
        ValueType::Dict,
        ValueType::Set,
        ValueType::Function,
    ];

    /// The runtime type name, as `type(x).__name__` would report it.
    pub fn runtime_name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::Str => "str",
            ValueType::Bytes => "bytes",
            ValueType::None => "NoneType",
            ValueType::List => "list",
            ValueType::Tuple => "tuple",
            ValueType::Dict => "dict",
            ValueType::Set => "set",
            ValueType::Function => "function",
        }
    }

    /// True for `int`, `float`, and `bool` (which arithmetic treats as int).
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float | ValueType::Bool)
    }

    fn bit(self) -> u16 {
        match self {
            ValueType::Int => 1 << 0,
            ValueType::Float => 1 << 1,
            ValueType::Bool => 1 << 2,
            ValueType::Str => 1 << 3,
            ValueType::Bytes => 1 << 4,
            ValueType::None => 1 << 5,
            ValueType::List => 1 << 6,
            ValueType::Tuple => 1 << 7,
            ValueType::Dict => 1 << 8,
            ValueType::Set => 1 << 9,
            ValueType::Function => 1 << 10,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.runtime_name())
    }
}

/// A set of [`ValueType`] points, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeSet(u16);

impl TypeSet {
    pub const EMPTY: TypeSet = TypeSet(0);

    pub fn of(types: &[ValueType]) -> Self {
        let mut set = Self::EMPTY;
        for &ty in types {
            set.insert(ty);
        }
        set
    }

    pub fn insert(&mut self, ty: ValueType) {
        self.0 |= ty.bit();
    }

    pub fn contains(self, ty: ValueType) -> bool {
        self.0 & ty.bit() != 0
    }

    pub fn union(self, other: TypeSet) -> TypeSet {
        TypeSet(self.0 | other.0)
    }

    pub fn intersection(self, other: TypeSet) -> TypeSet {
        TypeSet(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// The sole member, if this is a singleton set.
    pub fn single(self) -> Option<ValueType> {
        if self.len() == 1 {
            self.iter().next()
        } else {
            None
        }
    }

    pub fn iter(self) -> impl Iterator<Item = ValueType> {
        ValueType::ALL.into_iter().filter(move |ty| self.contains(*ty))
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, ty) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, "}}")
    }
}

/// A compile-time-known runtime value.
///
/// Integers are arbitrary precision; folding must reproduce exact runtime
/// arithmetic with no silent precision loss.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(BigInt),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    None,
    Tuple(Vec<ConstValue>),
    List(Vec<ConstValue>),
    Set(Vec<ConstValue>),
    Dict(Vec<(ConstValue, ConstValue)>),
}

impl ConstValue {
    pub fn int(v: impl Into<BigInt>) -> Self {
        ConstValue::Int(v.into())
    }

    pub fn str(v: impl Into<String>) -> Self {
        ConstValue::Str(v.into())
    }

    /// The runtime type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            ConstValue::Int(_) => ValueType::Int,
            ConstValue::Float(_) => ValueType::Float,
            ConstValue::Bool(_) => ValueType::Bool,
            ConstValue::Str(_) => ValueType::Str,
            ConstValue::Bytes(_) => ValueType::Bytes,
            ConstValue::None => ValueType::None,
            ConstValue::Tuple(_) => ValueType::Tuple,
            ConstValue::List(_) => ValueType::List,
            ConstValue::Set(_) => ValueType::Set,
            ConstValue::Dict(_) => ValueType::Dict,
        }
    }

    /// Runtime truthiness: zero, empty, and `None` are falsy.
    pub fn truthiness(&self) -> bool {
        match self {
            ConstValue::Int(v) => !v.is_zero(),
            ConstValue::Float(v) => *v != 0.0,
            ConstValue::Bool(v) => *v,
            ConstValue::Str(v) => !v.is_empty(),
            ConstValue::Bytes(v) => !v.is_empty(),
            ConstValue::None => false,
            ConstValue::Tuple(v) | ConstValue::List(v) | ConstValue::Set(v) => !v.is_empty(),
            ConstValue::Dict(v) => !v.is_empty(),
        }
    }

    /// Runtime `==` semantics. Numeric values compare across int/float/bool
    /// (`1 == 1.0 == True`); sets and dicts compare order-insensitively;
    /// values of unrelated types are unequal. Never raises.
    pub fn py_eq(&self, other: &ConstValue) -> bool {
        use ConstValue::*;
        match (self, other) {
            (Int(_) | Float(_) | Bool(_), Int(_) | Float(_) | Bool(_)) => {
                numeric_eq(self, other)
            }
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (None, None) => true,
            (Tuple(a), Tuple(b)) | (List(a), List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
            }
            (Set(a), Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.py_eq(y)))
            }
            (Dict(a), Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(k2, v2)| k.py_eq(k2) && v.py_eq(v2))
                    })
            }
            _ => false,
        }
    }

    /// True if this value and everything it contains is immutable, so a
    /// single materialized object may be shared between evaluations.
    /// Mutable containers (list, set, dict) must be rebuilt per evaluation.
    pub fn is_deeply_immutable(&self) -> bool {
        match self {
            ConstValue::Int(_)
            | ConstValue::Float(_)
            | ConstValue::Bool(_)
            | ConstValue::Str(_)
            | ConstValue::Bytes(_)
            | ConstValue::None => true,
            ConstValue::Tuple(elements) => elements.iter().all(ConstValue::is_deeply_immutable),
            ConstValue::List(_) | ConstValue::Set(_) | ConstValue::Dict(_) => false,
        }
    }

    /// True if the value is usable as a set element or dict key. For the
    /// builtin types tracked here this coincides with deep immutability.
    pub fn is_hashable(&self) -> bool {
        self.is_deeply_immutable()
    }
}

fn numeric_eq(a: &ConstValue, b: &ConstValue) -> bool {
    use ConstValue::*;
    match (a, b) {
        (Int(x), Int(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (Bool(x), Bool(y)) => x == y,
        (Bool(x), Int(y)) | (Int(y), Bool(x)) => BigInt::from(*x as i64) == *y,
        (Bool(x), Float(y)) | (Float(y), Bool(x)) => (*x as i64 as f64) == *y,
        (Int(x), Float(y)) | (Float(y), Int(x)) => {
            cmp_int_float(x, *y) == Some(Ordering::Equal)
        }
        _ => false,
    }
}

/// Exact ordering between an arbitrary-precision integer and a float,
/// without converting the integer to `f64` (which would round for large
/// magnitudes). `None` for NaN.
pub(crate) fn cmp_int_float(a: &BigInt, b: f64) -> Option<Ordering> {
    if b.is_nan() {
        return None;
    }
    if b == f64::INFINITY {
        return Some(Ordering::Less);
    }
    if b == f64::NEG_INFINITY {
        return Some(Ordering::Greater);
    }
    // Finite: split into integral part (exactly representable in BigInt)
    // and fractional remainder.
    let trunc = BigInt::from_f64(b.trunc())?;
    match a.cmp(&trunc) {
        Ordering::Less => Some(Ordering::Less),
        Ordering::Greater => Some(Ordering::Greater),
        Ordering::Equal => {
            let fract = b.fract();
            if fract == 0.0 {
                Some(Ordering::Equal)
            } else if fract > 0.0 {
                Some(Ordering::Less)
            } else {
                Some(Ordering::Greater)
            }
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{:?}", v),
            ConstValue::Bool(true) => write!(f, "True"),
            ConstValue::Bool(false) => write!(f, "False"),
            ConstValue::Str(v) => write!(f, "{:?}", v),
            ConstValue::Bytes(v) => write!(f, "b\"{}\"", v.escape_ascii()),
            ConstValue::None => write!(f, "None"),
            ConstValue::Tuple(elements) => {
                write!(f, "(")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                if elements.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            ConstValue::List(elements) => {
                write!(f, "[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            ConstValue::Set(elements) => {
                if elements.is_empty() {
                    return write!(f, "set()");
                }
                write!(f, "{{")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "}}")
            }
            ConstValue::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Attempted refinement with a fact that contradicts the established one.
///
/// This is always a defect in a pass implementation: correct passes derive
/// facts monotonically and never contradict earlier derivations.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeConflict {
    pub current: Shape,
    pub proposed: Shape,
}

impl fmt::Display for ShapeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shape {} contradicts established {}",
            self.proposed, self.current
        )
    }
}

/// Abstract static knowledge about a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Shape {
    /// Nothing is known; the bottom of knowledge.
    #[default]
    Unknown,
    /// The value has one of at least two types. Singletons normalize to
    /// [`Shape::Exact`]; the set is never empty.
    Possible(TypeSet),
    /// The exact runtime type is known.
    Exact(ValueType),
    /// The exact value is known. Implies `Exact(type_of(v))`.
    Constant(ConstValue),
}

impl Shape {
    /// A `Possible` shape, normalized: empty is not representable and a
    /// singleton collapses to `Exact`.
    pub fn possible(types: TypeSet) -> Shape {
        match types.single() {
            Some(ty) => Shape::Exact(ty),
            None if types.is_empty() => Shape::Unknown,
            None => Shape::Possible(types),
        }
    }

    /// Lattice precision rank, increasing toward `Constant`.
    pub fn precision(&self) -> u8 {
        match self {
            Shape::Unknown => 0,
            Shape::Possible(_) => 1,
            Shape::Exact(_) => 2,
            Shape::Constant(_) => 3,
        }
    }

    /// The set of types this value may have, or `None` when unconstrained.
    pub fn value_types(&self) -> Option<TypeSet> {
        match self {
            Shape::Unknown => None,
            Shape::Possible(types) => Some(*types),
            Shape::Exact(ty) => Some(TypeSet::of(&[*ty])),
            Shape::Constant(v) => Some(TypeSet::of(&[v.value_type()])),
        }
    }

    /// True when the value is known to have exactly the given type.
    pub fn is_exact(&self, ty: ValueType) -> bool {
        self.exact_type() == Some(ty)
    }

    /// The exact type, if known (`Exact` or `Constant`).
    pub fn exact_type(&self) -> Option<ValueType> {
        match self {
            Shape::Exact(ty) => Some(*ty),
            Shape::Constant(v) => Some(v.value_type()),
            _ => None,
        }
    }

    /// The known constant value, if any.
    pub fn constant_value(&self) -> Option<&ConstValue> {
        match self {
            Shape::Constant(v) => Some(v),
            _ => None,
        }
    }

    /// Least upper bound, used when control-flow branches merge.
    ///
    /// Equal constants stay constant; unequal constants of one type keep the
    /// type (`Constant(5) ⊔ Constant(6) = Exact(int)`); diverging types
    /// widen to `Possible`; `Unknown` absorbs everything.
    pub fn join(&self, other: &Shape) -> Shape {
        match (self, other) {
            (Shape::Unknown, _) | (_, Shape::Unknown) => Shape::Unknown,
            (Shape::Constant(a), Shape::Constant(b)) if a == b => Shape::Constant(a.clone()),
            _ => {
                // Both are non-Unknown here, so both carry a type set.
                let (Some(a), Some(b)) = (self.value_types(), other.value_types()) else {
                    return Shape::Unknown;
                };
                Shape::possible(a.union(b))
            }
        }
    }

    /// Meet with a newly derived fact. Returns whether the shape changed.
    ///
    /// Monotonic by construction: the result is at least as precise as the
    /// current shape. A contradictory fact is a [`ShapeConflict`], surfaced
    /// by the driver as a lattice violation.
    pub fn refine(&mut self, proposed: Shape) -> Result<bool, ShapeConflict> {
        enum Meet {
            Keep,
            Replace(Shape),
        }
        let meet = match (&*self, &proposed) {
            (_, Shape::Unknown) => Meet::Keep,
            (Shape::Unknown, fact) => Meet::Replace(fact.clone()),
            (Shape::Possible(a), Shape::Possible(b)) => {
                let both = a.intersection(*b);
                if both.is_empty() {
                    return Err(ShapeConflict {
                        current: self.clone(),
                        proposed: proposed.clone(),
                    });
                }
                Meet::Replace(Shape::possible(both))
            }
            (Shape::Possible(a), Shape::Exact(ty)) if a.contains(*ty) => {
                Meet::Replace(Shape::Exact(*ty))
            }
            (Shape::Possible(a), Shape::Constant(v)) if a.contains(v.value_type()) => {
                Meet::Replace(proposed.clone())
            }
            (Shape::Exact(a), Shape::Possible(b)) if b.contains(*a) => Meet::Keep,
            (Shape::Exact(a), Shape::Exact(b)) if a == b => Meet::Keep,
            (Shape::Exact(a), Shape::Constant(v)) if v.value_type() == *a => {
                Meet::Replace(proposed.clone())
            }
            (Shape::Constant(v), Shape::Constant(w)) if v == w => Meet::Keep,
            (Shape::Constant(v), fact)
                if !matches!(fact, Shape::Constant(_))
                    && fact
                        .value_types()
                        .is_some_and(|types| types.contains(v.value_type())) =>
            {
                Meet::Keep
            }
            _ => {
                return Err(ShapeConflict {
                    current: self.clone(),
                    proposed: proposed.clone(),
                });
            }
        };
        match meet {
            Meet::Keep => Ok(false),
            Meet::Replace(refined) => {
                let changed = refined != *self;
                *self = refined;
                Ok(changed)
            }
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Unknown => write!(f, "unknown"),
            Shape::Possible(types) => write!(f, "possible {}", types),
            Shape::Exact(ty) => write!(f, "exact {}", ty),
            Shape::Constant(v) => write!(f, "constant {}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Shape {
        Shape::Constant(ConstValue::int(v))
    }

    #[test]
    fn join_of_unequal_int_constants_keeps_the_type() {
        let joined = int(5).join(&int(6));
        assert_eq!(joined, Shape::Exact(ValueType::Int));
    }

    #[test]
    fn join_of_equal_constants_stays_constant() {
        assert_eq!(int(5).join(&int(5)), int(5));
    }

    #[test]
    fn join_of_diverging_types_widens_to_possible() {
        let joined = Shape::Exact(ValueType::Int).join(&Shape::Exact(ValueType::Str));
        assert_eq!(
            joined,
            Shape::Possible(TypeSet::of(&[ValueType::Int, ValueType::Str]))
        );
    }

    #[test]
    fn join_with_unknown_is_unknown() {
        assert_eq!(int(5).join(&Shape::Unknown), Shape::Unknown);
        assert_eq!(Shape::Unknown.join(&int(5)), Shape::Unknown);
    }

    #[test]
    fn refine_moves_toward_precision() {
        let mut shape = Shape::Unknown;
        assert!(shape.refine(Shape::Exact(ValueType::Int)).unwrap());
        assert!(shape.refine(int(5)).unwrap());
        assert_eq!(shape, int(5));
    }

    #[test]
    fn refine_with_less_precise_consistent_fact_is_a_no_op() {
        let mut shape = int(5);
        assert!(!shape.refine(Shape::Exact(ValueType::Int)).unwrap());
        assert!(!shape.refine(Shape::Unknown).unwrap());
        assert_eq!(shape, int(5));
    }

    #[test]
    fn refine_with_contradictory_fact_is_a_conflict() {
        let mut shape = Shape::Exact(ValueType::Int);
        assert!(shape.refine(Shape::Exact(ValueType::Str)).is_err());

        let mut shape = int(5);
        assert!(shape.refine(int(6)).is_err());
    }

    #[test]
    fn refine_intersects_possible_sets() {
        let mut shape = Shape::Possible(TypeSet::of(&[
            ValueType::Int,
            ValueType::Str,
            ValueType::Float,
        ]));
        let changed = shape
            .refine(Shape::Possible(TypeSet::of(&[
                ValueType::Int,
                ValueType::Str,
            ])))
            .unwrap();
        assert!(changed);
        assert_eq!(
            shape,
            Shape::Possible(TypeSet::of(&[ValueType::Int, ValueType::Str]))
        );
    }

    #[test]
    fn singleton_possible_normalizes_to_exact() {
        let shape = Shape::possible(TypeSet::of(&[ValueType::Bool]));
        assert_eq!(shape, Shape::Exact(ValueType::Bool));
    }

    #[test]
    fn constant_implies_exact_type() {
        assert!(int(5).is_exact(ValueType::Int));
        assert_eq!(int(5).exact_type(), Some(ValueType::Int));
    }

    #[test]
    fn numeric_equality_crosses_int_float_and_bool() {
        assert!(ConstValue::int(1).py_eq(&ConstValue::Float(1.0)));
        assert!(ConstValue::Bool(true).py_eq(&ConstValue::int(1)));
        assert!(ConstValue::Bool(false).py_eq(&ConstValue::Float(0.0)));
        assert!(!ConstValue::int(1).py_eq(&ConstValue::str("1")));
    }

    #[test]
    fn large_int_float_comparison_is_exact() {
        // 2^53 + 1 is not representable in f64; naive conversion would
        // report equality with 2^53.
        let big = BigInt::from(1_i64 << 53) + 1;
        assert_eq!(
            cmp_int_float(&big, (1_i64 << 53) as f64),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn nan_compares_unordered() {
        assert_eq!(cmp_int_float(&BigInt::from(0), f64::NAN), None);
        assert!(!ConstValue::Float(f64::NAN).py_eq(&ConstValue::Float(f64::NAN)));
    }

    #[test]
    fn set_equality_ignores_order() {
        let a = ConstValue::Set(vec![ConstValue::int(1), ConstValue::int(2)]);
        let b = ConstValue::Set(vec![ConstValue::int(2), ConstValue::int(1)]);
        assert!(a.py_eq(&b));
    }

    #[test]
    fn tuple_of_immutables_is_deeply_immutable() {
        let t = ConstValue::Tuple(vec![ConstValue::int(1), ConstValue::str("a")]);
        assert!(t.is_deeply_immutable());
        let with_list = ConstValue::Tuple(vec![ConstValue::List(vec![])]);
        assert!(!with_list.is_deeply_immutable());
    }

    #[test]
    fn truthiness_matches_runtime_rules() {
        assert!(!ConstValue::int(0).truthiness());
        assert!(!ConstValue::str("").truthiness());
        assert!(!ConstValue::None.truthiness());
        assert!(!ConstValue::List(vec![]).truthiness());
        assert!(ConstValue::Float(0.5).truthiness());
        assert!(ConstValue::Tuple(vec![ConstValue::None]).truthiness());
    }
}
