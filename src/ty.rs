//! This module contains the basic definition of the LSL types
//! and the coercion/operator tables the semantic analysis consults.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// The closed set of LSL types. `Void` is symbolic and only occurs as the
/// return type of functions; it is never parseable from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LslType {
    /// LSL type `void` (symbolic, function returns only)
    Void,
    /// LSL type `rotation` (quaternion of four floats)
    Rotation,
    /// LSL type `vector` (three floats)
    Vector,
    /// LSL type `list` (heterogeneous sequence, never nested)
    List,
    /// LSL type `float`
    Float,
    /// LSL type `string`
    String,
    /// LSL type `integer`
    Integer,
    /// LSL type `key`
    Key,
}

impl LslType {
    /// Parses an LSL type name, case-insensitively. `quaternion` is an
    /// alias of `rotation`. `void` is not recognized.
    pub fn from_type_name(name: &str) -> Option<LslType> {
        use self::LslType::*;
        match name.to_lowercase().as_str() {
            "integer" => Some(Integer),
            "float" => Some(Float),
            "string" => Some(String),
            "key" => Some(Key),
            "vector" => Some(Vector),
            "rotation" | "quaternion" => Some(Rotation),
            "list" => Some(List),
            _ => None,
        }
    }

    /// The lowercase LSL source name of the type. `Void` has no source name.
    pub fn type_name(self) -> &'static str {
        use self::LslType::*;
        match self {
            Void => "void",
            Rotation => "rotation",
            Vector => "vector",
            List => "list",
            Float => "float",
            String => "string",
            Integer => "integer",
            Key => "key",
        }
    }

    pub fn is_void(self) -> bool {
        self == LslType::Void
    }

    /// Types a list element may have. Lists never nest.
    pub fn is_valid_list_content(self) -> bool {
        use self::LslType::*;
        match self {
            Integer | Float | String | Key | Vector | Rotation => true,
            List | Void => false,
        }
    }
}

impl Display for LslType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.type_name())
    }
}

/// Whether a value of `from` silently coerces to `to` on assignment or
/// parameter binding. LSL permits exactly `integer -> float` and both
/// directions between `string` and `key`; everything else is identity.
pub fn implicitly_convertible(from: LslType, to: LslType) -> bool {
    use self::LslType::*;
    if from == to {
        return true;
    }
    match (from, to) {
        (Integer, Float) => true,
        (String, Key) | (Key, String) => true,
        _ => false,
    }
}

/// Whether `(to)expr` is a legal cast for an `expr` of type `from`.
pub fn explicitly_convertible(from: LslType, to: LslType) -> bool {
    use self::LslType::*;
    if implicitly_convertible(from, to) {
        return true;
    }
    match (from, to) {
        // truncates toward zero
        (Float, Integer) => true,
        // parsed at runtime
        (String, Integer) | (String, Float) | (String, Vector) | (String, Rotation) => true,
        (Integer, String) => true,
        (Vector, String) | (Rotation, String) => true,
        // CSV-like serialization
        (List, String) => true,
        _ => false,
    }
}

/// The binary operators of LSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        use self::BinOp::*;
        let op = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            Shl => "<<",
            Shr => ">>",
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            And => "&&",
            Or => "||",
        };
        write!(f, "{}", op)
    }
}

/// The prefix operators of LSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefixOp {
    Neg,
    Not,
    BitNot,
    Increment,
    Decrement,
}

impl PrefixOp {
    /// `++x`/`--x` write through to their operand.
    pub fn is_modifying(self) -> bool {
        match self {
            PrefixOp::Increment | PrefixOp::Decrement => true,
            _ => false,
        }
    }
}

impl Display for PrefixOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        use self::PrefixOp::*;
        let op = match self {
            Neg => "-",
            Not => "!",
            BitNot => "~",
            Increment => "++",
            Decrement => "--",
        };
        write!(f, "{}", op)
    }
}

/// The postfix operators of LSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

impl Display for PostfixOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let op = match self {
            PostfixOp::Increment => "++",
            PostfixOp::Decrement => "--",
        };
        write!(f, "{}", op)
    }
}

/// A named component of a `vector` or `rotation` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TupleComponent {
    X,
    Y,
    Z,
    S,
}

impl TupleComponent {
    pub fn from_name(name: &str) -> Option<TupleComponent> {
        match name {
            "x" => Some(TupleComponent::X),
            "y" => Some(TupleComponent::Y),
            "z" => Some(TupleComponent::Z),
            "s" => Some(TupleComponent::S),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TupleComponent::X => "x",
            TupleComponent::Y => "y",
            TupleComponent::Z => "z",
            TupleComponent::S => "s",
        }
    }

    /// `.s` only exists on rotations.
    pub fn valid_on(self, ty: LslType) -> bool {
        match ty {
            LslType::Vector => self != TupleComponent::S,
            LslType::Rotation => true,
            _ => false,
        }
    }
}

impl Display for TupleComponent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

/// Result type of `lhs op rhs`, or `None` when the operation is invalid.
///
/// The table mirrors the Linden compiler: mixed integer/float arithmetic
/// widens to float, `v * v` is the dot product (float), `v % v` the cross
/// product (vector), `l == l` compares lengths, and `string`/`key` compare
/// against each other directly.
pub fn binary_result(op: BinOp, lhs: LslType, rhs: LslType) -> Option<LslType> {
    use self::BinOp::*;
    use self::LslType::*;

    let numeric = |l: LslType, r: LslType| -> Option<LslType> {
        match (l, r) {
            (Integer, Integer) => Some(Integer),
            (Float, Float) | (Integer, Float) | (Float, Integer) => Some(Float),
            _ => None,
        }
    };

    match op {
        Add => match (lhs, rhs) {
            (String, String) => Some(String),
            (Vector, Vector) => Some(Vector),
            (Rotation, Rotation) => Some(Rotation),
            (List, _) if rhs != Void => Some(List),
            (_, List) if lhs != Void => Some(List),
            _ => numeric(lhs, rhs),
        },
        Sub => match (lhs, rhs) {
            (Vector, Vector) => Some(Vector),
            (Rotation, Rotation) => Some(Rotation),
            _ => numeric(lhs, rhs),
        },
        Mul => match (lhs, rhs) {
            (Vector, Float) | (Float, Vector) | (Vector, Integer) | (Integer, Vector) => Some(Vector),
            (Vector, Vector) => Some(Float),
            (Vector, Rotation) => Some(Vector),
            (Rotation, Rotation) => Some(Rotation),
            _ => numeric(lhs, rhs),
        },
        Div => match (lhs, rhs) {
            (Vector, Float) | (Vector, Integer) => Some(Vector),
            (Vector, Rotation) => Some(Vector),
            (Rotation, Rotation) => Some(Rotation),
            _ => numeric(lhs, rhs),
        },
        Mod => match (lhs, rhs) {
            (Integer, Integer) => Some(Integer),
            (Vector, Vector) => Some(Vector),
            _ => None,
        },
        BitAnd | BitOr | BitXor | Shl | Shr => match (lhs, rhs) {
            (Integer, Integer) => Some(Integer),
            _ => None,
        },
        Eq | NotEq => match (lhs, rhs) {
            _ if lhs == rhs && lhs != Void => Some(Integer),
            (String, Key) | (Key, String) => Some(Integer),
            _ => numeric(lhs, rhs).map(|_| Integer),
        },
        Lt | Le | Gt | Ge => numeric(lhs, rhs).map(|_| Integer),
        And | Or => match (lhs, rhs) {
            (Integer, Integer) => Some(Integer),
            _ => None,
        },
    }
}

/// Result type of a prefix operation, or `None` when invalid.
pub fn prefix_result(op: PrefixOp, operand: LslType) -> Option<LslType> {
    use self::LslType::*;
    use self::PrefixOp::*;
    match op {
        Neg => match operand {
            Integer | Float | Vector | Rotation => Some(operand),
            _ => None,
        },
        Not | BitNot => match operand {
            Integer => Some(Integer),
            _ => None,
        },
        Increment | Decrement => match operand {
            Integer | Float => Some(operand),
            _ => None,
        },
    }
}

/// Result type of a postfix operation, or `None` when invalid.
pub fn postfix_result(op: PostfixOp, operand: LslType) -> Option<LslType> {
    let _ = op;
    match operand {
        LslType::Integer | LslType::Float => Some(operand),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::LslType::*;
    use super::*;

    #[test]
    fn type_names_round_trip() {
        for &ty in &[Rotation, Vector, List, Float, String, Integer, Key] {
            assert_eq!(LslType::from_type_name(ty.type_name()), Some(ty));
        }
        assert_eq!(LslType::from_type_name("Quaternion"), Some(Rotation));
        assert_eq!(LslType::from_type_name("INTEGER"), Some(Integer));
        assert_eq!(LslType::from_type_name("void"), None);
        assert_eq!(LslType::from_type_name(""), None);
    }

    #[test]
    fn implicit_conversions_are_strict() {
        assert!(implicitly_convertible(Integer, Float));
        assert!(!implicitly_convertible(Float, Integer));
        assert!(implicitly_convertible(String, Key));
        assert!(implicitly_convertible(Key, String));
        assert!(!implicitly_convertible(Integer, String));
        assert!(!implicitly_convertible(Vector, List));
    }

    #[test]
    fn explicit_conversions() {
        assert!(explicitly_convertible(Float, Integer));
        assert!(explicitly_convertible(String, Vector));
        assert!(explicitly_convertible(List, String));
        assert!(!explicitly_convertible(Integer, List));
        assert!(!explicitly_convertible(Float, String));
        assert!(!explicitly_convertible(List, Integer));
        assert!(!explicitly_convertible(Key, Integer));
        assert!(!explicitly_convertible(Vector, Rotation));
    }

    #[test]
    fn additive_matrix() {
        assert_eq!(binary_result(BinOp::Add, Integer, Float), Some(Float));
        assert_eq!(binary_result(BinOp::Add, String, String), Some(String));
        assert_eq!(binary_result(BinOp::Add, List, Key), Some(List));
        assert_eq!(binary_result(BinOp::Add, Key, List), Some(List));
        assert_eq!(binary_result(BinOp::Add, String, Integer), None);
        assert_eq!(binary_result(BinOp::Sub, Vector, Vector), Some(Vector));
        assert_eq!(binary_result(BinOp::Sub, String, String), None);
    }

    #[test]
    fn multiplicative_matrix() {
        assert_eq!(binary_result(BinOp::Mul, Vector, Vector), Some(Float));
        assert_eq!(binary_result(BinOp::Mul, Vector, Rotation), Some(Vector));
        assert_eq!(binary_result(BinOp::Mul, Rotation, Vector), None);
        assert_eq!(binary_result(BinOp::Mod, Vector, Vector), Some(Vector));
        assert_eq!(binary_result(BinOp::Mod, Float, Float), None);
        assert_eq!(binary_result(BinOp::Div, Vector, Rotation), Some(Vector));
        assert_eq!(binary_result(BinOp::Div, Vector, Vector), None);
    }

    #[test]
    fn equality_and_logic() {
        assert_eq!(binary_result(BinOp::Eq, Key, String), Some(Integer));
        assert_eq!(binary_result(BinOp::Eq, String, Key), Some(Integer));
        assert_eq!(binary_result(BinOp::Eq, List, List), Some(Integer));
        assert_eq!(binary_result(BinOp::Eq, Integer, String), None);
        assert_eq!(binary_result(BinOp::Lt, Integer, Float), Some(Integer));
        assert_eq!(binary_result(BinOp::Lt, String, String), None);
        assert_eq!(binary_result(BinOp::And, Integer, Integer), Some(Integer));
        assert_eq!(binary_result(BinOp::And, Integer, Float), None);
    }

    #[test]
    fn prefix_and_postfix() {
        assert_eq!(prefix_result(PrefixOp::Neg, Vector), Some(Vector));
        assert_eq!(prefix_result(PrefixOp::Neg, String), None);
        assert_eq!(prefix_result(PrefixOp::Not, Integer), Some(Integer));
        assert_eq!(prefix_result(PrefixOp::Not, Float), None);
        assert_eq!(prefix_result(PrefixOp::Increment, Float), Some(Float));
        assert_eq!(postfix_result(PostfixOp::Decrement, Integer), Some(Integer));
        assert_eq!(postfix_result(PostfixOp::Increment, Key), None);
    }

    #[test]
    fn tuple_components() {
        assert!(TupleComponent::from_name("x").unwrap().valid_on(Vector));
        assert!(!TupleComponent::from_name("s").unwrap().valid_on(Vector));
        assert!(TupleComponent::from_name("s").unwrap().valid_on(Rotation));
        assert_eq!(TupleComponent::from_name("w"), None);
    }
}
