//! Syntax tree of a scoring body

use crate::value::Value;

/// A statement with the line it starts on
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub line: usize,
    pub kind: StmtKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Assign { target: String, value: Expr },
    Return(Option<Expr>),
    If {
        /// `if` and `elif` arms in source order
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    Pass,
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Subscript {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        function: Builtin,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Chained comparison: `a < b <= c`
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        orelse: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// Functions callable from a scoring body
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Min,
    Max,
    Abs,
    Float,
    Int,
    Round,
    Sum,
    Bool,
    Str,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Self::Len,
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "float" => Self::Float,
            "int" => Self::Int,
            "round" => Self::Round,
            "sum" => Self::Sum,
            "bool" => Self::Bool,
            "str" => Self::Str,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Float => "float",
            Self::Int => "int",
            Self::Round => "round",
            Self::Sum => "sum",
            Self::Bool => "bool",
            Self::Str => "str",
        }
    }
}

/// Methods callable on mapping and string values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Keys,
    Values,
    Lower,
    Upper,
    Strip,
    StartsWith,
    EndsWith,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "get" => Self::Get,
            "keys" => Self::Keys,
            "values" => Self::Values,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "strip" => Self::Strip,
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Keys => "keys",
            Self::Values => "values",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Strip => "strip",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
        }
    }
}
