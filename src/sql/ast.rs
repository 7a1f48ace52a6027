//! # SQL Abstract Syntax Tree
//!
//! AST nodes are arena-allocated with bumpalo: every child is a `&'a`
//! reference into the arena and every name or literal borrows from the
//! original input, so parsing allocates nothing it has to free piecemeal;
//! the arena drops as one block once the statement has been lowered to an
//! operator tree.
//!
//! [`display_name`] renders an expression the way the engine names result
//! columns: identifiers by themselves, calls as `sum(a)`, operators
//! spelled out. These names double as the resolution key for aggregate
//! columns after a GROUP BY.

use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'a> {
    Number(i64),
    String(&'a str),
    Bool(bool),
    Null,
    Identifier(&'a str),
    /// `*` in a projection; expanded by the interpreter before lowering.
    Star,
    Function {
        name: &'a str,
        arguments: &'a [&'a Expr<'a>],
    },
    Binary {
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    },
    Unary {
        op: UnaryOp,
        operand: &'a Expr<'a>,
    },
}

/// The display form of an expression, used as its output column name.
pub fn display_name(expr: &Expr<'_>) -> String {
    match expr {
        Expr::Number(value) => value.to_string(),
        Expr::String(text) => (*text).to_string(),
        Expr::Bool(value) => value.to_string(),
        Expr::Null => "null".to_string(),
        Expr::Identifier(name) => (*name).to_string(),
        Expr::Star => "*".to_string(),
        Expr::Function { name, arguments } => {
            let rendered: Vec<String> = arguments.iter().map(|a| display_name(a)).collect();
            format!("{name}({})", rendered.join(", "))
        }
        Expr::Binary { op, lhs, rhs } => {
            format!("{} {} {}", display_name(lhs), op.symbol(), display_name(rhs))
        }
        Expr::Unary { op, operand } => match op {
            UnaryOp::Not => format!("NOT {}", display_name(operand)),
            UnaryOp::Neg => format!("-{}", display_name(operand)),
        },
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDecl<'a> {
    pub name: &'a str,
    pub ty: Type,
    pub length: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct OrderByItem<'a> {
    pub expr: &'a Expr<'a>,
    pub desc: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectStmt<'a> {
    pub projection: &'a [&'a Expr<'a>],
    pub from: &'a [&'a str],
    pub where_clause: Option<&'a Expr<'a>>,
    pub group_by: &'a [&'a Expr<'a>],
    pub having: Option<&'a Expr<'a>>,
    pub order_by: &'a [OrderByItem<'a>],
}

#[derive(Debug, Clone, Copy)]
pub enum Statement<'a> {
    CreateTable {
        name: &'a str,
        columns: &'a [ColumnDecl<'a>],
    },
    DropTable {
        name: &'a str,
    },
    Insert {
        table: &'a str,
        values: &'a [&'a Expr<'a>],
    },
    Select(&'a SelectStmt<'a>),
}
