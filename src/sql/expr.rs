//! # Typed Expression Trees
//!
//! Expressions are built once per query from the AST against a
//! [`SchemaAccessor`] and then evaluated per row. Identifiers resolve to
//! column indices at build time, so evaluation is a straight walk with no
//! name lookups.
//!
//! Result typing follows the language's rules: arithmetic is `int64` over
//! `int64` operands, comparisons yield `boolean` through the single value
//! comparator, logic is `boolean` over `boolean`. Evaluation is strict
//! (both operands of `AND`/`OR` are evaluated, there is no short-circuit),
//! and division by zero, overflow and variant mismatches are fatal to the
//! statement.
//!
//! A subtlety inherited from GROUP BY: an expression whose *display name*
//! matches an input column resolves to that column. This is how `sum(a)`
//! in a projection or HAVING clause reads the aggregate column that the
//! group-by operator produced.

use std::cmp::Ordering;

use eyre::Result;

use crate::error::Error;
use crate::types::{compare_values, Row, SchemaRef, Type, Value};

use super::ast::{display_name, BinaryOp, Expr, UnaryOp};

/// Resolves identifiers against an operator's output schema.
pub struct SchemaAccessor {
    schema: SchemaRef,
}

impl SchemaAccessor {
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn column(&self, name: &str) -> Option<(usize, Type)> {
        self.schema
            .column_index(name)
            .map(|index| (index, self.schema.column(index).ty))
    }
}

/// A compiled scalar expression.
pub trait Expression: std::fmt::Debug {
    fn result_type(&self) -> Type;
    fn evaluate(&self, row: &Row) -> Result<Value>;
}

pub type ExpressionRef = Box<dyn Expression>;

#[derive(Debug)]
struct ColumnExpression {
    index: usize,
    ty: Type,
}

impl Expression for ColumnExpression {
    fn result_type(&self) -> Type {
        self.ty
    }

    fn evaluate(&self, row: &Row) -> Result<Value> {
        row.get(self.index).cloned().ok_or_else(|| {
            Error::type_error(format!(
                "row has {} values, expression reads column {}",
                row.len(),
                self.index
            ))
        })
    }
}

#[derive(Debug)]
struct NumberLiteral(i64);

impl Expression for NumberLiteral {
    fn result_type(&self) -> Type {
        Type::Int64
    }

    fn evaluate(&self, _row: &Row) -> Result<Value> {
        Ok(Value::Int64(self.0))
    }
}

#[derive(Debug)]
struct StringLiteral(String);

impl Expression for StringLiteral {
    fn result_type(&self) -> Type {
        Type::String
    }

    fn evaluate(&self, _row: &Row) -> Result<Value> {
        Ok(Value::String(self.0.clone()))
    }
}

#[derive(Debug)]
struct BoolLiteral(bool);

impl Expression for BoolLiteral {
    fn result_type(&self) -> Type {
        Type::Boolean
    }

    fn evaluate(&self, _row: &Row) -> Result<Value> {
        Ok(Value::Bool(self.0))
    }
}

/// NULL has no type of its own; it reports int64 affinity for schema
/// purposes and evaluates to [`Value::Null`].
#[derive(Debug)]
struct NullLiteral;

impl Expression for NullLiteral {
    fn result_type(&self) -> Type {
        Type::Int64
    }

    fn evaluate(&self, _row: &Row) -> Result<Value> {
        Ok(Value::Null)
    }
}

#[derive(Debug)]
struct BinaryExpression {
    op: BinaryOp,
    lhs: ExpressionRef,
    rhs: ExpressionRef,
}

fn int_operand(value: Value, op: BinaryOp) -> Result<i64> {
    match value {
        Value::Int64(v) => Ok(v),
        other => Err(Error::type_error(format!(
            "operator '{}' needs int64 operands, found {other:?}",
            op.symbol()
        ))),
    }
}

fn bool_operand(value: Value, op: &str) -> Result<bool> {
    match value {
        Value::Bool(v) => Ok(v),
        other => Err(Error::type_error(format!(
            "operator '{op}' needs boolean operands, found {other:?}"
        ))),
    }
}

impl Expression for BinaryExpression {
    fn result_type(&self) -> Type {
        match self.op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => Type::Int64,
            _ => Type::Boolean,
        }
    }

    fn evaluate(&self, row: &Row) -> Result<Value> {
        let lhs = self.lhs.evaluate(row)?;
        let rhs = self.rhs.evaluate(row)?;

        match self.op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                let a = int_operand(lhs, self.op)?;
                let b = int_operand(rhs, self.op)?;
                let result = match self.op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    BinaryOp::Div => {
                        if b == 0 {
                            return Err(Error::type_error("division by zero"));
                        }
                        a.checked_div(b)
                    }
                    _ => unreachable!(),
                };
                let value = result.ok_or_else(|| {
                    Error::type_error(format!(
                        "integer overflow evaluating {a} {} {b}",
                        self.op.symbol()
                    ))
                })?;
                Ok(Value::Int64(value))
            }
            BinaryOp::Eq => Ok(Value::Bool(compare_values(&lhs, &rhs) == Ordering::Equal)),
            BinaryOp::NotEq => Ok(Value::Bool(compare_values(&lhs, &rhs) != Ordering::Equal)),
            BinaryOp::Lt => Ok(Value::Bool(compare_values(&lhs, &rhs) == Ordering::Less)),
            BinaryOp::LtEq => Ok(Value::Bool(compare_values(&lhs, &rhs) != Ordering::Greater)),
            BinaryOp::Gt => Ok(Value::Bool(compare_values(&lhs, &rhs) == Ordering::Greater)),
            BinaryOp::GtEq => Ok(Value::Bool(compare_values(&lhs, &rhs) != Ordering::Less)),
            BinaryOp::And => {
                let a = bool_operand(lhs, "AND")?;
                let b = bool_operand(rhs, "AND")?;
                Ok(Value::Bool(a && b))
            }
            BinaryOp::Or => {
                let a = bool_operand(lhs, "OR")?;
                let b = bool_operand(rhs, "OR")?;
                Ok(Value::Bool(a || b))
            }
        }
    }
}

#[derive(Debug)]
struct UnaryExpression {
    op: UnaryOp,
    operand: ExpressionRef,
}

impl Expression for UnaryExpression {
    fn result_type(&self) -> Type {
        match self.op {
            UnaryOp::Not => Type::Boolean,
            UnaryOp::Neg => Type::Int64,
        }
    }

    fn evaluate(&self, row: &Row) -> Result<Value> {
        let value = self.operand.evaluate(row)?;
        match self.op {
            UnaryOp::Not => Ok(Value::Bool(!bool_operand(value, "NOT")?)),
            UnaryOp::Neg => match value {
                Value::Int64(v) => {
                    let negated = v
                        .checked_neg()
                        .ok_or_else(|| Error::type_error(format!("integer overflow negating {v}")))?;
                    Ok(Value::Int64(negated))
                }
                other => Err(Error::type_error(format!(
                    "unary '-' needs an int64 operand, found {other:?}"
                ))),
            },
        }
    }
}

/// Compiles one AST expression. `accessor` is `None` for constant contexts
/// (INSERT values, FROM-less SELECT).
pub fn build_expression(expr: &Expr<'_>, accessor: Option<&SchemaAccessor>) -> Result<ExpressionRef> {
    // Whole-expression resolution by display name first: after a GROUP BY
    // the aggregate columns are addressable only this way.
    if let Some(accessor) = accessor {
        if !matches!(expr, Expr::Star) {
            if let Some((index, ty)) = accessor.column(&display_name(expr)) {
                return Ok(Box::new(ColumnExpression { index, ty }));
            }
        }
    }

    match expr {
        Expr::Number(value) => Ok(Box::new(NumberLiteral(*value))),
        Expr::String(text) => Ok(Box::new(StringLiteral((*text).to_string()))),
        Expr::Bool(value) => Ok(Box::new(BoolLiteral(*value))),
        Expr::Null => Ok(Box::new(NullLiteral)),
        Expr::Identifier(name) => match accessor {
            Some(_) => Err(Error::schema_mismatch(format!("unknown column '{name}'"))),
            None => Err(Error::schema_mismatch(format!(
                "column '{name}' referenced in a constant context"
            ))),
        },
        Expr::Star => Err(Error::parse("'*' is only valid as a projection")),
        Expr::Function { name, .. } => Err(Error::schema_mismatch(format!(
            "unknown function or column '{}' ('{name}' is not available here)",
            display_name(expr)
        ))),
        Expr::Binary { op, lhs, rhs } => Ok(Box::new(BinaryExpression {
            op: *op,
            lhs: build_expression(lhs, accessor)?,
            rhs: build_expression(rhs, accessor)?,
        })),
        Expr::Unary { op, operand } => Ok(Box::new(UnaryExpression {
            op: *op,
            operand: build_expression(operand, accessor)?,
        })),
    }
}

pub fn build_expressions(
    exprs: &[&Expr<'_>],
    accessor: Option<&SchemaAccessor>,
) -> Result<Vec<ExpressionRef>> {
    exprs
        .iter()
        .map(|expr| build_expression(expr, accessor))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parser::parse_statement;
    use crate::sql::ast::Statement;
    use crate::types::{ColumnSchema, Schema};
    use bumpalo::Bump;
    use std::sync::Arc;

    fn eval_const(input: &str) -> Result<Value> {
        let arena = Bump::new();
        let sql = format!("SELECT {input}");
        let statement = parse_statement(&arena, &sql).unwrap();
        let Statement::Select(select) = statement else {
            panic!("expected select");
        };
        let expr = build_expression(select.projection[0], None)?;
        expr.evaluate(&Row::new())
    }

    #[test]
    fn arithmetic_with_precedence() {
        assert_eq!(eval_const("(3 + 4) * 2").unwrap(), Value::Int64(14));
        assert_eq!(eval_const("(3 + 4) * 2 > 13").unwrap(), Value::Bool(true));
        assert_eq!(eval_const("NOT (5 == 5)").unwrap(), Value::Bool(false));
        assert_eq!(eval_const("-(2 + 3)").unwrap(), Value::Int64(-5));
    }

    #[test]
    fn division_by_zero_is_fatal() {
        let err = eval_const("1 / 0").unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(crate::error::ErrorKind::Type)
        );
    }

    #[test]
    fn overflow_is_fatal() {
        let err = eval_const("9223372036854775807 + 1").unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(crate::error::ErrorKind::Type)
        );
    }

    #[test]
    fn type_mismatch_is_fatal() {
        let err = eval_const("1 AND 2").unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(crate::error::ErrorKind::Type)
        );
        let err = eval_const("\"a\" + 1").unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(crate::error::ErrorKind::Type)
        );
    }

    #[test]
    fn identifiers_resolve_to_columns_at_build_time() {
        let arena = Bump::new();
        let statement = parse_statement(&arena, "SELECT a + 1").unwrap();
        let Statement::Select(select) = statement else {
            panic!("expected select");
        };

        let schema = Arc::new(
            Schema::new(vec![ColumnSchema::new("a", Type::Int64)]).unwrap(),
        );
        let accessor = SchemaAccessor::new(schema);
        let expr = build_expression(select.projection[0], Some(&accessor)).unwrap();

        assert_eq!(expr.result_type(), Type::Int64);
        assert_eq!(
            expr.evaluate(&vec![Value::Int64(41)]).unwrap(),
            Value::Int64(42)
        );
    }

    #[test]
    fn display_name_resolution_reaches_aggregate_columns() {
        let arena = Bump::new();
        let statement = parse_statement(&arena, "SELECT sum(a) > 10").unwrap();
        let Statement::Select(select) = statement else {
            panic!("expected select");
        };

        // A schema as the group-by operator would produce it.
        let schema = Arc::new(
            Schema::new(vec![ColumnSchema::new("sum(a)", Type::Int64)]).unwrap(),
        );
        let accessor = SchemaAccessor::new(schema);
        let expr = build_expression(select.projection[0], Some(&accessor)).unwrap();

        assert_eq!(
            expr.evaluate(&vec![Value::Int64(11)]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn unknown_column_is_a_schema_mismatch() {
        let arena = Bump::new();
        let statement = parse_statement(&arena, "SELECT missing").unwrap();
        let Statement::Select(select) = statement else {
            panic!("expected select");
        };

        let schema = Arc::new(Schema::new(vec![]).unwrap());
        let accessor = SchemaAccessor::new(schema);
        let err = build_expression(select.projection[0], Some(&accessor)).unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(crate::error::ErrorKind::SchemaMismatch)
        );
    }
}
