//! # Interpreter
//!
//! Lowers a parsed statement onto the engine: DDL and DML dispatch
//! directly against the catalog and tables, SELECT statements become an
//! operator tree which is then drained.
//!
//! ## SELECT pipeline
//!
//! ```text
//! ReadFromTable(t1) ─┐
//! ReadFromTable(t2) ─┴─ Join ── Filter(WHERE) ── GroupBy ── Filter(HAVING)
//!                                          ── Sort(ORDER BY) ── Expressions(projection)
//! ```
//!
//! Stages appear only when the query asks for them. Sorting runs before
//! the projection, so ORDER BY can reference columns the projection drops.
//! `*` expands against the resolved input schema (first occurrence of each
//! column name wins) before expressions are compiled; there is no query-text
//! rewriting. Aggregate calls are collected from the projection and HAVING
//! clause, computed by the group-by operator, and re-resolved afterwards
//! by display name.

use bumpalo::Bump;
use eyre::Result;

use crate::database::Database;
use crate::error::Error;
use crate::types::{ColumnSchema, Row, Schema, Type, Value};

use super::aggregate::AggregateRegistry;
use super::ast::{display_name, ColumnDecl, Expr, SelectStmt, Statement};
use super::executor::{
    drain, Executor, ExecutorPtr, Expressions, Filter, GroupBy, GroupByAggregate, GroupByKey,
    Join, ReadFromRows, ReadFromTable, RowSet, Sort,
};
use super::expr::{build_expression, build_expressions, SchemaAccessor};
use super::parser::parse_statement;

/// Parses and executes one statement.
pub fn execute(db: &mut Database, sql: &str) -> Result<RowSet> {
    let arena = Bump::new();
    let statement = parse_statement(&arena, sql)?;

    match statement {
        Statement::CreateTable { name, columns } => {
            execute_create(db, name, columns)?;
            Ok(RowSet::empty())
        }
        Statement::DropTable { name } => {
            db.drop_table(name)?;
            Ok(RowSet::empty())
        }
        Statement::Insert { table, values } => {
            execute_insert(db, table, values)?;
            Ok(RowSet::empty())
        }
        Statement::Select(select) => execute_select(db, &arena, select),
    }
}

fn execute_create(db: &mut Database, name: &str, columns: &[ColumnDecl<'_>]) -> Result<()> {
    let mut defined = Vec::with_capacity(columns.len());
    for declaration in columns {
        if defined
            .iter()
            .any(|c: &ColumnSchema| c.name == declaration.name)
        {
            return Err(Error::schema_mismatch(format!(
                "duplicate column '{}' in table '{name}'",
                declaration.name
            )));
        }
        defined.push(ColumnSchema {
            name: declaration.name.to_string(),
            ty: declaration.ty,
            length: declaration.length,
        });
    }
    db.create_table(name, std::sync::Arc::new(Schema::new(defined)?))
}

/// Fits a constant-expression value to the declared column type. Integer
/// literals flow into uint64 columns when non-negative; string literals
/// flow into varchar columns (the marshal truncates to the declared
/// length).
fn coerce_value(value: Value, column: &ColumnSchema) -> Result<Value> {
    let coerced = match (value, column.ty) {
        (Value::Null, _) => Value::Null,
        (Value::Bool(v), Type::Boolean) => Value::Bool(v),
        (Value::Int64(v), Type::Int64) => Value::Int64(v),
        (Value::Int64(v), Type::Uint64) if v >= 0 => Value::Uint64(v as u64),
        (Value::Uint64(v), Type::Uint64) => Value::Uint64(v),
        (Value::String(s) | Value::Varchar(s), Type::String) => Value::String(s),
        (Value::String(s) | Value::Varchar(s), Type::Varchar) => Value::Varchar(s),
        (value, _) => {
            return Err(Error::schema_mismatch(format!(
                "value {value:?} does not fit column '{}' of type {}",
                column.name, column.ty
            )))
        }
    };
    Ok(coerced)
}

fn execute_insert(db: &mut Database, table: &str, values: &[&Expr<'_>]) -> Result<()> {
    let table = db.open_table(table)?;
    let schema = table.schema();

    if values.len() != schema.len() {
        return Err(Error::schema_mismatch(format!(
            "table '{}' has {} columns, {} values given",
            table.name(),
            schema.len(),
            values.len()
        )));
    }

    let expressions = build_expressions(values, None)?;
    let empty = Row::new();
    let mut row = Row::with_capacity(values.len());
    for (expression, column) in expressions.iter().zip(schema.iter()) {
        row.push(coerce_value(expression.evaluate(&empty)?, column)?);
    }

    table.insert_row(&row)?;
    Ok(())
}

/// Collects aggregate calls (deduplicated by display name) from an
/// expression tree. Arguments of an aggregate are not searched: nested
/// aggregates are not a thing this engine supports.
fn collect_aggregates<'a>(
    expr: &'a Expr<'a>,
    registry: &AggregateRegistry,
    found: &mut Vec<(String, &'a Expr<'a>)>,
) {
    match expr {
        Expr::Function { name, arguments } => {
            if registry.contains(name) {
                let column_name = display_name(expr);
                if !found.iter().any(|(existing, _)| *existing == column_name) {
                    found.push((column_name, expr));
                }
            } else {
                for argument in *arguments {
                    collect_aggregates(argument, registry, found);
                }
            }
        }
        Expr::Binary { lhs, rhs, .. } => {
            collect_aggregates(lhs, registry, found);
            collect_aggregates(rhs, registry, found);
        }
        Expr::Unary { operand, .. } => collect_aggregates(operand, registry, found),
        _ => {}
    }
}

fn execute_select(db: &mut Database, arena: &Bump, select: &SelectStmt<'_>) -> Result<RowSet> {
    if select.from.is_empty() {
        return execute_constant_select(select);
    }

    // FROM list folds left-to-right into equi-joins on shared names.
    let mut executor: ExecutorPtr = {
        let table = db.open_table(select.from[0])?;
        Box::new(ReadFromTable::new(&table))
    };
    for name in &select.from[1..] {
        let table = db.open_table(name)?;
        let right: ExecutorPtr = Box::new(ReadFromTable::new(&table));
        executor = Box::new(Join::new(executor, right)?);
    }

    // Expand `*` against the join's output schema, first occurrence wins
    // (schema names are already deduplicated by the join).
    let input_schema = executor.output_schema();
    let mut projection: Vec<&Expr<'_>> = Vec::with_capacity(select.projection.len());
    for expr in select.projection {
        if matches!(expr, Expr::Star) {
            for column in input_schema.iter() {
                let name: &str = arena.alloc_str(&column.name);
                projection.push(arena.alloc(Expr::Identifier(name)));
            }
        } else {
            projection.push(expr);
        }
    }

    let accessor = SchemaAccessor::new(executor.output_schema());
    if let Some(where_clause) = select.where_clause {
        let predicate = build_expression(where_clause, Some(&accessor))?;
        executor = Box::new(Filter::new(executor, predicate));
    }

    let mut aggregates: Vec<(String, &Expr<'_>)> = Vec::new();
    for expr in &projection {
        collect_aggregates(expr, db.aggregates(), &mut aggregates);
    }
    if let Some(having) = select.having {
        collect_aggregates(having, db.aggregates(), &mut aggregates);
    }

    if select.group_by.is_empty() {
        if !aggregates.is_empty() {
            return Err(Error::unsupported(format!(
                "aggregate '{}' requires GROUP BY",
                aggregates[0].0
            )));
        }
        if select.having.is_some() {
            return Err(Error::unsupported("HAVING requires GROUP BY"));
        }
    } else {
        let mut keys = Vec::with_capacity(select.group_by.len());
        for expr in select.group_by {
            keys.push(GroupByKey {
                name: display_name(expr),
                expression: build_expression(expr, Some(&accessor))?,
            });
        }

        let mut aggregate_columns = Vec::with_capacity(aggregates.len());
        for (column_name, expr) in &aggregates {
            let Expr::Function { name, arguments } = expr else {
                unreachable!("collect_aggregates only returns function calls");
            };
            aggregate_columns.push(GroupByAggregate {
                column_name: column_name.clone(),
                function: db.aggregates().instantiate_or_err(name)?,
                arguments: build_expressions(arguments, Some(&accessor))?,
            });
        }

        executor = Box::new(GroupBy::new(executor, keys, aggregate_columns)?);

        if let Some(having) = select.having {
            let group_accessor = SchemaAccessor::new(executor.output_schema());
            let predicate = build_expression(having, Some(&group_accessor))?;
            executor = Box::new(Filter::new(executor, predicate));
        }
    }

    // Sort runs over the pre-projection rows, so ORDER BY can reference
    // columns the projection drops.
    if !select.order_by.is_empty() {
        let sort_accessor = SchemaAccessor::new(executor.output_schema());
        let mut keys = Vec::with_capacity(select.order_by.len());
        for item in select.order_by {
            keys.push((build_expression(item.expr, Some(&sort_accessor))?, item.desc));
        }
        executor = Box::new(Sort::new(executor, keys));
    }

    let projection_accessor = SchemaAccessor::new(executor.output_schema());
    let expressions = build_expressions(&projection, Some(&projection_accessor))?;
    let names: Vec<String> = projection.iter().map(|expr| display_name(expr)).collect();
    executor = Box::new(Expressions::new(executor, expressions, names)?);

    drain(executor.as_mut())
}

fn execute_constant_select(select: &SelectStmt<'_>) -> Result<RowSet> {
    if select.projection.iter().any(|e| matches!(e, Expr::Star)) {
        return Err(Error::schema_mismatch("'*' needs a FROM clause"));
    }
    if select.where_clause.is_some()
        || !select.group_by.is_empty()
        || select.having.is_some()
        || !select.order_by.is_empty()
    {
        return Err(Error::unsupported(
            "WHERE, GROUP BY, HAVING and ORDER BY need a FROM clause",
        ));
    }

    let expressions = build_expressions(select.projection, None)?;
    let names: Vec<String> = select.projection.iter().map(|e| display_name(e)).collect();
    let input: ExecutorPtr = Box::new(ReadFromRows::new(Vec::new(), Schema::empty()));
    let mut executor = Expressions::new(input, expressions, names)?;
    drain(&mut executor)
}
