//! # Volcano Executor
//!
//! Pull-based operators: each exposes `next()` returning one row or `None`
//! at end-of-stream, plus the schema of the rows it yields. A query is a
//! tree of operators; the root is drained by the interpreter.
//!
//! Streaming operators (`ReadFromRows`, `ReadFromTable`, `Expressions`,
//! `Filter`) hold no buffered rows. Pipeline breakers (`Sort`, `Join`,
//! `GroupBy`) drain their children entirely before yielding; they do so
//! lazily on the first `next()` call, so building an operator tree has no
//! side effects.
//!
//! Two deliberate edge-case behaviors:
//!
//! - `ReadFromRows` built with no input rows yields exactly one *empty*
//!   row before end-of-stream. A FROM-less `SELECT 1 + 2` projects its
//!   constants over that row and still terminates under [`drain`].
//! - `ReadFromTable` skips tombstoned slots entirely; every row an
//!   operator yields matches its output schema.

use std::cmp::Ordering;
use std::sync::Arc;

use eyre::Result;
use hashbrown::HashMap;

use crate::error::Error;
use crate::table::{Table, TableScan};
use crate::types::{compare_values, ColumnSchema, Row, Schema, SchemaRef, Value};

use super::aggregate::AggregateFunction;
use super::expr::ExpressionRef;

pub trait Executor {
    fn next(&mut self) -> Result<Option<Row>>;
    fn output_schema(&self) -> SchemaRef;
}

pub type ExecutorPtr = Box<dyn Executor>;

/// A fully materialized query result.
#[derive(Debug, Clone)]
pub struct RowSet {
    pub schema: SchemaRef,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn empty() -> Self {
        Self {
            schema: Schema::empty(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Pulls an operator tree dry.
pub fn drain(executor: &mut dyn Executor) -> Result<RowSet> {
    let mut rows = Vec::new();
    while let Some(row) = executor.next()? {
        rows.push(row);
    }
    Ok(RowSet {
        schema: executor.output_schema(),
        rows,
    })
}

/// Replays a fixed vector of rows. With no input rows it yields one empty
/// row, which is what lets constant projections run without a FROM clause.
pub struct ReadFromRows {
    rows: Vec<Row>,
    schema: SchemaRef,
    position: usize,
    yielded_empty: bool,
}

impl ReadFromRows {
    pub fn new(rows: Vec<Row>, schema: SchemaRef) -> Self {
        Self {
            rows,
            schema,
            position: 0,
            yielded_empty: false,
        }
    }
}

impl Executor for ReadFromRows {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.position < self.rows.len() {
            let row = self.rows[self.position].clone();
            self.position += 1;
            return Ok(Some(row));
        }
        if self.rows.is_empty() && !self.yielded_empty {
            self.yielded_empty = true;
            return Ok(Some(Row::new()));
        }
        Ok(None)
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }
}

/// Scans a table page by page, slot by slot.
pub struct ReadFromTable {
    scan: TableScan,
    schema: SchemaRef,
}

impl ReadFromTable {
    pub fn new(table: &Arc<Table>) -> Self {
        Self {
            scan: table.scan(),
            schema: Arc::clone(table.schema()),
        }
    }
}

impl Executor for ReadFromTable {
    fn next(&mut self) -> Result<Option<Row>> {
        Ok(self.scan.next()?.map(|(_, row)| row))
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }
}

/// Projects each input row through a list of expressions.
pub struct Expressions {
    input: ExecutorPtr,
    expressions: Vec<ExpressionRef>,
    schema: SchemaRef,
}

impl Expressions {
    pub fn new(
        input: ExecutorPtr,
        expressions: Vec<ExpressionRef>,
        names: Vec<String>,
    ) -> Result<Self> {
        debug_assert_eq!(expressions.len(), names.len());
        let columns = names
            .into_iter()
            .zip(expressions.iter())
            .map(|(name, expression)| ColumnSchema {
                name,
                ty: expression.result_type(),
                length: 0,
            })
            .collect();
        let schema = Arc::new(Schema::new(columns)?);
        Ok(Self {
            input,
            expressions,
            schema,
        })
    }
}

impl Executor for Expressions {
    fn next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.input.next()? else {
            return Ok(None);
        };
        let mut result = Row::with_capacity(self.expressions.len());
        for expression in &self.expressions {
            result.push(expression.evaluate(&row)?);
        }
        Ok(Some(result))
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }
}

/// Yields only the rows for which the predicate evaluates to `true`.
pub struct Filter {
    input: ExecutorPtr,
    predicate: ExpressionRef,
}

impl Filter {
    pub fn new(input: ExecutorPtr, predicate: ExpressionRef) -> Self {
        Self { input, predicate }
    }
}

impl Executor for Filter {
    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            let Some(row) = self.input.next()? else {
                return Ok(None);
            };
            match self.predicate.evaluate(&row)? {
                Value::Bool(true) => return Ok(Some(row)),
                Value::Bool(false) => continue,
                other => {
                    return Err(Error::type_error(format!(
                        "filter predicate must be boolean, found {other:?}"
                    )))
                }
            }
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.input.output_schema()
    }
}

/// Materializing sort: drains its child on the first `next()` and emits
/// rows ordered by the sort keys, each key optionally descending.
pub struct Sort {
    input: ExecutorPtr,
    keys: Vec<(ExpressionRef, bool)>,
    sorted: Option<Vec<Row>>,
    position: usize,
}

impl Sort {
    pub fn new(input: ExecutorPtr, keys: Vec<(ExpressionRef, bool)>) -> Self {
        Self {
            input,
            keys,
            sorted: None,
            position: 0,
        }
    }

    fn materialize(&mut self) -> Result<()> {
        let input_rows = drain(self.input.as_mut())?.rows;

        let mut decorated: Vec<(Vec<Value>, Row)> = Vec::with_capacity(input_rows.len());
        for row in input_rows {
            let mut key_values = Vec::with_capacity(self.keys.len());
            for (expression, _) in &self.keys {
                key_values.push(expression.evaluate(&row)?);
            }
            decorated.push((key_values, row));
        }

        let descending: Vec<bool> = self.keys.iter().map(|(_, desc)| *desc).collect();
        decorated.sort_by(|(a, _), (b, _)| {
            for (index, desc) in descending.iter().enumerate() {
                let mut ord = compare_values(&a[index], &b[index]);
                if *desc {
                    ord = ord.reverse();
                }
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        self.sorted = Some(decorated.into_iter().map(|(_, row)| row).collect());
        Ok(())
    }
}

impl Executor for Sort {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.sorted.is_none() {
            self.materialize()?;
        }
        let rows = self.sorted.as_ref().unwrap();
        if self.position < rows.len() {
            let row = rows[self.position].clone();
            self.position += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.input.output_schema()
    }
}

/// Equi-join on every pair of same-named columns; with no shared names the
/// result degenerates to the Cartesian product. Both children materialize
/// before the first output row.
pub struct Join {
    left: ExecutorPtr,
    right: ExecutorPtr,
    schema: SchemaRef,
    /// (left column, right column) pairs joined on.
    common: Vec<(usize, usize)>,
    /// Right columns that survive into the output.
    right_kept: Vec<usize>,
    joined: Option<Vec<Row>>,
    position: usize,
}

impl Join {
    pub fn new(left: ExecutorPtr, right: ExecutorPtr) -> Result<Self> {
        let left_schema = left.output_schema();
        let right_schema = right.output_schema();

        let mut common = Vec::new();
        for (left_index, column) in left_schema.iter().enumerate() {
            if let Some(right_index) = right_schema.column_index(&column.name) {
                common.push((left_index, right_index));
            }
        }

        let joined_right: Vec<usize> = common.iter().map(|(_, r)| *r).collect();
        let right_kept: Vec<usize> = (0..right_schema.len())
            .filter(|index| !joined_right.contains(index))
            .collect();

        let mut columns: Vec<ColumnSchema> = left_schema.columns().to_vec();
        for &index in &right_kept {
            columns.push(right_schema.column(index).clone());
        }

        Ok(Self {
            left,
            right,
            schema: Arc::new(Schema::new(columns)?),
            common,
            right_kept,
            joined: None,
            position: 0,
        })
    }

    fn materialize(&mut self) -> Result<()> {
        let left_rows = drain(self.left.as_mut())?.rows;
        let right_rows = drain(self.right.as_mut())?.rows;
        let mut output = Vec::new();

        if self.common.is_empty() {
            for left_row in &left_rows {
                for right_row in &right_rows {
                    output.push(self.combine(left_row, right_row));
                }
            }
        } else {
            let mut probe: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
            for (index, right_row) in right_rows.iter().enumerate() {
                let key: Vec<Value> = self
                    .common
                    .iter()
                    .map(|(_, right_column)| right_row[*right_column].clone())
                    .collect();
                probe.entry(key).or_default().push(index);
            }

            for left_row in &left_rows {
                let key: Vec<Value> = self
                    .common
                    .iter()
                    .map(|(left_column, _)| left_row[*left_column].clone())
                    .collect();
                if let Some(matches) = probe.get(&key) {
                    for &index in matches {
                        output.push(self.combine(left_row, &right_rows[index]));
                    }
                }
            }
        }

        self.joined = Some(output);
        Ok(())
    }

    fn combine(&self, left_row: &Row, right_row: &Row) -> Row {
        let mut row = left_row.clone();
        for &index in &self.right_kept {
            row.push(right_row[index].clone());
        }
        row
    }
}

impl Executor for Join {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.joined.is_none() {
            self.materialize()?;
        }
        let rows = self.joined.as_ref().unwrap();
        if self.position < rows.len() {
            let row = rows[self.position].clone();
            self.position += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }
}

/// One grouping key: its output column name and the expression producing
/// it.
pub struct GroupByKey {
    pub name: String,
    pub expression: ExpressionRef,
}

/// One aggregate column of a GROUP BY.
pub struct GroupByAggregate {
    pub column_name: String,
    pub function: Box<dyn AggregateFunction>,
    pub arguments: Vec<ExpressionRef>,
}

/// Hash aggregation: one state buffer per `(group, aggregate)`, groups
/// emitted in first-seen order.
pub struct GroupBy {
    input: ExecutorPtr,
    keys: Vec<GroupByKey>,
    aggregates: Vec<GroupByAggregate>,
    schema: SchemaRef,
    groups: Option<Vec<Row>>,
    position: usize,
}

impl GroupBy {
    pub fn new(
        input: ExecutorPtr,
        keys: Vec<GroupByKey>,
        aggregates: Vec<GroupByAggregate>,
    ) -> Result<Self> {
        let mut columns = Vec::with_capacity(keys.len() + aggregates.len());
        for key in &keys {
            columns.push(ColumnSchema {
                name: key.name.clone(),
                ty: key.expression.result_type(),
                length: 0,
            });
        }
        for aggregate in &aggregates {
            columns.push(ColumnSchema {
                name: aggregate.column_name.clone(),
                ty: aggregate.function.result_type(),
                length: 0,
            });
        }

        Ok(Self {
            input,
            keys,
            aggregates,
            schema: Arc::new(Schema::new(columns)?),
            groups: None,
            position: 0,
        })
    }

    fn materialize(&mut self) -> Result<()> {
        let mut group_index: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut states: Vec<(Vec<Value>, Vec<Vec<u8>>)> = Vec::new();

        while let Some(row) = self.input.next()? {
            let mut key = Vec::with_capacity(self.keys.len());
            for group_key in &self.keys {
                key.push(group_key.expression.evaluate(&row)?);
            }

            let index = match group_index.get(&key) {
                Some(&index) => index,
                None => {
                    let mut fresh = Vec::with_capacity(self.aggregates.len());
                    for aggregate in &self.aggregates {
                        let mut state = vec![0u8; aggregate.function.state_size()];
                        aggregate.function.init(&mut state);
                        fresh.push(state);
                    }
                    let index = states.len();
                    group_index.insert(key.clone(), index);
                    states.push((key.clone(), fresh));
                    index
                }
            };

            for (aggregate, state) in self.aggregates.iter().zip(states[index].1.iter_mut()) {
                let mut arguments = Row::with_capacity(aggregate.arguments.len());
                for argument in &aggregate.arguments {
                    arguments.push(argument.evaluate(&row)?);
                }
                aggregate.function.add(state, &arguments)?;
            }
        }

        let mut output = Vec::with_capacity(states.len());
        for (key, group_states) in states {
            let mut row = key;
            for (aggregate, state) in self.aggregates.iter().zip(group_states.iter()) {
                row.push(aggregate.function.result(state)?);
            }
            output.push(row);
        }

        self.groups = Some(output);
        Ok(())
    }
}

impl Executor for GroupBy {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.groups.is_none() {
            self.materialize()?;
        }
        let rows = self.groups.as_ref().unwrap();
        if self.position < rows.len() {
            let row = rows[self.position].clone();
            self.position += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }
}
