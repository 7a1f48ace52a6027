//! # Aggregate Functions
//!
//! Stateful aggregates with caller-owned state: the function reports its
//! state size, initializes a byte buffer, folds argument rows into it and
//! reads the final value back out. The group-by operator owns one buffer
//! per `(group, aggregate)` pair, so aggregate implementations stay
//! allocation-free.
//!
//! Only `int64` inputs are defined. State layouts are little-endian i64
//! words: `min`/`max`/`sum` use one, `avg` uses two (sum, count) and
//! divides with integer semantics.
//!
//! The registry is explicitly constructed and threaded through the
//! interpreter; no process-global function table.

use eyre::Result;
use hashbrown::HashMap;

use crate::error::Error;
use crate::types::{Row, Type, Value};

pub trait AggregateFunction: std::fmt::Debug {
    fn result_type(&self) -> Type;
    fn state_size(&self) -> usize;
    fn init(&self, state: &mut [u8]);
    fn add(&self, state: &mut [u8], arguments: &Row) -> Result<()>;
    fn result(&self, state: &[u8]) -> Result<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimpleKind {
    Min,
    Max,
    Sum,
    Avg,
}

#[derive(Debug)]
struct SimpleAggregate {
    kind: SimpleKind,
}

fn read_word(state: &[u8], index: usize) -> i64 {
    i64::from_le_bytes(state[index * 8..index * 8 + 8].try_into().unwrap())
}

fn write_word(state: &mut [u8], index: usize, value: i64) {
    state[index * 8..index * 8 + 8].copy_from_slice(&value.to_le_bytes());
}

impl AggregateFunction for SimpleAggregate {
    fn result_type(&self) -> Type {
        Type::Int64
    }

    fn state_size(&self) -> usize {
        match self.kind {
            SimpleKind::Avg => 16,
            _ => 8,
        }
    }

    fn init(&self, state: &mut [u8]) {
        match self.kind {
            SimpleKind::Max => write_word(state, 0, i64::MIN),
            SimpleKind::Min => write_word(state, 0, i64::MAX),
            SimpleKind::Sum => write_word(state, 0, 0),
            SimpleKind::Avg => {
                write_word(state, 0, 0);
                write_word(state, 1, 0);
            }
        }
    }

    fn add(&self, state: &mut [u8], arguments: &Row) -> Result<()> {
        let value = match arguments.first() {
            Some(Value::Int64(v)) => *v,
            other => {
                return Err(Error::type_error(format!(
                    "aggregate argument must be int64, found {other:?}"
                )))
            }
        };

        match self.kind {
            SimpleKind::Max => write_word(state, 0, read_word(state, 0).max(value)),
            SimpleKind::Min => write_word(state, 0, read_word(state, 0).min(value)),
            SimpleKind::Sum => {
                let sum = read_word(state, 0)
                    .checked_add(value)
                    .ok_or_else(|| Error::type_error("integer overflow in sum()"))?;
                write_word(state, 0, sum);
            }
            SimpleKind::Avg => {
                let sum = read_word(state, 0)
                    .checked_add(value)
                    .ok_or_else(|| Error::type_error("integer overflow in avg()"))?;
                write_word(state, 0, sum);
                write_word(state, 1, read_word(state, 1) + 1);
            }
        }
        Ok(())
    }

    fn result(&self, state: &[u8]) -> Result<Value> {
        match self.kind {
            SimpleKind::Avg => {
                let count = read_word(state, 1);
                if count == 0 {
                    return Err(Error::type_error("avg() over zero rows"));
                }
                Ok(Value::Int64(read_word(state, 0) / count))
            }
            _ => Ok(Value::Int64(read_word(state, 0))),
        }
    }
}

type AggregateFactory = fn() -> Box<dyn AggregateFunction>;

/// Name-to-factory map for aggregate functions.
pub struct AggregateRegistry {
    factories: HashMap<String, AggregateFactory>,
}

impl AggregateRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with min, max, sum and avg.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("min", || Box::new(SimpleAggregate { kind: SimpleKind::Min }));
        registry.register("max", || Box::new(SimpleAggregate { kind: SimpleKind::Max }));
        registry.register("sum", || Box::new(SimpleAggregate { kind: SimpleKind::Sum }));
        registry.register("avg", || Box::new(SimpleAggregate { kind: SimpleKind::Avg }));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: AggregateFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn instantiate(&self, name: &str) -> Option<Box<dyn AggregateFunction>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn instantiate_or_err(&self, name: &str) -> Result<Box<dyn AggregateFunction>> {
        self.instantiate(name)
            .ok_or_else(|| Error::unsupported(format!("unknown aggregate function '{name}'")))
    }
}

impl Default for AggregateRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
