use std::sync::Arc;

use crate::common::{RecordId, Result, StrataError};
use crate::tuple::{Schema, Tuple, Value};

use super::expression::{value_is_true, Expression};
use super::plan::JoinType;
use super::Executor;

/// Where the join loop stands between `next` calls.
enum JoinCursor {
    /// Pull the next outer row
    NeedLeft,
    /// Scanning the materialized right side from this position
    Scanning(usize),
    /// Outer row matched nothing; a LEFT join owes it a null-padded row
    EmitLeftNull,
    Done,
}

/// Nested-loop join over a materialized right input. Supports INNER and
/// LEFT joins; the right-side cursor persists across `next` calls so each
/// outer row yields all of its matches one at a time.
pub struct NestedLoopJoinExecutor {
    join_type: JoinType,
    predicate: Expression,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    right_tuples: Vec<Tuple>,
    left_tuple: Option<Tuple>,
    cursor: JoinCursor,
    matched: bool,
    schema: Arc<Schema>,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        join_type: JoinType,
        predicate: Expression,
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
    ) -> Result<Self> {
        if !matches!(join_type, JoinType::Inner | JoinType::Left) {
            return Err(StrataError::NotSupported(format!(
                "nested loop join type {:?}",
                join_type
            )));
        }
        let schema = Arc::new(Schema::join_of(
            &left.output_schema(),
            &right.output_schema(),
        ));
        Ok(Self {
            join_type,
            predicate,
            left,
            right,
            right_tuples: Vec::new(),
            left_tuple: None,
            cursor: JoinCursor::NeedLeft,
            matched: false,
            schema,
        })
    }

    fn joined(&self, left: &Tuple, right: &Tuple) -> Tuple {
        let mut values = left.values().to_vec();
        values.extend_from_slice(right.values());
        Tuple::new(Arc::clone(&self.schema), values)
    }

    fn left_with_nulls(&self, left: &Tuple) -> Tuple {
        let mut values = left.values().to_vec();
        let right_width = self.right.output_schema().column_count();
        values.extend(std::iter::repeat(Value::Null).take(right_width));
        Tuple::new(Arc::clone(&self.schema), values)
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;
        self.right_tuples.clear();
        while let Some((tuple, _)) = self.right.next()? {
            self.right_tuples.push(tuple);
        }
        self.left_tuple = None;
        self.cursor = JoinCursor::NeedLeft;
        self.matched = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        loop {
            match self.cursor {
                JoinCursor::NeedLeft => match self.left.next()? {
                    Some((tuple, _)) => {
                        self.left_tuple = Some(tuple);
                        self.matched = false;
                        self.cursor = JoinCursor::Scanning(0);
                    }
                    None => self.cursor = JoinCursor::Done,
                },
                JoinCursor::Scanning(start) => {
                    let left = self.left_tuple.as_ref().expect("outer row is loaded");
                    let mut emitted = None;
                    for i in start..self.right_tuples.len() {
                        let right = &self.right_tuples[i];
                        if value_is_true(&self.predicate.evaluate_join(left, right)) {
                            emitted = Some((self.joined(left, right), i + 1));
                            break;
                        }
                    }
                    match emitted {
                        Some((tuple, resume_at)) => {
                            self.matched = true;
                            self.cursor = JoinCursor::Scanning(resume_at);
                            return Ok(Some((tuple, RecordId::invalid())));
                        }
                        None => {
                            self.cursor = if !self.matched && self.join_type == JoinType::Left {
                                JoinCursor::EmitLeftNull
                            } else {
                                JoinCursor::NeedLeft
                            };
                        }
                    }
                }
                JoinCursor::EmitLeftNull => {
                    let left = self.left_tuple.as_ref().expect("outer row is loaded");
                    let tuple = self.left_with_nulls(left);
                    self.cursor = JoinCursor::NeedLeft;
                    return Ok(Some((tuple, RecordId::invalid())));
                }
                JoinCursor::Done => return Ok(None),
            }
        }
    }

    fn output_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }
}
