//! Operand stack

use crate::core::{InstructionErrorCode, ObjectHandle, Value};

type Result<T> = std::result::Result<T, InstructionErrorCode>;

/// Per-frame operand stack; underflow and kind mismatches surface as `Fatal`
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DataStack {
    values: Vec<Value>,
}

impl DataStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    // ===== basic operations =====

    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.values
            .pop()
            .ok_or_else(|| fatal!("operand stack underflow"))
    }

    pub fn peek(&self) -> Result<&Value> {
        self.peek_at(0)
    }

    /// `depth` 0 is the top
    pub fn peek_at(&self, depth: usize) -> Result<&Value> {
        self.values
            .len()
            .checked_sub(depth + 1)
            .map(|i| &self.values[i])
            .ok_or_else(|| fatal!("operand stack has no value at depth {}", depth))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Bottom to top
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    // ===== typed pops =====

    pub fn pop_int(&mut self) -> Result<i32> {
        match self.pop()? {
            Value::Int(v) => Ok(v),
            other => Err(fatal!("expected int32 on stack, found {}", other.kind())),
        }
    }

    /// Int or float, promoted to float
    pub fn pop_number(&mut self) -> Result<f32> {
        let value = self.pop()?;
        value
            .as_number()
            .ok_or_else(|| fatal!("expected a number on stack, found {}", value.kind()))
    }

    pub fn pop_string(&mut self) -> Result<String> {
        match self.pop()? {
            Value::String(s) => Ok(s),
            other => Err(fatal!("expected string on stack, found {}", other.kind())),
        }
    }

    pub fn pop_bundle(&mut self) -> Result<ObjectHandle> {
        match self.pop()? {
            Value::Bundle(h) => Ok(h),
            other => Err(fatal!("expected bundle on stack, found {}", other.kind())),
        }
    }

    pub fn pop_array(&mut self) -> Result<ObjectHandle> {
        match self.pop()? {
            Value::Array(h) => Ok(h),
            other => Err(fatal!("expected array on stack, found {}", other.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_after_pushes_and_pops() {
        for n in 1..8 {
            for k in 0..n {
                let mut stack = DataStack::new();
                for i in 0..n {
                    stack.push(i);
                }
                for _ in 0..k {
                    stack.pop().unwrap();
                }
                assert_eq!(stack.peek().unwrap(), &Value::Int(n - k - 1));
                assert_eq!(stack.len() as i32, n - k);
            }
        }
    }

    #[test]
    fn test_underflow_is_fatal() {
        let mut stack = DataStack::new();
        assert_eq!(stack.pop(), Err(InstructionErrorCode::Fatal));
        assert_eq!(stack.peek(), Err(InstructionErrorCode::Fatal));
    }

    #[test]
    fn test_typed_pops() {
        let mut stack = DataStack::new();
        stack.push("name");
        stack.push(2.5f32);
        stack.push(4);
        assert_eq!(stack.peek_at(2).unwrap(), &Value::from("name"));
        assert_eq!(stack.pop_number(), Ok(4.0));
        assert_eq!(stack.pop_int(), Err(InstructionErrorCode::Fatal));
        assert_eq!(stack.pop_string(), Ok("name".to_string()));
        assert!(stack.is_empty());
    }
}
