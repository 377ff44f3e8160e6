use std::cmp::Ordering;

use super::{mismatched, unexpected, ColumnCodec};
use crate::block::BlockReader;
use crate::error::{DsutilError, Result};
use crate::hash::hash_i64;
use crate::types::ValueType;
use crate::value::Value;

const NULL_BYTE: u8 = 0xff;

/// One byte per value: 0, 1, or `0xFF` for None.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bool;

impl ColumnCodec for Bool {
    fn validate(&self, ty: ValueType, value: &Value) -> Result<Value> {
        match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Int(0) => Ok(Value::Bool(false)),
            Value::Int(1) => Ok(Value::Bool(true)),
            Value::Int(_) | Value::BigInt(_) => {
                Err(DsutilError::range(ty, format!("{value} is neither 0 nor 1")))
            }
            other => Err(unexpected(ty, other)),
        }
    }

    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::None => out.push(NULL_BYTE),
            Value::Bool(b) => out.push(u8::from(*b)),
            other => return Err(mismatched(other)),
        }
        Ok(())
    }

    fn decode(&self, input: &mut BlockReader) -> Result<Value> {
        match input.read_u8()? {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            NULL_BYTE => Ok(Value::None),
            other => Err(DsutilError::Corrupt(format!("invalid Bool byte {other:#04x}"))),
        }
    }

    fn hash(&self, value: &Value) -> u64 {
        match value {
            Value::Bool(b) => hash_i64(i64::from(*b)),
            _ => 0,
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_zero_and_one_only() {
        assert_eq!(Bool.validate(ValueType::Bool, &Value::Int(1)).unwrap(), Value::Bool(true));
        assert_eq!(Bool.validate(ValueType::Bool, &Value::Int(0)).unwrap(), Value::Bool(false));
        assert!(matches!(
            Bool.validate(ValueType::Bool, &Value::Int(2)),
            Err(DsutilError::Range { .. })
        ));
        assert!(matches!(
            Bool.validate(ValueType::Bool, &Value::Float(1.0)),
            Err(DsutilError::ValueDomain { .. })
        ));
    }
}
