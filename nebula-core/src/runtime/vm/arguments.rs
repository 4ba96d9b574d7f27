//! Load-time operand resolution

use thiserror::Error;

use crate::core::{Opcode, Value, ValueKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("{opcode} expects {expected} argument(s), got {found}")]
    WrongCount {
        opcode: Opcode,
        expected: &'static str,
        found: usize,
    },
    #[error("{opcode}: '{text}' is not a valid integer")]
    InvalidInteger { opcode: Opcode, text: String },
    #[error("{opcode}: '{text}' is not a valid float")]
    InvalidFloat { opcode: Opcode, text: String },
    #[error("{opcode}: '{text}' must not be negative")]
    NegativeIndex { opcode: Opcode, text: String },
    #[error("{opcode}: unknown type '{text}'")]
    UnknownType { opcode: Opcode, text: String },
}

/// Turn an opcode's textual operands into typed values
///
/// Type names become kind codes, labels and slot indices become ints, names
/// stay strings.
pub fn generate_arguments_for_opcode<S: AsRef<str>>(
    opcode: Opcode,
    raw: &[S],
) -> Result<Vec<Value>, ArgumentError> {
    use Opcode::*;

    let raw: Vec<&str> = raw.iter().map(|s| s.as_ref()).collect();
    let parser = Operands { opcode, raw: &raw };

    match opcode {
        Nop | Pop | Dup | Ret | Ceq | Neg | Not | And | Or | Xor | Clt | Cgt | Wait | WaitNotify
        | Notify | Add | Sub | Mul | Div | Rem | LdcI4Zero | LdcI4One | Ldelem | StElem => {
            parser.count(0, 0, "no")?;
            Ok(Vec::new())
        }

        Call | CallThreaded | Newobj => {
            parser.count(1, 2, "1 or 2")?;
            Ok(raw.iter().map(|s| Value::from(*s)).collect())
        }

        CallVirt | LdcS => {
            parser.count(1, 1, "1")?;
            Ok(vec![Value::from(raw[0])])
        }

        ConvType => {
            parser.count(1, 1, "1")?;
            Ok(vec![Value::Int(parser.kind(0)?.code())])
        }

        NewArr => {
            parser.count(1, 3, "1 to 3")?;
            let mut args = vec![Value::Int(parser.kind(0)?.code())];
            args.extend(raw[1..].iter().map(|s| Value::from(*s)));
            Ok(args)
        }

        Br | BrTrue | BrFalse | Ldarg | Ldloc | Stloc | StArg | AddStr => {
            parser.count(1, 1, "1")?;
            Ok(vec![Value::Int(parser.index(0)?)])
        }

        LdBarg | LdBloc | StBloc | StBArg => {
            parser.count(2, 2, "2")?;
            Ok(vec![Value::Int(parser.index(0)?), Value::Int(parser.index(1)?)])
        }

        LdcI4 => {
            parser.count(1, 1, "1")?;
            Ok(vec![Value::Int(parser.int(0)?)])
        }

        LdcR4 => {
            parser.count(1, 1, "1")?;
            Ok(vec![Value::Float(parser.float(0)?)])
        }
    }
}

struct Operands<'a> {
    opcode: Opcode,
    raw: &'a [&'a str],
}

impl Operands<'_> {
    fn count(&self, min: usize, max: usize, expected: &'static str) -> Result<(), ArgumentError> {
        if (min..=max).contains(&self.raw.len()) {
            Ok(())
        } else {
            Err(ArgumentError::WrongCount {
                opcode: self.opcode,
                expected,
                found: self.raw.len(),
            })
        }
    }

    /// Decimal, optionally signed, or `0x` hexadecimal
    fn int(&self, at: usize) -> Result<i32, ArgumentError> {
        let text = self.raw[at];
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).map(|v| v as i32).ok(),
            None => text.parse::<i32>().ok(),
        };
        parsed.ok_or_else(|| ArgumentError::InvalidInteger {
            opcode: self.opcode,
            text: text.to_string(),
        })
    }

    fn index(&self, at: usize) -> Result<i32, ArgumentError> {
        let value = self.int(at)?;
        if value < 0 {
            return Err(ArgumentError::NegativeIndex {
                opcode: self.opcode,
                text: self.raw[at].to_string(),
            });
        }
        Ok(value)
    }

    fn float(&self, at: usize) -> Result<f32, ArgumentError> {
        let text = self.raw[at];
        text.trim_end_matches(['f', 'F'])
            .parse::<f32>()
            .map_err(|_| ArgumentError::InvalidFloat {
                opcode: self.opcode,
                text: text.to_string(),
            })
    }

    fn kind(&self, at: usize) -> Result<ValueKind, ArgumentError> {
        ValueKind::from_type_name(self.raw[at]).ok_or_else(|| ArgumentError::UnknownType {
            opcode: self.opcode,
            text: self.raw[at].to_string(),
        })
    }
}
