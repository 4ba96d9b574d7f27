//! Opcodes and resolved instructions

use std::fmt;

use super::value::Value;

macro_rules! opcodes {
    ($($variant:ident => $mnemonic:literal),* $(,)?) => {
        /// Instruction opcodes
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant),*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant),*];

            /// Textual mnemonic as written in script files
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $mnemonic),*
                }
            }
        }
    };
}

opcodes! {
    Nop => "Nop",
    Pop => "Pop",
    Dup => "Dup",
    Call => "Call",
    CallVirt => "CallVirt",
    ConvType => "ConvType",
    Ret => "Ret",
    Br => "Br",
    BrTrue => "BrTrue",
    BrFalse => "BrFalse",
    Ceq => "Ceq",
    Neg => "Neg",
    Not => "Not",
    And => "And",
    Or => "Or",
    Xor => "Xor",
    Clt => "Clt",
    Cgt => "Cgt",
    CallThreaded => "Call_t",
    Wait => "Wait",
    WaitNotify => "Wait_n",
    Notify => "Notify",
    Add => "Add",
    Sub => "Sub",
    Mul => "Mul",
    Div => "Div",
    Rem => "Rem",
    AddStr => "AddStr",
    LdcI4Zero => "Ldc_i4_0",
    LdcI4One => "Ldc_i4_1",
    LdcI4 => "Ldc_i4",
    LdcR4 => "Ldc_r4",
    LdcS => "Ldc_s",
    Newobj => "Newobj",
    NewArr => "NewArr",
    Ldarg => "Ldarg",
    LdBarg => "LdBarg",
    Ldloc => "Ldloc",
    LdBloc => "LdBloc",
    Ldelem => "Ldelem",
    Stloc => "Stloc",
    StBloc => "StBloc",
    StArg => "StArg",
    StBArg => "StBArg",
    StElem => "StElem",
}

impl Opcode {
    /// Case-insensitive lookup; `Ld_b` is the legacy spelling of `Newobj`
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("Ld_b") {
            return Some(Opcode::Newobj);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(text))
    }

    /// Opcodes that may legally be the last instruction of a body
    pub fn ends_body(self) -> bool {
        matches!(self, Opcode::Ret | Opcode::Br)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// An opcode with its load-time resolved operands
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub arguments: Vec<Value>,
}

impl Instruction {
    pub fn new(opcode: Opcode, arguments: Vec<Value>) -> Self {
        Self { opcode, arguments }
    }

    pub fn simple(opcode: Opcode) -> Self {
        Self::new(opcode, Vec::new())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for arg in &self.arguments {
            match arg {
                Value::String(s) => write!(f, " \"{s}\"")?,
                other => write!(f, " {other}")?,
            }
        }
        Ok(())
    }
}
