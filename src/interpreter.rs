// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Tree-walking interpreter over the parsed command sequence.
//!
//! Machine state is 32 signed 64-bit registers, three mutually-exclusive
//! comparison flags, a call stack of register snapshots, and a per-instance
//! byte memory. Execution is strictly sequential; control transfers rewrite
//! the command index directly.

use std::fmt;
use std::io::{self, Write};

use serde_json::json;

use crate::command::{BranchCondition, Command, CommandKind, Operand, NUM_REGISTERS};
use crate::memory::ByteMemory;
use crate::parser::Program;

#[derive(Debug)]
pub enum RuntimeError {
    UnknownLabel { label: String, line: u32 },
    MemoryBounds { address: i64, line: u32 },
    BadByteCount { count: i64, line: u32 },
    Io(io::Error),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLabel { label, line } => {
                write!(f, "line {line}: label not found: {label}")
            }
            Self::MemoryBounds { address, line } => {
                write!(f, "line {line}: memory access out of bounds at address {address}")
            }
            Self::BadByteCount { count, line } => {
                write!(f, "line {line}: byte count must be between 1 and 8, got {count}")
            }
            Self::Io(err) => write!(f, "output error: {err}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<io::Error> for RuntimeError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Snapshot pushed by `call` and consumed by `ret`.
#[derive(Debug, Clone)]
struct StackFrame {
    registers: [i64; NUM_REGISTERS],
    return_index: usize,
}

/// The abstract machine. One instance per program run; the byte memory
/// belongs to the machine, so independent machines never share state.
#[derive(Debug)]
pub struct Interpreter {
    registers: [i64; NUM_REGISTERS],
    is_greater: bool,
    is_equal: bool,
    is_less: bool,
    had_error: bool,
    memory: ByteMemory,
    stack: Vec<StackFrame>,
}

impl Interpreter {
    pub fn new(memory: ByteMemory) -> Self {
        Self {
            registers: [0; NUM_REGISTERS],
            is_greater: false,
            is_equal: false,
            is_less: false,
            had_error: false,
            memory,
            stack: Vec::new(),
        }
    }

    pub fn registers(&self) -> &[i64; NUM_REGISTERS] {
        &self.registers
    }

    pub fn flags(&self) -> (bool, bool, bool) {
        (self.is_greater, self.is_equal, self.is_less)
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn call_depth(&self) -> usize {
        self.stack.len()
    }

    /// Execute the program from its first command until halt.
    ///
    /// `print` output goes to `out`. The first runtime failure stops
    /// execution; effects performed before it (output, memory writes)
    /// remain. Any call-stack entries left over are discarded on exit.
    pub fn run<W: Write>(&mut self, program: &Program, out: &mut W) -> Result<(), RuntimeError> {
        let result = self.run_inner(program, out);
        if result.is_err() {
            self.had_error = true;
        }
        self.stack.clear();
        result
    }

    fn run_inner<W: Write>(&mut self, program: &Program, out: &mut W) -> Result<(), RuntimeError> {
        let mut pc = Some(0usize);
        while let Some(index) = pc {
            let Some(command) = program.commands.get(index) else {
                break;
            };
            pc = self.step(program, command, index, out)?;
        }
        Ok(())
    }

    /// Execute one command, returning the next command index (`None` halts).
    fn step<W: Write>(
        &mut self,
        program: &Program,
        command: &Command,
        index: usize,
        out: &mut W,
    ) -> Result<Option<usize>, RuntimeError> {
        match command.kind {
            CommandKind::Mov => {
                self.set_register(&command.destination, command.val_a.num());
            }
            CommandKind::Add => {
                let a = self.register(&command.val_a);
                let b = self.fetch_number(&command.val_b, command.is_b_immediate);
                self.set_register(&command.destination, a.wrapping_add(b));
            }
            CommandKind::Sub => {
                let a = self.register(&command.val_a);
                let b = self.fetch_number(&command.val_b, command.is_b_immediate);
                self.set_register(&command.destination, a.wrapping_sub(b));
            }
            CommandKind::Cmp => {
                let dest = self.register(&command.destination);
                let a = self.fetch_number(&command.val_a, command.is_a_immediate);
                self.set_flags(dest > a, dest == a);
            }
            CommandKind::CmpU => {
                let dest = self.register(&command.destination) as u64;
                let a = self.fetch_number(&command.val_a, command.is_a_immediate) as u64;
                self.set_flags(dest > a, dest == a);
            }
            CommandKind::And => {
                let value = self.register(&command.val_a) & self.register(&command.val_b);
                self.set_register(&command.destination, value);
            }
            CommandKind::Eor => {
                let value = self.register(&command.val_a) ^ self.register(&command.val_b);
                self.set_register(&command.destination, value);
            }
            CommandKind::Orr => {
                let value = self.register(&command.val_a) | self.register(&command.val_b);
                self.set_register(&command.destination, value);
            }
            CommandKind::Asr => {
                let value = self.register(&command.val_a);
                let amount = command.val_b.num() as u32;
                self.set_register(&command.destination, value.wrapping_shr(amount));
            }
            CommandKind::Lsl => {
                let value = self.register(&command.val_a);
                let amount = command.val_b.num() as u32;
                self.set_register(&command.destination, value.wrapping_shl(amount));
            }
            CommandKind::Lsr => {
                let value = self.register(&command.val_a) as u64;
                let amount = command.val_b.num() as u32;
                self.set_register(&command.destination, value.wrapping_shr(amount) as i64);
            }
            CommandKind::Store => {
                let count = command.val_b.num();
                let address = self.fetch_number(&command.val_a, command.is_a_immediate);
                let bytes = self.register(&command.destination).to_le_bytes();
                self.store_bytes(&bytes, address, count, command.line)?;
            }
            CommandKind::Load => {
                let count = command.val_a.num();
                let address = self.fetch_number(&command.val_b, command.is_b_immediate);
                let value = self.load_value(address, count, command.line)?;
                self.set_register(&command.destination, value);
            }
            CommandKind::Put => {
                let address = self.fetch_number(&command.val_a, command.is_a_immediate);
                let mut bytes = command.val_b.str_val().as_bytes().to_vec();
                bytes.push(0);
                self.store_string(&bytes, address, command.line)?;
            }
            CommandKind::Print => {
                let value = self.fetch_number(&command.val_a, command.is_a_immediate);
                self.print_base(value, command.val_b.base(), command.line, out)?;
            }
            CommandKind::Branch => {
                if self.cond_holds(command.branch_condition) {
                    return self.resolve_label(program, command).map(Some);
                }
            }
            CommandKind::Call => {
                self.stack.push(StackFrame {
                    registers: self.registers,
                    return_index: index + 1,
                });
                return self.resolve_label(program, command).map(Some);
            }
            CommandKind::Ret => {
                let Some(frame) = self.stack.pop() else {
                    return Ok(None);
                };
                // x0 carries the callee result back; x1..x31 are restored.
                self.registers[1..].copy_from_slice(&frame.registers[1..]);
                return Ok(Some(frame.return_index));
            }
            CommandKind::Nop => {}
        }
        Ok(Some(index + 1))
    }

    /// Operand value: the literal for immediates, the named register
    /// otherwise.
    fn fetch_number(&self, op: &Operand, is_immediate: bool) -> i64 {
        if is_immediate {
            op.num()
        } else {
            self.register(op)
        }
    }

    fn register(&self, op: &Operand) -> i64 {
        self.registers[(op.num() as usize) % NUM_REGISTERS]
    }

    fn set_register(&mut self, op: &Operand, value: i64) {
        self.registers[(op.num() as usize) % NUM_REGISTERS] = value;
    }

    /// Leave exactly one comparison flag set.
    fn set_flags(&mut self, greater: bool, equal: bool) {
        self.is_greater = greater;
        self.is_equal = equal;
        self.is_less = !greater && !equal;
    }

    fn cond_holds(&self, condition: BranchCondition) -> bool {
        match condition {
            BranchCondition::None => true,
            BranchCondition::Equal => self.is_equal,
            BranchCondition::NotEqual => !self.is_equal,
            BranchCondition::Greater => self.is_greater,
            BranchCondition::GreaterEqual => self.is_greater || self.is_equal,
            BranchCondition::Less => self.is_less,
            BranchCondition::LessEqual => self.is_less || self.is_equal,
        }
    }

    fn resolve_label(
        &mut self,
        program: &Program,
        command: &Command,
    ) -> Result<usize, RuntimeError> {
        let label = command.destination.str_val();
        program.labels.get(label).ok_or_else(|| RuntimeError::UnknownLabel {
            label: label.to_string(),
            line: command.line,
        })
    }

    fn store_bytes(
        &mut self,
        bytes: &[u8; 8],
        address: i64,
        count: i64,
        line: u32,
    ) -> Result<(), RuntimeError> {
        let count = byte_count(count, line)?;
        let address_usize = to_address(address, line)?;
        if !self.memory.store(&bytes[..count], address_usize, count) {
            return Err(RuntimeError::MemoryBounds { address, line });
        }
        Ok(())
    }

    fn store_string(&mut self, bytes: &[u8], address: i64, line: u32) -> Result<(), RuntimeError> {
        let address_usize = to_address(address, line)?;
        if !self.memory.store(bytes, address_usize, bytes.len()) {
            return Err(RuntimeError::MemoryBounds { address, line });
        }
        Ok(())
    }

    /// Zero-extend `count` bytes from memory into a register value.
    fn load_value(&mut self, address: i64, count: i64, line: u32) -> Result<i64, RuntimeError> {
        let count = byte_count(count, line)?;
        let address_usize = to_address(address, line)?;
        let mut buf = [0u8; 8];
        if !self.memory.load(&mut buf[..count], address_usize, count) {
            return Err(RuntimeError::MemoryBounds { address, line });
        }
        Ok(i64::from_le_bytes(buf))
    }

    fn print_base<W: Write>(
        &self,
        value: i64,
        base: u8,
        line: u32,
        out: &mut W,
    ) -> Result<(), RuntimeError> {
        match base {
            b'd' => writeln!(out, "{value}")?,
            b'x' => writeln!(out, "0x{:x}", value as u64)?,
            b'b' => writeln!(out, "0b{:b}", value as u64)?,
            _ => {
                // 's': the value is an address of a NUL-terminated run.
                let mut address = to_address(value, line)?;
                loop {
                    let Some(byte) = self.memory.load_byte(address) else {
                        return Err(RuntimeError::MemoryBounds {
                            address: address as i64,
                            line,
                        });
                    };
                    if byte == 0 {
                        break;
                    }
                    out.write_all(&[byte])?;
                    address += 1;
                }
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    /// Render the diagnostic state dump: error flag, comparison flags, and
    /// all registers in decimal, eight per line.
    pub fn state_dump(&self) -> String {
        let mut text = String::new();
        text.push_str(&format!("Error: {}\n", u8::from(self.had_error)));
        text.push_str("Flags:\n");
        text.push_str(&format!("Is greater: {}\n", u8::from(self.is_greater)));
        text.push_str(&format!("Is equal: {}\n", u8::from(self.is_equal)));
        text.push_str(&format!("Is less: {}\n", u8::from(self.is_less)));
        text.push('\n');
        text.push_str("Variable values:\n");
        for (index, value) in self.registers.iter().enumerate() {
            text.push_str(&format!("x{index}: {value}"));
            if index < NUM_REGISTERS - 1 {
                text.push_str(", ");
            }
            if (index + 1) % 8 == 0 {
                text.push('\n');
            }
        }
        text.push('\n');
        text
    }

    /// Machine-readable form of the state dump.
    pub fn state_json(&self) -> serde_json::Value {
        json!({
            "error": self.had_error,
            "flags": {
                "greater": self.is_greater,
                "equal": self.is_equal,
                "less": self.is_less,
            },
            "registers": self.registers.to_vec(),
        })
    }
}

fn byte_count(count: i64, line: u32) -> Result<usize, RuntimeError> {
    if (1..=8).contains(&count) {
        Ok(count as usize)
    } else {
        Err(RuntimeError::BadByteCount { count, line })
    }
}

fn to_address(value: i64, line: u32) -> Result<usize, RuntimeError> {
    usize::try_from(value as u64).map_err(|_| RuntimeError::MemoryBounds {
        address: value,
        line,
    })
}
