// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Recursive-descent parser with one-token lookahead.
//!
//! Produces the command sequence in declaration order and registers label
//! declarations into the label map. The parser stops at the first malformed
//! instruction; there is no recovery beyond skipping blank lines between
//! statements.

use std::fmt;

use crate::command::{BranchCondition, Command, CommandKind, Operand, MAX_REGISTER};
use crate::label_map::LabelMap;
use crate::lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// A parsed program: commands in declaration order plus the label registry.
///
/// Label entries hold indices into `commands`; execution order is index
/// order except where control transfers rewrite it.
#[derive(Debug)]
pub struct Program {
    pub commands: Vec<Command>,
    pub labels: LabelMap,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token<'a>,
    next: Token<'a>,
    had_error: bool,
    error: Option<ParseError>,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Self {
        let current = lexer.next_token();
        let next = lexer.next_token();
        Self {
            lexer,
            current,
            next,
            had_error: false,
            error: None,
        }
    }

    /// Parse the whole token stream into a program.
    ///
    /// A label line registers the name against the next command to be
    /// appended; a label at end of file registers against an appended `Nop`
    /// terminator.
    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut commands = Vec::new();
        let mut labels = LabelMap::new();
        let mut labels_pending = 0usize;

        loop {
            self.skip_nls();
            if self.is_at_end() || self.had_error {
                break;
            }

            if self.current.kind == TokenKind::Ident && self.next.kind == TokenKind::Colon {
                labels.put(self.current.text().into_owned(), commands.len());
                labels_pending += 1;
                self.advance();
                self.advance();
                continue;
            }

            match self.parse_instruction() {
                Some(command) => {
                    commands.push(command);
                    labels_pending = 0;
                }
                None => break,
            }
        }

        if let Some(error) = self.error.take() {
            return Err(error);
        }
        if labels_pending > 0 {
            commands.push(Command::new(CommandKind::Nop, self.current.line));
        }
        Ok(Program { commands, labels })
    }

    fn parse_instruction(&mut self) -> Option<Command> {
        let token = self.advance();
        let line = token.line;
        match token.kind {
            TokenKind::Add => self.parse_arithmetic(CommandKind::Add, line),
            TokenKind::Sub => self.parse_arithmetic(CommandKind::Sub, line),
            TokenKind::Mov => self.parse_mov(line),
            TokenKind::Cmp => self.parse_compare(CommandKind::Cmp, line),
            TokenKind::CmpU => self.parse_compare(CommandKind::CmpU, line),
            TokenKind::And => self.parse_bitwise(CommandKind::And, line),
            TokenKind::Eor => self.parse_bitwise(CommandKind::Eor, line),
            TokenKind::Orr => self.parse_bitwise(CommandKind::Orr, line),
            TokenKind::Asr => self.parse_shift(CommandKind::Asr, line),
            TokenKind::Lsl => self.parse_shift(CommandKind::Lsl, line),
            TokenKind::Lsr => self.parse_shift(CommandKind::Lsr, line),
            TokenKind::Store => self.parse_store(line),
            TokenKind::Load => self.parse_load(line),
            TokenKind::Put => self.parse_put(line),
            TokenKind::Print => self.parse_print(line),
            TokenKind::Branch => self.parse_jump(CommandKind::Branch, BranchCondition::None, line),
            TokenKind::BranchEq => {
                self.parse_jump(CommandKind::Branch, BranchCondition::Equal, line)
            }
            TokenKind::BranchNeq => {
                self.parse_jump(CommandKind::Branch, BranchCondition::NotEqual, line)
            }
            TokenKind::BranchGt => {
                self.parse_jump(CommandKind::Branch, BranchCondition::Greater, line)
            }
            TokenKind::BranchGe => {
                self.parse_jump(CommandKind::Branch, BranchCondition::GreaterEqual, line)
            }
            TokenKind::BranchLt => {
                self.parse_jump(CommandKind::Branch, BranchCondition::Less, line)
            }
            TokenKind::BranchLe => {
                self.parse_jump(CommandKind::Branch, BranchCondition::LessEqual, line)
            }
            TokenKind::Call => self.parse_jump(CommandKind::Call, BranchCondition::None, line),
            TokenKind::Ret => self.finish_line(Command::new(CommandKind::Ret, line)),
            TokenKind::Ident => {
                self.fail(line, format!("expected ':' after label '{}'", token.text()));
                None
            }
            TokenKind::Error => {
                self.fail(line, format!("unrecognized character '{}'", token.text()));
                None
            }
            _ => {
                self.fail(
                    line,
                    format!("expected instruction mnemonic, found '{}'", token.text()),
                );
                None
            }
        }
    }

    /// `add`/`sub`: register destination, register a, register-or-immediate b.
    fn parse_arithmetic(&mut self, kind: CommandKind, line: u32) -> Option<Command> {
        let mut command = Command::new(kind, line);
        command.destination = Operand::Num(self.parse_register()?);
        command.val_a = Operand::Num(self.parse_register()?);
        let (value, is_immediate) = self.parse_var_or_imm()?;
        command.val_b = Operand::Num(value);
        command.is_b_immediate = is_immediate;
        self.finish_line(command)
    }

    /// `mov`: register destination, immediate-only source.
    fn parse_mov(&mut self, line: u32) -> Option<Command> {
        let mut command = Command::new(CommandKind::Mov, line);
        command.destination = Operand::Num(self.parse_register()?);
        command.val_a = Operand::Num(self.parse_immediate()?);
        command.is_a_immediate = true;
        self.finish_line(command)
    }

    /// `cmp`/`cmpu`: register destination against register-or-immediate a.
    fn parse_compare(&mut self, kind: CommandKind, line: u32) -> Option<Command> {
        let mut command = Command::new(kind, line);
        command.destination = Operand::Num(self.parse_register()?);
        let (value, is_immediate) = self.parse_var_or_imm()?;
        command.val_a = Operand::Num(value);
        command.is_a_immediate = is_immediate;
        self.finish_line(command)
    }

    /// `and`/`eor`/`orr`: all three operands are registers.
    fn parse_bitwise(&mut self, kind: CommandKind, line: u32) -> Option<Command> {
        let mut command = Command::new(kind, line);
        command.destination = Operand::Num(self.parse_register()?);
        command.val_a = Operand::Num(self.parse_register()?);
        command.val_b = Operand::Num(self.parse_register()?);
        self.finish_line(command)
    }

    /// `asr`/`lsl`/`lsr`: shift amount is immediate-only.
    fn parse_shift(&mut self, kind: CommandKind, line: u32) -> Option<Command> {
        let mut command = Command::new(kind, line);
        command.destination = Operand::Num(self.parse_register()?);
        command.val_a = Operand::Num(self.parse_register()?);
        command.val_b = Operand::Num(self.parse_immediate()?);
        command.is_b_immediate = true;
        self.finish_line(command)
    }

    /// `store dest addr count`: count is immediate-only.
    fn parse_store(&mut self, line: u32) -> Option<Command> {
        let mut command = Command::new(CommandKind::Store, line);
        command.destination = Operand::Num(self.parse_register()?);
        let (value, is_immediate) = self.parse_var_or_imm()?;
        command.val_a = Operand::Num(value);
        command.is_a_immediate = is_immediate;
        command.val_b = Operand::Num(self.parse_immediate()?);
        command.is_b_immediate = true;
        self.finish_line(command)
    }

    /// `load dest count addr`: count is immediate-only.
    fn parse_load(&mut self, line: u32) -> Option<Command> {
        let mut command = Command::new(CommandKind::Load, line);
        command.destination = Operand::Num(self.parse_register()?);
        command.val_a = Operand::Num(self.parse_immediate()?);
        command.is_a_immediate = true;
        let (value, is_immediate) = self.parse_var_or_imm()?;
        command.val_b = Operand::Num(value);
        command.is_b_immediate = is_immediate;
        self.finish_line(command)
    }

    /// `put addr "text"`: the command owns the string payload.
    fn parse_put(&mut self, line: u32) -> Option<Command> {
        let mut command = Command::new(CommandKind::Put, line);
        let (value, is_immediate) = self.parse_var_or_imm()?;
        command.val_a = Operand::Num(value);
        command.is_a_immediate = is_immediate;
        let token = self.current;
        if token.kind != TokenKind::Str {
            self.fail(
                token.line,
                format!("expected string literal, found '{}'", token.text()),
            );
            return None;
        }
        self.advance();
        command.val_b = Operand::Str(token.text().into_owned());
        command.is_b_string = true;
        self.finish_line(command)
    }

    /// `print value base`.
    fn parse_print(&mut self, line: u32) -> Option<Command> {
        let mut command = Command::new(CommandKind::Print, line);
        let (value, is_immediate) = self.parse_var_or_imm()?;
        command.val_a = Operand::Num(value);
        command.is_a_immediate = is_immediate;
        command.val_b = Operand::Base(self.parse_base()?);
        self.finish_line(command)
    }

    /// `b`/`b<cc>`/`call`: a label name, resolved at execution time.
    fn parse_jump(
        &mut self,
        kind: CommandKind,
        condition: BranchCondition,
        line: u32,
    ) -> Option<Command> {
        let token = self.current;
        if token.kind != TokenKind::Ident {
            self.fail(line, format!("expected label name, found '{}'", token.text()));
            return None;
        }
        self.advance();
        let mut command = Command::new(kind, line);
        command.branch_condition = condition;
        command.destination = Operand::Str(token.text().into_owned());
        self.finish_line(command)
    }

    /// Require the instruction to end the line, leaving the `Nl` for the
    /// statement loop.
    fn finish_line(&mut self, command: Command) -> Option<Command> {
        if matches!(self.current.kind, TokenKind::Nl | TokenKind::Eof) {
            Some(command)
        } else {
            self.fail(
                self.current.line,
                format!(
                    "trailing tokens after instruction: '{}'",
                    self.current.text()
                ),
            );
            None
        }
    }

    fn parse_register(&mut self) -> Option<i64> {
        let token = self.current;
        if !is_variable(token.lexeme) {
            self.fail(
                token.line,
                format!("expected register operand, found '{}'", token.text()),
            );
            return None;
        }
        let Some(index) = register_index(token.lexeme) else {
            self.fail(
                token.line,
                format!("register out of range: '{}'", token.text()),
            );
            return None;
        };
        self.advance();
        Some(index)
    }

    fn parse_immediate(&mut self) -> Option<i64> {
        let token = self.current;
        if token.kind != TokenKind::Num {
            self.fail(
                token.line,
                format!("expected numeric operand, found '{}'", token.text()),
            );
            return None;
        }
        let Some(value) = number_value(token.lexeme) else {
            self.fail(
                token.line,
                format!("malformed numeric constant '{}'", token.text()),
            );
            return None;
        };
        self.advance();
        Some(value)
    }

    /// Immediate when the token is numeric, register otherwise. The returned
    /// flag is true for immediates.
    fn parse_var_or_imm(&mut self) -> Option<(i64, bool)> {
        if self.current.kind == TokenKind::Num {
            return self.parse_immediate().map(|value| (value, true));
        }
        self.parse_register().map(|value| (value, false))
    }

    fn parse_base(&mut self) -> Option<u8> {
        let token = self.current;
        if token.lexeme.len() == 1 && matches!(token.lexeme[0], b'd' | b'x' | b'b' | b's') {
            self.advance();
            Some(token.lexeme[0])
        } else {
            self.fail(
                token.line,
                format!("expected print base (d, x, b or s), found '{}'", token.text()),
            );
            None
        }
    }

    fn skip_nls(&mut self) {
        while self.consume(TokenKind::Nl) {}
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.current.kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.current;
        if !self.is_at_end() {
            self.current = self.next;
            self.next = self.lexer.next_token();
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    fn fail(&mut self, line: u32, message: String) {
        self.had_error = true;
        if self.error.is_none() {
            self.error = Some(ParseError { message, line });
        }
    }
}

fn is_variable(lexeme: &[u8]) -> bool {
    lexeme.len() >= 2 && lexeme[0] == b'x'
}

fn register_index(lexeme: &[u8]) -> Option<i64> {
    let digits = std::str::from_utf8(&lexeme[1..]).ok()?;
    let index = digits.parse::<i64>().ok()?;
    if (0..=MAX_REGISTER).contains(&index) {
        Some(index)
    } else {
        None
    }
}

/// Convert a numeric lexeme. `0x`/`0b` digits are read as a 64-bit pattern
/// and reinterpreted as signed; plain decimal parses as signed directly.
fn number_value(lexeme: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(lexeme).ok()?;
    if lexeme.len() > 2 && lexeme[0] == b'0' {
        match lexeme[1] {
            b'x' => return u64::from_str_radix(&text[2..], 16).ok().map(|v| v as i64),
            b'b' => return u64::from_str_radix(&text[2..], 2).ok().map(|v| v as i64),
            _ => {}
        }
    }
    text.parse::<i64>().ok()
}
