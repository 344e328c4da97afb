use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::binary::{BinaryModule, MAGIC};
use crate::grammar::{self, EnumKind, MaskKind, OpInfo, OperandKind, Param};
use crate::literal::{self, NumericType};
use crate::version::ModuleVersion;

/// Generator magic written into assembled module headers (tool id 0, tool version 1).
pub const GENERATOR_MAGIC: u32 = 0x0000_0001;

/// Selector type assumed for `OpSwitch` when the selector's type is not known at that point.
const DEFAULT_SELECTOR_TYPE: NumericType = NumericType::Int {
    width: 32,
    signed: true,
};

/// Assembly failure with a position into the source text.
///
/// `line` and `column` are 1-based; `line == 0` means the error applies to the whole module (for
/// example an unsupported target version).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (line {line}, column {column})")]
pub struct AssemblyError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub source_line: String,
}

/// Turns SPIR-V assembly text into a binary module for a target version.
///
/// Implementations must be pure: the same `(source, version)` pair always yields the same words.
pub trait Assemble {
    fn assemble(&self, source: &str, version: ModuleVersion)
        -> Result<BinaryModule, AssemblyError>;
}

impl<T: Assemble + ?Sized> Assemble for &T {
    fn assemble(
        &self,
        source: &str,
        version: ModuleVersion,
    ) -> Result<BinaryModule, AssemblyError> {
        (**self).assemble(source, version)
    }
}

impl<T: Assemble + ?Sized> Assemble for Arc<T> {
    fn assemble(
        &self,
        source: &str,
        version: ModuleVersion,
    ) -> Result<BinaryModule, AssemblyError> {
        (**self).assemble(source, version)
    }
}

/// The table-driven assembler for the core instruction subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAssembler;

impl Assemble for TextAssembler {
    fn assemble(
        &self,
        source: &str,
        version: ModuleVersion,
    ) -> Result<BinaryModule, AssemblyError> {
        assemble(source, version)
    }
}

/// Assembles `source` for `version`.
pub fn assemble(source: &str, version: ModuleVersion) -> Result<BinaryModule, AssemblyError> {
    if !version.is_supported() {
        return Err(AssemblyError {
            line: 0,
            column: 0,
            message: format!(
                "unsupported SPIR-V version {version} (supported: {} ..= {})",
                ModuleVersion::MIN_SUPPORTED,
                ModuleVersion::MAX_SUPPORTED
            ),
            source_line: String::new(),
        });
    }

    let lines: Vec<&str> = source.lines().collect();
    let tokens = tokenize(&lines)?;
    let mut state = Encoder::new(&lines, tokens, version);
    state.run()?;

    let bound = state.ids.len() as u32 + 1;
    let mut words = Vec::with_capacity(5 + state.words.len());
    words.extend_from_slice(&[MAGIC, version.word(), GENERATOR_MAGIC, bound, 0]);
    words.extend_from_slice(&state.words);
    debug!(%version, bound, words = words.len(), "assembled SPIR-V module");
    Ok(BinaryModule::from_assembled(words))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Str,
    Equals,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    line: usize,
    column: usize,
}

fn error_at(lines: &[&str], line: usize, column: usize, message: String) -> AssemblyError {
    let source_line = line
        .checked_sub(1)
        .and_then(|idx| lines.get(idx))
        .map(|s| s.to_string())
        .unwrap_or_default();
    AssemblyError {
        line,
        column,
        message,
        source_line,
    }
}

fn tokenize(lines: &[&str]) -> Result<Vec<Token>, AssemblyError> {
    let mut tokens = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        let line_no = line_idx + 1;
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
                continue;
            }
            if c == ';' {
                break;
            }
            let column = i + 1;
            if c == '=' {
                tokens.push(Token {
                    kind: TokenKind::Equals,
                    text: "=".to_string(),
                    line: line_no,
                    column,
                });
                i += 1;
                continue;
            }
            if c == '"' {
                let mut text = String::new();
                let mut closed = false;
                i += 1;
                while i < chars.len() {
                    match chars[i] {
                        '\\' if i + 1 < chars.len() => {
                            text.push(chars[i + 1]);
                            i += 2;
                        }
                        '"' => {
                            closed = true;
                            i += 1;
                            break;
                        }
                        other => {
                            text.push(other);
                            i += 1;
                        }
                    }
                }
                if !closed {
                    return Err(error_at(
                        lines,
                        line_no,
                        column,
                        "unterminated string literal".to_string(),
                    ));
                }
                tokens.push(Token {
                    kind: TokenKind::Str,
                    text,
                    line: line_no,
                    column,
                });
                continue;
            }
            let start = i;
            while i < chars.len()
                && !chars[i].is_whitespace()
                && !matches!(chars[i], ';' | '"' | '=')
            {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Word,
                text: chars[start..i].iter().collect(),
                line: line_no,
                column,
            });
        }
    }
    Ok(tokens)
}

fn is_opcode_word(text: &str) -> bool {
    text.len() > 2 && text.starts_with("Op") && text.as_bytes()[2].is_ascii_uppercase()
}

struct Encoder<'a> {
    lines: &'a [&'a str],
    tokens: Vec<Token>,
    pos: usize,
    version: ModuleVersion,
    ids: HashMap<String, u32>,
    defined: HashSet<u32>,
    numeric_types: HashMap<u32, NumericType>,
    value_types: HashMap<u32, u32>,
    ext_sets: HashMap<u32, String>,
    words: Vec<u32>,
}

impl<'a> Encoder<'a> {
    fn new(lines: &'a [&'a str], tokens: Vec<Token>, version: ModuleVersion) -> Self {
        Self {
            lines,
            tokens,
            pos: 0,
            version,
            ids: HashMap::new(),
            defined: HashSet::new(),
            numeric_types: HashMap::new(),
            value_types: HashMap::new(),
            ext_sets: HashMap::new(),
            words: Vec::new(),
        }
    }

    fn error(&self, token: &Token, message: String) -> AssemblyError {
        error_at(self.lines, token.line, token.column, message)
    }

    fn is_instruction_start(&self, pos: usize) -> bool {
        let Some(token) = self.tokens.get(pos) else {
            return false;
        };
        if token.kind != TokenKind::Word {
            return false;
        }
        if is_opcode_word(&token.text) {
            return true;
        }
        token.text.starts_with('%')
            && self
                .tokens
                .get(pos + 1)
                .is_some_and(|next| next.kind == TokenKind::Equals)
    }

    /// True when the next token belongs to the current instruction.
    fn at_operand(&self) -> bool {
        self.pos < self.tokens.len() && !self.is_instruction_start(self.pos)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn id_for(&mut self, name: &str) -> u32 {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.ids.len() as u32 + 1;
        self.ids.insert(name.to_string(), id);
        id
    }

    fn next_operand(&mut self, op: &Token, what: &str) -> Result<Token, AssemblyError> {
        if !self.at_operand() {
            return Err(self.error(op, format!("missing {what} operand for {}", op.text)));
        }
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        Ok(token)
    }

    fn expect_id(&mut self, op: &Token, what: &str) -> Result<u32, AssemblyError> {
        let token = self.next_operand(op, what)?;
        self.id_from_token(&token, what)
    }

    fn id_from_token(&mut self, token: &Token, what: &str) -> Result<u32, AssemblyError> {
        match token.text.strip_prefix('%') {
            Some(name) if token.kind == TokenKind::Word && !name.is_empty() => {
                Ok(self.id_for(name))
            }
            _ => Err(self.error(
                token,
                format!("expected {what} id (`%name`), found {:?}", token.text),
            )),
        }
    }

    fn expect_word(&mut self, op: &Token, what: &str) -> Result<Token, AssemblyError> {
        let token = self.next_operand(op, what)?;
        if token.kind != TokenKind::Word {
            return Err(self.error(&token, format!("expected {what}, found {:?}", token.text)));
        }
        Ok(token)
    }

    fn expect_literal(&mut self, op: &Token, what: &str) -> Result<u32, AssemblyError> {
        let token = self.expect_word(op, what)?;
        literal::parse_u32(&token.text).map_err(|msg| self.error(&token, msg))
    }

    fn expect_string(&mut self, op: &Token) -> Result<Vec<u32>, AssemblyError> {
        let token = self.next_operand(op, "literal string")?;
        if token.kind != TokenKind::Str {
            return Err(self.error(
                &token,
                format!("expected a quoted string, found {:?}", token.text),
            ));
        }
        Ok(literal::encode_string(&token.text))
    }

    fn run(&mut self) -> Result<(), AssemblyError> {
        while self.pos < self.tokens.len() {
            let first = self.tokens[self.pos].clone();
            let result = if self.is_instruction_start(self.pos) && !is_opcode_word(&first.text) {
                // `%name = OpX ...`
                self.pos += 2;
                Some(first.clone())
            } else {
                None
            };

            let Some(op_token) = self.peek().cloned() else {
                let anchor = result.as_ref().unwrap_or(&first);
                return Err(self.error(anchor, "expected an instruction after `=`".to_string()));
            };
            if op_token.kind != TokenKind::Word || !is_opcode_word(&op_token.text) {
                return Err(self.error(
                    &op_token,
                    format!("expected an instruction (`Op...`), found {:?}", op_token.text),
                ));
            }
            self.pos += 1;

            let info = grammar::lookup_op(&op_token.text).ok_or_else(|| {
                self.error(&op_token, format!("unknown instruction {}", op_token.text))
            })?;
            if info.since > self.version {
                return Err(self.error(
                    &op_token,
                    format!(
                        "{} requires SPIR-V {} but the module targets {}",
                        op_token.text, info.since, self.version
                    ),
                ));
            }
            self.encode_instruction(info, &op_token, result.as_ref())?;
        }
        Ok(())
    }

    fn encode_instruction(
        &mut self,
        info: &'static OpInfo,
        op: &Token,
        result: Option<&Token>,
    ) -> Result<(), AssemblyError> {
        let has_result = info.operands.contains(&OperandKind::Result);
        match (has_result, result) {
            (true, None) => {
                return Err(self.error(
                    op,
                    format!("{} produces a result; write `%name = {}`", op.text, op.text),
                ))
            }
            (false, Some(token)) => {
                return Err(self.error(
                    token,
                    format!("{} does not produce a result id", op.text),
                ))
            }
            _ => {}
        }
        if let Some(token) = result {
            // The result name is the first id on the line.
            self.id_from_token(token, "result")?;
        }

        let mut inst: Vec<u32> = vec![0];
        let mut result_type: Option<u32> = None;
        let mut result_id: Option<u32> = None;

        for kind in info.operands {
            match *kind {
                OperandKind::ResultType => {
                    let id = self.expect_id(op, "result type")?;
                    result_type = Some(id);
                    inst.push(id);
                }
                OperandKind::Result => {
                    // Checked above: a result-producing instruction always has its token.
                    let Some(token) = result else { continue };
                    let id = self.id_from_token(token, "result")?;
                    if !self.defined.insert(id) {
                        return Err(self.error(
                            token,
                            format!("{} is defined more than once", token.text),
                        ));
                    }
                    result_id = Some(id);
                    inst.push(id);
                }
                OperandKind::Id => {
                    let id = self.expect_id(op, "id")?;
                    inst.push(id);
                }
                OperandKind::OptionalId => {
                    if self.at_operand()
                        && self.peek().is_some_and(|t| t.text.starts_with('%'))
                    {
                        let id = self.expect_id(op, "id")?;
                        inst.push(id);
                    }
                }
                OperandKind::IdList => {
                    while self.at_operand() {
                        let id = self.expect_id(op, "id")?;
                        inst.push(id);
                    }
                }
                OperandKind::LiteralInt => {
                    let value = self.expect_literal(op, "literal integer")?;
                    inst.push(value);
                }
                OperandKind::LiteralIntList => {
                    while self.at_operand() {
                        let value = self.expect_literal(op, "literal integer")?;
                        inst.push(value);
                    }
                }
                OperandKind::LiteralString => {
                    let words = self.expect_string(op)?;
                    inst.extend(words);
                }
                OperandKind::OptionalLiteralString => {
                    if self.at_operand()
                        && self.peek().is_some_and(|t| t.kind == TokenKind::Str)
                    {
                        let words = self.expect_string(op)?;
                        inst.extend(words);
                    }
                }
                OperandKind::ContextNumber => {
                    let token = self.expect_word(op, "numeric literal")?;
                    let ty = result_type
                        .and_then(|id| self.numeric_types.get(&id).copied())
                        .ok_or_else(|| {
                            self.error(
                                &token,
                                format!(
                                    "{} needs a scalar integer or float result type declared earlier",
                                    op.text
                                ),
                            )
                        })?;
                    let words = literal::parse_typed_literal(&token.text, ty)
                        .map_err(|msg| self.error(&token, msg))?;
                    inst.extend(words);
                }
                OperandKind::Enum(enum_kind) => self.encode_enum(enum_kind, op, &mut inst)?,
                OperandKind::Mask(mask_kind) => self.encode_mask(mask_kind, op, &mut inst)?,
                OperandKind::OptionalMask(mask_kind) => {
                    if self.at_operand() {
                        self.encode_mask(mask_kind, op, &mut inst)?;
                    }
                }
                OperandKind::ExtInstOp => {
                    let set = inst.last().copied().unwrap_or_default();
                    let token = self.expect_word(op, "extended instruction")?;
                    let number = match literal::parse_u32(&token.text) {
                        Ok(n) => n,
                        Err(_) => match self.ext_sets.get(&set).map(String::as_str) {
                            Some(grammar::GLSL_STD_450_SET) => {
                                grammar::lookup_glsl_std_450(&token.text).ok_or_else(|| {
                                    self.error(
                                        &token,
                                        format!("unknown GLSL.std.450 instruction {:?}", token.text),
                                    )
                                })?
                            }
                            _ => {
                                return Err(self.error(
                                    &token,
                                    format!(
                                        "extended instruction {:?} must be numeric for this instruction set",
                                        token.text
                                    ),
                                ))
                            }
                        },
                    };
                    inst.push(number);
                }
                OperandKind::SwitchTargets => {
                    let selector = inst.get(1).copied().unwrap_or_default();
                    let ty = self
                        .value_types
                        .get(&selector)
                        .and_then(|ty| self.numeric_types.get(ty))
                        .copied()
                        .unwrap_or(DEFAULT_SELECTOR_TYPE);
                    while self.at_operand() {
                        let token = self.expect_word(op, "case literal")?;
                        let words = literal::parse_typed_literal(&token.text, ty)
                            .map_err(|msg| self.error(&token, msg))?;
                        inst.extend(words);
                        let label = self.expect_id(op, "case label")?;
                        inst.push(label);
                    }
                }
                OperandKind::SpecOpcode => {
                    // The nested opcode may be spelled with or without its `Op` prefix, so it is
                    // read even when it looks like the start of an instruction.
                    let Some(token) = self.peek().cloned() else {
                        return Err(self.error(op, format!("missing opcode operand for {}", op.text)));
                    };
                    self.pos += 1;
                    let nested = grammar::lookup_op(&token.text).ok_or_else(|| {
                        self.error(&token, format!("unknown opcode {:?}", token.text))
                    })?;
                    inst.push(u32::from(nested.opcode));
                }
                OperandKind::IdOrLiteralList => {
                    while self.at_operand() {
                        let token = self.expect_word(op, "id or literal")?;
                        let word = if token.text.starts_with('%') {
                            self.id_from_token(&token, "operand")?
                        } else {
                            literal::parse_u32(&token.text)
                                .map_err(|msg| self.error(&token, msg))?
                        };
                        inst.push(word);
                    }
                }
            }
        }

        if self.at_operand() {
            let extra = self.tokens[self.pos].clone();
            return Err(self.error(
                &extra,
                format!("unexpected operand {:?} for {}", extra.text, op.text),
            ));
        }

        let word_count = inst.len();
        if word_count > usize::from(u16::MAX) {
            return Err(self.error(op, format!("{} is too long ({word_count} words)", op.text)));
        }
        inst[0] = ((word_count as u32) << 16) | u32::from(info.opcode);
        self.record_types(info, &inst, result_id, result_type);
        self.words.extend_from_slice(&inst);
        Ok(())
    }

    fn record_types(
        &mut self,
        info: &OpInfo,
        inst: &[u32],
        result_id: Option<u32>,
        result_type: Option<u32>,
    ) {
        let opcode = info.opcode;
        if opcode == spirv::Op::TypeInt as u16 && inst.len() >= 4 {
            self.numeric_types.insert(
                inst[1],
                NumericType::Int {
                    width: inst[2],
                    signed: inst[3] != 0,
                },
            );
        } else if opcode == spirv::Op::TypeFloat as u16 && inst.len() >= 3 {
            self.numeric_types
                .insert(inst[1], NumericType::Float { width: inst[2] });
        } else if opcode == spirv::Op::ExtInstImport as u16 && inst.len() >= 3 {
            if let Some((name, _)) = literal::decode_string(&inst[2..]) {
                self.ext_sets.insert(inst[1], name);
            }
        }
        if let (Some(id), Some(ty)) = (result_id, result_type) {
            self.value_types.insert(id, ty);
        }
    }

    fn encode_enum(
        &mut self,
        kind: EnumKind,
        op: &Token,
        inst: &mut Vec<u32>,
    ) -> Result<(), AssemblyError> {
        let token = self.expect_word(op, "enumerant")?;
        let enumerant = match literal::parse_u32(&token.text) {
            Ok(value) => {
                inst.push(value);
                grammar::lookup_enumerant_value(kind, value)
            }
            Err(_) => {
                let enumerant = grammar::lookup_enumerant(kind, &token.text).ok_or_else(|| {
                    self.error(
                        &token,
                        format!("unknown {kind:?} enumerant {:?}", token.text),
                    )
                })?;
                inst.push(enumerant.value);
                Some(enumerant)
            }
        };
        if let Some(enumerant) = enumerant {
            self.encode_params(enumerant.params, op, inst)?;
        }
        Ok(())
    }

    fn encode_mask(
        &mut self,
        kind: MaskKind,
        op: &Token,
        inst: &mut Vec<u32>,
    ) -> Result<(), AssemblyError> {
        let token = self.expect_word(op, "mask")?;
        let bits = grammar::mask_bits(kind);
        let mut mask = 0u32;
        for part in token.text.split('|') {
            let value = match literal::parse_u32(part) {
                Ok(value) => value,
                Err(_) => bits
                    .iter()
                    .find(|bit| bit.name == part)
                    .map(|bit| bit.value)
                    .ok_or_else(|| {
                        self.error(&token, format!("unknown {kind:?} bit {part:?}"))
                    })?,
            };
            mask |= value;
        }
        inst.push(mask);
        // Parameters follow in ascending bit order.
        for bit in bits {
            if bit.value != 0 && mask & bit.value == bit.value && !bit.params.is_empty() {
                self.encode_params(bit.params, op, inst)?;
            }
        }
        Ok(())
    }

    fn encode_params(
        &mut self,
        params: &[Param],
        op: &Token,
        inst: &mut Vec<u32>,
    ) -> Result<(), AssemblyError> {
        for param in params {
            match *param {
                Param::Literal => {
                    let value = self.expect_literal(op, "literal integer")?;
                    inst.push(value);
                }
                Param::Id => {
                    let id = self.expect_id(op, "id")?;
                    inst.push(id);
                }
                Param::Enum(kind) => self.encode_enum(kind, op, inst)?,
                Param::String => {
                    let words = self.expect_string(op)?;
                    inst.extend(words);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body(module: &BinaryModule) -> &[u32] {
        &module.words()[5..]
    }

    #[test]
    fn header_carries_version_and_bound() {
        let module = assemble(
            "OpCapability Shader\nOpMemoryModel Logical GLSL450\n%void = OpTypeVoid\n",
            ModuleVersion::V1_3,
        )
        .unwrap();
        let words = module.words();
        assert_eq!(&words[..5], &[MAGIC, 0x0001_0300, GENERATOR_MAGIC, 2, 0]);
        assert_eq!(
            body(&module),
            &[
                (2 << 16) | 17,
                1,
                (3 << 16) | 14,
                0,
                1,
                (2 << 16) | 19,
                1
            ]
        );
    }

    #[test]
    fn ids_are_numbered_by_first_appearance_including_forward_references() {
        let module = assemble(
            "OpEntryPoint GLCompute %main \"main\" %gid\n\
             %void = OpTypeVoid\n\
             %main = OpFunction %void None %fn\n",
            ModuleVersion::V1_0,
        )
        .unwrap();
        // %main = 1, %gid = 2, %void = 3, %fn = 4.
        assert_eq!(module.bound(), 5);
        let entry = &body(&module)[..6];
        assert_eq!(entry[0] >> 16, 6);
        assert_eq!(entry[1], 5);
        assert_eq!(entry[2], 1);
        assert_eq!(entry[5], 2);
    }

    #[test]
    fn constants_follow_their_result_type() {
        let module = assemble(
            "%i16 = OpTypeInt 16 1\n\
             %f64 = OpTypeFloat 64\n\
             %a = OpConstant %i16 -1\n\
             %b = OpConstant %f64 1.0\n",
            ModuleVersion::V1_0,
        )
        .unwrap();
        let words = body(&module);
        // OpTypeInt(4) + OpTypeFloat(3), then OpConstant i16.
        assert_eq!(&words[7..11], &[(4 << 16) | 43, 1, 3, 0xffff_ffff]);
        let bits = 1.0f64.to_bits();
        assert_eq!(
            &words[11..],
            &[(5 << 16) | 43, 2, 4, bits as u32, (bits >> 32) as u32]
        );
    }

    #[test]
    fn enumerant_parameters_and_masks_are_encoded() {
        let module = assemble(
            "OpDecorate %x BuiltIn GlobalInvocationId\n\
             OpExecutionMode %main LocalSize 64 1 1\n\
             OpStore %p %v Volatile|Aligned 4\n",
            ModuleVersion::V1_0,
        )
        .unwrap();
        let words = body(&module);
        assert_eq!(&words[..4], &[(4 << 16) | 71, 1, 11, 28]);
        assert_eq!(&words[4..10], &[(6 << 16) | 16, 2, 17, 64, 1, 1]);
        assert_eq!(&words[10..], &[(5 << 16) | 62, 3, 4, 3, 4]);
    }

    #[test]
    fn glsl_extended_instructions_resolve_by_name() {
        let module = assemble(
            "%ext = OpExtInstImport \"GLSL.std.450\"\n\
             %r = OpExtInst %f32 %ext FAbs %x\n",
            ModuleVersion::V1_0,
        )
        .unwrap();
        let words = body(&module);
        let ext_inst = &words[words.len() - 6..];
        assert_eq!(ext_inst[0], (6 << 16) | 12);
        assert_eq!(ext_inst[4], 4);
    }

    #[test]
    fn switch_targets_use_selector_width() {
        let module = assemble(
            "%u64 = OpTypeInt 64 0\n\
             %sel = OpUndef %u64\n\
             OpSwitch %sel %default 5 %five\n",
            ModuleVersion::V1_0,
        )
        .unwrap();
        let words = body(&module);
        let switch = &words[7..];
        assert_eq!(switch, &[(6 << 16) | 251, 2, 3, 5, 0, 4]);
    }

    #[test]
    fn spec_constant_op_takes_a_nested_opcode() {
        let module = assemble(
            "%r = OpSpecConstantOp %i32 IAdd %a %b\n",
            ModuleVersion::V1_0,
        )
        .unwrap();
        assert_eq!(body(&module), &[(6 << 16) | 52, 2, 1, 128, 3, 4]);
    }

    #[test]
    fn opcode_like_enumerants_do_not_start_instructions() {
        let module = assemble("OpMemoryModel Logical OpenCL\n", ModuleVersion::V1_0).unwrap();
        assert_eq!(body(&module), &[(3 << 16) | 14, 0, 2]);
    }

    #[test]
    fn errors_carry_line_and_column() {
        let err = assemble(
            "OpCapability Shader\n  %x = OpBogus %y\n",
            ModuleVersion::V1_0,
        )
        .unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 8);
        assert_eq!(err.source_line, "  %x = OpBogus %y");
        assert!(err.message.contains("OpBogus"), "{}", err.message);
    }

    #[test]
    fn missing_and_extra_operands_are_rejected() {
        let err = assemble("%t = OpTypeInt 32\n", ModuleVersion::V1_0).unwrap_err();
        assert!(err.message.contains("missing"), "{}", err.message);
        let err = assemble("OpCapability Shader Kernel\n", ModuleVersion::V1_0).unwrap_err();
        assert!(err.message.contains("unexpected operand"), "{}", err.message);
    }

    #[test]
    fn newer_instructions_are_gated_by_version() {
        let err = assemble("OpModuleProcessed \"x\"\n", ModuleVersion::V1_0).unwrap_err();
        assert!(err.message.contains("requires SPIR-V 1.1"), "{}", err.message);
        assert!(assemble("OpModuleProcessed \"x\"\n", ModuleVersion::V1_1).is_ok());
    }

    #[test]
    fn unsupported_target_versions_are_rejected() {
        let err = assemble("", ModuleVersion::new(1, 7)).unwrap_err();
        assert_eq!(err.line, 0);
    }

    #[test]
    fn duplicate_definitions_are_rejected() {
        let err = assemble("%a = OpTypeVoid\n%a = OpTypeBool\n", ModuleVersion::V1_0).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn strings_support_escapes_and_comments_are_ignored() {
        let module = assemble(
            "OpSourceExtension \"a\\\"b\" ; trailing comment\n; full line comment\n",
            ModuleVersion::V1_0,
        )
        .unwrap();
        assert_eq!(module.string_literals(), vec!["a\"b".to_string()]);
    }

    #[test]
    fn dangling_result_name_points_at_the_name() {
        let err = assemble("OpCapability Shader\n   %x =\n", ModuleVersion::V1_0).unwrap_err();
        assert_eq!((err.line, err.column), (2, 4));
        assert!(err.message.contains("after `=`"), "{}", err.message);
    }
}
