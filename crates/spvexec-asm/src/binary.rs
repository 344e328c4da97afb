use crate::literal::decode_string;
use crate::version::ModuleVersion;

/// First word of every SPIR-V module.
pub const MAGIC: u32 = 0x0723_0203;

/// Number of words in the module header.
pub const HEADER_WORDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BinaryError {
    #[error("SPIR-V byte length {0} is not a multiple of 4")]
    UnalignedLength(usize),
    #[error("SPIR-V module is {0} words long; the header alone needs 5")]
    TruncatedHeader(usize),
    #[error("bad SPIR-V magic {0:#010x}")]
    BadMagic(u32),
    #[error("instruction at word {offset} has a zero word count")]
    ZeroWordCount { offset: usize },
    #[error("instruction at word {offset} claims {word_count} words but only {remaining} remain")]
    TruncatedInstruction {
        offset: usize,
        word_count: usize,
        remaining: usize,
    },
}

/// A SPIR-V binary module: header plus instruction stream, in host word order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryModule {
    words: Vec<u32>,
}

/// One instruction of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    /// Word offset of the instruction from the start of the module.
    pub offset: usize,
    pub opcode: u16,
    pub operands: &'a [u32],
}

impl Instruction<'_> {
    pub fn is(&self, op: spirv::Op) -> bool {
        self.opcode == op as u16
    }
}

/// Entry point declared by `OpEntryPoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub execution_model: u32,
    pub function: u32,
    pub name: String,
}

impl BinaryModule {
    /// Wraps words produced by the assembler, whose layout is valid by construction.
    pub(crate) fn from_assembled(words: Vec<u32>) -> Self {
        Self { words }
    }

    /// Validates the header and instruction framing of `words`.
    pub fn from_words(words: Vec<u32>) -> Result<Self, BinaryError> {
        if words.len() < HEADER_WORDS {
            return Err(BinaryError::TruncatedHeader(words.len()));
        }
        if words[0] != MAGIC {
            return Err(BinaryError::BadMagic(words[0]));
        }
        let mut offset = HEADER_WORDS;
        while offset < words.len() {
            let word_count = (words[offset] >> 16) as usize;
            if word_count == 0 {
                return Err(BinaryError::ZeroWordCount { offset });
            }
            let remaining = words.len() - offset;
            if word_count > remaining {
                return Err(BinaryError::TruncatedInstruction {
                    offset,
                    word_count,
                    remaining,
                });
            }
            offset += word_count;
        }
        Ok(Self { words })
    }

    /// Parses little-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BinaryError> {
        if bytes.len() % 4 != 0 {
            return Err(BinaryError::UnalignedLength(bytes.len()));
        }
        let words = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::from_words(words)
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn version(&self) -> ModuleVersion {
        ModuleVersion::from_word(self.words[1])
    }

    pub fn generator(&self) -> u32 {
        self.words[2]
    }

    pub fn bound(&self) -> u32 {
        self.words[3]
    }

    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            words: &self.words,
            offset: HEADER_WORDS,
        }
    }

    /// Literal strings carried by debug and mode-setting instructions, in stream order.
    pub fn string_literals(&self) -> Vec<String> {
        self.instructions()
            .filter_map(|inst| {
                let index = string_operand_index(&inst)?;
                let operands = inst.operands.get(index..)?;
                decode_string(operands).map(|(s, _)| s)
            })
            .collect()
    }

    pub fn entry_points(&self) -> Vec<EntryPoint> {
        self.instructions()
            .filter(|inst| inst.is(spirv::Op::EntryPoint) && inst.operands.len() >= 3)
            .filter_map(|inst| {
                let (name, _) = decode_string(&inst.operands[2..])?;
                Some(EntryPoint {
                    execution_model: inst.operands[0],
                    function: inst.operands[1],
                    name,
                })
            })
            .collect()
    }

    /// Callers must keep instruction framing intact.
    pub(crate) fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }
}

fn string_operand_index(inst: &Instruction<'_>) -> Option<usize> {
    use spirv::Op;
    let index = match inst.opcode {
        op if op == Op::String as u16 => 1,
        op if op == Op::Name as u16 => 1,
        op if op == Op::MemberName as u16 => 2,
        op if op == Op::Extension as u16 => 0,
        op if op == Op::ExtInstImport as u16 => 1,
        op if op == Op::SourceExtension as u16 => 0,
        op if op == Op::ModuleProcessed as u16 => 0,
        op if op == Op::EntryPoint as u16 => 2,
        // OpSource: language, version, optional file id, optional source text.
        op if op == Op::Source as u16 && inst.operands.len() > 3 => 3,
        _ => return None,
    };
    Some(index)
}

pub struct Instructions<'a> {
    words: &'a [u32],
    offset: usize,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = *self.words.get(self.offset)?;
        let word_count = (first >> 16) as usize;
        let end = self.offset.checked_add(word_count)?;
        if word_count == 0 || end > self.words.len() {
            return None;
        }
        let inst = Instruction {
            offset: self.offset,
            opcode: (first & 0xffff) as u16,
            operands: &self.words[self.offset + 1..end],
        };
        self.offset = end;
        Some(inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_bad_headers_and_framing() {
        assert_eq!(
            BinaryModule::from_bytes(&[0, 1, 2]),
            Err(BinaryError::UnalignedLength(3))
        );
        assert_eq!(
            BinaryModule::from_words(vec![MAGIC, 0, 0]),
            Err(BinaryError::TruncatedHeader(3))
        );
        assert_eq!(
            BinaryModule::from_words(vec![0xdead_beef, 0, 0, 1, 0]),
            Err(BinaryError::BadMagic(0xdead_beef))
        );
        assert_eq!(
            BinaryModule::from_words(vec![MAGIC, 0x0001_0000, 0, 1, 0, (3 << 16) | 17, 1]),
            Err(BinaryError::TruncatedInstruction {
                offset: 5,
                word_count: 3,
                remaining: 2
            })
        );
    }

    #[test]
    fn bytes_round_trip_through_words() {
        let module = assemble("OpCapability Shader\n", ModuleVersion::V1_2).unwrap();
        let reparsed = BinaryModule::from_bytes(&module.to_bytes()).unwrap();
        assert_eq!(reparsed, module);
        assert_eq!(reparsed.version(), ModuleVersion::V1_2);
    }

    #[test]
    fn string_literals_are_listed_in_stream_order() {
        let module = assemble(
            "OpCapability Shader\n\
             OpExtension \"SPV_KHR_storage_buffer_storage_class\"\n\
             %ext = OpExtInstImport \"GLSL.std.450\"\n\
             OpMemoryModel Logical GLSL450\n\
             OpEntryPoint GLCompute %main \"main\"\n\
             OpSource GLSL 450 %file \"void main() {}\"\n\
             %file = OpString \"shader.comp\"\n\
             OpName %main \"main_fn\"\n\
             OpModuleProcessed \"opt\"\n",
            ModuleVersion::V1_1,
        )
        .unwrap();
        assert_eq!(
            module.string_literals(),
            vec![
                "SPV_KHR_storage_buffer_storage_class",
                "GLSL.std.450",
                "main",
                "void main() {}",
                "shader.comp",
                "main_fn",
                "opt",
            ]
        );
        let entries = module.entry_points();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "main");
        assert_eq!(entries[0].execution_model, 5);
    }
}
