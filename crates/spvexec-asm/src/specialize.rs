//! Rewrites `OpSpecConstant*` default values in a binary module.

use std::collections::HashMap;

use tracing::debug;

use crate::binary::BinaryModule;

/// Decoration number of `SpecId`.
const DECORATION_SPEC_ID: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecValue {
    Bool(bool),
    /// Literal words, encoded like an `OpConstant` of the constant's type.
    Words(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecConstant {
    pub spec_id: u32,
    pub value: SpecValue,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecializeError {
    #[error("SpecId {spec_id}: constant takes {expected} literal word(s), value has {provided}")]
    WidthMismatch {
        spec_id: u32,
        expected: usize,
        provided: usize,
    },
    #[error("SpecId {spec_id}: a {provided} value cannot specialize a {expected} spec constant")]
    TypeMismatch {
        spec_id: u32,
        expected: &'static str,
        provided: &'static str,
    },
}

enum Edit {
    Opcode { offset: usize, opcode: u16 },
    Literal { offset: usize, words: Vec<u32> },
}

/// Returns a copy of `module` with the defaults of matching spec constants replaced.
///
/// Values whose `SpecId` does not decorate any spec constant are ignored.
pub fn specialize(
    module: &BinaryModule,
    values: &[SpecConstant],
) -> Result<BinaryModule, SpecializeError> {
    if values.is_empty() {
        return Ok(module.clone());
    }

    let spec_ids: HashMap<u32, u32> = module
        .instructions()
        .filter(|inst| inst.is(spirv::Op::Decorate))
        .filter_map(|inst| match inst.operands {
            [target, DECORATION_SPEC_ID, spec_id, ..] => Some((*target, *spec_id)),
            _ => None,
        })
        .collect();
    let by_spec_id: HashMap<u32, &SpecValue> =
        values.iter().map(|v| (v.spec_id, &v.value)).collect();

    let mut edits = Vec::new();
    let mut applied = 0usize;
    for inst in module.instructions() {
        let is_bool = inst.is(spirv::Op::SpecConstantTrue) || inst.is(spirv::Op::SpecConstantFalse);
        let is_scalar = inst.is(spirv::Op::SpecConstant);
        if !(is_bool || is_scalar) || inst.operands.len() < 2 {
            continue;
        }
        let Some(spec_id) = spec_ids.get(&inst.operands[1]).copied() else {
            continue;
        };
        let Some(value) = by_spec_id.get(&spec_id) else {
            continue;
        };
        applied += 1;
        match (is_bool, value) {
            (true, SpecValue::Bool(b)) => {
                let op = if *b {
                    spirv::Op::SpecConstantTrue
                } else {
                    spirv::Op::SpecConstantFalse
                };
                edits.push(Edit::Opcode {
                    offset: inst.offset,
                    opcode: op as u16,
                });
            }
            (true, SpecValue::Words(_)) => {
                return Err(SpecializeError::TypeMismatch {
                    spec_id,
                    expected: "boolean",
                    provided: "numeric",
                })
            }
            (false, SpecValue::Bool(_)) => {
                return Err(SpecializeError::TypeMismatch {
                    spec_id,
                    expected: "numeric",
                    provided: "boolean",
                })
            }
            (false, SpecValue::Words(words)) => {
                let expected = inst.operands.len() - 2;
                if words.len() != expected {
                    return Err(SpecializeError::WidthMismatch {
                        spec_id,
                        expected,
                        provided: words.len(),
                    });
                }
                // Header word + result type + result id.
                edits.push(Edit::Literal {
                    offset: inst.offset + 3,
                    words: words.clone(),
                });
            }
        }
    }

    if applied < values.len() {
        debug!(
            provided = values.len(),
            applied, "some specialization values matched no spec constant"
        );
    }

    let mut out = module.clone();
    let words = out.words_mut();
    for edit in edits {
        match edit {
            Edit::Opcode { offset, opcode } => {
                words[offset] = (words[offset] & 0xffff_0000) | u32::from(opcode);
            }
            Edit::Literal { offset, words: lit } => {
                words[offset..offset + lit.len()].copy_from_slice(&lit);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::version::ModuleVersion;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "OpDecorate %flag SpecId 0\n\
                          OpDecorate %scale SpecId 1\n\
                          OpDecorate %wide SpecId 2\n\
                          %bool = OpTypeBool\n\
                          %i32 = OpTypeInt 32 1\n\
                          %u64 = OpTypeInt 64 0\n\
                          %flag = OpSpecConstantFalse %bool\n\
                          %scale = OpSpecConstant %i32 7\n\
                          %wide = OpSpecConstant %u64 1\n";

    fn find(module: &BinaryModule, result: u32) -> (u16, Vec<u32>) {
        module
            .instructions()
            .find(|inst| (48..=50).contains(&inst.opcode) && inst.operands.get(1) == Some(&result))
            .map(|inst| (inst.opcode, inst.operands[2..].to_vec()))
            .unwrap()
    }

    #[test]
    fn replaces_matching_defaults() {
        let module = assemble(SOURCE, ModuleVersion::V1_0).unwrap();
        let out = specialize(
            &module,
            &[
                SpecConstant {
                    spec_id: 0,
                    value: SpecValue::Bool(true),
                },
                SpecConstant {
                    spec_id: 1,
                    value: SpecValue::Words(vec![(-3i32) as u32]),
                },
                SpecConstant {
                    spec_id: 2,
                    value: SpecValue::Words(vec![0x89ab_cdef, 0x0123_4567]),
                },
            ],
        )
        .unwrap();
        // %flag = 1, %scale = 2, %wide = 3 by first appearance.
        assert_eq!(find(&out, 1), (spirv::Op::SpecConstantTrue as u16, vec![]));
        assert_eq!(find(&out, 2), (spirv::Op::SpecConstant as u16, vec![0xffff_fffd]));
        assert_eq!(
            find(&out, 3),
            (spirv::Op::SpecConstant as u16, vec![0x89ab_cdef, 0x0123_4567])
        );
        assert_eq!(out.words().len(), module.words().len());
    }

    #[test]
    fn unmatched_ids_are_ignored() {
        let module = assemble(SOURCE, ModuleVersion::V1_0).unwrap();
        let out = specialize(
            &module,
            &[SpecConstant {
                spec_id: 42,
                value: SpecValue::Words(vec![1]),
            }],
        )
        .unwrap();
        assert_eq!(out, module);
    }

    #[test]
    fn width_and_type_mismatches_are_errors() {
        let module = assemble(SOURCE, ModuleVersion::V1_0).unwrap();
        let err = specialize(
            &module,
            &[SpecConstant {
                spec_id: 2,
                value: SpecValue::Words(vec![1]),
            }],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SpecializeError::WidthMismatch {
                spec_id: 2,
                expected: 2,
                provided: 1
            }
        );
        let err = specialize(
            &module,
            &[SpecConstant {
                spec_id: 0,
                value: SpecValue::Words(vec![1]),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, SpecializeError::TypeMismatch { spec_id: 0, .. }));
    }
}
