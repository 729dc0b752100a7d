// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin precondition evaluation.
//!
//! A precondition is a mapping from operator to operand list, e.g.
//! `{"StringEquals": ["platformType", "Linux"]}`. Only `StringEquals` on
//! `platformType` is defined; every listed operator must hold for the
//! plugin to run.

use steward_core::document::Precondition;

const OPERATOR_STRING_EQUALS: &str = "StringEquals";
const VARIABLE_PLATFORM_TYPE: &str = "platformType";

/// Host facts preconditions can reference.
#[derive(Debug, Clone)]
pub struct PlatformContext {
    /// `Linux`, `Windows`, or `MacOS`
    pub platform_type: String,
}

impl PlatformContext {
    pub fn current() -> Self {
        let platform_type = if cfg!(target_os = "windows") {
            "Windows"
        } else if cfg!(target_os = "macos") {
            "MacOS"
        } else {
            "Linux"
        };
        Self {
            platform_type: platform_type.to_string(),
        }
    }
}

/// Evaluate a precondition against the host platform.
///
/// Returns `Ok(false)` when any clause does not hold; malformed clauses
/// (unknown operator, wrong operand count, no resolvable variable) are
/// errors so the engine can fail the plugin with a message rather than
/// silently running it.
pub fn evaluate_precondition(
    precondition: &Precondition,
    platform: &PlatformContext,
) -> Result<bool, String> {
    for (operator, operands) in &precondition.0 {
        if operator != OPERATOR_STRING_EQUALS {
            return Err(format!("unsupported precondition operator: {}", operator));
        }
        if operands.len() != 2 {
            return Err(format!(
                "operator {} expects 2 operands, got {}",
                operator,
                operands.len()
            ));
        }

        let resolved: Vec<String> = operands.iter().map(|op| resolve(op, platform)).collect();
        if !operands.iter().any(|op| op == VARIABLE_PLATFORM_TYPE) {
            return Err(format!(
                "precondition references no known variable: {:?}",
                operands
            ));
        }

        if resolved[0] != resolved[1] {
            return Ok(false);
        }
    }
    Ok(true)
}

fn resolve(operand: &str, platform: &PlatformContext) -> String {
    if operand == VARIABLE_PLATFORM_TYPE {
        platform.platform_type.clone()
    } else {
        operand.to_string()
    }
}

#[cfg(test)]
#[path = "precondition_tests.rs"]
mod tests;
