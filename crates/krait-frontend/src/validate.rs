//! Structural validation of parser output.
//!
//! The parser is an external collaborator; these checks enforce the contract
//! it must honor before the tree enters lowering. Violations are programmer
//! errors in the parser, not user errors in the compiled program.

use crate::ast::{DisplayItem, ExprAst, ModuleAst, StmtAst};
use crate::errors::{FrontendError, SourceLocation};

/// Checks a module against the parser contract.
///
/// Rejects empty or non-identifier assignment targets, non-finite float
/// literals (no source literal produces NaN or infinity), and unknown
/// source locations on parsed constructs.
pub fn validate_module(module: &ModuleAst) -> Result<(), FrontendError> {
    if module.name.is_empty() {
        return Err(FrontendError::malformed(
            "module name must not be empty",
            SourceLocation::UNKNOWN,
        ));
    }
    validate_block(&module.body)
}

fn validate_block(body: &[StmtAst]) -> Result<(), FrontendError> {
    for stmt in body {
        validate_stmt(stmt)?;
    }
    Ok(())
}

fn validate_stmt(stmt: &StmtAst) -> Result<(), FrontendError> {
    match stmt {
        StmtAst::Assign {
            target,
            value,
            location,
        }
        | StmtAst::AugAssign {
            target,
            value,
            location,
            ..
        } => {
            validate_target(target, *location)?;
            validate_expr(value)
        }
        StmtAst::Expr { value, .. } => validate_expr(value),
        StmtAst::If {
            test,
            body,
            orelse,
            location,
        } => {
            validate_expr(test)?;
            if body.is_empty() {
                return Err(FrontendError::malformed(
                    "if statement requires a non-empty body",
                    *location,
                ));
            }
            validate_block(body)?;
            validate_block(orelse)
        }
        StmtAst::While {
            test,
            body,
            location,
        } => {
            validate_expr(test)?;
            if body.is_empty() {
                return Err(FrontendError::malformed(
                    "while statement requires a non-empty body",
                    *location,
                ));
            }
            validate_block(body)
        }
        StmtAst::Return { value, .. } => match value {
            Some(expr) => validate_expr(expr),
            None => Ok(()),
        },
        StmtAst::Pass { .. } => Ok(()),
    }
}

fn validate_target(target: &str, location: SourceLocation) -> Result<(), FrontendError> {
    if !is_identifier(target) {
        return Err(FrontendError::malformed(
            format!("assignment target '{}' is not an identifier", target),
            location,
        ));
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn validate_expr(expr: &ExprAst) -> Result<(), FrontendError> {
    match expr {
        ExprAst::Float { value, location } => {
            if !value.is_finite() {
                return Err(FrontendError::malformed(
                    "float literal must be finite",
                    *location,
                ));
            }
            Ok(())
        }
        ExprAst::Name { id, location } => {
            if !is_identifier(id) {
                return Err(FrontendError::malformed(
                    format!("name '{}' is not an identifier", id),
                    *location,
                ));
            }
            Ok(())
        }
        ExprAst::Int { .. }
        | ExprAst::Str { .. }
        | ExprAst::Bytes { .. }
        | ExprAst::Bool { .. }
        | ExprAst::NoneLiteral { .. } => Ok(()),
        ExprAst::Unary { operand, .. } => validate_expr(operand),
        ExprAst::Binary { left, right, .. }
        | ExprAst::Compare { left, right, .. }
        | ExprAst::BoolChain { left, right, .. } => {
            validate_expr(left)?;
            validate_expr(right)
        }
        ExprAst::Call { func, args, .. } => {
            validate_expr(func)?;
            for arg in args {
                validate_expr(arg)?;
            }
            Ok(())
        }
        ExprAst::Attribute {
            value,
            attr,
            location,
        } => {
            if !is_identifier(attr) {
                return Err(FrontendError::malformed(
                    format!("attribute '{}' is not an identifier", attr),
                    *location,
                ));
            }
            validate_expr(value)
        }
        ExprAst::Subscript { value, index, .. } => {
            validate_expr(value)?;
            validate_expr(index)
        }
        ExprAst::List { elements, .. }
        | ExprAst::Tuple { elements, .. }
        | ExprAst::Set { elements, .. } => {
            for element in elements {
                match element {
                    DisplayItem::Plain(expr) | DisplayItem::Starred(expr) => validate_expr(expr)?,
                }
            }
            Ok(())
        }
        ExprAst::Dict { entries, .. } => {
            for (key, value) in entries {
                validate_expr(key)?;
                validate_expr(value)?;
            }
            Ok(())
        }
        ExprAst::Conditional {
            test, body, orelse, ..
        } => {
            validate_expr(test)?;
            validate_expr(body)?;
            validate_expr(orelse)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    fn int(v: i64) -> ExprAst {
        ExprAst::Int {
            value: BigInt::from(v),
            location: loc(),
        }
    }

    #[test]
    fn accepts_simple_module() {
        let module = ModuleAst {
            name: "m".into(),
            body: vec![StmtAst::Assign {
                target: "x".into(),
                value: int(1),
                location: loc(),
            }],
        };
        assert!(validate_module(&module).is_ok());
    }

    #[test]
    fn rejects_non_identifier_target() {
        let module = ModuleAst {
            name: "m".into(),
            body: vec![StmtAst::Assign {
                target: "1bad".into(),
                value: int(1),
                location: loc(),
            }],
        };
        assert!(validate_module(&module).is_err());
    }

    #[test]
    fn rejects_non_finite_float_literal() {
        let module = ModuleAst {
            name: "m".into(),
            body: vec![StmtAst::Expr {
                value: ExprAst::Float {
                    value: f64::INFINITY,
                    location: loc(),
                },
                location: loc(),
            }],
        };
        assert!(validate_module(&module).is_err());
    }

    #[test]
    fn rejects_empty_loop_body() {
        let module = ModuleAst {
            name: "m".into(),
            body: vec![StmtAst::While {
                test: int(1),
                body: vec![],
                location: loc(),
            }],
        };
        assert!(validate_module(&module).is_err());
    }
}
