//! Scorers: compiled, callable scoring bodies

use crate::errors::{ScoreError, ScoreResult};
use hyperscore_dsl::{DslError, Program};
use hyperscore_types::{Attributes, Parameters};
use std::sync::Arc;

/// A callable `(attributes, parameters) -> score`
pub trait Scorer: Send + Sync + std::fmt::Debug {
    fn score(&self, attributes: &Attributes, parameters: &Parameters) -> ScoreResult<f64>;
}

/// Scorer backed by a compiled scoring body
#[derive(Debug)]
pub struct ScriptScorer {
    program: Program,
}

impl ScriptScorer {
    pub fn new(program: Program) -> Self {
        Self { program }
    }
}

impl Scorer for ScriptScorer {
    fn score(&self, attributes: &Attributes, parameters: &Parameters) -> ScoreResult<f64> {
        let score = self.program.run(attributes, parameters)?;
        if score.is_finite() {
            Ok(score)
        } else {
            Err(ScoreError::NonFinite(score))
        }
    }
}

/// Scorer that ignores its inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantScorer(pub f64);

impl Scorer for ConstantScorer {
    fn score(&self, _attributes: &Attributes, _parameters: &Parameters) -> ScoreResult<f64> {
        Ok(self.0)
    }
}

/// Score of a body with no statements: every element passing the rule's
/// filters matches.
pub const EMPTY_BODY_SCORE: f64 = 1.0;

/// Score of a body that failed to compile
pub const DEGRADED_SCORE: f64 = 0.0;

/// Outcome of compiling a scoring body
#[derive(Debug, Clone)]
pub struct CompiledScorer {
    pub scorer: Arc<dyn Scorer>,
    /// Set when compilation failed and `scorer` is the degraded fallback
    pub error: Option<DslError>,
}

impl CompiledScorer {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Compile a scoring body.
///
/// Never fails: a body that does not compile yields a constant
/// [`DEGRADED_SCORE`] scorer and carries the compile error for the caller
/// to report.
pub fn compile(body: &str) -> CompiledScorer {
    match Program::compile(body) {
        Ok(program) if program.is_empty() => CompiledScorer {
            scorer: Arc::new(ConstantScorer(EMPTY_BODY_SCORE)),
            error: None,
        },
        Ok(program) => CompiledScorer {
            scorer: Arc::new(ScriptScorer::new(program)),
            error: None,
        },
        Err(error) => CompiledScorer {
            scorer: Arc::new(ConstantScorer(DEGRADED_SCORE)),
            error: Some(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_compile_script() {
        let compiled = compile("return attrs['x'] * 2");
        assert!(!compiled.is_degraded());
        let score = compiled
            .scorer
            .score(&attrs(json!({"x": 3})), &Parameters::new())
            .unwrap();
        assert_eq!(score, 6.0);
    }

    #[test]
    fn test_empty_body_matches_everything() {
        for body in ["", "   \n", "# just a comment"] {
            let compiled = compile(body);
            assert!(!compiled.is_degraded());
            assert_eq!(
                compiled.scorer.score(&Attributes::new(), &Parameters::new()),
                Ok(EMPTY_BODY_SCORE)
            );
        }
    }

    #[test]
    fn test_compile_failure_degrades() {
        let compiled = compile("return (");
        assert!(compiled.is_degraded());
        assert_eq!(
            compiled.scorer.score(&Attributes::new(), &Parameters::new()),
            Ok(DEGRADED_SCORE)
        );
    }

    #[test]
    fn test_non_finite_is_an_error() {
        let compiled = compile("return attrs['x'] * 1e308 * 10");
        let result = compiled
            .scorer
            .score(&attrs(json!({"x": 1})), &Parameters::new());
        assert!(matches!(result, Err(ScoreError::NonFinite(_))));
    }
}
