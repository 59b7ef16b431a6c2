use rand::seq::IteratorRandom;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{DrillConfig, OperandRange, Operation};
use crate::error::DrillError;

/// A single problem. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: u64,
    pub prompt: String,
    pub answer: i64,
}

impl Question {
    pub fn new(id: u64, prompt: impl Into<String>, answer: i64) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            answer,
        }
    }
}

/// Source of problems for a run
pub trait QuestionProvider: Send {
    fn request(&self, config: &DrillConfig) -> Result<Question, DrillError>;
}

/// Local provider drawing operands uniformly from the configured ranges.
/// Subtraction and division are presented as inverses of addition and
/// multiplication so answers stay whole and non-negative for sane ranges.
#[derive(Debug, Default)]
pub struct RandomQuestionProvider {
    next_id: AtomicU64,
}

impl RandomQuestionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate<R: Rng>(
        &self,
        config: &DrillConfig,
        rng: &mut R,
    ) -> Result<Question, DrillError> {
        config.validate()?;
        let op = config
            .operations
            .iter()
            .copied()
            .choose(rng)
            .ok_or_else(|| DrillError::ProviderUnavailable("no operations enabled".into()))?;
        let r = &config.ranges;
        let (prompt, answer) = match op {
            Operation::Add => {
                let (a, b) = (sample(rng, r.add_a), sample(rng, r.add_b));
                (format!("{a} + {b}"), checked(a.checked_add(b))?)
            }
            Operation::Subtract => {
                let (a, b) = (sample(rng, r.add_a), sample(rng, r.add_b));
                (format!("{} - {a}", checked(a.checked_add(b))?), b)
            }
            Operation::Multiply => {
                let (a, b) = (sample(rng, r.mul_a), sample(rng, r.mul_b));
                (format!("{a} {} {b}", op.glyph()), checked(a.checked_mul(b))?)
            }
            Operation::Divide => {
                let a = sample_divisor(rng, r.mul_a).ok_or_else(|| {
                    DrillError::ProviderUnavailable("divisor range only contains zero".into())
                })?;
                let b = sample(rng, r.mul_b);
                (format!("{} {} {a}", checked(a.checked_mul(b))?, op.glyph()), b)
            }
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Question::new(id, prompt, answer))
    }
}

fn checked(v: Option<i64>) -> Result<i64, DrillError> {
    v.ok_or_else(|| DrillError::ProviderUnavailable("operands overflow".into()))
}

fn sample<R: Rng>(rng: &mut R, range: OperandRange) -> i64 {
    rng.gen_range(range.min..=range.max)
}

/// Like [`sample`] but never zero. `None` when the range is exactly `0-0`.
fn sample_divisor<R: Rng>(rng: &mut R, range: OperandRange) -> Option<i64> {
    match sample(rng, range) {
        0 if range.min == range.max => None,
        0 if range.max > 0 => Some(rng.gen_range(1..=range.max)),
        0 => Some(rng.gen_range(range.min..=-1)),
        v => Some(v),
    }
}

impl QuestionProvider for RandomQuestionProvider {
    fn request(&self, config: &DrillConfig) -> Result<Question, DrillError> {
        self.generate(config, &mut rand::thread_rng())
    }
}
