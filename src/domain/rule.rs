//! Condition AST data structures.
//!
//! This module defines the abstract syntax tree for strategy conditions:
//! - `Operand`: What can be compared (price fields, constants, indicators)
//! - `IndicatorRef`: Reference to an indicator with a specific field
//! - `IndicatorField`: Which field of a multi-value indicator to use
//! - `ConditionExpr`: The closed set of condition shapes the evaluator knows

use crate::domain::indicator::IndicatorType;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Close,
    High,
    Low,
    Constant(f64),
    Indicator(IndicatorRef),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakoutSide {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionExpr {
    IndicatorCompare {
        indicator: Operand,
        op: CompareOp,
        threshold: Operand,
    },
    CrossAbove {
        a: Operand,
        b: Operand,
    },
    CrossBelow {
        a: Operand,
        b: Operand,
    },
    /// Close exceeds the highest (or undercuts the lowest) close of the
    /// previous `lookback_period` candles.
    Breakout {
        direction: BreakoutSide,
        lookback_period: usize,
    },
    Composite {
        op: LogicalOp,
        children: Vec<ConditionExpr>,
    },
    /// True on every candle.
    Always,
    /// True on no candle; exits are left to the risk rules.
    Never,
}

impl Operand {
    pub fn indicator(indicator_type: IndicatorType) -> Self {
        Operand::Indicator(IndicatorRef {
            indicator_type,
            field: IndicatorField::Value,
        })
    }

    pub fn indicator_field(indicator_type: IndicatorType, field: IndicatorField) -> Self {
        Operand::Indicator(IndicatorRef {
            indicator_type,
            field,
        })
    }

    /// Oscillators bounded to [0, 100] whose thresholds mirror around 50.
    fn is_bounded_oscillator(&self) -> bool {
        matches!(
            self,
            Operand::Indicator(IndicatorRef {
                indicator_type: IndicatorType::Rsi(_),
                ..
            })
        )
    }
}

impl CompareOp {
    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
        }
    }
}

impl ConditionExpr {
    /// Composite of `children`, collapsing the trivial cases.
    pub fn combine(op: LogicalOp, mut children: Vec<ConditionExpr>) -> ConditionExpr {
        match children.len() {
            0 => ConditionExpr::Never,
            1 => children.remove(0),
            _ => ConditionExpr::Composite { op, children },
        }
    }

    /// The condition that undoes this one, used as the default exit.
    pub fn opposite(&self) -> ConditionExpr {
        match self {
            ConditionExpr::IndicatorCompare {
                indicator,
                op,
                threshold,
            } => {
                let threshold = match threshold {
                    Operand::Constant(v) if indicator.is_bounded_oscillator() => {
                        Operand::Constant(100.0 - v)
                    }
                    other => other.clone(),
                };
                ConditionExpr::IndicatorCompare {
                    indicator: indicator.clone(),
                    op: op.flipped(),
                    threshold,
                }
            }
            ConditionExpr::CrossAbove { a, b } => ConditionExpr::CrossBelow {
                a: a.clone(),
                b: b.clone(),
            },
            ConditionExpr::CrossBelow { a, b } => ConditionExpr::CrossAbove {
                a: a.clone(),
                b: b.clone(),
            },
            ConditionExpr::Breakout {
                direction,
                lookback_period,
            } => ConditionExpr::Breakout {
                direction: match direction {
                    BreakoutSide::High => BreakoutSide::Low,
                    BreakoutSide::Low => BreakoutSide::High,
                },
                lookback_period: *lookback_period,
            },
            ConditionExpr::Composite { op, children } => ConditionExpr::Composite {
                op: match op {
                    LogicalOp::And => LogicalOp::Or,
                    LogicalOp::Or => LogicalOp::And,
                },
                children: children.iter().map(ConditionExpr::opposite).collect(),
            },
            ConditionExpr::Always => ConditionExpr::Never,
            ConditionExpr::Never => ConditionExpr::Always,
        }
    }
}

/// Every indicator the condition tree references, in first-seen order.
pub fn extract_indicators(expr: &ConditionExpr) -> Vec<IndicatorType> {
    let mut out = Vec::new();
    collect(expr, &mut out);
    out
}

fn push_unique(out: &mut Vec<IndicatorType>, t: IndicatorType) {
    if !out.contains(&t) {
        out.push(t);
    }
}

fn collect(expr: &ConditionExpr, out: &mut Vec<IndicatorType>) {
    match expr {
        ConditionExpr::IndicatorCompare {
            indicator,
            threshold,
            ..
        } => {
            for operand in [indicator, threshold] {
                if let Operand::Indicator(r) = operand {
                    push_unique(out, r.indicator_type);
                }
            }
        }
        ConditionExpr::CrossAbove { a, b } | ConditionExpr::CrossBelow { a, b } => {
            for operand in [a, b] {
                if let Operand::Indicator(r) = operand {
                    push_unique(out, r.indicator_type);
                }
            }
        }
        ConditionExpr::Breakout {
            direction,
            lookback_period,
        } => push_unique(
            out,
            match direction {
                BreakoutSide::High => IndicatorType::Highest(*lookback_period),
                BreakoutSide::Low => IndicatorType::Lowest(*lookback_period),
            },
        ),
        ConditionExpr::Composite { children, .. } => {
            for child in children {
                collect(child, out);
            }
        }
        ConditionExpr::Always | ConditionExpr::Never => {}
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Close => write!(f, "close"),
            Operand::High => write!(f, "high"),
            Operand::Low => write!(f, "low"),
            Operand::Constant(v) => write!(f, "{}", v),
            Operand::Indicator(r) => {
                let prefix = match r.field {
                    IndicatorField::Value => return write!(f, "{}", r.indicator_type),
                    IndicatorField::MacdLine => "LINE",
                    IndicatorField::MacdSignal => "SIGNAL",
                    IndicatorField::MacdHistogram => "HISTOGRAM",
                    IndicatorField::BollingerUpper => "UPPER",
                    IndicatorField::BollingerMiddle => "MIDDLE",
                    IndicatorField::BollingerLower => "LOWER",
                };
                write!(f, "{}:{}", r.indicator_type, prefix)
            }
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionExpr::IndicatorCompare {
                indicator,
                op,
                threshold,
            } => write!(f, "{} {} {}", indicator, op, threshold),
            ConditionExpr::CrossAbove { a, b } => write!(f, "CROSS_ABOVE({}, {})", a, b),
            ConditionExpr::CrossBelow { a, b } => write!(f, "CROSS_BELOW({}, {})", a, b),
            ConditionExpr::Breakout {
                direction: BreakoutSide::High,
                lookback_period,
            } => write!(f, "BREAKOUT_HIGH({})", lookback_period),
            ConditionExpr::Breakout {
                direction: BreakoutSide::Low,
                lookback_period,
            } => write!(f, "BREAKOUT_LOW({})", lookback_period),
            ConditionExpr::Composite { op, children } => {
                let name = match op {
                    LogicalOp::And => "AND",
                    LogicalOp::Or => "OR",
                };
                write!(f, "{}(", name)?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            ConditionExpr::Always => write!(f, "ALWAYS"),
            ConditionExpr::Never => write!(f, "NEVER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsi_below(v: f64) -> ConditionExpr {
        ConditionExpr::IndicatorCompare {
            indicator: Operand::indicator(IndicatorType::Rsi(14)),
            op: CompareOp::Lt,
            threshold: Operand::Constant(v),
        }
    }

    #[test]
    fn compare_op_apply() {
        assert!(CompareOp::Lt.apply(1.0, 2.0));
        assert!(!CompareOp::Lt.apply(2.0, 2.0));
        assert!(CompareOp::Le.apply(2.0, 2.0));
        assert!(CompareOp::Gt.apply(3.0, 2.0));
        assert!(CompareOp::Ge.apply(2.0, 2.0));
    }

    #[test]
    fn opposite_mirrors_rsi_threshold() {
        let exit = rsi_below(30.0).opposite();
        assert_eq!(
            exit,
            ConditionExpr::IndicatorCompare {
                indicator: Operand::indicator(IndicatorType::Rsi(14)),
                op: CompareOp::Gt,
                threshold: Operand::Constant(70.0),
            }
        );
    }

    #[test]
    fn opposite_keeps_price_threshold() {
        let above_ema = ConditionExpr::IndicatorCompare {
            indicator: Operand::Close,
            op: CompareOp::Gt,
            threshold: Operand::indicator(IndicatorType::Ema(200)),
        };
        match above_ema.opposite() {
            ConditionExpr::IndicatorCompare { op, threshold, .. } => {
                assert_eq!(op, CompareOp::Lt);
                assert_eq!(threshold, Operand::indicator(IndicatorType::Ema(200)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn opposite_swaps_crossings_and_breakouts() {
        let cross = ConditionExpr::CrossAbove {
            a: Operand::indicator(IndicatorType::Ema(12)),
            b: Operand::indicator(IndicatorType::Ema(26)),
        };
        assert!(matches!(cross.opposite(), ConditionExpr::CrossBelow { .. }));

        let breakout = ConditionExpr::Breakout {
            direction: BreakoutSide::High,
            lookback_period: 20,
        };
        assert_eq!(
            breakout.opposite(),
            ConditionExpr::Breakout {
                direction: BreakoutSide::Low,
                lookback_period: 20
            }
        );
    }

    #[test]
    fn opposite_of_and_is_or() {
        let both = ConditionExpr::combine(LogicalOp::And, vec![rsi_below(30.0), rsi_below(40.0)]);
        match both.opposite() {
            ConditionExpr::Composite { op, children } => {
                assert_eq!(op, LogicalOp::Or);
                assert_eq!(children.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ConditionExpr::Always.opposite(), ConditionExpr::Never);
    }

    #[test]
    fn combine_collapses_trivial_cases() {
        assert_eq!(ConditionExpr::combine(LogicalOp::And, vec![]), ConditionExpr::Never);
        assert_eq!(
            ConditionExpr::combine(LogicalOp::Or, vec![rsi_below(30.0)]),
            rsi_below(30.0)
        );
    }

    #[test]
    fn extract_indicators_dedups() {
        let expr = ConditionExpr::combine(
            LogicalOp::And,
            vec![
                rsi_below(30.0),
                rsi_below(20.0),
                ConditionExpr::Breakout {
                    direction: BreakoutSide::Low,
                    lookback_period: 10,
                },
                ConditionExpr::CrossAbove {
                    a: Operand::indicator_field(
                        IndicatorType::Macd {
                            fast: 12,
                            slow: 26,
                            signal: 9,
                        },
                        IndicatorField::MacdLine,
                    ),
                    b: Operand::Constant(0.0),
                },
            ],
        );
        let indicators = extract_indicators(&expr);
        assert_eq!(
            indicators,
            vec![
                IndicatorType::Rsi(14),
                IndicatorType::Lowest(10),
                IndicatorType::Macd {
                    fast: 12,
                    slow: 26,
                    signal: 9
                },
            ]
        );
    }

    #[test]
    fn display_renders_tree() {
        let expr = ConditionExpr::combine(
            LogicalOp::Or,
            vec![
                rsi_below(30.0),
                ConditionExpr::Breakout {
                    direction: BreakoutSide::High,
                    lookback_period: 20,
                },
            ],
        );
        assert_eq!(expr.to_string(), "OR(RSI(14) < 30, BREAKOUT_HIGH(20))");
    }
}
