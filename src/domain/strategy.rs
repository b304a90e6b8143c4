//! Parsed strategy: entry/exit conditions, direction and risk parameters.

use crate::domain::indicator::IndicatorType;
use crate::domain::rule::{extract_indicators, ConditionExpr};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
    Both,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Long => "long",
            Direction::Short => "short",
            Direction::Both => "both",
        };
        write!(f, "{}", s)
    }
}

/// Percentages are whole numbers (3.0 means 3%). Absent values are filled
/// in by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RiskParams {
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub trailing_stop_pct: Option<f64>,
    pub risk_per_trade_pct: Option<f64>,
    pub r_multiple: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub entry: ConditionExpr,
    pub exit: ConditionExpr,
    pub direction: Direction,
    pub risk: RiskParams,
    pub is_fallback: bool,
}

impl RuleSet {
    /// Enter on any bar, leave on risk rules only.
    pub fn fallback() -> Self {
        Self {
            entry: ConditionExpr::Always,
            exit: ConditionExpr::Never,
            direction: Direction::Both,
            risk: RiskParams::default(),
            is_fallback: true,
        }
    }

    /// Indicators referenced by either condition, without duplicates.
    pub fn indicators(&self) -> Vec<IndicatorType> {
        let mut all = extract_indicators(&self.entry);
        for t in extract_indicators(&self.exit) {
            if !all.contains(&t) {
                all.push(t);
            }
        }
        all
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "entry:     {}", self.entry)?;
        writeln!(f, "exit:      {}", self.exit)?;
        writeln!(f, "direction: {}", self.direction)?;
        let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{}", x));
        writeln!(
            f,
            "risk:      stop={} target={} trailing={} risk/trade={} r={}",
            opt(self.risk.stop_loss_pct),
            opt(self.risk.take_profit_pct),
            opt(self.risk.trailing_stop_pct),
            opt(self.risk.risk_per_trade_pct),
            opt(self.risk.r_multiple),
        )?;
        write!(f, "fallback:  {}", self.is_fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::{CompareOp, Operand};

    #[test]
    fn fallback_is_neutral() {
        let rs = RuleSet::fallback();
        assert!(rs.is_fallback);
        assert_eq!(rs.entry, ConditionExpr::Always);
        assert_eq!(rs.exit, ConditionExpr::Never);
        assert_eq!(rs.direction, Direction::Both);
        assert_eq!(rs.risk, RiskParams::default());
        assert!(rs.indicators().is_empty());
    }

    #[test]
    fn indicators_merge_entry_and_exit() {
        let rs = RuleSet {
            entry: ConditionExpr::IndicatorCompare {
                indicator: Operand::indicator(IndicatorType::Rsi(14)),
                op: CompareOp::Lt,
                threshold: Operand::Constant(30.0),
            },
            exit: ConditionExpr::IndicatorCompare {
                indicator: Operand::Close,
                op: CompareOp::Lt,
                threshold: Operand::indicator(IndicatorType::Ema(50)),
            },
            direction: Direction::Long,
            risk: RiskParams::default(),
            is_fallback: false,
        };
        assert_eq!(
            rs.indicators(),
            vec![IndicatorType::Rsi(14), IndicatorType::Ema(50)]
        );
        assert!(rs.to_string().contains("direction: long"));
    }
}
