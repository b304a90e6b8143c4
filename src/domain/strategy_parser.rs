//! Natural-language strategy parser.
//!
//! Free text is lowercased, bounded to [`MAX_DESCRIPTION_CHARS`], tokenized,
//! and split into clauses tagged as entry or exit. Each clause is scanned
//! with the ordered [`MATCHERS`] table; at every position the first matcher
//! that recognises a phrase yields a [`Fragment`]. [`build`] then merges the
//! fragments into a [`RuleSet`].
//!
//! Parsing never fails. Text with no recognised condition degrades to the
//! fallback rule (enter on any bar, exit on risk rules only).
//!
//! When two fragments of the same role describe the same indicator in
//! different ways (an absolute comparison and a crossing, say) the one
//! matched first wins and the later one is dropped.

use crate::domain::indicator::{adx, bollinger, macd, rsi, IndicatorType};
use crate::domain::rule::{
    BreakoutSide, CompareOp, ConditionExpr, IndicatorField, LogicalOp, Operand,
};
use crate::domain::strategy::{Direction, RiskParams, RuleSet};

pub const MAX_DESCRIPTION_CHARS: usize = 2000;
pub const DEFAULT_EMA_PERIOD: usize = 20;
pub const DEFAULT_BREAKOUT_PERIOD: usize = 20;
const MAX_PERIOD: f64 = 1000.0;

const OVERSOLD: f64 = 30.0;
const OVERBOUGHT: f64 = 70.0;

// ── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
    Cmp(CompareOp),
    Percent,
    Open,
    Close,
    /// Clause boundary (sentence punctuation or newline).
    Break,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.remaining().chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn prev_char(&self) -> Option<char> {
        self.input[..self.pos].chars().next_back()
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphabetic() {
                word.push(ch);
                self.advance();
            } else if ch == '\'' {
                self.advance();
            } else {
                break;
            }
        }
        word
    }

    /// Digits with an optional fraction; `,` followed by exactly three
    /// digits is a thousands separator.
    fn read_number(&mut self) -> Option<f64> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.advance();
        }
        let mut has_dot = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
            {
                has_dot = true;
                text.push(ch);
                self.advance();
            } else if ch == ',' && !has_dot && self.is_thousands_separator() {
                self.advance();
            } else {
                break;
            }
        }
        text.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    fn is_thousands_separator(&self) -> bool {
        (1..=3).all(|k| self.peek_nth(k).is_some_and(|c| c.is_ascii_digit()))
            && !self.peek_nth(4).is_some_and(|c| c.is_ascii_digit())
    }

    fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphabetic() {
                let word = self.read_word();
                tokens.push(Token::Word(word));
            } else if ch.is_ascii_digit()
                || (ch == '-'
                    && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
                    && self.prev_char().is_none_or(|p| p.is_whitespace() || p == '('))
            {
                let start = self.pos;
                match self.read_number() {
                    Some(n) => tokens.push(Token::Number(n)),
                    None => {
                        if self.pos == start {
                            self.advance();
                        }
                    }
                }
            } else {
                self.advance();
                match ch {
                    '<' | '≤' => {
                        if ch == '<' && self.peek() == Some('=') {
                            self.advance();
                            tokens.push(Token::Cmp(CompareOp::Le));
                        } else if ch == '≤' {
                            tokens.push(Token::Cmp(CompareOp::Le));
                        } else {
                            tokens.push(Token::Cmp(CompareOp::Lt));
                        }
                    }
                    '>' | '≥' => {
                        if ch == '>' && self.peek() == Some('=') {
                            self.advance();
                            tokens.push(Token::Cmp(CompareOp::Ge));
                        } else if ch == '≥' {
                            tokens.push(Token::Cmp(CompareOp::Ge));
                        } else {
                            tokens.push(Token::Cmp(CompareOp::Gt));
                        }
                    }
                    '%' => tokens.push(Token::Percent),
                    '(' => tokens.push(Token::Open),
                    ')' => tokens.push(Token::Close),
                    '.' | ',' | ';' | '!' | '?' | '\n' => {
                        if tokens.last() != Some(&Token::Break) {
                            tokens.push(Token::Break);
                        }
                    }
                    _ => {}
                }
            }
        }
        tokens
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize()
}

// ── Cursor over a clause ────────────────────────────────────────────────────

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_word(&self) -> Option<&'a str> {
        match self.peek() {
            Some(Token::Word(w)) => Some(w.as_str()),
            _ => None,
        }
    }

    fn peek_word_at(&self, offset: usize) -> Option<&'a str> {
        match self.tokens.get(self.pos + offset) {
            Some(Token::Word(w)) => Some(w.as_str()),
            _ => None,
        }
    }

    fn consume_word(&mut self, word: &str) -> bool {
        if self.peek_word() == Some(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume_any(&mut self, words: &[&str]) -> Option<&'a str> {
        let w = self.peek_word()?;
        if words.contains(&w) {
            self.pos += 1;
            Some(w)
        } else {
            None
        }
    }

    fn skip_words(&mut self, fillers: &[&str]) {
        while self.consume_any(fillers).is_some() {}
    }

    fn consume_token(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> Option<f64> {
        match self.peek() {
            Some(Token::Number(n)) => {
                let n = *n;
                self.pos += 1;
                Some(n)
            }
            _ => None,
        }
    }

    /// A trailing `%`, `percent` or `pct`; all optional.
    fn skip_percent(&mut self) {
        if !self.consume_token(&Token::Percent) {
            self.consume_any(&["percent", "pct"]);
        }
    }

    /// `(N)` immediately after an indicator name.
    fn paren_period(&mut self) -> Option<usize> {
        let start = self.pos;
        if self.consume_token(&Token::Open) {
            if let Some(n) = self.number().and_then(as_period) {
                if self.consume_token(&Token::Close) {
                    return Some(n);
                }
            }
        }
        self.pos = start;
        None
    }

    fn rewind_to(&mut self, pos: usize) -> Option<Operand> {
        self.pos = pos;
        None
    }
}

fn as_period(n: f64) -> Option<usize> {
    if (1.0..=MAX_PERIOD).contains(&n) && n.fract() == 0.0 {
        Some(n as usize)
    } else {
        None
    }
}

fn positive_pct(n: f64) -> Option<f64> {
    if n > 0.0 && n < 100.0 { Some(n) } else { None }
}

// ── Fragments and matchers ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Condition(ConditionExpr),
    StopLoss(f64),
    TakeProfit(f64),
    TrailingStop(f64),
    RiskPerTrade(f64),
    RMultiple(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Entry,
    Exit,
}

/// A fragment with the clause role it was found in and the connector
/// (`and` / `or`) that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Matched {
    pub role: Role,
    pub joiner: LogicalOp,
    pub fragment: Fragment,
}

type Matcher = fn(&mut Cursor<'_>) -> Option<Fragment>;

/// Tried in order at each position; the first hit consumes its tokens.
const MATCHERS: &[(&str, Matcher)] = &[
    ("trailing_stop", match_trailing_stop),
    ("stop_loss", match_stop_loss),
    ("take_profit", match_take_profit),
    ("r_multiple", match_r_multiple),
    ("risk_per_trade", match_risk_per_trade),
    ("percent_first", match_percent_first),
    ("breakout", match_breakout),
    ("breakout_suffix", match_breakout_suffix),
    ("cross", match_cross),
    ("compare", match_compare),
];

const VALUE_FILLERS: &[&str] = &[
    "at", "of", "is", "to", "set", "a", "an", "with", "around", "about", "only",
];
const UNIT_WORDS: &[&str] = &[
    "day", "days", "period", "periods", "bar", "bars", "candle", "candles", "hour", "hours",
    "week", "weeks",
];
const MOTION_WORDS: &[&str] = &[
    "is", "are", "goes", "go", "moves", "move", "trades", "closes", "drops", "drop", "falls",
    "fall", "rises", "rise", "climbs", "stays", "gets", "get", "becomes", "dips", "dip",
    "jumps", "pushes", "being", "still",
];

fn match_trailing_stop(cur: &mut Cursor<'_>) -> Option<Fragment> {
    cur.consume_any(&["trailing", "trail"])?;
    cur.skip_words(&["stop", "stops", "loss"]);
    cur.skip_words(VALUE_FILLERS);
    let pct = cur.number().and_then(positive_pct)?;
    cur.skip_percent();
    Some(Fragment::TrailingStop(pct))
}

fn match_stop_loss(cur: &mut Cursor<'_>) -> Option<Fragment> {
    if cur.consume_any(&["stop", "stops"]).is_some() {
        cur.consume_any(&["loss", "losses"]);
    } else {
        cur.consume_any(&["stoploss", "sl"])?;
    }
    cur.skip_words(VALUE_FILLERS);
    let pct = cur.number().and_then(positive_pct)?;
    cur.skip_percent();
    Some(Fragment::StopLoss(pct))
}

fn match_take_profit(cur: &mut Cursor<'_>) -> Option<Fragment> {
    match cur.peek_word()? {
        "take" if cur.peek_word_at(1) == Some("profit") => cur.pos += 2,
        "profit" if cur.peek_word_at(1) == Some("target") => cur.pos += 2,
        "takeprofit" | "tp" | "target" | "targets" => cur.pos += 1,
        _ => return None,
    }
    cur.skip_words(VALUE_FILLERS);
    let value = cur.number()?;
    if cur.consume_any(&["r", "rr"]).is_some() {
        return (value > 0.0).then_some(Fragment::RMultiple(value));
    }
    cur.skip_percent();
    (value > 0.0).then_some(Fragment::TakeProfit(value))
}

fn match_r_multiple(cur: &mut Cursor<'_>) -> Option<Fragment> {
    let value = cur.number()?;
    cur.consume_any(&["r", "rr"])?;
    cur.skip_words(&["multiple", "target", "take", "profit"]);
    (value > 0.0).then_some(Fragment::RMultiple(value))
}

fn match_risk_per_trade(cur: &mut Cursor<'_>) -> Option<Fragment> {
    cur.consume_any(&["risk", "risking", "risks"])?;
    cur.skip_words(VALUE_FILLERS);
    let pct = cur.number().and_then(positive_pct)?;
    cur.skip_percent();
    if cur.consume_word("per") {
        cur.consume_any(&["trade", "position"]);
    }
    Some(Fragment::RiskPerTrade(pct))
}

/// `3% stop`, `6% target`, `2% trailing stop`, `1% risk`.
fn match_percent_first(cur: &mut Cursor<'_>) -> Option<Fragment> {
    let value = cur.number()?;
    if !cur.consume_token(&Token::Percent) {
        cur.consume_any(&["percent", "pct"])?;
    }
    let pct = positive_pct(value)?;
    match cur.peek_word()? {
        "trailing" | "trail" => {
            cur.pos += 1;
            cur.skip_words(&["stop", "loss"]);
            Some(Fragment::TrailingStop(pct))
        }
        "stop" | "stoploss" | "sl" => {
            cur.pos += 1;
            cur.consume_word("loss");
            Some(Fragment::StopLoss(pct))
        }
        "target" | "tp" | "takeprofit" => {
            cur.pos += 1;
            Some(Fragment::TakeProfit(pct))
        }
        "take" | "profit" => {
            cur.pos += 1;
            cur.skip_words(&["profit", "target"]);
            Some(Fragment::TakeProfit(pct))
        }
        "risk" => {
            cur.pos += 1;
            if cur.consume_word("per") {
                cur.consume_any(&["trade", "position"]);
            }
            Some(Fragment::RiskPerTrade(pct))
        }
        _ => None,
    }
}

fn breakout_side(cur: &mut Cursor<'_>) -> Option<BreakoutSide> {
    match cur.consume_any(&["high", "highs", "low", "lows"])? {
        "high" | "highs" => Some(BreakoutSide::High),
        _ => Some(BreakoutSide::Low),
    }
}

/// `break of 20-day high`, `breaks above the 55 day high`, `new 10-day low`.
fn match_breakout(cur: &mut Cursor<'_>) -> Option<Fragment> {
    cur.consume_any(&["break", "breaks", "breakout", "breaking", "broke", "new"])?;
    cur.skip_words(&[
        "of", "above", "below", "out", "through", "the", "a", "over", "under", "to", "past",
        "new", "its", "previous", "prior", "last",
    ]);
    let lookback_period = match cur.number() {
        Some(n) => as_period(n)?,
        None => DEFAULT_BREAKOUT_PERIOD,
    };
    cur.skip_words(UNIT_WORDS);
    let direction = breakout_side(cur)?;
    Some(Fragment::Condition(ConditionExpr::Breakout {
        direction,
        lookback_period,
    }))
}

/// `20-day high breakout`.
fn match_breakout_suffix(cur: &mut Cursor<'_>) -> Option<Fragment> {
    let lookback_period = as_period(cur.number()?)?;
    cur.skip_words(UNIT_WORDS);
    let direction = breakout_side(cur)?;
    cur.consume_any(&["breakout", "break", "breaks"])?;
    Some(Fragment::Condition(ConditionExpr::Breakout {
        direction,
        lookback_period,
    }))
}

/// `RSI crosses above 30`, `MACD crosses below signal`, `EMA 12 crosses above EMA 26`.
fn match_cross(cur: &mut Cursor<'_>) -> Option<Fragment> {
    let a = operand(cur)?;
    cur.consume_any(&["cross", "crosses", "crossed", "crossing", "crossover"])?;
    let above = match cur.consume_any(&["above", "over", "up", "upward", "below", "under", "down"])?
    {
        "above" | "over" | "up" | "upward" => true,
        _ => false,
    };
    cur.skip_words(&["the", "its"]);
    let (a, b) = pair_with_target(a, cur)?;
    let expr = if above {
        ConditionExpr::CrossAbove { a, b }
    } else {
        ConditionExpr::CrossBelow { a, b }
    };
    Some(Fragment::Condition(expr))
}

enum Comparator {
    Op(CompareOp),
    /// `reaches` / `hits`: direction depends on where the threshold sits.
    Reach,
}

fn comparator(cur: &mut Cursor<'_>) -> Option<Comparator> {
    if let Some(Token::Cmp(op)) = cur.peek() {
        let op = *op;
        cur.pos += 1;
        return Some(Comparator::Op(op));
    }
    let word = cur.consume_any(&[
        "above", "over", "below", "under", "beneath", "greater", "more", "higher", "less",
        "lower", "exceeds", "exceed", "reaches", "reach", "hits", "hit", "touches", "touch",
    ])?;
    let cmp = match word {
        "above" | "over" | "exceeds" | "exceed" => Comparator::Op(CompareOp::Gt),
        "below" | "under" | "beneath" => Comparator::Op(CompareOp::Lt),
        "greater" | "more" | "higher" => {
            cur.consume_word("than").then_some(())?;
            Comparator::Op(CompareOp::Gt)
        }
        "less" | "lower" => {
            cur.consume_word("than").then_some(())?;
            Comparator::Op(CompareOp::Lt)
        }
        _ => Comparator::Reach,
    };
    Some(cmp)
}

/// `RSI < 30`, `RSI is below 30`, `price above the 200 day EMA`,
/// `MACD above signal`, `ADX > 25`, `RSI oversold`.
fn match_compare(cur: &mut Cursor<'_>) -> Option<Fragment> {
    let explicit = operand(cur);
    cur.skip_words(MOTION_WORDS);

    if let Some(a) = &explicit {
        if is_rsi(a) {
            if let Some(w) = cur.consume_any(&["oversold", "overbought"]) {
                let (op, level) = if w == "oversold" {
                    (CompareOp::Lt, OVERSOLD)
                } else {
                    (CompareOp::Gt, OVERBOUGHT)
                };
                return Some(Fragment::Condition(ConditionExpr::IndicatorCompare {
                    indicator: a.clone(),
                    op,
                    threshold: Operand::Constant(level),
                }));
            }
        }
    }

    let cmp = comparator(cur)?;
    cur.skip_words(&["the", "its", "than"]);
    let (indicator, threshold) = match explicit {
        Some(a) => pair_with_target(a, cur)?,
        // `above the 200 EMA` with the price left implicit; only an
        // indicator target makes sense here.
        None => (Operand::Close, operand(cur)?),
    };
    if indicator == threshold {
        return None;
    }
    let op = match cmp {
        Comparator::Op(op) => op,
        Comparator::Reach => match threshold {
            Operand::Constant(v) if is_rsi(&indicator) && v < 50.0 => CompareOp::Le,
            _ => CompareOp::Ge,
        },
    };
    Some(Fragment::Condition(ConditionExpr::IndicatorCompare {
        indicator,
        op,
        threshold,
    }))
}

fn is_rsi(operand: &Operand) -> bool {
    matches!(operand, Operand::Indicator(r) if matches!(r.indicator_type, IndicatorType::Rsi(_)))
}

fn plain_macd(operand: &Operand) -> Option<IndicatorType> {
    match operand {
        Operand::Indicator(r)
            if matches!(r.indicator_type, IndicatorType::Macd { .. })
                && r.field == IndicatorField::Value =>
        {
            Some(r.indicator_type)
        }
        _ => None,
    }
}

/// Right-hand side of a comparison or crossing: `signal`, `zero`, an
/// indicator, a price word, or a number not followed by a unit.
fn pair_with_target(a: Operand, cur: &mut Cursor<'_>) -> Option<(Operand, Operand)> {
    if let Some(macd_type) = plain_macd(&a) {
        if cur.consume_word("signal") {
            cur.consume_word("line");
            return Some((
                Operand::indicator_field(macd_type, IndicatorField::MacdLine),
                Operand::indicator_field(macd_type, IndicatorField::MacdSignal),
            ));
        }
    }
    if cur.consume_any(&["zero", "nought"]).is_some() {
        return Some((a, Operand::Constant(0.0)));
    }
    if let Some(b) = operand(cur) {
        return Some((a, b));
    }
    let value = cur.number()?;
    if cur.peek_word().is_some_and(|w| UNIT_WORDS.contains(&w)) {
        return None;
    }
    cur.skip_percent();
    Some((a, Operand::Constant(value)))
}

/// Indicator or price operand at the cursor, restoring the position on
/// failure.
fn operand(cur: &mut Cursor<'_>) -> Option<Operand> {
    let start = cur.pos;
    cur.consume_word("the");

    // `200 day EMA`, `14-period RSI`
    if let Some(n) = cur.number() {
        cur.skip_words(UNIT_WORDS);
        return match as_period(n).and_then(|p| named_indicator(cur, Some(p))) {
            Some(op) => Some(op),
            None => cur.rewind_to(start),
        };
    }

    if let Some(op) = named_indicator(cur, None) {
        return Some(op);
    }
    if cur.consume_any(&["price", "btc", "bitcoin", "close", "closing"]).is_some() {
        cur.consume_any(&["price", "close"]);
        return Some(Operand::Close);
    }
    cur.rewind_to(start)
}

fn named_indicator(cur: &mut Cursor<'_>, period: Option<usize>) -> Option<Operand> {
    let start = cur.pos;
    let found = indicator_words(cur, period);
    if found.is_none() {
        cur.pos = start;
    }
    found
}

fn indicator_words(cur: &mut Cursor<'_>, period: Option<usize>) -> Option<Operand> {
    let word = cur.peek_word()?;
    cur.pos += 1;
    let operand = match word {
        "rsi" => {
            let p = period.or_else(|| cur.paren_period()).unwrap_or(rsi::DEFAULT_PERIOD);
            Operand::indicator(IndicatorType::Rsi(p))
        }
        "adx" => {
            let p = period.or_else(|| cur.paren_period()).unwrap_or(adx::DEFAULT_PERIOD);
            Operand::indicator(IndicatorType::Adx(p))
        }
        "ema" | "sma" | "ma" | "moving" | "exponential" => {
            if word == "exponential" {
                cur.consume_word("moving").then_some(())?;
            }
            if word == "moving" || word == "exponential" {
                cur.consume_word("average").then_some(())?;
            }
            let p = period
                .or_else(|| cur.paren_period())
                .or_else(|| trailing_period(cur))
                .unwrap_or(DEFAULT_EMA_PERIOD);
            Operand::indicator(IndicatorType::Ema(p))
        }
        "macd" => {
            let field = match cur.consume_any(&["histogram", "hist", "signal", "line"]) {
                Some("histogram" | "hist") => IndicatorField::MacdHistogram,
                Some("signal") => {
                    cur.consume_word("line");
                    IndicatorField::MacdSignal
                }
                Some(_) => IndicatorField::MacdLine,
                None => IndicatorField::Value,
            };
            Operand::indicator_field(default_macd(), field)
        }
        "signal" if period.is_none() => {
            cur.consume_word("line");
            Operand::indicator_field(default_macd(), IndicatorField::MacdSignal)
        }
        "upper" | "lower" | "middle" => {
            let field = band_field(word);
            cur.consume_word("bollinger");
            cur.consume_any(&["band", "bands"])?;
            Operand::indicator_field(default_bollinger(period), field)
        }
        "bollinger" => {
            cur.consume_any(&["band", "bands"]);
            let field = match cur.consume_any(&["upper", "lower", "middle"]) {
                Some(w) => {
                    cur.consume_any(&["band", "bands"]);
                    band_field(w)
                }
                None => IndicatorField::BollingerMiddle,
            };
            Operand::indicator_field(default_bollinger(period), field)
        }
        _ => return None,
    };
    Some(operand)
}

/// `EMA 200`, but not when the number is a comparison threshold.
fn trailing_period(cur: &mut Cursor<'_>) -> Option<usize> {
    let start = cur.pos;
    let p = cur.number().and_then(as_period);
    if p.is_none() {
        cur.pos = start;
    }
    p
}

fn band_field(word: &str) -> IndicatorField {
    match word {
        "upper" => IndicatorField::BollingerUpper,
        "lower" => IndicatorField::BollingerLower,
        _ => IndicatorField::BollingerMiddle,
    }
}

fn default_macd() -> IndicatorType {
    IndicatorType::Macd {
        fast: macd::DEFAULT_FAST,
        slow: macd::DEFAULT_SLOW,
        signal: macd::DEFAULT_SIGNAL,
    }
}

fn default_bollinger(period: Option<usize>) -> IndicatorType {
    IndicatorType::Bollinger {
        period: period.unwrap_or(bollinger::DEFAULT_PERIOD),
        stddev_mult_x100: bollinger::DEFAULT_STDDEV_MULT_X100,
    }
}

// ── Clauses ─────────────────────────────────────────────────────────────────

const EXIT_WORDS: &[&str] = &["sell", "sells", "selling", "exit", "exits", "exiting", "cover"];
const ENTRY_WORDS: &[&str] = &["buy", "buys", "buying", "enter", "enters", "entry", "entering"];
const LONG_WORDS: &[&str] = &["long", "longs"];
const SHORT_WORDS: &[&str] = &["short", "shorts", "shorting"];

/// `close` opens an exit clause unless it is used as the price.
fn close_is_exit(tokens: &[Token], i: usize) -> bool {
    match tokens.get(i + 1) {
        Some(Token::Cmp(_)) => false,
        Some(Token::Word(w)) => !matches!(
            w.as_str(),
            "above" | "below" | "under" | "over" | "crosses" | "cross" | "is" | "price"
                | "greater" | "less" | "breaks"
        ),
        _ => true,
    }
}

fn role_switch(tokens: &[Token], i: usize, current: Role) -> Option<Role> {
    let Token::Word(w) = &tokens[i] else {
        return None;
    };
    let w = w.as_str();
    if EXIT_WORDS.contains(&w) || (w == "close" && close_is_exit(tokens, i)) {
        return Some(Role::Exit);
    }
    if ENTRY_WORDS.contains(&w) {
        return Some(Role::Entry);
    }
    if LONG_WORDS.contains(&w) || SHORT_WORDS.contains(&w) {
        // `exit long` stays an exit; `sell short` opens a short.
        let prev = i.checked_sub(1).and_then(|p| match &tokens[p] {
            Token::Word(pw) => Some(pw.as_str()),
            _ => None,
        });
        return match prev {
            Some("sell") if SHORT_WORDS.contains(&w) => Some(Role::Entry),
            Some(p) if EXIT_WORDS.contains(&p) || p == "close" => Some(current),
            _ => Some(Role::Entry),
        };
    }
    None
}

fn scan(tokens: &[Token]) -> Vec<Matched> {
    let mut matched = Vec::new();
    let mut role = Role::Entry;
    let mut joiner = LogicalOp::And;
    let mut i = 0;

    while i < tokens.len() {
        if let Some(next) = role_switch(tokens, i, role) {
            if next != role {
                joiner = LogicalOp::And;
            }
            role = next;
            i += 1;
            continue;
        }
        match &tokens[i] {
            Token::Break => {
                i += 1;
                continue;
            }
            Token::Word(w) if w == "or" => {
                joiner = LogicalOp::Or;
                i += 1;
                continue;
            }
            _ => {}
        }

        let end = tokens[i..]
            .iter()
            .position(|t| *t == Token::Break)
            .map_or(tokens.len(), |p| i + p);
        let clause = &tokens[i..end];

        let hit = MATCHERS.iter().find_map(|(name, matcher)| {
            let mut cur = Cursor::new(clause);
            matcher(&mut cur).map(|fragment| (*name, fragment, cur.pos.max(1)))
        });
        match hit {
            Some((name, fragment, consumed)) => {
                tracing::debug!(matcher = name, role = ?role, fragment = ?fragment, "matched strategy fragment");
                matched.push(Matched {
                    role,
                    joiner,
                    fragment,
                });
                joiner = LogicalOp::And;
                i += consumed;
            }
            None => i += 1,
        }
    }
    matched
}

fn detect_direction(tokens: &[Token]) -> Direction {
    let has = |words: &[&str]| {
        tokens
            .iter()
            .any(|t| matches!(t, Token::Word(w) if words.contains(&w.as_str())))
    };
    match (has(LONG_WORDS), has(SHORT_WORDS)) {
        (true, false) => Direction::Long,
        (false, true) => Direction::Short,
        _ => Direction::Both,
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConditionKind {
    Compare,
    Cross,
}

fn conflict_key(expr: &ConditionExpr) -> Option<(IndicatorType, ConditionKind)> {
    let first_indicator = |ops: [&Operand; 2]| {
        ops.into_iter().find_map(|o| match o {
            Operand::Indicator(r) => Some(r.indicator_type),
            _ => None,
        })
    };
    match expr {
        ConditionExpr::IndicatorCompare {
            indicator,
            threshold,
            ..
        } => first_indicator([indicator, threshold]).map(|t| (t, ConditionKind::Compare)),
        ConditionExpr::CrossAbove { a, b } | ConditionExpr::CrossBelow { a, b } => {
            first_indicator([a, b]).map(|t| (t, ConditionKind::Cross))
        }
        _ => None,
    }
}

fn merge_conditions(items: Vec<(LogicalOp, ConditionExpr)>) -> Option<ConditionExpr> {
    let mut kept: Vec<ConditionExpr> = Vec::new();
    let mut op = LogicalOp::And;
    for (joiner, expr) in items {
        if let Some((indicator, kind)) = conflict_key(&expr) {
            let clashes = kept.iter().any(|k| {
                conflict_key(k).is_some_and(|(ki, kk)| ki == indicator && kk != kind)
            });
            if clashes {
                tracing::debug!(dropped = %expr, "conflicting fragment ignored, first match wins");
                continue;
            }
        }
        if !kept.is_empty() && joiner == LogicalOp::Or {
            op = LogicalOp::Or;
        }
        kept.push(expr);
    }
    if kept.is_empty() {
        None
    } else {
        Some(ConditionExpr::combine(op, kept))
    }
}

/// Merge matched fragments into a rule set. Pure; the first value of each
/// risk parameter wins.
pub fn build(matched: Vec<Matched>, direction: Direction) -> RuleSet {
    let mut risk = RiskParams::default();
    let mut entry = Vec::new();
    let mut exit = Vec::new();

    for m in matched {
        match m.fragment {
            Fragment::Condition(expr) => match m.role {
                Role::Entry => entry.push((m.joiner, expr)),
                Role::Exit => exit.push((m.joiner, expr)),
            },
            Fragment::StopLoss(v) => {
                risk.stop_loss_pct.get_or_insert(v);
            }
            Fragment::TakeProfit(v) => {
                risk.take_profit_pct.get_or_insert(v);
            }
            Fragment::TrailingStop(v) => {
                risk.trailing_stop_pct.get_or_insert(v);
            }
            Fragment::RiskPerTrade(v) => {
                risk.risk_per_trade_pct.get_or_insert(v);
            }
            Fragment::RMultiple(v) => {
                risk.r_multiple.get_or_insert(v);
            }
        }
    }

    let risk_exit_given = risk.take_profit_pct.is_some()
        || risk.trailing_stop_pct.is_some()
        || risk.r_multiple.is_some();

    let (entry, exit, is_fallback) = match (merge_conditions(entry), merge_conditions(exit)) {
        (Some(entry), Some(exit)) => (entry, exit, false),
        (Some(entry), None) => {
            let exit = if risk_exit_given {
                ConditionExpr::Never
            } else {
                entry.opposite()
            };
            (entry, exit, false)
        }
        (None, Some(exit)) => (exit.opposite(), exit, false),
        (None, None) => (ConditionExpr::Always, ConditionExpr::Never, true),
    };
    let direction = if is_fallback { Direction::Both } else { direction };

    RuleSet {
        entry,
        exit,
        direction,
        risk,
        is_fallback,
    }
}

/// Parse a free-text strategy description. Total: any input yields a
/// usable [`RuleSet`].
pub fn parse(text: &str) -> RuleSet {
    let bounded: String = text.chars().take(MAX_DESCRIPTION_CHARS).collect();
    let tokens = tokenize(&bounded.to_lowercase());
    let direction = detect_direction(&tokens);
    let rule_set = build(scan(&tokens), direction);

    if rule_set.is_fallback {
        tracing::info!(
            chars = bounded.chars().count(),
            "no strategy condition recognised, using fallback rule"
        );
    } else {
        tracing::debug!(entry = %rule_set.entry, exit = %rule_set.exit, direction = %rule_set.direction, "parsed strategy");
    }
    rule_set
}
