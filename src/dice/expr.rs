use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiceError {
    Parse(String),
}

impl fmt::Display for DiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiceError::Parse(message) => write!(f, "Invalid dice expression: {}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    Highest(u32),
    Lowest(u32),
}

/// Post-sum scaling of a term, used by the resistance rewriter:
/// `*0` immune, `/2` resist (floored), `*2` vulnerable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Times(i32),
    Div(i32),
}

impl Scale {
    pub fn apply(&self, value: i32) -> i32 {
        match self {
            Scale::Times(k) => value * k,
            Scale::Div(k) => value.div_euclid(*k),
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::Times(k) => write!(f, "*{}", k),
            Scale::Div(k) => write!(f, "/{}", k),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceGroup {
    pub count: u32,
    pub size: u32,
    pub keep: Option<Keep>,
    /// Reroll dice landing on exactly this face, once.
    pub reroll: Option<u32>,
    /// Per-die minimum. Repeated `mi` operators collapse to the largest.
    pub minimum: Option<u32>,
}

impl fmt::Display for DiceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.size)?;
        match self.keep {
            Some(Keep::Highest(n)) => write!(f, "kh{}", n)?,
            Some(Keep::Lowest(n)) => write!(f, "kl{}", n)?,
            None => {}
        }
        if let Some(reroll) = self.reroll {
            write!(f, "ro{}", reroll)?;
        }
        if let Some(minimum) = self.minimum {
            write!(f, "mi{}", minimum)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermKind {
    Dice(DiceGroup),
    Literal(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub kind: TermKind,
    pub annotation: Option<String>,
    pub scale: Option<Scale>,
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TermKind::Dice(group) => write!(f, "{}", group)?,
            TermKind::Literal(value) => write!(f, "{}", value)?,
        }
        if let Some(annotation) = &self.annotation {
            write!(f, "[{}]", annotation)?;
        }
        if let Some(scale) = &self.scale {
            write!(f, "{}", scale)?;
        }
        Ok(())
    }
}

/// A parsed dice expression: signed terms, left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceExpr {
    pub terms: Vec<(Sign, Term)>,
}

impl DiceExpr {
    pub fn parse(input: &str) -> Result<Self, DiceError> {
        Parser::new(input).expression()
    }

    pub fn has_dice(&self) -> bool {
        self.terms
            .iter()
            .any(|(_, t)| matches!(t.kind, TermKind::Dice(_)))
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (sign, term)) in self.terms.iter().enumerate() {
            match (i, sign) {
                (0, Sign::Plus) => {}
                (0, Sign::Minus) => write!(f, "-")?,
                (_, Sign::Plus) => write!(f, "+")?,
                (_, Sign::Minus) => write!(f, "-")?,
            }
            write!(f, "{}", term)?;
        }
        Ok(())
    }
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn expression(mut self) -> Result<DiceExpr, DiceError> {
        let mut terms = Vec::new();
        self.skip_ws();
        if self.at_end() {
            return Err(DiceError::Parse("empty expression".to_string()));
        }
        let mut sign = if self.eat(b'-') { Sign::Minus } else { Sign::Plus };
        loop {
            self.skip_ws();
            terms.push((sign, self.term()?));
            self.skip_ws();
            if self.at_end() {
                break;
            }
            sign = if self.eat(b'+') {
                // `+-3` reads as minus three
                self.skip_ws();
                if self.eat(b'-') { Sign::Minus } else { Sign::Plus }
            } else if self.eat(b'-') {
                Sign::Minus
            } else {
                return Err(DiceError::Parse(format!(
                    "unexpected `{}` in `{}`",
                    &self.input[self.pos..],
                    self.input
                )));
            };
        }
        Ok(DiceExpr { terms })
    }

    fn term(&mut self) -> Result<Term, DiceError> {
        let count = self.number();
        let kind = if self.peek() == Some(b'd') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit())
        {
            self.pos += 1;
            let size = self
                .number()
                .ok_or_else(|| DiceError::Parse(format!("missing die size in `{}`", self.input)))?;
            if size == 0 {
                return Err(DiceError::Parse(format!("d0 in `{}`", self.input)));
            }
            let mut group = DiceGroup {
                count: count.unwrap_or(1),
                size,
                keep: None,
                reroll: None,
                minimum: None,
            };
            self.modifiers(&mut group)?;
            TermKind::Dice(group)
        } else {
            let value = count.ok_or_else(|| {
                DiceError::Parse(format!(
                    "expected a term at `{}` in `{}`",
                    &self.input[self.pos..],
                    self.input
                ))
            })?;
            TermKind::Literal(value as i32)
        };

        self.skip_ws();
        let annotation = self.annotation()?;
        self.skip_ws();
        let scale = self.scale()?;
        Ok(Term {
            kind,
            annotation,
            scale,
        })
    }

    fn modifiers(&mut self, group: &mut DiceGroup) -> Result<(), DiceError> {
        loop {
            let op = match (self.peek(), self.peek_at(1)) {
                (Some(b'k'), Some(b'h')) => "kh",
                (Some(b'k'), Some(b'l')) => "kl",
                (Some(b'r'), Some(b'o')) => "ro",
                (Some(b'm'), Some(b'i')) => "mi",
                _ => return Ok(()),
            };
            self.pos += 2;
            let value = self.number().ok_or_else(|| {
                DiceError::Parse(format!("`{}` needs a value in `{}`", op, self.input))
            })?;
            match op {
                "kh" => group.keep = Some(Keep::Highest(value)),
                "kl" => group.keep = Some(Keep::Lowest(value)),
                "ro" => group.reroll = Some(value),
                // clamps are applied in sequence, so the largest wins
                "mi" => group.minimum = Some(group.minimum.map_or(value, |m| m.max(value))),
                _ => unreachable!(),
            }
        }
    }

    fn annotation(&mut self) -> Result<Option<String>, DiceError> {
        if !self.eat(b'[') {
            return Ok(None);
        }
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b']' {
                let text = self.input[start..self.pos].to_string();
                self.pos += 1;
                return Ok(Some(text));
            }
            self.pos += 1;
        }
        Err(DiceError::Parse(format!(
            "unterminated annotation in `{}`",
            self.input
        )))
    }

    fn scale(&mut self) -> Result<Option<Scale>, DiceError> {
        let times = if self.peek() == Some(b'*') {
            true
        } else if self.peek() == Some(b'/') {
            false
        } else {
            return Ok(None);
        };
        self.pos += 1;
        self.skip_ws();
        let value = self.number().ok_or_else(|| {
            DiceError::Parse(format!("scale needs a value in `{}`", self.input))
        })? as i32;
        if !times && value == 0 {
            return Err(DiceError::Parse(format!("division by zero in `{}`", self.input)));
        }
        Ok(Some(if times {
            Scale::Times(value)
        } else {
            Scale::Div(value)
        }))
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.input[start..self.pos].parse().ok()
    }

    fn skip_ws(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_group() {
        let expr = DiceExpr::parse("2d6").unwrap();
        assert_eq!(expr.terms.len(), 1);
        match &expr.terms[0].1.kind {
            TermKind::Dice(group) => {
                assert_eq!(group.count, 2);
                assert_eq!(group.size, 6);
            }
            _ => panic!("expected dice"),
        }
    }

    #[test]
    fn parse_missing_count_defaults_to_one() {
        let expr = DiceExpr::parse("d8+3").unwrap();
        match &expr.terms[0].1.kind {
            TermKind::Dice(group) => assert_eq!(group.count, 1),
            _ => panic!("expected dice"),
        }
        assert_eq!(expr.terms[1], (Sign::Plus, Term {
            kind: TermKind::Literal(3),
            annotation: None,
            scale: None,
        }));
    }

    #[test]
    fn parse_modifiers_and_annotation() {
        let expr = DiceExpr::parse("2d20kh1ro1mi2[cold]+4").unwrap();
        let term = &expr.terms[0].1;
        match &term.kind {
            TermKind::Dice(group) => {
                assert_eq!(group.keep, Some(Keep::Highest(1)));
                assert_eq!(group.reroll, Some(1));
                assert_eq!(group.minimum, Some(2));
            }
            _ => panic!("expected dice"),
        }
        assert_eq!(term.annotation.as_deref(), Some("cold"));
    }

    #[test]
    fn repeated_minimum_keeps_largest() {
        let expr = DiceExpr::parse("2d6mi6mi3").unwrap();
        match &expr.terms[0].1.kind {
            TermKind::Dice(group) => assert_eq!(group.minimum, Some(6)),
            _ => panic!("expected dice"),
        }
    }

    #[test]
    fn parse_scale_and_roundtrip() {
        let expr = DiceExpr::parse("8d6[fire]/2+1d4[cold]*2-1").unwrap();
        assert_eq!(expr.to_string(), "8d6[fire]/2+1d4[cold]*2-1");
    }

    #[test]
    fn parse_literal_with_annotation() {
        let expr = DiceExpr::parse("7 [fire]+2").unwrap();
        assert_eq!(expr.terms[0].1.annotation.as_deref(), Some("fire"));
        assert!(!expr.has_dice());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(DiceExpr::parse("").is_err());
        assert!(DiceExpr::parse("2x6").is_err());
        assert!(DiceExpr::parse("1d0").is_err());
        assert!(DiceExpr::parse("1d6[open").is_err());
        assert!(DiceExpr::parse("1d6/0").is_err());
    }

    #[test]
    fn scale_arithmetic() {
        assert_eq!(Scale::Div(2).apply(7), 3);
        assert_eq!(Scale::Times(0).apply(11), 0);
        assert_eq!(Scale::Times(2).apply(7), 14);
    }
}
