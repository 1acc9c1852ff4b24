//! FITS header cards: the 80-byte keyword records that describe every HDU.
//!
//! Parsing accepts the fixed and free value formats of the FITS 4.0 standard
//! for the value types this crate meets in practice (logicals, integers,
//! reals, and quoted strings). Formatting always emits the fixed format so
//! written files round-trip through strict readers.

use crate::skymatch_errors::SkymatchError;

/// Length of one header card in bytes.
pub const CARD_LEN: usize = 80;

/// A single header record.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: CardValue,
    pub comment: Option<String>,
}

/// The typed value of a header card.
#[derive(Debug, Clone, PartialEq)]
pub enum CardValue {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Str(String),
    /// Commentary cards (`COMMENT`, `HISTORY`, blank keyword) carry no value.
    None,
}

impl Card {
    pub fn logical(keyword: &str, value: bool) -> Card {
        Card {
            keyword: keyword.to_string(),
            value: CardValue::Logical(value),
            comment: None,
        }
    }

    pub fn integer(keyword: &str, value: i64) -> Card {
        Card {
            keyword: keyword.to_string(),
            value: CardValue::Integer(value),
            comment: None,
        }
    }

    pub fn string(keyword: &str, value: &str) -> Card {
        Card {
            keyword: keyword.to_string(),
            value: CardValue::Str(value.to_string()),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Card {
        self.comment = Some(comment.to_string());
        self
    }
}

/// An ordered collection of header cards with keyword lookup.
#[derive(Debug, Clone, Default)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Header {
        Header { cards: Vec::new() }
    }

    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Value of the first card with the given keyword.
    pub fn get(&self, keyword: &str) -> Option<&CardValue> {
        self.cards
            .iter()
            .find(|c| c.keyword == keyword)
            .map(|c| &c.value)
    }

    /// Integer value of a keyword, accepting nothing else.
    pub fn get_integer(&self, keyword: &str) -> Option<i64> {
        match self.get(keyword) {
            Some(CardValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    /// String value of a keyword, trailing blanks removed.
    pub fn get_string(&self, keyword: &str) -> Option<&str> {
        match self.get(keyword) {
            Some(CardValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_logical(&self, keyword: &str) -> Option<bool> {
        match self.get(keyword) {
            Some(CardValue::Logical(v)) => Some(*v),
            _ => None,
        }
    }

    /// Integer keyword that must be present, for the structural keywords
    /// (`BITPIX`, `NAXIS`, ...) an HDU cannot be decoded without.
    pub fn require_integer(&self, keyword: &str) -> Result<i64, SkymatchError> {
        self.get_integer(keyword).ok_or_else(|| {
            SkymatchError::InvalidFits(format!("missing or non-integer keyword {keyword}"))
        })
    }

    /// Like [`Header::require_integer`], but the value must also be a valid
    /// size (non-negative).
    pub fn require_usize(&self, keyword: &str) -> Result<usize, SkymatchError> {
        usize::try_from(self.require_integer(keyword)?).map_err(|_| {
            SkymatchError::InvalidFits(format!("keyword {keyword} holds a negative size"))
        })
    }
}

/// Parse one 80-byte card.
///
/// Return
/// ------
/// * `Ok(None)` for the `END` card, `Ok(Some(card))` otherwise.
pub fn parse_card(raw: &[u8]) -> Result<Option<Card>, SkymatchError> {
    let line = std::str::from_utf8(raw)
        .map_err(|_| SkymatchError::InvalidFits("non-ASCII bytes in header card".into()))?;

    let keyword = line[..8].trim_end().to_string();
    if keyword == "END" {
        return Ok(None);
    }

    // Commentary and keyword-only cards have no value indicator.
    if &line[8..10] != "= " {
        let comment = line[8..].trim();
        return Ok(Some(Card {
            keyword,
            value: CardValue::None,
            comment: (!comment.is_empty()).then(|| comment.to_string()),
        }));
    }

    let body = &line[10..];
    let (value, rest) = parse_value(body)?;
    let comment = rest
        .trim_start()
        .strip_prefix('/')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    Ok(Some(Card {
        keyword,
        value,
        comment,
    }))
}

/// Split the value field from the card body, returning the remainder that
/// may still hold a `/ comment`.
fn parse_value(body: &str) -> Result<(CardValue, &str), SkymatchError> {
    let trimmed = body.trim_start();

    if let Some(after_quote) = trimmed.strip_prefix('\'') {
        return parse_string_value(after_quote);
    }

    // Everything up to the comment separator is the value token.
    let (token, rest) = match trimmed.find('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, ""),
    };
    let token = token.trim();

    let value = match token {
        "" => CardValue::None,
        "T" => CardValue::Logical(true),
        "F" => CardValue::Logical(false),
        _ => {
            if let Ok(int) = token.parse::<i64>() {
                CardValue::Integer(int)
            } else {
                // FORTRAN-style exponents use D instead of E
                let normalized = token.replace(['D', 'd'], "E");
                match normalized.parse::<f64>() {
                    Ok(real) => CardValue::Real(real),
                    Err(_) => {
                        return Err(SkymatchError::InvalidFits(format!(
                            "unparsable header value: {token:?}"
                        )))
                    }
                }
            }
        }
    };

    Ok((value, rest))
}

/// Parse a quoted string value; doubled quotes escape a literal quote.
fn parse_string_value(after_quote: &str) -> Result<(CardValue, &str), SkymatchError> {
    let bytes = after_quote.as_bytes();
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                out.push('\'');
                i += 2;
                continue;
            }
            // FITS strings are right-padded with blanks inside the quotes
            let value = CardValue::Str(out.trim_end().to_string());
            return Ok((value, &after_quote[i + 1..]));
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    Err(SkymatchError::InvalidFits(
        "unterminated string in header card".into(),
    ))
}

/// Render one card as a fixed-format 80-byte record.
pub fn format_card(card: &Card) -> [u8; CARD_LEN] {
    let mut line = String::with_capacity(CARD_LEN);
    line.push_str(&format!("{:<8}", card.keyword));

    match &card.value {
        CardValue::None => {
            if let Some(c) = &card.comment {
                line.push_str(c);
            }
        }
        value => {
            line.push_str("= ");
            match value {
                CardValue::Logical(true) => line.push_str(&format!("{:>20}", "T")),
                CardValue::Logical(false) => line.push_str(&format!("{:>20}", "F")),
                CardValue::Integer(v) => line.push_str(&format!("{v:>20}")),
                CardValue::Real(v) => line.push_str(&format!("{:>20}", format_real(*v))),
                CardValue::Str(s) => {
                    let escaped = s.replace('\'', "''");
                    line.push_str(&format!("'{escaped:<8}'"));
                }
                CardValue::None => unreachable!(),
            }
            if let Some(c) = &card.comment {
                line.push_str(" / ");
                line.push_str(c);
            }
        }
    }

    let mut out = [b' '; CARD_LEN];
    for (dst, src) in out.iter_mut().zip(line.bytes()) {
        *dst = src;
    }
    out
}

/// The `END` card that terminates a header.
pub fn format_end() -> [u8; CARD_LEN] {
    let mut out = [b' '; CARD_LEN];
    out[..3].copy_from_slice(b"END");
    out
}

/// Reals must carry a decimal point or an exponent to be valid FITS values.
fn format_real(v: f64) -> String {
    let mut s = format!("{v}");
    if !s.contains(['.', 'e', 'E']) {
        s.push_str(".0");
    }
    s.replace('e', "E")
}
