//! Query Parser
//!
//! Parses the pipeline query language from a [`ByteStreamReader`] into a
//! [`QueryDefinition`].
//!
//! # Supported Syntax
//!
//! ```text
//! SELECT metric [, metric2, ...]
//! [BETWEEN <time> AND <time>]
//! [| SAMPLE <algorithm>(<size>)]
//! [| RESAMPLE <width> [avg|sum|min|max|count|first|last]]
//! [| FILTER id = <n>]
//! [| FILTER id IN (<n>, ...)]
//! ```
//!
//! `<time>` is an unsigned integer or a quoted RFC 3339 datetime, which is
//! converted to milliseconds since the Unix epoch. Keywords are
//! case-insensitive.
//!
//! # Examples
//!
//! ```text
//! SELECT cpu
//! SELECT cpu, mem BETWEEN 3600000 AND 0
//! SELECT cpu BETWEEN '2024-01-01T00:00:00Z' AND '2024-01-02T00:00:00Z' | RESAMPLE 60000 max
//! SELECT cpu, mem | FILTER id IN (0, 1) | SAMPLE reservoir(100)
//! ```

use crate::query::ast::{AggregationFunc, QueryDefinition, StageSpec};
use crate::query::error::{QueryError, QueryResult};
use crate::stream::{ByteStreamReader, MemStreamReader, StreamError};
use chrono::DateTime;

/// Parse a query string into a definition
pub fn parse_query(input: &str) -> QueryResult<QueryDefinition> {
    let mut reader = MemStreamReader::from_str(input);
    parse_definition(&mut reader)
}

/// Parse a definition from a byte stream; the whole stream must be consumed
pub fn parse_definition(reader: &mut dyn ByteStreamReader) -> QueryResult<QueryDefinition> {
    let mut parser = Parser::new(reader);
    let definition = parser.parse_full_query()?;
    tracing::debug!(
        "parsed query: {} metrics, {} stages",
        definition.metrics.len(),
        definition.stages.len()
    );
    Ok(definition)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(u64),
    Quoted(String),
    Symbol(char),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{}'", w),
            Token::Number(n) => write!(f, "{}", n),
            Token::Quoted(s) => write!(f, "\"{}\"", s),
            Token::Symbol(c) => write!(f, "'{}'", c),
        }
    }
}

/// Token plus the reader context at its first byte
struct Spanned {
    token: Token,
    context: StreamError,
}

struct Parser<'r> {
    reader: &'r mut dyn ByteStreamReader,
    peeked: Option<Option<Spanned>>,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'-')
}

impl<'r> Parser<'r> {
    fn new(reader: &'r mut dyn ByteStreamReader) -> Self {
        Self {
            reader,
            peeked: None,
        }
    }

    fn syntax_error(message: impl Into<String>, context: StreamError) -> QueryError {
        QueryError::Syntax {
            message: message.into(),
            context,
        }
    }

    // ---- lexer ----

    fn skip_whitespace(&mut self) -> QueryResult<()> {
        while !self.reader.is_eof() && self.reader.pick()?.is_ascii_whitespace() {
            self.reader.get()?;
        }
        Ok(())
    }

    fn lex(&mut self) -> QueryResult<Option<Spanned>> {
        self.skip_whitespace()?;
        if self.reader.is_eof() {
            return Ok(None);
        }

        let context = self.reader.error_here();
        let first = self.reader.pick()?;
        let token = if is_ident_start(first) {
            Token::Word(self.take_while(is_ident_char)?)
        } else if first.is_ascii_digit() {
            let digits = self.take_while(|b| b.is_ascii_digit())?;
            let n = digits
                .parse::<u64>()
                .map_err(|_| Self::syntax_error(format!("number {} is too large", digits), context.clone()))?;
            Token::Number(n)
        } else if first == b'\'' || first == b'"' {
            Token::Quoted(self.parse_quoted_string(context.clone())?)
        } else if matches!(first, b',' | b'|' | b'(' | b')' | b'=') {
            self.reader.get()?;
            Token::Symbol(first as char)
        } else {
            return Err(Self::syntax_error(
                format!("unexpected character '{}'", first.escape_ascii()),
                context,
            ));
        };

        Ok(Some(Spanned { token, context }))
    }

    fn take_while(&mut self, pred: fn(u8) -> bool) -> QueryResult<String> {
        let mut out = String::new();
        while !self.reader.is_eof() && pred(self.reader.pick()?) {
            out.push(self.reader.get()? as char);
        }
        Ok(out)
    }

    fn parse_quoted_string(&mut self, context: StreamError) -> QueryResult<String> {
        let quote = self.reader.get()?;
        let mut bytes = Vec::new();
        loop {
            if self.reader.is_eof() {
                return Err(Self::syntax_error("unterminated string", context));
            }
            let b = self.reader.get()?;
            if b == quote {
                break;
            }
            bytes.push(b);
        }
        String::from_utf8(bytes).map_err(|_| Self::syntax_error("string is not valid UTF-8", context))
    }

    fn peek(&mut self) -> QueryResult<Option<&Token>> {
        if self.peeked.is_none() {
            let next = self.lex()?;
            self.peeked = Some(next);
        }
        Ok(self
            .peeked
            .as_ref()
            .and_then(|p| p.as_ref())
            .map(|s| &s.token))
    }

    fn next(&mut self) -> QueryResult<Option<Spanned>> {
        match self.peeked.take() {
            Some(spanned) => Ok(spanned),
            None => self.lex(),
        }
    }

    /// Next token, failing with `expected` at end of input
    fn expect_token(&mut self, expected: &str) -> QueryResult<Spanned> {
        match self.next()? {
            Some(spanned) => Ok(spanned),
            None => Err(Self::syntax_error(
                format!("expected {}, found end of query", expected),
                self.reader.error_here(),
            )),
        }
    }

    fn unexpected(spanned: Spanned, expected: &str) -> QueryError {
        Self::syntax_error(
            format!("expected {}, found {}", expected, spanned.token),
            spanned.context,
        )
    }

    fn peek_keyword(&mut self, keyword: &str) -> QueryResult<bool> {
        Ok(matches!(self.peek()?, Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword)))
    }

    fn peek_symbol(&mut self, symbol: char) -> QueryResult<bool> {
        Ok(matches!(self.peek()?, Some(Token::Symbol(c)) if *c == symbol))
    }

    fn expect_keyword(&mut self, keyword: &str) -> QueryResult<()> {
        let spanned = self.expect_token(keyword)?;
        match &spanned.token {
            Token::Word(w) if w.eq_ignore_ascii_case(keyword) => Ok(()),
            _ => Err(Self::unexpected(spanned, keyword)),
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> QueryResult<()> {
        let expected = format!("'{}'", symbol);
        let spanned = self.expect_token(&expected)?;
        match spanned.token {
            Token::Symbol(c) if c == symbol => Ok(()),
            _ => Err(Self::unexpected(spanned, &expected)),
        }
    }

    fn parse_identifier(&mut self) -> QueryResult<String> {
        let spanned = self.expect_token("metric name")?;
        match spanned.token {
            Token::Word(w) => Ok(w),
            _ => Err(Self::unexpected(spanned, "metric name")),
        }
    }

    fn parse_number(&mut self, what: &str) -> QueryResult<u64> {
        let spanned = self.expect_token(what)?;
        match spanned.token {
            Token::Number(n) => Ok(n),
            _ => Err(Self::unexpected(spanned, what)),
        }
    }

    // ---- grammar ----

    fn parse_full_query(&mut self) -> QueryResult<QueryDefinition> {
        let metrics = self.parse_select_clause()?;
        let mut definition = QueryDefinition {
            metrics,
            ..Default::default()
        };

        if self.peek_keyword("between")? {
            let (begin, end) = self.parse_between_clause()?;
            definition.begin = Some(begin);
            definition.end = Some(end);
        }

        while self.peek_symbol('|')? {
            self.next()?;
            definition.stages.push(self.parse_stage()?);
        }

        match self.next()? {
            None => Ok(definition),
            Some(spanned) => Err(Self::syntax_error(
                format!("unexpected {} after query", spanned.token),
                spanned.context,
            )),
        }
    }

    fn parse_select_clause(&mut self) -> QueryResult<Vec<String>> {
        self.expect_keyword("select")?;
        let mut metrics = vec![self.parse_identifier()?];
        while self.peek_symbol(',')? {
            self.next()?;
            metrics.push(self.parse_identifier()?);
        }
        Ok(metrics)
    }

    fn parse_between_clause(&mut self) -> QueryResult<(u64, u64)> {
        self.expect_keyword("between")?;
        let begin = self.parse_time()?;
        self.expect_keyword("and")?;
        let end = self.parse_time()?;
        Ok((begin, end))
    }

    fn parse_time(&mut self) -> QueryResult<u64> {
        let spanned = self.expect_token("timestamp")?;
        match &spanned.token {
            Token::Number(n) => Ok(*n),
            Token::Quoted(s) => {
                let parsed = DateTime::parse_from_rfc3339(s).map_err(|e| {
                    Self::syntax_error(format!("invalid datetime '{}': {}", s, e), spanned.context.clone())
                })?;
                u64::try_from(parsed.timestamp_millis()).map_err(|_| {
                    Self::syntax_error(format!("datetime '{}' is before the epoch", s), spanned.context.clone())
                })
            }
            _ => Err(Self::unexpected(spanned, "timestamp")),
        }
    }

    fn parse_stage(&mut self) -> QueryResult<StageSpec> {
        let spanned = self.expect_token("stage")?;
        let keyword = match &spanned.token {
            Token::Word(w) => w.to_ascii_lowercase(),
            _ => return Err(Self::unexpected(spanned, "stage")),
        };

        match keyword.as_str() {
            "sample" => self.parse_sample_stage(),
            "resample" => self.parse_resample_stage(),
            "filter" => self.parse_filter_stage(),
            _ => Err(Self::syntax_error(
                format!("unknown stage '{}'", keyword),
                spanned.context,
            )),
        }
    }

    fn parse_sample_stage(&mut self) -> QueryResult<StageSpec> {
        let spanned = self.expect_token("sampling algorithm")?;
        let algorithm = match spanned.token {
            Token::Word(w) => w,
            _ => return Err(Self::unexpected(spanned, "sampling algorithm")),
        };
        self.expect_symbol('(')?;
        let spanned = self.expect_token("sample size")?;
        let size = match &spanned.token {
            Token::Number(n) => usize::try_from(*n).map_err(|_| {
                Self::syntax_error(
                    format!("sample size {} is too large", n),
                    spanned.context.clone(),
                )
            })?,
            _ => return Err(Self::unexpected(spanned, "sample size")),
        };
        self.expect_symbol(')')?;

        Ok(StageSpec::Sample { algorithm, size })
    }

    fn parse_resample_stage(&mut self) -> QueryResult<StageSpec> {
        let width = self.parse_number("bucket width")?;

        let reducer = if matches!(self.peek()?, Some(Token::Word(_))) {
            let spanned = self.expect_token("reducer")?;
            let name = match &spanned.token {
                Token::Word(w) => w.clone(),
                _ => return Err(Self::unexpected(spanned, "reducer")),
            };
            match AggregationFunc::from_str(&name) {
                Some(func) => Some(func),
                None => {
                    return Err(Self::syntax_error(
                        format!("unknown reducer '{}'", name),
                        spanned.context,
                    ))
                }
            }
        } else {
            None
        };

        Ok(StageSpec::Resample { width, reducer })
    }

    fn parse_filter_stage(&mut self) -> QueryResult<StageSpec> {
        self.expect_keyword("id")?;

        if self.peek_keyword("in")? {
            self.next()?;
            self.expect_symbol('(')?;
            let mut ids = vec![self.parse_number("series id")?];
            while self.peek_symbol(',')? {
                self.next()?;
                ids.push(self.parse_number("series id")?);
            }
            self.expect_symbol(')')?;
            return Ok(StageSpec::FilterIds { ids });
        }

        self.expect_symbol('=')?;
        let id = self.parse_number("series id")?;
        Ok(StageSpec::FilterId { id })
    }
}
