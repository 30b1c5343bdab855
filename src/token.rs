#[cfg(feature = "std")]
use crate::error::TableError;
#[cfg(feature = "std")]
use crate::tally::Tally;

/// Marker that turns a line into a decrement.
pub const DECREMENT_PREFIX: u8 = b'-';

/// What a token asks the table to do with its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Add one, inserting the key at 1 if it is new.
    Increment,
    /// Subtract one, but only if the key is already present.
    Decrement,
}

/// One parsed input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The key with the terminator and any decrement marker removed.
    pub key: &'a [u8],
    /// Whether the key is counted up or down.
    pub kind: TokenKind,
}

impl<'a> Token<'a> {
    /// Parses a raw input line.
    ///
    /// The line is cut at its first `\r` or `\n`. A leading `-` makes the
    /// token a decrement of the remaining bytes; anything else, including an
    /// empty line, is an increment of the whole line.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::Token;
    /// use probe_tally::TokenKind;
    ///
    /// let token = Token::parse(b"-apple\r\n");
    /// assert_eq!(token.key, b"apple");
    /// assert_eq!(token.kind, TokenKind::Decrement);
    ///
    /// assert_eq!(Token::parse(b"pear\n").kind, TokenKind::Increment);
    /// ```
    pub fn parse(line: &'a [u8]) -> Self {
        let end = line
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(line.len());
        let line = &line[..end];

        match line.split_first() {
            Some((&DECREMENT_PREFIX, rest)) => Token {
                key: rest,
                kind: TokenKind::Decrement,
            },
            _ => Token {
                key: line,
                kind: TokenKind::Increment,
            },
        }
    }

    /// The delta this token applies when the key is present.
    pub fn delta(&self) -> i64 {
        match self.kind {
            TokenKind::Increment => 1,
            TokenKind::Decrement => -1,
        }
    }
}

/// Counters for a [`tally_reader`] run.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallySummary {
    /// Lines read from the input.
    pub lines: usize,
    /// Decrements dropped because their key had never been counted.
    pub ignored_decrements: usize,
}

/// Error from [`tally_reader`]: either the input failed or the table did.
#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// Reading the input failed.
    #[error("failed to read input")]
    Io(#[from] std::io::Error),
    /// The table rejected an update.
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Feeds every newline-delimited line of `reader` into `table`.
///
/// Lines are raw bytes; no UTF-8 validation happens here.
///
/// # Examples
///
/// ```rust
/// use probe_tally::FrequencyTable;
/// use probe_tally::token::tally_reader;
///
/// let input: &[u8] = b"a\na\n-a\nb\n-z\n";
/// let mut table = FrequencyTable::new();
/// let summary = tally_reader(input, &mut table).unwrap();
///
/// assert_eq!(summary.lines, 5);
/// assert_eq!(summary.ignored_decrements, 1);
/// assert_eq!(table.find("a"), Some(1));
/// assert_eq!(table.find("b"), Some(1));
/// assert_eq!(table.find("z"), None);
/// ```
#[cfg(feature = "std")]
pub fn tally_reader<R, T>(mut reader: R, table: &mut T) -> Result<TallySummary, TallyError>
where
    R: std::io::BufRead,
    T: Tally + ?Sized,
{
    let mut summary = TallySummary::default();
    let mut line = alloc::vec::Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        summary.lines += 1;

        let token = Token::parse(&line);
        if table.apply(token)?.is_none() {
            summary.ignored_decrements += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_terminators() {
        assert_eq!(Token::parse(b"word\n").key, b"word");
        assert_eq!(Token::parse(b"word\r\n").key, b"word");
        assert_eq!(Token::parse(b"word").key, b"word");
        assert_eq!(Token::parse(b"wo\rrd\n").key, b"wo");
    }

    #[test]
    fn only_leading_dash_decrements() {
        let token = Token::parse(b"-x\n");
        assert_eq!(token.key, b"x");
        assert_eq!(token.delta(), -1);

        let token = Token::parse(b"x-y\n");
        assert_eq!(token.key, b"x-y");
        assert_eq!(token.delta(), 1);

        let token = Token::parse(b"--x");
        assert_eq!(token.key, b"-x");
        assert_eq!(token.kind, TokenKind::Decrement);
    }

    #[test]
    fn empty_lines_are_empty_keys() {
        assert_eq!(
            Token::parse(b"\n"),
            Token {
                key: b"",
                kind: TokenKind::Increment
            }
        );
        assert_eq!(
            Token::parse(b"-\n"),
            Token {
                key: b"",
                kind: TokenKind::Decrement
            }
        );
    }

    #[test]
    #[cfg(feature = "std")]
    fn reader_without_trailing_newline() {
        let mut table = crate::FrequencyTable::new();
        let summary = tally_reader(&b"x\ny"[..], &mut table).unwrap();
        assert_eq!(summary.lines, 2);
        assert_eq!(table.find("y"), Some(1));
    }

    #[test]
    #[cfg(feature = "std")]
    fn reader_with_chained_table() {
        let mut table = crate::ChainedTable::new();
        let summary = tally_reader(&b"-q\nq\n-q\n-q\n"[..], &mut table).unwrap();
        assert_eq!(summary.ignored_decrements, 1);
        assert_eq!(table.find("q"), Some(-1));
    }
}
