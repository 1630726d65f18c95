//! Parsers for the parts of the source format that are not line-oriented: comments and integer
//! literals.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_till, take_until},
    character::complete::{digit1, hex_digit1, one_of},
    combinator::{all_consuming, map, map_res, not, opt, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};

use crate::error::{AssembleError, SyntaxError};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Comment { newlines: usize },
}

fn line_comment(input: &str) -> IResult<&str, Segment> {
    value(
        Segment::Comment { newlines: 0 },
        pair(tag("//"), take_till(|c: char| c == '\n')),
    )(input)
}

fn block_comment(input: &str) -> IResult<&str, Segment> {
    map(
        delimited(tag("/*"), take_until("*/"), tag("*/")),
        |body: &str| Segment::Comment { newlines: body.matches('\n').count() },
    )(input)
}

fn text(input: &str) -> IResult<&str, Segment> {
    map(is_not("/"), Segment::Text)(input)
}

/// A slash that does not start a comment.
fn slash(input: &str) -> IResult<&str, Segment> {
    map(terminated(tag("/"), not(tag("*"))), Segment::Text)(input)
}

/// Removes `// line` and `/* block */` comments from the source.
///
/// Block comments may span multiple lines. Their line breaks are kept so that line numbers in
/// the result match the original source.
///
/// # Errors
/// Returns a [SyntaxError::UnterminatedComment] located at the line of the opening `/*`.
pub fn strip_comments(source: &str) -> Result<String, AssembleError> {
    let (rest, segments) = many0(alt((line_comment, block_comment, text, slash)))(source)
        .unwrap_or((source, Vec::new()));

    if !rest.is_empty() {
        let line = source[..source.len() - rest.len()].matches('\n').count() + 1;
        return Err(AssembleError::new(line, SyntaxError::UnterminatedComment));
    }

    let mut stripped = String::with_capacity(source.len());

    for segment in segments {
        match segment {
            Segment::Text(text) => stripped.push_str(text),
            Segment::Comment { newlines } => stripped.extend(std::iter::repeat('\n').take(newlines)),
        }
    }

    Ok(stripped)
}

fn take_i64(input: &str) -> IResult<&str, i64> {
    let (input, sign) = opt(one_of("+-"))(input)?;

    let (input, magnitude) = alt((
        map_res(
            preceded(alt((tag("0x"), tag("0X"))), hex_digit1),
            |digits: &str| i64::from_str_radix(digits, 16),
        ),
        map_res(
            digit1,
            |digits: &str| i64::from_str_radix(digits, 10),
        ),
    ))(input)?;

    match sign {
        Some('-') => Ok((input, -magnitude)),
        _ => Ok((input, magnitude)),
    }
}

/// Parses an integer literal: decimal, or hexadecimal when prefixed with `0x` or `0X`. An
/// optional sign is accepted.
///
/// Returns `None` unless the whole token is a literal.
pub fn parse_integer(token: &str) -> Option<i64> {
    all_consuming(take_i64)(token)
        .ok()
        .map(|(_, value)| value)
}
