//! Common parsing utilities shared by the attribute parsers

use crate::error::{Error, Result};
use nom::{
    bytes::complete::take_while1,
    character::complete::digit1,
    combinator::map_res,
    IResult,
};

/// RFC 8866 token character
pub fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '{' | '|' | '}' | '~'
        )
}

/// Parses a token (one or more token characters)
pub fn token(input: &str) -> IResult<&str, &str> {
    take_while1(is_token_char)(input)
}

/// Parses a positive integer
pub fn positive_integer(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

/// Any run of non-whitespace characters
pub fn non_ws_string(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

/// Turns a nom result into a crate result, requiring the whole input to be consumed
pub fn to_result<T>(res: IResult<&str, T>, err_msg: &str) -> Result<T> {
    match res {
        Ok((rest, value)) if rest.trim().is_empty() => Ok(value),
        Ok((rest, _)) => Err(Error::SdpParsingError(format!("{err_msg}: unexpected trailing input '{rest}'"))),
        Err(e) => Err(Error::SdpParsingError(format!("{err_msg}: {e}"))),
    }
}
