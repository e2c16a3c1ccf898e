//! RTP Header Extension Attribute Parser (RFC 8285)
//!
//! Format: a=extmap:<value>[/<direction>] <URI> [<extension attributes>]

use crate::attributes::common::{non_ws_string, positive_integer};
use crate::attributes::MediaDirection;
use crate::error::{Error, Result};
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space1},
    combinator::{opt, rest},
    sequence::{preceded, tuple},
    IResult,
};

fn extmap_parser(input: &str) -> IResult<&str, (u32, Option<&str>, &str, &str)> {
    tuple((
        positive_integer,
        opt(preceded(char('/'), take_while1(|c: char| c.is_ascii_alphabetic()))),
        preceded(space1, non_ws_string),
        rest,
    ))(input)
}

/// Parses an extmap value into `(id, direction, uri, attributes)`
pub fn parse_extmap(value: &str) -> Result<(u16, Option<String>, String, Option<String>)> {
    let (_, (id, direction, uri, params)) = extmap_parser(value.trim())
        .map_err(|_| Error::SdpParsingError(format!("Invalid extmap format: {value}")))?;

    let id = u16::try_from(id)
        .ok()
        .filter(|id| *id >= 1)
        .ok_or_else(|| Error::SdpParsingError(format!("Invalid extmap id: {id}")))?;

    if let Some(direction) = direction {
        direction.parse::<MediaDirection>()?;
    }

    let params = params.trim();
    Ok((
        id,
        direction.map(str::to_string),
        uri.to_string(),
        if params.is_empty() { None } else { Some(params.to_string()) },
    ))
}
