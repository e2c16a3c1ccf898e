//! RTCP Feedback Attribute Parser (RFC 4585)
//!
//! Format: a=rtcp-fb:<payload type|*> <type> [<parameters>]

use crate::attributes::common::{non_ws_string, token};
use crate::error::{Error, Result};
use nom::{
    character::complete::space1,
    combinator::rest,
    sequence::{preceded, tuple},
    IResult,
};

fn rtcp_fb_parser(input: &str) -> IResult<&str, (&str, &str, &str)> {
    tuple((non_ws_string, preceded(space1, token), rest))(input)
}

/// Parses an rtcp-fb value into `(payload, type, parameter)`
pub fn parse_rtcp_fb(value: &str) -> Result<(String, String, Option<String>)> {
    let (_, (pt, fb_type, param)) = rtcp_fb_parser(value.trim())
        .map_err(|_| Error::SdpParsingError(format!("Invalid rtcp-fb format: {value}")))?;

    if pt != "*" && pt.parse::<u8>().is_err() {
        return Err(Error::SdpParsingError(format!("Invalid rtcp-fb payload type: {pt}")));
    }

    let param = param.trim();
    Ok((
        pt.to_string(),
        fb_type.to_string(),
        if param.is_empty() { None } else { Some(param.to_string()) },
    ))
}
