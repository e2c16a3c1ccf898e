//! SDP Format Parameters Attribute Parser
//!
//! Format: a=fmtp:<format> <format specific parameters>
//!
//! The parameters are kept verbatim, their syntax is codec specific.

use crate::attributes::common::token;
use crate::error::{Error, Result};
use crate::types::FmtpAttribute;
use nom::{
    character::complete::space1,
    combinator::rest,
    sequence::separated_pair,
    IResult,
};

fn fmtp_parser(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(token, space1, rest)(input)
}

pub fn parse_fmtp(value: &str) -> Result<FmtpAttribute> {
    match fmtp_parser(value.trim()) {
        Ok((_, (format, parameters))) if !parameters.trim().is_empty() => Ok(FmtpAttribute {
            format: format.to_string(),
            parameters: parameters.trim().to_string(),
        }),
        _ => Err(Error::SdpParsingError(format!("Invalid fmtp format: {value}"))),
    }
}
