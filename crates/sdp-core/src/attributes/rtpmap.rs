//! SDP RTP Map Attribute Parser
//!
//! Format: a=rtpmap:<payload type> <encoding name>/<clock rate>[/<encoding parameters>]

use crate::attributes::common::{positive_integer, to_result};
use crate::error::{Error, Result};
use crate::types::RtpMapAttribute;
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, digit1, space1},
    combinator::{map, map_res, opt},
    sequence::{preceded, tuple},
    IResult,
};

/// Encoding names may contain '-' and '.' (H263-1998, MP4V-ES)
fn encoding_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))(input)
}

fn payload_type(input: &str) -> IResult<&str, u8> {
    map_res(positive_integer, |pt| if pt <= 127 { Ok(pt as u8) } else { Err(()) })(input)
}

fn rtpmap_parser(input: &str) -> IResult<&str, RtpMapAttribute> {
    map(
        tuple((
            payload_type,
            preceded(space1, encoding_name),
            preceded(char('/'), positive_integer),
            opt(preceded(char('/'), digit1)),
        )),
        |(payload_type, name, clock_rate, params)| RtpMapAttribute {
            payload_type,
            encoding_name: name.to_string(),
            clock_rate,
            encoding_params: params.map(str::to_string),
        },
    )(input)
}

/// Parses an rtpmap attribute value
pub fn parse_rtpmap(value: &str) -> Result<RtpMapAttribute> {
    to_result(rtpmap_parser(value.trim()), "Invalid rtpmap")
        .map_err(|_| Error::SdpParsingError(format!("Invalid rtpmap format: {value}")))
}
