//! SCTP Map Attribute Parser (draft-ietf-mmusic-sctp-sdp-05)
//!
//! Format: a=sctpmap:<port> <application> <streams>

use crate::attributes::common::{positive_integer, to_result, token};
use crate::error::Result;
use nom::{
    character::complete::space1,
    combinator::map_res,
    sequence::{preceded, tuple},
    IResult,
};

fn sctpmap_parser(input: &str) -> IResult<&str, (u16, &str, u32)> {
    tuple((
        map_res(positive_integer, u16::try_from),
        preceded(space1, token),
        preceded(space1, positive_integer),
    ))(input)
}

pub fn parse_sctpmap(value: &str) -> Result<(u16, String, u32)> {
    to_result(sctpmap_parser(value.trim()), "Invalid sctpmap format")
        .map(|(port, app, streams)| (port, app.to_string(), streams))
}
