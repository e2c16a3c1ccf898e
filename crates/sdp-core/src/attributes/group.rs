//! SDP Group Attribute Parser
//!
//! Implements parser for group attributes as defined in RFC 5888.
//! Format: a=group:<semantics> <identification-tag> ...

use crate::attributes::common::{to_result, token};
use nom::{
    bytes::complete::take_while1,
    character::complete::space1,
    combinator::map,
    multi::many0,
    sequence::{pair, preceded},
    IResult,
};
use crate::error::Result;

/// Parser for semantics values (like BUNDLE, LS, etc.)
fn semantics_parser(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_')(input)
}

fn group_parser(input: &str) -> IResult<&str, (String, Vec<String>)> {
    pair(
        map(semantics_parser, str::to_string),
        many0(preceded(space1, map(token, str::to_string))),
    )(input)
}

/// Parses a group value into `(semantics, mids)`.
///
/// A group without identification tags is accepted; the negotiation layer
/// never emits one but peers occasionally do.
pub fn parse_group(value: &str) -> Result<(String, Vec<String>)> {
    to_result(group_parser(value.trim()), "Invalid group format")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_group() {
        let (semantics, mids) = parse_group("BUNDLE audio0 video0 application0").unwrap();
        assert_eq!(semantics, "BUNDLE");
        assert_eq!(mids, vec!["audio0", "video0", "application0"]);
    }

    #[test]
    fn test_group_without_mids() {
        let (semantics, mids) = parse_group("LS").unwrap();
        assert_eq!(semantics, "LS");
        assert!(mids.is_empty());
    }

    #[test]
    fn test_invalid_group() {
        assert!(parse_group("").is_err());
        assert!(parse_group("BUNDLE audio0 \"bad\"").is_err());
    }
}
