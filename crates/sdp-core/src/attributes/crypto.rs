//! SDES Crypto Attribute Parser (RFC 4568)
//!
//! Format: a=crypto:<tag> <crypto-suite> <key-params> [<session-params>]
//!
//! Multiple key parameters are separated by ';'. Only the outer structure is
//! parsed here; `inline:` key material is interpreted by the key exchange.

use crate::attributes::common::{non_ws_string, positive_integer, token};
use crate::error::{Error, Result};
use crate::types::CryptoAttribute;
use nom::{
    character::complete::{space0, space1},
    multi::many0,
    sequence::{preceded, terminated, tuple},
    IResult,
};

fn crypto_parser(input: &str) -> IResult<&str, (u32, &str, &str, Vec<&str>)> {
    tuple((
        positive_integer,
        preceded(space1, token),
        preceded(space1, non_ws_string),
        terminated(many0(preceded(space1, non_ws_string)), space0),
    ))(input)
}

pub fn parse_crypto(value: &str) -> Result<CryptoAttribute> {
    let (rest, (tag, suite, key_params, session_params)) = crypto_parser(value.trim())
        .map_err(|_| Error::SdpParsingError(format!("Invalid crypto format: {value}")))?;

    if !rest.is_empty() {
        return Err(Error::SdpParsingError(format!("Invalid crypto format: {value}")));
    }

    let key_params: Vec<String> = key_params.split(';').filter(|p| !p.is_empty()).map(str::to_string).collect();
    if key_params.iter().any(|p| !p.contains(':')) {
        return Err(Error::SdpParsingError(format!("Invalid crypto key parameter: {value}")));
    }

    Ok(CryptoAttribute {
        tag,
        suite: suite.to_string(),
        key_params,
        session_params: session_params.into_iter().map(str::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crypto() {
        let crypto = parse_crypto(
            "1 AES_CM_128_HMAC_SHA1_80 inline:PS1uQCVeeCFCanVmcjkpPywjNWhcYD0mXXtxaVBR|2^20|1:32",
        )
        .unwrap();
        assert_eq!(crypto.tag, 1);
        assert_eq!(crypto.suite, "AES_CM_128_HMAC_SHA1_80");
        assert_eq!(crypto.key_params, vec!["inline:PS1uQCVeeCFCanVmcjkpPywjNWhcYD0mXXtxaVBR|2^20|1:32"]);
        assert!(crypto.session_params.is_empty());
    }

    #[test]
    fn test_crypto_with_session_params() {
        let crypto = parse_crypto("2 AES_CM_128_HMAC_SHA1_32 inline:NzB4d1BINUAvLEw6UzF3WSJ+PSdFcGdUJShpX1Zj UNENCRYPTED_SRTCP")
            .unwrap();
        assert_eq!(crypto.session_params, vec!["UNENCRYPTED_SRTCP"]);
    }

    #[test]
    fn test_invalid_crypto() {
        assert!(parse_crypto("AES_CM_128_HMAC_SHA1_80 inline:abc").is_err());
        assert!(parse_crypto("1 AES_CM_128_HMAC_SHA1_80 abc").is_err());
    }
}
