//! SDP text parser
//!
//! A lenient line parser for RFC 8866 documents. It checks what the
//! negotiation layer depends on (`v=` first, well-formed `o=`, `c=`, `m=`,
//! `b=`, `t=` lines, and typed attributes) and keeps anything it does not
//! understand as a generic attribute instead of failing.

use crate::attributes::{
    parse_crypto, parse_extmap, parse_fmtp, parse_group, parse_rtcp_fb, parse_rtpmap, parse_sctpmap,
    MediaDirection,
};
use crate::error::{Error, Result};
use crate::types::{
    Bandwidth, ConnectionData, MediaDescription, Origin, ParsedAttribute, SdpSession, TimeDescription,
};
use bytes::Bytes;
use std::str::{self, FromStr};
use tracing::trace;

/// Parses a single attribute line value (`<name>[:<value>]`, without `a=`)
pub fn parse_attribute(line: &str) -> Result<ParsedAttribute> {
    let (name, value) = match line.split_once(':') {
        Some((name, value)) => (name.trim(), Some(value)),
        None => (line.trim(), None),
    };

    if name.is_empty() {
        return Err(Error::SdpParsingError(format!("Empty attribute name: a={line}")));
    }

    let attr = match (name, value) {
        ("rtpmap", Some(v)) => ParsedAttribute::RtpMap(parse_rtpmap(v)?),
        ("fmtp", Some(v)) => ParsedAttribute::Fmtp(parse_fmtp(v)?),
        ("ptime", Some(v)) => ParsedAttribute::Ptime(parse_number(name, v)?),
        ("maxptime", Some(v)) => ParsedAttribute::MaxPtime(parse_number(name, v)?),
        ("setup", Some(v)) => ParsedAttribute::Setup(v.trim().to_string()),
        ("mid", Some(v)) => ParsedAttribute::Mid(v.trim().to_string()),
        ("group", Some(v)) => {
            let (semantics, mids) = parse_group(v)?;
            ParsedAttribute::Group(semantics, mids)
        }
        ("rtcp-mux", None) => ParsedAttribute::RtcpMux,
        ("rtcp-fb", Some(v)) => {
            let (pt, fb_type, param) = parse_rtcp_fb(v)?;
            ParsedAttribute::RtcpFb(pt, fb_type, param)
        }
        ("extmap", Some(v)) => {
            let (id, direction, uri, params) = parse_extmap(v)?;
            ParsedAttribute::ExtMap(id, direction, uri, params)
        }
        ("sctpmap", Some(v)) => {
            let (port, app, streams) = parse_sctpmap(v)?;
            ParsedAttribute::SctpMap(port, app, streams)
        }
        ("crypto", Some(v)) => ParsedAttribute::Crypto(parse_crypto(v)?),
        (name, None) if MediaDirection::is_direction(name) => ParsedAttribute::Direction(name.parse()?),
        (name, None) => ParsedAttribute::Flag(name.to_string()),
        (name, Some(v)) => ParsedAttribute::Value(name.to_string(), v.trim().to_string()),
    };

    Ok(attr)
}

fn parse_number(name: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::SdpParsingError(format!("Invalid {name} value: {value}")))
}

fn parse_origin(value: &str) -> Result<Origin> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 6 {
        return Err(Error::SdpParsingError(format!("Invalid origin line: o={value}")));
    }

    let number = |field: &str| {
        field
            .parse::<u64>()
            .map_err(|_| Error::SdpParsingError(format!("Invalid origin number '{field}' in o={value}")))
    };

    Ok(Origin {
        username: parts[0].to_string(),
        sess_id: number(parts[1])?,
        sess_version: number(parts[2])?,
        net_type: parts[3].to_string(),
        addr_type: parts[4].to_string(),
        unicast_address: parts[5].to_string(),
    })
}

fn parse_connection(value: &str) -> Result<ConnectionData> {
    match value.split_whitespace().collect::<Vec<_>>().as_slice() {
        [net_type, addr_type, address] => Ok(ConnectionData {
            net_type: net_type.to_string(),
            addr_type: addr_type.to_string(),
            connection_address: address.to_string(),
        }),
        _ => Err(Error::SdpParsingError(format!("Invalid connection line: c={value}"))),
    }
}

fn parse_bandwidth(value: &str) -> Result<Bandwidth> {
    let (bwtype, bandwidth) = value
        .split_once(':')
        .ok_or_else(|| Error::SdpParsingError(format!("Invalid bandwidth line: b={value}")))?;
    Ok(Bandwidth {
        bwtype: bwtype.trim().to_string(),
        bandwidth: parse_number("bandwidth", bandwidth)?,
    })
}

fn parse_time(value: &str) -> Result<TimeDescription> {
    match value.split_whitespace().collect::<Vec<_>>().as_slice() {
        [start, stop] => Ok(TimeDescription {
            start_time: start
                .parse()
                .map_err(|_| Error::SdpParsingError(format!("Invalid start time: t={value}")))?,
            stop_time: stop
                .parse()
                .map_err(|_| Error::SdpParsingError(format!("Invalid stop time: t={value}")))?,
        }),
        _ => Err(Error::SdpParsingError(format!("Invalid time line: t={value}"))),
    }
}

/// Parses an `m=` line value. Formats may be empty (rejected media).
pub fn parse_media_description_line(value: &str) -> Result<MediaDescription> {
    let mut parts = value.split_whitespace();
    let (media, port, protocol) = match (parts.next(), parts.next(), parts.next()) {
        (Some(media), Some(port), Some(protocol)) => (media, port, protocol),
        _ => return Err(Error::SdpParsingError(format!("Invalid media line: m={value}"))),
    };

    // <port>/<number of ports> is accepted, the count is not kept
    let port = port
        .split('/')
        .next()
        .and_then(|p| p.parse::<u16>().ok())
        .ok_or_else(|| Error::SdpParsingError(format!("Invalid media port in m={value}")))?;

    Ok(MediaDescription::new(
        media,
        port,
        protocol,
        parts.map(str::to_string).collect(),
    ))
}

/// Parses a complete SDP document
pub fn parse_sdp(content: &str) -> Result<SdpSession> {
    let mut version: Option<String> = None;
    let mut origin: Option<Origin> = None;
    let mut session_name: Option<String> = None;
    let mut connection_info = None;
    let mut bandwidths = Vec::new();
    let mut time_descriptions = Vec::new();
    let mut generic_attributes = Vec::new();
    let mut media_descriptions: Vec<MediaDescription> = Vec::new();

    for raw_line in content.lines() {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }

        let (kind, value) = match line.split_once('=') {
            Some((kind, value)) if kind.len() == 1 => (kind, value),
            _ => return Err(Error::SdpParsingError(format!("Invalid SDP line: {line}"))),
        };

        if version.is_none() && kind != "v" {
            return Err(Error::InvalidFormat(format!("SDP must start with v=, found {line}")));
        }

        match kind {
            "v" => {
                if version.is_some() {
                    return Err(Error::InvalidFormat("Duplicate v= line".to_string()));
                }
                if value.trim() != "0" {
                    return Err(Error::SdpParsingError(format!("Unsupported SDP version: {value}")));
                }
                version = Some(value.trim().to_string());
            }
            "o" => origin = Some(parse_origin(value)?),
            "s" => session_name = Some(value.to_string()),
            "c" => {
                let connection = parse_connection(value)?;
                match media_descriptions.last_mut() {
                    Some(media) => media.connection_info = Some(connection),
                    None => connection_info = Some(connection),
                }
            }
            "b" => {
                let bandwidth = parse_bandwidth(value)?;
                match media_descriptions.last_mut() {
                    Some(media) => media.bandwidths.push(bandwidth),
                    None => bandwidths.push(bandwidth),
                }
            }
            "t" => time_descriptions.push(parse_time(value)?),
            "m" => media_descriptions.push(parse_media_description_line(value)?),
            "a" => {
                let attr = parse_attribute(value)?;
                match media_descriptions.last_mut() {
                    Some(media) => media.attributes.push(attr),
                    None => generic_attributes.push(attr),
                }
            }
            "i" | "u" | "e" | "p" | "k" | "r" | "z" => {
                trace!("Ignoring SDP line {}", line);
            }
            other => {
                return Err(Error::SdpParsingError(format!("Unknown SDP line type '{other}'")));
            }
        }
    }

    let version = version.ok_or_else(|| Error::InvalidFormat("Missing v= line".to_string()))?;
    let origin = origin.ok_or_else(|| Error::InvalidFormat("Missing o= line".to_string()))?;
    if time_descriptions.is_empty() {
        time_descriptions.push(TimeDescription::default());
    }

    Ok(SdpSession {
        version,
        origin,
        session_name: session_name.unwrap_or_else(|| "-".to_string()),
        connection_info,
        bandwidths,
        time_descriptions,
        generic_attributes,
        media_descriptions,
    })
}

/// Parses an SDP body received as bytes
pub fn parse_sdp_bytes(content: &Bytes) -> Result<SdpSession> {
    let text = str::from_utf8(content)
        .map_err(|e| Error::SdpParsingError(format!("SDP is not valid UTF-8: {e}")))?;
    parse_sdp(text)
}

impl FromStr for SdpSession {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_sdp(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "v=0\r\n\
        o=- 123456 0 IN IP4 222.222.222.222\r\n\
        s=TestSession\r\n\
        c=IN IP4 222.222.222.222\r\n\
        t=0 0\r\n\
        a=group:BUNDLE audio0 video0\r\n\
        m=audio 9 RTP/AVP 0 96\r\n\
        b=AS:64\r\n\
        a=rtpmap:0 PCMU/8000/1\r\n\
        a=rtpmap:96 opus/48000/2\r\n\
        a=fmtp:96 useinbandfec=1\r\n\
        a=sendonly\r\n\
        a=mid:audio0\r\n\
        m=video 0 RTP/AVPF\r\n\
        a=mid:video0\r\n\
        a=x-custom:value\r\n";

    #[test]
    fn test_parse_offer() {
        let sdp = parse_sdp(OFFER).unwrap();
        assert_eq!(sdp.origin.sess_id, 123456);
        assert_eq!(sdp.session_name, "TestSession");
        assert_eq!(sdp.groups().count(), 1);
        assert_eq!(sdp.media_descriptions.len(), 2);

        let audio = &sdp.media_descriptions[0];
        assert_eq!(audio.formats, vec!["0", "96"]);
        assert_eq!(audio.bandwidths, vec![Bandwidth::new("AS", 64)]);
        assert_eq!(audio.direction(), Some(MediaDirection::SendOnly));
        assert_eq!(audio.mid(), Some("audio0"));

        let video = &sdp.media_descriptions[1];
        assert!(video.is_rejected());
        assert!(video.formats.is_empty());
        assert_eq!(
            video.attributes[1],
            ParsedAttribute::Value("x-custom".to_string(), "value".to_string())
        );
    }

    #[test]
    fn test_display_reparses_to_same_session() {
        let sdp = parse_sdp(OFFER).unwrap();
        let reparsed: SdpSession = sdp.to_string().parse().unwrap();
        assert_eq!(sdp, reparsed);
    }

    #[test]
    fn test_bare_newlines_accepted() {
        let sdp = parse_sdp("v=0\no=- 1 2 IN IP4 1.1.1.1\ns=-\nt=0 0\nm=application 9 DTLS/SCTP 5000\n").unwrap();
        assert_eq!(sdp.media_descriptions[0].formats, vec!["5000"]);
    }

    #[test]
    fn test_structural_errors() {
        assert!(parse_sdp("o=- 1 2 IN IP4 1.1.1.1\r\nv=0\r\n").is_err());
        assert!(parse_sdp("v=0\r\ns=-\r\n").is_err());
        assert!(parse_sdp("v=0\r\no=- 1 IN IP4 1.1.1.1\r\n").is_err());
        assert!(parse_sdp("v=0\r\no=- 1 2 IN IP4 1.1.1.1\r\nm=audio RTP/AVP\r\n").is_err());
        assert!(parse_sdp("v=0\r\no=- 1 2 IN IP4 1.1.1.1\r\nm=audio 9 RTP/AVP 96\r\na=rtpmap:96 opus\r\n").is_err());
        assert!(parse_sdp("v=0\r\no=- 1 2 IN IP4 1.1.1.1\r\ngarbage\r\n").is_err());
    }

    #[test]
    fn test_parse_bytes() {
        let sdp = parse_sdp_bytes(&Bytes::from_static(OFFER.as_bytes())).unwrap();
        assert_eq!(sdp.to_bytes(), Bytes::from(sdp.to_string()));
    }

    #[test]
    fn test_attribute_fallbacks() {
        assert_eq!(parse_attribute("rtcp-mux").unwrap(), ParsedAttribute::RtcpMux);
        assert_eq!(parse_attribute("ice-lite").unwrap(), ParsedAttribute::Flag("ice-lite".to_string()));
        assert_eq!(
            parse_attribute("framerate:30").unwrap(),
            ParsedAttribute::Value("framerate".to_string(), "30".to_string())
        );
        assert!(parse_attribute("ptime:abc").is_err());
    }

    proptest::proptest! {
        #[test]
        fn parse_never_panics(body in "[a-z]=[ -~]{0,40}(\r\n[a-z]=[ -~]{0,40}){0,8}") {
            let _ = parse_sdp(&format!("v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\n{body}"));
        }

        #[test]
        fn media_line_keeps_formats(formats in proptest::collection::vec(0u8..128, 0..8)) {
            let fmts: Vec<String> = formats.iter().map(|f| f.to_string()).collect();
            let media = parse_media_description_line(&format!("audio 9 RTP/AVP {}", fmts.join(" "))).unwrap();
            proptest::prop_assert_eq!(media.formats, fmts);
        }
    }
}
