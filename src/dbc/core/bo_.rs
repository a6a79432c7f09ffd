use crate::dbc::core::{DbcFile, MessageRecord, MuxTag, SignalRecord, stream::TokenStream};
use crate::dbc::lexer::TokenKind;
use crate::types::{errors::ParseError, signal::ByteOrder};

/// Decode a `BO_` record and the `SG_` records that follow it.
/// `BO_ <id> <name>: <length> <sender>`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let raw_id: u32 = stream.expect_number()?;
    let name = stream.expect_word()?;
    stream.expect_punct(':')?;
    let length: usize = stream.expect_number()?;
    let sender = if stream.peek_is_name() {
        stream.expect_word()?
    } else {
        String::new()
    };
    stream.end_record();

    let mut signals: Vec<SignalRecord> = Vec::new();
    while stream.peek_is_word("SG_") {
        stream.advance();
        signals.push(decode_signal(stream)?);
    }

    file.messages.push(MessageRecord {
        raw_id,
        name,
        length,
        sender,
        signals,
    });
    Ok(())
}

/// `SG_ <name> [M|mX|mXM] : <start>|<length>@<order><sign> (<scale>,<offset>) [<min>|<max>] "<unit>" <receivers>`
fn decode_signal(stream: &mut TokenStream) -> Result<SignalRecord, ParseError> {
    let name = stream.expect_word()?;

    let mut mux = MuxTag::default();
    if !stream.peek_is_punct(':') {
        let token = stream.advance();
        mux = match &token.kind {
            TokenKind::Word(tag) => parse_mux_tag(tag),
            _ => None,
        }
        .ok_or_else(|| stream.error(&token, "invalid multiplexer indicator"))?;
    }
    stream.expect_punct(':')?;

    let start: u32 = stream.expect_number()?;
    stream.expect_punct('|')?;
    let length: u32 = stream.expect_number()?;
    stream.expect_punct('@')?;

    let order_token = stream.peek().clone();
    let byte_order = match stream.expect_number::<u8>()? {
        0 => ByteOrder::BigEndian,
        1 => ByteOrder::LittleEndian,
        _ => return Err(stream.error(&order_token, "byte order must be 0 or 1")),
    };
    let is_signed = if stream.eat_punct('-') {
        true
    } else {
        stream.expect_punct('+')?;
        false
    };

    stream.expect_punct('(')?;
    let scale: f64 = stream.expect_number()?;
    stream.expect_punct(',')?;
    let offset: f64 = stream.expect_number()?;
    stream.expect_punct(')')?;

    stream.expect_punct('[')?;
    let minimum: f64 = stream.expect_number()?;
    stream.expect_punct('|')?;
    let maximum: f64 = stream.expect_number()?;
    stream.expect_punct(']')?;

    let unit = stream.expect_string()?;

    let mut receivers: Vec<String> = Vec::new();
    while stream.peek_is_name() {
        receivers.push(stream.expect_word()?);
        stream.eat_punct(',');
    }
    stream.end_record();

    Ok(SignalRecord {
        name,
        mux,
        start,
        length,
        byte_order,
        is_signed,
        scale,
        offset,
        minimum,
        maximum,
        unit,
        receivers,
    })
}

/// `M`, `m<n>` or `m<n>M`.
fn parse_mux_tag(tag: &str) -> Option<MuxTag> {
    if tag == "M" {
        return Some(MuxTag {
            is_multiplexer: true,
            selector_value: None,
        });
    }
    let rest = tag.strip_prefix('m')?;
    let (digits, is_multiplexer) = match rest.strip_suffix('M') {
        Some(d) => (d, true),
        None => (rest, false),
    };
    Some(MuxTag {
        is_multiplexer,
        selector_value: Some(digits.parse().ok()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let text = r#"BO_ 2147484672 Engine: 8 Motor
 SG_ Mux M : 0|8@1+ (1,0) [0|0] "" Gateway
 SG_ Temp m1 : 15|12@0- (0.0625,250) [-10|400] "degC" Gateway,Brakes
 SG_ Sub m2M : 8|4@1+ (1,0) [0|15] "" Vector__XXX

BO_ 100 Next: 1 Vector__XXX"#;
        let mut file = DbcFile::default();
        let mut stream = record_stream(text);
        decode(&mut stream, &mut file).unwrap();
        assert!(stream.peek_is_word("BO_"));

        let msg = &file.messages[0];
        assert_eq!(msg.raw_id, 0x8000_0400);
        assert_eq!(msg.name, "Engine");
        assert_eq!(msg.length, 8);
        assert_eq!(msg.sender, "Motor");
        assert_eq!(msg.signals.len(), 3);

        let temp = &msg.signals[1];
        assert_eq!(temp.mux, MuxTag { is_multiplexer: false, selector_value: Some(1) });
        assert_eq!((temp.start, temp.length), (15, 12));
        assert_eq!(temp.byte_order, ByteOrder::BigEndian);
        assert!(temp.is_signed);
        assert_eq!((temp.scale, temp.offset), (0.0625, 250.0));
        assert_eq!((temp.minimum, temp.maximum), (-10.0, 400.0));
        assert_eq!(temp.unit, "degC");
        assert_eq!(temp.receivers, ["Gateway", "Brakes"]);

        assert_eq!(
            msg.signals[2].mux,
            MuxTag { is_multiplexer: true, selector_value: Some(2) }
        );
    }

    #[test]
    fn test_bad_byte_order() {
        let mut file = DbcFile::default();
        let mut stream = record_stream("BO_ 1 A: 8 N\n SG_ S : 0|8@2+ (1,0) [0|0] \"\" N");
        let err = decode(&mut stream, &mut file).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("byte order"));
    }

    #[test]
    fn test_parse_mux_tag() {
        assert_eq!(parse_mux_tag("m12").unwrap().selector_value, Some(12));
        assert!(parse_mux_tag("x1").is_none());
        assert!(parse_mux_tag("mM").is_none());
    }
}
