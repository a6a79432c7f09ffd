use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::types::{attributes::RawAttributeValue, errors::ParseError};

/// `BA_DEF_DEF_ "<name>" <value>;` (also used for `BA_DEF_DEF_REL_`).
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let name = stream.expect_string()?;
    let value = decode_raw_value(stream)?;
    stream.end_record();
    file.defaults.push((name, value));
    Ok(())
}

/// Attribute value as written: a number or a quoted string.
pub(crate) fn decode_raw_value(stream: &mut TokenStream) -> Result<RawAttributeValue, ParseError> {
    if stream.peek_is_string() {
        Ok(RawAttributeValue::Str(stream.expect_string()?))
    } else {
        Ok(RawAttributeValue::Number(stream.expect_number_text()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(&mut record_stream(r#"BA_DEF_DEF_ "GenMsgCycleTime" 0;"#), &mut file).unwrap();
        decode(&mut record_stream(r#"BA_DEF_DEF_  "BusType" "CAN";"#), &mut file).unwrap();
        assert_eq!(
            file.defaults,
            vec![
                ("GenMsgCycleTime".to_string(), RawAttributeValue::Number("0".into())),
                ("BusType".to_string(), RawAttributeValue::Str("CAN".into())),
            ]
        );
    }
}
