use crate::dbc::core::{DbcFile, stream::TokenStream, val_table_::decode_pairs};
use crate::types::errors::ParseError;

/// Value descriptions of a signal or of an environment variable:
/// `VAL_ <id> <signal> <value> "<label>" ... ;` or
/// `VAL_ <var> <value> "<label>" ... ;`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    if stream.peek_is_number() {
        let raw_id: u32 = stream.expect_number()?;
        let signal = stream.expect_word()?;
        let choices = decode_pairs(stream)?;
        file.value_descriptions.push((raw_id, signal, choices));
    } else {
        let variable = stream.expect_word()?;
        let choices = decode_pairs(stream)?;
        file.env_value_descriptions.push((variable, choices));
    }
    stream.end_record();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(&mut record_stream(r#"VAL_ 100 Gear 0 "Park" 1 "Drive" ;"#), &mut file).unwrap();
        decode(&mut record_stream(r#"VAL_ EnvMode 0 "Off";"#), &mut file).unwrap();
        let (raw_id, signal, choices) = &file.value_descriptions[0];
        assert_eq!((*raw_id, signal.as_str()), (100, "Gear"));
        assert_eq!(choices[&1], "Drive");
        assert_eq!(file.env_value_descriptions[0].0, "EnvMode");
    }
}
