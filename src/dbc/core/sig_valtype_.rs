use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::types::errors::ParseError;

/// `SIG_VALTYPE_ <id> <signal> : <type>;` with type 1 = float, 2 = double.
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let raw_id: u32 = stream.expect_number()?;
    let signal = stream.expect_word()?;
    stream.eat_punct(':');
    let token = stream.peek().clone();
    let value_type: u8 = stream.expect_number()?;
    if value_type > 2 {
        return Err(stream.error(&token, format!("invalid signal value type {value_type}")));
    }
    stream.end_record();
    file.signal_types.push((raw_id, signal, value_type));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(&mut record_stream("SIG_VALTYPE_ 100 Pressure : 1;"), &mut file).unwrap();
        assert_eq!(file.signal_types, vec![(100, "Pressure".to_string(), 1)]);
        assert!(decode(&mut record_stream("SIG_VALTYPE_ 100 P : 3;"), &mut file).is_err());
    }
}
