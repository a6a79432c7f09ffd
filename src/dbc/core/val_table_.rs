use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::types::{conversion::Choices, errors::ParseError};

/// `VAL_TABLE_ <name> <value> "<label>" ... ;`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let name = stream.expect_word()?;
    let choices = decode_pairs(stream)?;
    stream.end_record();
    file.value_tables.push((name, choices));
    Ok(())
}

/// `<value> "<label>"` pairs up to (not including) the terminating `;`.
pub(crate) fn decode_pairs(stream: &mut TokenStream) -> Result<Choices, ParseError> {
    let mut choices = Choices::new();
    while stream.peek_is_number() {
        let value: i64 = stream.expect_number()?;
        let label = stream.expect_string()?;
        choices.insert(value, label);
    }
    Ok(choices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        let mut stream = record_stream(r#"VAL_TABLE_ Gear 2 "Drive" 1 "Neutral" 0 "Park" -1 "Reverse";"#);
        decode(&mut stream, &mut file).unwrap();
        let (name, table) = &file.value_tables[0];
        assert_eq!(name, "Gear");
        assert_eq!(table.len(), 4);
        assert_eq!(table[&-1], "Reverse");
        assert!(stream.at_end());
    }
}
