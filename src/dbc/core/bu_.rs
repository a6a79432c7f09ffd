use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::types::errors::ParseError;

/// Decode the `BU_` record listing node names.
/// Example: `BU_: ECU1 ECU2 ECU3`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    stream.expect_punct(':')?;
    while stream.peek_is_name() {
        let name = stream.expect_word()?;
        if !file.nodes.contains(&name) {
            file.nodes.push(name);
        }
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
        let mut stream = record_stream("BU_: Motor Gateway\n  Brakes\nVAL_TABLE_ T 0 \"x\";");
        decode(&mut stream, &mut file).unwrap();
        assert_eq!(file.nodes, ["Motor", "Gateway", "Brakes"]);
        assert!(stream.peek_is_word("VAL_TABLE_"));
    }
}
