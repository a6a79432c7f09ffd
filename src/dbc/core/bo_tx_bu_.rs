use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::types::errors::ParseError;

/// `BO_TX_BU_ <id> : <node>,<node>;` lists additional senders.
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let raw_id: u32 = stream.expect_number()?;
    stream.expect_punct(':')?;
    let mut senders: Vec<String> = Vec::new();
    while stream.peek_is_name() {
        senders.push(stream.expect_word()?);
        stream.eat_punct(',');
    }
    stream.end_record();
    file.senders.push((raw_id, senders));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(&mut record_stream("BO_TX_BU_ 100 : Motor,Gateway;"), &mut file).unwrap();
        assert_eq!(file.senders, vec![(100, vec!["Motor".to_string(), "Gateway".to_string()])]);
    }
}
