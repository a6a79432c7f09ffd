use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::types::errors::ParseError;

/// `BS_: [baudrate : BTR1 , BTR2 ]`. The bit timing section is obsolete;
/// its content is read and dropped.
pub(crate) fn decode(stream: &mut TokenStream, _file: &mut DbcFile) -> Result<(), ParseError> {
    stream.expect_punct(':')?;
    if stream.peek_is_number() {
        let baudrate: u64 = stream.expect_number()?;
        log::debug!("ignoring BS_ baudrate {baudrate}");
        if stream.eat_punct(':') {
            stream.expect_number_text()?;
            stream.expect_punct(',')?;
            stream.expect_number_text()?;
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
        let mut stream = record_stream("BS_:\nBU_: A");
        decode(&mut stream, &mut file).unwrap();
        assert!(stream.peek_is_word("BU_"));

        let mut stream = record_stream("BS_: 500 : 12, 34");
        decode(&mut stream, &mut file).unwrap();
        assert!(stream.at_end());
    }
}
