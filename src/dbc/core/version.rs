use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::types::errors::ParseError;

/// `VERSION "<text>"`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    file.version = Some(stream.expect_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(&mut record_stream(r#"VERSION "1.0.2""#), &mut file).unwrap();
        assert_eq!(file.version.as_deref(), Some("1.0.2"));
    }
}
