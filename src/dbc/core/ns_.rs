use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::dbc::lexer::TokenKind;
use crate::types::errors::ParseError;

/// `NS_ :` followed by the new-symbol list, which runs until the next
/// section keyword (`BS_`, `BU_`, ...) at the start of a line.
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    stream.expect_punct(':')?;
    while !stream.at_end() {
        if stream.is_line_start()
            && matches!(&stream.peek().kind, TokenKind::Word(w) if !w.starts_with("NS_DESC_") && !is_symbol(w))
        {
            break;
        }
        let token = stream.advance();
        if let TokenKind::Word(w) = token.kind {
            file.new_symbols.push(w);
        }
    }
    Ok(())
}

// symbols listed by NS_ that are not record keywords of their own
fn is_symbol(word: &str) -> bool {
    matches!(
        word,
        "CM_" | "BA_DEF_" | "BA_" | "VAL_" | "CAT_DEF_" | "CAT_" | "FILTER" | "BA_DEF_DEF_"
            | "EV_DATA_" | "ENVVAR_DATA_" | "SGTYPE_" | "SGTYPE_VAL_" | "BA_DEF_SGTYPE_"
            | "BA_SGTYPE_" | "SIG_TYPE_REF_" | "VAL_TABLE_" | "SIG_GROUP_" | "SIG_VALTYPE_"
            | "SIGTYPE_VALTYPE_" | "BO_TX_BU_" | "BA_DEF_REL_" | "BA_REL_" | "BA_DEF_DEF_REL_"
            | "BU_SG_REL_" | "BU_EV_REL_" | "BU_BO_REL_" | "SG_MUL_VAL_"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let text = "NS_ :\n\tNS_DESC_\n\tCM_\n\tBA_DEF_\n\tSG_MUL_VAL_\n\nBS_:\n";
        let mut stream = record_stream(text);
        let mut file = DbcFile::default();
        decode(&mut stream, &mut file).unwrap();
        assert_eq!(file.new_symbols, ["NS_DESC_", "CM_", "BA_DEF_", "SG_MUL_VAL_"]);
        assert!(stream.peek_is_word("BS_"));
    }
}
