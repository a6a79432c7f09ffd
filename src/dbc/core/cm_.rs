use crate::dbc::core::{DbcFile, Target, stream::TokenStream};
use crate::types::errors::ParseError;

/// `CM_ [BU_ <node> | BO_ <id> | SG_ <id> <signal> | EV_ <var>] "<text>";`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let target = decode_target(stream)?;
    let text = stream.expect_string()?;
    stream.end_record();
    file.comments.push((target, text));
    Ok(())
}

/// Object reference shared by `CM_` and `BA_`.
pub(crate) fn decode_target(stream: &mut TokenStream) -> Result<Target, ParseError> {
    if stream.peek_is_string() || stream.peek_is_number() {
        return Ok(Target::Database);
    }
    let token = stream.advance();
    let keyword = match &token.kind {
        crate::dbc::lexer::TokenKind::Word(w) => w.as_str(),
        _ => return Err(stream.error(&token, "expected an object type")),
    };
    Ok(match keyword {
        "BU_" => Target::Node(stream.expect_word()?),
        "BO_" => Target::Message(stream.expect_number()?),
        "SG_" => {
            let raw_id = stream.expect_number()?;
            Target::Signal(raw_id, stream.expect_word()?)
        }
        "EV_" => Target::EnvironmentVariable(stream.expect_word()?),
        other => return Err(stream.error(&token, format!("unknown object type '{other}'"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(&mut record_stream(r#"CM_ "Database wide";"#), &mut file).unwrap();
        decode(&mut record_stream(r#"CM_ BU_ Motor "Engine ECU";"#), &mut file).unwrap();
        decode(&mut record_stream("CM_ SG_ 100 Speed \"multi\nline\";"), &mut file).unwrap();
        assert_eq!(file.comments[0], (Target::Database, "Database wide".to_string()));
        assert_eq!(file.comments[1].0, Target::Node("Motor".into()));
        assert_eq!(
            file.comments[2],
            (Target::Signal(100, "Speed".into()), "multi\nline".to_string())
        );
    }

    #[test]
    fn test_unknown_object_type() {
        let mut file = DbcFile::default();
        assert!(decode(&mut record_stream(r#"CM_ XX_ 1 "x";"#), &mut file).is_err());
    }
}
