use crate::dbc::core::{
    AttributeRecord, DbcFile, RelationRecord, RelationRecordTarget, ba_def_def_::decode_raw_value,
    cm_::decode_target, stream::TokenStream,
};
use crate::dbc::lexer::TokenKind;
use crate::types::errors::ParseError;

/// `BA_ "<name>" [BU_ <node> | BO_ <id> | SG_ <id> <signal> | EV_ <var>] <value>;`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let name = stream.expect_string()?;
    let target = decode_target(stream)?;
    let value = decode_raw_value(stream)?;
    stream.end_record();
    file.attributes.push(AttributeRecord {
        name,
        target,
        value,
    });
    Ok(())
}

/// `BA_REL_ "<name>" BU_SG_REL_ <node> SG_ <id> <signal> <value>;`
/// `BA_REL_ "<name>" BU_BO_REL_ <node> <id> <value>;`
/// `BA_REL_ "<name>" BU_EV_REL_ <node> <var> <value>;`
pub(crate) fn decode_rel(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let name = stream.expect_string()?;
    let token = stream.advance();
    let kind = match &token.kind {
        TokenKind::Word(w) => w.clone(),
        _ => String::new(),
    };
    let target = match kind.as_str() {
        "BU_SG_REL_" => {
            let node = stream.expect_word()?;
            stream.expect_keyword("SG_")?;
            let raw_id = stream.expect_number()?;
            let signal = stream.expect_word()?;
            RelationRecordTarget::NodeSignal {
                node,
                raw_id,
                signal,
            }
        }
        "BU_BO_REL_" => {
            let node = stream.expect_word()?;
            RelationRecordTarget::NodeMessage {
                node,
                raw_id: stream.expect_number()?,
            }
        }
        "BU_EV_REL_" => {
            let node = stream.expect_word()?;
            RelationRecordTarget::NodeEnvironmentVariable {
                node,
                variable: stream.expect_word()?,
            }
        }
        _ => return Err(stream.error(&token, "invalid relation type")),
    };
    let value = decode_raw_value(stream)?;
    stream.end_record();
    file.relation_attributes.push(RelationRecord {
        name,
        target,
        value,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::Target;
    use crate::dbc::core::record_stream;
    use crate::types::attributes::RawAttributeValue;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(&mut record_stream(r#"BA_ "GenMsgCycleTime" BO_ 100 50;"#), &mut file).unwrap();
        decode(&mut record_stream(r#"BA_ "DBName" "Chassis";"#), &mut file).unwrap();
        decode(&mut record_stream(r#"BA_ "GenSigStartValue" SG_ 100 Speed -1.5;"#), &mut file).unwrap();
        assert_eq!(file.attributes[0].target, Target::Message(100));
        assert_eq!(file.attributes[0].value, RawAttributeValue::Number("50".into()));
        assert_eq!(file.attributes[1].target, Target::Database);
        assert_eq!(file.attributes[2].target, Target::Signal(100, "Speed".into()));
        assert_eq!(file.attributes[2].value, RawAttributeValue::Number("-1.5".into()));
    }

    #[test]
    fn test_decode_rel() {
        let mut file = DbcFile::default();
        decode_rel(
            &mut record_stream(r#"BA_REL_ "SigTimeout" BU_SG_REL_ Gateway SG_ 100 Speed 250;"#),
            &mut file,
        )
        .unwrap();
        decode_rel(&mut record_stream(r#"BA_REL_ "MsgLatency" BU_BO_REL_ Gateway 100 5;"#), &mut file)
            .unwrap();
        assert_eq!(
            file.relation_attributes[0].target,
            RelationRecordTarget::NodeSignal {
                node: "Gateway".into(),
                raw_id: 100,
                signal: "Speed".into()
            }
        );
        assert_eq!(
            file.relation_attributes[1].target,
            RelationRecordTarget::NodeMessage {
                node: "Gateway".into(),
                raw_id: 100
            }
        );
    }
}
