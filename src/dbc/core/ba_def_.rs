use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::dbc::lexer::TokenKind;
use crate::types::{
    attributes::{AttrObject, AttrValueType, AttributeDefinition},
    errors::ParseError,
};

/// `BA_DEF_ [BU_|BO_|SG_|EV_] "<name>" <type> <params>;`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let object = if stream.peek_is_string() {
        AttrObject::Database
    } else {
        decode_object(stream, false)?
    };
    decode_definition(stream, file, object)
}

/// `BA_DEF_REL_ [BU_BO_REL_|BU_SG_REL_|BU_EV_REL_] "<name>" <type> <params>;`
pub(crate) fn decode_rel(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let object = decode_object(stream, true)?;
    decode_definition(stream, file, object)
}

fn decode_object(stream: &mut TokenStream, relation: bool) -> Result<AttrObject, ParseError> {
    let token = stream.advance();
    let object = match &token.kind {
        TokenKind::Word(w) => AttrObject::from_keyword(w),
        _ => None,
    };
    match object {
        Some(o) if o.is_relation() == relation => Ok(o),
        _ => Err(stream.error(&token, "invalid attribute object type")),
    }
}

fn decode_definition(
    stream: &mut TokenStream,
    file: &mut DbcFile,
    object: AttrObject,
) -> Result<(), ParseError> {
    let name = stream.expect_string()?;
    let type_token = stream.peek().clone();
    let value_type = match stream.expect_word()?.as_str() {
        "INT" => AttrValueType::Int,
        "HEX" => AttrValueType::Hex,
        "FLOAT" => AttrValueType::Float,
        "STRING" => AttrValueType::String,
        "ENUM" => AttrValueType::Enum,
        other => {
            return Err(stream.error(&type_token, format!("unknown attribute type '{other}'")));
        }
    };

    let mut definition = AttributeDefinition::new(name, object, value_type);
    match value_type {
        AttrValueType::Int | AttrValueType::Hex | AttrValueType::Float => {
            if stream.peek_is_number() {
                definition.minimum = Some(stream.expect_number()?);
                definition.maximum = Some(stream.expect_number()?);
            }
        }
        AttrValueType::Enum => {
            while stream.peek_is_string() {
                definition.enum_values.push(stream.expect_string()?);
                stream.eat_punct(',');
            }
        }
        AttrValueType::String => {}
    }
    stream.end_record();
    file.definitions.push(definition);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(&mut record_stream(r#"BA_DEF_ BO_ "GenMsgCycleTime" INT 0 65535;"#), &mut file).unwrap();
        decode(&mut record_stream(r#"BA_DEF_ "BusType" STRING ;"#), &mut file).unwrap();
        decode(
            &mut record_stream(r#"BA_DEF_ BO_ "VFrameFormat" ENUM "StandardCAN","ExtendedCAN";"#),
            &mut file,
        )
        .unwrap();
        decode(&mut record_stream(r#"BA_DEF_ SG_ "GenSigStartValue" FLOAT -3.4E+038 3.4E+038;"#), &mut file)
            .unwrap();

        let cycle = &file.definitions[0];
        assert_eq!(cycle.object, AttrObject::Message);
        assert_eq!(cycle.value_type, AttrValueType::Int);
        assert_eq!((cycle.minimum, cycle.maximum), (Some(0.0), Some(65535.0)));
        assert_eq!(file.definitions[1].object, AttrObject::Database);
        assert_eq!(file.definitions[2].enum_values, ["StandardCAN", "ExtendedCAN"]);
        assert_eq!(file.definitions[3].minimum, Some(-3.4e38));
    }

    #[test]
    fn test_decode_rel() {
        let mut file = DbcFile::default();
        decode_rel(
            &mut record_stream(r#"BA_DEF_REL_ BU_SG_REL_ "SigTimeout" INT 0 1000;"#),
            &mut file,
        )
        .unwrap();
        assert_eq!(file.definitions[0].object, AttrObject::NodeSignal);
        assert!(decode_rel(&mut record_stream(r#"BA_DEF_REL_ BO_ "X" INT 0 1;"#), &mut file).is_err());
    }
}
