use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::types::{attributes::EnvironmentVariable, errors::ParseError};

/// `EV_ <name> : <type> [<min>|<max>] "<unit>" <initial> <id> <access> <nodes>;`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let name = stream.expect_word()?;
    stream.expect_punct(':')?;
    let env_type: u8 = stream.expect_number()?;
    stream.expect_punct('[')?;
    let minimum: f64 = stream.expect_number()?;
    stream.expect_punct('|')?;
    let maximum: f64 = stream.expect_number()?;
    stream.expect_punct(']')?;
    let unit = stream.expect_string()?;
    let initial_value: f64 = stream.expect_number()?;
    let env_id: u32 = stream.expect_number()?;
    let access_type = stream.expect_word()?;
    let mut access_nodes: Vec<String> = Vec::new();
    while stream.peek_is_name() {
        access_nodes.push(stream.expect_word()?);
        stream.eat_punct(',');
    }
    stream.end_record();

    file.environment_variables.push(EnvironmentVariable {
        name,
        env_type,
        minimum,
        maximum,
        unit,
        initial_value,
        env_id,
        access_type,
        access_nodes,
        ..Default::default()
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(
            &mut record_stream(r#"EV_ EnvMode: 0 [0|3] "" 1 12 DUMMY_NODE_VECTOR0 Motor,Gateway;"#),
            &mut file,
        )
        .unwrap();
        let ev = &file.environment_variables[0];
        assert_eq!(ev.name, "EnvMode");
        assert_eq!((ev.minimum, ev.maximum, ev.initial_value), (0.0, 3.0, 1.0));
        assert_eq!(ev.env_id, 12);
        assert_eq!(ev.access_type, "DUMMY_NODE_VECTOR0");
        assert_eq!(ev.access_nodes, ["Motor", "Gateway"]);
    }
}
