use crate::dbc::core::{DbcFile, stream::TokenStream};
use crate::types::{errors::ParseError, message::SignalGroup};

/// `SIG_GROUP_ <id> <name> <repetitions> : <signal> <signal> ... ;`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let raw_id: u32 = stream.expect_number()?;
    let name = stream.expect_word()?;
    let repetitions: u32 = stream.expect_number()?;
    stream.expect_punct(':')?;
    let mut signal_names: Vec<String> = Vec::new();
    while stream.peek_is_name() {
        signal_names.push(stream.expect_word()?);
        stream.eat_punct(',');
    }
    stream.end_record();
    file.signal_groups.push((
        raw_id,
        SignalGroup {
            name,
            repetitions,
            signal_names,
        },
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::core::record_stream;

    #[test]
    fn test_decode() {
        let mut file = DbcFile::default();
        decode(&mut record_stream("SIG_GROUP_ 100 Wheels 1 : FL FR RL RR;"), &mut file).unwrap();
        let (raw_id, group) = &file.signal_groups[0];
        assert_eq!(*raw_id, 100);
        assert_eq!(group.name, "Wheels");
        assert_eq!(group.signal_names, ["FL", "FR", "RL", "RR"]);
    }
}
