use crate::dbc::core::{DbcFile, MuxRangeRecord, stream::TokenStream};
use crate::types::errors::ParseError;

/// `SG_MUL_VAL_ <id> <signal> <multiplexer> <lo>-<hi>, <lo>-<hi> ... ;`
pub(crate) fn decode(stream: &mut TokenStream, file: &mut DbcFile) -> Result<(), ParseError> {
    let raw_id: u32 = stream.expect_number()?;
    let signal = stream.expect_word()?;
    let multiplexer = stream.expect_word()?;

    let mut ranges: Vec<(i64, i64)> = Vec::new();
    while stream.peek_is_number() {
        let token = stream.peek().clone();
        let lo: i64 = stream.expect_number()?;
        stream.expect_punct('-')?;
        let hi: i64 = stream.expect_number()?;
        if hi < lo {
            return Err(stream.error(&token, format!("empty multiplexer range {lo}-{hi}")));
        }
        ranges.push((lo, hi));
        stream.eat_punct(',');
    }
    stream.end_record();

    file.mux_ranges.push(MuxRangeRecord {
        raw_id,
        signal,
        multiplexer,
        ranges,
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
        decode(&mut record_stream("SG_MUL_VAL_ 100 Temp Mux 0-5, 7-7;"), &mut file).unwrap();
        let rec = &file.mux_ranges[0];
        assert_eq!((rec.signal.as_str(), rec.multiplexer.as_str()), ("Temp", "Mux"));
        assert_eq!(rec.ranges, vec![(0, 5), (7, 7)]);
    }

    #[test]
    fn test_reversed_range() {
        let mut file = DbcFile::default();
        assert!(decode(&mut record_stream("SG_MUL_VAL_ 100 Temp Mux 5-1;"), &mut file).is_err());
    }
}
