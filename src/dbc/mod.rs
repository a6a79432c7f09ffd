//! # dbc
//!
//! `dbc` is the module to work with .dbc files.
//!
//! Reading goes in three steps: [`lexer`] turns the text into tokens, the
//! keyword decoders in [`core`] collect the records, and `build` assembles
//! them into a [`Database`]. Writing is handled by `save`.

mod build;
pub(crate) mod core;
pub(crate) mod lexer;
mod save;

pub use save::DumpOptions;

use std::fs;
use std::path::Path;

use encoding_rs::WINDOWS_1252;

use crate::dbc::core::{DbcFile, is_keyword, stream::TokenStream};
use crate::dbc::lexer::TokenKind;
use crate::types::{
    database::{Database, LoadOptions},
    errors::{Error, ParseError},
};

/// Collects the records of a DBC text.
pub(crate) fn parse(text: &str) -> Result<DbcFile, ParseError> {
    let tokens = lexer::tokenize(text)?;
    let mut stream = TokenStream::new(text, tokens);
    let mut file = DbcFile::default();

    while !stream.at_end() {
        let token = stream.advance();
        let keyword = match &token.kind {
            TokenKind::Word(w) => w.as_str(),
            // stray terminator
            TokenKind::Punct(';') => continue,
            _ => return Err(stream.error(&token, "expected a record keyword")),
        };
        match keyword {
            "VERSION" => core::version::decode(&mut stream, &mut file)?,
            "NS_" => core::ns_::decode(&mut stream, &mut file)?,
            "BS_" => core::bs_::decode(&mut stream, &mut file)?,
            "BU_" => core::bu_::decode(&mut stream, &mut file)?,
            "VAL_TABLE_" => core::val_table_::decode(&mut stream, &mut file)?,
            "BO_" => core::bo_::decode(&mut stream, &mut file)?,
            "BO_TX_BU_" => core::bo_tx_bu_::decode(&mut stream, &mut file)?,
            "EV_" => core::ev_::decode(&mut stream, &mut file)?,
            "CM_" => core::cm_::decode(&mut stream, &mut file)?,
            "BA_DEF_" => core::ba_def_::decode(&mut stream, &mut file)?,
            "BA_DEF_REL_" => core::ba_def_::decode_rel(&mut stream, &mut file)?,
            "BA_DEF_DEF_" | "BA_DEF_DEF_REL_" => core::ba_def_def_::decode(&mut stream, &mut file)?,
            "BA_" => core::ba_::decode(&mut stream, &mut file)?,
            "BA_REL_" => core::ba_::decode_rel(&mut stream, &mut file)?,
            "VAL_" => core::val_::decode(&mut stream, &mut file)?,
            "SIG_VALTYPE_" => core::sig_valtype_::decode(&mut stream, &mut file)?,
            "SIG_GROUP_" => core::sig_group_::decode(&mut stream, &mut file)?,
            "SG_MUL_VAL_" => core::sg_mul_val_::decode(&mut stream, &mut file)?,
            other if is_keyword(other) => {
                log::debug!("skipping {other} record at line {}", token.line);
                stream.skip_record();
            }
            other => {
                return Err(stream.error(&token, format!("unknown record keyword '{other}'")));
            }
        }
    }
    Ok(file)
}

/// Parses DBC text into a new [`Database`].
///
/// # Example
/// ```
/// use can_database::{LoadOptions, SignalMap, EncodeOptions};
///
/// let text = "VERSION \"\"\nBU_: ECU\nBO_ 100 Status: 1 ECU\n SG_ Enable : 0|1@1+ (1,0) [0|1] \"\" Vector__XXX\n";
/// let db = can_database::dbc::load_string(text, &LoadOptions::default()).unwrap();
/// let message = db.get_message_by_name("Status").unwrap();
/// let data = message
///     .encode(&SignalMap::from([("Enable".into(), 1.into())]), &EncodeOptions::default())
///     .unwrap();
/// assert_eq!(data, vec![0x01]);
/// ```
pub fn load_string(text: &str, options: &LoadOptions) -> Result<Database, Error> {
    let mut db = Database::with_options(options);
    build::build(parse(text)?, &mut db, options)?;
    Ok(db)
}

/// Reads a CP1252-encoded DBC file into a new [`Database`].
pub fn load_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Database, Error> {
    load_string(&read_text(path.as_ref())?, options)
}

/// Serializes `db` as DBC text (CRLF line endings).
pub fn dump_string(db: &Database, options: &DumpOptions) -> Result<String, Error> {
    save::dump_string(db, options)
}

/// Writes `db` as a CP1252-encoded DBC file.
pub fn dump_file(db: &Database, path: impl AsRef<Path>, options: &DumpOptions) -> Result<(), Error> {
    let path = path.as_ref();
    let text = dump_string(db, options)?;
    let (bytes, _, had_errors) = WINDOWS_1252.encode(&text);
    if had_errors {
        log::warn!(
            "'{}' contains characters CP1252 cannot represent, written as character references",
            path.display()
        );
    }
    fs::write(path, bytes).map_err(|source| Error::Write {
        path: path.display().to_string(),
        source,
    })
}

fn read_text(path: &Path) -> Result<String, Error> {
    let bytes = fs::read(path).map_err(|source| Error::Read {
        path: path.display().to_string(),
        source,
    })?;
    // Decode in Windows-1252 (a UTF-8 BOM switches to UTF-8)
    let (text, _, _) = WINDOWS_1252.decode(&bytes);
    Ok(text.into_owned())
}

impl Database {
    /// Adds the content of DBC text to this database.
    ///
    /// The database's strictness and frame-id mask apply.
    pub fn add_dbc_string(&mut self, text: &str) -> Result<(), Error> {
        let options = LoadOptions {
            strict: self.is_strict(),
            frame_id_mask: Some(self.frame_id_mask()),
            ..LoadOptions::default()
        };
        build::build(parse(text)?, self, &options)
    }

    /// Adds the content of a CP1252-encoded DBC file to this database.
    pub fn add_dbc_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.add_dbc_string(&read_text(path.as_ref())?)
    }

    /// DBC text of this database with default [`DumpOptions`].
    pub fn as_dbc_string(&self) -> Result<String, Error> {
        save::dump_string(self, &DumpOptions::default())
    }
}
