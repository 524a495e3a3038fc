// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Typed records backed by colon documents.

A record type declares its schema as an ordered list of [RecordField]. Each
entry pairs an on-wire key with accessors to the struct member holding its
value. The declaration order is the order fields are serialized in.

Values at their type's default (empty string, empty list, `0`) are never
serialized and are the implied value of keys absent on decode.
*/

use {
    crate::{
        colon::{ColonDocument, ColonField},
        error::{GentooError, Result},
    },
    log::debug,
    std::{io::Write, path::Path},
};

/// Binds an on-wire value to a member of a record of type `R`.
pub enum FieldBinding<R> {
    /// A string, serialized verbatim.
    String {
        get: fn(&R) -> &String,
        get_mut: fn(&mut R) -> &mut String,
    },
    /// A list of strings, serialized space delimited.
    ///
    /// Elements are expected to be non-empty and free of whitespace. Empty elements
    /// are dropped on serialization.
    StringList {
        get: fn(&R) -> &Vec<String>,
        get_mut: fn(&mut R) -> &mut Vec<String>,
    },
    /// An unsigned integer, serialized in decimal.
    Integer {
        get: fn(&R) -> &u64,
        get_mut: fn(&mut R) -> &mut u64,
    },
}

/// A field in a record schema.
pub struct RecordField<R> {
    /// The on-wire key.
    pub key: &'static str,
    /// How the value maps to the record.
    pub binding: FieldBinding<R>,
}

impl<R> RecordField<R> {
    /// Obtain the serialized value of this field in a record.
    ///
    /// Returns [None] if the value is at its default and should not be serialized.
    pub fn encode_value(&self, record: &R) -> Option<String> {
        match &self.binding {
            FieldBinding::String { get, .. } => {
                let value = get(record);
                (!value.is_empty()).then(|| value.clone())
            }
            FieldBinding::StringList { get, .. } => {
                let words = get(record)
                    .iter()
                    .filter(|word| !word.is_empty())
                    .map(|word| word.as_str())
                    .collect::<Vec<_>>();

                (!words.is_empty()).then(|| words.join(" "))
            }
            FieldBinding::Integer { get, .. } => {
                let value = *get(record);
                (value != 0).then(|| value.to_string())
            }
        }
    }

    /// Parse a serialized value and store it in a record.
    pub fn decode_value(&self, record: &mut R, value: &str) -> Result<()> {
        match &self.binding {
            FieldBinding::String { get_mut, .. } => {
                *get_mut(record) = value.to_string();
            }
            FieldBinding::StringList { get_mut, .. } => {
                *get_mut(record) = value
                    .split_ascii_whitespace()
                    .map(|s| s.to_string())
                    .collect();
            }
            FieldBinding::Integer { get_mut, .. } => {
                *get_mut(record) = value.parse::<u64>().map_err(|e| GentooError::FieldType {
                    key: self.key.to_string(),
                    value: value.to_string(),
                    source: e,
                })?;
            }
        }

        Ok(())
    }
}

/// Declares a [RecordField] for a named struct member.
///
/// `record_field!(Type, "KEY", member: String)`, with `String`, `StringList` or
/// `Integer` as the kind.
macro_rules! record_field {
    (@bind $record:ty, $key:literal, $member:ident, $variant:ident, $ty:ty) => {
        $crate::record::RecordField {
            key: $key,
            binding: $crate::record::FieldBinding::$variant {
                get: {
                    fn get(r: &$record) -> &$ty {
                        &r.$member
                    }
                    get
                },
                get_mut: {
                    fn get_mut(r: &mut $record) -> &mut $ty {
                        &mut r.$member
                    }
                    get_mut
                },
            },
        }
    };
    ($record:ty, $key:literal, $member:ident: String) => {
        $crate::record::record_field!(@bind $record, $key, $member, String, String)
    };
    ($record:ty, $key:literal, $member:ident: StringList) => {
        $crate::record::record_field!(@bind $record, $key, $member, StringList, Vec<String>)
    };
    ($record:ty, $key:literal, $member:ident: Integer) => {
        $crate::record::record_field!(@bind $record, $key, $member, Integer, u64)
    };
}

pub(crate) use record_field;

/// A record type with a static colon document schema.
pub trait ColonRecord: Default + Sized + 'static {
    /// Schema fields, in serialization order.
    const FIELDS: &'static [RecordField<Self>];

    /// Obtain the schema entry for an on-wire key.
    fn schema_field(key: &str) -> Option<&'static RecordField<Self>> {
        Self::FIELDS.iter().find(|field| field.key == key)
    }

    /// Construct an instance from a parsed document.
    ///
    /// Every key in the document must be declared by the schema. Schema fields
    /// missing from the document are left at their default.
    fn from_document(document: &ColonDocument) -> Result<Self> {
        let mut record = Self::default();

        for field in document.iter_fields() {
            let schema = Self::schema_field(field.name())
                .ok_or_else(|| GentooError::UnknownField(field.name().to_string()))?;

            schema.decode_value(&mut record, field.value_str())?;
        }

        Ok(record)
    }

    /// Convert this record to a document holding its non-default fields.
    fn to_document(&self) -> ColonDocument {
        let mut document = ColonDocument::default();

        for field in Self::FIELDS {
            if let Some(value) = field.encode_value(self) {
                document.set_field(ColonField::new(field.key, value));
            }
        }

        document
    }

    /// Serialize this record to a writer.
    ///
    /// A blank line terminating the document is always written.
    fn write_colon<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.to_document().write(writer)
    }

    /// Serialize this record to a string.
    fn to_colon_string(&self) -> String {
        self.to_document().to_string()
    }

    /// Construct an instance from a directory holding one file per field.
    ///
    /// Each key is a filename in the directory and the file content, minus one trailing
    /// newline, is its value. Missing or unreadable files leave their field at its
    /// default. Files not declared by the schema are ignored.
    fn from_directory(path: &Path) -> Result<Self> {
        let mut record = Self::default();

        for field in Self::FIELDS {
            let file_path = path.join(field.key);

            let data = match std::fs::read_to_string(&file_path) {
                Ok(data) => data,
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        debug!("ignoring unreadable {}: {}", file_path.display(), e);
                    }
                    continue;
                }
            };

            let value = data.strip_suffix('\n').unwrap_or(&data);
            field.decode_value(&mut record, value)?;
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::colon::parse_documents_str};

    #[derive(Clone, Debug, Default, Eq, PartialEq)]
    struct Sample {
        name: String,
        tags: Vec<String>,
        count: u64,
    }

    impl ColonRecord for Sample {
        const FIELDS: &'static [RecordField<Self>] = &[
            record_field!(Sample, "NAME", name: String),
            record_field!(Sample, "TAGS", tags: StringList),
            record_field!(Sample, "COUNT", count: Integer),
        ];
    }

    #[test]
    fn encode_schema_order_skips_defaults() {
        let sample = Sample {
            name: "foo".into(),
            tags: vec![],
            count: 42,
        };

        assert_eq!(sample.to_colon_string(), "NAME: foo\nCOUNT: 42\n\n");
        assert_eq!(Sample::default().to_colon_string(), "\n");

        let sample = Sample {
            name: String::new(),
            tags: vec!["a".into(), "b".into()],
            count: 0,
        };
        let mut buf = vec![];
        sample.write_colon(&mut buf).unwrap();
        assert_eq!(buf, b"TAGS: a b\n\n");
    }

    #[test]
    fn encode_empty_list_elements() {
        let sample = Sample {
            tags: vec![String::new()],
            ..Default::default()
        };
        assert_eq!(sample.to_colon_string(), "\n");

        let sample = Sample {
            tags: vec![String::new(), "a".into(), String::new(), "b".into()],
            ..Default::default()
        };
        assert_eq!(sample.to_colon_string(), "TAGS: a b\n\n");
    }

    #[test]
    fn decode_document() -> Result<()> {
        let docs = parse_documents_str("COUNT: 7\nTAGS: x  y\tz\n")?;
        let sample = Sample::from_document(&docs[0])?;

        assert_eq!(
            sample,
            Sample {
                name: String::new(),
                tags: vec!["x".into(), "y".into(), "z".into()],
                count: 7,
            }
        );

        Ok(())
    }

    #[test]
    fn decode_unknown_field() -> Result<()> {
        let docs = parse_documents_str("NAME: foo\nOTHER: bar\n")?;

        assert!(matches!(
            Sample::from_document(&docs[0]),
            Err(GentooError::UnknownField(ref key)) if key == "OTHER"
        ));

        Ok(())
    }

    #[test]
    fn decode_bad_integer() -> Result<()> {
        for value in ["abc", "-1", "1.5", ""] {
            let mut document = ColonDocument::default();
            document.set_field_from_string("COUNT", value);

            match Sample::from_document(&document) {
                Err(GentooError::FieldType { key, value: v, .. }) => {
                    assert_eq!(key, "COUNT");
                    assert_eq!(v, value);
                }
                other => panic!("unexpected result for {:?}: {:?}", value, other),
            }
        }

        Ok(())
    }

    #[test]
    fn round_trip() -> Result<()> {
        let sample = Sample {
            name: "has spaces and: colons".into(),
            tags: vec!["+foo".into(), "-bar".into()],
            count: u64::MAX,
        };

        let docs = parse_documents_str(&sample.to_colon_string())?;
        assert_eq!(docs.len(), 1);
        assert_eq!(Sample::from_document(&docs[0])?, sample);

        Ok(())
    }

    #[test]
    fn from_directory() -> Result<()> {
        let td = tempfile::tempdir()?;

        std::fs::write(td.path().join("NAME"), "foo-1.0\n")?;
        std::fs::write(td.path().join("TAGS"), "a b\n\n")?;
        std::fs::write(td.path().join("UNRELATED"), "ignored\n")?;

        let sample = Sample::from_directory(td.path())?;
        assert_eq!(sample.name, "foo-1.0");
        assert_eq!(sample.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(sample.count, 0);

        std::fs::write(td.path().join("COUNT"), "many\n")?;
        assert!(matches!(
            Sample::from_directory(td.path()),
            Err(GentooError::FieldType { .. })
        ));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn from_directory_unreadable_is_absent() -> Result<()> {
        let td = tempfile::tempdir()?;

        // Invalid UTF-8 can't be read as a string.
        std::fs::write(td.path().join("NAME"), b"\xff\xfe\n")?;
        // A directory where a file is expected can't be read either.
        std::fs::create_dir(td.path().join("COUNT"))?;

        assert_eq!(Sample::from_directory(td.path())?, Sample::default());

        Ok(())
    }
}
