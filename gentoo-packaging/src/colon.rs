// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Primitives for colon documents.

Portage's binhost `Packages` index is a series of *documents*. Each document is
a series of `KEY: value` lines. A blank line terminates a document.

```text
ARCH: amd64
PACKAGES: 1

CPV: app-misc/foo-1.0
SLOT: 0
```

Unlike Debian control files, there are no continuation lines: every non-blank
line must contain the `": "` separator.
*/

use {
    crate::error::{GentooError, Result},
    std::io::{BufRead, Write},
};

/// A field in a colon document.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ColonField {
    name: String,
    value: String,
}

impl ColonField {
    /// Construct an instance from a field name and value.
    pub fn new(name: impl ToString, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// The name of this field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw string value of this field.
    pub fn value_str(&self) -> &str {
        &self.value
    }

    /// Obtain an iterator of words in the value.
    pub fn iter_words(&self) -> impl Iterator<Item = &str> {
        self.value.split_ascii_whitespace()
    }

    /// Write the contents of this field to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(b": ")?;
        writer.write_all(self.value.as_bytes())?;
        writer.write_all(b"\n")
    }
}

impl std::fmt::Display for ColonField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}: {}", self.name, self.value)
    }
}

/// A document in a colon file.
///
/// A document is an ordered series of fields. Field names are case sensitive and
/// a document can only hold a single occurrence of a field.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ColonDocument {
    fields: Vec<ColonField>,
}

impl ColonDocument {
    /// Whether the document is empty.
    ///
    /// Empty is defined by the lack of any fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The number of fields in this document.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Set the value of a field.
    ///
    /// If a field with the same name already exists, the old value is replaced and
    /// the field moves to the end of the document.
    pub fn set_field(&mut self, field: ColonField) {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
    }

    /// Set the value of a field defined via strings.
    pub fn set_field_from_string(&mut self, name: impl ToString, value: impl ToString) {
        self.set_field(ColonField::new(name, value));
    }

    /// Whether a named field is present in this document.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Obtain the field with a given name in this document.
    pub fn field(&self, name: &str) -> Option<&ColonField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Obtain the raw string value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value_str())
    }

    /// Iterate over fields in this document.
    ///
    /// Iteration order is insertion order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &ColonField> {
        self.fields.iter()
    }

    /// Serialize the document to a writer.
    ///
    /// The blank line terminating the document is written as well, so documents can
    /// be written back to back.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in &self.fields {
            field.write(writer)?;
        }

        writer.write_all(b"\n")
    }
}

impl std::fmt::Display for ColonDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for field in &self.fields {
            write!(f, "{}", field)?;
        }

        writeln!(f)
    }
}

/// Holds parsing state for colon documents.
///
/// Instances are fed lines of text and emit [ColonDocument] instances as they are
/// completed.
#[derive(Clone, Debug, Default)]
pub struct ColonDocumentParser {
    document: ColonDocument,
    line_number: usize,
    leading_empty_document: bool,
}

impl ColonDocumentParser {
    /// Emit an empty document if the first line of input is blank.
    ///
    /// A document with no fields serializes to a lone blank line. Formats where the
    /// position of a document is meaningful need it back on decode.
    #[must_use]
    pub fn with_leading_empty_document(mut self) -> Self {
        self.leading_empty_document = true;
        self
    }

    /// Write a line to the parser.
    ///
    /// The line may include its line terminator. If the line terminates an in-progress
    /// document, that document is returned.
    ///
    /// `Err` is returned if the line is malformed.
    pub fn write_line(&mut self, line: &str) -> Result<Option<ColonDocument>> {
        self.line_number += 1;
        self.process_line(line)
    }

    /// Write a line of raw bytes to the parser.
    ///
    /// Lines that aren't valid UTF-8 are rejected.
    pub fn write_line_bytes(&mut self, line: &[u8]) -> Result<Option<ColonDocument>> {
        self.line_number += 1;

        let line = std::str::from_utf8(line).map_err(|_| GentooError::ColonInvalidUtf8 {
            line_number: self.line_number,
        })?;

        self.process_line(line)
    }

    fn process_line(&mut self, line: &str) -> Result<Option<ColonDocument>> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        // Blank lines end the current document. Runs of them don't produce
        // empty documents.
        if line.is_empty() {
            return Ok(if !self.document.is_empty() {
                Some(std::mem::take(&mut self.document))
            } else if self.leading_empty_document && self.line_number == 1 {
                Some(ColonDocument::default())
            } else {
                None
            });
        }

        let (name, value) =
            line.split_once(": ")
                .ok_or_else(|| GentooError::ColonMalformedLine {
                    line_number: self.line_number,
                    line: line.to_string(),
                })?;

        self.document.set_field_from_string(name, value);

        Ok(None)
    }

    /// Finish parsing, consuming self.
    ///
    /// If a non-empty document is pending, it is returned.
    pub fn finish(self) -> Option<ColonDocument> {
        if self.document.is_empty() {
            None
        } else {
            Some(self.document)
        }
    }
}

/// A streaming reader of [ColonDocument].
///
/// Instances can be consumed as an iterator. Each call into the iterator will attempt to
/// read a full document from the underlying reader.
pub struct ColonDocumentReader<R: BufRead> {
    reader: R,
    parser: Option<ColonDocumentParser>,
}

impl<R: BufRead> ColonDocumentReader<R> {
    /// Create a new instance bound to a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: Some(ColonDocumentParser::default()),
        }
    }

    /// Emit an empty document if the first line of input is blank.
    ///
    /// See [ColonDocumentParser::with_leading_empty_document()].
    #[must_use]
    pub fn with_leading_empty_document(mut self) -> Self {
        self.parser = self.parser.map(|parser| parser.with_leading_empty_document());
        self
    }

    /// Consumes the instance, returning the original reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn get_next(&mut self) -> Result<Option<ColonDocument>> {
        let mut parser = match self.parser.take() {
            Some(parser) => parser,
            None => return Ok(None),
        };

        loop {
            let mut line = vec![];

            let bytes_read = self
                .reader
                .read_until(b'\n', &mut line)
                .map_err(|e| GentooError::IoPath("reading colon document".to_string(), e))?;

            if bytes_read != 0 {
                if let Some(document) = parser.write_line_bytes(&line)? {
                    self.parser.replace(parser);
                    return Ok(Some(document));
                }
            } else {
                return Ok(parser.finish());
            }
        }
    }
}

impl<R: BufRead> Iterator for ColonDocumentReader<R> {
    type Item = Result<ColonDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_next() {
            Ok(Some(document)) => Some(Ok(document)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Parse all documents from a reader.
pub fn parse_documents<R: BufRead>(reader: R) -> Result<Vec<ColonDocument>> {
    ColonDocumentReader::new(reader).collect()
}

/// Parse all documents from a string.
pub fn parse_documents_str(s: &str) -> Result<Vec<ColonDocument>> {
    parse_documents(s.as_bytes())
}
