//! XML record codec
//!
//! Storage files are concatenations of XML fragments, not complete
//! documents. `serialize` emits one fragment per record; `parse` wraps the
//! raw file content in a synthetic root element before handing it to the
//! XML reader, then walks the top-level elements in document order.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, ScanRelayError};
use crate::record::{AnnotationRecord, Record};

/// Serialize a record to one XML fragment.
///
/// Barcode values and annotation fields are XML-escaped so arbitrary
/// scanned content cannot break the fragment structure.
pub fn serialize(record: &Record) -> String {
    match record {
        Record::Barcode { value } => format!(
            "<BarcodeData><Barcode>{}</Barcode></BarcodeData>",
            escape(value.as_str())
        ),
        Record::Annotation(annotation) => {
            let mut attrs = String::new();
            for (key, value) in [
                ("ts", &annotation.ts),
                ("displaytime", &annotation.displaytime),
                ("displaytimemilitary", &annotation.displaytimemilitary),
                ("displaydate", &annotation.displaydate),
                ("user", &annotation.user),
                ("labeltitle", &annotation.labeltitle),
                ("labeldata", &annotation.labeldata),
                ("index", &annotation.index),
                ("location", &annotation.location),
            ] {
                if !value.is_empty() {
                    attrs.push_str(&format!(" {}=\"{}\"", key, escape(value.as_str())));
                }
            }
            format!(
                "<annotation{}>{}</annotation>",
                attrs,
                escape(annotation.value.as_str())
            )
        }
    }
}

/// Parse accumulated XML fragments into an ordered record list.
///
/// Recognizes `BarcodeData` and `annotation` top-level elements; anything
/// else is skipped. Values concatenate plain text and CDATA sections in
/// document order. Zero fragments parse to an empty list. Malformed XML
/// fails with `MalformedRecordData`.
pub fn parse(raw: &str) -> Result<Vec<Record>> {
    let wrapped = format!("<root>{raw}</root>");
    let mut reader = Reader::from_str(&wrapped);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => match start.local_name().as_ref() {
                b"root" => {}
                b"BarcodeData" => {
                    let value = read_barcode_value(&mut reader)?;
                    records.push(Record::Barcode { value });
                }
                b"annotation" => {
                    records.push(Record::Annotation(read_annotation(&mut reader, &start)?));
                }
                _ => skip_subtree(&mut reader, &start)?,
            },
            Ok(Event::Empty(start)) => match start.local_name().as_ref() {
                b"BarcodeData" => records.push(Record::Barcode {
                    value: String::new(),
                }),
                b"annotation" => {
                    records.push(Record::Annotation(annotation_from_attributes(&start)?));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(e.to_string())),
        }
    }
    Ok(records)
}

fn malformed(message: impl Into<String>) -> ScanRelayError {
    ScanRelayError::MalformedRecordData {
        message: message.into(),
    }
}

/// Read the `Barcode` child text of a `BarcodeData` element.
///
/// A missing or empty `Barcode` child yields an empty value.
fn read_barcode_value(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut value = String::new();
    let mut in_barcode = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Barcode" => in_barcode = true,
                _ => skip_subtree(reader, &e)?,
            },
            Ok(Event::Text(text)) => {
                if in_barcode {
                    let unescaped = text.unescape().map_err(|e| malformed(e.to_string()))?;
                    value.push_str(&unescaped);
                }
            }
            // CDATA content is literal, nothing to unescape
            Ok(Event::CData(text)) => {
                if in_barcode {
                    value.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"Barcode" => in_barcode = false,
                b"BarcodeData" => return Ok(value),
                _ => {}
            },
            Ok(Event::Eof) => return Err(malformed("unterminated BarcodeData fragment")),
            Ok(_) => {}
            Err(e) => return Err(malformed(e.to_string())),
        }
    }
}

/// Read an `annotation` element: attributes plus text content as value.
fn read_annotation(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<AnnotationRecord> {
    let mut record = annotation_from_attributes(start)?;
    loop {
        match reader.read_event() {
            Ok(Event::Text(text)) => {
                let unescaped = text.unescape().map_err(|e| malformed(e.to_string()))?;
                record.value.push_str(&unescaped);
            }
            Ok(Event::CData(text)) => record.value.push_str(&String::from_utf8_lossy(&text)),
            Ok(Event::Start(e)) => skip_subtree(reader, &e)?,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"annotation" => return Ok(record),
            Ok(Event::Eof) => return Err(malformed("unterminated annotation fragment")),
            Ok(_) => {}
            Err(e) => return Err(malformed(e.to_string())),
        }
    }
}

fn annotation_from_attributes(start: &BytesStart) -> Result<AnnotationRecord> {
    let mut record = AnnotationRecord::default();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(e.to_string()))?
            .into_owned();
        match attr.key.as_ref() {
            b"ts" => record.ts = value,
            b"displaytime" => record.displaytime = value,
            b"displaytimemilitary" => record.displaytimemilitary = value,
            b"displaydate" => record.displaydate = value,
            b"user" => record.user = value,
            b"labeltitle" => record.labeltitle = value,
            b"labeldata" => record.labeldata = value,
            b"index" => record.index = value,
            b"location" => record.location = value,
            _ => {}
        }
    }
    Ok(record)
}

fn skip_subtree(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<()> {
    reader
        .read_to_end(start.name())
        .map_err(|e| malformed(e.to_string()))?;
    Ok(())
}
