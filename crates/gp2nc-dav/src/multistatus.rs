//! PROPFIND request body and multi-status response parsing
//!
//! Nextcloud answers `PROPFIND` with a `207 Multi-Status` document holding
//! one `<d:response>` per entry. Each response carries one or more
//! `<d:propstat>` blocks; only properties from a propstat whose status is
//! `200` are taken, the others list properties the server does not have.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::DavError;

/// Properties requested for every listing
pub const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns">
  <d:prop>
    <d:displayname/>
    <d:getcontentlength/>
    <d:getcontenttype/>
    <d:resourcetype/>
    <oc:checksums/>
    <nc:creation_time/>
    <oc:fileid/>
  </d:prop>
</d:propfind>"#;

/// One `<d:response>` as it appears on the wire (href still encoded)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub href: String,
    pub props: RawProps,
}

/// Properties of one entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProps {
    pub display_name: Option<String>,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub checksums: Vec<String>,
    /// `nc:creation_time`, seconds since the epoch (0 when unknown)
    pub creation_time: Option<i64>,
    pub file_id: Option<String>,
    pub is_collection: bool,
}

impl RawProps {
    fn merge(&mut self, other: RawProps) {
        self.display_name = other.display_name.or(self.display_name.take());
        self.content_length = other.content_length.or(self.content_length);
        self.content_type = other.content_type.or(self.content_type.take());
        self.checksums.extend(other.checksums);
        self.creation_time = other.creation_time.or(self.creation_time);
        self.file_id = other.file_id.or(self.file_id.take());
        self.is_collection |= other.is_collection;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Href,
    Status,
    DisplayName,
    ContentLength,
    ContentType,
    Checksum,
    CreationTime,
    FileId,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"href" => Some(Field::Href),
            b"status" => Some(Field::Status),
            b"displayname" => Some(Field::DisplayName),
            b"getcontentlength" => Some(Field::ContentLength),
            b"getcontenttype" => Some(Field::ContentType),
            b"checksum" => Some(Field::Checksum),
            b"creation_time" => Some(Field::CreationTime),
            b"fileid" => Some(Field::FileId),
            _ => None,
        }
    }
}

/// Parses a multi-status body into its entries, in document order
pub fn parse(body: &[u8]) -> Result<Vec<RawEntry>, DavError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<RawEntry> = None;
    let mut pending = RawProps::default();
    let mut propstat_ok = false;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => current = Some(RawEntry::default()),
                b"propstat" => {
                    pending = RawProps::default();
                    propstat_ok = false;
                }
                b"collection" => pending.is_collection = true,
                name => field = Field::from_local_name(name),
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"collection" {
                    pending.is_collection = true;
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(field) = field {
                    let value = text
                        .unescape()
                        .map_err(|e| DavError::InvalidResponse(e.to_string()))?
                        .into_owned();
                    apply(field, value, current.as_mut(), &mut pending, &mut propstat_ok);
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                match e.local_name().as_ref() {
                    b"propstat" => {
                        if propstat_ok {
                            if let Some(entry) = current.as_mut() {
                                entry.props.merge(std::mem::take(&mut pending));
                            }
                        }
                    }
                    b"response" => {
                        if let Some(entry) = current.take() {
                            if entry.href.is_empty() {
                                return Err(DavError::InvalidResponse(
                                    "response without href".to_string(),
                                ));
                            }
                            entries.push(entry);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DavError::InvalidResponse(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            Ok(_) => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn apply(
    field: Field,
    value: String,
    current: Option<&mut RawEntry>,
    pending: &mut RawProps,
    propstat_ok: &mut bool,
) {
    match field {
        Field::Href => {
            if let Some(entry) = current {
                entry.href = value;
            }
        }
        // e.g. "HTTP/1.1 200 OK"
        Field::Status => *propstat_ok = value.split_whitespace().nth(1) == Some("200"),
        Field::DisplayName => pending.display_name = Some(value),
        Field::ContentLength => pending.content_length = value.trim().parse().ok(),
        Field::ContentType => pending.content_type = Some(value),
        Field::Checksum => pending.checksums.push(value),
        Field::CreationTime => pending.creation_time = value.trim().parse().ok(),
        Field::FileId => pending.file_id = Some(value),
    }
}
