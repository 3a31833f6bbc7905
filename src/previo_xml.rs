// Previo XML documents: the searchReservations request body and the reservation list response
use chrono::NaiveDate;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Status id the upstream uses for an active (confirmed) reservation
pub const RESERVED_STATUS_CODE: &str = "3";

// Error types for XML processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("XML parse error: {0}")]
    XmlParseError(String),

    #[error("XML encode error: {0}")]
    XmlEncodeError(String),

    #[error("Invalid date in {field}: {value}")]
    InvalidDate { field: &'static str, value: String },
}

/// One reservation as reported by the upstream feed.
///
/// Produced only by [`parse_reservations`]; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationRecord {
    pub room_identifier: String,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub status_code: String,
}

impl ReservationRecord {
    pub fn is_reserved(&self) -> bool {
        self.status_code == RESERVED_STATUS_CODE
    }
}

/// Inclusive date window sent with every search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Term {
    // today..tomorrow, starting from the given day
    pub fn starting(day: NaiveDate) -> Self {
        Self {
            from: day,
            to: day.succ_opt().unwrap_or(day),
        }
    }

    // today..tomorrow in the local time zone
    pub fn today() -> Self {
        Self::starting(chrono::Local::now().date_naive())
    }
}

// Structures for XML serialization of the request
#[derive(Debug, Serialize)]
#[serde(rename = "request")]
struct XmlSearchRequest<'a> {
    login: &'a str,
    password: &'a str,
    #[serde(rename = "hotId")]
    hot_id: &'a str,
    term: XmlRequestTerm,
}

#[derive(Debug, Serialize)]
struct XmlRequestTerm {
    from: String,
    to: String,
}

// Structures for XML deserialization of the response
#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default, rename = "reservations")]
pub struct XmlReservations {
    // A single <reservation> child deserializes to a one-element Vec
    #[serde(rename = "reservation")]
    pub reservations: Vec<XmlReservation>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone)]
#[serde(default)]
pub struct XmlReservation {
    pub object: XmlObject,
    pub term: XmlTerm,
    pub status: XmlStatus,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone)]
#[serde(default)]
pub struct XmlObject {
    pub name: String,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone)]
#[serde(default)]
pub struct XmlTerm {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone)]
#[serde(default)]
pub struct XmlStatus {
    #[serde(rename = "statusId")]
    pub status_id: String,
}

impl TryFrom<XmlReservation> for ReservationRecord {
    type Error = ProcessingError;

    fn try_from(item: XmlReservation) -> Result<Self, Self::Error> {
        Ok(ReservationRecord {
            room_identifier: item.object.name.trim().to_string(),
            check_in: parse_term_date("term.from", item.term.from.as_deref())?,
            check_out: parse_term_date("term.to", item.term.to.as_deref())?,
            status_code: item.status.status_id.trim().to_string(),
        })
    }
}

// Accepts "YYYY-MM-DD" with an optional time part, which is dropped
fn parse_term_date(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<NaiveDate>, ProcessingError> {
    let raw = match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(None),
    };

    let day = raw.split(['T', ' ']).next().unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ProcessingError::InvalidDate {
            field,
            value: raw.to_string(),
        })
}

/// Encode the searchReservations request body. Credentials are XML-escaped.
pub fn encode_search_request(
    login: &str,
    password: &str,
    hotel_id: &str,
    term: &Term,
) -> Result<String, ProcessingError> {
    let request = XmlSearchRequest {
        login,
        password,
        hot_id: hotel_id,
        term: XmlRequestTerm {
            from: term.from.format("%Y-%m-%d").to_string(),
            to: term.to.format("%Y-%m-%d").to_string(),
        },
    };

    quick_xml::se::to_string(&request).map_err(|e| ProcessingError::XmlEncodeError(e.to_string()))
}

const RESPONSE_ROOT: &[u8] = b"reservations";

// The deserializer ignores the root element's name, so check it up front
fn ensure_response_root(xml: &str) -> Result<(), ProcessingError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return if e.local_name().as_ref() == RESPONSE_ROOT {
                    Ok(())
                } else {
                    Err(ProcessingError::XmlParseError(format!(
                        "unexpected root element <{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    )))
                };
            }
            Ok(Event::Eof) => {
                return Err(ProcessingError::XmlParseError(
                    "missing root element".to_string(),
                ))
            }
            Ok(_) => continue,
            Err(e) => return Err(ProcessingError::XmlParseError(e.to_string())),
        }
    }
}

/// Parse a searchReservations response body into records, keeping document order.
///
/// Any root other than `<reservations>` is rejected.
pub fn parse_reservations(xml: &str) -> Result<Vec<ReservationRecord>, ProcessingError> {
    ensure_response_root(xml)?;

    let response: XmlReservations =
        from_str(xml).map_err(|e| ProcessingError::XmlParseError(e.to_string()))?;

    response
        .reservations
        .into_iter()
        .map(ReservationRecord::try_from)
        .collect()
}

// Sample response stored alongside the crate
pub const SAMPLE_RESPONSE_XML: &str = include_str!("../samples/search_reservations_response.xml");

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    const SINGLE_RESERVATION_XML: &str = r#"
<reservations>
  <reservation>
    <object><name>14</name></object>
    <term><from>2024-01-01</from><to>2024-01-02</to></term>
    <status><statusId>3</statusId></status>
  </reservation>
</reservations>
"#;

    const TWO_RESERVATIONS_XML: &str = r#"
<reservations>
  <reservation>
    <object><name>14</name></object>
    <term><from>2024-01-01</from><to>2024-01-02</to></term>
    <status><statusId>3</statusId></status>
  </reservation>
  <reservation>
    <object><name>21</name></object>
    <term><from>2024-01-01</from><to>2024-01-04</to></term>
    <status><statusId>1</statusId></status>
  </reservation>
</reservations>
"#;

    #[test]
    fn test_single_reservation_normalizes_to_one_element() {
        let single = parse_reservations(SINGLE_RESERVATION_XML).unwrap();
        let pair = parse_reservations(TWO_RESERVATIONS_XML).unwrap();

        assert_eq!(single.len(), 1);
        assert_eq!(pair.len(), 2);
        assert_eq!(single[0], pair[0]);
        assert_eq!(single[0].room_identifier, "14");
        assert_eq!(single[0].check_in, Some(date("2024-01-01")));
        assert_eq!(single[0].check_out, Some(date("2024-01-02")));
        assert!(single[0].is_reserved());
    }

    #[test]
    fn test_sample_response_keeps_document_order() {
        let records = parse_reservations(SAMPLE_RESPONSE_XML).unwrap();

        let rooms: Vec<&str> = records.iter().map(|r| r.room_identifier.as_str()).collect();
        assert_eq!(rooms, vec!["14", "32", "14"]);
        assert_eq!(records[0].status_code, "3");
        assert_eq!(records[2].status_code, "1");

        // Time parts are dropped
        assert_eq!(records[1].check_in, Some(date("2024-01-01")));
        assert_eq!(records[1].check_out, Some(date("2024-01-03")));
    }

    #[test_case("<reservations></reservations>"; "#1 empty root")]
    #[test_case("<reservations/>"; "#2 self-closing root")]
    #[test_case("<?xml version=\"1.0\"?><reservations>\n</reservations>"; "#3 declaration and whitespace")]
    fn test_no_reservations(xml: &str) {
        let records = parse_reservations(xml).unwrap();
        assert!(records.is_empty());
    }

    #[test_case("<error><code>2103</code><message>Invalid login</message></error>"; "#1 upstream error document")]
    #[test_case("<?xml version=\"1.0\"?>\n<response><reservation/></response>"; "#2 other root with reservation child")]
    #[test_case("<reservation><object><name>14</name></object></reservation>"; "#3 bare reservation")]
    #[test_case(""; "#4 empty body")]
    #[test_case("<!-- nothing here -->"; "#5 no element at all")]
    fn test_unexpected_root_is_a_parse_error(xml: &str) {
        let result = parse_reservations(xml);
        assert!(matches!(result, Err(ProcessingError::XmlParseError(_))), "{result:?}");
    }

    #[test]
    fn test_missing_fields_are_tolerated() {
        let xml = r#"
<reservations>
  <reservation>
    <status><statusId>3</statusId></status>
  </reservation>
</reservations>
"#;
        let records = parse_reservations(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].room_identifier, "");
        assert_eq!(records[0].check_in, None);
        assert_eq!(records[0].check_out, None);
    }

    #[test]
    fn test_malformed_xml_is_a_parse_error() {
        let result = parse_reservations("<reservations><reservation><object>");
        assert!(matches!(result, Err(ProcessingError::XmlParseError(_))));
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let xml = r#"
<reservations>
  <reservation>
    <object><name>14</name></object>
    <term><from>01/01/2024</from><to>2024-01-02</to></term>
    <status><statusId>3</statusId></status>
  </reservation>
</reservations>
"#;
        let result = parse_reservations(xml);
        assert_eq!(
            result,
            Err(ProcessingError::InvalidDate {
                field: "term.from",
                value: "01/01/2024".to_string(),
            })
        );
    }

    #[test]
    fn test_encode_search_request() {
        let term = Term::starting(date("2024-02-28"));
        let xml = encode_search_request("user", "p<&ss", "731", &term).unwrap();

        assert!(xml.starts_with("<request>"));
        assert!(xml.contains("<login>user</login>"));
        assert!(xml.contains("<password>p&lt;&amp;ss</password>"));
        assert!(xml.contains("<hotId>731</hotId>"));
        assert!(xml.contains("<term><from>2024-02-28</from><to>2024-02-29</to></term>"));
    }

    #[test]
    fn test_term_rolls_over_month_end() {
        let term = Term::starting(date("2023-12-31"));
        assert_eq!(term.from, date("2023-12-31"));
        assert_eq!(term.to, date("2024-01-01"));
    }
}
