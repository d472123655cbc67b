//! SOAP `Browse` action: request validation via the `SOAPACTION` header
//! and `quick-xml` body parsing, dispatch against `Store`, and SOAP
//! response/fault rendering.
//!
//! The body is parsed with a real XML reader rather than substring
//! search, so the `SOAPACTION` header is checked against the body's
//! actual action element instead of assumed to match.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{EemsError, Result};
use crate::state::AppState;
use crate::store::MediaObject;
use crate::web::xml::{didl_document, browse_response_envelope};

const BROWSE_ACTION: &str = "Browse";

#[derive(Debug, PartialEq, Eq)]
enum BrowseFlag {
    Metadata,
    DirectChildren,
}

struct BrowseArgs {
    object_id: i64,
    flag: BrowseFlag,
    starting_index: usize,
    requested_count: usize,
}

/// Parses the `SOAPACTION` header's `"<service>#<action>"` grammar,
/// returning the action name.
fn parse_soap_action(header: &str) -> Result<String> {
    let trimmed = header.trim().trim_matches('"');
    let (_service, action) = trimmed
        .split_once('#')
        .ok_or_else(|| EemsError::Malformed("SOAPACTION missing '#'".into()))?;
    if action.is_empty() {
        return Err(EemsError::Malformed("SOAPACTION missing action name".into()));
    }
    Ok(action.to_string())
}

fn local_name(qname: &[u8]) -> &[u8] {
    match qname.iter().position(|&b| b == b':') {
        Some(idx) => &qname[idx + 1..],
        None => qname,
    }
}

/// Walks the SOAP body XML, verifying the action element's local name
/// matches `expected_action`, and pulls out the `Browse` arguments by
/// their local element names.
fn parse_browse_body(body: &[u8], expected_action: &str) -> Result<BrowseArgs> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut found_action = false;
    let mut current: Option<String> = None;

    let mut object_id: Option<i64> = None;
    let mut flag: Option<BrowseFlag> = None;
    let mut starting_index: usize = 0;
    let mut requested_count: usize = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref()).to_vec();
                let name = String::from_utf8_lossy(&name).to_string();
                if !found_action {
                    if name == expected_action {
                        found_action = true;
                    }
                    continue;
                }
                current = Some(name);
            }
            Ok(Event::Text(t)) => {
                if let Some(field) = current.take() {
                    let text = t.unescape().unwrap_or_default().to_string();
                    match field.as_str() {
                        "ObjectID" => {
                            object_id = Some(
                                text.parse::<i64>()
                                    .map_err(|_| EemsError::Malformed(format!("bad ObjectID: {text}")))?,
                            );
                        }
                        "BrowseFlag" => {
                            flag = Some(match text.as_str() {
                                "BrowseMetadata" => BrowseFlag::Metadata,
                                "BrowseDirectChildren" => BrowseFlag::DirectChildren,
                                other => return Err(EemsError::BadArgument(format!("bad BrowseFlag: {other}"))),
                            });
                        }
                        "StartingIndex" => {
                            starting_index = text.parse().unwrap_or(0);
                        }
                        "RequestedCount" => {
                            requested_count = text.parse().unwrap_or(0);
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(_)) => {
                current = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EemsError::Malformed(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if !found_action {
        return Err(EemsError::Malformed(format!(
            "SOAP body does not contain a <{expected_action}> element"
        )));
    }
    let object_id = object_id.ok_or_else(|| EemsError::Malformed("missing ObjectID".into()))?;
    let flag = flag.ok_or_else(|| EemsError::Malformed("missing BrowseFlag".into()))?;

    Ok(BrowseArgs { object_id, flag, starting_index, requested_count })
}

fn soap_fault_response(err: EemsError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [("Content-Type", "text/xml; charset=\"utf-8\"")],
        err.to_soap_fault(),
    )
        .into_response()
}

/// Resolves a `Browse` request into the object list it should return,
/// applying pagination per `BrowseFlag` (a `RequestedCount` of `0`
/// means "no limit").
async fn resolve_browse(state: &AppState, args: &BrowseArgs) -> Result<(Vec<MediaObject>, usize)> {
    match args.flag {
        BrowseFlag::Metadata => {
            let object = state.store.get(args.object_id).await?;
            Ok((vec![object], 1))
        }
        BrowseFlag::DirectChildren => {
            let children = state.store.list_children(args.object_id).await?;
            let total = children.len();
            let start = args.starting_index.min(total);
            let end = if args.requested_count == 0 {
                total
            } else {
                (start + args.requested_count).min(total)
            };
            Ok((children[start..end].to_vec(), total))
        }
    }
}

pub async fn browse(
    axum::extract::State(state): axum::extract::State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type_ok = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/xml"));
    if !content_type_ok {
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Content-Type must be text/xml").into_response();
    }

    let action = match headers
        .get("SOAPACTION")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| EemsError::Malformed("missing SOAPACTION header".into()))
        .and_then(|h| parse_soap_action(h))
    {
        Ok(action) => action,
        Err(e) => return soap_fault_response(e),
    };

    if action != BROWSE_ACTION {
        return soap_fault_response(EemsError::Malformed(format!("unsupported action: {action}")));
    }

    let args = match parse_browse_body(&body, BROWSE_ACTION) {
        Ok(args) => args,
        Err(e) => return soap_fault_response(e),
    };

    let (objects, total_matches) = match resolve_browse(&state, &args).await {
        Ok(v) => v,
        Err(e) => return soap_fault_response(e),
    };

    let didl = didl_document(&objects, &state.base_url);
    let envelope = browse_response_envelope(&didl, objects.len(), total_matches);
    (
        StatusCode::OK,
        [("Content-Type", "text/xml; charset=\"utf-8\"")],
        envelope,
    )
        .into_response()
}

/// `ConnectionManager` carries no actions a client needs here (browsing
/// and streaming are all done through ContentDirectory and `/content`);
/// any POST here is an unknown action.
pub async fn connection_manager_control() -> Response {
    soap_fault_response(EemsError::Malformed("ConnectionManager exposes no actions".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_soap_action_header() {
        let action = parse_soap_action("\"urn:schemas-upnp-org:service:ContentDirectory:1#Browse\"").unwrap();
        assert_eq!(action, "Browse");
    }

    #[test]
    fn rejects_soap_action_without_hash() {
        assert!(parse_soap_action("\"garbage\"").is_err());
    }

    #[test]
    fn parses_browse_direct_children_body() {
        let body = br#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
<s:Body>
<u:Browse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">
<ObjectID>0</ObjectID>
<BrowseFlag>BrowseDirectChildren</BrowseFlag>
<Filter>*</Filter>
<StartingIndex>0</StartingIndex>
<RequestedCount>0</RequestedCount>
<SortCriteria></SortCriteria>
</u:Browse>
</s:Body>
</s:Envelope>"#;
        let args = parse_browse_body(body, "Browse").unwrap();
        assert_eq!(args.object_id, 0);
        assert_eq!(args.flag, BrowseFlag::DirectChildren);
        assert_eq!(args.starting_index, 0);
        assert_eq!(args.requested_count, 0);
    }

    #[test]
    fn parses_browse_metadata_body_with_nonzero_index() {
        let body = br#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
<s:Body><u:Browse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">
<ObjectID>5</ObjectID><BrowseFlag>BrowseMetadata</BrowseFlag>
<StartingIndex>2</StartingIndex><RequestedCount>10</RequestedCount>
</u:Browse></s:Body></s:Envelope>"#;
        let args = parse_browse_body(body, "Browse").unwrap();
        assert_eq!(args.object_id, 5);
        assert_eq!(args.flag, BrowseFlag::Metadata);
        assert_eq!(args.starting_index, 2);
        assert_eq!(args.requested_count, 10);
    }

    #[test]
    fn rejects_body_missing_browse_element() {
        let body = br#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
<s:Body><u:SomeOtherAction xmlns:u="x"><ObjectID>0</ObjectID></u:SomeOtherAction></s:Body></s:Envelope>"#;
        assert!(parse_browse_body(body, "Browse").is_err());
    }

    #[test]
    fn rejects_bad_browse_flag() {
        let body = br#"<s:Envelope><s:Body><Browse><ObjectID>0</ObjectID><BrowseFlag>Bogus</BrowseFlag></Browse></s:Body></s:Envelope>"#;
        let err = parse_browse_body(body, "Browse").unwrap_err();
        assert!(matches!(err, EemsError::BadArgument(_)));
    }
}
