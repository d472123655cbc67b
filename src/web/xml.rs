//! Static device/service description XML, DIDL-Lite generation, and
//! XML escaping. SOAP responses nest the DIDL document as escaped text
//! inside the envelope body, per the ContentDirectory Browse contract.

use chrono::NaiveDate;

use crate::config::AppConfig;
use crate::store::{ArtworkKind, MediaObject};

pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn device_description(config: &AppConfig) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
    <specVersion><major>1</major><minor>0</minor></specVersion>
    <device>
        <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
        <friendlyName>{name}</friendlyName>
        <manufacturer>EEMS</manufacturer>
        <modelName>EEMS Media Server</modelName>
        <UDN>uuid:{uuid}</UDN>
        <serviceList>
            <service>
                <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
                <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
                <SCPDURL>/upnp/cds.xml</SCPDURL>
                <controlURL>/upnp/cds</controlURL>
                <eventSubURL>/upnp/cds</eventSubURL>
            </service>
            <service>
                <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
                <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
                <SCPDURL>/upnp/cm.xml</SCPDURL>
                <controlURL>/upnp/cm</controlURL>
                <eventSubURL>/upnp/cm</eventSubURL>
            </service>
        </serviceList>
    </device>
</root>"#,
        name = xml_escape(&config.server.name),
        uuid = config.server.uuid,
    )
}

pub fn content_directory_scpd() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
    <specVersion><major>1</major><minor>0</minor></specVersion>
    <actionList>
        <action>
            <name>Browse</name>
            <argumentList>
                <argument><name>ObjectID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_ObjectID</relatedStateVariable></argument>
                <argument><name>BrowseFlag</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_BrowseFlag</relatedStateVariable></argument>
                <argument><name>Filter</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Filter</relatedStateVariable></argument>
                <argument><name>StartingIndex</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Index</relatedStateVariable></argument>
                <argument><name>RequestedCount</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
                <argument><name>SortCriteria</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_SortCriteria</relatedStateVariable></argument>
                <argument><name>Result</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Result</relatedStateVariable></argument>
                <argument><name>NumberReturned</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
                <argument><name>TotalMatches</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Count</relatedStateVariable></argument>
                <argument><name>UpdateID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_UpdateID</relatedStateVariable></argument>
            </argumentList>
        </action>
    </actionList>
    <serviceStateTable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_ObjectID</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_BrowseFlag</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_Filter</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_Index</name><dataType>ui4</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_Count</name><dataType>ui4</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_SortCriteria</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_Result</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>A_ARG_TYPE_UpdateID</name><dataType>ui4</dataType></stateVariable>
        <stateVariable sendEvents="yes"><name>SystemUpdateID</name><dataType>ui4</dataType></stateVariable>
    </serviceStateTable>
</scpd>"#
}

pub fn connection_manager_scpd() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
    <specVersion><major>1</major><minor>0</minor></specVersion>
    <actionList/>
    <serviceStateTable>
        <stateVariable sendEvents="no"><name>SourceProtocolInfo</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>SinkProtocolInfo</name><dataType>string</dataType></stateVariable>
        <stateVariable sendEvents="no"><name>CurrentConnectionIDs</name><dataType>string</dataType></stateVariable>
    </serviceStateTable>
</scpd>"#
}

fn epoch_days_to_ymd(days: i64) -> String {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days)))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Renders one object as a DIDL-Lite `<item>` or `<container>` element.
pub fn object_to_didl(object: &MediaObject, base_url: &str) -> String {
    let id = object.id();
    let parent_id = object.parent_id();
    let title = xml_escape(object.dc_title());
    let class = xml_escape(object.upnp_class());

    let mut artwork_xml = String::new();
    for art in object.artwork() {
        let uri = format!("{base_url}/content/{}", art.reference.id);
        match art.kind {
            ArtworkKind::Poster => {
                artwork_xml.push_str(&format!("<upnp:albumArtURI>{}</upnp:albumArtURI>", xml_escape(&uri)));
                artwork_xml.push_str(&format!(r#"<xbmc:artwork type="poster">{}</xbmc:artwork>"#, xml_escape(&uri)));
            }
            ArtworkKind::Thumbnail => {
                artwork_xml.push_str(&format!(r#"<xbmc:artwork type="thumb">{}</xbmc:artwork>"#, xml_escape(&uri)));
            }
        }
    }

    match object {
        MediaObject::Container { .. } => format!(
            r#"<container id="{id}" parentID="{parent_id}" restricted="1"><dc:title>{title}</dc:title><upnp:class>{class}</upnp:class>{artwork}</container>"#,
            artwork = artwork_xml,
        ),
        MediaObject::Item { resources, dc_date, .. } => {
            let mut res_xml = String::new();
            for r in resources {
                let uri = format!("{base_url}/content/{}", r.reference.id);
                res_xml.push_str(&format!(
                    r#"<res protocolInfo="{}">{}</res>"#,
                    xml_escape(&r.protocol_info),
                    xml_escape(&uri)
                ));
            }
            let date_xml = match dc_date {
                Some(days) => format!("<dc:date>{}</dc:date>", epoch_days_to_ymd(*days)),
                None => String::new(),
            };
            format!(
                r#"<item id="{id}" parentID="{parent_id}" restricted="1"><dc:title>{title}</dc:title><upnp:class>{class}</upnp:class>{artwork}{res}{date}</item>"#,
                artwork = artwork_xml,
                res = res_xml,
                date = date_xml,
            )
        }
    }
}

pub fn didl_document(objects: &[MediaObject], base_url: &str) -> String {
    let mut didl = String::from(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:xbmc="urn:schemas-xbmc-org:metadata-1-0/">"#,
    );
    for object in objects {
        didl.push_str(&object_to_didl(object, base_url));
    }
    didl.push_str("</DIDL-Lite>");
    didl
}

/// Wraps an already-escaped DIDL-Lite document in a `BrowseResponse`
/// SOAP envelope. The DIDL text is nested as escaped text, not a
/// subtree, per the ContentDirectory Browse contract.
pub fn browse_response_envelope(didl: &str, number_returned: usize, total_matches: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
<s:Body>
<u:BrowseResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">
<Result>{result}</Result>
<NumberReturned>{number_returned}</NumberReturned>
<TotalMatches>{total_matches}</TotalMatches>
<UpdateID>0</UpdateID>
</u:BrowseResponse>
</s:Body>
</s:Envelope>"#,
        result = xml_escape(didl),
    )
}
