//! Object and resource records, encoded as tagged binary records via
//! `bincode`. All schema-evolution fields are `Option`s so a newer
//! reader tolerates older records.

use bincode::{Decode, Encode};

use super::key::LibraryKey;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum ArtworkKind {
    Poster,
    Thumbnail,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Artwork {
    pub reference: LibraryKey,
    pub kind: ArtworkKind,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ResourceRef {
    pub reference: LibraryKey,
    pub protocol_info: String,
}

/// A browseable object: either a `Container` (folder-like) or an `Item`
/// (a leaf with one or more resources). Modeled as a sum type with an
/// explicit discriminant rather than an inheritance hierarchy.
#[derive(Debug, Clone, Encode, Decode)]
pub enum MediaObject {
    Container {
        id: i64,
        parent_id: i64,
        dc_title: String,
        upnp_class: String,
        artwork: Vec<Artwork>,
        children: Vec<LibraryKey>,
    },
    Item {
        id: i64,
        parent_id: i64,
        dc_title: String,
        upnp_class: String,
        artwork: Vec<Artwork>,
        resources: Vec<ResourceRef>,
        dc_date: Option<i64>,
    },
}

impl MediaObject {
    pub fn id(&self) -> i64 {
        match self {
            MediaObject::Container { id, .. } => *id,
            MediaObject::Item { id, .. } => *id,
        }
    }

    pub fn parent_id(&self) -> i64 {
        match self {
            MediaObject::Container { parent_id, .. } => *parent_id,
            MediaObject::Item { parent_id, .. } => *parent_id,
        }
    }

    pub fn dc_title(&self) -> &str {
        match self {
            MediaObject::Container { dc_title, .. } => dc_title,
            MediaObject::Item { dc_title, .. } => dc_title,
        }
    }

    pub fn upnp_class(&self) -> &str {
        match self {
            MediaObject::Container { upnp_class, .. } => upnp_class,
            MediaObject::Item { upnp_class, .. } => upnp_class,
        }
    }

    pub fn artwork(&self) -> &[Artwork] {
        match self {
            MediaObject::Container { artwork, .. } => artwork,
            MediaObject::Item { artwork, .. } => artwork,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, MediaObject::Container { .. })
    }

    pub fn children(&self) -> Option<&[LibraryKey]> {
        match self {
            MediaObject::Container { children, .. } => Some(children),
            MediaObject::Item { .. } => None,
        }
    }

    pub fn root(name_class: impl Into<String>) -> Self {
        MediaObject::Container {
            id: 0,
            parent_id: -1,
            dc_title: "root".to_string(),
            upnp_class: name_class.into(),
            artwork: Vec::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Resource {
    pub location: String,
    pub mime_type: String,
}

const BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

pub fn encode_object(object: &MediaObject) -> Result<Vec<u8>> {
    Ok(bincode::encode_to_vec(object, BINCODE_CONFIG)?)
}

pub fn decode_object(bytes: &[u8]) -> Result<MediaObject> {
    let (object, _) = bincode::decode_from_slice(bytes, BINCODE_CONFIG)?;
    Ok(object)
}

pub fn encode_resource(resource: &Resource) -> Result<Vec<u8>> {
    Ok(bincode::encode_to_vec(resource, BINCODE_CONFIG)?)
}

pub fn decode_resource(bytes: &[u8]) -> Result<Resource> {
    let (resource, _) = bincode::decode_from_slice(bytes, BINCODE_CONFIG)?;
    Ok(resource)
}
