#[cfg(test)]
#[path = "media_test.rs"]
mod tests;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serializer;
use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Raw bytes of a media file together with its MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryContent {
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub data: Vec<u8>,
    pub media_type: String,
}

impl BinaryContent {
    pub fn new(data: Vec<u8>, media_type: &str) -> BinaryContent {
        return BinaryContent {
            data,
            media_type: media_type.to_string(),
        };
    }

    pub fn base64(&self) -> String {
        return STANDARD.encode(&self.data);
    }
}

impl std::fmt::Debug for BinaryContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("BinaryContent")
            .field("media_type", &self.media_type)
            .field("len", &self.data.len())
            .finish();
    }
}

/// A remote image referenced by URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ImageUrl {
    pub fn new(url: &str) -> ImageUrl {
        return ImageUrl {
            url: url.to_string(),
        };
    }
}

fn to_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    return serializer.serialize_str(&STANDARD.encode(data));
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    return STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom);
}
