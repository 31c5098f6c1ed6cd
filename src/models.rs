use serde::Serialize;

/// Response for `POST /upload`
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_url: String,
}

/// Envelope returned by the Imgur compatible endpoint
#[derive(Debug, Default, Serialize)]
pub struct ImgurImageResponse {
    pub success: bool,
    /// HTTP status code, repeated in the body
    pub status: u16,
    pub data: ImgurImageData,
}

/// Image fields as Imgur names them. Anything this service does not know
/// about is always `null`.
#[derive(Debug, Default, Serialize)]
pub struct ImgurImageData {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub datetime: Option<i64>,
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
    pub animated: Option<bool>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size: Option<u64>,
    pub views: Option<u64>,
    pub bandwidth: Option<u64>,
    /// Shape undocumented upstream; passed through untouched.
    pub vote: serde_json::Value,
    pub favorite: Option<bool>,
    pub nsfw: Option<bool>,
    pub section: Option<String>,
    pub account_url: Option<String>,
    pub account_id: Option<u64>,
    pub is_ad: Option<bool>,
    pub in_most_viral: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub ad_type: Option<u32>,
    pub ad_url: Option<String>,
    pub in_gallery: Option<bool>,
    pub deletehash: Option<String>,
    pub name: Option<String>,
    pub link: Option<String>,
}
