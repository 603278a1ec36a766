use super::upload_id::UploadId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub upload_id: UploadId,
    pub text: String,
}
