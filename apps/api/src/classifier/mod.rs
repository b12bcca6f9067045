//! Classification producers — anything that turns an image into a
//! `ClassificationOutcome`. The progression core only consumes the outcome.
//!
//! Default: `MockClassifier` (deterministic digest of the image bytes).
//! `AppState` holds an `Arc<dyn WasteClassifier>` so a real model can be
//! swapped in without touching handlers.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::progression::models::{ClassificationOutcome, WasteCategory};

#[async_trait]
pub trait WasteClassifier: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<ClassificationOutcome, AppError>;

    /// Short identifier reported alongside results.
    fn backend(&self) -> &'static str;
}

/// Stand-in for a vision model. The same image always yields the same
/// category, a confidence between 70.0 and 99.9, and the category's default
/// recyclability.
pub struct MockClassifier;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn digest(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

#[async_trait]
impl WasteClassifier for MockClassifier {
    async fn classify(&self, image: &[u8]) -> Result<ClassificationOutcome, AppError> {
        if image.is_empty() {
            return Err(AppError::Validation("image cannot be empty".to_string()));
        }

        let hash = digest(image);
        let category = WasteCategory::ALL[(hash % WasteCategory::ALL.len() as u64) as usize];
        let whole = 70 + (hash >> 8) % 30;
        let tenth = (hash >> 16) % 10;
        let confidence = whole as f64 + tenth as f64 / 10.0;

        Ok(ClassificationOutcome::new(
            category,
            confidence,
            category.default_recyclable(),
        )?)
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

/// Disposal guidance shown next to a classification result.
pub fn disposal_tip(category: WasteCategory) -> &'static str {
    match category {
        WasteCategory::Organic => "Compost it or use the green bin.",
        WasteCategory::Plastic => "Rinse and place in the recycling bin; remove caps if required locally.",
        WasteCategory::Paper => "Keep it dry and flatten boxes before recycling.",
        WasteCategory::Glass => "Rinse and recycle; do not include window glass or ceramics.",
        WasteCategory::Metal => "Rinse cans and recycle; crush them to save space.",
        WasteCategory::Electronic => "Take it to an e-waste drop-off point. Never bin batteries.",
        WasteCategory::Textile => "Donate wearable items or use a textile collection bank.",
        WasteCategory::Hazardous => "Bring it to a hazardous waste facility in its original container.",
    }
}

/// Where the uploaded image is considered stored. Uploads are not persisted;
/// the reference only records which file a classification came from.
pub fn image_ref(record_hint: &str, file_name: Option<&str>) -> String {
    let name = file_name
        .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n).trim())
        .filter(|n| !n.is_empty())
        .unwrap_or("image");
    format!("upload://{record_hint}/{name}")
}
