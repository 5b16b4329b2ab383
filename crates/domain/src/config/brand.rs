use serde::{Deserialize, Serialize};

use crate::state::ImageCategory;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Brand copy & contact channels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandConfig {
    #[serde(default = "d_name")]
    pub name: String,
    #[serde(default = "d_contact_number")]
    pub contact_number: String,
    #[serde(default = "d_whatsapp_url")]
    pub whatsapp_url: String,
    /// Shown with every booking link.
    #[serde(default = "d_directions")]
    pub directions: String,
    #[serde(default)]
    pub images: ImagesConfig,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            name: d_name(),
            contact_number: d_contact_number(),
            whatsapp_url: d_whatsapp_url(),
            directions: d_directions(),
            images: ImagesConfig::default(),
        }
    }
}

impl BrandConfig {
    /// The one-line "reach us directly" call to action.
    pub fn contact_line(&self) -> String {
        format!(
            "You can also reach our team directly on WhatsApp at {} ({}).",
            self.contact_number, self.whatsapp_url
        )
    }
}

/// One canned image reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSet {
    pub response: String,
    pub urls: Vec<String>,
    #[serde(default)]
    pub context: String,
}

/// Image sets, one field per [`ImageCategory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "d_location_images")]
    pub location: ImageSet,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            location: d_location_images(),
        }
    }
}

impl ImagesConfig {
    pub fn get(&self, category: ImageCategory) -> &ImageSet {
        match category {
            ImageCategory::Location => &self.location,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_name() -> String {
    "Skypearls Villas".into()
}
fn d_contact_number() -> String {
    "+63 917 150 4140".into()
}
fn d_whatsapp_url() -> String {
    "https://wa.me/639171504140".into()
}
fn d_directions() -> String {
    "We're in Catangnan, General Luna on Siargao Island, about 35 minutes from Sayak Airport. \
     Our team sends a map pin and can arrange airport pick-up once your visit is confirmed."
        .into()
}
fn d_location_images() -> ImageSet {
    ImageSet {
        response: "Here's where you'll find Skypearls Villas: a short drive from General Luna's \
                   cafes and surf breaks, with the quiet of the coconut groves around you."
            .into(),
        urls: vec![
            "/images/location/aerial-view.jpg".into(),
            "/images/location/area-map.jpg".into(),
            "/images/location/beach-access.jpg".into(),
        ],
        context: "location".into(),
    }
}
